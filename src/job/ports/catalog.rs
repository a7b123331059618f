//! Port supplying the ordered unit definitions for a job.

use crate::job::domain::{Job, JobKind, UnitDefinition};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Source of review rules and report sections.
#[async_trait]
pub trait UnitCatalog: Send + Sync {
    /// Returns the definitions to run for `job`, in execution order.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::NoUnits`] when nothing is configured for the
    /// job's kind, or [`CatalogError::Unavailable`] when loading fails.
    async fn units_for(&self, job: &Job) -> Result<Vec<UnitDefinition>, CatalogError>;
}

/// Errors returned while loading unit definitions.
#[derive(Debug, Clone, Error)]
pub enum CatalogError {
    /// No units are configured for this kind of job.
    #[error("no units configured for {0} jobs")]
    NoUnits(JobKind),

    /// The underlying configuration source failed.
    #[error("unit catalog unavailable: {0}")]
    Unavailable(Arc<dyn std::error::Error + Send + Sync>),
}

impl CatalogError {
    /// Wraps a configuration source error.
    pub fn unavailable(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Unavailable(Arc::new(err))
    }
}
