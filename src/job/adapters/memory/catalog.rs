//! Unit catalog backed by fixed lists of review rules and report sections.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::job::{
    domain::{Job, JobKind, UnitDefinition},
    ports::{CatalogError, UnitCatalog},
};

/// Catalog holding review rules and report sections in memory.
///
/// Deserialisable so hosts can load it from whichever configuration format
/// they use.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticUnitCatalog {
    #[serde(default)]
    review_rules: Vec<UnitDefinition>,
    #[serde(default)]
    report_sections: Vec<UnitDefinition>,
}

impl StaticUnitCatalog {
    /// Creates a catalog from rule and section definitions.
    #[must_use]
    pub const fn new(
        review_rules: Vec<UnitDefinition>,
        report_sections: Vec<UnitDefinition>,
    ) -> Self {
        Self {
            review_rules,
            report_sections,
        }
    }

    /// Returns the configured review rules.
    #[must_use]
    pub fn review_rules(&self) -> &[UnitDefinition] {
        &self.review_rules
    }

    /// Returns the configured report sections.
    #[must_use]
    pub fn report_sections(&self) -> &[UnitDefinition] {
        &self.report_sections
    }
}

#[async_trait]
impl UnitCatalog for StaticUnitCatalog {
    async fn units_for(&self, job: &Job) -> Result<Vec<UnitDefinition>, CatalogError> {
        let definitions = match job.kind() {
            JobKind::Review => &self.review_rules,
            JobKind::Report => &self.report_sections,
        };
        if definitions.is_empty() {
            return Err(CatalogError::NoUnits(job.kind()));
        }
        Ok(definitions.clone())
    }
}
