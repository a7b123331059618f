//! Port contracts for job persistence and unit configuration.
//!
//! Ports define infrastructure-agnostic interfaces used by the job engine
//! and pipeline executor.

pub mod catalog;
pub mod store;

pub use catalog::{CatalogError, UnitCatalog};
pub use store::{JobStore, JobStoreError, JobStoreResult};
