//! In-memory adapters for job ports.

mod catalog;
mod store;

pub use catalog::StaticUnitCatalog;
pub use store::InMemoryJobStore;
