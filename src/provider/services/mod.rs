//! Provider lookup services.

pub mod registry;

pub use registry::{ProviderRegistry, ProviderRegistryError};
