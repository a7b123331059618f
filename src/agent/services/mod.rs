//! Agent lookup services.

pub mod registry;

pub use registry::{AgentRegistry, AgentRegistryError};
