//! Domain model for agent invocation.

mod error;
mod name;
mod request;

pub use error::AgentDomainError;
pub use name::AgentName;
pub use request::{AgentRequest, AgentResponse};
