//! Port contracts for agent invocation.

pub mod client;

pub use client::{AgentClient, AgentError, AgentResult};
