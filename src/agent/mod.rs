//! AI agent invocation behind a name-keyed registry.
//!
//! Units name the agent that executes them; the pipeline resolves that name
//! through [`services::AgentRegistry`] and receives a typed
//! [`ports::AgentClient`] handle.
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Orchestration services in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
