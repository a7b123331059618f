//! Agent client port.

use crate::agent::domain::{AgentName, AgentRequest, AgentResponse};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for agent invocations.
pub type AgentResult<T> = Result<T, AgentError>;

/// Executes prompts against an AI backend.
#[async_trait]
pub trait AgentClient: Send + Sync {
    /// Executes `request` and returns the raw output.
    ///
    /// Implementations should give up once `request.timeout` has elapsed;
    /// callers enforce the deadline as well.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] when the backend call fails.
    async fn execute(&self, request: AgentRequest) -> AgentResult<AgentResponse>;
}

/// Errors returned by agent clients.
#[derive(Debug, Clone, Error)]
pub enum AgentError {
    /// The backend rejected or failed the request.
    #[error("agent {agent} failed: {message}")]
    Execution {
        /// Agent that failed.
        agent: AgentName,
        /// Failure description.
        message: String,
    },

    /// The backend could not be reached.
    #[error("agent transport error: {0}")]
    Transport(Arc<dyn std::error::Error + Send + Sync>),
}

impl AgentError {
    /// Wraps a transport error.
    pub fn transport(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Transport(Arc::new(err))
    }
}
