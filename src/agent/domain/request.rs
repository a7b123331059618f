//! Agent invocation payloads.

use super::AgentName;
use crate::job::domain::JobId;
use std::time::Duration;

/// Prompt and repository content sent to an agent for one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentRequest {
    /// Agent that should execute the request.
    pub agent: AgentName,
    /// Job the unit belongs to.
    pub job_id: JobId,
    /// Name of the unit being executed.
    pub unit_name: String,
    /// Rendered prompt.
    pub prompt: String,
    /// Repository content the prompt refers to.
    pub content: String,
    /// Deadline the agent should honour.
    pub timeout: Duration,
}

/// Raw agent output, expected to be text or JSON.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentResponse {
    /// Output as returned by the backend.
    pub output: String,
}

impl AgentResponse {
    /// Wraps raw agent output.
    #[must_use]
    pub fn new(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
        }
    }
}
