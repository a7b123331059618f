//! Scripted agent client for tests and local runs.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{Notify, watch};

use crate::agent::{
    domain::{AgentName, AgentRequest, AgentResponse},
    ports::{AgentClient, AgentError, AgentResult},
};

#[derive(Debug, Clone)]
enum Reply {
    Output(String),
    Failure(String),
}

#[derive(Debug, Default)]
struct UnitScript {
    replies: VecDeque<Reply>,
    delay: Option<Duration>,
    gate: Option<Arc<Notify>>,
}

struct PlannedReply {
    reply: Reply,
    delay: Option<Duration>,
    gate: Option<Arc<Notify>>,
}

#[derive(Debug, Default)]
struct ScriptState {
    scripts: HashMap<String, UnitScript>,
    calls: Vec<AgentRequest>,
}

/// Agent client that replies from per-unit scripts.
///
/// Each unit name has a queue of replies. The last reply is repeated once
/// the queue has a single entry left. Units without a script receive the
/// default output.
#[derive(Debug, Clone)]
pub struct ScriptedAgentClient {
    name: AgentName,
    default_output: String,
    state: Arc<Mutex<ScriptState>>,
    call_count: Arc<watch::Sender<usize>>,
}

impl ScriptedAgentClient {
    /// Creates a client answering every unit with `default_output`.
    #[must_use]
    pub fn new(name: AgentName, default_output: impl Into<String>) -> Self {
        let (call_count, _) = watch::channel(0);
        Self {
            name,
            default_output: default_output.into(),
            state: Arc::new(Mutex::new(ScriptState::default())),
            call_count: Arc::new(call_count),
        }
    }

    /// Queues a successful reply for `unit_name`.
    #[must_use]
    pub fn with_output(self, unit_name: &str, output: impl Into<String>) -> Self {
        self.push_reply(unit_name, Reply::Output(output.into()));
        self
    }

    /// Queues a failing reply for `unit_name`.
    #[must_use]
    pub fn with_failure(self, unit_name: &str, message: impl Into<String>) -> Self {
        self.push_reply(unit_name, Reply::Failure(message.into()));
        self
    }

    /// Delays every reply for `unit_name`.
    #[must_use]
    pub fn with_delay(self, unit_name: &str, delay: Duration) -> Self {
        self.update_script(unit_name, |script| script.delay = Some(delay));
        self
    }

    /// Holds every reply for `unit_name` until `gate` is notified.
    #[must_use]
    pub fn with_gate(self, unit_name: &str, gate: Arc<Notify>) -> Self {
        self.update_script(unit_name, |script| script.gate = Some(gate));
        self
    }

    /// Returns every request received so far, in call order.
    #[must_use]
    pub fn calls(&self) -> Vec<AgentRequest> {
        self.lock().calls.clone()
    }

    /// Returns the unit names called so far, in call order.
    #[must_use]
    pub fn called_units(&self) -> Vec<String> {
        self.lock()
            .calls
            .iter()
            .map(|request| request.unit_name.clone())
            .collect()
    }

    /// Waits until `unit_name` has been called at least `times` times.
    pub async fn wait_for_calls(&self, unit_name: &str, times: usize) {
        let mut receiver = self.call_count.subscribe();
        // The sender lives as long as `self`, so `wait_for` cannot fail here.
        let _changed = receiver
            .wait_for(|_| self.count_calls(unit_name) >= times)
            .await;
    }

    fn count_calls(&self, unit_name: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|request| request.unit_name == unit_name)
            .count()
    }

    fn lock(&self) -> MutexGuard<'_, ScriptState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn update_script(&self, unit_name: &str, apply: impl FnOnce(&mut UnitScript)) {
        let mut state = self.lock();
        apply(state.scripts.entry(unit_name.to_owned()).or_default());
    }

    fn push_reply(&self, unit_name: &str, reply: Reply) {
        self.update_script(unit_name, |script| script.replies.push_back(reply));
    }

    fn record_call(&self, request: &AgentRequest) -> PlannedReply {
        let mut state = self.lock();
        state.calls.push(request.clone());
        let planned = state.scripts.get_mut(&request.unit_name).map_or_else(
            || PlannedReply {
                reply: Reply::Output(self.default_output.clone()),
                delay: None,
                gate: None,
            },
            |script| {
                let next = if script.replies.len() > 1 {
                    script.replies.pop_front()
                } else {
                    script.replies.front().cloned()
                };
                PlannedReply {
                    reply: next.unwrap_or_else(|| Reply::Output(self.default_output.clone())),
                    delay: script.delay,
                    gate: script.gate.clone(),
                }
            },
        );
        drop(state);
        self.call_count
            .send_modify(|count| *count = count.saturating_add(1));
        planned
    }
}

#[async_trait]
impl AgentClient for ScriptedAgentClient {
    async fn execute(&self, request: AgentRequest) -> AgentResult<AgentResponse> {
        let planned = self.record_call(&request);
        if let Some(gate) = planned.gate {
            gate.notified().await;
        }
        if let Some(delay) = planned.delay {
            tokio::time::sleep(delay).await;
        }
        match planned.reply {
            Reply::Output(output) => Ok(AgentResponse::new(output)),
            Reply::Failure(message) => Err(AgentError::Execution {
                agent: self.name.clone(),
                message,
            }),
        }
    }
}
