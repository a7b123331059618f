//! In-memory agent adapters.

mod scripted;

pub use scripted::ScriptedAgentClient;
