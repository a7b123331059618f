//! Application services for job execution.

mod activity;
mod config;
mod engine;
mod pipeline;
mod prompt;
mod queue;
mod reaper;

pub use config::{
    CompletionPolicy, ConfigError, EngineConfig, PipelinePolicy, SubmitMode, UnitFailurePolicy,
};
pub use engine::{EngineError, EngineResult, JobCallback, JobEngine, JobHandle, UnitRetryHandle};
pub use pipeline::{
    Collaborators, PipelineError, PipelineExecutor, PipelineOutcome, PipelineReport,
    PipelineSettings, UnitFailure, UnitOutcome,
};
pub use prompt::render_prompt;
