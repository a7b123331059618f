//! Domain types for webhook resolution.

mod actions;
mod outcome;

pub use actions::ReviewableActions;
pub use outcome::WebhookOutcome;
