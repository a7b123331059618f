//! Notifier adapters.

mod noop;
mod recording;
mod tracing_notifier;

pub use noop::NoOpNotifier;
pub use recording::RecordingNotifier;
pub use tracing_notifier::TracingNotifier;
