//! In-memory provider adapters.

mod provider;

pub use provider::{InMemoryProvider, PostedComment};
