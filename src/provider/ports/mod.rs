//! Port contracts for git hosting providers.

pub mod client;

pub use client::{ProviderClient, ProviderError, ProviderResult};
