//! Domain model for git hosting providers.
//!
//! Webhook payloads from every provider are normalised into
//! [`WebhookEvent`] before they reach the review resolver.

mod error;
mod event;
mod name;
mod snapshot;

pub use error::ProviderDomainError;
pub use event::{PullRequestAction, PullRequestEvent, PushEvent, WebhookDelivery, WebhookEvent};
pub use name::ProviderName;
pub use snapshot::{RepositorySnapshot, SourceFile};
