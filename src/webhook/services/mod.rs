//! Webhook resolution services.

pub mod resolver;

pub use resolver::{WebhookError, WebhookResolver, WebhookResult};
