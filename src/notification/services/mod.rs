//! Notification dispatch services.

pub mod dispatcher;

pub use dispatcher::NotificationDispatcher;
