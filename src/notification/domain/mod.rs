//! Notification payloads.

mod notification;

pub use notification::JobNotification;
