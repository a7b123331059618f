//! Best-effort notifications on terminal job states.
//!
//! The [`services::NotificationDispatcher`] is constructed explicitly and
//! handed to the engine; delivery failures are logged and never affect the
//! job.

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;
