//! Tracing subscriber installation for hosts embedding the engine.

use thiserror::Error;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Errors returned when installing the global subscriber.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The fallback directive could not be parsed.
    #[error("invalid log directive '{directive}': {message}")]
    InvalidDirective {
        /// Directive that failed to parse.
        directive: String,
        /// Parser message.
        message: String,
    },
    /// A global subscriber is already installed.
    #[error("tracing subscriber already installed: {0}")]
    AlreadyInstalled(String),
}

/// Installs a registry with an `EnvFilter` and a fmt layer.
///
/// The filter comes from `RUST_LOG` and falls back to `default_directive`
/// (for example `"revue=info"`) when the variable is unset or invalid.
///
/// # Errors
///
/// Returns [`TelemetryError::InvalidDirective`] for an unparseable
/// fallback, or [`TelemetryError::AlreadyInstalled`] when another global
/// subscriber exists.
pub fn init_tracing(default_directive: &str) -> Result<(), TelemetryError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive))
        .map_err(|err| TelemetryError::InvalidDirective {
            directive: default_directive.to_owned(),
            message: err.to_string(),
        })?;

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .try_init()
        .map_err(|err| TelemetryError::AlreadyInstalled(err.to_string()))
}
