//! Error types for provider domain validation.

use thiserror::Error;

/// Errors returned while constructing provider domain values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderDomainError {
    /// The provider name is empty after trimming.
    #[error("provider name must not be empty")]
    EmptyProviderName,

    /// The provider name contains characters outside `[a-z0-9_-]`.
    #[error("provider name '{0}' contains invalid characters")]
    InvalidProviderName(String),

    /// The provider name exceeds the storage limit.
    #[error("provider name exceeds 50 character limit: {0}")]
    ProviderNameTooLong(String),

    /// A source file path is empty after trimming.
    #[error("source file path must not be empty")]
    EmptyFilePath,
}
