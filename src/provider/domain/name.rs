//! Validated provider name type.

use super::ProviderDomainError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum length for a provider name, matching the `VARCHAR(50)` column.
const MAX_NAME_LENGTH: usize = 50;

/// Validated, lowercase git hosting provider identifier (`github`,
/// `gitlab`, ...).
///
/// # Examples
///
///     use revue::provider::domain::ProviderName;
///
///     let provider = ProviderName::new("GitHub").expect("valid");
///     assert_eq!(provider.as_str(), "github");
///     assert!(ProviderName::new("   ").is_err());
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProviderName(String);

impl ProviderName {
    /// Creates a validated provider name.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderDomainError`] when the value is empty, too long, or
    /// contains characters outside `[a-z0-9_-]`.
    pub fn new(value: impl Into<String>) -> Result<Self, ProviderDomainError> {
        let raw = value.into();
        let normalized = raw.trim().to_ascii_lowercase();

        if normalized.is_empty() {
            return Err(ProviderDomainError::EmptyProviderName);
        }
        if normalized.len() > MAX_NAME_LENGTH {
            return Err(ProviderDomainError::ProviderNameTooLong(raw));
        }
        if !normalized
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
        {
            return Err(ProviderDomainError::InvalidProviderName(raw));
        }

        Ok(Self(normalized))
    }

    /// Returns the provider name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ProviderName {
    type Error = ProviderDomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ProviderName> for String {
    fn from(value: ProviderName) -> Self {
        value.0
    }
}

impl AsRef<str> for ProviderName {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for ProviderName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
