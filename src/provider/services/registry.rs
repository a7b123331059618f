//! Name-keyed registry of provider clients.

use crate::provider::{domain::ProviderName, ports::ProviderClient};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use thiserror::Error;

/// Errors returned by [`ProviderRegistry`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderRegistryError {
    /// No client is registered under the name.
    #[error("unknown provider: {0}")]
    UnknownProvider(ProviderName),

    /// The registry lock was poisoned.
    #[error("provider registry lock poisoned: {0}")]
    Poisoned(String),
}

/// Registry resolving provider names to typed client handles.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    clients: Arc<RwLock<HashMap<ProviderName, Arc<dyn ProviderClient>>>>,
}

impl ProviderRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `client` under `name`, replacing any previous client.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderRegistryError::Poisoned`] when the lock is poisoned.
    pub fn register(
        &self,
        name: ProviderName,
        client: Arc<dyn ProviderClient>,
    ) -> Result<(), ProviderRegistryError> {
        self.clients
            .write()
            .map_err(|err| ProviderRegistryError::Poisoned(err.to_string()))?
            .insert(name, client);
        Ok(())
    }

    /// Returns the client registered under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderRegistryError::UnknownProvider`] when nothing is
    /// registered under the name.
    pub fn get(&self, name: &ProviderName) -> Result<Arc<dyn ProviderClient>, ProviderRegistryError> {
        self.clients
            .read()
            .map_err(|err| ProviderRegistryError::Poisoned(err.to_string()))?
            .get(name)
            .cloned()
            .ok_or_else(|| ProviderRegistryError::UnknownProvider(name.clone()))
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<String> = self
            .clients
            .read()
            .map(|clients| clients.keys().map(ToString::to_string).collect())
            .unwrap_or_default();
        f.debug_struct("ProviderRegistry")
            .field("providers", &names)
            .finish()
    }
}
