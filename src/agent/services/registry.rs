//! Name-keyed registry of agent clients.

use crate::agent::{domain::AgentName, ports::AgentClient};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use thiserror::Error;

/// Errors returned by [`AgentRegistry`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AgentRegistryError {
    /// No client is registered under the name.
    #[error("unknown agent: {0}")]
    UnknownAgent(AgentName),

    /// The registry lock was poisoned.
    #[error("agent registry lock poisoned: {0}")]
    Poisoned(String),
}

/// Registry resolving agent names to typed client handles.
///
/// Constructed explicitly and shared by reference; there is no global
/// instance.
#[derive(Clone, Default)]
pub struct AgentRegistry {
    clients: Arc<RwLock<HashMap<AgentName, Arc<dyn AgentClient>>>>,
}

impl AgentRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `client` under `name`, replacing any previous client.
    ///
    /// # Errors
    ///
    /// Returns [`AgentRegistryError::Poisoned`] when the lock is poisoned.
    pub fn register(
        &self,
        name: AgentName,
        client: Arc<dyn AgentClient>,
    ) -> Result<(), AgentRegistryError> {
        let mut clients = self
            .clients
            .write()
            .map_err(|err| AgentRegistryError::Poisoned(err.to_string()))?;
        clients.insert(name, client);
        Ok(())
    }

    /// Returns the client registered under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`AgentRegistryError::UnknownAgent`] when nothing is
    /// registered under the name.
    pub fn get(&self, name: &AgentName) -> Result<Arc<dyn AgentClient>, AgentRegistryError> {
        let clients = self
            .clients
            .read()
            .map_err(|err| AgentRegistryError::Poisoned(err.to_string()))?;
        clients
            .get(name)
            .cloned()
            .ok_or_else(|| AgentRegistryError::UnknownAgent(name.clone()))
    }

    /// Returns the registered names in sorted order.
    ///
    /// # Errors
    ///
    /// Returns [`AgentRegistryError::Poisoned`] when the lock is poisoned.
    pub fn names(&self) -> Result<Vec<AgentName>, AgentRegistryError> {
        let clients = self
            .clients
            .read()
            .map_err(|err| AgentRegistryError::Poisoned(err.to_string()))?;
        let mut names: Vec<AgentName> = clients.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}

impl std::fmt::Debug for AgentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names = self.names().unwrap_or_default();
        f.debug_struct("AgentRegistry").field("agents", &names).finish()
    }
}
