//! Owner identity: who registered a task.
//!
//! Schedulers never inspect an owner's concrete type. Anything implementing
//! [`Identifiable`] can be passed as an owner; an [`OwnerResolver`] decides
//! whether that identity is actually registered.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::CoreError;

/// A party that can own scheduled work (a plugin, a module, a subsystem).
pub trait Identifiable: Send + Sync {
    /// Stable identifier, unique among registered owners.
    fn id(&self) -> &str;

    /// Display name. Defaults to the id.
    fn name(&self) -> &str {
        self.id()
    }
}

impl fmt::Debug for dyn Identifiable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Owner").field("id", &self.id()).finish()
    }
}

/// Shared owner reference as stored on tasks.
pub type Owner = Arc<dyn Identifiable>;

/// Resolves caller-supplied owners to registered identities.
pub trait OwnerResolver: Send + Sync {
    /// Returns the registered id of `owner`, or `None` if it is unknown.
    fn resolve(&self, owner: &dyn Identifiable) -> Option<String>;
}

/// Plain owner record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
}

impl OwnerInfo {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            version: None,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }
}

impl Identifiable for OwnerInfo {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Thread-safe registry of known owners, keyed by id.
#[derive(Default)]
pub struct OwnerRegistry {
    owners: RwLock<BTreeMap<String, String>>,
}

impl OwnerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an owner. Ids must be non-empty and unique.
    pub fn register(&self, owner: &dyn Identifiable) -> Result<(), CoreError> {
        let id = owner.id();
        if id.is_empty() {
            return Err(CoreError::EmptyOwnerId);
        }
        let mut owners = self.owners.write().unwrap_or_else(|e| e.into_inner());
        if owners.contains_key(id) {
            return Err(CoreError::DuplicateOwner(id.to_string()));
        }
        owners.insert(id.to_string(), owner.name().to_string());
        info!(owner = %id, name = %owner.name(), "registered owner");
        Ok(())
    }

    /// Remove an owner. Returns whether it was registered.
    pub fn unregister(&self, id: &str) -> bool {
        let removed = self
            .owners
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(id)
            .is_some();
        if removed {
            debug!(owner = %id, "unregistered owner");
        }
        removed
    }

    pub fn is_registered(&self, id: &str) -> bool {
        self.owners
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(id)
    }

    /// Registered ids in sorted order.
    pub fn ids(&self) -> Vec<String> {
        self.owners
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.owners.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl OwnerResolver for OwnerRegistry {
    fn resolve(&self, owner: &dyn Identifiable) -> Option<String> {
        let id = owner.id();
        self.is_registered(id).then(|| id.to_string())
    }
}
