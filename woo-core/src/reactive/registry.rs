//! Scope Registry
//!
//! Explicit name → scope lookup table. The runtime owns one and hands it to
//! its change notifier, so tests can run any number of isolated registries
//! side by side.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::key::ScopeName;
use super::scope::Scope;
use crate::error::{Result, ScopeError};

/// Registry of active scopes, keyed by name.
#[derive(Debug, Default)]
pub struct ScopeRegistry {
    scopes: DashMap<ScopeName, Arc<Scope>>,
}

impl ScopeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a scope under its name and mark it active.
    pub(crate) fn register(&self, scope: Arc<Scope>) -> Result<()> {
        match self.scopes.entry(scope.name().clone()) {
            Entry::Occupied(entry) => Err(ScopeError::DuplicateScope(entry.key().to_string())),
            Entry::Vacant(entry) => {
                scope.activate();
                entry.insert(scope);
                Ok(())
            }
        }
    }

    /// Look up a scope by name.
    pub fn get(&self, name: &str) -> Option<Arc<Scope>> {
        self.scopes.get(name).map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.scopes.contains_key(name)
    }

    /// Remove `scope`, but only if it is the one registered under its name.
    pub(crate) fn remove(&self, scope: &Scope) -> bool {
        self.scopes
            .remove_if(scope.name().as_str(), |_, registered| {
                std::ptr::eq(registered.as_ref(), scope)
            })
            .is_some()
    }

    /// Names of all registered scopes.
    pub fn names(&self) -> Vec<ScopeName> {
        self.scopes.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }
}
