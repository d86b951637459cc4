//! Dependency Ledger
//!
//! Every tracked node owns one [`DependencyRecord`]. It answers two
//! questions when the node is mutated:
//!
//! - which computations depend on the node as a whole (its identity or
//!   shape), triggered on replacement or deletion;
//! - which computations depend on one specific field.
//!
//! A record lives exactly as long as its node. There is no eviction.

use std::collections::HashSet;

use dashmap::DashMap;
use parking_lot::RwLock;

use super::key::{StaleKeys, TraceKey};

/// Per-node bookkeeping of dependent computations.
#[derive(Debug, Default)]
pub struct DependencyRecord {
    /// Computations that depend on the node's identity or whole shape.
    self_dependents: RwLock<HashSet<TraceKey>>,

    /// Computations that depend on a single field, keyed by field name.
    field_dependents: DashMap<String, HashSet<TraceKey>>,
}

impl DependencyRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `key` depends on the node as a whole.
    ///
    /// Returns `true` if the edge is new.
    pub fn add_self_dependent(&self, key: TraceKey) -> bool {
        self.self_dependents.write().insert(key)
    }

    /// Record that `key` depends on `field`.
    ///
    /// Returns `true` if the edge is new.
    pub fn add_field_dependent(&self, field: &str, key: TraceKey) -> bool {
        if let Some(mut keys) = self.field_dependents.get_mut(field) {
            return keys.insert(key);
        }
        self.field_dependents
            .entry(field.to_string())
            .or_default()
            .insert(key)
    }

    /// Computations that read `field`. Empty if nobody did.
    pub fn field_dependents(&self, field: &str) -> StaleKeys {
        self.field_dependents
            .get(field)
            .map(|keys| keys.clone())
            .unwrap_or_default()
    }

    /// Computations that depend on the node as a whole.
    pub fn self_dependents(&self) -> StaleKeys {
        self.self_dependents.read().clone()
    }

    /// Every computation that depends on this node in any way.
    pub fn all_dependents(&self) -> StaleKeys {
        let mut keys = self.self_dependents();
        for entry in self.field_dependents.iter() {
            keys.extend(entry.value().iter().cloned());
        }
        keys
    }

    /// Drop every edge held by `key`.
    pub fn forget(&self, key: &TraceKey) {
        self.self_dependents.write().remove(key);
        self.field_dependents.retain(|_, keys| {
            keys.remove(key);
            !keys.is_empty()
        });
    }

    /// Total number of edges in the record.
    pub fn edge_count(&self) -> usize {
        let fields: usize = self
            .field_dependents
            .iter()
            .map(|entry| entry.value().len())
            .sum();
        self.self_dependents.read().len() + fields
    }

    pub fn is_empty(&self) -> bool {
        self.edge_count() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(name: &str) -> TraceKey {
        TraceKey::new("scope".into(), name)
    }

    #[test]
    fn records_field_and_self_edges() {
        let record = DependencyRecord::new();
        assert!(record.add_field_dependent("a", key("k1")));
        assert!(!record.add_field_dependent("a", key("k1")));
        assert!(record.add_field_dependent("a", key("k2")));
        assert!(record.add_self_dependent(key("k3")));

        assert_eq!(record.field_dependents("a").len(), 2);
        assert!(record.field_dependents("missing").is_empty());
        assert_eq!(record.self_dependents().len(), 1);
        assert_eq!(record.all_dependents().len(), 3);
        assert_eq!(record.edge_count(), 3);
    }

    #[test]
    fn forget_removes_every_edge_of_a_key() {
        let record = DependencyRecord::new();
        record.add_field_dependent("a", key("k1"));
        record.add_field_dependent("b", key("k1"));
        record.add_field_dependent("b", key("k2"));
        record.add_self_dependent(key("k1"));

        record.forget(&key("k1"));

        assert!(record.field_dependents("a").is_empty());
        assert_eq!(record.field_dependents("b").len(), 1);
        assert!(record.self_dependents().is_empty());
        assert_eq!(record.edge_count(), 1);

        record.forget(&key("k2"));
        assert!(record.is_empty());
    }
}
