//! Identifiers for scopes and traced computations.
//!
//! A trace key names one computation within a scope. Keys are only unique
//! within their scope, so every key carries the name of the scope that owns
//! it. This lets a write on any node route its stale keys to the right
//! scope, including reads that crossed into a parent scope.

use std::borrow::Borrow;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Name of a scope, usually derived from a component or element id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeName(Arc<str>);

impl ScopeName {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ScopeName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScopeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ScopeName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for ScopeName {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

/// Identifies one traced computation: the owning scope plus the key name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TraceKey {
    scope: ScopeName,
    name: Arc<str>,
}

impl TraceKey {
    pub fn new(scope: ScopeName, name: impl Into<Arc<str>>) -> Self {
        Self {
            scope,
            name: name.into(),
        }
    }

    /// The scope that registered this computation.
    pub fn scope(&self) -> &ScopeName {
        &self.scope
    }

    /// The key name, unique within the scope.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for TraceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.scope, self.name)
    }
}

/// A set of computations whose inputs changed.
pub type StaleKeys = HashSet<TraceKey>;
