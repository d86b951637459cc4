//! Runtime Configuration
//!
//! A small serde-loadable configuration for the batch scheduler and the
//! dependency bookkeeping policy.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScopeError};

/// Default delay between two batch ticks, in milliseconds.
pub const DEFAULT_BATCH_INTERVAL_MS: u64 = 5;

/// How dependency edges evolve across recomputations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyPolicy {
    /// Edges are only ever added. A computation that stops reading a field
    /// stays registered on it and may be recomputed spuriously, never missed.
    #[default]
    Accumulate,

    /// The edges of a key are forgotten before it re-runs, then re-added
    /// by the reads of the new run.
    Prune,
}

/// Configuration for a [`Runtime`](crate::reactive::Runtime).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Delay between two batch ticks, in milliseconds.
    pub batch_interval_ms: u64,

    /// Edge policy applied on recomputation.
    pub dependency_policy: DependencyPolicy,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            batch_interval_ms: DEFAULT_BATCH_INTERVAL_MS,
            dependency_policy: DependencyPolicy::default(),
        }
    }
}

impl RuntimeConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the configuration is usable.
    pub fn validate(&self) -> Result<()> {
        if self.batch_interval_ms == 0 {
            return Err(ScopeError::Config(
                "batch_interval_ms must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// The batch interval as a [`Duration`].
    pub fn batch_interval(&self) -> Duration {
        Duration::from_millis(self.batch_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = RuntimeConfig::default();
        assert_eq!(config.batch_interval(), Duration::from_millis(5));
        assert_eq!(config.dependency_policy, DependencyPolicy::Accumulate);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parses_partial_json() {
        let config = RuntimeConfig::from_json(r#"{"dependency_policy": "prune"}"#).unwrap();
        assert_eq!(config.dependency_policy, DependencyPolicy::Prune);
        assert_eq!(config.batch_interval_ms, DEFAULT_BATCH_INTERVAL_MS);
    }

    #[test]
    fn rejects_zero_interval() {
        let err = RuntimeConfig::from_json(r#"{"batch_interval_ms": 0}"#).unwrap_err();
        assert!(matches!(err, ScopeError::Config(_)));
    }

    #[test]
    fn rejects_malformed_json() {
        let err = RuntimeConfig::from_json("{").unwrap_err();
        assert!(matches!(err, ScopeError::Json(_)));
    }
}
