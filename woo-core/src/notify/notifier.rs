//! Change Notifier
//!
//! The notifier collects stale trace keys between batch ticks and
//! dispatches them once per tick.
//!
//! # Algorithm
//!
//! 1. A write hands the dependents of the written field to [`notify`],
//!    which routes each key to the pending batch of its owning scope.
//! 2. Pending batches are sets of sets; appending is O(1).
//! 3. On [`flush`], every pending batch is taken, its sets are merged, and
//!    the owning scope is looked up in the registry the notifier was built
//!    with. A scope that was released in the meantime is skipped and its
//!    batch discarded.
//! 4. Each stale key of a live scope is recomputed once, however many
//!    writes marked it.
//!
//! Writes performed by a recomputation land in the next tick.
//!
//! [`notify`]: ChangeNotifier::notify
//! [`flush`]: ChangeNotifier::flush

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use smallvec::SmallVec;

use crate::reactive::{RecomputeOutcome, ScopeName, ScopeRegistry, StaleKeys};

/// Stale key sets accumulated for one scope between two ticks.
type NoticeBatch = SmallVec<[StaleKeys; 4]>;

/// Summary of one batch tick.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReport {
    /// Live scopes that had pending notices.
    pub scopes: usize,
    /// Keys recomputed successfully.
    pub recomputed: usize,
    /// Keys whose computation or callback failed.
    pub failed: usize,
    /// Keys that were no longer traced.
    pub skipped: usize,
    /// Batches dropped because their scope is gone.
    pub discarded: usize,
}

impl DispatchReport {
    /// Check if the tick did nothing.
    pub fn is_idle(&self) -> bool {
        *self == Self::default()
    }
}

/// Time-batched dispatcher of stale computations.
pub struct ChangeNotifier {
    registry: Arc<ScopeRegistry>,
    pending: Mutex<HashMap<ScopeName, NoticeBatch>>,
    interval: Duration,
}

impl ChangeNotifier {
    /// Create a notifier dispatching to the scopes of `registry`.
    pub fn new(registry: Arc<ScopeRegistry>, interval: Duration) -> Self {
        Self {
            registry,
            pending: Mutex::new(HashMap::new()),
            interval,
        }
    }

    /// Delay between two batch ticks.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Append a set of stale keys to the pending batch of `scope`.
    pub fn mark_stale(&self, scope: &ScopeName, keys: StaleKeys) {
        if keys.is_empty() {
            return;
        }
        tracing::trace!(scope = %scope, keys = keys.len(), "marked stale");
        self.pending
            .lock()
            .entry(scope.clone())
            .or_default()
            .push(keys);
    }

    /// Route stale keys to the batches of their owning scopes.
    pub fn notify(&self, keys: StaleKeys) {
        let mut by_scope: HashMap<ScopeName, StaleKeys> = HashMap::new();
        for key in keys {
            by_scope.entry(key.scope().clone()).or_default().insert(key);
        }
        for (scope, keys) in by_scope {
            self.mark_stale(&scope, keys);
        }
    }

    /// Number of scopes with pending notices.
    pub fn pending_scopes(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.lock().is_empty()
    }

    /// Run one batch tick.
    pub fn flush(&self) -> DispatchReport {
        let batches = std::mem::take(&mut *self.pending.lock());
        let mut report = DispatchReport::default();

        for (name, batch) in batches {
            let Some(scope) = self.registry.get(name.as_str()) else {
                tracing::debug!(scope = %name, "dropping notices for a released scope");
                report.discarded += 1;
                continue;
            };
            report.scopes += 1;

            let keys: StaleKeys = batch.into_iter().flatten().collect();
            for key in keys {
                match scope.recompute(key.name()) {
                    RecomputeOutcome::Recomputed => report.recomputed += 1,
                    RecomputeOutcome::Failed => report.failed += 1,
                    RecomputeOutcome::Untraced => report.skipped += 1,
                }
            }
        }

        report
    }
}

impl std::fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeNotifier")
            .field("interval", &self.interval)
            .field("pending_scopes", &self.pending_scopes())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::TraceKey;

    fn keys(scope: &str, names: &[&str]) -> StaleKeys {
        names
            .iter()
            .map(|name| TraceKey::new(scope.into(), *name))
            .collect()
    }

    fn notifier() -> ChangeNotifier {
        ChangeNotifier::new(Arc::new(ScopeRegistry::new()), Duration::from_millis(5))
    }

    #[test]
    fn empty_sets_are_ignored() {
        let notifier = notifier();
        notifier.mark_stale(&"a".into(), StaleKeys::new());
        assert!(!notifier.has_pending());
    }

    #[test]
    fn notify_routes_by_scope() {
        let notifier = notifier();
        let mut stale = keys("a", &["k1", "k2"]);
        stale.extend(keys("b", &["k1"]));

        notifier.notify(stale);

        assert_eq!(notifier.pending_scopes(), 2);
    }

    #[test]
    fn unknown_scopes_are_discarded() {
        let notifier = notifier();
        notifier.mark_stale(&"gone".into(), keys("gone", &["k"]));
        notifier.mark_stale(&"gone".into(), keys("gone", &["k"]));

        let report = notifier.flush();

        assert_eq!(report.discarded, 1);
        assert_eq!(report.recomputed, 0);
        assert!(!notifier.has_pending());
        assert!(notifier.flush().is_idle());
    }
}
