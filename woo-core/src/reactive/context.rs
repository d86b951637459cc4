//! Trace Session
//!
//! The trace session tracks which computation is currently recording.
//! This enables automatic dependency tracking: when a tracked field is
//! read, the node asks the session which key to attribute the read to.
//!
//! # Implementation
//!
//! The session is a single slot owned by the [`Runtime`](super::Runtime)
//! and handed to every tracked node through its graph hooks, rather than a
//! hidden global. At most one trace records at a time:
//!
//! - a second trace started on the recording thread fails fast with
//!   [`ScopeError::NestedTrace`] instead of silently misattributing reads;
//! - traces started on other threads wait on a gate until the slot is free;
//! - reads performed on a thread other than the recording one are never
//!   attributed.
//!
//! The gate is held for the whole traced run. A computation that starts a
//! thread tracing on the same session and then joins it deadlocks: the
//! other thread is not the recording one, so it waits on the gate rather
//! than failing with `NestedTrace`.
//!
//! The slot is cleared by a guard when the traced function returns or
//! panics, so a failing computation never leaves a stale trace behind.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};

use parking_lot::Mutex;

use super::key::TraceKey;
use super::ledger::DependencyRecord;
use crate::error::{panic_message, Result, ScopeError};

/// The trace that is currently recording.
#[derive(Debug)]
struct ActiveTrace {
    key: TraceKey,
    thread: ThreadId,
    /// Records that received an edge during this run.
    touched: HashMap<usize, Weak<DependencyRecord>>,
}

/// The set of dependency records a traced run wrote edges into.
#[derive(Debug, Default)]
pub struct TraceFootprint {
    records: HashMap<usize, Weak<DependencyRecord>>,
}

impl TraceFootprint {
    /// Number of distinct records touched.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Fold another footprint into this one.
    pub fn merge(&mut self, other: TraceFootprint) {
        self.records.extend(other.records);
    }

    /// Remove every edge held by `key` from the records still alive.
    pub fn forget(&mut self, key: &TraceKey) {
        for record in self.records.values().filter_map(Weak::upgrade) {
            record.forget(key);
        }
        self.records.clear();
    }
}

/// Single-slot context recording which computation is running.
#[derive(Debug, Default)]
pub struct TraceSession {
    /// Serializes traces coming from different threads.
    gate: Mutex<()>,
    active: Mutex<Option<ActiveTrace>>,
}

impl TraceSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// The key recording on the calling thread, if any.
    pub fn current(&self) -> Option<TraceKey> {
        let me = thread::current().id();
        self.active
            .lock()
            .as_ref()
            .filter(|trace| trace.thread == me)
            .map(|trace| trace.key.clone())
    }

    /// Check if a trace is recording on the calling thread.
    pub fn is_recording(&self) -> bool {
        self.current().is_some()
    }

    /// Attribute a read of `record` to the recording key.
    ///
    /// Returns the key the caller should add an edge for, and remembers the
    /// record in the run's footprint.
    pub fn attribute(&self, record: &Arc<DependencyRecord>) -> Option<TraceKey> {
        let me = thread::current().id();
        let mut active = self.active.lock();
        let trace = active.as_mut().filter(|trace| trace.thread == me)?;
        trace
            .touched
            .entry(Arc::as_ptr(record) as usize)
            .or_insert_with(|| Arc::downgrade(record));
        Some(trace.key.clone())
    }

    /// Run `f` with `key` as the recording trace.
    ///
    /// The slot is restored to empty however `f` exits. A panic inside `f`
    /// is caught and reported as [`ScopeError::Computation`].
    pub fn run_traced<R>(&self, key: TraceKey, f: impl FnOnce() -> R) -> Result<(R, TraceFootprint)> {
        if let Some(active) = self.current() {
            return Err(ScopeError::NestedTrace {
                active: active.to_string(),
                requested: key.to_string(),
            });
        }

        let _gate = self.gate.lock();
        *self.active.lock() = Some(ActiveTrace {
            key: key.clone(),
            thread: thread::current().id(),
            touched: HashMap::new(),
        });
        let guard = TraceGuard { session: self };

        let outcome = panic::catch_unwind(AssertUnwindSafe(f));
        let footprint = guard.finish();

        match outcome {
            Ok(value) => Ok((value, footprint)),
            Err(payload) => Err(ScopeError::Computation {
                key: key.to_string(),
                message: panic_message(payload.as_ref()),
            }),
        }
    }
}

/// Clears the active slot when dropped.
struct TraceGuard<'a> {
    session: &'a TraceSession,
}

impl TraceGuard<'_> {
    fn finish(self) -> TraceFootprint {
        let records = self
            .session
            .active
            .lock()
            .take()
            .map(|trace| trace.touched)
            .unwrap_or_default();
        TraceFootprint { records }
    }
}

impl Drop for TraceGuard<'_> {
    fn drop(&mut self) {
        self.session.active.lock().take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(name: &str) -> TraceKey {
        TraceKey::new("scope".into(), name)
    }

    #[test]
    fn session_tracks_key() {
        let session = TraceSession::new();
        assert!(!session.is_recording());

        let (seen, _) = session.run_traced(key("k"), || session.current()).unwrap();
        assert_eq!(seen, Some(key("k")));

        // Slot is cleared after the run
        assert!(session.current().is_none());
    }

    #[test]
    fn nested_trace_fails_fast() {
        let session = TraceSession::new();
        let (inner, _) = session
            .run_traced(key("outer"), || session.run_traced(key("inner"), || ()))
            .unwrap();

        assert!(matches!(inner, Err(ScopeError::NestedTrace { .. })));
        assert!(session.current().is_none());
    }

    #[test]
    fn panic_restores_slot() {
        let session = TraceSession::new();
        let result = session.run_traced(key("k"), || -> u32 { panic!("bad expression") });

        match result {
            Err(ScopeError::Computation { key, message }) => {
                assert_eq!(key, "scope#k");
                assert_eq!(message, "bad expression");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(!session.is_recording());

        // The session is still usable
        assert!(session.run_traced(key("k2"), || 1).is_ok());
    }

    #[test]
    fn attribution_builds_footprint() {
        let session = TraceSession::new();
        let record = Arc::new(DependencyRecord::new());

        assert!(session.attribute(&record).is_none());

        let (_, mut footprint) = session
            .run_traced(key("k"), || {
                let k = session.attribute(&record).unwrap();
                record.add_field_dependent("a", k.clone());
                session.attribute(&record);
                record.add_self_dependent(k);
            })
            .unwrap();

        assert_eq!(footprint.len(), 1);
        assert_eq!(record.edge_count(), 2);

        footprint.forget(&key("k"));
        assert!(record.is_empty());
        assert!(footprint.is_empty());
    }

    #[test]
    fn other_threads_wait_for_the_gate() {
        let session = Arc::new(TraceSession::new());

        let (handle, _) = session
            .run_traced(key("outer"), || {
                let session = Arc::clone(&session);
                // Not joined here: the gate is still held
                thread::spawn(move || {
                    session
                        .run_traced(key("inner"), || session.current())
                        .map(|(current, _)| current)
                })
            })
            .unwrap();

        let inner = handle.join().unwrap().unwrap();
        assert_eq!(inner, Some(key("inner")));
        assert!(session.current().is_none());
    }

    #[test]
    fn other_threads_are_not_attributed() {
        let session = Arc::new(TraceSession::new());
        let record = Arc::new(DependencyRecord::new());

        let (attributed, _) = session
            .run_traced(key("k"), || {
                let session = Arc::clone(&session);
                let record = Arc::clone(&record);
                thread::spawn(move || session.attribute(&record).is_some())
                    .join()
                    .unwrap()
            })
            .unwrap();

        assert!(!attributed);
    }
}
