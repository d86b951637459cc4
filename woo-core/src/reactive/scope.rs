//! Scopes
//!
//! A scope is the named facade the rendering layer talks to. Each
//! component or element instance owns one. It holds:
//!
//! - a root node, wrapped for tracking, that bindings read and write;
//! - the traced computations registered against it, by key;
//! - optionally, a parent scope consulted for fields the scope does not
//!   define itself.
//!
//! # Lifecycle
//!
//! `Unregistered → Active → Released`. A scope becomes active when the
//! runtime registers it under its name. [`Scope::release`] removes it from
//! the registry and drops its computations; notices still pending for it
//! are discarded by the next batch tick.

use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};

use indexmap::IndexSet;
use parking_lot::{Mutex, RwLock};

use super::context::{TraceFootprint, TraceSession};
use super::key::{ScopeName, TraceKey};
use super::node::{GraphHooks, Node};
use super::registry::ScopeRegistry;
use super::value::Value;
use crate::config::DependencyPolicy;
use crate::error::{panic_message, Result, ScopeError};

type CalcFn = Box<dyn Fn(&Scope) -> Value + Send + Sync>;
type ChangedFn = Box<dyn Fn(Value) + Send + Sync>;

/// Initial value of a scope's root.
pub enum ScopeInit {
    /// Plain data. Must be an object or an array.
    Data(Value),
    /// Builds the root when the scope is created.
    Constructor(Box<dyn FnOnce() -> Value + Send>),
}

impl ScopeInit {
    /// Build the root with `f` when the scope is created.
    pub fn constructor(f: impl FnOnce() -> Value + Send + 'static) -> Self {
        ScopeInit::Constructor(Box::new(f))
    }

    /// An empty object root.
    pub fn empty() -> Self {
        ScopeInit::Data(Value::Node(Node::object()))
    }
}

impl Default for ScopeInit {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<Value> for ScopeInit {
    fn from(value: Value) -> Self {
        ScopeInit::Data(value)
    }
}

impl From<Node> for ScopeInit {
    fn from(node: Node) -> Self {
        ScopeInit::Data(Value::Node(node))
    }
}

impl From<serde_json::Value> for ScopeInit {
    fn from(json: serde_json::Value) -> Self {
        ScopeInit::Data(Value::from(json))
    }
}

/// Lifecycle state of a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeState {
    Unregistered,
    Active,
    Released,
}

/// Result of re-running one traced computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecomputeOutcome {
    /// The computation ran and its callback was invoked.
    Recomputed,
    /// The computation or its callback panicked.
    Failed,
    /// No computation is registered under the key.
    Untraced,
}

struct TracedCall {
    calc: CalcFn,
    on_changed: ChangedFn,
    /// Records holding edges of this key.
    footprint: Mutex<TraceFootprint>,
}

/// A named container owning one reactive data graph and the computations
/// traced against it.
pub struct Scope {
    name: ScopeName,
    root: Node,
    parent: Option<Arc<Scope>>,
    session: Arc<TraceSession>,
    registry: Weak<ScopeRegistry>,
    policy: DependencyPolicy,
    state: RwLock<ScopeState>,
    traces: RwLock<HashMap<Arc<str>, Arc<TracedCall>>>,
    init_error: Option<ScopeError>,
}

impl Scope {
    pub(crate) fn new(
        name: ScopeName,
        init: ScopeInit,
        parent: Option<Arc<Scope>>,
        hooks: &Arc<GraphHooks>,
        session: Arc<TraceSession>,
        registry: Weak<ScopeRegistry>,
        policy: DependencyPolicy,
    ) -> Self {
        let (root, init_error) = match build_root(&name, init) {
            Ok(root) => (root, None),
            Err(err) => {
                tracing::error!(scope = %name, error = %err, "falling back to an empty root");
                (Node::object(), Some(err))
            }
        };
        hooks.wrap(Value::Node(root.clone()));

        tracing::debug!(scope = %name, parent = ?parent.as_ref().map(|p| p.name()), "new scope");

        Self {
            name,
            root,
            parent,
            session,
            registry,
            policy,
            state: RwLock::new(ScopeState::Unregistered),
            traces: RwLock::new(HashMap::new()),
            init_error,
        }
    }

    pub fn name(&self) -> &ScopeName {
        &self.name
    }

    /// The tracked root node. Bindings read and write through it.
    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn parent(&self) -> Option<&Arc<Scope>> {
        self.parent.as_ref()
    }

    pub fn state(&self) -> ScopeState {
        *self.state.read()
    }

    pub fn is_active(&self) -> bool {
        self.state() == ScopeState::Active
    }

    /// The error recorded if the initial value could not become the root.
    pub fn init_error(&self) -> Option<&ScopeError> {
        self.init_error.as_ref()
    }

    pub(crate) fn activate(&self) {
        let mut state = self.state.write();
        if *state == ScopeState::Unregistered {
            *state = ScopeState::Active;
        }
    }

    /// Number of registered computations.
    pub fn trace_count(&self) -> usize {
        self.traces.read().len()
    }

    pub fn is_traced(&self, key: &str) -> bool {
        self.traces.read().contains_key(key)
    }

    /// Register `calc` under `key`, run it under tracking and return its
    /// result.
    ///
    /// Whenever a field read by `calc` changes, `calc` re-runs on the next
    /// batch tick and `on_changed` receives the new result. Registering an
    /// existing key replaces the previous registration.
    pub fn trace_call<F, R, C>(&self, key: &str, calc: F, on_changed: C) -> Result<Value>
    where
        F: Fn(&Scope) -> R + Send + Sync + 'static,
        R: Into<Value>,
        C: Fn(Value) + Send + Sync + 'static,
    {
        if self.state() == ScopeState::Released {
            return Err(ScopeError::Released(self.name.to_string()));
        }
        let trace_key = TraceKey::new(self.name.clone(), key);
        if let Some(active) = self.session.current() {
            return Err(ScopeError::NestedTrace {
                active: active.to_string(),
                requested: trace_key.to_string(),
            });
        }

        let call = Arc::new(TracedCall {
            calc: Box::new(move |scope: &Scope| calc(scope).into()),
            on_changed: Box::new(on_changed),
            footprint: Mutex::new(TraceFootprint::default()),
        });
        let previous = self.traces.write().insert(Arc::from(key), Arc::clone(&call));
        if let Some(previous) = previous {
            let footprint = std::mem::take(&mut *previous.footprint.lock());
            call.footprint.lock().merge(footprint);
        }

        self.run(&trace_key, &call)
    }

    /// Stop tracing `key`. Returns `false` if it was not registered.
    pub fn untrace_call(&self, key: &str) -> bool {
        let Some(call) = self.traces.write().remove(key) else {
            return false;
        };
        call.footprint
            .lock()
            .forget(&TraceKey::new(self.name.clone(), key));
        true
    }

    /// Re-run the computation registered under `key` and pass its result to
    /// the callback. Called by the change notifier on each batch tick.
    pub fn recompute(&self, key: &str) -> RecomputeOutcome {
        if !self.is_active() {
            return RecomputeOutcome::Untraced;
        }
        let Some(call) = self.traces.read().get(key).cloned() else {
            return RecomputeOutcome::Untraced;
        };
        let trace_key = TraceKey::new(self.name.clone(), key);
        if self.policy == DependencyPolicy::Prune {
            call.footprint.lock().forget(&trace_key);
        }

        let Ok(value) = self.run(&trace_key, &call) else {
            return RecomputeOutcome::Failed;
        };
        match panic::catch_unwind(AssertUnwindSafe(|| (call.on_changed)(value))) {
            Ok(()) => RecomputeOutcome::Recomputed,
            Err(payload) => {
                tracing::error!(
                    scope = %self.name,
                    key,
                    message = %panic_message(payload.as_ref()),
                    "change callback panicked"
                );
                RecomputeOutcome::Failed
            }
        }
    }

    fn run(&self, key: &TraceKey, call: &TracedCall) -> Result<Value> {
        match self.session.run_traced(key.clone(), || (call.calc)(self)) {
            Ok((value, footprint)) => {
                call.footprint.lock().merge(footprint);
                Ok(value)
            }
            Err(err) => {
                tracing::error!(scope = %self.name, key = key.name(), error = %err, "computation failed");
                Err(err)
            }
        }
    }

    /// Remove the scope from the registry and drop its computations.
    ///
    /// Idempotent. Notices still pending for the scope are discarded.
    pub fn release(&self) {
        {
            let mut state = self.state.write();
            if *state == ScopeState::Released {
                return;
            }
            *state = ScopeState::Released;
        }
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self);
        }
        let calls: Vec<_> = self.traces.write().drain().collect();
        for (key, call) in calls {
            call.footprint
                .lock()
                .forget(&TraceKey::new(self.name.clone(), key));
        }
        tracing::debug!(scope = %self.name, "scope released");
    }

    /// Read a field from this scope, falling back to the parent chain when
    /// the scope does not define it.
    ///
    /// The read is tracked on every scope consulted, so assigning the field
    /// on this scope later (shadowing the parent) also notifies.
    pub fn lookup(&self, field: &str) -> Value {
        let value = self.root.get(field);
        match &self.parent {
            Some(parent) if value.is_undefined() => parent.lookup(field),
            _ => value,
        }
    }

    /// Field names of this scope's root and of every ancestor's root,
    /// nearest first, without duplicates. Untracked.
    pub fn members_deep(&self) -> Vec<String> {
        let mut members = IndexSet::new();
        let mut scope = Some(self);
        while let Some(current) = scope {
            members.extend(current.root.keys_untracked());
            scope = current.parent.as_deref();
        }
        members.into_iter().collect()
    }
}

fn build_root(name: &ScopeName, init: ScopeInit) -> Result<Node> {
    let value = match init {
        ScopeInit::Data(value) => value,
        ScopeInit::Constructor(construct) => {
            panic::catch_unwind(AssertUnwindSafe(construct)).map_err(|payload| {
                ScopeError::UnwrappableRoot {
                    scope: name.to_string(),
                    reason: format!("constructor panicked: {}", panic_message(payload.as_ref())),
                }
            })?
        }
    };
    match value {
        Value::Node(node) => Ok(node),
        other => Err(ScopeError::UnwrappableRoot {
            scope: name.to_string(),
            reason: format!("expected an object, got {other:?}"),
        }),
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("name", &self.name)
            .field("state", &self.state())
            .field("traces", &self.trace_count())
            .field("parent", &self.parent.as_ref().map(|p| p.name().clone()))
            .finish()
    }
}
