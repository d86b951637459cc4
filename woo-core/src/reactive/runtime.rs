//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects scopes, the trace
//! session and the change notifier.
//!
//! # How It Works
//!
//! 1. Scopes are created through the runtime, which wraps their root and
//!    registers them under their name.
//!
//! 2. While a computation traced by a scope runs, the runtime's trace
//!    session attributes every tracked read to it.
//!
//! 3. When a tracked field is written, its dependents are handed to the
//!    runtime's change notifier.
//!
//! 4. On each batch tick (the ticker task, or an explicit [`Runtime::flush`])
//!    the notifier recomputes every stale computation once.
//!
//! # Ownership
//!
//! Nothing here is a process-wide global. Each runtime owns its registry,
//! session and notifier; tracked nodes reach them through shared graph
//! hooks that hold the notifier weakly, so dropping the runtime tears the
//! whole engine down.

use std::sync::Arc;

use super::context::TraceSession;
use super::key::ScopeName;
use super::node::GraphHooks;
use super::registry::ScopeRegistry;
use super::scope::{Scope, ScopeInit};
use super::value::Value;
use crate::config::RuntimeConfig;
use crate::error::{Result, ScopeError};
use crate::notify::{BatchTicker, ChangeNotifier, DispatchReport};

/// Owner of a set of scopes and of the machinery that keeps them current.
pub struct Runtime {
    config: RuntimeConfig,
    registry: Arc<ScopeRegistry>,
    session: Arc<TraceSession>,
    notifier: Arc<ChangeNotifier>,
    hooks: Arc<GraphHooks>,
}

impl Runtime {
    /// Create a runtime with the default configuration.
    pub fn new() -> Self {
        Self::build(RuntimeConfig::default())
    }

    /// Create a runtime with a validated configuration.
    pub fn with_config(config: RuntimeConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: RuntimeConfig) -> Self {
        let registry = Arc::new(ScopeRegistry::new());
        let session = Arc::new(TraceSession::new());
        let notifier = Arc::new(ChangeNotifier::new(
            Arc::clone(&registry),
            config.batch_interval(),
        ));
        let hooks = Arc::new(GraphHooks::new(
            Arc::clone(&session),
            Arc::downgrade(&notifier),
        ));

        Self {
            config,
            registry,
            session,
            notifier,
            hooks,
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Create and register a scope.
    ///
    /// An initial value that is not an object does not fail creation: the
    /// scope gets an empty root and records the problem in
    /// [`Scope::init_error`].
    pub fn create_scope(
        &self,
        name: impl Into<ScopeName>,
        init: impl Into<ScopeInit>,
    ) -> Result<Arc<Scope>> {
        self.register(name.into(), init.into(), None)
    }

    /// Create and register a scope that falls back to `parent` for fields
    /// it does not define.
    pub fn create_child_scope(
        &self,
        name: impl Into<ScopeName>,
        init: impl Into<ScopeInit>,
        parent: &Arc<Scope>,
    ) -> Result<Arc<Scope>> {
        if !parent.is_active() {
            return Err(ScopeError::Released(parent.name().to_string()));
        }
        self.register(name.into(), init.into(), Some(Arc::clone(parent)))
    }

    fn register(
        &self,
        name: ScopeName,
        init: ScopeInit,
        parent: Option<Arc<Scope>>,
    ) -> Result<Arc<Scope>> {
        if self.registry.contains(name.as_str()) {
            return Err(ScopeError::DuplicateScope(name.to_string()));
        }
        let scope = Arc::new(Scope::new(
            name,
            init,
            parent,
            &self.hooks,
            Arc::clone(&self.session),
            Arc::downgrade(&self.registry),
            self.config.dependency_policy,
        ));
        self.registry.register(Arc::clone(&scope))?;
        Ok(scope)
    }

    /// Look up an active scope by name.
    pub fn scope(&self, name: &str) -> Option<Arc<Scope>> {
        self.registry.get(name)
    }

    pub fn registry(&self) -> &Arc<ScopeRegistry> {
        &self.registry
    }

    pub fn notifier(&self) -> &Arc<ChangeNotifier> {
        &self.notifier
    }

    pub fn session(&self) -> &Arc<TraceSession> {
        &self.session
    }

    /// Track `value` and everything reachable from it.
    ///
    /// Idempotent: wrapping an already tracked value returns it unchanged.
    pub fn wrap(&self, value: impl Into<Value>) -> Value {
        self.hooks.wrap(value.into())
    }

    /// Run one batch tick now.
    pub fn flush(&self) -> DispatchReport {
        self.notifier.flush()
    }

    /// Spawn the background task that flushes on every batch interval.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn_ticker(&self) -> BatchTicker {
        BatchTicker::spawn(&self.notifier)
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("config", &self.config)
            .field("scopes", &self.registry.len())
            .field("notifier", &self.notifier)
            .finish()
    }
}
