//! Reactive Scopes
//!
//! This module implements the automatic-dependency engine behind template
//! bindings: scopes own data graphs, computations are traced against them,
//! and writes re-run exactly the computations that read what changed.
//!
//! # Concepts
//!
//! ## Nodes
//!
//! A [`Node`] is an object or array. Once wrapped, every read of one of its
//! fields during a traced computation records an edge in the node's
//! [`DependencyRecord`], and every write hands the recorded computations to
//! the change notifier.
//!
//! ## Traces
//!
//! A trace runs one computation with its key as the active trace. Reads are
//! attributed to that key. Only one trace records at a time.
//!
//! ## Scopes
//!
//! A [`Scope`] is the named unit the rendering layer uses: it owns a root
//! node and the computations (one per dynamic attribute or text binding)
//! traced against it.
//!
//! # Implementation Notes
//!
//! Nested data reads make the reader depend on every node along the path,
//! on the field read and on the identity of the nested node. Replacing a
//! whole sub-object therefore reaches readers that only ever touched a
//! leaf deep inside it.

mod context;
mod key;
mod ledger;
mod node;
mod registry;
mod runtime;
mod scope;
mod value;

pub use context::{TraceFootprint, TraceSession};
pub use key::{ScopeName, StaleKeys, TraceKey};
pub use ledger::DependencyRecord;
pub use node::{Node, NodeId, NodeKind, LENGTH, MAX_ARRAY_GAP};
pub use registry::ScopeRegistry;
pub use runtime::Runtime;
pub use scope::{RecomputeOutcome, Scope, ScopeInit, ScopeState};
pub use value::Value;
