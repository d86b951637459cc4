//! Woo Core
//!
//! This crate provides the reactive scope engine used to render
//! WebComponents off the UI thread. Template expressions are evaluated
//! against scopes, and re-evaluated automatically whenever the data they
//! read changes, without declaring dependencies.
//!
//! It implements:
//!
//! - Tracked data graphs (objects and arrays) with per-field dependency
//!   bookkeeping
//! - Traced computations with automatic dependency capture
//! - Time-batched change notification that coalesces bursts of writes
//! - Named scopes with a parent fallback chain
//!
//! # Architecture
//!
//! - `reactive`: values, nodes, dependency records, traces, scopes
//! - `notify`: the batching change notifier and its tokio ticker
//! - `config`: runtime configuration
//! - `codec`: MessagePack payloads for posting results to the main thread
//!
//! # Example
//!
//! ```rust
//! use serde_json::json;
//! use woo_core::reactive::{Runtime, Value};
//!
//! let runtime = Runtime::new();
//! let scope = runtime.create_scope("cid-1", json!({"count": 1})).unwrap();
//!
//! // Trace a binding
//! let initial = scope
//!     .trace_call("count-text", |s| s.root().get("count"), |v| println!("count: {v:?}"))
//!     .unwrap();
//! assert_eq!(initial, Value::from(1));
//!
//! // Write, then run one batch tick
//! scope.root().set("count", 2);
//! let report = runtime.flush();
//! assert_eq!(report.recomputed, 1);
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod notify;
pub mod reactive;

pub use config::{DependencyPolicy, RuntimeConfig};
pub use error::{Result, ScopeError};
