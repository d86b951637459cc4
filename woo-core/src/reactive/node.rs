//! Tracked Nodes
//!
//! A [`Node`] is an object or an array in a scope graph. A freshly built
//! node is *detached*: reads and writes are plain. Wrapping a node attaches
//! a [`DependencyRecord`] and the runtime's graph hooks to it and to every
//! node reachable from it. From then on:
//!
//! - reads attribute a dependency to the recording trace, on the field and,
//!   when the value read is itself a node, on that node's identity;
//! - writes hand the field's dependents to the change notifier before the
//!   value is stored, and replacing a whole sub-object invalidates every
//!   node reachable from the old one;
//! - deletes notify both the field and the node's own dependents.
//!
//! Reading a field that does not exist yet on a tracked object creates it
//! as `Undefined`, so whoever read it first is notified once it is assigned.
//! Fields holding `Undefined` are not part of the node's shape: `keys`,
//! `len` and snapshots skip them, and assigning one a value notifies shape
//! readers like creating a new field does.
//!
//! Array indices and `length` are fields like any other. Operations that
//! change an array's length also notify the array's own dependents. An
//! array never grows by more than [`MAX_ARRAY_GAP`] elements in one write;
//! larger writes are logged and dropped.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::{Serialize, Serializer};
use serde_json::Value as JsonValue;

use super::context::TraceSession;
use super::key::StaleKeys;
use super::ledger::DependencyRecord;
use super::value::Value;
use crate::notify::ChangeNotifier;

/// Field name under which array length reads are recorded.
pub const LENGTH: &str = "length";

/// Largest number of elements a single index or `length` write may add.
pub const MAX_ARRAY_GAP: usize = 1 << 16;

/// Stamp counter for invalidation walks. Each walk writes a fresh stamp on
/// the nodes it visits, which makes the walk safe on cyclic graphs.
static WALK_STAMP: AtomicU64 = AtomicU64::new(0);

fn next_walk_stamp() -> u64 {
    WALK_STAMP.fetch_add(1, Ordering::Relaxed) + 1
}

/// Unique identifier for a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u64);

impl NodeId {
    /// Generate a new unique node ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether a node is an object or an array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Object,
    Array,
}

enum Body {
    Object(IndexMap<String, Value>),
    Array(Vec<Value>),
}

/// Connection from tracked nodes back to the runtime that tracks them.
pub(crate) struct GraphHooks {
    session: Arc<TraceSession>,
    notifier: Weak<ChangeNotifier>,
}

impl GraphHooks {
    pub(crate) fn new(session: Arc<TraceSession>, notifier: Weak<ChangeNotifier>) -> Self {
        Self { session, notifier }
    }

    /// Track `value` and everything reachable from it.
    ///
    /// Leaves and already tracked nodes are returned unchanged.
    pub(crate) fn wrap(self: &Arc<Self>, value: Value) -> Value {
        if let Value::Node(node) = &value {
            self.adopt(node);
        }
        value
    }

    fn adopt(self: &Arc<Self>, root: &Node) {
        let mut pending = vec![root.clone()];
        while let Some(node) = pending.pop() {
            if let Some(tracking) = node.inner.tracking.get() {
                if !Arc::ptr_eq(&tracking.hooks, self) {
                    tracing::warn!(node = node.id().raw(), "node is already tracked by another runtime");
                }
                continue;
            }
            let tracking = Tracking {
                hooks: Arc::clone(self),
                record: Arc::new(DependencyRecord::new()),
            };
            if node.inner.tracking.set(tracking).is_ok() {
                pending.extend(node.child_nodes());
            }
        }
    }

    fn notify(&self, keys: StaleKeys) {
        if keys.is_empty() {
            return;
        }
        if let Some(notifier) = self.notifier.upgrade() {
            notifier.notify(keys);
        }
    }

    /// Notify every dependent of every node reachable from `root`.
    fn invalidate_subtree(&self, root: &Node) {
        let stamp = next_walk_stamp();
        let mut stale = StaleKeys::new();
        let mut pending = vec![root.clone()];
        while let Some(node) = pending.pop() {
            if node.inner.stamp.swap(stamp, Ordering::Relaxed) == stamp {
                continue;
            }
            if let Some(tracking) = node.tracking() {
                stale.extend(tracking.record.all_dependents());
            }
            pending.extend(node.child_nodes());
        }
        tracing::trace!(root = root.id().raw(), keys = stale.len(), "sub-graph replaced");
        self.notify(stale);
    }
}

struct Tracking {
    hooks: Arc<GraphHooks>,
    record: Arc<DependencyRecord>,
}

struct NodeInner {
    id: NodeId,
    kind: NodeKind,
    body: RwLock<Body>,
    /// Set once, when the node is wrapped.
    tracking: OnceLock<Tracking>,
    /// Last invalidation walk that visited this node.
    stamp: AtomicU64,
}

/// An object or array in a scope graph. Cloning shares the node.
#[derive(Clone)]
pub struct Node {
    inner: Arc<NodeInner>,
}

impl Node {
    fn with_body(body: Body) -> Self {
        let kind = match body {
            Body::Object(_) => NodeKind::Object,
            Body::Array(_) => NodeKind::Array,
        };
        Self {
            inner: Arc::new(NodeInner {
                id: NodeId::new(),
                kind,
                body: RwLock::new(body),
                tracking: OnceLock::new(),
                stamp: AtomicU64::new(0),
            }),
        }
    }

    /// Create an empty detached object.
    pub fn object() -> Self {
        Self::with_body(Body::Object(IndexMap::new()))
    }

    /// Create an empty detached array.
    pub fn array() -> Self {
        Self::with_body(Body::Array(Vec::new()))
    }

    /// Create a detached object from key/value pairs.
    pub fn from_entries<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let map = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self::with_body(Body::Object(map))
    }

    /// Create a detached array from values.
    pub fn from_values<V: Into<Value>>(values: impl IntoIterator<Item = V>) -> Self {
        Self::with_body(Body::Array(values.into_iter().map(Into::into).collect()))
    }

    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    pub fn kind(&self) -> NodeKind {
        self.inner.kind
    }

    pub fn is_array(&self) -> bool {
        self.inner.kind == NodeKind::Array
    }

    /// Check if the node has been wrapped.
    pub fn is_tracked(&self) -> bool {
        self.inner.tracking.get().is_some()
    }

    /// Check if two handles refer to the same node.
    pub fn ptr_eq(&self, other: &Node) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// The node's dependency record, once wrapped.
    pub fn dependency_record(&self) -> Option<Arc<DependencyRecord>> {
        self.tracking().map(|tracking| Arc::clone(&tracking.record))
    }

    fn tracking(&self) -> Option<&Tracking> {
        self.inner.tracking.get()
    }

    fn child_nodes(&self) -> Vec<Node> {
        match &*self.inner.body.read() {
            Body::Object(map) => map.values().filter_map(|v| v.as_node().cloned()).collect(),
            Body::Array(items) => items.iter().filter_map(|v| v.as_node().cloned()).collect(),
        }
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Read a field.
    ///
    /// On arrays, `field` may be an index or `length`.
    pub fn get(&self, field: &str) -> Value {
        let Some(tracking) = self.tracking() else {
            return self.read_field(field, false);
        };
        if let Some(key) = tracking.hooks.session.attribute(&tracking.record) {
            tracking.record.add_field_dependent(field, key);
        }
        let value = self.read_field(field, true);
        self.track_identity(&value);
        value
    }

    /// Read an array element.
    pub fn index(&self, index: usize) -> Value {
        self.get(&index.to_string())
    }

    /// Read a field without recording a dependency.
    pub fn get_untracked(&self, field: &str) -> Value {
        self.read_field(field, false)
    }

    /// Check if the field holds a value other than `Undefined`.
    pub fn contains(&self, field: &str) -> bool {
        self.record_field_read(field);
        !self.read_field(field, false).is_undefined()
    }

    /// Number of elements of an array, or of fields of an object.
    ///
    /// Array reads depend on `length`; object reads depend on the shape.
    pub fn len(&self) -> usize {
        match &*self.inner.body.read() {
            Body::Array(items) => {
                self.record_field_read(LENGTH);
                items.len()
            }
            Body::Object(map) => {
                self.record_shape_read();
                map.values().filter(|v| !v.is_undefined()).count()
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Field names (indices for arrays). Depends on the node's shape.
    pub fn keys(&self) -> Vec<String> {
        self.record_shape_read();
        self.keys_untracked()
    }

    /// Field names without recording a dependency.
    pub fn keys_untracked(&self) -> Vec<String> {
        match &*self.inner.body.read() {
            Body::Object(map) => map
                .iter()
                .filter(|(_, v)| !v.is_undefined())
                .map(|(k, _)| k.clone())
                .collect(),
            Body::Array(items) => (0..items.len()).map(|i| i.to_string()).collect(),
        }
    }

    fn record_field_read(&self, field: &str) {
        if let Some(tracking) = self.tracking() {
            if let Some(key) = tracking.hooks.session.attribute(&tracking.record) {
                tracking.record.add_field_dependent(field, key);
            }
        }
    }

    fn record_shape_read(&self) {
        if let Some(tracking) = self.tracking() {
            if let Some(key) = tracking.hooks.session.attribute(&tracking.record) {
                tracking.record.add_self_dependent(key);
            }
        }
    }

    /// A reader of a nested node depends on that node's identity.
    fn track_identity(&self, value: &Value) {
        if let Value::Node(node) = value {
            node.record_shape_read();
        }
    }

    fn read_field(&self, field: &str, materialize: bool) -> Value {
        {
            let body = self.inner.body.read();
            match &*body {
                Body::Object(map) => {
                    if let Some(value) = map.get(field) {
                        return value.clone();
                    }
                }
                Body::Array(items) => {
                    if field == LENGTH {
                        return Value::from(items.len());
                    }
                    return parse_index(field)
                        .and_then(|i| items.get(i).cloned())
                        .unwrap_or_default();
                }
            }
        }
        if !materialize {
            return Value::Undefined;
        }
        match &mut *self.inner.body.write() {
            Body::Object(map) => map.entry(field.to_string()).or_default().clone(),
            Body::Array(_) => Value::Undefined,
        }
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Assign a field.
    ///
    /// On arrays, `field` may be an index or `length`; other names are
    /// ignored. Assigning the value already stored is a no-op.
    pub fn set(&self, field: &str, value: impl Into<Value>) {
        let value = value.into();
        if self.is_array() {
            if field == LENGTH {
                if let Some(len) = value.as_f64().filter(|n| *n >= 0.0 && n.fract() == 0.0) {
                    self.set_len(len as usize);
                }
            } else if let Some(index) = parse_index(field) {
                self.set_index(index, value);
            }
            return;
        }

        let existing = match &*self.inner.body.read() {
            Body::Object(map) => map.get(field).cloned(),
            Body::Array(_) => None,
        };
        if existing.as_ref() == Some(&value) {
            return;
        }
        // Materialized fields hold `Undefined` and are not part of the shape
        let was_present = existing.as_ref().is_some_and(|v| !v.is_undefined());
        let shape_changed = was_present == value.is_undefined();
        self.notify_with(|record| {
            let mut stale = record.field_dependents(field);
            if shape_changed {
                stale.extend(record.self_dependents());
            }
            stale
        });

        let value = self.adopt_value(value);
        let old = match &mut *self.inner.body.write() {
            Body::Object(map) => map.insert(field.to_string(), value),
            Body::Array(_) => None,
        };
        self.release_value(old);
    }

    /// Assign an array element. Assigning past the end grows the array,
    /// filling the gap with `Undefined`.
    pub fn set_index(&self, index: usize, value: impl Into<Value>) {
        let value = value.into();
        let (current, len) = match &*self.inner.body.read() {
            Body::Array(items) => (items.get(index).cloned(), items.len()),
            Body::Object(_) => return,
        };
        if current.as_ref() == Some(&value) {
            return;
        }
        if index.saturating_sub(len) >= MAX_ARRAY_GAP {
            tracing::warn!(node = self.id().raw(), index, len, "array index too far past the end, write dropped");
            return;
        }
        self.notify_with(|record| {
            let mut stale = record.field_dependents(&index.to_string());
            if index >= len {
                stale.extend(span_dependents(record, len, index + 1));
            }
            stale
        });

        let value = self.adopt_value(value);
        let old = match &mut *self.inner.body.write() {
            Body::Array(items) => {
                if index >= items.len() {
                    items.resize(index + 1, Value::Undefined);
                }
                Some(std::mem::replace(&mut items[index], value))
            }
            Body::Object(_) => None,
        };
        self.release_value(old);
    }

    /// Delete a field and return its value.
    ///
    /// Notifies the field's dependents and the node's own dependents.
    /// Deleting an array index leaves an `Undefined` hole.
    pub fn delete(&self, field: &str) -> Value {
        if self.is_array() {
            return match parse_index(field) {
                Some(index) if index < self.len_untracked() => {
                    self.notify_with(|record| {
                        let mut stale = record.field_dependents(field);
                        stale.extend(record.self_dependents());
                        stale
                    });
                    let old = match &mut *self.inner.body.write() {
                        Body::Array(items) => items
                            .get_mut(index)
                            .map(std::mem::take)
                            .unwrap_or_default(),
                        Body::Object(_) => Value::Undefined,
                    };
                    self.release_value(Some(old.clone()));
                    old
                }
                _ => Value::Undefined,
            };
        }

        self.notify_with(|record| {
            let mut stale = record.field_dependents(field);
            stale.extend(record.self_dependents());
            stale
        });
        let old = match &mut *self.inner.body.write() {
            Body::Object(map) => map.shift_remove(field),
            Body::Array(_) => None,
        };
        self.release_value(old.clone());
        old.unwrap_or_default()
    }

    // ------------------------------------------------------------------
    // Array operations
    // ------------------------------------------------------------------

    /// Append an element.
    pub fn push(&self, value: impl Into<Value>) {
        let len = self.len_untracked();
        self.insert(len, value);
    }

    /// Insert an element at `index`, shifting later elements. An index
    /// past the end appends.
    pub fn insert(&self, index: usize, value: impl Into<Value>) {
        if !self.is_array() {
            return;
        }
        let len = self.len_untracked();
        let index = index.min(len);
        self.notify_with(|record| span_dependents(record, index, len + 1));

        let value = self.adopt_value(value.into());
        if let Body::Array(items) = &mut *self.inner.body.write() {
            items.insert(index.min(items.len()), value);
        }
        self.record_new_indices(len, len + 1);
    }

    /// Remove and return the last element.
    pub fn pop(&self) -> Value {
        match self.len_untracked() {
            0 => Value::Undefined,
            len => self.remove(len - 1),
        }
    }

    /// Remove and return the element at `index`, shifting later elements.
    pub fn remove(&self, index: usize) -> Value {
        let len = self.len_untracked();
        if !self.is_array() || index >= len {
            return Value::Undefined;
        }
        self.notify_with(|record| span_dependents(record, index, len));

        let old = match &mut *self.inner.body.write() {
            Body::Array(items) if index < items.len() => items.remove(index),
            _ => Value::Undefined,
        };
        self.release_value(Some(old.clone()));
        old
    }

    /// Shorten the array to `len` elements.
    pub fn truncate(&self, len: usize) {
        let current = self.len_untracked();
        if !self.is_array() || len >= current {
            return;
        }
        self.notify_with(|record| span_dependents(record, len, current));

        let removed: Vec<Value> = match &mut *self.inner.body.write() {
            Body::Array(items) => items.drain(len.min(items.len())..).collect(),
            Body::Object(_) => Vec::new(),
        };
        for old in removed {
            self.release_value(Some(old));
        }
    }

    /// Remove every element of the array.
    pub fn clear(&self) {
        self.truncate(0);
    }

    fn set_len(&self, len: usize) {
        let current = self.len_untracked();
        if len < current {
            self.truncate(len);
        } else if len - current > MAX_ARRAY_GAP {
            tracing::warn!(node = self.id().raw(), len, current, "array length grows too far, write dropped");
        } else if len > current {
            self.notify_with(|record| span_dependents(record, current, len));
            if let Body::Array(items) = &mut *self.inner.body.write() {
                items.resize(len, Value::Undefined);
            }
            self.record_new_indices(current, len);
        }
    }

    fn len_untracked(&self) -> usize {
        match &*self.inner.body.read() {
            Body::Array(items) => items.len(),
            Body::Object(map) => map.values().filter(|v| !v.is_undefined()).count(),
        }
    }

    /// A trace that grows an array depends on the indices it introduced.
    fn record_new_indices(&self, from: usize, to: usize) {
        for index in from..to {
            self.record_field_read(&index.to_string());
        }
    }

    // ------------------------------------------------------------------
    // Tracking helpers
    // ------------------------------------------------------------------

    fn notify_with(&self, stale: impl FnOnce(&DependencyRecord) -> StaleKeys) {
        if let Some(tracking) = self.tracking() {
            tracking.hooks.notify(stale(&tracking.record));
        }
    }

    /// Values stored into a tracked node become tracked too.
    fn adopt_value(&self, value: Value) -> Value {
        match self.tracking() {
            Some(tracking) => tracking.hooks.wrap(value),
            None => value,
        }
    }

    /// A node leaving a tracked graph invalidates everything under it.
    fn release_value(&self, old: Option<Value>) {
        if let (Some(tracking), Some(Value::Node(old))) = (self.tracking(), old) {
            tracking.hooks.invalidate_subtree(&old);
        }
    }

    // ------------------------------------------------------------------
    // Snapshots
    // ------------------------------------------------------------------

    /// Untracked deep copy as JSON. Cycles are cut with `null`; object
    /// fields holding `Undefined` are omitted.
    pub fn snapshot(&self) -> JsonValue {
        self.snapshot_into(&mut Vec::new())
    }

    pub(crate) fn snapshot_into(&self, path: &mut Vec<NodeId>) -> JsonValue {
        if path.contains(&self.id()) {
            return JsonValue::Null;
        }
        path.push(self.id());
        let json = match &*self.inner.body.read() {
            Body::Object(map) => JsonValue::Object(
                map.iter()
                    .filter(|(_, v)| !v.is_undefined())
                    .map(|(k, v)| (k.clone(), v.snapshot_into(path)))
                    .collect(),
            ),
            Body::Array(items) => {
                JsonValue::Array(items.iter().map(|v| v.snapshot_into(path)).collect())
            }
        };
        path.pop();
        json
    }
}

/// Dependents affected by a length change touching indices `from..to`.
fn span_dependents(record: &DependencyRecord, from: usize, to: usize) -> StaleKeys {
    let mut stale = record.self_dependents();
    stale.extend(record.field_dependents(LENGTH));
    for index in from..to {
        stale.extend(record.field_dependents(&index.to_string()));
    }
    stale
}

/// Parse a canonical array index ("0", "17"; not "01" or "+1").
fn parse_index(field: &str) -> Option<usize> {
    let index: usize = field.parse().ok()?;
    (index.to_string() == field).then_some(index)
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.inner.id.raw())
            .field("kind", &self.inner.kind)
            .field("tracked", &self.is_tracked())
            .finish()
    }
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.snapshot().serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::key::TraceKey;
    use serde_json::json;

    fn hooks() -> Arc<GraphHooks> {
        Arc::new(GraphHooks::new(Arc::new(TraceSession::new()), Weak::new()))
    }

    fn key(name: &str) -> TraceKey {
        TraceKey::new("scope".into(), name)
    }

    fn tracked(hooks: &Arc<GraphHooks>, data: JsonValue) -> Node {
        match hooks.wrap(Value::from(data)) {
            Value::Node(node) => node,
            other => panic!("expected node, got {other:?}"),
        }
    }

    #[test]
    fn wrapping_is_idempotent() {
        let hooks = hooks();
        let node = tracked(&hooks, json!({"a": {"b": 1}}));
        let record = node.dependency_record().unwrap();

        let again = hooks.wrap(Value::Node(node.clone()));
        assert_eq!(again, Value::Node(node.clone()));
        assert!(Arc::ptr_eq(&record, &node.dependency_record().unwrap()));
        assert!(node.get_untracked("a").as_node().unwrap().is_tracked());
    }

    #[test]
    fn detached_nodes_do_not_track() {
        let node = Node::object();
        node.set("a", 1);
        assert_eq!(node.get("a"), Value::from(1));
        assert!(!node.is_tracked());
        assert!(node.dependency_record().is_none());
    }

    #[test]
    fn reads_record_field_and_identity_edges() {
        let hooks = hooks();
        let root = tracked(&hooks, json!({"obj": {"x": 1}}));

        let (_, _) = hooks
            .session
            .run_traced(key("k"), || root.get("obj").get("x"))
            .unwrap();

        let root_record = root.dependency_record().unwrap();
        assert!(root_record.field_dependents("obj").contains(&key("k")));

        let obj = root.get_untracked("obj");
        let obj_record = obj.as_node().unwrap().dependency_record().unwrap();
        assert!(obj_record.self_dependents().contains(&key("k")));
        assert!(obj_record.field_dependents("x").contains(&key("k")));
    }

    #[test]
    fn reads_outside_a_trace_record_nothing() {
        let hooks = hooks();
        let root = tracked(&hooks, json!({"a": 1}));
        assert_eq!(root.get("a"), Value::from(1));
        assert!(root.dependency_record().unwrap().is_empty());
    }

    #[test]
    fn undeclared_fields_materialize_on_read() {
        let hooks = hooks();
        let root = tracked(&hooks, json!({}));

        let (value, _) = hooks.session.run_traced(key("k"), || root.get("b")).unwrap();

        assert!(value.is_undefined());
        // The placeholder is not part of the shape
        assert!(root.keys().is_empty());
        assert_eq!(root.len(), 0);
        assert_eq!(root.snapshot(), json!({}));
        assert!(root
            .dependency_record()
            .unwrap()
            .field_dependents("b")
            .contains(&key("k")));
    }

    #[test]
    fn stored_values_are_wrapped() {
        let hooks = hooks();
        let root = tracked(&hooks, json!({}));
        root.set("child", Value::from(json!({"deep": [1, {"x": 2}]})));

        let deep = root.get_untracked("child").get("deep");
        let inner = deep.as_node().unwrap().get_untracked("1");
        assert!(inner.as_node().unwrap().is_tracked());
    }

    #[test]
    fn cyclic_graphs_wrap_and_snapshot() {
        let hooks = hooks();
        let a = Node::object();
        let b = Node::object();
        a.set("b", b.clone());
        b.set("a", a.clone());

        hooks.wrap(Value::Node(a.clone()));
        assert!(a.is_tracked());
        assert!(b.is_tracked());
        assert_eq!(a.snapshot(), json!({"b": {"a": null}}));

        // Replacing inside a cycle terminates
        a.set("b", 1);
        assert_eq!(a.get_untracked("b"), Value::from(1));
    }

    #[test]
    fn array_fields() {
        let hooks = hooks();
        let arr = tracked(&hooks, json!([10, 20]));

        assert_eq!(arr.get("length"), Value::from(2));
        assert_eq!(arr.index(1), Value::from(20));
        assert!(arr.get("5").is_undefined());
        assert!(arr.get("01").is_undefined());

        arr.set_index(3, 40);
        assert_eq!(arr.snapshot(), json!([10, 20, null, 40]));

        arr.set("length", 1);
        assert_eq!(arr.snapshot(), json!([10]));

        arr.push(11);
        arr.insert(0, 9);
        assert_eq!(arr.snapshot(), json!([9, 10, 11]));
        assert_eq!(arr.remove(1), Value::from(10));
        assert_eq!(arr.pop(), Value::from(11));
        assert_eq!(arr.pop(), Value::from(9));
        assert!(arr.pop().is_undefined());
        assert!(arr.is_empty());
    }

    #[test]
    fn growing_inside_a_trace_records_new_indices() {
        let hooks = hooks();
        let arr = tracked(&hooks, json!([]));

        hooks.session.run_traced(key("k"), || arr.push(1)).unwrap();

        assert!(arr
            .dependency_record()
            .unwrap()
            .field_dependents("0")
            .contains(&key("k")));
    }

    #[test]
    fn delete_removes_fields() {
        let hooks = hooks();
        let root = tracked(&hooks, json!({"a": 1, "b": 2}));
        assert_eq!(root.delete("a"), Value::from(1));
        assert!(root.delete("missing").is_undefined());
        assert_eq!(root.keys(), vec!["b".to_string()]);

        let arr = tracked(&hooks, json!([1, 2]));
        assert_eq!(arr.delete("0"), Value::from(1));
        assert_eq!(arr.snapshot(), json!([null, 2]));
    }

    #[test]
    fn materialized_fields_join_the_shape_once_assigned() {
        let hooks = hooks();
        let root = tracked(&hooks, json!({"a": 1}));
        let record = root.dependency_record().unwrap();

        hooks.session.run_traced(key("keys"), || root.keys()).unwrap();
        hooks.session.run_traced(key("b"), || root.get("b")).unwrap();
        assert_eq!(root.keys_untracked(), vec!["a".to_string()]);

        assert!(record.self_dependents().contains(&key("keys")));
        root.set("b", 2);
        assert_eq!(root.keys_untracked(), vec!["a".to_string(), "b".to_string()]);
        root.set("b", 3);
        root.set("b", Value::Undefined);
        assert_eq!(root.len(), 1);
    }

    #[test]
    fn oversized_array_writes_are_dropped() {
        let hooks = hooks();
        let arr = tracked(&hooks, json!([1]));

        arr.set("18446744073709551615", 2);
        arr.set_index(usize::MAX, 2);
        arr.set_index(1 + MAX_ARRAY_GAP, 2);
        arr.set("length", 4_000_000_000_i64);
        assert_eq!(arr.snapshot(), json!([1]));

        // Growth up to the cap still works
        arr.set_index(MAX_ARRAY_GAP, 2);
        assert_eq!(arr.len(), MAX_ARRAY_GAP + 1);
        arr.set("length", 2);
        assert_eq!(arr.snapshot(), json!([1, null]));
    }

    #[test]
    fn parse_index_is_canonical() {
        assert_eq!(parse_index("0"), Some(0));
        assert_eq!(parse_index("42"), Some(42));
        assert_eq!(parse_index("042"), None);
        assert_eq!(parse_index("+1"), None);
        assert_eq!(parse_index("length"), None);
    }
}
