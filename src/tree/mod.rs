//! Attribute tree data structures.
//!
//! The tree mirrors the connectivity backend's object model: containers
//! (garage, vehicles, domains) hold named children in insertion order, leaves
//! hold a typed value. Every node carries its own lock, so a write to one
//! vehicle's attribute never blocks a read of another.
//!
//! Structure and values only change through [`AttributeTree::apply`] (backend
//! refresh results and pushes) and [`AttributeNode::commit`] (successful
//! `set`). Both report every observed difference to a sink as a [`Mutation`]
//! after it is committed.

use crate::cache::FlightSlot;
use crate::error::ShellError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::time::Instant;

// Sub-modules
pub mod completion;
pub mod path;
pub mod resolve;

pub use path::{NodePath, Path};

/// Enumeration attribute type (lock state, climatisation command, ...).
///
/// Usually implemented with `#[derive(EnumValue)]`.
pub trait EnumValue: Copy + Sized + 'static {
    /// All accepted string forms, in declaration order.
    const VARIANTS: &'static [&'static str];

    /// Parse a variant from its string form.
    fn from_str(s: &str) -> Option<Self>;

    /// String form of this variant.
    fn as_str(&self) -> &'static str;
}

/// Value held by a node.
///
/// Serialises untagged, so `Absent` becomes `null` and structured values
/// become JSON objects with sorted keys.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// Never fetched (or removed)
    Absent,
    /// Boolean scalar
    Bool(bool),
    /// Integer scalar
    Integer(i64),
    /// Floating point scalar
    Float(f64),
    /// Free text
    Text(String),
    /// One variant of an enumeration
    Enum(String),
    /// Nested value (containers rendered as values, JSON objects)
    Structured(BTreeMap<String, Value>),
}

impl Value {
    /// Whether no value has been fetched yet.
    pub fn is_absent(&self) -> bool {
        matches!(self, Value::Absent)
    }

    /// Enumeration value from a typed variant.
    pub fn from_enum<E: EnumValue>(variant: E) -> Self {
        Value::Enum(variant.as_str().to_string())
    }

    /// Convert a JSON document into a value. Arrays become index-keyed maps.
    pub fn from_json(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Absent,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::Text(s),
            serde_json::Value::Array(items) => Value::Structured(
                items
                    .into_iter()
                    .enumerate()
                    .map(|(i, item)| (i.to_string(), Value::from_json(item)))
                    .collect(),
            ),
            serde_json::Value::Object(map) => Value::Structured(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from_json(v)))
                    .collect(),
            ),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Absent => f.write_str("absent"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Text(s) | Value::Enum(s) => f.write_str(s),
            Value::Structured(map) => {
                f.write_str("{")?;
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", key, value)?;
                }
                f.write_str("}")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i64::from(i))
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

/// Type of a leaf, used to validate values passed to `set`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueKind {
    /// `true`/`false` (also `on`/`off`, `1`/`0`)
    Bool,
    /// Signed integer
    Integer,
    /// Finite floating point number
    Float,
    /// Any text
    Text,
    /// One of the listed variants
    Enum(Vec<String>),
    /// JSON object
    Structured,
}

impl ValueKind {
    /// Kind describing an [`EnumValue`] type.
    pub fn of<E: EnumValue>() -> Self {
        ValueKind::Enum(E::VARIANTS.iter().map(|v| v.to_string()).collect())
    }

    /// Best-effort kind of an existing value.
    pub fn infer(value: &Value) -> Self {
        match value {
            Value::Bool(_) => ValueKind::Bool,
            Value::Integer(_) => ValueKind::Integer,
            Value::Float(_) => ValueKind::Float,
            Value::Enum(v) => ValueKind::Enum(vec![v.clone()]),
            Value::Structured(_) => ValueKind::Structured,
            Value::Absent | Value::Text(_) => ValueKind::Text,
        }
    }

    /// Parse raw user input into a value of this kind.
    ///
    /// Returns a human-readable reason on failure.
    pub fn parse(&self, raw: &str) -> Result<Value, String> {
        let raw = raw.trim();
        match self {
            ValueKind::Bool => match raw.to_ascii_lowercase().as_str() {
                "true" | "on" | "1" => Ok(Value::Bool(true)),
                "false" | "off" | "0" => Ok(Value::Bool(false)),
                _ => Err(format!("'{}' is not a boolean", raw)),
            },
            ValueKind::Integer => raw
                .parse::<i64>()
                .map(Value::Integer)
                .map_err(|_| format!("'{}' is not an integer", raw)),
            ValueKind::Float => match raw.parse::<f64>() {
                Ok(x) if x.is_finite() => Ok(Value::Float(x)),
                _ => Err(format!("'{}' is not a number", raw)),
            },
            ValueKind::Text => Ok(Value::Text(raw.to_string())),
            ValueKind::Enum(variants) => variants
                .iter()
                .find(|v| v.eq_ignore_ascii_case(raw))
                .map(|v| Value::Enum(v.clone()))
                .ok_or_else(|| {
                    format!("'{}' is not one of [{}]", raw, variants.join(", "))
                }),
            ValueKind::Structured => match serde_json::from_str::<serde_json::Value>(raw) {
                Ok(json @ serde_json::Value::Object(_)) => Ok(Value::from_json(json)),
                _ => Err(format!("'{}' is not a JSON object", raw)),
            },
        }
    }
}

/// When a node was last refreshed: monotonic instant for freshness checks,
/// wall-clock time for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stamp {
    /// Monotonic time (tokio clock, pausable in tests)
    pub at: Instant,
    /// Wall-clock time
    pub wall: DateTime<Utc>,
}

impl Stamp {
    /// Current time.
    pub fn now() -> Self {
        Self {
            at: Instant::now(),
            wall: Utc::now(),
        }
    }
}

/// What kind of change a [`Mutation`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// Leaf value differs from the previous one
    ValueChanged,
    /// Node appeared in the tree
    Added,
    /// Node disappeared from the tree
    Removed,
}

/// A committed change, handed to the sink right after it was applied.
#[derive(Debug, Clone, PartialEq)]
pub struct Mutation {
    /// Changed node
    pub path: NodePath,
    /// Change category
    pub kind: ChangeKind,
    /// Previous value (`None` for added nodes)
    pub old: Option<Value>,
    /// New value (`Absent` for removed nodes)
    pub new: Value,
}

/// Backend view of a subtree, as returned by a refresh or carried by a push.
#[derive(Debug, Clone, PartialEq)]
pub enum Snapshot {
    /// Named children in backend order
    Container(Vec<(String, Snapshot)>),
    /// Leaf value and metadata
    Leaf(LeafSnapshot),
}

/// Leaf part of a [`Snapshot`].
#[derive(Debug, Clone, PartialEq)]
pub struct LeafSnapshot {
    /// Current value
    pub value: Value,
    /// Accepted type for `set`
    pub kind: ValueKind,
    /// Whether `set` is permitted
    pub settable: bool,
}

impl Snapshot {
    /// Empty container.
    pub fn container() -> Self {
        Snapshot::Container(Vec::new())
    }

    /// Add (or replace) a named child. Builder style.
    pub fn with(mut self, name: &str, child: Snapshot) -> Self {
        if let Snapshot::Container(children) = &mut self {
            match children.iter_mut().find(|(n, _)| n == name) {
                Some(entry) => entry.1 = child,
                None => children.push((name.to_string(), child)),
            }
        }
        self
    }

    /// Read-only leaf; the kind is inferred from the value.
    pub fn leaf(value: impl Into<Value>) -> Self {
        let value = value.into();
        Snapshot::Leaf(LeafSnapshot {
            kind: ValueKind::infer(&value),
            value,
            settable: false,
        })
    }

    /// Settable leaf of the given kind.
    pub fn settable(value: impl Into<Value>, kind: ValueKind) -> Self {
        Snapshot::Leaf(LeafSnapshot {
            value: value.into(),
            kind,
            settable: true,
        })
    }

    /// Whether this is a container.
    pub fn is_container(&self) -> bool {
        matches!(self, Snapshot::Container(_))
    }

    /// Named child of a container.
    pub fn child(&self, name: &str) -> Option<&Snapshot> {
        match self {
            Snapshot::Container(children) => {
                children.iter().find(|(n, _)| n == name).map(|(_, c)| c)
            }
            Snapshot::Leaf(_) => None,
        }
    }

    fn child_mut(&mut self, name: &str) -> Option<&mut Snapshot> {
        match self {
            Snapshot::Container(children) => children
                .iter_mut()
                .find(|(n, _)| n == name)
                .map(|(_, c)| c),
            Snapshot::Leaf(_) => None,
        }
    }

    /// Descend along `path` (relative to this snapshot).
    pub fn get(&self, path: &NodePath) -> Option<&Snapshot> {
        path.segments()
            .iter()
            .try_fold(self, |node, segment| node.child(segment))
    }

    /// Mutable descend along `path`.
    pub fn get_mut(&mut self, path: &NodePath) -> Option<&mut Snapshot> {
        let mut node = self;
        for segment in path.segments() {
            node = node.child_mut(segment)?;
        }
        Some(node)
    }

    /// Insert or replace the node at `path`. The parent must be a container.
    pub fn insert(&mut self, path: &NodePath, snapshot: Snapshot) -> bool {
        let Some(name) = path.name() else {
            *self = snapshot;
            return true;
        };
        match self.get_mut(&path.parent()) {
            Some(Snapshot::Container(children)) => {
                match children.iter_mut().find(|(n, _)| n == name) {
                    Some(entry) => entry.1 = snapshot,
                    None => children.push((name.to_string(), snapshot)),
                }
                true
            }
            _ => false,
        }
    }

    /// Remove the node at `path`, returning it.
    pub fn remove(&mut self, path: &NodePath) -> Option<Snapshot> {
        let name = path.name()?;
        match self.get_mut(&path.parent()) {
            Some(Snapshot::Container(children)) => {
                let index = children.iter().position(|(n, _)| n == name)?;
                Some(children.remove(index).1)
            }
            _ => None,
        }
    }
}

/// Mutable per-node state, guarded by the node's own lock.
#[derive(Debug, Clone)]
struct NodeState {
    value: Value,
    updated: Option<Stamp>,
    kind: Option<ValueKind>,
    settable: bool,
    /// Set once the node is unlinked from its parent; never cleared
    detached: bool,
}

#[derive(Debug)]
enum NodeBody {
    Container(RwLock<Vec<Arc<AttributeNode>>>),
    Leaf,
}

/// A single addressable element of the tree (container or leaf).
pub struct AttributeNode {
    path: NodePath,
    body: NodeBody,
    state: RwLock<NodeState>,

    /// Refresh single-flight slot (see `cache`)
    pub(crate) flight: FlightSlot,
}

impl fmt::Debug for AttributeNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeNode")
            .field("path", &self.path.to_string())
            .field("container", &self.is_container())
            .finish_non_exhaustive()
    }
}

fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

impl AttributeNode {
    fn new_container(path: NodePath) -> Arc<Self> {
        Arc::new(Self {
            path,
            body: NodeBody::Container(RwLock::new(Vec::new())),
            state: RwLock::new(NodeState {
                value: Value::Absent,
                updated: None,
                kind: None,
                settable: false,
                detached: false,
            }),
            flight: FlightSlot::default(),
        })
    }

    /// Build a node (and its subtree) from a snapshot.
    fn build(path: NodePath, snapshot: Snapshot, stamp: Option<Stamp>) -> Arc<Self> {
        match snapshot {
            Snapshot::Container(entries) => {
                let children = entries
                    .into_iter()
                    .map(|(name, child)| Self::build(path.join(&name), child, stamp))
                    .collect();
                Arc::new(Self {
                    path,
                    body: NodeBody::Container(RwLock::new(children)),
                    state: RwLock::new(NodeState {
                        value: Value::Absent,
                        updated: stamp,
                        kind: None,
                        settable: false,
                        detached: false,
                    }),
                    flight: FlightSlot::default(),
                })
            }
            Snapshot::Leaf(leaf) => Arc::new(Self {
                path,
                body: NodeBody::Leaf,
                state: RwLock::new(NodeState {
                    value: leaf.value,
                    updated: stamp,
                    kind: Some(leaf.kind),
                    settable: leaf.settable,
                    detached: false,
                }),
                flight: FlightSlot::default(),
            }),
        }
    }

    /// Absolute path of this node.
    pub fn path(&self) -> &NodePath {
        &self.path
    }

    /// Node name (empty for the root).
    pub fn name(&self) -> &str {
        self.path.name().unwrap_or("")
    }

    /// Check if this node is a container.
    pub fn is_container(&self) -> bool {
        matches!(self.body, NodeBody::Container(_))
    }

    /// Check if this node is a leaf.
    pub fn is_leaf(&self) -> bool {
        matches!(self.body, NodeBody::Leaf)
    }

    /// Whether `set` is permitted on this node.
    pub fn is_settable(&self) -> bool {
        read_lock(&self.state).settable
    }

    /// Accepted value type (leaves only).
    pub fn value_kind(&self) -> Option<ValueKind> {
        read_lock(&self.state).kind.clone()
    }

    /// Whether the node is still linked into its tree.
    ///
    /// A removed node stays readable through any `Arc` still held, but
    /// refreshes and `set` no longer land in it.
    pub fn is_attached(&self) -> bool {
        !read_lock(&self.state).detached
    }

    /// Mark this node and everything below it as removed.
    fn detach(&self) {
        write_lock(&self.state).detached = true;
        for child in self.children() {
            child.detach();
        }
    }

    /// Last successful refresh, `None` if never.
    pub fn last_updated(&self) -> Option<Stamp> {
        read_lock(&self.state).updated
    }

    /// Consistent (value, last refresh) pair.
    ///
    /// For containers the value is the structured rendering of the subtree.
    pub fn read(&self) -> (Value, Option<Stamp>) {
        match &self.body {
            NodeBody::Leaf => {
                let state = read_lock(&self.state);
                (state.value.clone(), state.updated)
            }
            NodeBody::Container(_) => (self.current_value(), self.last_updated()),
        }
    }

    /// Current value; containers render as a structured map of their children.
    pub fn current_value(&self) -> Value {
        match &self.body {
            NodeBody::Leaf => read_lock(&self.state).value.clone(),
            NodeBody::Container(_) => Value::Structured(
                self.children()
                    .iter()
                    .map(|child| (child.name().to_string(), child.current_value()))
                    .collect(),
            ),
        }
    }

    /// Immediate children in insertion order (empty for leaves).
    pub fn children(&self) -> Vec<Arc<AttributeNode>> {
        match &self.body {
            NodeBody::Container(children) => read_lock(children).clone(),
            NodeBody::Leaf => Vec::new(),
        }
    }

    /// Child by name.
    pub fn child(&self, name: &str) -> Option<Arc<AttributeNode>> {
        match &self.body {
            NodeBody::Container(children) => {
                read_lock(children).iter().find(|c| c.name() == name).cloned()
            }
            NodeBody::Leaf => None,
        }
    }

    /// All leaves at or below this node, depth-first in insertion order.
    pub fn leaves(self: &Arc<Self>) -> Vec<Arc<AttributeNode>> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves(self: &Arc<Self>, out: &mut Vec<Arc<AttributeNode>>) {
        match &self.body {
            NodeBody::Leaf => out.push(Arc::clone(self)),
            NodeBody::Container(_) => {
                for child in self.children() {
                    child.collect_leaves(out);
                }
            }
        }
    }

    /// Store a value confirmed by the backend (successful `set`).
    ///
    /// The sink runs while the node is still write-locked, so records for one
    /// node are published in commit order. Returns false, committing nothing,
    /// if the node has been removed from the tree.
    pub(crate) fn commit(&self, value: Value, stamp: Stamp, sink: &mut dyn FnMut(Mutation)) -> bool {
        let mut state = write_lock(&self.state);
        if state.detached {
            return false;
        }
        state.updated = Some(stamp);
        if state.value != value {
            let old = std::mem::replace(&mut state.value, value.clone());
            sink(Mutation {
                path: self.path.clone(),
                kind: ChangeKind::ValueChanged,
                old: Some(old),
                new: value,
            });
        }
        true
    }

    fn same_shape(&self, snapshot: &Snapshot) -> bool {
        self.is_container() == snapshot.is_container()
    }

    /// Merge a snapshot of this node into it.
    ///
    /// Returns the snapshot back when its shape (container vs leaf) differs;
    /// the caller must then replace the node in its parent. A detached node
    /// ignores the snapshot.
    fn merge(
        &self,
        snapshot: Snapshot,
        stamp: Stamp,
        sink: &mut dyn FnMut(Mutation),
    ) -> Result<(), Snapshot> {
        match (&self.body, snapshot) {
            (NodeBody::Leaf, Snapshot::Leaf(leaf)) => {
                let mut state = write_lock(&self.state);
                if state.detached {
                    return Ok(());
                }
                state.updated = Some(stamp);
                state.kind = Some(leaf.kind);
                state.settable = leaf.settable;
                if state.value != leaf.value {
                    let old = std::mem::replace(&mut state.value, leaf.value.clone());
                    sink(Mutation {
                        path: self.path.clone(),
                        kind: ChangeKind::ValueChanged,
                        old: Some(old),
                        new: leaf.value,
                    });
                }
                Ok(())
            }
            (NodeBody::Container(children), Snapshot::Container(entries)) => {
                // Held until every record is out, so a concurrent removal of
                // this node publishes after them
                let mut state = write_lock(&self.state);
                if state.detached {
                    return Ok(());
                }
                let mut removed = Vec::new();
                let mut added = Vec::new();
                let mut existing = Vec::new();
                {
                    let mut children = write_lock(children);
                    children.retain(|child| {
                        let keep = entries.iter().any(|(name, _)| name == child.name());
                        if !keep {
                            removed.push(Arc::clone(child));
                        }
                        keep
                    });

                    for (name, entry) in entries {
                        match children.iter().position(|c| c.name() == name) {
                            Some(i) if children[i].same_shape(&entry) => {
                                existing.push((Arc::clone(&children[i]), entry));
                            }
                            Some(i) => {
                                let node = Self::build(self.path.join(&name), entry, Some(stamp));
                                removed.push(std::mem::replace(&mut children[i], Arc::clone(&node)));
                                added.push(node);
                            }
                            None => {
                                let node = Self::build(self.path.join(&name), entry, Some(stamp));
                                children.push(Arc::clone(&node));
                                added.push(node);
                            }
                        }
                    }
                }
                state.updated = Some(stamp);

                for node in removed {
                    node.detach();
                    sink(Mutation {
                        path: node.path.clone(),
                        kind: ChangeKind::Removed,
                        old: Some(node.current_value()),
                        new: Value::Absent,
                    });
                }
                for node in added {
                    sink(Mutation {
                        path: node.path.clone(),
                        kind: ChangeKind::Added,
                        old: None,
                        new: node.current_value(),
                    });
                }
                for (child, entry) in existing {
                    // Shapes were checked above
                    let _ = child.merge(entry, stamp, sink);
                }
                Ok(())
            }
            (_, snapshot) => Err(snapshot),
        }
    }

    /// Insert or replace a named child of this container.
    fn upsert_child(
        &self,
        name: &str,
        snapshot: Snapshot,
        stamp: Stamp,
        sink: &mut dyn FnMut(Mutation),
    ) -> Result<(), ShellError> {
        let NodeBody::Container(children) = &self.body else {
            return Err(ShellError::NotAContainer(self.path.to_string()));
        };
        let node = Self::build(self.path.join(name), snapshot, Some(stamp));
        let replaced = {
            let mut children = write_lock(children);
            match children.iter().position(|c| c.name() == name) {
                Some(i) => Some(std::mem::replace(&mut children[i], Arc::clone(&node))),
                None => {
                    children.push(Arc::clone(&node));
                    None
                }
            }
        };
        if let Some(old) = replaced {
            old.detach();
            sink(Mutation {
                path: old.path.clone(),
                kind: ChangeKind::Removed,
                old: Some(old.current_value()),
                new: Value::Absent,
            });
        }
        sink(Mutation {
            path: node.path.clone(),
            kind: ChangeKind::Added,
            old: None,
            new: node.current_value(),
        });
        Ok(())
    }

    fn remove_child(&self, name: &str, sink: &mut dyn FnMut(Mutation)) -> bool {
        let NodeBody::Container(children) = &self.body else {
            return false;
        };
        let removed = {
            let mut children = write_lock(children);
            children
                .iter()
                .position(|c| c.name() == name)
                .map(|i| children.remove(i))
        };
        match removed {
            Some(node) => {
                node.detach();
                sink(Mutation {
                    path: node.path.clone(),
                    kind: ChangeKind::Removed,
                    old: Some(node.current_value()),
                    new: Value::Absent,
                });
                true
            }
            None => false,
        }
    }
}

/// The attribute tree: a root container and everything below it.
#[derive(Debug)]
pub struct AttributeTree {
    root: Arc<AttributeNode>,
}

impl Default for AttributeTree {
    fn default() -> Self {
        Self::new()
    }
}

impl AttributeTree {
    /// Empty tree (root container only, never refreshed).
    pub fn new() -> Self {
        Self {
            root: AttributeNode::new_container(NodePath::root()),
        }
    }

    /// Tree built from a root snapshot, stamped with `stamp`.
    ///
    /// A leaf snapshot cannot be the root; it yields an empty tree.
    pub fn from_snapshot(snapshot: Snapshot, stamp: Option<Stamp>) -> Self {
        if !snapshot.is_container() {
            log::warn!("ignoring leaf snapshot as tree root");
            return Self::new();
        }
        Self {
            root: AttributeNode::build(NodePath::root(), snapshot, stamp),
        }
    }

    /// Root container.
    pub fn root(&self) -> &Arc<AttributeNode> {
        &self.root
    }

    /// Node at an absolute path, if it exists.
    pub fn get(&self, path: &NodePath) -> Option<Arc<AttributeNode>> {
        path.segments()
            .iter()
            .try_fold(Arc::clone(&self.root), |node, segment| node.child(segment))
    }

    /// Apply a backend snapshot at `path`.
    ///
    /// If the node does not exist yet but its parent does, the snapshot is
    /// inserted as a new child.
    pub fn apply(
        &self,
        path: &NodePath,
        snapshot: Snapshot,
        stamp: Stamp,
        sink: &mut dyn FnMut(Mutation),
    ) -> Result<(), ShellError> {
        if let Some(node) = self.get(path) {
            self.apply_to(&node, snapshot, stamp, sink);
            return Ok(());
        }
        let (Some(name), Some(parent)) = (path.name(), self.get(&path.parent())) else {
            return Err(ShellError::PathNotFound(path.to_string()));
        };
        parent.upsert_child(name, snapshot, stamp, sink)
    }

    /// Drop the node at `path` because the backend no longer knows it.
    ///
    /// Returns false if there was nothing to remove (the root is never removed).
    pub fn remove(&self, path: &NodePath, sink: &mut dyn FnMut(Mutation)) -> bool {
        let (Some(name), Some(parent)) = (path.name(), self.get(&path.parent())) else {
            return false;
        };
        parent.remove_child(name, sink)
    }

    /// Apply a backend snapshot to a node already in hand.
    ///
    /// A shape change (container became leaf or vice versa) replaces the node
    /// in its parent.
    pub fn apply_to(
        &self,
        node: &Arc<AttributeNode>,
        snapshot: Snapshot,
        stamp: Stamp,
        sink: &mut dyn FnMut(Mutation),
    ) {
        let Err(snapshot) = node.merge(snapshot, stamp, sink) else {
            return;
        };
        if !node.is_attached() {
            log::debug!("{} was removed before its refresh landed", node.path());
            return;
        }
        let Some(name) = node.path().name() else {
            log::warn!("ignoring leaf snapshot for tree root");
            return;
        };
        match self.get(&node.path().parent()) {
            Some(parent) => {
                if let Err(err) = parent.upsert_child(name, snapshot, stamp, sink) {
                    log::warn!("could not replace {}: {}", node.path(), err);
                }
            }
            None => log::debug!("{} was detached before its refresh landed", node.path()),
        }
    }
}
