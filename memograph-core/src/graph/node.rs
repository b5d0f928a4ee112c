//! Graph Nodes
//!
//! This module defines the per-node record stored inside a registry: the
//! callable, its bindings, the memoized value, and the reverse edges.

use std::fmt;

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::binding::Binding;
use crate::task::Callable;
use crate::value::Value;

/// Identifier for a node in the dependency graph.
///
/// Ids are handed out by a registry and are only unique within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(u64);

impl NodeId {
    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl From<u64> for NodeId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Positional bindings. Most tasks take a handful of arguments.
pub(crate) type Positional = SmallVec<[Binding; 4]>;

/// Named bindings, kept in insertion order so evaluation order is stable.
pub(crate) type Named = IndexMap<String, Binding>;

/// A node in the dependency graph.
#[derive(Debug)]
pub struct NodeState {
    /// Unique identifier for this node.
    id: NodeId,

    /// The function this node invokes.
    callable: Callable,

    /// Ordered positional argument bindings.
    positional: Positional,

    /// Named argument bindings.
    named: Named,

    /// Last computed value. Only meaningful while the node is clean.
    cached: Option<Value>,

    /// Whether the cached value is stale.
    dirty: bool,

    /// Bumped every time a callable and bindings are installed.
    revision: u64,

    /// Nodes that reference this node (children in the DAG).
    dependents: IndexSet<NodeId>,
}

impl NodeState {
    /// Create a new node. Nodes always start dirty.
    pub(crate) fn new(id: NodeId, callable: Callable, positional: Positional, named: Named) -> Self {
        Self {
            id,
            callable,
            positional,
            named,
            cached: None,
            dirty: true,
            revision: 0,
            dependents: IndexSet::new(),
        }
    }

    /// Get the node's ID.
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn callable(&self) -> &Callable {
        &self.callable
    }

    pub fn positional(&self) -> &[Binding] {
        &self.positional
    }

    pub fn named(&self) -> &IndexMap<String, Binding> {
        &self.named
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// The memoized value, if it can be used without recomputation.
    pub fn cached_value(&self) -> Option<&Value> {
        if self.dirty {
            None
        } else {
            self.cached.as_ref()
        }
    }

    /// Mark the node as needing recomputation. The stale value is kept
    /// around but never handed out while dirty.
    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Store a freshly computed value and mark the node clean.
    pub(crate) fn store(&mut self, value: Value) {
        self.cached = Some(value);
        self.dirty = false;
    }

    /// Drop the cached value entirely.
    pub(crate) fn evict(&mut self) {
        self.cached = None;
        self.dirty = true;
    }

    /// Replace the callable and bindings. The node becomes dirty and any
    /// result still being computed against the old revision is discarded.
    pub(crate) fn install(&mut self, callable: Callable, positional: Positional, named: Named) {
        self.callable = callable;
        self.positional = positional;
        self.named = named;
        self.revision += 1;
        self.evict();
    }

    /// Nodes this node references, positional first, then named, without
    /// duplicates.
    pub fn dependencies(&self) -> IndexSet<NodeId> {
        self.positional
            .iter()
            .chain(self.named.values())
            .filter_map(Binding::reference)
            .collect()
    }

    /// Add a dependent (a node that reads from this node).
    pub(crate) fn add_dependent(&mut self, node_id: NodeId) {
        self.dependents.insert(node_id);
    }

    /// Remove a dependent.
    pub(crate) fn remove_dependent(&mut self, node_id: NodeId) {
        self.dependents.shift_remove(&node_id);
    }

    /// Get all dependents.
    pub fn dependents(&self) -> &IndexSet<NodeId> {
        &self.dependents
    }
}
