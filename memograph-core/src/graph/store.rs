//! Node Store
//!
//! The store owns every node of one registry, indexed by ID, and keeps the
//! reverse (`dependents`) edges consistent with the forward references held
//! in each node's bindings.
//!
//! # Algorithms
//!
//! - **Cycle check**: before `dependent` starts referencing `dependency`, walk
//!   the dependents of `dependent`. If `dependency` is reachable, the new edge
//!   would close a loop.
//! - **Invalidation**: breadth-first walk of the dependents graph from a
//!   starting node, marking every reached node dirty.
//! - **Planning**: post-order walk of the forward references from a root,
//!   collecting the dirty nodes in the order a resolve would run them.

use std::collections::VecDeque;

use indexmap::{IndexMap, IndexSet};

use super::node::{Named, NodeId, NodeState, Positional};
use crate::error::{Error, Result};
use crate::task::Callable;

/// All nodes of a registry.
#[derive(Debug, Default)]
pub struct GraphStore {
    /// All nodes in the graph, indexed by ID.
    nodes: IndexMap<NodeId, NodeState>,

    /// Next ID to hand out.
    next_id: u64,

    /// Nodes whose function is executing right now.
    in_flight: IndexSet<NodeId>,
}

impl GraphStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a node and wire its references into the dependents sets.
    ///
    /// Every referenced node must already exist; otherwise nothing changes.
    pub(crate) fn insert(
        &mut self,
        callable: Callable,
        positional: Positional,
        named: Named,
    ) -> Result<NodeId> {
        let id = NodeId::from(self.next_id);
        let node = NodeState::new(id, callable, positional, named);
        let deps = node.dependencies();
        for dep in &deps {
            self.get(*dep)?;
        }
        self.next_id += 1;
        self.nodes.insert(id, node);
        for dep in deps {
            self.add_edge(dep, id);
        }
        Ok(id)
    }

    pub fn contains(&self, node_id: NodeId) -> bool {
        self.nodes.contains_key(&node_id)
    }

    /// Get a reference to a node.
    pub fn get(&self, node_id: NodeId) -> Result<&NodeState> {
        self.nodes
            .get(&node_id)
            .ok_or(Error::UnknownNode { node: node_id })
    }

    /// Get a mutable reference to a node.
    pub(crate) fn get_mut(&mut self, node_id: NodeId) -> Result<&mut NodeState> {
        self.nodes
            .get_mut(&node_id)
            .ok_or(Error::UnknownNode { node: node_id })
    }

    pub fn nodes(&self) -> impl Iterator<Item = &NodeState> {
        self.nodes.values()
    }

    /// Get the total number of nodes in the graph.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Record that `dependent` reads from `dependency`.
    pub(crate) fn add_edge(&mut self, dependency: NodeId, dependent: NodeId) {
        if let Some(dep_node) = self.nodes.get_mut(&dependency) {
            dep_node.add_dependent(dependent);
        }
    }

    /// Forget that `dependent` reads from `dependency`.
    pub(crate) fn remove_edge(&mut self, dependency: NodeId, dependent: NodeId) {
        if let Some(dep_node) = self.nodes.get_mut(&dependency) {
            dep_node.remove_dependent(dependent);
        }
    }

    /// Path from `from` to `to` following dependents edges, if one exists.
    fn dependents_path(&self, from: NodeId, to: NodeId) -> Option<Vec<NodeId>> {
        let mut parents: IndexMap<NodeId, NodeId> = IndexMap::new();
        let mut queue = VecDeque::from([from]);
        let mut visited = IndexSet::from([from]);

        while let Some(node_id) = queue.pop_front() {
            if node_id == to {
                let mut path = vec![to];
                let mut cursor = to;
                while let Some(&parent) = parents.get(&cursor) {
                    path.push(parent);
                    cursor = parent;
                }
                path.reverse();
                return Some(path);
            }

            let Some(node) = self.nodes.get(&node_id) else {
                continue;
            };
            for &dependent_id in node.dependents() {
                if visited.insert(dependent_id) {
                    parents.insert(dependent_id, node_id);
                    queue.push_back(dependent_id);
                }
            }
        }

        None
    }

    /// Check that letting `dependent` reference each of `dependencies` keeps
    /// the graph acyclic.
    pub(crate) fn check_acyclic(
        &self,
        dependent: NodeId,
        dependencies: &IndexSet<NodeId>,
    ) -> Result<()> {
        for &dependency in dependencies {
            if let Some(mut path) = self.dependents_path(dependent, dependency) {
                path.push(dependent);
                return Err(Error::Cycle {
                    node: dependent,
                    path,
                });
            }
        }
        Ok(())
    }

    /// Mark `start` and everything downstream of it dirty.
    ///
    /// Returns the affected nodes in breadth-first order, `start` first.
    pub(crate) fn invalidate(&mut self, start: NodeId) -> Vec<NodeId> {
        let mut affected = Vec::new();
        let mut visited = IndexSet::new();
        let mut queue = VecDeque::from([start]);

        while let Some(node_id) = queue.pop_front() {
            if !visited.insert(node_id) {
                continue;
            }

            if let Some(node) = self.nodes.get_mut(&node_id) {
                node.mark_dirty();
                affected.push(node_id);
                queue.extend(node.dependents().iter().copied());
            }
        }

        affected
    }

    /// Dirty nodes a resolve of `root` would run, dependencies first.
    pub fn plan(&self, root: NodeId) -> Result<Vec<NodeId>> {
        enum Step {
            Enter(NodeId),
            Exit(NodeId),
        }

        let mut order = Vec::new();
        let mut seen = IndexSet::new();
        let mut stack = vec![Step::Enter(root)];

        while let Some(step) = stack.pop() {
            match step {
                Step::Enter(id) => {
                    let node = self.get(id)?;
                    if !node.is_dirty() || !seen.insert(id) {
                        continue;
                    }
                    stack.push(Step::Exit(id));
                    for dep in node.dependencies().into_iter().rev() {
                        stack.push(Step::Enter(dep));
                    }
                }
                Step::Exit(id) => order.push(id),
            }
        }

        Ok(order)
    }

    /// All nodes currently marked dirty, in creation order.
    pub fn dirty_nodes(&self) -> Vec<NodeId> {
        self.nodes
            .values()
            .filter(|node| node.is_dirty())
            .map(NodeState::id)
            .collect()
    }

    pub(crate) fn is_in_flight(&self, node_id: NodeId) -> bool {
        self.in_flight.contains(&node_id)
    }

    pub(crate) fn enter_flight(&mut self, node_id: NodeId) {
        self.in_flight.insert(node_id);
    }

    pub(crate) fn leave_flight(&mut self, node_id: NodeId) {
        self.in_flight.shift_remove(&node_id);
    }
}
