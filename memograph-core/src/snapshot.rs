//! Graph Snapshots
//!
//! A snapshot is a serializable picture of a registry's structure: every
//! node's function name, bindings, dirty flag and dependents. Cached values
//! are left out, so two snapshots compare equal exactly when the wiring and
//! dirty state agree.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::binding::Binding;
use crate::error::{Error, Result};
use crate::graph::{GraphStore, NodeId, NodeState};
use crate::task::Callable;

/// Structure of a single node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub id: NodeId,
    pub task: String,
    /// Whether the function is looked up by name at resolve time.
    pub named_task: bool,
    pub positional: Vec<Binding>,
    pub named: IndexMap<String, Binding>,
    pub dirty: bool,
    pub revision: u64,
    pub dependents: Vec<NodeId>,
}

impl From<&NodeState> for NodeSnapshot {
    fn from(node: &NodeState) -> Self {
        Self {
            id: node.id(),
            task: node.callable().name().to_string(),
            named_task: matches!(node.callable(), Callable::Named(_)),
            positional: node.positional().to_vec(),
            named: node.named().clone(),
            dirty: node.is_dirty(),
            revision: node.revision(),
            dependents: node.dependents().iter().copied().collect(),
        }
    }
}

/// Structure of a whole registry, nodes in creation order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<NodeSnapshot>,
}

impl GraphSnapshot {
    pub(crate) fn capture(store: &GraphStore) -> Self {
        Self {
            nodes: store.nodes().map(NodeSnapshot::from).collect(),
        }
    }

    pub fn node(&self, id: NodeId) -> Option<&NodeSnapshot> {
        self.nodes.iter().find(|node| node.id == id)
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Snapshot(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Snapshot(e.to_string()))
    }

    /// Serialize to MessagePack with field names.
    pub fn to_msgpack(&self) -> Result<Vec<u8>> {
        rmp_serde::to_vec_named(self).map_err(|e| Error::Snapshot(e.to_string()))
    }

    pub fn from_msgpack(bytes: &[u8]) -> Result<Self> {
        rmp_serde::from_slice(bytes).map_err(|e| Error::Snapshot(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{args, GraphRegistry, TaskFn, Value};

    fn sample() -> (GraphRegistry, Vec<NodeId>) {
        let graph = GraphRegistry::new();
        let add = graph.register(TaskFn::new("add", |a| Ok(Value::Int(a.int(0)? + a.int(1)?))));
        let scale = graph.add_task("scale");

        let a = add.call(args![1, 2]).unwrap();
        let b = scale.call(args![&a; factor = 3]).unwrap();
        let ids = vec![a.id(), b.id()];
        (graph, ids)
    }

    #[test]
    fn capture_records_structure() {
        let (graph, ids) = sample();
        let snapshot = graph.snapshot();

        assert_eq!(snapshot.nodes.len(), 2);

        let a = snapshot.node(ids[0]).unwrap();
        assert_eq!(a.task, "add");
        assert!(!a.named_task);
        assert_eq!(a.positional, vec![Binding::Literal(Value::Int(1)), Binding::Literal(Value::Int(2))]);
        assert_eq!(a.dependents, vec![ids[1]]);
        assert!(a.dirty);

        let b = snapshot.node(ids[1]).unwrap();
        assert_eq!(b.task, "scale");
        assert!(b.named_task);
        assert_eq!(b.positional, vec![Binding::Reference(ids[0])]);
        assert_eq!(b.named.get("factor"), Some(&Binding::Literal(Value::Int(3))));
    }

    #[test]
    fn json_round_trip() {
        let (graph, _) = sample();
        let snapshot = graph.snapshot();

        let json = snapshot.to_json().unwrap();
        assert!(json.contains("\"reference\": 0"));
        assert_eq!(GraphSnapshot::from_json(&json).unwrap(), snapshot);
    }

    #[test]
    fn msgpack_round_trip() {
        let (graph, _) = sample();
        let snapshot = graph.snapshot();

        let bytes = snapshot.to_msgpack().unwrap();
        assert_eq!(GraphSnapshot::from_msgpack(&bytes).unwrap(), snapshot);
    }

    #[test]
    fn invalid_input_is_a_snapshot_error() {
        assert!(matches!(GraphSnapshot::from_json("{"), Err(Error::Snapshot(_))));
        assert!(matches!(GraphSnapshot::from_msgpack(&[0xc1]), Err(Error::Snapshot(_))));
    }
}
