//! Invalidator
//!
//! Rewires an existing node and marks everything downstream of it dirty.
//!
//! # Algorithm
//!
//! 1. Validate the new references: they must exist, belong to this registry
//!    and must not make the node depend on itself. On failure nothing changes.
//! 2. Detach the old references from their dependents sets.
//! 3. Install the new function and bindings and attach the new references.
//! 4. Mark the node dirty.
//! 5. Walk the dependents breadth first and mark every reached node dirty.
//!
//! Nothing is recomputed here. The next `compute` on an affected node pulls
//! the new values through.

use indexmap::IndexSet;
use tracing::debug;

use crate::binding::{Arguments, Binding};
use crate::error::Result;
use crate::graph::NodeId;
use crate::registry::Shared;
use crate::task::{Callable, TaskFn};

/// Replace `target`'s function and bindings.
///
/// Returns the nodes marked dirty, `target` first.
pub(crate) fn rewire(
    shared: &Shared,
    target: NodeId,
    callable: Callable,
    arguments: Arguments,
) -> Result<Vec<NodeId>> {
    let (positional, named) = shared.bind(arguments)?;
    let guard = shared.state.lock();
    let mut store = guard.borrow_mut();

    let previous = store.get(target)?.dependencies();
    let next: IndexSet<NodeId> = positional
        .iter()
        .chain(named.values())
        .filter_map(Binding::reference)
        .collect();
    for &dep in &next {
        store.get(dep)?;
    }
    store.check_acyclic(target, &next)?;

    for &dep in &previous {
        store.remove_edge(dep, target);
    }
    let task = callable.name().to_string();
    store.get_mut(target)?.install(callable, positional, named);
    for &dep in &next {
        store.add_edge(dep, target);
    }

    let affected = store.invalidate(target);

    let mut pruned = 0;
    if shared.config.prune_detached {
        for &dep in previous.difference(&next) {
            let node = store.get_mut(dep)?;
            if node.dependents().is_empty() {
                node.evict();
                pruned += 1;
            }
        }
    }

    debug!(
        node = %target,
        task = %task,
        dependencies = next.len(),
        invalidated = affected.len(),
        pruned,
        "rewired node"
    );
    Ok(affected)
}

/// Install `task` as the implementation of `name`.
///
/// If `name` already had an implementation, every node bound to it is
/// invalidated along with its dependents.
pub(crate) fn redefine(shared: &Shared, name: &str, task: TaskFn) -> Vec<NodeId> {
    let guard = shared.state.lock();
    let replaced = shared.tasks.insert(name.to_string(), task).is_some();
    if !replaced {
        debug!(task = name, "defined task");
        return Vec::new();
    }

    let mut store = guard.borrow_mut();
    let bound: Vec<NodeId> = store
        .nodes()
        .filter(|node| node.callable().is_named(name))
        .map(|node| node.id())
        .collect();

    let mut affected = IndexSet::new();
    for id in bound {
        if !affected.contains(&id) {
            affected.extend(store.invalidate(id));
        }
    }

    debug!(task = name, invalidated = affected.len(), "redefined task");
    affected.into_iter().collect()
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Arc;

    use crate::{args, Error, GraphConfig, GraphRegistry, TaskFn, Value};

    fn adder() -> TaskFn {
        TaskFn::new("add", |a| Ok(Value::Int(a.int(0)? + a.int(1)?)))
    }

    fn counted_add(calls: &Arc<AtomicI32>) -> TaskFn {
        let calls = Arc::clone(calls);
        TaskFn::new("add", move |a| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(Value::Int(a.int(0)? + a.int(1)?))
        })
    }

    #[test]
    fn rewire_marks_node_and_dependents_dirty() {
        let graph = GraphRegistry::new();
        let add = graph.register(adder());

        let a = add.call(args![1, 1]).unwrap();
        let b = add.call(args![&a, 1]).unwrap();
        let c = add.call(args![&b, 1]).unwrap();
        let other = add.call(args![0, 0]).unwrap();

        assert_eq!(c.compute().unwrap(), Value::Int(4));
        assert_eq!(other.compute().unwrap(), Value::Int(0));

        let affected = graph.update_task(&a).unwrap().call(adder(), args![10, 10]).unwrap();

        assert_eq!(affected, vec![a.id(), b.id(), c.id()]);
        assert!(a.is_dirty() && b.is_dirty() && c.is_dirty());
        assert!(!other.is_dirty());
        assert_eq!(c.compute().unwrap(), Value::Int(22));
    }

    #[test]
    fn rewire_does_not_recompute_eagerly() {
        let calls = Arc::new(AtomicI32::new(0));
        let graph = GraphRegistry::new();
        let add = graph.register(counted_add(&calls));

        let a = add.call(args![1, 2]).unwrap();
        let b = add.call(args![&a, 3]).unwrap();
        b.compute().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        graph.update_task(&a).unwrap().args(args![5, 5]).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        assert_eq!(b.compute().unwrap(), Value::Int(13));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn rewire_moves_dependents_edges() {
        let graph = GraphRegistry::new();
        let add = graph.register(adder());

        let old = add.call(args![1, 1]).unwrap();
        let new = add.call(args![2, 2]).unwrap();
        let top = add.call(args![&old, 0]).unwrap();

        graph.update_task(&top).unwrap().args(args![&new, 0]).unwrap();

        assert!(old.dependents().is_empty());
        assert_eq!(new.dependents(), vec![top.id()]);
        assert_eq!(top.dependencies(), vec![new.id()]);
        assert_eq!(top.compute().unwrap(), Value::Int(4));
    }

    #[test]
    fn self_reference_is_rejected() {
        let graph = GraphRegistry::new();
        let add = graph.register(adder());
        let a = add.call(args![1, 1]).unwrap();
        a.compute().unwrap();

        let err = graph.update_task(&a).unwrap().args(args![&a, 1]).unwrap_err();

        assert!(matches!(err, Error::Cycle { node, .. } if node == a.id()));
        assert!(!a.is_dirty());
        assert!(a.dependents().is_empty());
        assert_eq!(a.compute().unwrap(), Value::Int(2));
    }

    #[test]
    fn transitive_cycle_is_rejected() {
        let graph = GraphRegistry::new();
        let add = graph.register(adder());
        let a = add.call(args![1, 1]).unwrap();
        let b = add.call(args![&a, 1]).unwrap();
        let c = add.call(args![&b, 1]).unwrap();

        let err = graph.update_task(&a).unwrap().args(args![&c, 1]).unwrap_err();

        match err {
            Error::Cycle { path, .. } => assert_eq!(path, vec![a.id(), b.id(), c.id(), a.id()]),
            other => panic!("expected a cycle, got {other:?}"),
        }
        assert_eq!(a.dependencies(), Vec::new());
        assert_eq!(c.compute().unwrap(), Value::Int(4));
    }

    #[test]
    fn named_task_rewire() {
        let graph = GraphRegistry::new();
        graph.define_task("double", TaskFn::new("double", |a| Ok(Value::Int(a.int(0)? * 2))));
        let add = graph.register(adder());

        let a = add.call(args![1, 2]).unwrap();
        graph.update_task(&a).unwrap().task("double", args![21]).unwrap();

        assert_eq!(a.task_name(), "double");
        assert_eq!(a.compute().unwrap(), Value::Int(42));
    }

    #[test]
    fn redefining_a_task_invalidates_its_nodes() {
        let graph = GraphRegistry::new();
        graph.define_task("base", TaskFn::infallible("base", |_| 1));
        let add = graph.register(adder());

        let base = graph.add_task("base").call(args![]).unwrap();
        let top = add.call(args![&base, 10]).unwrap();
        let unrelated = add.call(args![0, 0]).unwrap();

        assert_eq!(top.compute().unwrap(), Value::Int(11));
        unrelated.compute().unwrap();

        let affected = graph.define_task("base", TaskFn::infallible("base", |_| 5));

        assert_eq!(affected, vec![base.id(), top.id()]);
        assert!(!unrelated.is_dirty());
        assert_eq!(top.compute().unwrap(), Value::Int(15));
    }

    #[test]
    fn first_definition_invalidates_nothing() {
        let graph = GraphRegistry::new();
        let pending = graph.add_task("late").call(args![]).unwrap();

        assert!(graph.define_task("late", TaskFn::infallible("late", |_| 3)).is_empty());
        assert!(graph.has_task("late"));
        assert_eq!(pending.compute().unwrap(), Value::Int(3));
    }

    #[test]
    fn prune_detached_drops_orphaned_cache() {
        let graph = GraphRegistry::with_config(GraphConfig::default().with_prune_detached(true));
        let add = graph.register(adder());

        let old = add.call(args![1, 1]).unwrap();
        let shared = add.call(args![2, 2]).unwrap();
        let top = add.call(args![&old, &shared]).unwrap();
        let keeper = add.call(args![&shared, 0]).unwrap();
        top.compute().unwrap();
        keeper.compute().unwrap();

        graph.update_task(&top).unwrap().args(args![&shared, 7]).unwrap();

        // `old` lost its only dependent; `shared` is still read by both.
        assert!(old.is_dirty());
        assert!(old.peek().is_none());
        assert!(!shared.is_dirty());
    }

    #[test]
    fn detached_cache_is_kept_by_default() {
        let graph = GraphRegistry::new();
        let add = graph.register(adder());

        let old = add.call(args![1, 1]).unwrap();
        let top = add.call(args![&old, 0]).unwrap();
        top.compute().unwrap();

        graph.update_task(&top).unwrap().args(args![5, 0]).unwrap();

        assert!(!old.is_dirty());
        assert_eq!(old.peek(), Some(Value::Int(2)));
    }
}
