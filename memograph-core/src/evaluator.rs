//! Evaluator
//!
//! Resolves a node's value, computing whatever dirty dependencies it needs on
//! the way.
//!
//! # Algorithm
//!
//! 1. A clean node returns its cached value. Nothing below it is visited.
//! 2. A dirty node first resolves every `Reference` binding, leaves first.
//! 3. The node's function runs with the resolved arguments.
//! 4. The result is cached and the node becomes clean.
//!
//! The walk uses an explicit stack of enter/exit steps instead of native
//! recursion, so stack usage does not grow with the length of a dependency
//! chain. Nodes that have been entered but not exited form the current path;
//! reaching one of them again is a cycle.
//!
//! # Reentrancy
//!
//! The store is never borrowed while a task function runs, so a function may
//! compute or rewire other nodes of the same registry. A node whose function
//! is running is marked in flight; a nested resolve reaching it fails with
//! [`Error::Cycle`]. If a node is rewired while its function runs, the result
//! is handed back to the caller but not cached.

use std::cell::RefCell;

use indexmap::{IndexMap, IndexSet};
use tracing::{trace, warn};

use crate::binding::Binding;
use crate::error::{Error, Result};
use crate::graph::{GraphStore, NodeId};
use crate::registry::Shared;
use crate::task::{Callable, TaskFn};
use crate::value::{Args, Value};

/// Resolve `root` against the registry state.
pub(crate) fn resolve(shared: &Shared, root: NodeId) -> Result<Value> {
    let guard = shared.state.lock();
    let evaluator = Evaluator {
        shared,
        store: &*guard,
        resolving: IndexSet::new(),
        stack: vec![Step::Enter(root)],
    };
    evaluator.run(root)
}

enum Step {
    /// Visit a node: stop if clean, otherwise schedule its dependencies.
    Enter(NodeId),
    /// All dependencies are clean; run the node's function.
    Exit(NodeId),
}

/// What a node needs before its function can run.
enum Prepared {
    /// Every reference is clean; call `task` with `args`.
    Ready {
        task: TaskFn,
        args: Args,
        revision: u64,
    },
    /// These dependencies became dirty again after being scheduled.
    Pending(Vec<NodeId>),
}

struct Evaluator<'a> {
    shared: &'a Shared,
    store: &'a RefCell<GraphStore>,
    /// Nodes entered but not yet exited, in path order.
    resolving: IndexSet<NodeId>,
    stack: Vec<Step>,
}

impl Evaluator<'_> {
    fn run(mut self, root: NodeId) -> Result<Value> {
        while let Some(step) = self.stack.pop() {
            match step {
                Step::Enter(id) => {
                    if let Some(value) = self.enter(id)? {
                        if id == root {
                            return Ok(value);
                        }
                    }
                }
                Step::Exit(id) => {
                    if let Some(value) = self.exit(id)? {
                        if id == root {
                            return Ok(value);
                        }
                    }
                }
            }
        }

        // `Enter(root)` either returns the cached value or pushes
        // `Exit(root)` beneath everything else, and `Exit(root)` returns.
        unreachable!("resolve of {root} drained its stack without exiting the root")
    }

    /// Returns the cached value if the node is clean; otherwise schedules it.
    fn enter(&mut self, id: NodeId) -> Result<Option<Value>> {
        let store = self.store.borrow();
        let node = store.get(id)?;

        if let Some(value) = node.cached_value() {
            trace!(node = %id, "memoization hit");
            return Ok(Some(value.clone()));
        }

        if store.is_in_flight(id) || self.resolving.contains(&id) {
            return Err(self.cycle_through(id));
        }

        if let Some(limit) = self.shared.config.max_depth {
            if self.resolving.len() >= limit {
                return Err(Error::DepthExceeded { node: id, limit });
            }
        }

        self.resolving.insert(id);
        self.stack.push(Step::Exit(id));
        for dep in node.dependencies().into_iter().rev() {
            if store.get(dep)?.is_dirty() {
                self.stack.push(Step::Enter(dep));
            }
        }

        Ok(None)
    }

    /// Runs the node's function once its dependencies are clean.
    fn exit(&mut self, id: NodeId) -> Result<Option<Value>> {
        let (task, args, revision) = match self.prepare(id)? {
            Prepared::Ready {
                task,
                args,
                revision,
            } => (task, args, revision),
            Prepared::Pending(deps) => {
                trace!(node = %id, pending = deps.len(), "dependencies went stale, rescheduling");
                self.stack.push(Step::Exit(id));
                for dep in deps.into_iter().rev() {
                    self.stack.push(Step::Enter(dep));
                }
                return Ok(None);
            }
        };

        trace!(node = %id, task = task.name(), "invoking task");
        let outcome = {
            let _flight = FlightGuard::enter(self.store, id);
            task.call(&args)
        };
        self.resolving.shift_remove(&id);

        let value = match outcome {
            Ok(value) => value,
            Err(source) => {
                warn!(node = %id, task = task.name(), error = %source, "task failed");
                return Err(Error::Evaluation {
                    node: id,
                    task: task.name().to_string(),
                    source,
                });
            }
        };

        let mut store = self.store.borrow_mut();
        let node = store.get_mut(id)?;
        if node.revision() == revision {
            node.store(value.clone());
        } else {
            warn!(node = %id, "node was rewired while computing; result not cached");
        }

        Ok(Some(value))
    }

    /// Gather the function and resolved arguments for `id`.
    fn prepare(&self, id: NodeId) -> Result<Prepared> {
        let store = self.store.borrow();
        let node = store.get(id)?;
        let mut pending = Vec::new();

        let mut resolve = |binding: &Binding| -> Result<Value> {
            match binding {
                Binding::Literal(value) => Ok(value.clone()),
                Binding::Reference(dep) => match store.get(*dep)?.cached_value() {
                    Some(value) => Ok(value.clone()),
                    None => {
                        pending.push(*dep);
                        Ok(Value::Unit)
                    }
                },
            }
        };

        let positional = node
            .positional()
            .iter()
            .map(&mut resolve)
            .collect::<Result<Vec<_>>>()?;
        let named = node
            .named()
            .iter()
            .map(|(name, binding)| -> Result<(String, Value)> {
                Ok((name.clone(), resolve(binding)?))
            })
            .collect::<Result<IndexMap<_, _>>>()?;

        if !pending.is_empty() {
            let pending: IndexSet<NodeId> = pending.into_iter().collect();
            return Ok(Prepared::Pending(pending.into_iter().collect()));
        }

        let task = match node.callable() {
            Callable::Direct(task) => task.clone(),
            Callable::Named(name) => self
                .shared
                .tasks
                .get(&**name)
                .map(|entry| entry.value().clone())
                .ok_or_else(|| Error::UnboundTask {
                    node: id,
                    name: name.to_string(),
                })?,
        };

        Ok(Prepared::Ready {
            task,
            args: Args::new(positional, named),
            revision: node.revision(),
        })
    }

    /// Build the cycle error for reaching `id` again.
    fn cycle_through(&self, id: NodeId) -> Error {
        let mut path: Vec<NodeId> = match self.resolving.get_index_of(&id) {
            Some(start) => self.resolving.iter().skip(start).copied().collect(),
            None => self.resolving.iter().copied().collect(),
        };
        path.push(id);
        Error::Cycle { node: id, path }
    }
}

/// Marks a node in flight while its function runs.
///
/// The mark is cleared on drop, so it does not outlive a panicking task.
struct FlightGuard<'a> {
    store: &'a RefCell<GraphStore>,
    id: NodeId,
}

impl<'a> FlightGuard<'a> {
    fn enter(store: &'a RefCell<GraphStore>, id: NodeId) -> Self {
        store.borrow_mut().enter_flight(id);
        Self { store, id }
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut store) = self.store.try_borrow_mut() {
            store.leave_flight(self.id);
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
