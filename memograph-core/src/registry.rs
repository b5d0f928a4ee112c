//! Graph Registry
//!
//! The registry is the owning collection of one computation session. It hands
//! out constructors for task functions, creates nodes when those constructors
//! are called, and is the only entry point for rewiring an existing node.
//!
//! # Ownership
//!
//! A [`GraphRegistry`] and every [`Node`] handle it produced share one
//! reference-counted state. Nodes are never removed; the whole graph is freed
//! once the registry and all handles to it are dropped.
//!
//! # Thread Safety
//!
//! The node store sits behind a per-registry reentrant lock. A resolve holds
//! it for its whole duration and so does a rewire, which makes the
//! detach/install/mark-dirty/propagate sequence atomic with respect to a
//! resolve running on another thread. Because the lock is reentrant, a task
//! function may call back into the same registry from the same thread.

use std::cell::RefCell;
use std::fmt;
use std::io::{self, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::ReentrantMutex;
use tracing::debug;

use crate::binding::{Arg, Arguments, Binding};
use crate::config::{GraphConfig, RenderFormat};
use crate::error::{Error, Result};
use crate::evaluator;
use crate::graph::{GraphStore, Named, NodeId, NodeState, Positional};
use crate::invalidator;
use crate::snapshot::GraphSnapshot;
use crate::task::{Callable, TaskFn};
use crate::value::{Args, Value};

/// Unique identifier for a registry within the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegistryId(u64);

impl RegistryId {
    /// Generate a new unique registry ID.
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// State shared between a registry and all of its handles.
pub(crate) struct Shared {
    pub(crate) id: RegistryId,
    pub(crate) config: GraphConfig,
    pub(crate) state: ReentrantMutex<RefCell<GraphStore>>,
    /// Implementations for nodes created through `add_task`.
    pub(crate) tasks: DashMap<String, TaskFn>,
}

impl Shared {
    /// Convert caller arguments into bindings, rejecting nodes that belong
    /// to another registry.
    pub(crate) fn bind(&self, arguments: Arguments) -> Result<(Positional, Named)> {
        let positional = arguments
            .positional
            .into_iter()
            .map(|arg| self.binding(arg))
            .collect::<Result<Positional>>()?;
        let named = arguments
            .named
            .into_iter()
            .map(|(name, arg)| -> Result<(String, Binding)> { Ok((name, self.binding(arg)?)) })
            .collect::<Result<Named>>()?;
        Ok((positional, named))
    }

    fn binding(&self, arg: Arg) -> Result<Binding> {
        match arg {
            Arg::Value(value) => Ok(Binding::Literal(value)),
            Arg::Node(node) if node.shared.id == self.id => Ok(Binding::Reference(node.id)),
            Arg::Node(node) => Err(Error::UnknownNode { node: node.id }),
        }
    }

    fn create(&self, callable: Callable, arguments: Arguments) -> Result<NodeId> {
        let (positional, named) = self.bind(arguments)?;
        let guard = self.state.lock();
        let mut store = guard.borrow_mut();
        let task = callable.name().to_string();
        let id = store.insert(callable, positional, named)?;
        debug!(
            node = %id,
            task = %task,
            dependencies = store.get(id)?.dependencies().len(),
            "created node"
        );
        Ok(id)
    }

    /// Read one node under the lock.
    fn inspect<R>(&self, id: NodeId, f: impl FnOnce(&NodeState) -> R) -> Result<R> {
        let guard = self.state.lock();
        let store = guard.borrow();
        store.get(id).map(f)
    }
}

/// The owning collection of nodes forming one computation session.
///
/// # Example
///
/// ```rust,ignore
/// let graph = GraphRegistry::new();
/// let add = graph.register(TaskFn::new("add", |a| Ok(Value::Int(a.int(0)? + a.int(1)?))));
///
/// let three = add.call(args![1, 2])?;
/// let six = add.call(args![3, &three])?;
/// assert_eq!(six.compute()?, Value::Int(6));
/// ```
#[derive(Clone)]
pub struct GraphRegistry {
    shared: Arc<Shared>,
}

impl GraphRegistry {
    /// Create an empty registry with the default configuration.
    pub fn new() -> Self {
        Self::with_config(GraphConfig::default())
    }

    pub fn with_config(config: GraphConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                id: RegistryId::new(),
                config,
                state: ReentrantMutex::new(RefCell::new(GraphStore::new())),
                tasks: DashMap::new(),
            }),
        }
    }

    pub fn id(&self) -> RegistryId {
        self.shared.id
    }

    pub fn config(&self) -> &GraphConfig {
        &self.shared.config
    }

    /// Get a constructor that creates nodes bound to `task`.
    pub fn register(&self, task: TaskFn) -> Constructor {
        Constructor {
            shared: Arc::clone(&self.shared),
            callable: Callable::Direct(task),
        }
    }

    /// Shorthand for `register(TaskFn::new(name, body))`.
    pub fn register_fn<F>(&self, name: &str, body: F) -> Constructor
    where
        F: Fn(&Args) -> std::result::Result<Value, crate::BoxError> + Send + Sync + 'static,
    {
        self.register(TaskFn::new(name, body))
    }

    /// Get a constructor whose nodes look up their implementation by `name`
    /// when they are resolved.
    ///
    /// The implementation does not need to exist yet; see
    /// [`define_task`](Self::define_task).
    pub fn add_task(&self, name: impl Into<Arc<str>>) -> Constructor {
        Constructor {
            shared: Arc::clone(&self.shared),
            callable: Callable::Named(name.into()),
        }
    }

    /// Install or replace the implementation behind `name`.
    ///
    /// Replacing an existing implementation invalidates every node created
    /// through `add_task(name)` and everything downstream of them. Returns
    /// the nodes that were marked dirty.
    pub fn define_task(&self, name: &str, task: TaskFn) -> Vec<NodeId> {
        invalidator::redefine(&self.shared, name, task)
    }

    /// Whether an implementation is defined for `name`.
    pub fn has_task(&self, name: &str) -> bool {
        self.shared.tasks.contains_key(name)
    }

    /// Get a handle for rewiring `node`.
    ///
    /// Fails with [`Error::UnknownNode`] if `node` belongs to another
    /// registry.
    pub fn update_task(&self, node: &Node) -> Result<Rewire> {
        self.owns(node)?;
        Ok(Rewire {
            shared: Arc::clone(&self.shared),
            node: node.id,
        })
    }

    /// Look up the handle for a node by ID.
    pub fn node(&self, id: NodeId) -> Result<Node> {
        let guard = self.shared.state.lock();
        if !guard.borrow().contains(id) {
            return Err(Error::UnknownNode { node: id });
        }
        Ok(Node {
            id,
            shared: Arc::clone(&self.shared),
        })
    }

    pub fn node_count(&self) -> usize {
        self.shared.state.lock().borrow().node_count()
    }

    /// Every node currently marked dirty, in creation order.
    pub fn dirty_nodes(&self) -> Vec<NodeId> {
        self.shared.state.lock().borrow().dirty_nodes()
    }

    /// Capture the structure of the graph (without cached values).
    pub fn snapshot(&self) -> GraphSnapshot {
        let guard = self.shared.state.lock();
        let store = guard.borrow();
        GraphSnapshot::capture(&store)
    }

    fn owns(&self, node: &Node) -> Result<()> {
        if node.shared.id == self.shared.id {
            Ok(())
        } else {
            Err(Error::UnknownNode { node: node.id })
        }
    }
}

impl Default for GraphRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for GraphRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphRegistry")
            .field("id", &self.shared.id)
            .field("node_count", &self.node_count())
            .field("config", &self.shared.config)
            .finish()
    }
}

/// Creates nodes bound to one task function.
#[derive(Clone)]
pub struct Constructor {
    shared: Arc<Shared>,
    callable: Callable,
}

impl Constructor {
    /// Create a new node with the given arguments.
    ///
    /// Node arguments become references, everything else becomes a literal.
    /// No type checking happens here; mismatches surface when the node is
    /// computed.
    pub fn call(&self, args: impl Into<Arguments>) -> Result<Node> {
        let id = self.shared.create(self.callable.clone(), args.into())?;
        Ok(Node {
            id,
            shared: Arc::clone(&self.shared),
        })
    }

    /// Name of the task this constructor binds.
    pub fn task_name(&self) -> &str {
        self.callable.name()
    }
}

impl fmt::Debug for Constructor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Constructor")
            .field("task", &self.callable.name())
            .finish()
    }
}

/// Replaces the function and arguments of one existing node.
///
/// Obtained from [`GraphRegistry::update_task`].
#[derive(Clone)]
pub struct Rewire {
    shared: Arc<Shared>,
    node: NodeId,
}

impl Rewire {
    /// Bind the node to `task` with new arguments.
    ///
    /// The node and everything downstream of it become dirty; nothing is
    /// recomputed until the next `compute`. Returns the nodes marked dirty,
    /// starting with the rewired node. Fails with [`Error::Cycle`] without
    /// changing anything if the new arguments would make the node depend on
    /// itself.
    pub fn call(&self, task: TaskFn, args: impl Into<Arguments>) -> Result<Vec<NodeId>> {
        invalidator::rewire(&self.shared, self.node, Callable::Direct(task), args.into())
    }

    /// Like [`call`](Self::call), but binds the node to a named task.
    pub fn task(&self, name: impl Into<Arc<str>>, args: impl Into<Arguments>) -> Result<Vec<NodeId>> {
        invalidator::rewire(&self.shared, self.node, Callable::Named(name.into()), args.into())
    }

    /// Keep the node's function and replace only its arguments.
    pub fn args(&self, args: impl Into<Arguments>) -> Result<Vec<NodeId>> {
        let callable = self.shared.inspect(self.node, |node| node.callable().clone())?;
        invalidator::rewire(&self.shared, self.node, callable, args.into())
    }

    pub fn node(&self) -> NodeId {
        self.node
    }
}

impl fmt::Debug for Rewire {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rewire").field("node", &self.node).finish()
    }
}

/// Handle to one memoized computation.
///
/// Handles are cheap to clone and keep their registry alive.
#[derive(Clone)]
pub struct Node {
    id: NodeId,
    shared: Arc<Shared>,
}

impl Node {
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// The registry that owns this node.
    pub fn registry(&self) -> GraphRegistry {
        GraphRegistry {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Resolve the node's value, computing dirty dependencies first.
    ///
    /// A clean node returns its cached value without calling anything.
    pub fn compute(&self) -> Result<Value> {
        evaluator::resolve(&self.shared, self.id)
    }

    /// Compute the value and write it to stdout.
    ///
    /// Stdout is only locked once the value is computed; task functions
    /// running under the registry lock may write to it too.
    pub fn print(&self) -> Result<()> {
        let value = self.compute()?;
        let stdout = io::stdout();
        let mut out = stdout.lock();
        self.render(&value, &mut out)
    }

    /// Compute the value and write it, followed by a newline, to `out` using
    /// the registry's render format.
    pub fn print_to<W: Write>(&self, out: &mut W) -> Result<()> {
        let value = self.compute()?;
        self.render(&value, out)
    }

    /// Write `value`, followed by a newline, in the registry's render format.
    pub fn render<W: Write>(&self, value: &Value, out: &mut W) -> Result<()> {
        match self.shared.config.render {
            RenderFormat::Display => writeln!(out, "{value}")?,
            RenderFormat::Json => {
                serde_json::to_writer(&mut *out, value).map_err(io::Error::from)?;
                writeln!(out)?;
            }
        }
        Ok(())
    }

    // The lookups below cannot fail: a handle is only created for a node of
    // its own registry, and nodes are never removed.

    /// Whether the next `compute` will call this node's function.
    pub fn is_dirty(&self) -> bool {
        self.shared
            .inspect(self.id, NodeState::is_dirty)
            .unwrap_or(true)
    }

    /// The cached value, without computing anything.
    pub fn peek(&self) -> Option<Value> {
        self.shared
            .inspect(self.id, |node| node.cached_value().cloned())
            .ok()
            .flatten()
    }

    /// Name of the function currently bound to this node.
    pub fn task_name(&self) -> String {
        self.shared
            .inspect(self.id, |node| node.callable().name().to_string())
            .unwrap_or_default()
    }

    /// Nodes this node reads from.
    pub fn dependencies(&self) -> Vec<NodeId> {
        self.shared
            .inspect(self.id, |node| node.dependencies().into_iter().collect())
            .unwrap_or_default()
    }

    /// Nodes that read from this node directly.
    pub fn dependents(&self) -> Vec<NodeId> {
        self.shared
            .inspect(self.id, |node| node.dependents().iter().copied().collect())
            .unwrap_or_default()
    }

    /// The dirty nodes `compute` would run, in the order it would run them.
    pub fn pending(&self) -> Result<Vec<NodeId>> {
        let guard = self.shared.state.lock();
        let store = guard.borrow();
        store.plan(self.id)
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.shared.id == other.shared.id
    }
}

impl Eq for Node {}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("registry", &self.shared.id)
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
