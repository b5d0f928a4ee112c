//! Memograph Core
//!
//! An incremental, memoizing computation graph. Each node wraps a function
//! and its arguments; arguments are either literal values or references to
//! other nodes. Computing a node computes its dirty dependencies first and
//! caches every result, so a clean node is never recomputed.
//!
//! Rewiring a node (new function, new arguments, or both) marks that node and
//! everything downstream of it dirty. Nothing recomputes until it is asked
//! for again.
//!
//! # Architecture
//!
//! - `registry`: the owning collection, node constructors and handles
//! - `graph`: node records and the store that keeps edges consistent
//! - `evaluator`: pull-based, memoized resolution
//! - `invalidator`: rewiring and dirty propagation
//! - `snapshot`: serializable view of the graph structure
//!
//! # Example
//!
//! ```rust,ignore
//! use memograph_core::{args, GraphRegistry, TaskFn, Value};
//!
//! let graph = GraphRegistry::new();
//! let ret = graph.register(TaskFn::infallible("ret", |a| a.value(0).cloned().unwrap_or_default()));
//! let add = graph.register(TaskFn::new("add", |a| Ok(Value::Int(a.int(0)? + a.int(1)?))));
//!
//! let ret1 = ret.call(args![3])?;
//! let ret2 = add.call(args![3, &ret1])?;
//! assert_eq!(ret2.compute()?, Value::Int(6));
//!
//! graph.update_task(&ret1)?.args(args![4])?;
//! assert_eq!(ret2.compute()?, Value::Int(7));
//! ```

mod binding;
mod config;
mod error;
mod evaluator;
pub mod graph;
mod invalidator;
mod registry;
mod snapshot;
mod task;
mod value;

pub use binding::{Arg, Arguments, Binding};
pub use config::{GraphConfig, RenderFormat};
pub use error::{BoxError, Error, Result};
pub use graph::NodeId;
pub use registry::{Constructor, GraphRegistry, Node, RegistryId, Rewire};
pub use snapshot::{GraphSnapshot, NodeSnapshot};
pub use task::{Callable, TaskFn};
pub use value::{ArgError, Args, Slot, Value};
