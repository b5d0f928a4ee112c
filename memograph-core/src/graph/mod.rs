//! Dependency Graph
//!
//! This module holds the node records and the store that owns them.
//!
//! # Overview
//!
//! The dependency graph is a directed acyclic graph (DAG) where:
//!
//! - Nodes represent one memoized invocation of a task function
//! - Edges represent dependencies: if B reads A's value, A lists B among its
//!   dependents
//!
//! Forward edges live in each node's bindings (`Binding::Reference`), reverse
//! edges in each node's `dependents` set. The store keeps the two in sync.
//! Forward edges drive evaluation (leaves first), reverse edges drive
//! invalidation (breadth first, downstream).

mod node;
mod store;

pub use node::{NodeId, NodeState};
pub use store::GraphStore;

pub(crate) use node::{Named, Positional};
