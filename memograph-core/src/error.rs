//! Errors
//!
//! Every fallible operation in the crate returns [`Result`], whose error type
//! is the single [`Error`] enum below.
//!
//! # Error Categories
//!
//! - **Construction errors**: [`Error::UnknownNode`], [`Error::Cycle`]. These
//!   are raised before any mutation, so the graph is left untouched.
//! - **Evaluation errors**: [`Error::Evaluation`], [`Error::UnboundTask`],
//!   [`Error::DepthExceeded`]. Nothing is cached along the failed path and the
//!   failing node stays dirty, so a later `compute()` retries from scratch.
//! - **Output errors**: [`Error::Render`], [`Error::Snapshot`].

use thiserror::Error;

use crate::graph::NodeId;

/// Boxed error returned by wrapped task functions.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the computation graph.
#[derive(Debug, Error)]
pub enum Error {
    /// An operation referenced a node that the acting registry does not own.
    #[error("node {node} is not owned by this registry")]
    UnknownNode {
        /// The foreign or missing node.
        node: NodeId,
    },

    /// A binding would introduce a circular dependency.
    ///
    /// `path` lists the nodes on the offending path, starting and ending at
    /// the node that would depend on itself.
    #[error("dependency cycle through node {node}: {path:?}")]
    Cycle {
        /// The node that would end up depending on itself.
        node: NodeId,
        /// Nodes involved in the cycle.
        path: Vec<NodeId>,
    },

    /// A wrapped function failed while its node was being resolved.
    #[error("task `{task}` failed while computing node {node}")]
    Evaluation {
        /// The node whose function failed.
        node: NodeId,
        /// Name of the function bound to that node.
        task: String,
        /// The error returned by the function.
        #[source]
        source: BoxError,
    },

    /// A node created through `add_task` was resolved before any
    /// implementation was defined for its name.
    #[error("no implementation defined for task `{name}` (node {node})")]
    UnboundTask {
        /// The node bound to the missing name.
        node: NodeId,
        /// The task name that could not be resolved.
        name: String,
    },

    /// Resolution walked deeper than `GraphConfig::max_depth`.
    #[error("resolving node {node} exceeded the maximum depth of {limit}")]
    DepthExceeded {
        /// The node that would have exceeded the limit.
        node: NodeId,
        /// The configured limit.
        limit: usize,
    },

    /// The output sink used by `print` failed.
    #[error("failed to render value: {0}")]
    Render(#[from] std::io::Error),

    /// A graph snapshot could not be encoded or decoded.
    #[error("snapshot error: {0}")]
    Snapshot(String),
}

impl Error {
    /// The node the error is attributed to, if any.
    pub fn node(&self) -> Option<NodeId> {
        match self {
            Error::UnknownNode { node }
            | Error::Cycle { node, .. }
            | Error::Evaluation { node, .. }
            | Error::UnboundTask { node, .. }
            | Error::DepthExceeded { node, .. } => Some(*node),
            Error::Render(_) | Error::Snapshot(_) => None,
        }
    }

    /// Whether this error came from resolving a node (as opposed to building
    /// or rewiring the graph).
    pub fn is_evaluation(&self) -> bool {
        matches!(
            self,
            Error::Evaluation { .. } | Error::UnboundTask { .. } | Error::DepthExceeded { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evaluation_error_exposes_source() {
        let err = Error::Evaluation {
            node: NodeId::from(3),
            task: "div".to_string(),
            source: "division by zero".into(),
        };

        assert_eq!(err.to_string(), "task `div` failed while computing node 3");
        assert_eq!(err.node(), Some(NodeId::from(3)));
        assert!(err.is_evaluation());

        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("division by zero"));
    }

    #[test]
    fn construction_errors_are_not_evaluation_errors() {
        let err = Error::Cycle {
            node: NodeId::from(1),
            path: vec![NodeId::from(1), NodeId::from(2), NodeId::from(1)],
        };
        assert!(!err.is_evaluation());
        assert_eq!(Error::UnknownNode { node: NodeId::from(9) }.node(), Some(NodeId::from(9)));
    }
}
