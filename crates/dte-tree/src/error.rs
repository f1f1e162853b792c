//! Error types for the tree model.

use crate::node::NodeId;

/// Errors produced by tree construction and editing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    /// A `NodeId` does not refer to a node of this tree.
    #[error("node not found: {0}")]
    NodeNotFound(NodeId),

    /// Property names must be non-empty.
    #[error("empty property name")]
    EmptyPropertyName,

    /// Node names (other than the root) must be non-empty.
    #[error("empty node name")]
    EmptyNodeName,

    /// A deserialized arena breaks the tree invariants.
    #[error("corrupt tree: {0}")]
    Corrupt(String),
}

/// Convenience alias for tree results.
pub type TreeResult<T> = Result<T, TreeError>;
