//! Error types for tree mutation and network construction.
//!
//! Expected-absence cases (unknown parameter ids, unresolved connection
//! targets, empty containers) are not errors; lookups return `Option` and
//! inert connections are dropped.

use thiserror::Error;

/// Misuse of the [`ValueTree`](crate::ValueTree) mutation API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    /// The child is already attached to another parent.
    #[error("'{0}' entity already has a parent")]
    AlreadyHasParent(String),

    /// The child is the target entity itself or one of its ancestors.
    #[error("adding '{0}' would create a cycle")]
    WouldCreateCycle(String),

    /// A positional access was outside the child list.
    #[error("child index {index} out of range (len {len})")]
    IndexOutOfRange {
        /// Requested index.
        index: usize,
        /// Number of children at the time of the call.
        len: usize,
    },
}

/// Errors raised while building or editing a [`Network`](crate::Network).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// No constructor is registered for the factory path.
    #[error("unknown factory path '{0}'")]
    UnknownFactoryPath(String),

    /// The network tree has no root `Node` entity.
    #[error("network tree has no root node")]
    MissingRoot,

    /// The root node is not a container.
    #[error("root node '{0}' is not a container")]
    RootNotContainer(String),

    /// Two nodes share the same id.
    #[error("duplicate node id '{0}'")]
    DuplicateId(String),

    /// The tree does not describe a network.
    #[error("invalid network tree: {0}")]
    InvalidTree(String),

    /// Tree mutation failed.
    #[error(transparent)]
    Tree(#[from] TreeError),
}
