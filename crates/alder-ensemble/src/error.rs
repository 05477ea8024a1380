//! Error types for ensemble operations.

use snafu::Snafu;

/// Errors reported by an ensemble client or session.
#[derive(Debug, Clone, Snafu, PartialEq, Eq)]
#[snafu(visibility(pub))]
pub enum EnsembleError {
    /// Create was refused because the path is already present.
    #[snafu(display("node already exists at '{path}'"))]
    NodeExists {
        /// The path that was already present.
        path: String,
    },

    /// Remove was refused because the node still has children.
    #[snafu(display("node at '{path}' is not empty"))]
    NotEmpty {
        /// The path whose children blocked the delete.
        path: String,
    },

    /// The operation's target path does not exist.
    #[snafu(display("no node at '{path}'"))]
    NoNode {
        /// The missing path.
        path: String,
    },

    /// The session has ended; no further operations are possible on it.
    #[snafu(display("session is closed"))]
    SessionClosed,

    /// The session could not be established or was lost mid-operation.
    #[snafu(display("connection to '{host}' failed: {reason}"))]
    Connection {
        /// The ensemble address.
        host: String,
        /// Human-readable description of the failure.
        reason: String,
    },
}

impl EnsembleError {
    /// Returns true for the benign create race: the path was already present.
    pub fn is_node_exists(&self) -> bool {
        matches!(self, EnsembleError::NodeExists { .. })
    }
}
