//! Error types for the graph engine

use thiserror::Error;

use crate::types::{DataType, Direction, NodeId};

/// Result type alias using GraphError
pub type Result<T> = std::result::Result<T, GraphError>;

/// Errors that can occur while editing, loading, or saving a graph
#[derive(Debug, Error)]
pub enum GraphError {
    /// Block type is not registered in the catalog
    #[error("Unknown block type: {0}")]
    UnknownBlockType(String),

    /// Node id does not exist in the store
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// Port is not declared on the node's schema in the given direction
    #[error("Port '{port}' not found as {direction} on node '{node_id}'")]
    PortNotFound {
        node_id: NodeId,
        port: String,
        direction: Direction,
    },

    /// Edge would break a store invariant
    #[error("Invalid edge: {0}")]
    InvalidEdge(String),

    /// Block schema failed registration checks
    #[error("Invalid block schema '{block_type}': {reason}")]
    InvalidSchema { block_type: String, reason: String },

    /// Raw user input could not be converted to the parameter's kind
    #[error("Invalid value '{raw}' for parameter '{key}': expected {expected}")]
    InvalidParam {
        key: String,
        raw: String,
        expected: String,
    },

    /// Document version is missing or not `graph.v1`
    #[error("Unsupported document version: {}", .found.as_deref().unwrap_or("<missing>"))]
    UnsupportedVersion { found: Option<String> },

    /// Document is structurally unusable
    #[error("Malformed document: {0}")]
    MalformedDocument(String),

    /// No snapshot stored under the given key
    #[error("Snapshot not found: {0}")]
    SnapshotNotFound(String),

    /// Snapshot key cannot be used as a storage name
    #[error("Invalid snapshot key: '{0}'")]
    InvalidSnapshotKey(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GraphError {
    /// Create an invalid edge error with a message
    pub fn invalid_edge(msg: impl Into<String>) -> Self {
        Self::InvalidEdge(msg.into())
    }

    /// Create a malformed document error with a message
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedDocument(msg.into())
    }
}

/// Reasons the connection protocol rejects a proposed edge
///
/// Checked in declaration order; the first failing check wins. Every
/// variant leaves the store untouched and returns the engine to idle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectError {
    /// Source and target are the same node
    #[error("Cannot connect a block to itself")]
    SameNode,

    /// A referenced node no longer exists
    #[error("Node '{node_id}' no longer exists")]
    NodeNotFound { node_id: NodeId },

    /// The port is not a declared port in the required direction
    #[error("Node '{node_id}' has no {direction} port '{port}'")]
    PortNotFound {
        node_id: NodeId,
        port: String,
        direction: Direction,
    },

    /// Output and input carry different data types
    #[error("Type mismatch: {from_type} -> {to_type}")]
    TypeMismatch { from_type: DataType, to_type: DataType },

    /// An identical edge already exists
    #[error("Connection already exists")]
    DuplicateEdge,

    /// `complete_to` was called without a pending output
    #[error("No pending connection")]
    NoPendingConnection,

    /// The store refused an edge that passed the protocol checks
    #[error("Connection rejected: {0}")]
    Rejected(String),
}
