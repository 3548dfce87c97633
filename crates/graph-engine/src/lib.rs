//! Graph Engine - the block graph behind the Blockflow editor
//!
//! This crate holds everything about a robotics block graph that does not
//! depend on a screen or a network:
//!
//! - `BlockCatalog`: the registry of block types and their typed ports
//! - `GraphStore`: nodes, edges, and z-ordering with strict invariants
//! - `ConnectionEngine`: the two-phase (output, then input) edge protocol
//! - `GraphDocument`: the `graph.v1` exchange format and its importer
//! - `LocalSnapshot` and `SnapshotStorage`: trusted autosaves
//! - `EditorSession`: one editor's store, selection, and run config
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use graph_engine::{BlockCatalog, EditorSession, Position};
//!
//! let mut session = EditorSession::new(Arc::new(BlockCatalog::builtin()));
//! let sim = session.place_block("mujoco_sim", Position::new(80.0, 120.0)).unwrap();
//! let log = session.place_block("logger", Position::new(360.0, 120.0)).unwrap();
//! session.begin_connection(&sim, "state").unwrap();
//! session.complete_connection(&log, "state").unwrap();
//!
//! let json = session.to_document().to_json_pretty().unwrap();
//! assert!(json.contains("graph.v1"));
//! ```

pub mod catalog;
pub mod connection;
pub mod document;
pub mod error;
pub mod order;
pub mod params;
pub mod persistence;
pub mod session;
pub mod store;
pub mod types;
pub mod validation;

// Re-export key types
pub use catalog::{BlockCatalog, BlockTypeSchema, PortSchema, MODEL_PATH_PARAM};
pub use connection::{ConnectionEngine, ConnectionState};
pub use document::{
    export_to_path, import_from_path, GraphDocument, LoadReport, RunConfig, GRAPH_FORMAT_VERSION,
};
pub use error::{ConnectError, GraphError, Result};
pub use order::execution_order;
pub use params::coerce_param;
pub use persistence::{FileSnapshotStorage, LocalSnapshot, MemorySnapshotStorage, SnapshotStorage};
pub use session::EditorSession;
pub use store::{GraphStore, MAX_Z_ORDER};
pub use types::{
    BlockCategory, DataType, Direction, Edge, Node, NodeId, ParamKind, ParamValue, Params,
    PortRef, Position,
};
pub use validation::{validate_graph, ValidationIssue};
