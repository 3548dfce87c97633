//! Core types for block graphs
//!
//! These types define the nodes, edges, ports, and parameter values
//! held by the [`GraphStore`](crate::store::GraphStore).

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{GraphError, Result};

/// Unique identifier for a node
pub type NodeId = String;

/// Name of a port, unique per direction within a block type
pub type PortName = String;

/// Parameter values of a node, keyed by parameter name
pub type Params = BTreeMap<String, ParamValue>;

/// Separator between node id and port name in flattened port keys
pub const PORT_SEPARATOR: char = '.';

/// The data type carried by a port (e.g. `robot_state`)
///
/// Types are catalog-defined names; two ports are compatible only when
/// their names are identical.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataType(String);

impl DataType {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DataType {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Direction of a port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Input,
    Output,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input => f.write_str("input"),
            Self::Output => f.write_str("output"),
        }
    }
}

/// Category of a block type, used for grouping and execution ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockCategory {
    /// Produces signals (trajectories, setpoints)
    Source,
    /// Computes commands from state
    Controller,
    /// Physics simulation; requires a model path to run
    Simulator,
    /// Consumes signals (loggers, recorders)
    Sink,
    /// Anything uncategorized
    #[default]
    Other,
}

impl BlockCategory {
    /// Priority tier for execution ordering (lower runs first)
    pub fn tier(self) -> u8 {
        match self {
            Self::Source => 0,
            Self::Controller => 1,
            Self::Simulator => 2,
            Self::Sink => 3,
            Self::Other => 4,
        }
    }

    /// Parse a category name as published by the execution service
    ///
    /// Case-insensitive, accepts the service's short aliases. Unknown
    /// names map to [`BlockCategory::Other`].
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "source" | "src" => Self::Source,
            "controller" | "control" => Self::Controller,
            "simulator" | "sim" | "simulation" => Self::Simulator,
            "sink" => Self::Sink,
            _ => Self::Other,
        }
    }
}

/// Presentation-only position on the canvas
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A parameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl ParamValue {
    /// The kind of this value
    pub fn kind(&self) -> ParamKind {
        match self {
            Self::Bool(_) => ParamKind::Bool,
            Self::Int(_) => ParamKind::Int,
            Self::Float(_) => ParamKind::Float,
            Self::String(_) => ParamKind::String,
        }
    }

    /// String contents, if this is a string value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// The declared kind of a parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    Int,
    Float,
    String,
    Bool,
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int => f.write_str("integer"),
            Self::Float => f.write_str("number"),
            Self::String => f.write_str("string"),
            Self::Bool => f.write_str("boolean"),
        }
    }
}

/// Reference to a port on a node
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortRef {
    pub node_id: NodeId,
    pub port: PortName,
}

impl PortRef {
    pub fn new(node_id: impl Into<NodeId>, port: impl Into<PortName>) -> Self {
        Self {
            node_id: node_id.into(),
            port: port.into(),
        }
    }

    /// Flatten to the `nodeId.port` form used in exchange documents
    pub fn encode(&self) -> String {
        format!("{}{}{}", self.node_id, PORT_SEPARATOR, self.port)
    }

    /// Parse the `nodeId.port` form
    ///
    /// Splits on the first separator. Both halves must be non-empty.
    pub fn decode(key: &str) -> Result<Self> {
        match key.split_once(PORT_SEPARATOR) {
            Some((node_id, port)) if !node_id.is_empty() && !port.is_empty() => {
                Ok(Self::new(node_id, port))
            }
            _ => Err(GraphError::malformed(format!(
                "invalid endpoint '{}', expected 'nodeId.port'",
                key
            ))),
        }
    }
}

impl fmt::Display for PortRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.node_id, PORT_SEPARATOR, self.port)
    }
}

/// A placed instance of a block type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Unique identifier, immutable after creation
    pub id: NodeId,
    /// Block type (references a schema in the catalog)
    #[serde(rename = "type")]
    pub block_type: String,
    /// Display label
    pub label: String,
    /// Canvas position
    pub position: Position,
    /// Stacking order; distinct across nodes
    #[serde(rename = "z")]
    pub z_order: u64,
    /// Per-node parameter values
    pub params: Params,
}

/// A validated connection from an output port to an input port
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    /// Output port
    pub from: PortRef,
    /// Input port
    pub to: PortRef,
    /// Shared type of both endpoints
    pub data_type: DataType,
}

impl Edge {
    pub fn new(from: PortRef, to: PortRef, data_type: DataType) -> Self {
        Self {
            from,
            to,
            data_type,
        }
    }

    /// Whether either endpoint is on the given node
    pub fn touches(&self, node_id: &str) -> bool {
        self.from.node_id == node_id || self.to.node_id == node_id
    }

    /// Whether this edge connects the same pair of ports
    pub fn same_endpoints(&self, from: &PortRef, to: &PortRef) -> bool {
        &self.from == from && &self.to == to
    }
}
