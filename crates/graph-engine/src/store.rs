//! Graph store: the single owner of nodes and edges
//!
//! All mutation goes through the methods here, so the referential and
//! uniqueness invariants are enforced at one chokepoint:
//!
//! - every edge endpoint names an existing node and a port declared in
//!   the matching direction
//! - both endpoints of an edge carry the edge's data type
//! - no two edges share the same `(from, to)` pair
//! - no self loops
//! - removing a node removes its edges in the same call
//! - z-order values are distinct and only ever grow, short of a
//!   renumbering once [`MAX_Z_ORDER`] is reached

use std::sync::Arc;

use crate::catalog::BlockCatalog;
use crate::connection::ConnectionEngine;
use crate::error::{GraphError, Result};
use crate::params::coerce_param;
use crate::types::{
    DataType, Direction, Edge, Node, NodeId, ParamKind, ParamValue, PortRef, Position,
    PORT_SEPARATOR,
};

/// Largest z-order a loaded node may carry
///
/// Values above this are treated as unrecorded on load. It is also the
/// largest integer a JSON reader is guaranteed to round-trip.
pub const MAX_Z_ORDER: u64 = (1 << 53) - 1;

/// Mutable collection of nodes and edges
#[derive(Debug, Clone)]
pub struct GraphStore {
    catalog: Arc<BlockCatalog>,
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    /// Highest z-order ever handed out
    z_counter: u64,
    /// Suffix of the last generated node id
    id_counter: u64,
}

impl GraphStore {
    /// Create an empty store over a catalog
    pub fn new(catalog: Arc<BlockCatalog>) -> Self {
        Self {
            catalog,
            nodes: Vec::new(),
            edges: Vec::new(),
            z_counter: 0,
            id_counter: 0,
        }
    }

    /// Create a store holding the default starter graph
    ///
    /// A simulator and a controller wired in a closed loop. Requires the
    /// built-in `mujoco_sim` and `cartesian_control` block types.
    pub fn with_starter_graph(catalog: Arc<BlockCatalog>) -> Result<Self> {
        let mut store = Self::new(catalog);
        let sim = store
            .add_node("mujoco_sim", Position::new(80.0, 120.0))?
            .id
            .clone();
        let ctrl = store
            .add_node("cartesian_control", Position::new(360.0, 120.0))?
            .id
            .clone();

        let mut engine = ConnectionEngine::new();
        engine
            .connect(
                &mut store,
                &PortRef::new(ctrl.as_str(), "command"),
                &PortRef::new(sim.as_str(), "command"),
            )
            .map_err(|e| GraphError::invalid_edge(e.to_string()))?;
        engine
            .connect(
                &mut store,
                &PortRef::new(sim.as_str(), "state"),
                &PortRef::new(ctrl.as_str(), "state"),
            )
            .map_err(|e| GraphError::invalid_edge(e.to_string()))?;

        Ok(store)
    }

    pub fn catalog(&self) -> &BlockCatalog {
        &self.catalog
    }

    /// Shared handle to the catalog
    pub fn catalog_handle(&self) -> Arc<BlockCatalog> {
        Arc::clone(&self.catalog)
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Find a node by ID
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    fn node_mut(&mut self, id: &str) -> Result<&mut Node> {
        self.nodes
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| GraphError::NodeNotFound(id.to_string()))
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.node(id).is_some()
    }

    /// Edges with either endpoint on the given node
    pub fn edges_of<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.touches(node_id))
    }

    /// Whether an edge with exactly these endpoints exists
    pub fn has_edge(&self, from: &PortRef, to: &PortRef) -> bool {
        self.edges.iter().any(|e| e.same_endpoints(from, to))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Highest z-order currently held by a node
    pub fn max_z(&self) -> Option<u64> {
        self.nodes.iter().map(|n| n.z_order).max()
    }

    /// Resolve the data type of a port on a placed node
    pub fn port_type(&self, port: &PortRef, direction: Direction) -> Option<DataType> {
        let node = self.node(&port.node_id)?;
        self.catalog
            .lookup_port_type(&node.block_type, &port.port, direction)
    }

    /// Place a new block
    ///
    /// Assigns a fresh id, the next z-order, and the schema's default
    /// parameters.
    pub fn add_node(&mut self, block_type: &str, position: Position) -> Result<&Node> {
        let schema = self
            .catalog
            .get(block_type)
            .ok_or_else(|| GraphError::UnknownBlockType(block_type.to_string()))?;
        let label = schema.label.clone();
        let params = schema.param_defaults.clone();

        let id = self.fresh_id();
        let z_order = self.next_z();
        log::debug!("Adding node '{}' of type '{}' (z={})", id, block_type, z_order);

        self.nodes.push(Node {
            id,
            block_type: block_type.to_string(),
            label,
            position,
            z_order,
            params,
        });
        let idx = self.nodes.len() - 1;
        Ok(&self.nodes[idx])
    }

    /// Remove a node and every edge touching it
    ///
    /// Returns the removed node, or `None` if the id was absent.
    pub fn remove_node(&mut self, id: &str) -> Option<Node> {
        let pos = self.nodes.iter().position(|n| n.id == id)?;
        let before = self.edges.len();
        self.edges.retain(|e| !e.touches(id));
        let node = self.nodes.remove(pos);
        log::debug!(
            "Removed node '{}' and {} incident edge(s)",
            id,
            before - self.edges.len()
        );
        Some(node)
    }

    /// Set a parameter value verbatim
    pub fn set_param(&mut self, node_id: &str, key: &str, value: ParamValue) -> Result<()> {
        let node = self.node_mut(node_id)?;
        node.params.insert(key.to_string(), value);
        Ok(())
    }

    /// Set a parameter from raw user input
    ///
    /// The input is converted to the kind declared by the schema default.
    /// Parameters the schema does not declare are stored as strings.
    pub fn set_param_from_input(&mut self, node_id: &str, key: &str, raw: &str) -> Result<ParamValue> {
        let node = self
            .node(node_id)
            .ok_or_else(|| GraphError::NodeNotFound(node_id.to_string()))?;
        let kind = self
            .catalog
            .get(&node.block_type)
            .and_then(|s| s.param_kind(key))
            .unwrap_or(ParamKind::String);

        let value = coerce_param(key, kind, raw)?;
        self.set_param(node_id, key, value.clone())?;
        Ok(value)
    }

    /// Change a node's display label
    pub fn set_label(&mut self, node_id: &str, label: impl Into<String>) -> Result<()> {
        self.node_mut(node_id)?.label = label.into();
        Ok(())
    }

    /// Move a node on the canvas
    pub fn move_node(&mut self, node_id: &str, position: Position) -> Result<()> {
        self.node_mut(node_id)?.position = position;
        Ok(())
    }

    /// Raise a node above all others
    ///
    /// Returns `false` (and does nothing) if the id is absent.
    pub fn bring_to_front(&mut self, node_id: &str) -> bool {
        if !self.contains_node(node_id) {
            return false;
        }
        let z = self.next_z();
        if let Ok(node) = self.node_mut(node_id) {
            node.z_order = z;
        }
        true
    }

    /// Insert an edge
    ///
    /// Used by the connection engine after it has validated the proposal;
    /// the structural invariants are still checked here.
    pub fn add_edge(&mut self, edge: Edge) -> Result<()> {
        if edge.from.node_id == edge.to.node_id {
            return Err(GraphError::invalid_edge(format!(
                "self loop on node '{}'",
                edge.from.node_id
            )));
        }

        let from_type = self
            .port_type(&edge.from, Direction::Output)
            .ok_or_else(|| GraphError::invalid_edge(format!("'{}' is not an output port", edge.from)))?;
        let to_type = self
            .port_type(&edge.to, Direction::Input)
            .ok_or_else(|| GraphError::invalid_edge(format!("'{}' is not an input port", edge.to)))?;

        if from_type != to_type || from_type != edge.data_type {
            return Err(GraphError::invalid_edge(format!(
                "type mismatch: {} ({}) -> {} ({}), edge declares {}",
                edge.from, from_type, edge.to, to_type, edge.data_type
            )));
        }

        if self.has_edge(&edge.from, &edge.to) {
            return Err(GraphError::invalid_edge(format!(
                "duplicate edge {} -> {}",
                edge.from, edge.to
            )));
        }

        log::debug!("Adding edge {} -> {} ({})", edge.from, edge.to, edge.data_type);
        self.edges.push(edge);
        Ok(())
    }

    /// Remove the edge at a position in [`edges`](Self::edges)
    pub fn remove_edge(&mut self, index: usize) -> Option<Edge> {
        if index < self.edges.len() {
            Some(self.edges.remove(index))
        } else {
            None
        }
    }

    /// Remove the edge connecting exactly these ports
    pub fn remove_edge_between(&mut self, from: &PortRef, to: &PortRef) -> Option<Edge> {
        let pos = self.edges.iter().position(|e| e.same_endpoints(from, to))?;
        self.remove_edge(pos)
    }

    /// Remove every node and edge
    ///
    /// Counters are kept so ids and z-orders are never reused.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.edges.clear();
    }

    /// Replace the whole graph with loaded contents
    ///
    /// Performs no edge validation; callers decide how much to trust the
    /// source. Node ids must already be unique.
    pub(crate) fn replace_contents(&mut self, nodes: Vec<Node>, edges: Vec<Edge>) {
        if let Some(max) = nodes.iter().map(|n| n.z_order).max() {
            self.z_counter = self.z_counter.max(max).min(MAX_Z_ORDER);
        }
        self.nodes = nodes;
        self.edges = edges;
    }

    fn next_z(&mut self) -> u64 {
        let floor = self.max_z().unwrap_or(0).max(self.z_counter);
        match floor.checked_add(1).filter(|z| *z <= MAX_Z_ORDER) {
            Some(z) => self.z_counter = z,
            None => {
                self.compact_z();
                self.z_counter += 1;
            }
        }
        self.z_counter
    }

    /// Renumber z-orders to 1..=n keeping their relative stacking
    fn compact_z(&mut self) {
        let mut by_z: Vec<usize> = (0..self.nodes.len()).collect();
        by_z.sort_by_key(|&i| self.nodes[i].z_order);
        for (rank, &i) in by_z.iter().enumerate() {
            self.nodes[i].z_order = rank as u64 + 1;
        }
        self.z_counter = self.nodes.len() as u64;
        log::warn!("Z-order range exhausted, renumbered {} nodes", self.nodes.len());
    }

    fn fresh_id(&mut self) -> NodeId {
        loop {
            self.id_counter += 1;
            let id = format!("n{}", self.id_counter);
            debug_assert!(!id.contains(PORT_SEPARATOR));
            if !self.contains_node(&id) {
                return id;
            }
        }
    }
}
