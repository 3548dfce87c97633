//! Two-phase connection protocol
//!
//! An edge is proposed interactively: the user first picks an output
//! port (`begin_from`), then an input port (`complete_to`). The engine
//! validates the proposal against the catalog and the current store and
//! only then commits the edge. Any failure returns the engine to idle
//! without touching the store.

use std::mem;

use crate::error::ConnectError;
use crate::store::GraphStore;
use crate::types::{DataType, Direction, Edge, PortRef};

/// State of the connection protocol
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No pending endpoint
    #[default]
    Idle,
    /// An output port is selected and awaits a matching input
    PendingFrom { from: PortRef, data_type: DataType },
}

/// Interactive edge builder
#[derive(Debug, Default)]
pub struct ConnectionEngine {
    state: ConnectionState,
}

impl ConnectionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, ConnectionState::PendingFrom { .. })
    }

    /// Select an output port as the start of a new edge
    ///
    /// Replaces any pending selection. On failure the engine is idle.
    pub fn begin_from(
        &mut self,
        store: &GraphStore,
        node_id: &str,
        port: &str,
    ) -> Result<DataType, ConnectError> {
        let from = PortRef::new(node_id, port);
        let Some(data_type) = store.port_type(&from, Direction::Output) else {
            self.state = ConnectionState::Idle;
            return Err(ConnectError::PortNotFound {
                node_id: from.node_id,
                port: from.port,
                direction: Direction::Output,
            });
        };

        log::debug!("Connection pending from {} ({})", from, data_type);
        self.state = ConnectionState::PendingFrom {
            from,
            data_type: data_type.clone(),
        };
        Ok(data_type)
    }

    /// Select an input port to finish the pending edge
    ///
    /// Always returns the engine to idle. On success the new edge has
    /// been committed to the store.
    pub fn complete_to(
        &mut self,
        store: &mut GraphStore,
        node_id: &str,
        port: &str,
    ) -> Result<Edge, ConnectError> {
        let ConnectionState::PendingFrom { from, data_type } = mem::take(&mut self.state) else {
            return Err(ConnectError::NoPendingConnection);
        };
        let to = PortRef::new(node_id, port);

        let edge = match check_proposal(store, &from, &data_type, &to) {
            Ok(edge) => edge,
            Err(reason) => {
                log::debug!("Rejected connection {} -> {}: {}", from, to, reason);
                return Err(reason);
            }
        };

        store.add_edge(edge.clone()).map_err(|e| {
            log::error!("Store refused a validated edge {} -> {}: {}", from, to, e);
            ConnectError::Rejected(e.to_string())
        })?;
        Ok(edge)
    }

    /// Discard the pending endpoint, if any
    ///
    /// Returns whether something was discarded. Never touches the store.
    pub fn cancel(&mut self) -> bool {
        let was_pending = self.is_pending();
        self.state = ConnectionState::Idle;
        was_pending
    }

    /// Run both phases in one call
    pub fn connect(
        &mut self,
        store: &mut GraphStore,
        from: &PortRef,
        to: &PortRef,
    ) -> Result<Edge, ConnectError> {
        self.begin_from(store, &from.node_id, &from.port)?;
        self.complete_to(store, &to.node_id, &to.port)
    }
}

/// Validate a proposed edge; first failing check wins
fn check_proposal(
    store: &GraphStore,
    from: &PortRef,
    pending_type: &DataType,
    to: &PortRef,
) -> Result<Edge, ConnectError> {
    if from.node_id == to.node_id {
        return Err(ConnectError::SameNode);
    }

    for node_id in [&from.node_id, &to.node_id] {
        if !store.contains_node(node_id) {
            return Err(ConnectError::NodeNotFound {
                node_id: node_id.clone(),
            });
        }
    }

    let to_type = store
        .port_type(to, Direction::Input)
        .ok_or_else(|| ConnectError::PortNotFound {
            node_id: to.node_id.clone(),
            port: to.port.clone(),
            direction: Direction::Input,
        })?;
    if store.port_type(from, Direction::Output).is_none() {
        return Err(ConnectError::PortNotFound {
            node_id: from.node_id.clone(),
            port: from.port.clone(),
            direction: Direction::Output,
        });
    }

    if *pending_type != to_type {
        return Err(ConnectError::TypeMismatch {
            from_type: pending_type.clone(),
            to_type,
        });
    }

    if store.has_edge(from, to) {
        return Err(ConnectError::DuplicateEdge);
    }

    Ok(Edge::new(from.clone(), to.clone(), to_type))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::catalog::{BlockCatalog, BlockTypeSchema, PortSchema};
    use crate::types::{BlockCategory, Position};

    fn setup() -> (GraphStore, String, String) {
        let mut store = GraphStore::new(Arc::new(BlockCatalog::builtin()));
        let sim = store.add_node("mujoco_sim", Position::default()).unwrap().id.clone();
        let ctrl = store
            .add_node("cartesian_control", Position::default())
            .unwrap()
            .id
            .clone();
        (store, sim, ctrl)
    }

    #[test]
    fn test_begin_from_resolves_type() {
        let (store, sim, _) = setup();
        let mut engine = ConnectionEngine::new();
        let ty = engine.begin_from(&store, &sim, "state").unwrap();
        assert_eq!(ty, DataType::new("robot_state"));
        assert!(engine.is_pending());
    }

    #[test]
    fn test_begin_from_rejects_input_port() {
        let (store, sim, _) = setup();
        let mut engine = ConnectionEngine::new();
        let err = engine.begin_from(&store, &sim, "command").unwrap_err();
        assert_eq!(
            err,
            ConnectError::PortNotFound {
                node_id: sim.clone(),
                port: "command".to_string(),
                direction: Direction::Output,
            }
        );
        assert_eq!(engine.state(), &ConnectionState::Idle);
    }

    #[test]
    fn test_complete_commits_edge() {
        let (mut store, sim, ctrl) = setup();
        let mut engine = ConnectionEngine::new();
        engine.begin_from(&store, &sim, "state").unwrap();
        let edge = engine.complete_to(&mut store, &ctrl, "state").unwrap();
        assert_eq!(edge.data_type, DataType::new("robot_state"));
        assert_eq!(store.edges(), &[edge]);
        assert!(!engine.is_pending());
    }

    #[test]
    fn test_same_node_wins_over_other_reasons() {
        let (mut store, sim, _) = setup();
        let mut engine = ConnectionEngine::new();
        engine.begin_from(&store, &sim, "state").unwrap();
        // also a bad port, but same-node is checked first
        let err = engine.complete_to(&mut store, &sim, "nope").unwrap_err();
        assert_eq!(err, ConnectError::SameNode);
        assert!(store.edges().is_empty());
    }

    #[test]
    fn test_source_deleted_while_pending() {
        let (mut store, sim, ctrl) = setup();
        let mut engine = ConnectionEngine::new();
        engine.begin_from(&store, &sim, "state").unwrap();
        store.remove_node(&sim);
        let err = engine.complete_to(&mut store, &ctrl, "state").unwrap_err();
        assert_eq!(err, ConnectError::NodeNotFound { node_id: sim });
        assert_eq!(engine.state(), &ConnectionState::Idle);
    }

    #[test]
    fn test_target_port_must_be_input() {
        let (mut store, sim, ctrl) = setup();
        let mut engine = ConnectionEngine::new();
        engine.begin_from(&store, &sim, "state").unwrap();
        let err = engine.complete_to(&mut store, &ctrl, "command").unwrap_err();
        assert!(matches!(
            err,
            ConnectError::PortNotFound { direction: Direction::Input, .. }
        ));
    }

    #[test]
    fn test_type_mismatch_reports_both_types() {
        let mut catalog = BlockCatalog::builtin();
        catalog
            .register(
                BlockTypeSchema::new("probe", "Probe", BlockCategory::Sink)
                    .with_input(PortSchema::optional("in", "cartesian_cmd")),
            )
            .unwrap();
        let mut store = GraphStore::new(Arc::new(catalog));
        let sim = store.add_node("mujoco_sim", Position::default()).unwrap().id.clone();
        let probe = store.add_node("probe", Position::default()).unwrap().id.clone();

        let mut engine = ConnectionEngine::new();
        engine.begin_from(&store, &sim, "state").unwrap();
        let err = engine.complete_to(&mut store, &probe, "in").unwrap_err();
        assert_eq!(
            err,
            ConnectError::TypeMismatch {
                from_type: DataType::new("robot_state"),
                to_type: DataType::new("cartesian_cmd"),
            }
        );
        assert_eq!(err.to_string(), "Type mismatch: robot_state -> cartesian_cmd");
        assert!(store.edges().is_empty());
        assert!(!engine.is_pending());
    }

    #[test]
    fn test_duplicate_edge() {
        let (mut store, sim, ctrl) = setup();
        let mut engine = ConnectionEngine::new();
        let from = PortRef::new(sim.as_str(), "state");
        let to = PortRef::new(ctrl.as_str(), "state");
        engine.connect(&mut store, &from, &to).unwrap();
        let err = engine.connect(&mut store, &from, &to).unwrap_err();
        assert_eq!(err, ConnectError::DuplicateEdge);
        assert_eq!(store.edges().len(), 1);
    }

    #[test]
    fn test_complete_without_pending() {
        let (mut store, _, ctrl) = setup();
        let mut engine = ConnectionEngine::new();
        let err = engine.complete_to(&mut store, &ctrl, "state").unwrap_err();
        assert_eq!(err, ConnectError::NoPendingConnection);
    }

    #[test]
    fn test_cancel() {
        let (store, sim, _) = setup();
        let mut engine = ConnectionEngine::new();
        assert!(!engine.cancel());
        engine.begin_from(&store, &sim, "state").unwrap();
        assert!(engine.cancel());
        assert_eq!(engine.state(), &ConnectionState::Idle);
        assert!(store.edges().is_empty());
    }
}
