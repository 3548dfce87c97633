//! Editor session
//!
//! Bundles what one editor window owns: the graph store, the connection
//! protocol state, the run configuration, and the current selection.

use std::path::Path;
use std::sync::Arc;

use crate::catalog::BlockCatalog;
use crate::connection::ConnectionEngine;
use crate::document::{export_to_path, import_from_path, GraphDocument, LoadReport, RunConfig};
use crate::error::{ConnectError, GraphError, Result};
use crate::persistence::{LocalSnapshot, SnapshotStorage};
use crate::store::GraphStore;
use crate::types::{DataType, Edge, NodeId, ParamValue, Position};

#[derive(Debug)]
pub struct EditorSession {
    store: GraphStore,
    connection: ConnectionEngine,
    run_config: RunConfig,
    selected: Option<NodeId>,
}

impl EditorSession {
    /// A session with an empty graph
    pub fn new(catalog: Arc<BlockCatalog>) -> Self {
        Self::from_store(GraphStore::new(catalog))
    }

    /// A session preloaded with the simulator/controller loop
    pub fn with_starter_graph(catalog: Arc<BlockCatalog>) -> Result<Self> {
        Ok(Self::from_store(GraphStore::with_starter_graph(catalog)?))
    }

    pub fn from_store(store: GraphStore) -> Self {
        Self {
            store,
            connection: ConnectionEngine::new(),
            run_config: RunConfig::editor_default(),
            selected: None,
        }
    }

    pub fn store(&self) -> &GraphStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut GraphStore {
        &mut self.store
    }

    pub fn connection(&self) -> &ConnectionEngine {
        &self.connection
    }

    pub fn run_config(&self) -> &RunConfig {
        &self.run_config
    }

    pub fn run_config_mut(&mut self) -> &mut RunConfig {
        &mut self.run_config
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Place a new block and select it
    pub fn place_block(&mut self, block_type: &str, position: Position) -> Result<NodeId> {
        let id = self.store.add_node(block_type, position)?.id.clone();
        log::debug!("Placed '{}' as {}", block_type, id);
        self.selected = Some(id.clone());
        Ok(id)
    }

    /// Select a node and raise it above the others
    pub fn select(&mut self, node_id: &str) -> Result<()> {
        if !self.store.bring_to_front(node_id) {
            return Err(GraphError::NodeNotFound(node_id.to_string()));
        }
        self.selected = Some(node_id.to_string());
        Ok(())
    }

    pub fn deselect(&mut self) {
        self.selected = None;
    }

    /// Delete a node and its edges
    pub fn delete_node(&mut self, node_id: &str) -> Result<()> {
        self.store
            .remove_node(node_id)
            .ok_or_else(|| GraphError::NodeNotFound(node_id.to_string()))?;
        if self.selected.as_deref() == Some(node_id) {
            self.selected = None;
        }
        Ok(())
    }

    /// Delete the selected node; returns its id if one was selected
    pub fn delete_selected(&mut self) -> Result<Option<NodeId>> {
        let Some(id) = self.selected.clone() else {
            return Ok(None);
        };
        self.delete_node(&id)?;
        Ok(Some(id))
    }

    pub fn move_node(&mut self, node_id: &str, position: Position) -> Result<()> {
        self.store.move_node(node_id, position)
    }

    pub fn set_param_from_input(&mut self, node_id: &str, key: &str, raw: &str) -> Result<ParamValue> {
        self.store.set_param_from_input(node_id, key, raw)
    }

    pub fn begin_connection(&mut self, node_id: &str, port: &str) -> std::result::Result<DataType, ConnectError> {
        self.connection.begin_from(&self.store, node_id, port)
    }

    pub fn complete_connection(&mut self, node_id: &str, port: &str) -> std::result::Result<Edge, ConnectError> {
        self.connection.complete_to(&mut self.store, node_id, port)
    }

    pub fn cancel_connection(&mut self) -> bool {
        self.connection.cancel()
    }

    /// Empty the graph; id and z counters keep counting
    pub fn clear(&mut self) {
        self.store.clear();
        self.connection.cancel();
        self.selected = None;
    }

    pub fn to_document(&self) -> GraphDocument {
        GraphDocument::from_store(&self.store, &self.run_config)
    }

    /// Replace the graph with an exchange document
    ///
    /// On error nothing changes.
    pub fn import_json(&mut self, json: &str) -> Result<LoadReport> {
        let document = GraphDocument::from_json_str(json)?;
        let report = document.apply_to(&mut self.store)?;
        self.after_load(&report);
        Ok(report)
    }

    pub fn export_to_path(&self, path: &Path) -> Result<()> {
        export_to_path(&self.store, &self.run_config, path)
    }

    pub fn import_from_path(&mut self, path: &Path) -> Result<LoadReport> {
        let report = import_from_path(&mut self.store, path)?;
        self.after_load(&report);
        Ok(report)
    }

    /// Autosave to local storage
    pub fn save_local(&self, storage: &mut dyn SnapshotStorage, key: &str) -> Result<()> {
        let snapshot = LocalSnapshot::capture(&self.store, &self.run_config);
        storage.save(key, &snapshot)
    }

    /// Restore an autosave; fails with `SnapshotNotFound` if none exists
    pub fn load_local(&mut self, storage: &dyn SnapshotStorage, key: &str) -> Result<LoadReport> {
        let snapshot = storage
            .load(key)?
            .ok_or_else(|| GraphError::SnapshotNotFound(key.to_string()))?;
        let report = snapshot.restore_into(&mut self.store)?;
        self.after_load(&report);
        Ok(report)
    }

    fn after_load(&mut self, report: &LoadReport) {
        self.run_config = report.run_config.clone();
        self.connection.cancel();
        self.selected = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemorySnapshotStorage;

    fn session() -> EditorSession {
        EditorSession::with_starter_graph(Arc::new(BlockCatalog::builtin())).unwrap()
    }

    #[test]
    fn test_place_selects_new_block() {
        let mut s = session();
        let id = s.place_block("logger", Position::new(10.0, 10.0)).unwrap();
        assert_eq!(id, "n3");
        assert_eq!(s.selected(), Some("n3"));
        assert_eq!(s.store().node(&id).unwrap().z_order, 3);
    }

    #[test]
    fn test_select_raises_node() {
        let mut s = session();
        s.select("n1").unwrap();
        assert_eq!(s.store().node("n1").unwrap().z_order, 3);
        assert!(matches!(s.select("n9"), Err(GraphError::NodeNotFound(_))));
        assert_eq!(s.selected(), Some("n1"));
    }

    #[test]
    fn test_delete_selected_cascades() {
        let mut s = session();
        s.select("n1").unwrap();
        assert_eq!(s.delete_selected().unwrap(), Some("n1".to_string()));
        assert!(s.store().edges().is_empty());
        assert_eq!(s.selected(), None);
        assert_eq!(s.delete_selected().unwrap(), None);
    }

    #[test]
    fn test_connection_through_session() {
        let mut s = EditorSession::new(Arc::new(BlockCatalog::builtin()));
        let sim = s.place_block("mujoco_sim", Position::default()).unwrap();
        let log = s.place_block("logger", Position::default()).unwrap();
        s.begin_connection(&sim, "state").unwrap();
        s.complete_connection(&log, "state").unwrap();
        assert_eq!(s.store().edges().len(), 1);
    }

    #[test]
    fn test_local_round_trip_restores_run_config() {
        let mut storage = MemorySnapshotStorage::new();
        let mut s = session();
        s.run_config_mut().set("viewer", serde_json::Value::Bool(true));
        s.save_local(&mut storage, "graph_autosave").unwrap();

        let mut other = EditorSession::new(Arc::new(BlockCatalog::builtin()));
        other.load_local(&storage, "graph_autosave").unwrap();
        assert!(other.run_config().viewer());
        assert_eq!(other.store().nodes(), s.store().nodes());

        assert!(matches!(
            other.load_local(&storage, "missing"),
            Err(GraphError::SnapshotNotFound(_))
        ));
    }

    #[test]
    fn test_failed_import_keeps_session() {
        let mut s = session();
        s.select("n2").unwrap();
        let err = s.import_json(r#"{"version": "graph.v2"}"#).unwrap_err();
        assert!(matches!(err, GraphError::UnsupportedVersion { .. }));
        assert_eq!(s.store().len(), 2);
        assert_eq!(s.selected(), Some("n2"));
    }

    #[test]
    fn test_clear_keeps_counters() {
        let mut s = session();
        s.begin_connection("n1", "state").unwrap();
        s.clear();
        assert!(s.store().is_empty());
        assert!(!s.connection().is_pending());
        let id = s.place_block("logger", Position::default()).unwrap();
        assert_eq!(id, "n3");
    }
}
