//! The `graph.v1` exchange document
//!
//! This is the portable format used for export, import, and run
//! submission:
//!
//! ```json
//! {
//!   "version": "graph.v1",
//!   "execution_order": ["n2", "n1"],
//!   "nodes": [{"id": "n1", "type": "mujoco_sim", "label": "MuJoCo Sim",
//!              "params": {...}, "ui": {"x": 80.0, "y": 120.0}}],
//!   "edges": [{"from": "n1.state", "to": "n2.state", "msg_type": "robot_state"}],
//!   "run_config": {"duration_sec": 10, "hz": 20}
//! }
//! ```
//!
//! Imported documents are treated as untrusted graph definitions: their
//! z-order is re-derived from array position and nothing stored in the
//! file is trusted for stacking.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{GraphError, Result};
use crate::order::execution_order;
use crate::store::GraphStore;
use crate::types::{DataType, Direction, Edge, Node, NodeId, Params, PortRef, Position, PORT_SEPARATOR};
use crate::validation::{validate_graph, ValidationIssue};

/// Version identifier of the exchange format
pub const GRAPH_FORMAT_VERSION: &str = "graph.v1";

/// Run configuration, passed through to the execution service untouched
///
/// Accessors apply the service's defaults for absent or unusable values.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunConfig(Map<String, Value>);

impl RunConfig {
    pub const DEFAULT_DURATION_SEC: u64 = 10;
    pub const DEFAULT_HZ: u64 = 20;

    /// An empty configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// The configuration a fresh editor starts with
    pub fn editor_default() -> Self {
        let mut config = Self::new();
        config.set("duration_sec", Self::DEFAULT_DURATION_SEC.into());
        config.set("hz", Self::DEFAULT_HZ.into());
        config
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    pub fn duration_sec(&self) -> u64 {
        self.get_u64("duration_sec")
            .unwrap_or(Self::DEFAULT_DURATION_SEC)
    }

    pub fn hz(&self) -> u64 {
        self.get_u64("hz").unwrap_or(Self::DEFAULT_HZ)
    }

    pub fn viewer(&self) -> bool {
        self.get("viewer").and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn overrides(&self) -> Map<String, Value> {
        self.get("overrides")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default()
    }

    /// Whole-number view of a setting; fractions are truncated
    fn get_u64(&self, key: &str) -> Option<u64> {
        match self.get(key)? {
            Value::Number(n) => n.as_u64().or_else(|| {
                let f = n.as_f64().filter(|f| f.is_finite() && *f >= 0.0)?;
                let whole = f.trunc() as u64;
                if f.fract() != 0.0 {
                    log::debug!("run_config.{} = {} read as {}", key, f, whole);
                }
                Some(whole)
            }),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// Presentation-only coordinates of a node
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct UiPosition {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
}

/// A node as written in the exchange document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentNode {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub block_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub params: Params,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ui: Option<UiPosition>,
}

/// An edge as written in the exchange document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentEdge {
    /// `nodeId.port` of the output
    pub from: String,
    /// `nodeId.port` of the input
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg_type: Option<DataType>,
}

/// The complete exchange document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphDocument {
    pub version: String,
    #[serde(default)]
    pub execution_order: Vec<NodeId>,
    #[serde(default)]
    pub nodes: Vec<DocumentNode>,
    #[serde(default)]
    pub edges: Vec<DocumentEdge>,
    #[serde(default)]
    pub run_config: RunConfig,
}

/// Outcome of applying a document or snapshot to a store
#[derive(Debug, Clone)]
pub struct LoadReport {
    /// Run configuration carried by the source
    pub run_config: RunConfig,
    /// Problems found in the loaded graph; loading does not reject them
    pub issues: Vec<ValidationIssue>,
}

impl GraphDocument {
    /// Snapshot a store into a document
    pub fn from_store(store: &GraphStore, run_config: &RunConfig) -> Self {
        let nodes = store
            .nodes()
            .iter()
            .map(|n| DocumentNode {
                id: n.id.clone(),
                block_type: n.block_type.clone(),
                label: Some(n.label.clone()),
                params: n.params.clone(),
                ui: Some(UiPosition {
                    x: n.position.x,
                    y: n.position.y,
                }),
            })
            .collect();

        let edges = store
            .edges()
            .iter()
            .map(|e| DocumentEdge {
                from: e.from.encode(),
                to: e.to.encode(),
                msg_type: Some(e.data_type.clone()),
            })
            .collect();

        Self {
            version: GRAPH_FORMAT_VERSION.to_string(),
            execution_order: execution_order(store.nodes(), store.catalog()),
            nodes,
            edges,
            run_config: run_config.clone(),
        }
    }

    /// Parse a document, checking the version before anything else
    pub fn from_json_str(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| GraphError::malformed(format!("not valid JSON: {}", e)))?;
        Self::from_value(value)
    }

    /// Interpret an already-parsed JSON value as a document
    pub fn from_value(value: Value) -> Result<Self> {
        let Some(object) = value.as_object() else {
            return Err(GraphError::malformed("document is not a JSON object"));
        };
        match object.get("version") {
            Some(Value::String(v)) if v == GRAPH_FORMAT_VERSION => {}
            Some(Value::String(v)) => {
                return Err(GraphError::UnsupportedVersion {
                    found: Some(v.clone()),
                })
            }
            Some(other) => {
                return Err(GraphError::UnsupportedVersion {
                    found: Some(other.to_string()),
                })
            }
            None => return Err(GraphError::UnsupportedVersion { found: None }),
        }

        // `null` arrays are treated like missing ones
        let mut value = value;
        if let Some(object) = value.as_object_mut() {
            for key in ["execution_order", "nodes", "edges", "run_config"] {
                if object.get(key).is_some_and(Value::is_null) {
                    object.remove(key);
                }
            }
        }

        serde_json::from_value(value).map_err(|e| GraphError::malformed(e.to_string()))
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Replace the store's graph with this document's graph
    ///
    /// Either the whole document is applied or the store is left as it
    /// was. Parameters are merged over schema defaults; z-order follows
    /// array position. Edges are not re-validated; problems are reported
    /// in the returned [`LoadReport`].
    pub fn apply_to(&self, store: &mut GraphStore) -> Result<LoadReport> {
        let mut seen = HashSet::new();
        let mut nodes = Vec::with_capacity(self.nodes.len());

        for (index, doc_node) in self.nodes.iter().enumerate() {
            check_node_id(&doc_node.id, &mut seen)?;
            let schema = store.catalog().get(&doc_node.block_type);

            let mut params = schema
                .map(|s| s.param_defaults.clone())
                .unwrap_or_default();
            params.extend(doc_node.params.clone());

            let label = doc_node
                .label
                .clone()
                .or_else(|| schema.map(|s| s.label.clone()))
                .unwrap_or_else(|| doc_node.block_type.clone());
            let ui = doc_node.ui.unwrap_or_default();

            nodes.push(Node {
                id: doc_node.id.clone(),
                block_type: doc_node.block_type.clone(),
                label,
                position: Position::new(ui.x, ui.y),
                z_order: index as u64 + 1,
                params,
            });
        }

        let mut edges = Vec::with_capacity(self.edges.len());
        for doc_edge in &self.edges {
            let from = PortRef::decode(&doc_edge.from)?;
            let to = PortRef::decode(&doc_edge.to)?;
            let data_type = match &doc_edge.msg_type {
                Some(t) => t.clone(),
                None => resolve_output_type(store, &nodes, &from).ok_or_else(|| {
                    GraphError::malformed(format!(
                        "edge {} -> {} has no msg_type and its source port is unknown",
                        doc_edge.from, doc_edge.to
                    ))
                })?,
            };
            edges.push(Edge::new(from, to, data_type));
        }

        log::info!(
            "Importing graph with {} node(s) and {} edge(s)",
            nodes.len(),
            edges.len()
        );
        store.replace_contents(nodes, edges);
        Ok(finish_load(store, self.run_config.clone()))
    }
}

/// Node ids must be unique and usable in `nodeId.port` keys
pub(crate) fn check_node_id<'a>(id: &'a str, seen: &mut HashSet<&'a str>) -> Result<()> {
    if id.is_empty() || id.contains(PORT_SEPARATOR) {
        return Err(GraphError::malformed(format!("invalid node id '{}'", id)));
    }
    if !seen.insert(id) {
        return Err(GraphError::malformed(format!("duplicate node id '{}'", id)));
    }
    Ok(())
}

/// Validate a freshly loaded store and log what was found
pub(crate) fn finish_load(store: &GraphStore, run_config: RunConfig) -> LoadReport {
    let issues = validate_graph(store);
    for issue in &issues {
        log::warn!("Loaded graph: {}", issue);
    }
    LoadReport { run_config, issues }
}

fn resolve_output_type(store: &GraphStore, nodes: &[Node], port: &PortRef) -> Option<DataType> {
    let node = nodes.iter().find(|n| n.id == port.node_id)?;
    store
        .catalog()
        .lookup_port_type(&node.block_type, &port.port, Direction::Output)
}

/// Write a store as a `graph.v1` file
pub fn export_to_path(store: &GraphStore, run_config: &RunConfig, path: &Path) -> Result<()> {
    let document = GraphDocument::from_store(store, run_config);
    std::fs::write(path, document.to_json_pretty()?)?;
    log::info!("Exported graph to {:?}", path);
    Ok(())
}

/// Read a `graph.v1` file into a store
///
/// On any error the store is left untouched.
pub fn import_from_path(store: &mut GraphStore, path: &Path) -> Result<LoadReport> {
    let content = std::fs::read_to_string(path)?;
    let document = GraphDocument::from_json_str(&content)?;
    let report = document.apply_to(store)?;
    log::info!("Imported graph from {:?}", path);
    Ok(report)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::catalog::BlockCatalog;
    use crate::types::ParamValue;

    fn starter() -> GraphStore {
        GraphStore::with_starter_graph(Arc::new(BlockCatalog::builtin())).unwrap()
    }

    fn empty() -> GraphStore {
        GraphStore::new(Arc::new(BlockCatalog::builtin()))
    }

    #[test]
    fn test_document_shape() {
        let store = starter();
        let doc = GraphDocument::from_store(&store, &RunConfig::editor_default());
        let value = doc.to_value().unwrap();

        assert_eq!(value["version"], "graph.v1");
        // controller tier before simulator tier
        assert_eq!(value["execution_order"], serde_json::json!(["n2", "n1"]));
        assert_eq!(value["nodes"][0]["type"], "mujoco_sim");
        assert_eq!(value["nodes"][0]["ui"]["x"], 80.0);
        assert_eq!(value["edges"][0]["from"], "n2.command");
        assert_eq!(value["edges"][0]["to"], "n1.command");
        assert_eq!(value["edges"][0]["msg_type"], "cartesian_cmd");
        assert_eq!(value["run_config"]["hz"], 20);
    }

    #[test]
    fn test_rejects_wrong_or_missing_version() {
        let err = GraphDocument::from_json_str(r#"{"version": "graph.v2"}"#).unwrap_err();
        assert!(matches!(err, GraphError::UnsupportedVersion { found: Some(v) } if v == "graph.v2"));

        let err = GraphDocument::from_json_str(r#"{"nodes": []}"#).unwrap_err();
        assert!(matches!(err, GraphError::UnsupportedVersion { found: None }));

        let err = GraphDocument::from_json_str("[1, 2]").unwrap_err();
        assert!(matches!(err, GraphError::MalformedDocument(_)));
    }

    #[test]
    fn test_missing_arrays_are_empty() {
        let doc = GraphDocument::from_json_str(r#"{"version": "graph.v1", "edges": null}"#).unwrap();
        assert!(doc.nodes.is_empty());
        assert!(doc.edges.is_empty());

        let mut store = starter();
        let report = doc.apply_to(&mut store).unwrap();
        assert!(store.is_empty());
        assert!(store.edges().is_empty());
        assert!(report.issues.is_empty());
    }

    #[test]
    fn test_import_rederives_z_and_merges_defaults() {
        let json = r#"{
            "version": "graph.v1",
            "nodes": [
                {"id": "b", "type": "logger", "params": {"tag": "exp"}, "z": 40},
                {"id": "a", "type": "mujoco_sim", "label": "Arm", "ui": {"x": 5, "y": 6}}
            ],
            "edges": [{"from": "a.state", "to": "b.state"}]
        }"#;
        let mut store = empty();
        let report = GraphDocument::from_json_str(json)
            .unwrap()
            .apply_to(&mut store)
            .unwrap();

        let b = store.node("b").unwrap();
        assert_eq!(b.z_order, 1);
        assert_eq!(b.label, "Logger");
        assert_eq!(b.params["tag"], ParamValue::from("exp"));
        assert_eq!(b.params["every_n"], ParamValue::Int(1));

        let a = store.node("a").unwrap();
        assert_eq!(a.z_order, 2);
        assert_eq!(a.position, Position::new(5.0, 6.0));

        // msg_type resolved from the catalog
        assert_eq!(store.edges()[0].data_type, DataType::new("robot_state"));
        // the simulator's required command input is open
        assert_eq!(report.issues.len(), 1);

        // new nodes stack above the imported ones
        let c = store.add_node("logger", Position::default()).unwrap();
        assert_eq!(c.z_order, 3);
    }

    #[test]
    fn test_malformed_import_leaves_store_untouched() {
        let cases = [
            r#"{"version": "graph.v1", "nodes": [{"id": "a", "type": "logger"}, {"id": "a", "type": "logger"}]}"#,
            r#"{"version": "graph.v1", "nodes": [{"id": "a.b", "type": "logger"}]}"#,
            r#"{"version": "graph.v1", "edges": [{"from": "nodot", "to": "x.y", "msg_type": "t"}]}"#,
            r#"{"version": "graph.v1", "edges": [{"from": "x.y", "to": "z.w"}]}"#,
            r#"{"version": "graph.v1", "nodes": [{"id": "a"}]}"#,
        ];
        for json in cases {
            let mut store = starter();
            let before = store.nodes().to_vec();
            let result = GraphDocument::from_json_str(json).and_then(|d| d.apply_to(&mut store));
            assert!(
                matches!(result, Err(GraphError::MalformedDocument(_))),
                "expected malformed for {}",
                json
            );
            assert_eq!(store.nodes(), before.as_slice());
            assert_eq!(store.edges().len(), 2);
        }
    }

    #[test]
    fn test_loaded_edges_are_not_revalidated() {
        let json = r#"{
            "version": "graph.v1",
            "nodes": [{"id": "a", "type": "logger"}],
            "edges": [{"from": "a.state", "to": "ghost.in", "msg_type": "robot_state"}]
        }"#;
        let mut store = empty();
        let report = GraphDocument::from_json_str(json)
            .unwrap()
            .apply_to(&mut store)
            .unwrap();
        assert_eq!(store.edges().len(), 1);
        assert!(!report.issues.is_empty());
    }

    #[test]
    fn test_run_config_accessors() {
        let config: RunConfig = serde_json::from_value(serde_json::json!({
            "duration_sec": 5.7,
            "hz": "30",
            "viewer": true,
            "overrides": {"n1": {"step": 0.1}},
            "custom": [1, 2]
        }))
        .unwrap();
        assert_eq!(config.duration_sec(), 5);
        assert_eq!(config.hz(), 30);
        assert!(config.viewer());
        assert!(config.overrides().contains_key("n1"));
        assert_eq!(config.get("custom"), Some(&serde_json::json!([1, 2])));

        let defaults = RunConfig::new();
        assert_eq!(defaults.duration_sec(), 10);
        assert_eq!(defaults.hz(), 20);
        assert!(!defaults.viewer());
        assert!(defaults.overrides().is_empty());
    }

    #[test]
    fn test_fractional_run_config_keeps_stored_value() {
        let mut config = RunConfig::new();
        config.set("hz", serde_json::json!(12.9));
        config.set("duration_sec", serde_json::json!(-3.0));

        assert_eq!(config.hz(), 12);
        // the document still carries what the user wrote
        assert_eq!(config.get("hz"), Some(&serde_json::json!(12.9)));
        assert_eq!(config.duration_sec(), RunConfig::DEFAULT_DURATION_SEC);
    }

    #[test]
    fn test_file_export_import() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.v1.json");

        let source = starter();
        let mut config = RunConfig::editor_default();
        config.set("viewer", Value::Bool(true));
        export_to_path(&source, &config, &path).unwrap();

        let mut target = empty();
        let report = import_from_path(&mut target, &path).unwrap();
        assert_eq!(report.run_config, config);
        assert_eq!(target.len(), 2);
        assert_eq!(target.edges(), source.edges());
    }
}
