//! Local autosave snapshots
//!
//! Unlike the exchange document, a local snapshot is trusted: it keeps
//! each node's recorded z-order and the structured edge form. Storage is
//! abstracted behind [`SnapshotStorage`] so the editor can autosave to a
//! directory of `{key}.json` files or, in tests, to memory.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::document::{check_node_id, finish_load, LoadReport, RunConfig};
use crate::error::{GraphError, Result};
use crate::store::{GraphStore, MAX_Z_ORDER};
use crate::types::{Edge, Node, NodeId, Params, Position};

/// A node as recorded in a local snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotNode {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub block_type: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub position: Position,
    /// Absent in snapshots written before stacking was recorded
    #[serde(default, rename = "z", skip_serializing_if = "Option::is_none")]
    pub z_order: Option<u64>,
    #[serde(default)]
    pub params: Params,
}

impl From<&Node> for SnapshotNode {
    fn from(node: &Node) -> Self {
        Self {
            id: node.id.clone(),
            block_type: node.block_type.clone(),
            label: node.label.clone(),
            position: node.position,
            z_order: Some(node.z_order),
            params: node.params.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMeta {
    pub saved_at: DateTime<Utc>,
}

/// The autosave format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalSnapshot {
    #[serde(default)]
    pub nodes: Vec<SnapshotNode>,
    #[serde(default)]
    pub edges: Vec<Edge>,
    #[serde(default)]
    pub run_cfg: RunConfig,
    pub meta: SnapshotMeta,
}

impl LocalSnapshot {
    /// Capture the store and run configuration as of now
    pub fn capture(store: &GraphStore, run_config: &RunConfig) -> Self {
        Self {
            nodes: store.nodes().iter().map(SnapshotNode::from).collect(),
            edges: store.edges().to_vec(),
            run_cfg: run_config.clone(),
            meta: SnapshotMeta {
                saved_at: Utc::now(),
            },
        }
    }

    /// Replace the store's graph with this snapshot
    ///
    /// Recorded z-orders are kept. A node without one, with one above
    /// [`MAX_Z_ORDER`], or whose value is already taken, gets its 1-based
    /// array position if free and otherwise the next value above every z
    /// seen so far. Params are laid over the schema defaults and an empty
    /// label falls back to the schema's.
    pub fn restore_into(&self, store: &mut GraphStore) -> Result<LoadReport> {
        let mut seen = HashSet::new();
        for node in &self.nodes {
            check_node_id(&node.id, &mut seen)?;
        }

        let mut used: HashSet<u64> = HashSet::new();
        let mut z_orders: Vec<Option<u64>> = self
            .nodes
            .iter()
            .map(|n| {
                n.z_order
                    .filter(|z| {
                        if *z > MAX_Z_ORDER {
                            log::warn!("Snapshot node '{}' has out-of-range z {}", n.id, z);
                            return false;
                        }
                        true
                    })
                    .filter(|z| used.insert(*z))
            })
            .collect();
        let mut ceiling = used.iter().copied().max().unwrap_or(0);
        for (index, z) in z_orders.iter_mut().enumerate() {
            if z.is_some() {
                continue;
            }
            let positional = index as u64 + 1;
            let assigned = if used.contains(&positional) {
                ceiling + 1
            } else {
                positional
            };
            used.insert(assigned);
            ceiling = ceiling.max(assigned);
            *z = Some(assigned);
        }

        let catalog = store.catalog();
        let nodes = self
            .nodes
            .iter()
            .zip(z_orders)
            .map(|(n, z)| {
                let schema = catalog.get(&n.block_type);
                let mut params = schema
                    .map(|s| s.param_defaults.clone())
                    .unwrap_or_default();
                params.extend(n.params.clone());

                let label = if n.label.is_empty() {
                    schema
                        .map(|s| s.label.clone())
                        .unwrap_or_else(|| n.block_type.clone())
                } else {
                    n.label.clone()
                };

                Node {
                    id: n.id.clone(),
                    block_type: n.block_type.clone(),
                    label,
                    position: n.position,
                    z_order: z.unwrap_or_default(),
                    params,
                }
            })
            .collect();

        store.replace_contents(nodes, self.edges.clone());
        Ok(finish_load(store, self.run_cfg.clone()))
    }
}

/// Keyed storage for local snapshots
pub trait SnapshotStorage {
    /// Write a snapshot, replacing any previous one under `key`
    fn save(&mut self, key: &str, snapshot: &LocalSnapshot) -> Result<()>;

    /// Read the snapshot under `key`, if one exists
    fn load(&self, key: &str) -> Result<Option<LocalSnapshot>>;

    /// Delete the snapshot under `key`; returns whether one existed
    fn remove(&mut self, key: &str) -> Result<bool>;

    /// Keys of all stored snapshots, sorted
    fn keys(&self) -> Result<Vec<String>>;
}

fn check_key(key: &str) -> Result<()> {
    let bad = key.is_empty()
        || key.starts_with('.')
        || key.contains(['/', '\\'])
        || key.chars().any(char::is_control);
    if bad {
        return Err(GraphError::InvalidSnapshotKey(key.to_string()));
    }
    Ok(())
}

/// Snapshots stored as `{key}.json` files in one directory
#[derive(Debug, Clone)]
pub struct FileSnapshotStorage {
    dir: PathBuf,
}

impl FileSnapshotStorage {
    /// The directory is created on first save.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        check_key(key)?;
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

impl SnapshotStorage for FileSnapshotStorage {
    fn save(&mut self, key: &str, snapshot: &LocalSnapshot) -> Result<()> {
        let file_path = self.path_for(key)?;
        std::fs::create_dir_all(&self.dir)?;
        let content = serde_json::to_string_pretty(snapshot)?;
        std::fs::write(&file_path, content)?;
        log::debug!("Saved snapshot '{}' to {:?}", key, file_path);
        Ok(())
    }

    fn load(&self, key: &str) -> Result<Option<LocalSnapshot>> {
        let file_path = self.path_for(key)?;
        if !file_path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&file_path)?;
        let snapshot = serde_json::from_str(&content)
            .map_err(|e| GraphError::malformed(format!("snapshot {:?}: {}", file_path, e)))?;
        log::info!("Loaded snapshot '{}' from {:?}", key, file_path);
        Ok(Some(snapshot))
    }

    fn remove(&mut self, key: &str) -> Result<bool> {
        let file_path = self.path_for(key)?;
        if !file_path.exists() {
            return Ok(false);
        }
        std::fs::remove_file(&file_path)?;
        log::debug!("Deleted snapshot '{}' from {:?}", key, file_path);
        Ok(true)
    }

    fn keys(&self) -> Result<Vec<String>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut keys = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let file_path = entry?.path();
            if file_path.extension().is_some_and(|e| e == "json") {
                if let Some(stem) = file_path.file_stem().and_then(|s| s.to_str()) {
                    keys.push(stem.to_string());
                }
            }
        }
        keys.sort();
        Ok(keys)
    }
}

/// In-memory snapshot storage
#[derive(Debug, Clone, Default)]
pub struct MemorySnapshotStorage {
    entries: HashMap<String, LocalSnapshot>,
}

impl MemorySnapshotStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotStorage for MemorySnapshotStorage {
    fn save(&mut self, key: &str, snapshot: &LocalSnapshot) -> Result<()> {
        check_key(key)?;
        self.entries.insert(key.to_string(), snapshot.clone());
        Ok(())
    }

    fn load(&self, key: &str) -> Result<Option<LocalSnapshot>> {
        check_key(key)?;
        Ok(self.entries.get(key).cloned())
    }

    fn remove(&mut self, key: &str) -> Result<bool> {
        check_key(key)?;
        Ok(self.entries.remove(key).is_some())
    }

    fn keys(&self) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self.entries.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}
