//! Block type catalog
//!
//! Maps block type identifiers to their schemas (ports, parameter
//! defaults, category). The catalog is read-only once built; the store
//! and connection engine consult it to resolve port types.
//!
//! # Usage
//!
//! ```ignore
//! use graph_engine::{BlockCatalog, Direction};
//!
//! let catalog = BlockCatalog::builtin();
//! let ty = catalog.lookup_port_type("mujoco_sim", "state", Direction::Output);
//! ```

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{GraphError, Result};
use crate::types::{
    BlockCategory, DataType, Direction, ParamKind, ParamValue, Params, PORT_SEPARATOR,
};

/// Parameter holding the simulator's model file
pub const MODEL_PATH_PARAM: &str = "model_path";

/// Schema of a single port
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortSchema {
    /// Port name, unique within its direction
    pub name: String,
    /// Data type carried by the port
    pub data_type: DataType,
    /// Whether an input must be connected for the graph to be complete
    #[serde(default)]
    pub required: bool,
}

impl PortSchema {
    /// Create a required port
    pub fn required(name: impl Into<String>, data_type: impl Into<DataType>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            required: true,
        }
    }

    /// Create an optional port
    pub fn optional(name: impl Into<String>, data_type: impl Into<DataType>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            required: false,
        }
    }
}

/// Complete schema of a block type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockTypeSchema {
    /// Unique type identifier (e.g. "mujoco_sim")
    pub block_type: String,
    /// Human-readable label
    pub label: String,
    /// Category for grouping and ordering
    pub category: BlockCategory,
    /// Input ports in declaration order
    pub inputs: Vec<PortSchema>,
    /// Output ports in declaration order
    pub outputs: Vec<PortSchema>,
    /// Default parameter values
    pub param_defaults: Params,
}

impl BlockTypeSchema {
    pub fn new(
        block_type: impl Into<String>,
        label: impl Into<String>,
        category: BlockCategory,
    ) -> Self {
        Self {
            block_type: block_type.into(),
            label: label.into(),
            category,
            inputs: Vec::new(),
            outputs: Vec::new(),
            param_defaults: BTreeMap::new(),
        }
    }

    pub fn with_input(mut self, port: PortSchema) -> Self {
        self.inputs.push(port);
        self
    }

    pub fn with_output(mut self, port: PortSchema) -> Self {
        self.outputs.push(port);
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, default: impl Into<ParamValue>) -> Self {
        self.param_defaults.insert(name.into(), default.into());
        self
    }

    /// Ports declared in the given direction
    pub fn ports(&self, direction: Direction) -> &[PortSchema] {
        match direction {
            Direction::Input => &self.inputs,
            Direction::Output => &self.outputs,
        }
    }

    /// Find a port by name in the given direction
    pub fn port(&self, direction: Direction, name: &str) -> Option<&PortSchema> {
        self.ports(direction).iter().find(|p| p.name == name)
    }

    /// Declared kind of a parameter, from its default value
    pub fn param_kind(&self, key: &str) -> Option<ParamKind> {
        self.param_defaults.get(key).map(ParamValue::kind)
    }

    fn check(&self) -> Result<()> {
        let invalid = |reason: String| GraphError::InvalidSchema {
            block_type: self.block_type.clone(),
            reason,
        };

        if self.block_type.is_empty() {
            return Err(invalid("type identifier is empty".to_string()));
        }
        if self.block_type.contains(PORT_SEPARATOR) {
            return Err(invalid(format!(
                "type identifier contains '{}'",
                PORT_SEPARATOR
            )));
        }

        for direction in [Direction::Input, Direction::Output] {
            let mut seen = HashSet::new();
            for port in self.ports(direction) {
                if port.name.is_empty() {
                    return Err(invalid(format!("{} port with empty name", direction)));
                }
                if port.name.contains(PORT_SEPARATOR) {
                    return Err(invalid(format!(
                        "{} port '{}' contains '{}'",
                        direction, port.name, PORT_SEPARATOR
                    )));
                }
                if !seen.insert(port.name.as_str()) {
                    return Err(invalid(format!(
                        "duplicate {} port '{}'",
                        direction, port.name
                    )));
                }
            }
        }

        Ok(())
    }
}

/// Registry of block type schemas
#[derive(Debug, Clone, Default)]
pub struct BlockCatalog {
    entries: HashMap<String, BlockTypeSchema>,
}

impl BlockCatalog {
    /// Create a new empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// The blocks shipped with the editor
    pub fn builtin() -> Self {
        let mut catalog = Self::new();
        let schemas = [
            BlockTypeSchema::new("trajectory_source", "Trajectory Source", BlockCategory::Source)
                .with_output(PortSchema::optional("target", "cartesian_target"))
                .with_param("amplitude", 0.1)
                .with_param("period_sec", 2.0),
            BlockTypeSchema::new("cartesian_control", "Cartesian Control", BlockCategory::Controller)
                .with_input(PortSchema::required("state", "robot_state"))
                .with_input(PortSchema::optional("target", "cartesian_target"))
                .with_output(PortSchema::optional("command", "cartesian_cmd"))
                .with_param("goal_x", 0.5)
                .with_param("step", 0.005),
            BlockTypeSchema::new("mujoco_sim", "MuJoCo Sim", BlockCategory::Simulator)
                .with_input(PortSchema::required("command", "cartesian_cmd"))
                .with_output(PortSchema::optional("state", "robot_state"))
                .with_param(MODEL_PATH_PARAM, "")
                .with_param("dx_scale", 1.0),
            BlockTypeSchema::new("logger", "Logger", BlockCategory::Sink)
                .with_input(PortSchema::required("state", "robot_state"))
                .with_param("tag", "run")
                .with_param("every_n", 1i64),
        ];
        for schema in schemas {
            // Built-in schemas are static and known to pass the checks
            if let Err(e) = catalog.register(schema) {
                log::error!("Built-in block failed registration: {}", e);
            }
        }
        catalog
    }

    /// Register a block type schema
    ///
    /// Replaces any existing schema with the same type identifier.
    pub fn register(&mut self, schema: BlockTypeSchema) -> Result<()> {
        schema.check()?;
        log::debug!("Registered block type '{}'", schema.block_type);
        self.entries.insert(schema.block_type.clone(), schema);
        Ok(())
    }

    /// Build a catalog from the execution service's `/api/catalog` payload
    pub fn from_catalog_response(payload: &serde_json::Value) -> Result<Self> {
        let response: CatalogResponse = serde_json::from_value(payload.clone())?;
        let mut catalog = Self::new();
        for entry in response.blocks {
            catalog.register(entry.into_schema())?;
        }
        Ok(catalog)
    }

    /// Get the schema for a block type
    pub fn get(&self, block_type: &str) -> Option<&BlockTypeSchema> {
        self.entries.get(block_type)
    }

    /// Check if a block type is registered
    pub fn contains(&self, block_type: &str) -> bool {
        self.entries.contains_key(block_type)
    }

    /// Resolve the data type of a port
    ///
    /// Returns `None` when the block type or port is unknown in that
    /// direction; callers treat this as a validation failure.
    pub fn lookup_port_type(
        &self,
        block_type: &str,
        port: &str,
        direction: Direction,
    ) -> Option<DataType> {
        self.get(block_type)?
            .port(direction, port)
            .map(|p| p.data_type.clone())
    }

    /// Category of a block type; unknown types are `Other`
    pub fn category_of(&self, block_type: &str) -> BlockCategory {
        self.get(block_type)
            .map(|s| s.category)
            .unwrap_or_default()
    }

    /// All registered type identifiers, sorted
    pub fn block_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.entries.keys().map(|s| s.as_str()).collect();
        types.sort_unstable();
        types
    }

    /// Schemas grouped by category (for palettes)
    pub fn by_category(&self) -> HashMap<BlockCategory, Vec<&BlockTypeSchema>> {
        let mut grouped: HashMap<BlockCategory, Vec<&BlockTypeSchema>> = HashMap::new();
        for schema in self.entries.values() {
            grouped.entry(schema.category).or_default().push(schema);
        }
        for schemas in grouped.values_mut() {
            schemas.sort_by(|a, b| a.block_type.cmp(&b.block_type));
        }
        grouped
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Merge another catalog into this one
    ///
    /// Entries from `other` override entries in `self` with the same type.
    pub fn merge(&mut self, other: BlockCatalog) {
        self.entries.extend(other.entries);
    }
}

#[derive(Debug, Deserialize)]
struct CatalogResponse {
    #[serde(default)]
    blocks: Vec<CatalogEntry>,
}

#[derive(Debug, Deserialize)]
struct CatalogEntry {
    #[serde(rename = "type")]
    block_type: String,
    label: Option<String>,
    category: Option<String>,
    #[serde(default)]
    inputs: Vec<CatalogPort>,
    #[serde(default)]
    outputs: Vec<CatalogPort>,
    #[serde(default)]
    params_defaults: BTreeMap<String, serde_json::Value>,
}

/// Ports are published either as bare names or as typed objects
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CatalogPort {
    Typed {
        name: String,
        #[serde(rename = "type")]
        data_type: String,
        #[serde(default)]
        required: bool,
    },
    Named(String),
}

/// Type given to ports the service publishes without one
const UNTYPED_PORT: &str = "any";

impl CatalogPort {
    fn into_schema(self) -> PortSchema {
        match self {
            Self::Typed {
                name,
                data_type,
                required,
            } => PortSchema {
                name,
                data_type: DataType::new(data_type),
                required,
            },
            Self::Named(name) => PortSchema::optional(name, UNTYPED_PORT),
        }
    }
}

impl CatalogEntry {
    fn into_schema(self) -> BlockTypeSchema {
        let label = self.label.unwrap_or_else(|| self.block_type.clone());
        let category = self
            .category
            .as_deref()
            .map(BlockCategory::parse)
            .unwrap_or_default();

        let mut param_defaults = Params::new();
        for (name, value) in self.params_defaults {
            match serde_json::from_value::<ParamValue>(value) {
                Ok(v) => {
                    param_defaults.insert(name, v);
                }
                Err(_) => log::warn!(
                    "Skipping non-scalar default for '{}.{}'",
                    self.block_type,
                    name
                ),
            }
        }

        BlockTypeSchema {
            block_type: self.block_type,
            label,
            category,
            inputs: self.inputs.into_iter().map(CatalogPort::into_schema).collect(),
            outputs: self.outputs.into_iter().map(CatalogPort::into_schema).collect(),
            param_defaults,
        }
    }
}
