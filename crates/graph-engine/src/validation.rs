//! Whole-graph validation
//!
//! The connection protocol keeps interactively built graphs valid, but
//! loaded documents are applied without re-checking their edges. This
//! module reports every problem in a store so callers can surface them.

use std::collections::HashSet;

use crate::store::GraphStore;
use crate::types::{Direction, Edge, NodeId, PortRef};

/// A problem found in a graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    /// A node has a type the catalog does not know
    UnknownBlockType { node_id: NodeId, block_type: String },
    /// An edge endpoint names a node that does not exist
    DanglingEdge { edge: String, node_id: NodeId },
    /// An edge endpoint names a port the node does not declare
    UnknownPort {
        edge: String,
        port: PortRef,
        direction: Direction,
    },
    /// Endpoint types differ from each other or from the cached type
    TypeMismatch {
        edge: String,
        from_type: String,
        to_type: String,
        declared: String,
    },
    /// An edge connects a node to itself
    SelfLoop { edge: String },
    /// The same `(from, to)` pair appears more than once
    DuplicateEdge { edge: String },
    /// A required input has no incoming edge
    UnconnectedRequiredInput { node_id: NodeId, port: String },
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownBlockType {
                node_id,
                block_type,
            } => write!(f, "Unknown block type '{}' for node '{}'", block_type, node_id),
            Self::DanglingEdge { edge, node_id } => {
                write!(f, "Edge '{}' references unknown node '{}'", edge, node_id)
            }
            Self::UnknownPort {
                edge,
                port,
                direction,
            } => write!(f, "Edge '{}': '{}' is not an {} port", edge, port, direction),
            Self::TypeMismatch {
                edge,
                from_type,
                to_type,
                declared,
            } => write!(
                f,
                "Edge '{}' connects incompatible types: {} -> {} (declared {})",
                edge, from_type, to_type, declared
            ),
            Self::SelfLoop { edge } => write!(f, "Edge '{}' connects a node to itself", edge),
            Self::DuplicateEdge { edge } => write!(f, "Edge '{}' appears more than once", edge),
            Self::UnconnectedRequiredInput { node_id, port } => write!(
                f,
                "Required input '{}' on node '{}' is not connected",
                port, node_id
            ),
        }
    }
}

/// Validate a graph
///
/// Returns all issues found (not just the first).
pub fn validate_graph(store: &GraphStore) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    validate_node_types(store, &mut issues);
    validate_edges(store, &mut issues);
    validate_required_inputs(store, &mut issues);

    issues
}

fn edge_label(edge: &Edge) -> String {
    format!("{} -> {}", edge.from, edge.to)
}

fn validate_node_types(store: &GraphStore, issues: &mut Vec<ValidationIssue>) {
    for node in store.nodes() {
        if !store.catalog().contains(&node.block_type) {
            issues.push(ValidationIssue::UnknownBlockType {
                node_id: node.id.clone(),
                block_type: node.block_type.clone(),
            });
        }
    }
}

fn validate_edges(store: &GraphStore, issues: &mut Vec<ValidationIssue>) {
    let mut seen: HashSet<(&PortRef, &PortRef)> = HashSet::new();

    for edge in store.edges() {
        let label = edge_label(edge);

        if edge.from.node_id == edge.to.node_id {
            issues.push(ValidationIssue::SelfLoop { edge: label.clone() });
        }
        if !seen.insert((&edge.from, &edge.to)) {
            issues.push(ValidationIssue::DuplicateEdge { edge: label.clone() });
        }

        let mut endpoint_types = Vec::with_capacity(2);
        for (port, direction) in [(&edge.from, Direction::Output), (&edge.to, Direction::Input)] {
            let Some(node) = store.node(&port.node_id) else {
                issues.push(ValidationIssue::DanglingEdge {
                    edge: label.clone(),
                    node_id: port.node_id.clone(),
                });
                continue;
            };
            if !store.catalog().contains(&node.block_type) {
                // already reported as an unknown block type
                continue;
            }
            match store.port_type(port, direction) {
                Some(ty) => endpoint_types.push(ty),
                None => issues.push(ValidationIssue::UnknownPort {
                    edge: label.clone(),
                    port: port.clone(),
                    direction,
                }),
            }
        }

        if let [from_type, to_type] = endpoint_types.as_slice() {
            if from_type != to_type || *from_type != edge.data_type {
                issues.push(ValidationIssue::TypeMismatch {
                    edge: label,
                    from_type: from_type.to_string(),
                    to_type: to_type.to_string(),
                    declared: edge.data_type.to_string(),
                });
            }
        }
    }
}

fn validate_required_inputs(store: &GraphStore, issues: &mut Vec<ValidationIssue>) {
    let connected: HashSet<&PortRef> = store.edges().iter().map(|e| &e.to).collect();

    for node in store.nodes() {
        let Some(schema) = store.catalog().get(&node.block_type) else {
            continue;
        };
        for port in schema.inputs.iter().filter(|p| p.required) {
            let target = PortRef::new(node.id.as_str(), port.name.as_str());
            if !connected.contains(&target) {
                issues.push(ValidationIssue::UnconnectedRequiredInput {
                    node_id: node.id.clone(),
                    port: port.name.clone(),
                });
            }
        }
    }
}
