//! Advisory execution order
//!
//! Nodes are ranked by category tier (source, controller, simulator,
//! sink, other) and, within a tier, by the string `label + id`. The
//! concatenation is compared as one string, not as a `(label, id)`
//! pair. Edges are not consulted; the execution service owns the real
//! schedule.

use crate::catalog::BlockCatalog;
use crate::types::{Node, NodeId};

/// Order node ids for the exchange document
pub fn execution_order(nodes: &[Node], catalog: &BlockCatalog) -> Vec<NodeId> {
    let mut keyed: Vec<(u8, String, &NodeId)> = nodes
        .iter()
        .map(|n| {
            let tier = catalog.category_of(&n.block_type).tier();
            (tier, format!("{}{}", n.label, n.id), &n.id)
        })
        .collect();

    // Ids are unique, so keys never tie and the result is independent of
    // the input order.
    keyed.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)).then_with(|| a.2.cmp(b.2)));
    keyed.into_iter().map(|(_, _, id)| id.clone()).collect()
}
