//! Subclass expansion of pinned nodes.
//!
//! A pinned node `n` matches its ids *and* anything reaching them through up
//! to `depth` subclass hops. The ids move to a synthetic `n_superclass` node,
//! linked by a variable-length `n_subclass_edge` path:
//!
//! ```text
//! (n)-[n_subclass_edge:subclass_of*0..depth]->(n_superclass {id: ...})
//! ```
//!
//! Nodes already on an explicit subclass/superclass edge are left alone, and
//! node-only graphs are never expanded.

use qgraph_ontology::local_name;
use std::collections::BTreeSet;

use crate::config::CompilerConfig;
use crate::qgraph::{EdgeHints, QEdge, QNode, QueryGraph};

pub const SUPERCLASS_SUFFIX: &str = "_superclass";
pub const SUBCLASS_EDGE_SUFFIX: &str = "_subclass_edge";

pub fn superclass_node_id(node: &str) -> String {
    format!("{node}{SUPERCLASS_SUFFIX}")
}

pub fn subclass_edge_id(node: &str) -> String {
    format!("{node}{SUBCLASS_EDGE_SUFFIX}")
}

/// Return the expanded graph; `graph` itself is not modified.
pub fn expand_subclasses(graph: &QueryGraph, depth: u32, config: &CompilerConfig) -> QueryGraph {
    let mut expanded = graph.clone();
    if graph.edges.is_empty() {
        return expanded;
    }

    let hierarchy = [
        local_name(&config.subclass_predicate),
        local_name(&config.superclass_predicate),
    ];
    let on_hierarchy_edge: BTreeSet<&str> = graph
        .edges
        .values()
        .filter(|edge| edge.predicate_list().iter().any(|p| hierarchy.contains(&local_name(p))))
        .flat_map(|edge| [edge.subject.as_str(), edge.object.as_str()])
        .collect();

    let mut expanded_nodes = 0usize;
    for (id, node) in &graph.nodes {
        if node.ids.is_none() || node.superclass || on_hierarchy_edge.contains(id.as_str()) {
            continue;
        }
        let superclass_id = superclass_node_id(id);
        let edge_id = subclass_edge_id(id);
        if graph.nodes.contains_key(&superclass_id) || graph.edges.contains_key(&edge_id) {
            tracing::debug!(node = %id, "synthetic subclass ids already taken; not expanding");
            continue;
        }

        expanded.nodes.insert(
            superclass_id.clone(),
            QNode {
                ids: node.ids.clone(),
                categories: node.categories.clone(),
                superclass: true,
                ..QNode::default()
            },
        );
        if let Some(pinned) = expanded.nodes.get_mut(id) {
            pinned.ids = None;
            pinned.categories = None;
        }
        expanded.edges.insert(
            edge_id,
            QEdge {
                subject: id.clone(),
                object: superclass_id,
                predicates: Some(vec![config.subclass_predicate.clone()]),
                hints: EdgeHints {
                    subclass: true,
                    length: Some((0, depth)),
                    invert: false,
                },
                ..QEdge::default()
            },
        );
        expanded_nodes += 1;
    }

    tracing::debug!(expanded = expanded_nodes, depth, "expanded pinned nodes to subclasses");
    expanded
}
