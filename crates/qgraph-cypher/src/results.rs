//! Result reconstruction: raw rows → exchange-format message.
//!
//! Rows are maps from the variables the compiler returned to the projected
//! values. The reconstructor walks them once, accumulating a deduplicated
//! knowledge graph, grouped results and auxiliary graphs for edges inferred
//! through subclass paths.

use ahash::AHashMap;
use qgraph_ontology::Ontology;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

use crate::attributes::{AttributeTransformer, RawEdge, RawNode};
use crate::config::{RelationshipId, ReconstructorConfig};
use crate::error::Result;
use crate::query::{is_path_edge, CompiledQuery};
use crate::subclass::{subclass_edge_id, superclass_node_id};
use crate::trapi::{
    Analysis, Attribute, AuxiliaryGraph, EdgeBinding, KgEdge, KgNode, KnowledgeGraph, Message,
    NodeBinding, QueryResult, RetrievalSource,
};

/// One raw result row.
pub type RawRow = Map<String, Value>;

/// Reconstruct a message from every row of a compiled query's result.
pub fn reconstruct<I>(
    query: &CompiledQuery,
    rows: I,
    ontology: &dyn Ontology,
    config: &ReconstructorConfig,
) -> Result<Message>
where
    I: IntoIterator<Item = RawRow>,
{
    let mut reconstructor = Reconstructor::new(query, ontology, config);
    for row in rows {
        reconstructor.push_row(&row)?;
    }
    Ok(reconstructor.finish())
}

// ============================================================================
// Layout
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endpoint {
    Subject,
    Object,
}

/// A subclass path hanging off one endpoint of a query edge.
#[derive(Debug, Clone)]
struct Attachment {
    endpoint: Endpoint,
    subclass_edge: String,
    superclass_node: String,
}

#[derive(Debug, Clone)]
struct NodeSlot {
    var: String,
    superclass: bool,
    set_all: bool,
    /// Synthetic superclass node holding this node's pinned ids.
    superclass_var: Option<String>,
}

#[derive(Debug, Clone)]
struct EdgeSlot {
    var: String,
    path: bool,
    subclass: bool,
    attachments: Vec<Attachment>,
}

/// What the reconstructor needs to know about each returned variable.
#[derive(Debug, Clone)]
struct Layout {
    nodes: Vec<NodeSlot>,
    edges: Vec<EdgeSlot>,
}

impl Layout {
    fn new(query: &CompiledQuery) -> Self {
        let graph = &query.qgraph;
        let nodes: Vec<NodeSlot> = graph
            .nodes
            .iter()
            .map(|(var, node)| {
                let superclass_var = superclass_node_id(var);
                NodeSlot {
                    var: var.clone(),
                    superclass: node.superclass,
                    set_all: node.is_set_all(),
                    superclass_var: graph.nodes.contains_key(&superclass_var).then_some(superclass_var),
                }
            })
            .collect();
        let expanded: BTreeSet<&str> = nodes
            .iter()
            .filter(|n| n.superclass_var.is_some())
            .map(|n| n.var.as_str())
            .collect();

        let edges = graph
            .edges
            .iter()
            .map(|(var, edge)| {
                let mut attachments = Vec::new();
                if !edge.hints.subclass {
                    for (endpoint, node) in [(Endpoint::Subject, &edge.subject), (Endpoint::Object, &edge.object)] {
                        if expanded.contains(node.as_str()) {
                            attachments.push(Attachment {
                                endpoint,
                                subclass_edge: subclass_edge_id(node),
                                superclass_node: superclass_node_id(node),
                            });
                        }
                    }
                }
                EdgeSlot {
                    var: var.clone(),
                    path: is_path_edge(edge),
                    subclass: edge.hints.subclass,
                    attachments,
                }
            })
            .collect();

        Self { nodes, edges }
    }
}

// ============================================================================
// Accumulation
// ============================================================================

/// Incremental reconstructor; feed rows with [`push_row`](Self::push_row).
pub struct Reconstructor<'a> {
    config: &'a ReconstructorConfig,
    transformer: AttributeTransformer<'a>,
    relationship_id: RelationshipId,
    layout: Layout,

    nodes: BTreeMap<String, KgNode>,
    edges: BTreeMap<String, KgEdge>,
    element_ids: AHashMap<String, String>,
    next_edge_index: usize,
    results: Vec<QueryResult>,
    result_index: AHashMap<Vec<String>, usize>,
    auxiliary_graphs: BTreeMap<String, AuxiliaryGraph>,
}

impl<'a> Reconstructor<'a> {
    pub fn new(query: &CompiledQuery, ontology: &'a dyn Ontology, config: &'a ReconstructorConfig) -> Self {
        Self {
            config,
            transformer: AttributeTransformer::new(ontology, config),
            relationship_id: query.options.relationship_id,
            layout: Layout::new(query),
            nodes: BTreeMap::new(),
            edges: BTreeMap::new(),
            element_ids: AHashMap::new(),
            next_edge_index: 1,
            results: Vec::new(),
            result_index: AHashMap::new(),
            auxiliary_graphs: BTreeMap::new(),
        }
    }

    pub fn push_row(&mut self, row: &RawRow) -> Result<()> {
        let null = Value::Null;
        let value = |var: &str| row.get(var).unwrap_or(&null);

        // Knowledge-graph nodes.
        let mut bound_nodes: BTreeMap<String, String> = BTreeMap::new();
        for slot in &self.layout.nodes {
            if let Some(raw) = RawNode::from_value(&slot.var, value(&slot.var))? {
                if !self.nodes.contains_key(&raw.id) {
                    let node = self.transformer.node(&raw);
                    self.nodes.insert(raw.id.clone(), node);
                }
                bound_nodes.insert(slot.var.clone(), raw.id);
            }
        }

        // Knowledge-graph edges.
        let mut bound_edges: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let edge_slots: Vec<(String, bool)> = self.layout.edges.iter().map(|s| (s.var.clone(), s.path)).collect();
        for (var, path) in edge_slots {
            let raws = if path {
                RawEdge::path_from_value(&var, value(&var))?
            } else {
                RawEdge::from_value(&var, value(&var))?.into_iter().collect()
            };
            let ids: Vec<String> = raws.iter().map(|raw| self.intern_edge(raw)).collect();
            if !ids.is_empty() {
                bound_edges.insert(var, ids);
            }
        }

        // Node bindings and the grouping key.
        let mut node_bindings: BTreeMap<String, Vec<NodeBinding>> = BTreeMap::new();
        let mut key: Vec<String> = Vec::new();
        for slot in &self.layout.nodes {
            if slot.superclass {
                continue;
            }
            let Some(result_id) = bound_nodes.get(&slot.var) else {
                node_bindings.insert(slot.var.clone(), Vec::new());
                continue;
            };
            let bound_id = match (&slot.superclass_var, slot.set_all) {
                (Some(sup), false) => bound_nodes.get(sup).unwrap_or(result_id),
                _ => result_id,
            };
            key.push(format!("{}={bound_id}", slot.var));
            node_bindings.insert(slot.var.clone(), vec![NodeBinding::new(bound_id.clone())]);
        }

        // Edge bindings, inferring edges over subclass paths.
        let mut edge_bindings: BTreeMap<String, Vec<EdgeBinding>> = BTreeMap::new();
        let edge_slots = self.layout.edges.clone();
        for slot in edge_slots.iter().filter(|s| !s.subclass) {
            let Some(ids) = bound_edges.get(&slot.var) else {
                continue;
            };
            let mut bindings = Vec::new();
            for edge_id in ids {
                let id = self.infer_over_subclass_paths(edge_id, slot, &bound_nodes, &bound_edges);
                if !bindings.iter().any(|b: &EdgeBinding| b.id == id) {
                    bindings.push(EdgeBinding::new(id));
                }
            }
            edge_bindings.insert(slot.var.clone(), bindings);
        }

        tracing::trace!(nodes = bound_nodes.len(), edges = bound_edges.len(), "reconstructed row");

        if key.is_empty() {
            return Ok(());
        }
        match self.result_index.get(&key) {
            Some(&index) => merge_edge_bindings(&mut self.results[index], edge_bindings),
            None => {
                self.result_index.insert(key, self.results.len());
                self.results.push(QueryResult {
                    node_bindings,
                    analyses: vec![Analysis {
                        resource_id: self.config.provenance_tag.clone(),
                        edge_bindings,
                    }],
                });
            }
        }
        Ok(())
    }

    pub fn finish(self) -> Message {
        Message {
            results: self.results,
            knowledge_graph: KnowledgeGraph {
                nodes: self.nodes,
                edges: self.edges,
            },
            auxiliary_graphs: self.auxiliary_graphs,
        }
    }

    /// Knowledge-graph id for a raw edge, transforming it on first sight.
    fn intern_edge(&mut self, raw: &RawEdge) -> String {
        if let Some(id) = self.element_ids.get(&raw.element_id) {
            return id.clone();
        }
        let id = match (self.relationship_id, &raw.id) {
            (RelationshipId::Internal, _) => raw.element_id.clone(),
            (RelationshipId::Property, Some(id)) => id.clone(),
            (RelationshipId::Property, None) => format!("e_{}", self.next_edge_index),
        };
        self.next_edge_index += 1;
        if !self.edges.contains_key(&id) {
            let edge = self.transformer.edge(raw);
            self.edges.insert(id.clone(), edge);
        }
        self.element_ids.insert(raw.element_id.clone(), id.clone());
        id
    }

    /// Bind `edge_id` directly, or through an inferred edge when a subclass
    /// path substituted one of its endpoints.
    fn infer_over_subclass_paths(
        &mut self,
        edge_id: &str,
        slot: &EdgeSlot,
        bound_nodes: &BTreeMap<String, String>,
        bound_edges: &BTreeMap<String, Vec<String>>,
    ) -> String {
        let mut path_ids: Vec<String> = Vec::new();
        let mut substituted: Vec<(Endpoint, String)> = Vec::new();
        for attachment in &slot.attachments {
            let Some(path) = bound_edges.get(&attachment.subclass_edge) else {
                continue;
            };
            path_ids.extend(path.iter().cloned());
            if let Some(node) = bound_nodes.get(&attachment.superclass_node) {
                substituted.push((attachment.endpoint, node.clone()));
            }
        }
        if path_ids.is_empty() {
            return edge_id.to_string();
        }

        let constituents: Vec<String> = std::iter::once(edge_id.to_string()).chain(path_ids).collect();
        let composite = constituents.join("_");
        let aux_id = format!("aux_{composite}");
        self.auxiliary_graphs
            .entry(aux_id.clone())
            .or_insert_with(|| AuxiliaryGraph {
                edges: constituents,
                attributes: Vec::new(),
            });

        if !self.edges.contains_key(&composite) {
            if let Some(real) = self.edges.get(edge_id) {
                let mut inferred = KgEdge {
                    subject: real.subject.clone(),
                    predicate: real.predicate.clone(),
                    object: real.object.clone(),
                    attributes: vec![
                        Attribute::new("biolink:knowledge_level", Value::from("logical_entailment")),
                        Attribute::new("biolink:agent_type", Value::from("automated_agent")),
                        Attribute::new("biolink:support_graphs", Value::from(vec![aux_id])),
                    ],
                    qualifiers: Vec::new(),
                    sources: vec![RetrievalSource::primary(self.config.provenance_tag.clone())],
                };
                for (endpoint, node) in substituted {
                    match endpoint {
                        Endpoint::Subject => inferred.subject = node,
                        Endpoint::Object => inferred.object = node,
                    }
                }
                self.edges.insert(composite.clone(), inferred);
            }
        }
        composite
    }
}

fn merge_edge_bindings(result: &mut QueryResult, new: BTreeMap<String, Vec<EdgeBinding>>) {
    let Some(analysis) = result.analyses.first_mut() else {
        return;
    };
    for (qedge, bindings) in new {
        let existing = analysis.edge_bindings.entry(qedge).or_default();
        for binding in bindings {
            if !existing.iter().any(|b| b.id == binding.id) {
                existing.push(binding);
            }
        }
    }
}
