//! Exchange-format output structures (results, knowledge graph, auxiliary graphs).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub attribute_type_id: String,
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_type_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_attribute_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute_source: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<Attribute>,
}

impl Attribute {
    pub fn new(attribute_type_id: impl Into<String>, value: Value) -> Self {
        Self {
            attribute_type_id: attribute_type_id.into(),
            value,
            value_type_id: None,
            original_attribute_name: None,
            attribute_source: None,
            attributes: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Qualifier {
    pub qualifier_type_id: String,
    pub qualifier_value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceRole {
    PrimaryKnowledgeSource,
    AggregatorKnowledgeSource,
    SupportingDataSource,
}

/// One link of an edge's provenance chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievalSource {
    pub resource_id: String,
    pub resource_role: ResourceRole,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub upstream_resource_ids: Vec<String>,
}

impl RetrievalSource {
    pub fn primary(resource_id: impl Into<String>) -> Self {
        Self {
            resource_id: resource_id.into(),
            resource_role: ResourceRole::PrimaryKnowledgeSource,
            upstream_resource_ids: Vec::new(),
        }
    }

    pub fn aggregator(resource_id: impl Into<String>, upstream: impl Into<String>) -> Self {
        Self {
            resource_id: resource_id.into(),
            resource_role: ResourceRole::AggregatorKnowledgeSource,
            upstream_resource_ids: vec![upstream.into()],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KgNode {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KgEdge {
    pub subject: String,
    pub predicate: String,
    pub object: String,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub qualifiers: Vec<Qualifier>,
    #[serde(default)]
    pub sources: Vec<RetrievalSource>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeGraph {
    pub nodes: BTreeMap<String, KgNode>,
    pub edges: BTreeMap<String, KgEdge>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeBinding {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_id: Option<String>,
    #[serde(default)]
    pub attributes: Vec<Value>,
}

impl NodeBinding {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            query_id: None,
            attributes: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeBinding {
    pub id: String,
    #[serde(default)]
    pub attributes: Vec<Value>,
}

impl EdgeBinding {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            attributes: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub resource_id: String,
    pub edge_bindings: BTreeMap<String, Vec<EdgeBinding>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub node_bindings: BTreeMap<String, Vec<NodeBinding>>,
    pub analyses: Vec<Analysis>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuxiliaryGraph {
    pub edges: Vec<String>,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

/// The reconstructed response body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub results: Vec<QueryResult>,
    pub knowledge_graph: KnowledgeGraph,
    pub auxiliary_graphs: BTreeMap<String, AuxiliaryGraph>,
}
