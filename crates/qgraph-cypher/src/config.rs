//! Explicit configuration values threaded into each compile / reconstruct call.
//!
//! Nothing here is process-wide: two callers with different allow-lists or
//! attribute mappings simply pass different values.

use qgraph_ontology::curie;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{Result, TranspileError};

/// Vocabulary and graph-shape settings for the compiler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Label used for nodes without categories.
    pub universal_category: String,
    /// Predicate equivalent to "any relation".
    pub universal_predicate: String,
    pub subclass_predicate: String,
    pub superclass_predicate: String,
    /// Predicates present in the target graph. `None` (or empty) means all.
    pub predicates_in_graph: Option<BTreeSet<String>>,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            universal_category: "biolink:NamedThing".to_string(),
            universal_predicate: "biolink:related_to".to_string(),
            subclass_predicate: "biolink:subclass_of".to_string(),
            superclass_predicate: "biolink:superclass_of".to_string(),
            predicates_in_graph: None,
        }
    }
}

impl CompilerConfig {
    /// Restrict descendant expansion to the given predicates (prefix optional).
    pub fn with_predicates_in_graph<I, S>(mut self, predicates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let set: BTreeSet<String> = predicates.into_iter().map(|p| curie(p.as_ref())).collect();
        self.predicates_in_graph = (!set.is_empty()).then_some(set);
        self
    }

    pub(crate) fn predicate_in_graph(&self, predicate_curie: &str) -> bool {
        match &self.predicates_in_graph {
            Some(set) if !set.is_empty() => set.contains(predicate_curie),
            _ => true,
        }
    }
}

/// How knowledge-graph edge ids are chosen during reconstruction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipId {
    /// The edge's `id` property, else a generated `e_<n>`.
    #[default]
    Property,
    /// The engine's element id.
    Internal,
}

/// Per-request compile options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileOptions {
    pub use_hints: bool,
    pub max_connectivity: Option<u32>,
    pub subclass: bool,
    pub subclass_depth: i64,
    pub relationship_id: RelationshipId,
    pub skip: Option<u64>,
    pub limit: Option<u64>,
    /// Emit the row-assembly return clause; `false` returns bare variables.
    pub reasoner: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            use_hints: false,
            max_connectivity: None,
            subclass: true,
            subclass_depth: 1,
            relationship_id: RelationshipId::Property,
            skip: None,
            limit: None,
            reasoner: true,
        }
    }
}

impl CompileOptions {
    pub(crate) fn validated_subclass_depth(&self) -> Result<u32> {
        u32::try_from(self.subclass_depth).map_err(|_| {
            TranspileError::InvalidArgument(format!(
                "subclass_depth must be a non-negative integer, got {}",
                self.subclass_depth
            ))
        })
    }
}

/// Attribute typing used when turning raw properties into exchange attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeType {
    pub attribute_type_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_type_id: Option<String>,
}

impl AttributeType {
    pub const DEFAULT_ATTRIBUTE_TYPE_ID: &'static str = "biolink:Attribute";
    pub const DEFAULT_VALUE_TYPE_ID: &'static str = "EDAM:data_0006";

    pub fn new(attribute_type_id: &str, value_type_id: &str) -> Self {
        Self {
            attribute_type_id: attribute_type_id.to_string(),
            value_type_id: Some(value_type_id.to_string()),
        }
    }

    pub fn fallback() -> Self {
        Self::new(Self::DEFAULT_ATTRIBUTE_TYPE_ID, Self::DEFAULT_VALUE_TYPE_ID)
    }
}

/// Settings for the result reconstructor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconstructorConfig {
    /// This system's identity in provenance chains and analyses.
    pub provenance_tag: String,
    pub attribute_types: BTreeMap<String, AttributeType>,
    pub attribute_skip_list: BTreeSet<String>,
}

impl Default for ReconstructorConfig {
    fn default() -> Self {
        Self {
            provenance_tag: "infores:reasoner-transpiler".to_string(),
            attribute_types: default_attribute_types(),
            attribute_skip_list: BTreeSet::new(),
        }
    }
}

impl ReconstructorConfig {
    pub fn with_provenance_tag(mut self, tag: impl Into<String>) -> Self {
        self.provenance_tag = tag.into();
        self
    }

    /// Replace the attribute-type mapping entirely.
    pub fn with_attribute_types(mut self, types: BTreeMap<String, AttributeType>) -> Self {
        self.attribute_types = types;
        self
    }

    pub fn with_skip_list<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attribute_skip_list = keys.into_iter().map(Into::into).collect();
        self
    }
}

fn default_attribute_types() -> BTreeMap<String, AttributeType> {
    [
        ("publications", AttributeType::new("biolink:publications", "linkml:Uriorcurie")),
        ("p_value", AttributeType::new("biolink:p_value", "EDAM:data_1669")),
        ("knowledge_level", AttributeType::new("biolink:knowledge_level", "biolink:KnowledgeLevelEnum")),
        ("agent_type", AttributeType::new("biolink:agent_type", "biolink:AgentTypeEnum")),
        ("equivalent_identifiers", AttributeType::new("biolink:same_as", "linkml:Uriorcurie")),
        ("description", AttributeType::new("dct:description", "xsd:string")),
        ("information_content", AttributeType::new("biolink:information_content", "xsd:float")),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}
