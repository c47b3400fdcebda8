//! Raw row values and their transform into knowledge-graph nodes and edges.
//!
//! Row values are the map projections emitted by the compiler's return
//! clause. Reserved keys become typed fields; everything else becomes an
//! attribute, a qualifier (edges only) or part of the provenance chain.

use qgraph_ontology::{curie, Ontology};
use serde_json::{Map, Value};

use crate::config::{AttributeType, ReconstructorConfig};
use crate::error::{Result, TranspileError};
use crate::trapi::{Attribute, KgEdge, KgNode, Qualifier, RetrievalSource};

pub const RESERVED_NODE_KEYS: &[&str] = &["id", "name", "labels", "element_id"];
pub const RESERVED_EDGE_KEYS: &[&str] = &["id", "predicate", "subject", "object", "sources", "element_id"];
const PRIMARY_SOURCE_KEYS: &[&str] = &["primary_knowledge_source", "biolink:primary_knowledge_source"];
const AGGREGATOR_SOURCE_KEYS: &[&str] = &["aggregator_knowledge_source", "biolink:aggregator_knowledge_source"];
/// Property holding pre-formed attributes as a list of JSON strings.
const JSON_ATTRIBUTES_KEY: &str = "attributes";

// ============================================================================
// Raw values
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct RawNode {
    pub id: String,
    pub name: Option<String>,
    pub labels: Vec<String>,
    /// Non-reserved properties.
    pub properties: Map<String, Value>,
}

impl RawNode {
    /// `Ok(None)` for a null (unmatched optional) binding.
    pub fn from_value(var: &str, value: &Value) -> Result<Option<Self>> {
        let map = match value {
            Value::Null => return Ok(None),
            Value::Object(map) => map,
            other => {
                return Err(TranspileError::malformed(format!(
                    "node `{var}` must be a map, got {other}"
                )))
            }
        };
        let id = map
            .get("id")
            .and_then(scalar_string)
            .ok_or_else(|| TranspileError::malformed(format!("node `{var}` has no id")))?;
        let labels = match map.get("labels") {
            Some(Value::Array(items)) => items.iter().filter_map(|l| l.as_str().map(str::to_string)).collect(),
            _ => Vec::new(),
        };
        Ok(Some(Self {
            id,
            name: map.get("name").and_then(Value::as_str).map(str::to_string),
            labels,
            properties: without(map, RESERVED_NODE_KEYS),
        }))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawEdge {
    pub element_id: String,
    /// The `id` property, when the graph stores one.
    pub id: Option<String>,
    pub subject: String,
    pub predicate: String,
    pub object: String,
    pub properties: Map<String, Value>,
}

impl RawEdge {
    pub fn from_value(var: &str, value: &Value) -> Result<Option<Self>> {
        let map = match value {
            Value::Null => return Ok(None),
            Value::Object(map) => map,
            other => {
                return Err(TranspileError::malformed(format!(
                    "edge `{var}` must be a map, got {other}"
                )))
            }
        };
        let field = |key: &str| {
            map.get(key)
                .and_then(scalar_string)
                .ok_or_else(|| TranspileError::malformed(format!("edge `{var}` has no {key}")))
        };
        Ok(Some(Self {
            element_id: field("element_id")?,
            id: map.get("id").and_then(scalar_string),
            subject: field("subject")?,
            predicate: field("predicate")?,
            object: field("object")?,
            properties: without(map, RESERVED_EDGE_KEYS),
        }))
    }

    /// Edges of a variable-length binding; null is an empty path.
    pub fn path_from_value(var: &str, value: &Value) -> Result<Vec<Self>> {
        match value {
            Value::Null => Ok(Vec::new()),
            Value::Array(items) => items
                .iter()
                .filter_map(|item| RawEdge::from_value(var, item).transpose())
                .collect(),
            other => Err(TranspileError::malformed(format!(
                "path edge `{var}` must be a list, got {other}"
            ))),
        }
    }
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn without(map: &Map<String, Value>, reserved: &[&str]) -> Map<String, Value> {
    map.iter()
        .filter(|(k, _)| !reserved.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

// ============================================================================
// Transform
// ============================================================================

pub(crate) struct AttributeTransformer<'a> {
    ontology: &'a dyn Ontology,
    config: &'a ReconstructorConfig,
}

impl<'a> AttributeTransformer<'a> {
    pub fn new(ontology: &'a dyn Ontology, config: &'a ReconstructorConfig) -> Self {
        Self { ontology, config }
    }

    pub fn node(&self, raw: &RawNode) -> KgNode {
        let mut categories = raw.labels.clone();
        categories.sort();
        categories.dedup();
        KgNode {
            name: raw.name.clone(),
            categories,
            attributes: self.attributes(&raw.properties, |_| false),
        }
    }

    pub fn edge(&self, raw: &RawEdge) -> KgEdge {
        let is_provenance =
            |key: &str| PRIMARY_SOURCE_KEYS.contains(&key) || AGGREGATOR_SOURCE_KEYS.contains(&key);

        let qualifiers = raw
            .properties
            .iter()
            .filter(|(key, _)| !is_provenance(key) && !self.skipped(key) && self.ontology.is_qualifier(key))
            .map(|(key, value)| Qualifier {
                qualifier_type_id: curie(key),
                qualifier_value: value.as_str().map_or_else(|| value.to_string(), str::to_string),
            })
            .collect();

        KgEdge {
            subject: raw.subject.clone(),
            predicate: raw.predicate.clone(),
            object: raw.object.clone(),
            attributes: self.attributes(&raw.properties, |key| {
                is_provenance(key) || self.ontology.is_qualifier(key)
            }),
            qualifiers,
            sources: self.sources(&raw.properties),
        }
    }

    fn skipped(&self, key: &str) -> bool {
        self.config.attribute_skip_list.contains(key)
    }

    fn attributes(&self, properties: &Map<String, Value>, excluded: impl Fn(&str) -> bool) -> Vec<Attribute> {
        let mut out = properties
            .get(JSON_ATTRIBUTES_KEY)
            .map(parse_json_attributes)
            .unwrap_or_default();

        for (key, value) in properties {
            if key == JSON_ATTRIBUTES_KEY || self.skipped(key) || excluded(key) || value.is_null() {
                continue;
            }
            let typing = self.attribute_type(key);
            out.push(Attribute {
                value_type_id: typing.value_type_id,
                original_attribute_name: Some(key.clone()),
                ..Attribute::new(typing.attribute_type_id, value.clone())
            });
        }
        out
    }

    /// Configured mapping, then the ontology's slot URI, then the default.
    fn attribute_type(&self, key: &str) -> AttributeType {
        if let Some(configured) = self.config.attribute_types.get(key) {
            return configured.clone();
        }
        match self.ontology.slot_uri(key) {
            Some(uri) => AttributeType::new(&uri, AttributeType::DEFAULT_VALUE_TYPE_ID),
            None => AttributeType::fallback(),
        }
    }

    /// primary → aggregators (in order) → this system.
    fn sources(&self, properties: &Map<String, Value>) -> Vec<RetrievalSource> {
        let tag = &self.config.provenance_tag;
        let primary = PRIMARY_SOURCE_KEYS
            .iter()
            .filter_map(|key| properties.get(*key).and_then(Value::as_str))
            .find(|s| !s.is_empty());
        let Some(primary) = primary else {
            return vec![RetrievalSource::primary(tag.clone())];
        };

        let mut aggregators: Vec<&str> = Vec::new();
        for key in AGGREGATOR_SOURCE_KEYS {
            let values: Vec<&str> = match properties.get(*key) {
                Some(Value::String(s)) => vec![s.as_str()],
                Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
                _ => Vec::new(),
            };
            for value in values {
                if !value.is_empty() && value != tag && value != primary && !aggregators.contains(&value) {
                    aggregators.push(value);
                }
            }
        }

        let mut chain = vec![RetrievalSource::primary(primary)];
        let mut upstream = primary;
        for aggregator in aggregators {
            chain.push(RetrievalSource::aggregator(aggregator, upstream));
            upstream = aggregator;
        }
        chain.push(RetrievalSource::aggregator(tag.clone(), upstream));
        chain
    }
}

/// All-or-nothing: one malformed entry discards the whole property.
fn parse_json_attributes(value: &Value) -> Vec<Attribute> {
    let Value::Array(items) = value else {
        tracing::warn!(value = %value, "attributes property should be a list of JSON strings; ignoring");
        return Vec::new();
    };
    let parsed: std::result::Result<Vec<Attribute>, String> = items
        .iter()
        .map(|item| match item {
            Value::String(text) => serde_json::from_str::<Attribute>(text).map_err(|e| e.to_string()),
            other => Err(format!("expected a JSON string, got {other}")),
        })
        .collect();
    match parsed {
        Ok(attributes) => attributes,
        Err(error) => {
            tracing::warn!(%error, "could not parse attributes property; ignoring");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trapi::ResourceRole;
    use qgraph_ontology::BiolinkOntology;
    use serde_json::json;

    fn edge(props: Value) -> anyhow::Result<RawEdge> {
        let mut value = json!({
            "element_id": "5:abc:1",
            "subject": "CHEBI:1",
            "predicate": "biolink:treats",
            "object": "MONDO:1"
        });
        if let (Value::Object(base), Value::Object(extra)) = (&mut value, props) {
            base.extend(extra);
        }
        RawEdge::from_value("e", &value)?.ok_or_else(|| anyhow::anyhow!("edge is null"))
    }

    #[test]
    fn missing_primary_source_yields_only_this_system() -> anyhow::Result<()> {
        let onto = BiolinkOntology::bundled();
        let config = ReconstructorConfig::default();
        let kg = AttributeTransformer::new(&onto, &config).edge(&edge(json!({}))?);
        assert_eq!(kg.sources, vec![RetrievalSource::primary("infores:reasoner-transpiler")]);
        Ok(())
    }

    #[test]
    fn provenance_chain_links_each_aggregator_upstream() -> anyhow::Result<()> {
        let onto = BiolinkOntology::bundled();
        let config = ReconstructorConfig::default().with_provenance_tag("infores:me");
        let kg = AttributeTransformer::new(&onto, &config).edge(&edge(json!({
            "biolink:primary_knowledge_source": "infores:ctd",
            "aggregator_knowledge_source": ["infores:a", "infores:b"]
        }))?);
        let chain: Vec<(&str, ResourceRole, Vec<String>)> = kg
            .sources
            .iter()
            .map(|s| (s.resource_id.as_str(), s.resource_role, s.upstream_resource_ids.clone()))
            .collect();
        assert_eq!(
            chain,
            vec![
                ("infores:ctd", ResourceRole::PrimaryKnowledgeSource, vec![]),
                ("infores:a", ResourceRole::AggregatorKnowledgeSource, vec!["infores:ctd".to_string()]),
                ("infores:b", ResourceRole::AggregatorKnowledgeSource, vec!["infores:a".to_string()]),
                ("infores:me", ResourceRole::AggregatorKnowledgeSource, vec!["infores:b".to_string()]),
            ]
        );
        assert!(kg.attributes.is_empty());
        Ok(())
    }

    #[test]
    fn qualifiers_are_split_from_attributes() -> anyhow::Result<()> {
        let onto = BiolinkOntology::bundled();
        let config = ReconstructorConfig::default();
        let kg = AttributeTransformer::new(&onto, &config).edge(&edge(json!({
            "object_aspect_qualifier": "activity",
            "publications": ["PMID:1"],
            "score": 0.5
        }))?);
        assert_eq!(
            kg.qualifiers,
            vec![Qualifier {
                qualifier_type_id: "biolink:object_aspect_qualifier".into(),
                qualifier_value: "activity".into(),
            }]
        );
        let types: Vec<&str> = kg.attributes.iter().map(|a| a.attribute_type_id.as_str()).collect();
        assert_eq!(types, vec!["biolink:publications", "biolink:Attribute"]);
        assert_eq!(kg.attributes[1].value_type_id.as_deref(), Some("EDAM:data_0006"));
        Ok(())
    }

    #[test]
    fn slot_uri_types_unmapped_attributes() -> anyhow::Result<()> {
        let onto = BiolinkOntology::bundled();
        let config = ReconstructorConfig::default().with_attribute_types(Default::default());
        let node = RawNode::from_value("n", &json!({"id": "X", "labels": ["b", "a"], "synonym": ["x"]}))?
            .ok_or_else(|| anyhow::anyhow!("node is null"))?;
        let kg = AttributeTransformer::new(&onto, &config).node(&node);
        assert_eq!(kg.categories, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(kg.attributes[0].attribute_type_id, "biolink:synonym");
        Ok(())
    }

    #[test]
    fn json_attributes_are_parsed_or_ignored_whole() -> anyhow::Result<()> {
        let onto = BiolinkOntology::bundled();
        let config = ReconstructorConfig::default().with_skip_list(["internal"]);
        let transformer = AttributeTransformer::new(&onto, &config);

        let good = edge(json!({
            "attributes": [r#"{"attribute_type_id": "biolink:has_evidence", "value": "ECO:1"}"#],
            "internal": 1
        }))?;
        let kg = transformer.edge(&good);
        assert_eq!(kg.attributes.len(), 1);
        assert_eq!(kg.attributes[0].attribute_type_id, "biolink:has_evidence");

        let bad = edge(json!({"attributes": ["{not json", r#"{"attribute_type_id": "x", "value": 1}"#]}))?;
        assert!(transformer.edge(&bad).attributes.is_empty());
        Ok(())
    }

    #[test]
    fn malformed_values_are_reported() {
        assert!(matches!(
            RawNode::from_value("n0", &json!({"name": "no id"})),
            Err(TranspileError::MalformedResult(_))
        ));
        assert!(matches!(
            RawEdge::path_from_value("p", &json!({"element_id": "1"})),
            Err(TranspileError::MalformedResult(_))
        ));
        assert_eq!(RawNode::from_value("n0", &Value::Null), Ok(None));
    }
}
