//! Query graph model and the boolean query-expression tree.
//!
//! Query graphs arrive as JSON. Fields that may be a single value or a list
//! (`ids`, `categories`, `predicates`) are normalized to `Option<Vec<_>>`, and
//! an empty list means "unconstrained".

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{Result, TranspileError};

// ============================================================================
// Nodes and edges
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SetInterpretation {
    Batch,
    All,
    Many,
}

/// Property-equality constraint on a node or edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeConstraint {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_operator")]
    pub operator: String,
    pub value: Value,
    #[serde(default)]
    pub not: bool,
}

fn default_operator() -> String {
    "===".to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QNode {
    #[serde(default, deserialize_with = "one_or_many", skip_serializing_if = "Option::is_none")]
    pub ids: Option<Vec<String>>,
    #[serde(default, deserialize_with = "one_or_many", skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<AttributeConstraint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set_interpretation: Option<SetInterpretation>,
    /// Synthetic node introduced by subclass expansion.
    #[serde(skip)]
    pub superclass: bool,
}

impl QNode {
    pub fn pinned<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ids: non_empty(ids.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    pub fn with_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories = non_empty(categories.into_iter().map(Into::into).collect());
        self
    }

    pub fn is_set_all(&self) -> bool {
        self.set_interpretation == Some(SetInterpretation::All)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualifierFilter {
    #[serde(default)]
    pub qualifier_type_id: Option<String>,
    #[serde(default)]
    pub qualifier_value: Option<String>,
}

/// Conjunction of qualifier filters. Sets on one edge are disjunctive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualifierConstraint {
    #[serde(default)]
    pub qualifier_set: Vec<QualifierFilter>,
}

/// Compiler-only edge flags; never read from or written to JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeHints {
    /// Edge introduced by subclass expansion.
    pub subclass: bool,
    /// Variable-length bounds `(min, max)`.
    pub length: Option<(u32, u32)>,
    /// Whether inverse predicates are considered.
    pub invert: bool,
}

impl Default for EdgeHints {
    fn default() -> Self {
        Self {
            subclass: false,
            length: None,
            invert: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QEdge {
    pub subject: String,
    pub object: String,
    #[serde(
        default,
        alias = "predicate",
        deserialize_with = "one_or_many",
        skip_serializing_if = "Option::is_none"
    )]
    pub predicates: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub qualifier_constraints: Vec<QualifierConstraint>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attribute_constraints: Vec<AttributeConstraint>,
    #[serde(skip)]
    pub hints: EdgeHints,
}

impl QEdge {
    pub fn new(subject: impl Into<String>, object: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            object: object.into(),
            ..Self::default()
        }
    }

    pub fn with_predicates<I, S>(mut self, predicates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.predicates = non_empty(predicates.into_iter().map(Into::into).collect());
        self
    }

    pub fn predicate_list(&self) -> &[String] {
        self.predicates.as_deref().unwrap_or(&[])
    }
}

/// Nodes and edges keyed by query-local id. Keys double as Cypher variables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryGraph {
    #[serde(default)]
    pub nodes: BTreeMap<String, QNode>,
    #[serde(default)]
    pub edges: BTreeMap<String, QEdge>,
}

impl QueryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(mut self, id: impl Into<String>, node: QNode) -> Self {
        self.nodes.insert(id.into(), node);
        self
    }

    pub fn edge(mut self, id: impl Into<String>, edge: QEdge) -> Self {
        self.edges.insert(id.into(), edge);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    /// Node ids used as an endpoint of some edge.
    pub fn referenced_nodes(&self) -> BTreeSet<String> {
        self.edges
            .values()
            .flat_map(|e| [e.subject.clone(), e.object.clone()])
            .collect()
    }

    /// Union two graphs; entries of `other` win on key collision.
    pub fn merge(&mut self, other: QueryGraph) {
        self.nodes.extend(other.nodes);
        self.edges.extend(other.edges);
    }
}

fn non_empty(values: Vec<String>) -> Option<Vec<String>> {
    (!values.is_empty()).then_some(values)
}

fn one_or_many<'de, D>(deserializer: D) -> std::result::Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => None,
        Some(OneOrMany::One(value)) => Some(vec![value]),
        Some(OneOrMany::Many(values)) => non_empty(values),
    })
}

// ============================================================================
// Boolean expressions
// ============================================================================

/// A boolean combination of query graphs.
///
/// JSON form: a graph object, or `["AND" | "OR" | "XOR" | "NOT", operand...]`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "Value")]
pub enum QueryExpr {
    Graph(QueryGraph),
    And(Vec<QueryExpr>),
    Or(Box<QueryExpr>, Box<QueryExpr>),
    Xor(Box<QueryExpr>, Box<QueryExpr>),
    Not(Box<QueryExpr>),
}

impl QueryExpr {
    pub fn from_json(value: &Value) -> Result<Self> {
        match value {
            Value::Object(_) => serde_json::from_value::<QueryGraph>(value.clone())
                .map(QueryExpr::Graph)
                .map_err(|e| TranspileError::unsupported(format!("Invalid query graph: {e}"))),
            Value::Array(items) => Self::from_operator(items),
            other => Err(TranspileError::unsupported(format!(
                "Query expression must be a graph or an operator list, got {other}"
            ))),
        }
    }

    fn from_operator(items: &[Value]) -> Result<Self> {
        let Some((head, rest)) = items.split_first() else {
            return Err(TranspileError::unsupported("Empty operator list"));
        };
        let op = head
            .as_str()
            .ok_or_else(|| TranspileError::unsupported(format!("Unrecognized operator {head}")))?;

        let arity_ok = match op {
            "AND" => !rest.is_empty(),
            "OR" => rest.len() >= 2,
            "XOR" => rest.len() == 2,
            "NOT" => rest.len() == 1,
            _ => return Err(TranspileError::unsupported(format!("Unrecognized operator \"{op}\""))),
        };
        if !arity_ok {
            return Err(TranspileError::unsupported(match op {
                "AND" => "AND must have at least one operand",
                "OR" => "OR must have at least two operands",
                "XOR" => "XOR must have exactly two operands",
                _ => "NOT must have exactly one operand",
            }));
        }

        let mut operands = rest.iter().map(Self::from_json).collect::<Result<Vec<_>>>()?;
        Ok(match op {
            "AND" if operands.len() == 1 => operands.remove(0),
            "AND" => QueryExpr::And(operands),
            "NOT" => QueryExpr::Not(Box::new(operands.remove(0))),
            "XOR" => {
                let b = operands.remove(1);
                let a = operands.remove(0);
                QueryExpr::Xor(Box::new(a), Box::new(b))
            }
            // OR is associative: nest to the right.
            _ => {
                let mut acc = operands.pop().ok_or_else(|| TranspileError::unsupported("OR without operands"))?;
                while let Some(left) = operands.pop() {
                    acc = QueryExpr::Or(Box::new(left), Box::new(acc));
                }
                acc
            }
        })
    }

    /// Flatten nested ANDs. Semantics are unchanged.
    pub fn flatten(self) -> Self {
        match self {
            QueryExpr::And(children) => {
                let mut flat = Vec::with_capacity(children.len());
                for child in children {
                    match child.flatten() {
                        QueryExpr::And(inner) => flat.extend(inner),
                        other => flat.push(other),
                    }
                }
                if flat.len() == 1 {
                    flat.remove(0)
                } else {
                    QueryExpr::And(flat)
                }
            }
            QueryExpr::Or(a, b) => QueryExpr::Or(Box::new(a.flatten()), Box::new(b.flatten())),
            QueryExpr::Xor(a, b) => QueryExpr::Xor(Box::new(a.flatten()), Box::new(b.flatten())),
            QueryExpr::Not(a) => QueryExpr::Not(Box::new(a.flatten())),
            graph @ QueryExpr::Graph(_) => graph,
        }
    }

    pub fn is_compound(&self) -> bool {
        !matches!(self, QueryExpr::Graph(_))
    }
}

impl TryFrom<Value> for QueryExpr {
    type Error = TranspileError;

    fn try_from(value: Value) -> Result<Self> {
        Self::from_json(&value)
    }
}

impl From<QueryGraph> for QueryExpr {
    fn from(graph: QueryGraph) -> Self {
        QueryExpr::Graph(graph)
    }
}
