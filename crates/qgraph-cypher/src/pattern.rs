//! Compile one query graph (a leaf of the expression tree) to MATCH clauses.

use qgraph_ontology::{local_name, Ontology};
use std::collections::{BTreeMap, BTreeSet};

use crate::config::{CompileOptions, CompilerConfig};
use crate::cypher::{Clause, Expr, IndexHint, Literal, NodePattern, PathPattern, RelPattern};
use crate::error::{Result, TranspileError};
use crate::predicates::resolve_predicates;
use crate::qgraph::{AttributeConstraint, QEdge, QNode, QueryGraph, SetInterpretation};
use crate::qualifiers::qualifier_filter;
use crate::subclass::expand_subclasses;

/// Everything a compile step needs besides the graph itself.
#[derive(Clone, Copy)]
pub(crate) struct CompileContext<'a> {
    pub ontology: &'a dyn Ontology,
    pub config: &'a CompilerConfig,
    pub options: &'a CompileOptions,
    pub subclass_depth: u32,
    /// Subclass expansion applies to single query graphs only; leaves of a
    /// boolean expression are compiled as written.
    pub subclass_expansion: bool,
}

/// A compiled query graph.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Leaf {
    pub clauses: Vec<Clause>,
    /// Variables this leaf defines.
    pub qids: BTreeSet<String>,
    /// Variables this leaf mentions (defined or merely referenced).
    pub references: BTreeSet<String>,
    /// The graph after subclass expansion.
    pub graph: QueryGraph,
}

pub(crate) fn compile_leaf(graph: &QueryGraph, ctx: &CompileContext<'_>) -> Result<Leaf> {
    let graph = if ctx.subclass_expansion && !graph.edges.is_empty() {
        expand_subclasses(graph, ctx.subclass_depth, ctx.config)
    } else {
        graph.clone()
    };

    let referenced = graph.referenced_nodes();
    let mut nodes = NodeRenderer::new(&graph, ctx)?;
    let mut clauses = Vec::new();

    for id in graph.nodes.keys().filter(|id| !referenced.contains(*id)) {
        let (pattern, filters, hints) = nodes.take(id);
        clauses.push(Clause::Match {
            optional: false,
            patterns: vec![PathPattern::node(pattern)],
            hints,
            filter: Expr::all(filters),
        });
    }

    // Subclass paths first so pinned ids anchor the rest of the match.
    let (subclass_edges, plain_edges): (Vec<_>, Vec<_>) =
        graph.edges.iter().partition(|(_, edge)| edge.hints.subclass);
    for (id, edge) in subclass_edges.into_iter().chain(plain_edges) {
        clauses.push(edge_clause(id, edge, &mut nodes, ctx)?);
    }

    let qids: BTreeSet<String> = graph.nodes.keys().chain(graph.edges.keys()).cloned().collect();
    let mut references = qids.clone();
    references.extend(referenced);

    Ok(Leaf {
        clauses,
        qids,
        references,
        graph,
    })
}

fn edge_clause(id: &str, edge: &QEdge, nodes: &mut NodeRenderer, ctx: &CompileContext<'_>) -> Result<Clause> {
    let resolved = resolve_predicates(edge.predicate_list(), edge.hints.invert, ctx.ontology, ctx.config)?;
    let (source, target) = if resolved.is_inverted() {
        (&edge.object, &edge.subject)
    } else {
        (&edge.subject, &edge.object)
    };

    let (source_pattern, mut filters, mut hints) = nodes.take(source);
    let (target_pattern, target_filters, target_hints) = nodes.take(target);
    filters.extend(target_filters);
    hints.extend(target_hints);
    filters.extend(resolved.direction_filter(id, &edge.subject, &edge.object));
    filters.extend(qualifier_filter(id, &edge.qualifier_constraints, ctx.ontology)?);

    let rel = RelPattern {
        var: Some(id.to_string()),
        types: resolved.types(),
        length: edge.hints.length,
        props: constraint_props(&edge.attribute_constraints)?,
        directed: resolved.is_directed(),
    };

    Ok(Clause::Match {
        optional: false,
        patterns: vec![PathPattern::node(source_pattern).then(rel, target_pattern)],
        hints,
        filter: Expr::all(filters),
    })
}

// ============================================================================
// Nodes
// ============================================================================

/// Full description of a declared node, written at its first occurrence.
#[derive(Debug, Clone, Default)]
struct NodeSpec {
    labels: Vec<String>,
    props: Vec<(String, Literal)>,
    filters: Vec<Expr>,
    hints: Vec<IndexHint>,
}

impl NodeSpec {
    fn new(id: &str, node: &QNode, ctx: &CompileContext<'_>) -> Result<Self> {
        if node.set_interpretation == Some(SetInterpretation::Many) {
            return Err(TranspileError::unsupported(format!(
                "set_interpretation MANY on node {id}"
            )));
        }

        let mut spec = NodeSpec::default();
        match node.categories.as_deref() {
            None | Some([]) => spec.labels.push(ctx.config.universal_category.clone()),
            Some([single]) => spec.labels.push(single.clone()),
            Some(many) => {
                let labels = Expr::func("labels", Expr::var(id));
                spec.filters.push(Expr::Or(
                    many.iter()
                        .map(|c| Expr::string(c.clone()).is_in(labels.clone()))
                        .collect(),
                ));
            }
        }

        match node.ids.as_deref() {
            None | Some([]) => {}
            Some([single]) => spec.props.push(("id".to_string(), Literal::str(single.clone()))),
            Some(many) => spec
                .filters
                .push(Expr::var(id).prop("id").is_in(Expr::strings(many.iter().cloned()))),
        }
        spec.props.extend(constraint_props(&node.constraints)?);

        if let Some(max) = ctx.options.max_connectivity {
            spec.filters.push(Expr::DegreeAtMost {
                var: id.to_string(),
                max,
            });
        }

        if ctx.options.use_hints && node.ids.is_some() {
            if let Some(label) = spec.labels.first() {
                spec.hints.push(IndexHint {
                    var: id.to_string(),
                    label: label.clone(),
                    property: "id".to_string(),
                });
            }
        }
        Ok(spec)
    }
}

/// Hands out node patterns: full on first use, bare afterwards.
struct NodeRenderer {
    specs: BTreeMap<String, NodeSpec>,
    rendered: BTreeSet<String>,
}

impl NodeRenderer {
    fn new(graph: &QueryGraph, ctx: &CompileContext<'_>) -> Result<Self> {
        let specs = graph
            .nodes
            .iter()
            .map(|(id, node)| Ok((id.clone(), NodeSpec::new(id, node, ctx)?)))
            .collect::<Result<BTreeMap<_, _>>>()?;
        Ok(Self {
            specs,
            rendered: BTreeSet::new(),
        })
    }

    fn take(&mut self, id: &str) -> (NodePattern, Vec<Expr>, Vec<IndexHint>) {
        let first = self.rendered.insert(id.to_string());
        match self.specs.get(id) {
            Some(spec) if first => (
                NodePattern {
                    var: Some(id.to_string()),
                    labels: spec.labels.clone(),
                    props: spec.props.clone(),
                },
                spec.filters.clone(),
                spec.hints.clone(),
            ),
            // Later occurrences, and nodes defined elsewhere in the query.
            _ => (NodePattern::bare(id), Vec::new(), Vec::new()),
        }
    }
}

// ============================================================================
// Constraints
// ============================================================================

fn constraint_props(constraints: &[AttributeConstraint]) -> Result<Vec<(String, Literal)>> {
    let mut props = Vec::new();
    for constraint in constraints {
        if constraint.not || !matches!(constraint.operator.as_str(), "===" | "==") {
            return Err(TranspileError::unsupported(format!(
                "Unsupported constraint operator {}{} on {}",
                if constraint.not { "NOT " } else { "" },
                constraint.operator,
                constraint.id
            )));
        }
        let key = local_name(&constraint.id);
        if key.starts_with('_') {
            continue;
        }
        if let Some(value) = Literal::from_json(&constraint.value)? {
            props.push((key.to_string(), value));
        }
    }
    Ok(props)
}
