//! Top-level compilation: expression tree → one Cypher statement.

use qgraph_ontology::Ontology;
use std::collections::BTreeSet;
use std::fmt;

use crate::algebra::Plan;
use crate::config::{CompileOptions, CompilerConfig};
use crate::cypher::{render, Clause, Expr, Literal, Projection};
use crate::error::{Result, TranspileError};
use crate::pattern::CompileContext;
use crate::qgraph::{QEdge, QueryExpr, QueryGraph};

/// Alias of the constant column returned by a query with no variables.
pub const EMPTY_RESULT_COLUMN: &str = "empty";

/// Comprehension variable used when projecting variable-length paths.
const PATH_ELEMENT_VAR: &str = "rel";

/// A compiled statement plus what is needed to interpret its rows.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub text: String,
    /// Union of all leaf graphs after subclass expansion.
    pub qgraph: QueryGraph,
    /// Variables bound by the statement.
    pub variables: BTreeSet<String>,
    pub compound: bool,
    pub options: CompileOptions,
}

impl fmt::Display for CompiledQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Compile a query expression.
pub fn compile(
    expr: &QueryExpr,
    ontology: &dyn Ontology,
    config: &CompilerConfig,
    options: &CompileOptions,
) -> Result<CompiledQuery> {
    let ctx = CompileContext {
        ontology,
        config,
        options,
        subclass_depth: options.validated_subclass_depth()?,
        subclass_expansion: options.subclass && !expr.is_compound(),
    };

    let plan = Plan::build(expr, &ctx)?;
    let compound = plan.is_compound();
    if compound && (options.skip.is_some() || options.limit.is_some()) {
        return Err(TranspileError::unsupported(
            "skip/limit are only supported for single query graphs",
        ));
    }

    let emission = plan.emit();
    let mut clauses = emission.clauses;
    let variables = plan.qids();
    if let Some(filter) = emission.filter {
        let mut items: Vec<Projection> = variables
            .iter()
            .chain(&emission.flags)
            .cloned()
            .map(Projection::var)
            .collect();
        if items.is_empty() {
            items.push(empty_column());
        }
        clauses.push(Clause::With {
            items,
            filter: Some(filter),
        });
    }

    let qgraph = plan.graph();
    let items = if variables.is_empty() {
        vec![empty_column()]
    } else if options.reasoner {
        row_projections(&qgraph)
    } else {
        variables.iter().cloned().map(Projection::var).collect()
    };
    clauses.push(Clause::Return {
        items,
        skip: options.skip,
        limit: options.limit,
    });

    let text = render(&clauses);
    tracing::debug!(compound, variables = variables.len(), cypher = %text, "compiled query");

    Ok(CompiledQuery {
        text,
        qgraph,
        variables,
        compound,
        options: options.clone(),
    })
}

fn empty_column() -> Projection {
    Projection::aliased(Expr::Lit(Literal::Null), EMPTY_RESULT_COLUMN)
}

/// One column per query variable, shaped for result reconstruction.
fn row_projections(qgraph: &QueryGraph) -> Vec<Projection> {
    let nodes = qgraph.nodes.keys().map(|id| {
        Projection::aliased(
            Expr::MapProjection {
                var: id.clone(),
                entries: vec![("labels".to_string(), Expr::func("labels", Expr::var(id.clone())))],
            },
            id.clone(),
        )
    });
    let edges = qgraph.edges.iter().map(|(id, edge)| {
        let expr = if is_path_edge(edge) {
            Expr::ListComprehension {
                var: PATH_ELEMENT_VAR.to_string(),
                source: Box::new(Expr::var(id.clone())),
                map: Box::new(edge_projection(PATH_ELEMENT_VAR)),
            }
        } else {
            edge_projection(id)
        };
        Projection::aliased(expr, id.clone())
    });
    nodes.chain(edges).collect()
}

fn edge_projection(var: &str) -> Expr {
    let rel = || Expr::var(var);
    Expr::MapProjection {
        var: var.to_string(),
        entries: vec![
            ("element_id".to_string(), Expr::func("elementId", rel())),
            ("subject".to_string(), Expr::func("startNode", rel()).prop("id")),
            ("predicate".to_string(), Expr::func("type", rel())),
            ("object".to_string(), Expr::func("endNode", rel()).prop("id")),
        ],
    }
}

/// Whether a query edge binds a list of relationships.
pub(crate) fn is_path_edge(edge: &QEdge) -> bool {
    edge.hints.length.is_some()
}
