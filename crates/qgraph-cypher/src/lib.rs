//! Query-graph → Cypher compiler and result reconstructor.
//!
//! A query graph names nodes (optionally pinned to ids or typed by
//! categories) and edges (typed by ontology predicates, optionally
//! constrained by qualifiers). Query graphs combine under `AND` / `OR` /
//! `XOR` / `NOT`. This crate:
//!
//! 1. resolves predicates against an [`Ontology`] (descendants, inverses,
//!    symmetry) to pick relationship types and orientation,
//! 2. expands pinned nodes to their subclasses,
//! 3. lowers the boolean expression to a single Cypher statement, and
//! 4. rebuilds the exchange-format message (knowledge graph, results,
//!    auxiliary graphs) from the raw rows the statement returns.
//!
//! ## Motivation
//!
//! Compilation is a pure function of its inputs: the query, an ontology and
//! explicit [`CompilerConfig`] / [`CompileOptions`] values. There is no
//! process-wide state, so concurrent callers with different settings never
//! interfere.
//!
//! ## Non-goals
//!
//! - executing queries or talking to a database,
//! - caching, retries, transactions,
//! - maintaining the ontology itself.
//!
//! ```no_run
//! use qgraph_cypher::{compile, CompileOptions, CompilerConfig, QueryExpr};
//! use qgraph_ontology::BiolinkOntology;
//!
//! let expr: QueryExpr = serde_json::from_str(r#"{
//!     "nodes": {"n0": {"ids": ["MONDO:0005148"]}, "n1": {"categories": ["biolink:Gene"]}},
//!     "edges": {"e01": {"subject": "n0", "object": "n1"}}
//! }"#)?;
//! let compiled = compile(
//!     &expr,
//!     &BiolinkOntology::bundled(),
//!     &CompilerConfig::default(),
//!     &CompileOptions::default(),
//! )?;
//! println!("{compiled}");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod algebra;
pub mod attributes;
pub mod config;
pub mod cypher;
pub mod error;
mod pattern;
pub mod predicates;
pub mod qgraph;
pub mod qualifiers;
pub mod query;
pub mod results;
pub mod subclass;
pub mod trapi;

pub use config::{AttributeType, CompileOptions, CompilerConfig, ReconstructorConfig, RelationshipId};
pub use error::{Result, TranspileError};
pub use predicates::{resolve_predicates, Orientation, ResolvedPredicates};
pub use qgraph::{
    AttributeConstraint, EdgeHints, QEdge, QNode, QualifierConstraint, QualifierFilter, QueryExpr, QueryGraph,
    SetInterpretation,
};
pub use qualifiers::qualifier_filter;
pub use query::{compile, CompiledQuery};
pub use results::{reconstruct, RawRow, Reconstructor};
pub use subclass::expand_subclasses;
pub use trapi::Message;

pub use qgraph_ontology::Ontology;

/// Parse a JSON query expression and compile it.
pub fn compile_json(
    value: &serde_json::Value,
    ontology: &dyn Ontology,
    config: &CompilerConfig,
    options: &CompileOptions,
) -> Result<CompiledQuery> {
    compile(&QueryExpr::from_json(value)?, ontology, config, options)
}
