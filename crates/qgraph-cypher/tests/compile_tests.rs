//! Compilation of JSON query expressions to Cypher.

use anyhow::Result;
use qgraph_cypher::{compile_json, CompileOptions, CompiledQuery, CompilerConfig, TranspileError};
use qgraph_ontology::BiolinkOntology;
use serde_json::{json, Value};

fn compile(value: Value, options: CompileOptions) -> qgraph_cypher::Result<CompiledQuery> {
    compile_json(&value, &BiolinkOntology::bundled(), &CompilerConfig::default(), &options)
}

fn plain() -> CompileOptions {
    CompileOptions {
        subclass: false,
        reasoner: false,
        ..CompileOptions::default()
    }
}

fn hop(predicate: &str) -> Value {
    json!({
        "nodes": {"n0": {"ids": ["MONDO:1"]}, "n1": {"categories": ["biolink:Gene"]}},
        "edges": {"e01": {"subject": "n0", "object": "n1", "predicates": [predicate]}}
    })
}

// ============================================================================
// Single graphs
// ============================================================================

#[test]
fn symmetric_predicate_is_undirected_without_filter() -> Result<()> {
    let compiled = compile(hop("biolink:correlated_with"), plain())?;
    assert!(compiled.text.contains("]-(`n1`:`biolink:Gene`)"));
    assert!(!compiled.text.contains("]->"));
    assert!(!compiled.text.contains("WHERE"));
    Ok(())
}

#[test]
fn non_canonical_predicate_is_written_from_the_object() -> Result<()> {
    let compiled = compile(hop("biolink:phenotype_of"), plain())?;
    assert_eq!(
        compiled.text,
        "MATCH (`n1`:`biolink:Gene`)-[`e01`:`biolink:has_phenotype`]->(`n0`:`biolink:NamedThing` {`id`: \"MONDO:1\"}) \
         RETURN `e01`, `n0`, `n1`"
    );
    Ok(())
}

#[test]
fn qualifier_values_expand_to_enum_descendants() -> Result<()> {
    let query = json!({
        "nodes": {"n0": {"ids": ["CHEBI:1"]}, "n1": {}},
        "edges": {"e01": {
            "subject": "n0",
            "object": "n1",
            "predicates": ["biolink:affects"],
            "qualifier_constraints": [{"qualifier_set": [
                {"qualifier_type_id": "biolink:object_direction_qualifier", "qualifier_value": "increased"}
            ]}]
        }}
    });
    let compiled = compile(query, plain())?;
    assert!(compiled.text.contains("`e01`.object_direction_qualifier = \"increased\""));
    assert!(compiled.text.contains("`e01`.object_direction_qualifier = \"upregulated\""));
    Ok(())
}

#[test]
fn unknown_qualifier_value_is_rejected() {
    let query = json!({
        "nodes": {"n0": {}, "n1": {}},
        "edges": {"e01": {
            "subject": "n0",
            "object": "n1",
            "qualifier_constraints": [{"qualifier_set": [
                {"qualifier_type_id": "biolink:object_aspect_qualifier", "qualifier_value": "bogus"}
            ]}]
        }}
    });
    let err = compile(query, plain()).unwrap_err();
    assert_eq!(
        err,
        TranspileError::InvalidQualifierValue {
            qualifier: "biolink:object_aspect_qualifier".into(),
            value: "bogus".into(),
        }
    );
}

#[test]
fn two_categories_never_become_a_label() -> Result<()> {
    let query = json!({"nodes": {"n0": {"categories": ["biolink:Gene", "biolink:Protein"]}}, "edges": {}});
    let compiled = compile(query, plain())?;
    assert!(compiled.text.starts_with("MATCH (`n0`) WHERE"));
    assert!(compiled.text.contains("\"biolink:Protein\" IN labels(`n0`)"));
    Ok(())
}

#[test]
fn subclass_depth_bounds_the_path() -> Result<()> {
    let depth = |d: i64| CompileOptions {
        subclass_depth: d,
        ..plain()
    };
    let default = compile(hop("biolink:related_to"), CompileOptions { subclass: true, ..depth(1) })?;
    assert!(default.text.contains("`biolink:subclass_of`*0..1]->"));
    let zero = compile(hop("biolink:related_to"), CompileOptions { subclass: true, ..depth(0) })?;
    assert!(zero.text.contains("`biolink:subclass_of`*0..0]->"));
    let negative = compile(hop("biolink:related_to"), CompileOptions { subclass: true, ..depth(-1) });
    assert!(matches!(negative, Err(TranspileError::InvalidArgument(_))));
    Ok(())
}

#[test]
fn node_only_graphs_are_not_expanded() -> Result<()> {
    let query = json!({"nodes": {"n0": {"ids": ["MONDO:1"]}}, "edges": {}});
    let compiled = compile(query, CompileOptions::default())?;
    assert!(!compiled.text.contains("subclass"));
    assert_eq!(compiled.variables.len(), 1);
    Ok(())
}

#[test]
fn predicate_outside_the_graph_means_no_results() {
    let config = CompilerConfig::default().with_predicates_in_graph(["biolink:treats"]);
    let err = compile_json(&hop("biolink:has_phenotype"), &BiolinkOntology::bundled(), &config, &plain())
        .unwrap_err();
    assert!(err.is_no_results());
}

// ============================================================================
// Boolean expressions
// ============================================================================

#[test]
fn and_not_filters_on_missing_match() -> Result<()> {
    let query = json!([
        "AND",
        {"nodes": {"n0": {"ids": ["MONDO:1"]}}, "edges": {}},
        ["NOT", {"nodes": {"n1": {}}, "edges": {"e01": {"subject": "n0", "object": "n1"}}}]
    ]);
    let compiled = compile(query, plain())?;
    assert!(compiled.compound);
    assert_eq!(
        compiled.text,
        "MATCH (`n0`:`biolink:NamedThing` {`id`: \"MONDO:1\"}) \
         OPTIONAL MATCH (`n0`)-[`e01`]-(`n1`:`biolink:NamedThing`) \
         WITH `e01`, `n0`, `n1` WHERE NOT ((`e01` IS NOT NULL) AND (`n1` IS NOT NULL)) \
         RETURN `e01`, `n0`, `n1`"
    );
    Ok(())
}

#[test]
fn not_of_or_negates_each_operand_condition() -> Result<()> {
    let query = json!([
        "AND",
        {"nodes": {"n0": {"ids": ["MONDO:1"]}}, "edges": {}},
        ["NOT", ["OR",
            {"nodes": {"n1": {}}, "edges": {"e01": {"subject": "n0", "object": "n1"}}},
            {"nodes": {"n2": {}}, "edges": {"e02": {"subject": "n0", "object": "n2"}}}
        ]]
    ]);
    let compiled = compile(query, plain())?;
    assert!(compiled.text.contains(
        "WHERE NOT (((`e01` IS NOT NULL) AND (`n1` IS NOT NULL)) OR ((`e02` IS NOT NULL) AND (`n2` IS NOT NULL)))"
    ));
    Ok(())
}

#[test]
fn compound_leaves_are_not_subclass_expanded() -> Result<()> {
    let query = json!([
        "AND",
        {
            "nodes": {"n0": {"ids": ["MONDO:1"]}, "n1": {}},
            "edges": {"e01": {"subject": "n0", "object": "n1"}}
        },
        ["NOT", {
            "nodes": {"n0": {"ids": ["MONDO:1"]}, "n2": {}},
            "edges": {"e02": {"subject": "n0", "object": "n2"}}
        }]
    ]);
    let compiled = compile(query.clone(), CompileOptions::default())?;
    assert!(!compiled.text.contains("subclass"));
    assert!(!compiled.qgraph.nodes.contains_key("n0_superclass"));
    assert!(compiled.text.contains("WHERE NOT ((`e02` IS NOT NULL) AND (`n2` IS NOT NULL))"));

    // The same graph on its own is still expanded.
    let single = compile(query[1].clone(), CompileOptions::default())?;
    assert_eq!(single.text.matches("`n0_subclass_edge`:`biolink:subclass_of`").count(), 1);
    Ok(())
}

#[test]
fn operator_errors_surface_from_json() {
    let g = json!({"nodes": {}, "edges": {}});
    let err = compile(json!(["XOR", g, g, g]), plain()).unwrap_err();
    assert_eq!(err, TranspileError::Unsupported("XOR must have exactly two operands".into()));
    let err = compile(json!(["NOT"]), plain()).unwrap_err();
    assert_eq!(err, TranspileError::Unsupported("NOT must have exactly one operand".into()));
    let err = compile(json!(["IMPLIES", g, g]), plain()).unwrap_err();
    assert!(matches!(err, TranspileError::Unsupported(_)));
}

#[test]
fn compound_queries_reject_pagination() {
    let g = json!({"nodes": {"n0": {}}, "edges": {}});
    let options = CompileOptions {
        skip: Some(10),
        ..plain()
    };
    let err = compile(json!(["OR", g, g]), options).unwrap_err();
    assert!(matches!(err, TranspileError::Unsupported(_)));
}
