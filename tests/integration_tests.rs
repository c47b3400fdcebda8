//! Integration tests for the complete qgraph pipeline
//!
//! These tests verify end-to-end functionality across crates:
//! - JSON query → Ontology → Cypher text
//! - Cypher row shape → Reconstructor → exchange-format message
//!
//! Run with: cargo test --test integration_tests

use anyhow::Result;
use qgraph_cypher::{
    compile_json, reconstruct, CompileOptions, CompilerConfig, RawRow, ReconstructorConfig, TranspileError,
};
use qgraph_ontology::{BiolinkOntology, Ontology};
use serde_json::{json, Value};

fn rows(values: Vec<Value>) -> Result<Vec<RawRow>> {
    values
        .into_iter()
        .map(|v| Ok(serde_json::from_value::<RawRow>(v)?))
        .collect()
}

// ============================================================================
// Ontology
// ============================================================================

#[test]
fn test_bundled_ontology_drives_resolution() {
    let onto = BiolinkOntology::bundled();
    assert!(onto.is_predicate("treats"));
    assert_eq!(onto.inverse_of("phenotype_of").as_deref(), Some("has_phenotype"));
    assert!(onto.is_symmetric("correlated_with"));
    assert!(!onto.is_canonical("phenotype_of"));
}

// ============================================================================
// Query → rows → message
// ============================================================================

#[test]
fn test_one_hop_round_trip() -> Result<()> {
    let onto = BiolinkOntology::bundled();
    let query = json!({
        "nodes": {"n0": {"ids": ["MONDO:0005148"]}, "n1": {"categories": ["biolink:Gene"]}},
        "edges": {"e01": {"subject": "n0", "object": "n1", "predicates": ["biolink:related_to"]}}
    });
    let options = CompileOptions {
        subclass: false,
        ..CompileOptions::default()
    };
    let compiled = compile_json(&query, &onto, &CompilerConfig::default(), &options)?;
    assert!(compiled.text.starts_with(
        "MATCH (`n0`:`biolink:NamedThing` {`id`: \"MONDO:0005148\"})-[`e01`]-(`n1`:`biolink:Gene`)"
    ));
    assert!(compiled.text.contains("RETURN `n0` {.*, labels: labels(`n0`)} AS `n0`"));

    let disease = json!({"id": "MONDO:0005148", "name": "type 2 diabetes", "labels": ["biolink:Disease"]});
    let input = rows(vec![
        json!({
            "n0": disease,
            "n1": {"id": "HGNC:1", "labels": ["biolink:Gene"], "symbol": "A1BG"},
            "e01": {
                "element_id": "5:db:1", "id": "edge-a",
                "subject": "HGNC:1", "predicate": "biolink:gene_associated_with_condition", "object": "MONDO:0005148",
                "primary_knowledge_source": "infores:ctd",
                "publications": ["PMID:1"]
            }
        }),
        json!({
            "n0": disease,
            "n1": {"id": "HGNC:2", "labels": ["biolink:Gene"]},
            "e01": {
                "element_id": "5:db:2", "id": "edge-b",
                "subject": "MONDO:0005148", "predicate": "biolink:related_to", "object": "HGNC:2"
            }
        }),
    ])?;
    let message = reconstruct(&compiled, input, &onto, &ReconstructorConfig::default())?;

    assert_eq!(message.knowledge_graph.nodes.len(), 3);
    assert_eq!(message.knowledge_graph.edges.len(), 2);
    assert_eq!(message.results.len(), 2);

    let a = &message.knowledge_graph.edges["edge-a"];
    assert_eq!(a.sources.len(), 2);
    assert_eq!(a.attributes[0].attribute_type_id, "biolink:publications");
    let b = &message.knowledge_graph.edges["edge-b"];
    assert_eq!(b.sources.len(), 1);
    assert_eq!(b.sources[0].resource_id, "infores:reasoner-transpiler");

    let gene = &message.knowledge_graph.nodes["HGNC:1"];
    assert_eq!(gene.attributes[0].original_attribute_name.as_deref(), Some("symbol"));
    assert_eq!(gene.attributes[0].attribute_type_id, "biolink:Attribute");
    Ok(())
}

#[test]
fn test_compiled_query_drives_reconstruction_of_negation() -> Result<()> {
    let onto = BiolinkOntology::bundled();
    let query = json!([
        "AND",
        {"nodes": {"n0": {"ids": ["MONDO:1"]}}, "edges": {}},
        ["NOT", {"nodes": {"n1": {}}, "edges": {"e01": {"subject": "n0", "object": "n1"}}}]
    ]);
    let compiled = compile_json(&query, &onto, &CompilerConfig::default(), &CompileOptions::default())?;
    assert!(compiled.compound);
    assert!(compiled.text.contains("OPTIONAL MATCH"));

    let input = rows(vec![json!({
        "n0": {"id": "MONDO:1", "labels": ["biolink:Disease"]},
        "n1": null,
        "e01": null
    })])?;
    let message = reconstruct(&compiled, input, &onto, &ReconstructorConfig::default())?;
    assert_eq!(message.results.len(), 1);
    assert!(message.results[0].node_bindings["n1"].is_empty());
    Ok(())
}

// ============================================================================
// Error surface
// ============================================================================

#[test]
fn test_errors_are_typed() {
    let onto = BiolinkOntology::bundled();
    let config = CompilerConfig::default();
    let options = CompileOptions::default();

    let bad_predicate = json!({
        "nodes": {"n0": {}, "n1": {}},
        "edges": {"e01": {"subject": "n0", "object": "n1", "predicates": ["biolink:frobnicates"]}}
    });
    assert_eq!(
        compile_json(&bad_predicate, &onto, &config, &options).unwrap_err(),
        TranspileError::InvalidPredicate("biolink:frobnicates".into())
    );

    let bad_qualifier = json!({
        "nodes": {"n0": {}, "n1": {}},
        "edges": {"e01": {
            "subject": "n0", "object": "n1",
            "qualifier_constraints": [{"qualifier_set": [
                {"qualifier_type_id": "biolink:not_a_qualifier", "qualifier_value": "activity"}
            ]}]
        }}
    });
    assert!(matches!(
        compile_json(&bad_qualifier, &onto, &config, &options),
        Err(TranspileError::InvalidQualifier(_))
    ));

    let g = json!({"nodes": {}, "edges": {}});
    assert!(matches!(
        compile_json(&json!(["XOR", g]), &onto, &config, &options),
        Err(TranspileError::Unsupported(_))
    ));
}
