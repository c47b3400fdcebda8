//! Qualifier constraints → edge filter.
//!
//! Filters within one qualifier set are ANDed; sets are ORed. Each filter
//! accepts its value or any enum descendant of it.

use qgraph_ontology::{local_name, Ontology};
use std::collections::BTreeSet;

use crate::cypher::Expr;
use crate::error::{Result, TranspileError};
use crate::qgraph::{QualifierConstraint, QualifierFilter};

/// Qualifier whose value is a predicate rather than an enum member.
const QUALIFIED_PREDICATE: &str = "qualified_predicate";

/// Build the filter for `edge_var`, or `None` when nothing constrains it.
pub fn qualifier_filter(
    edge_var: &str,
    constraints: &[QualifierConstraint],
    ontology: &dyn Ontology,
) -> Result<Option<Expr>> {
    let mut alternatives = Vec::new();
    for constraint in constraints {
        let mut required = Vec::new();
        for filter in &constraint.qualifier_set {
            if let Some(term) = filter_term(edge_var, filter, ontology)? {
                required.push(term);
            }
        }
        if let Some(all) = Expr::all(required) {
            alternatives.push(all);
        }
    }
    Ok(Expr::any(alternatives))
}

fn filter_term(edge_var: &str, filter: &QualifierFilter, ontology: &dyn Ontology) -> Result<Option<Expr>> {
    let (type_id, value) = match (&filter.qualifier_type_id, &filter.qualifier_value) {
        (None, None) => return Ok(None),
        (Some(t), Some(v)) => (t, v),
        (Some(t), None) => {
            return Err(TranspileError::InvalidQualifierValue {
                qualifier: t.clone(),
                value: String::new(),
            })
        }
        (None, Some(_)) => return Err(TranspileError::unsupported("Qualifier filter without qualifier_type_id")),
    };

    let qualifier = local_name(type_id);
    if !ontology.is_qualifier(qualifier) {
        return Err(TranspileError::InvalidQualifier(type_id.clone()));
    }

    let mut values = BTreeSet::from([value.clone()]);
    if qualifier != QUALIFIED_PREDICATE {
        if !ontology.is_permissible_value(value) {
            return Err(TranspileError::InvalidQualifierValue {
                qualifier: type_id.clone(),
                value: value.clone(),
            });
        }
        values.extend(ontology.enum_descendants_of(value));
    }

    let property = Expr::var(edge_var).prop(qualifier);
    Ok(Expr::any(
        values
            .into_iter()
            .map(|v| property.clone().eq(Expr::string(v)))
            .collect(),
    ))
}
