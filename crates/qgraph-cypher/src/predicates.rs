//! Predicate resolution: descendant expansion, inverse handling and the
//! resulting edge orientation.
//!
//! A graph only stores canonical or symmetric predicates, so a query for
//! `treated_by` must really look for `treats` edges pointing the other way.
//! The rules:
//!
//! - every queried predicate contributes its inverse (symmetric predicates
//!   are their own inverse);
//! - descendants are kept only if present in the graph and canonical or
//!   symmetric;
//! - orientation follows from which of the two sets survived.

use qgraph_ontology::{curie, local_name, Ontology};
use std::collections::BTreeSet;

use crate::config::CompilerConfig;
use crate::cypher::Expr;
use crate::error::{Result, TranspileError};

/// How an edge pattern must be written once its predicates are resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Orientation {
    /// Any relationship type, either direction.
    Any,
    /// Symmetric predicates only: undirected, no filter.
    Symmetric,
    /// Forward predicates only: `(subject)-[]->(object)`.
    Forward,
    /// Inverse predicates only: `(object)-[]->(subject)`.
    Inverted,
    /// Both sets non-empty: undirected plus a per-type direction filter.
    Mixed,
}

/// Resolved relationship types for one query edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPredicates {
    /// Curies matched as written (subject → object).
    pub forward: BTreeSet<String>,
    /// Curies matched in the opposite direction (object → subject).
    pub inverse: BTreeSet<String>,
    pub orientation: Orientation,
}

impl ResolvedPredicates {
    fn any() -> Self {
        Self {
            forward: BTreeSet::new(),
            inverse: BTreeSet::new(),
            orientation: Orientation::Any,
        }
    }

    /// Relationship types for the pattern, sorted and deduplicated.
    pub fn types(&self) -> Vec<String> {
        self.forward.union(&self.inverse).cloned().collect()
    }

    pub fn is_directed(&self) -> bool {
        matches!(self.orientation, Orientation::Forward | Orientation::Inverted)
    }

    /// Whether the pattern must be written from the object side.
    pub fn is_inverted(&self) -> bool {
        self.orientation == Orientation::Inverted
    }

    /// `(type(e) IN forward AND startNode(e) = subject) OR
    ///  (type(e) IN inverse AND startNode(e) = object)` for mixed edges.
    pub fn direction_filter(&self, edge: &str, subject: &str, object: &str) -> Option<Expr> {
        if self.orientation != Orientation::Mixed {
            return None;
        }
        let branch = |types: &BTreeSet<String>, start: &str| {
            Expr::And(vec![
                Expr::func("type", Expr::var(edge)).is_in(Expr::strings(types.iter().cloned())),
                Expr::func("startNode", Expr::var(edge)).eq(Expr::var(start)),
            ])
        };
        Some(Expr::Or(vec![
            branch(&self.forward, subject),
            branch(&self.inverse, object),
        ]))
    }
}

/// Resolve the predicates of a query edge.
///
/// `invert` is false for synthetic edges that must not consider inverses.
pub fn resolve_predicates(
    predicates: &[String],
    invert: bool,
    ontology: &dyn Ontology,
    config: &CompilerConfig,
) -> Result<ResolvedPredicates> {
    let universal = local_name(&config.universal_predicate);
    if predicates.is_empty() || predicates.iter().any(|p| local_name(p) == universal) {
        return Ok(ResolvedPredicates::any());
    }

    let mut symmetric = true;
    let mut queried = Vec::with_capacity(predicates.len());
    let mut inverses = Vec::new();
    for predicate in predicates {
        let name = local_name(predicate);
        if !ontology.is_predicate(name) {
            return Err(TranspileError::InvalidPredicate(predicate.clone()));
        }
        if let Some(inverse) = ontology.inverse_of(name) {
            inverses.push(inverse);
        }
        if ontology.is_symmetric(name) {
            inverses.push(name.to_string());
        } else {
            symmetric = false;
        }
        queried.push(name.to_string());
    }

    let expand = |names: &[String]| -> BTreeSet<String> {
        names
            .iter()
            .filter_map(|name| ontology.descendants(name))
            .flatten()
            .filter(|d| ontology.is_canonical(d) || ontology.is_symmetric(d))
            .map(|d| curie(&d))
            .filter(|c| config.predicate_in_graph(c))
            .collect()
    };

    let forward = expand(&queried);
    let inverse = if invert { expand(&inverses) } else { BTreeSet::new() };

    if forward.is_empty() && inverse.is_empty() {
        return Err(TranspileError::NoPossibleResults(format!(
            "no predicate in the graph matches {}",
            predicates.join(", ")
        )));
    }

    let orientation = if symmetric {
        Orientation::Symmetric
    } else {
        match (forward.is_empty(), inverse.is_empty()) {
            (false, false) => Orientation::Mixed,
            (true, false) => Orientation::Inverted,
            _ => Orientation::Forward,
        }
    };

    tracing::debug!(
        predicates = ?predicates,
        forward = ?forward,
        inverse = ?inverse,
        orientation = ?orientation,
        "resolved edge predicates"
    );

    Ok(ResolvedPredicates {
        forward,
        inverse,
        orientation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use qgraph_ontology::BiolinkOntology;

    fn resolve(predicates: &[&str]) -> Result<ResolvedPredicates> {
        let preds: Vec<String> = predicates.iter().map(|p| p.to_string()).collect();
        resolve_predicates(&preds, true, &BiolinkOntology::bundled(), &CompilerConfig::default())
    }

    #[test]
    fn universal_predicate_means_any_relation() -> anyhow::Result<()> {
        let resolved = resolve(&["biolink:treats", "biolink:related_to"])?;
        assert_eq!(resolved.orientation, Orientation::Any);
        assert!(resolved.types().is_empty());
        assert_eq!(resolve(&[])?.orientation, Orientation::Any);
        Ok(())
    }

    #[test]
    fn canonical_predicate_is_forward() -> anyhow::Result<()> {
        let resolved = resolve(&["biolink:has_phenotype"])?;
        assert_eq!(resolved.orientation, Orientation::Forward);
        assert_eq!(resolved.types(), vec!["biolink:has_phenotype".to_string()]);
        Ok(())
    }

    #[test]
    fn non_canonical_predicate_is_inverted() -> anyhow::Result<()> {
        let resolved = resolve(&["biolink:phenotype_of"])?;
        assert_eq!(resolved.orientation, Orientation::Inverted);
        assert!(resolved.is_inverted());
        assert_eq!(resolved.types(), vec!["biolink:has_phenotype".to_string()]);
        Ok(())
    }

    #[test]
    fn symmetric_predicate_is_undirected() -> anyhow::Result<()> {
        let resolved = resolve(&["biolink:correlated_with"])?;
        assert_eq!(resolved.orientation, Orientation::Symmetric);
        assert!(!resolved.is_directed());
        assert!(resolved.types().contains(&"biolink:positively_correlated_with".to_string()));
        assert!(resolved.direction_filter("e", "a", "b").is_none());
        Ok(())
    }

    #[test]
    fn forward_and_inverse_mix_needs_direction_filter() -> anyhow::Result<()> {
        let resolved = resolve(&["biolink:treats", "biolink:has_phenotype", "biolink:phenotype_of"])?;
        assert_eq!(resolved.orientation, Orientation::Mixed);
        let filter = resolved
            .direction_filter("e", "n0", "n1")
            .ok_or_else(|| anyhow::anyhow!("mixed edge needs a filter"))?
            .to_string();
        assert!(filter.contains("startNode(`e`) = `n0`"));
        assert!(filter.contains("startNode(`e`) = `n1`"));
        Ok(())
    }

    #[test]
    fn invert_false_drops_inverse_set() -> anyhow::Result<()> {
        let preds = vec!["biolink:subclass_of".to_string()];
        let resolved =
            resolve_predicates(&preds, false, &BiolinkOntology::bundled(), &CompilerConfig::default())?;
        assert!(resolved.inverse.is_empty());
        assert_eq!(resolved.orientation, Orientation::Forward);
        Ok(())
    }

    #[test]
    fn unknown_predicate_is_rejected() {
        let err = resolve(&["biolink:not_a_predicate"]).unwrap_err();
        assert_eq!(err, TranspileError::InvalidPredicate("biolink:not_a_predicate".into()));
    }

    #[test]
    fn allow_list_can_leave_nothing() {
        let config = CompilerConfig::default().with_predicates_in_graph(["biolink:treats"]);
        let preds = vec!["biolink:has_phenotype".to_string()];
        let err = resolve_predicates(&preds, true, &BiolinkOntology::bundled(), &config).unwrap_err();
        assert!(err.is_no_results());
    }

    #[test]
    fn allow_list_restricts_descendants() -> anyhow::Result<()> {
        let config = CompilerConfig::default()
            .with_predicates_in_graph(["biolink:treats", "biolink:ameliorates_condition"]);
        let preds = vec!["biolink:treats_or_applied_or_studied_to_treat".to_string()];
        let resolved = resolve_predicates(&preds, true, &BiolinkOntology::bundled(), &config)?;
        assert_eq!(
            resolved.types(),
            vec!["biolink:ameliorates_condition".to_string(), "biolink:treats".to_string()]
        );
        Ok(())
    }
}
