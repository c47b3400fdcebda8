//! Ontology lookups consumed by the qgraph compiler.
//!
//! The compiler never walks an ontology itself. It asks a small set of
//! questions about predicates and qualifier values:
//!
//! - what are the descendants of a predicate (reflexive)?
//! - what is its inverse, and is it symmetric / canonical?
//! - is a property name a qualifier, and is a value a permissible enum value?
//!
//! Those questions form the [`Ontology`] trait. [`BiolinkOntology`] is an
//! in-memory implementation loaded from a JSON document; a Biolink subset is
//! bundled for embedding callers and tests.
//!
//! All names crossing this interface are *local* names (`treats`, not
//! `biolink:treats`). Use [`local_name`] / [`curie`] at the boundary.

pub mod biolink;

pub use biolink::{BiolinkOntology, EnumValueDecl, OntologyDocument, PredicateDecl};

use std::collections::BTreeSet;

/// Prefix used for every Biolink model element in query graphs and results.
pub const BIOLINK_PREFIX: &str = "biolink:";

/// Strip the `biolink:` prefix (if present).
pub fn local_name(name: &str) -> &str {
    name.strip_prefix(BIOLINK_PREFIX).unwrap_or(name)
}

/// Re-attach the `biolink:` prefix to a local name.
pub fn curie(local: &str) -> String {
    format!("{BIOLINK_PREFIX}{}", local_name(local))
}

/// Lookup contract for predicates, qualifiers and qualifier-value enums.
///
/// Implementations are pure: the same question always gets the same answer,
/// and nothing is mutated.
pub trait Ontology {
    /// Whether `predicate` is a known predicate.
    fn is_predicate(&self, predicate: &str) -> bool;

    /// Reflexive descendants of a predicate, or `None` if it is unknown.
    fn descendants(&self, predicate: &str) -> Option<BTreeSet<String>>;

    /// Declared inverse of a predicate.
    fn inverse_of(&self, predicate: &str) -> Option<String>;

    fn is_symmetric(&self, predicate: &str) -> bool;

    /// Whether a predicate is the designated "forward" direction of its relation.
    fn is_canonical(&self, predicate: &str) -> bool;

    fn is_qualifier(&self, name: &str) -> bool;

    /// Whether `value` is a permissible value of at least one enum.
    fn is_permissible_value(&self, value: &str) -> bool;

    /// Reflexive descendants of `value`, unioned across every enum that
    /// declares it. Empty when `value` is not permissible anywhere.
    fn enum_descendants_of(&self, value: &str) -> BTreeSet<String>;

    /// URI describing a slot, used to type attributes (`publications` →
    /// `biolink:publications`).
    fn slot_uri(&self, _name: &str) -> Option<String> {
        None
    }
}

impl<T: Ontology + ?Sized> Ontology for &T {
    fn is_predicate(&self, predicate: &str) -> bool {
        (**self).is_predicate(predicate)
    }
    fn descendants(&self, predicate: &str) -> Option<BTreeSet<String>> {
        (**self).descendants(predicate)
    }
    fn inverse_of(&self, predicate: &str) -> Option<String> {
        (**self).inverse_of(predicate)
    }
    fn is_symmetric(&self, predicate: &str) -> bool {
        (**self).is_symmetric(predicate)
    }
    fn is_canonical(&self, predicate: &str) -> bool {
        (**self).is_canonical(predicate)
    }
    fn is_qualifier(&self, name: &str) -> bool {
        (**self).is_qualifier(name)
    }
    fn is_permissible_value(&self, value: &str) -> bool {
        (**self).is_permissible_value(value)
    }
    fn enum_descendants_of(&self, value: &str) -> BTreeSet<String> {
        (**self).enum_descendants_of(value)
    }
    fn slot_uri(&self, name: &str) -> Option<String> {
        (**self).slot_uri(name)
    }
}

/// Errors raised while loading an ontology document.
#[derive(Debug, thiserror::Error)]
pub enum OntologyError {
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("{kind} `{name}` references unknown {target_kind} `{target}`")]
    DanglingReference {
        kind: &'static str,
        name: String,
        target_kind: &'static str,
        target: String,
    },

    #[error("is_a cycle through `{0}`")]
    Cycle(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_name_and_curie_are_inverse() {
        assert_eq!(local_name("biolink:treats"), "treats");
        assert_eq!(local_name("treats"), "treats");
        assert_eq!(curie("treats"), "biolink:treats");
        assert_eq!(curie("biolink:treats"), "biolink:treats");
    }
}
