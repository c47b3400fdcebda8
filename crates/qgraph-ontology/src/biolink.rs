//! In-memory Biolink-style ontology.
//!
//! The document format is deliberately small: a predicate `is_a` tree with
//! symmetric / canonical / inverse flags, the list of qualifier slots, a set of
//! enums whose permissible values form their own `is_a` trees, and a slot → URI
//! table used to type attributes.
//!
//! ```json
//! {
//!   "predicates": {
//!     "related_to": { "symmetric": true },
//!     "treats": { "is_a": "related_to", "canonical": true, "inverse": "treated_by" },
//!     "treated_by": { "is_a": "related_to" }
//!   },
//!   "qualifiers": ["object_aspect_qualifier"],
//!   "enums": { "AspectEnum": { "activity": {}, "abundance": {} } },
//!   "slots": { "publications": "biolink:publications" }
//! }
//! ```

use ahash::{AHashMap, AHashSet};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::{local_name, Ontology, OntologyError};

const BUNDLED_SUBSET: &str = include_str!("biolink_subset.json");

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredicateDecl {
    #[serde(default)]
    pub is_a: Option<String>,
    #[serde(default)]
    pub symmetric: bool,
    #[serde(default)]
    pub canonical: bool,
    #[serde(default)]
    pub inverse: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumValueDecl {
    #[serde(default)]
    pub is_a: Option<String>,
}

/// Serialized form of a [`BiolinkOntology`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OntologyDocument {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub predicates: BTreeMap<String, PredicateDecl>,
    #[serde(default)]
    pub qualifiers: Vec<String>,
    #[serde(default)]
    pub enums: BTreeMap<String, BTreeMap<String, EnumValueDecl>>,
    #[serde(default)]
    pub slots: BTreeMap<String, String>,
}

/// `is_a` forest with a child index, shared by predicates and each enum.
#[derive(Debug, Clone, Default)]
struct Hierarchy {
    children: AHashMap<String, Vec<String>>,
}

impl Hierarchy {
    fn build<'a>(
        kind: &'static str,
        entries: impl Iterator<Item = (&'a String, Option<&'a String>)> + Clone,
    ) -> Result<Self, OntologyError> {
        let known: AHashSet<&str> = entries.clone().map(|(name, _)| name.as_str()).collect();
        let parents: AHashMap<&str, &str> = entries
            .clone()
            .filter_map(|(name, parent)| parent.map(|p| (name.as_str(), p.as_str())))
            .collect();

        let mut children: AHashMap<String, Vec<String>> = AHashMap::new();
        for (name, parent) in entries {
            let Some(parent) = parent else { continue };
            if !known.contains(parent.as_str()) {
                return Err(OntologyError::DanglingReference {
                    kind,
                    name: name.clone(),
                    target_kind: "parent",
                    target: parent.clone(),
                });
            }
            children
                .entry(parent.clone())
                .or_default()
                .push(name.clone());
        }

        // Any chain longer than the number of entries must revisit a node.
        for start in &known {
            let mut cursor = *start;
            let mut steps = 0usize;
            while let Some(next) = parents.get(cursor) {
                steps += 1;
                if steps > known.len() {
                    return Err(OntologyError::Cycle(start.to_string()));
                }
                cursor = next;
            }
        }

        Ok(Self { children })
    }

    fn descendants(&self, root: &str) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        let mut stack = vec![root.to_string()];
        while let Some(name) = stack.pop() {
            if !out.insert(name.clone()) {
                continue;
            }
            if let Some(kids) = self.children.get(&name) {
                stack.extend(kids.iter().cloned());
            }
        }
        out
    }
}

/// An ontology held entirely in memory.
#[derive(Debug, Clone)]
pub struct BiolinkOntology {
    version: Option<String>,
    predicates: AHashMap<String, PredicateDecl>,
    predicate_tree: Hierarchy,
    qualifiers: AHashSet<String>,
    /// enum name → (declared values, value tree)
    enums: BTreeMap<String, (AHashSet<String>, Hierarchy)>,
    slots: AHashMap<String, String>,
}

impl BiolinkOntology {
    /// The Biolink subset shipped with this crate.
    pub fn bundled() -> Self {
        Self::from_json_str_or_empty(BUNDLED_SUBSET)
    }

    /// Parse `text`, logging and falling back to an empty ontology on error.
    pub fn from_json_str_or_empty(text: &str) -> Self {
        match Self::from_json_str(text) {
            Ok(ontology) => ontology,
            Err(error) => {
                tracing::warn!(%error, "ontology failed to load; using an empty ontology");
                Self::empty()
            }
        }
    }

    pub fn empty() -> Self {
        Self {
            version: None,
            predicates: AHashMap::new(),
            predicate_tree: Hierarchy::default(),
            qualifiers: AHashSet::new(),
            enums: BTreeMap::new(),
            slots: AHashMap::new(),
        }
    }

    pub fn from_json_str(text: &str) -> Result<Self, OntologyError> {
        let doc: OntologyDocument = serde_json::from_str(text)?;
        Self::from_document(doc)
    }

    pub fn from_document(doc: OntologyDocument) -> Result<Self, OntologyError> {
        let predicate_tree = Hierarchy::build(
            "predicate",
            doc.predicates
                .iter()
                .map(|(name, decl)| (name, decl.is_a.as_ref())),
        )?;

        let mut predicates: AHashMap<String, PredicateDecl> = doc.predicates.into_iter().collect();

        // Inverses are declared once; make them bidirectional.
        let declared: Vec<(String, String)> = predicates
            .iter()
            .filter_map(|(name, decl)| decl.inverse.clone().map(|inv| (name.clone(), inv)))
            .collect();
        for (name, inverse) in declared {
            let Some(target) = predicates.get_mut(&inverse) else {
                return Err(OntologyError::DanglingReference {
                    kind: "predicate",
                    name,
                    target_kind: "inverse",
                    target: inverse,
                });
            };
            if target.inverse.is_none() {
                target.inverse = Some(name);
            }
        }

        let mut enums = BTreeMap::new();
        for (enum_name, values) in &doc.enums {
            let tree = Hierarchy::build(
                "enum value",
                values.iter().map(|(name, decl)| (name, decl.is_a.as_ref())),
            )?;
            let members: AHashSet<String> = values.keys().cloned().collect();
            enums.insert(enum_name.clone(), (members, tree));
        }

        Ok(Self {
            version: doc.version,
            predicates,
            predicate_tree,
            qualifiers: doc.qualifiers.into_iter().collect(),
            enums,
            slots: doc.slots.into_iter().collect(),
        })
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn predicate_count(&self) -> usize {
        self.predicates.len()
    }

    fn decl(&self, predicate: &str) -> Option<&PredicateDecl> {
        self.predicates.get(local_name(predicate))
    }
}

impl Default for BiolinkOntology {
    fn default() -> Self {
        Self::bundled()
    }
}

impl Ontology for BiolinkOntology {
    fn is_predicate(&self, predicate: &str) -> bool {
        self.decl(predicate).is_some()
    }

    fn descendants(&self, predicate: &str) -> Option<BTreeSet<String>> {
        let name = local_name(predicate);
        self.predicates
            .contains_key(name)
            .then(|| self.predicate_tree.descendants(name))
    }

    fn inverse_of(&self, predicate: &str) -> Option<String> {
        self.decl(predicate).and_then(|d| d.inverse.clone())
    }

    fn is_symmetric(&self, predicate: &str) -> bool {
        self.decl(predicate).is_some_and(|d| d.symmetric)
    }

    fn is_canonical(&self, predicate: &str) -> bool {
        self.decl(predicate).is_some_and(|d| d.canonical)
    }

    fn is_qualifier(&self, name: &str) -> bool {
        self.qualifiers.contains(local_name(name))
    }

    fn is_permissible_value(&self, value: &str) -> bool {
        self.enums.values().any(|(members, _)| members.contains(value))
    }

    fn enum_descendants_of(&self, value: &str) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        for (members, tree) in self.enums.values() {
            if members.contains(value) {
                out.extend(tree.descendants(value));
            }
        }
        out
    }

    fn slot_uri(&self, name: &str) -> Option<String> {
        self.slots.get(local_name(name)).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_subset_loads() {
        let doc: OntologyDocument =
            serde_json::from_str(BUNDLED_SUBSET).expect("bundled subset is valid JSON");
        let onto = BiolinkOntology::from_document(doc).expect("bundled subset is consistent");
        assert!(onto.predicate_count() > 40);
        assert_eq!(onto.version(), Some("4.2.1-subset"));
    }

    #[test]
    fn bundled_is_never_the_empty_fallback() {
        assert!(BiolinkOntology::bundled().predicate_count() > 40);
    }

    #[test]
    fn malformed_document_falls_back_to_empty() {
        let onto = BiolinkOntology::from_json_str_or_empty(
            r#"{"predicates": {"a": {"is_a": "b"}, "b": {"is_a": "a"}}}"#,
        );
        assert_eq!(onto.predicate_count(), 0);
        assert!(onto.version().is_none());

        let onto = BiolinkOntology::from_json_str_or_empty("not json");
        assert_eq!(onto.predicate_count(), 0);
    }

    #[test]
    fn inverse_is_made_bidirectional() {
        let onto = BiolinkOntology::bundled();
        assert_eq!(onto.inverse_of("treats").as_deref(), Some("treated_by"));
        assert_eq!(onto.inverse_of("biolink:treated_by").as_deref(), Some("treats"));
    }

    #[test]
    fn dangling_parent_is_rejected() {
        let err = BiolinkOntology::from_json_str(
            r#"{"predicates": {"treats": {"is_a": "missing"}}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, OntologyError::DanglingReference { .. }));
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn dangling_inverse_is_rejected() {
        let err = BiolinkOntology::from_json_str(
            r#"{"predicates": {"treats": {"inverse": "treated_by"}}}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("treated_by"));
    }

    #[test]
    fn cycles_are_rejected() {
        let err = BiolinkOntology::from_json_str(
            r#"{"predicates": {"a": {"is_a": "b"}, "b": {"is_a": "a"}}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, OntologyError::Cycle(_)));
    }
}
