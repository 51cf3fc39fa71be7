//! Scoped vocabulary graph
//!
//! The graph keeps the shared main snapshot and the participant's private
//! fork overlay as two distinct scopes. They are never merged in memory;
//! the only path from fork to main is an approved proposal applied through
//! the merge module, which produces a new versioned snapshot.

pub mod term;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use term::{Origin, Term, TermId, TermKind, RESERVED_PREFIX};

/// Error types for graph operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// The identifier does not resolve in the requested scope
    #[error("identifier {0} not found in {1:?} scope")]
    NotFound(TermId, Scope),

    /// The scope already holds an entry with this identifier
    #[error("duplicate identifier {0}")]
    DuplicateIdentifier(TermId),

    /// The raw string is not a valid `@`-prefixed identifier
    #[error("invalid identifier: {0:?}")]
    InvalidIdentifier(String),
}

/// Lookup scope for graph queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Main,
    Fork,
    /// Fork overlay first, then main.
    Any,
}

/// An ordered set of vocabulary entries keyed by identifier.
///
/// Ordering is part of the contract: every node must iterate entries in
/// the same order to produce identical summaries and serializations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TermSet {
    entries: BTreeMap<TermId, Term>,
}

impl TermSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry, rejecting duplicates and preserving the existing
    /// entry on rejection.
    pub fn insert(&mut self, term: Term) -> Result<(), GraphError> {
        if self.entries.contains_key(&term.id) {
            return Err(GraphError::DuplicateIdentifier(term.id));
        }
        self.entries.insert(term.id.clone(), term);
        Ok(())
    }

    /// Replace an existing entry; the amended path of a merge.
    pub fn replace(&mut self, term: Term) -> Option<Term> {
        self.entries.insert(term.id.clone(), term)
    }

    pub fn get(&self, id: &TermId) -> Option<&Term> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &TermId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Term> {
        self.entries.values()
    }

    pub fn identifiers(&self) -> impl Iterator<Item = &TermId> {
        self.entries.keys()
    }
}

/// An immutable, versioned bundle of the main vocabulary at a point in
/// time. Merges produce a successor snapshot instead of mutating in place,
/// so history stays reconstructible.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphSnapshot {
    /// Monotonically increasing snapshot version.
    pub version: u64,
    /// The entries in this snapshot.
    pub terms: TermSet,
}

impl GraphSnapshot {
    pub fn new(version: u64) -> Self {
        GraphSnapshot {
            version,
            terms: TermSet::new(),
        }
    }

    /// Start the successor snapshot with the version bumped and entries
    /// carried over for amendment.
    pub fn next(&self) -> Self {
        GraphSnapshot {
            version: self.version + 1,
            terms: self.terms.clone(),
        }
    }
}

/// The scoped vocabulary graph one node operates on: the shared main
/// snapshot plus this participant's fork overlay.
#[derive(Debug, Clone)]
pub struct TermGraph {
    main: GraphSnapshot,
    fork: TermSet,
}

impl TermGraph {
    pub fn new(main: GraphSnapshot, fork: TermSet) -> Self {
        TermGraph { main, fork }
    }

    pub fn main(&self) -> &GraphSnapshot {
        &self.main
    }

    pub fn fork(&self) -> &TermSet {
        &self.fork
    }

    /// The version of the main snapshot this graph was loaded from.
    pub fn main_version(&self) -> u64 {
        self.main.version
    }

    /// Resolve an identifier in the requested scope. `Any` consults the
    /// fork overlay before main, matching how a participant reads their
    /// own personalized vocabulary.
    pub fn resolve(&self, id: &TermId, scope: Scope) -> Result<&Term, GraphError> {
        let found = match scope {
            Scope::Main => self.main.terms.get(id),
            Scope::Fork => self.fork.get(id),
            Scope::Any => self.fork.get(id).or_else(|| self.main.terms.get(id)),
        };
        found.ok_or_else(|| GraphError::NotFound(id.clone(), scope))
    }

    pub fn exists(&self, id: &TermId, scope: Scope) -> bool {
        match scope {
            Scope::Main => self.main.terms.contains(id),
            Scope::Fork => self.fork.contains(id),
            Scope::Any => self.fork.contains(id) || self.main.terms.contains(id),
        }
    }

    /// All identifiers visible in a scope, in deterministic order.
    pub fn all_identifiers(&self, scope: Scope) -> Box<dyn Iterator<Item = &TermId> + '_> {
        match scope {
            Scope::Main => Box::new(self.main.terms.identifiers()),
            Scope::Fork => Box::new(self.fork.identifiers()),
            Scope::Any => Box::new(self.fork.identifiers().chain(self.main.terms.identifiers())),
        }
    }

    /// Fork entries that are not present in main: the participant's
    /// personal values, used to motivate but never to cite.
    pub fn fork_only(&self) -> impl Iterator<Item = &Term> {
        self.fork
            .iter()
            .filter(|t| !self.main.terms.contains(&t.id))
    }

    /// Swap in a newer main snapshot after a merge.
    pub fn set_main(&mut self, snapshot: GraphSnapshot) {
        self.main = snapshot;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> TermId {
        TermId::new(s).unwrap()
    }

    fn graph() -> TermGraph {
        let mut main = GraphSnapshot::new(1);
        main.terms
            .insert(Term::new(id("@harm"), TermKind::Term, "damage to wellbeing", Origin::Main))
            .unwrap();
        main.terms
            .insert(Term::new(
                id("@transparency"),
                TermKind::Principle,
                "decisions are publicly inspectable",
                Origin::Main,
            ))
            .unwrap();

        let mut fork = TermSet::new();
        fork.insert(Term::new(
            id("@my_personal_value"),
            TermKind::Principle,
            "animals deserve moral weight",
            Origin::Fork,
        ))
        .unwrap();

        TermGraph::new(main, fork)
    }

    #[test]
    fn scopes_are_distinct() {
        let g = graph();
        assert!(g.exists(&id("@harm"), Scope::Main));
        assert!(!g.exists(&id("@harm"), Scope::Fork));
        assert!(g.exists(&id("@my_personal_value"), Scope::Fork));
        assert!(!g.exists(&id("@my_personal_value"), Scope::Main));
        assert!(g.exists(&id("@my_personal_value"), Scope::Any));
    }

    #[test]
    fn resolve_signals_not_found() {
        let g = graph();
        let err = g.resolve(&id("@missing"), Scope::Any).unwrap_err();
        assert!(matches!(err, GraphError::NotFound(_, Scope::Any)));
    }

    #[test]
    fn duplicate_insert_preserves_existing() {
        let mut set = TermSet::new();
        set.insert(Term::new(id("@harm"), TermKind::Term, "original", Origin::Main))
            .unwrap();
        let err = set
            .insert(Term::new(id("@harm"), TermKind::Term, "usurper", Origin::Main))
            .unwrap_err();
        assert!(matches!(err, GraphError::DuplicateIdentifier(_)));
        assert_eq!(set.get(&id("@harm")).unwrap().definition, "original");
    }

    #[test]
    fn identifiers_iterate_in_stable_order() {
        let g = graph();
        let ids: Vec<&TermId> = g.all_identifiers(Scope::Main).collect();
        assert_eq!(ids, vec![&id("@harm"), &id("@transparency")]);
    }

    #[test]
    fn fork_only_excludes_shared_entries() {
        let g = graph();
        let only: Vec<&TermId> = g.fork_only().map(|t| &t.id).collect();
        assert_eq!(only, vec![&id("@my_personal_value")]);
    }
}
