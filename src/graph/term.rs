//! Vocabulary entry types
//!
//! Terms, principles, and rules share one representation; the kind tag
//! distinguishes them and decides which data file they live in.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::GraphError;

/// Prefix reserved for metadata entries that are never vocabulary.
pub const RESERVED_PREFIX: &str = "@_";

/// A stable `@`-prefixed identifier for a vocabulary entry.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TermId(String);

impl TermId {
    /// Parse an identifier, requiring the `@` prefix and a non-empty name.
    pub fn new(raw: impl Into<String>) -> Result<Self, GraphError> {
        let raw = raw.into();
        if raw.len() < 2 || !raw.starts_with('@') {
            return Err(GraphError::InvalidIdentifier(raw));
        }
        Ok(TermId(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is a reserved metadata key (`@_` prefix) rather than
    /// a citable vocabulary identifier.
    pub fn is_reserved(&self) -> bool {
        self.0.starts_with(RESERVED_PREFIX)
    }
}

impl fmt::Display for TermId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The specialization of a vocabulary entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TermKind {
    /// A named concept of the shared ontology.
    Term,
    /// A value the community holds.
    Principle,
    /// A procedure the community follows.
    Rule,
}

impl TermKind {
    /// The data file this kind is persisted in.
    pub fn file_name(&self) -> &'static str {
        match self {
            TermKind::Term => "terms.json",
            TermKind::Principle => "principles.json",
            TermKind::Rule => "rules.json",
        }
    }
}

/// Which scope an entry was authored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// The shared, collectively owned vocabulary.
    Main,
    /// A participant's private overlay.
    Fork,
}

/// A single vocabulary entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Term {
    /// Unique identifier within the origin scope.
    pub id: TermId,
    /// Term, principle, or rule.
    pub kind: TermKind,
    /// Definition text.
    pub definition: String,
    /// Identifiers this entry aligns with, in citation order.
    pub aligns_with: Vec<TermId>,
    /// A locked entry is only mutable through a proposal that cites its
    /// unlock rule; with no such rule it is immutable.
    pub locked: bool,
    /// Scope the entry was authored in.
    pub origin: Origin,
    /// Bumped every time an amendment is merged.
    pub revision: u32,
}

impl Term {
    /// Create a fresh, unlocked entry at revision zero.
    pub fn new(id: TermId, kind: TermKind, definition: impl Into<String>, origin: Origin) -> Self {
        Term {
            id,
            kind,
            definition: definition.into(),
            aligns_with: Vec::new(),
            locked: false,
            origin,
            revision: 0,
        }
    }

    pub fn with_aligns(mut self, aligns_with: Vec<TermId>) -> Self {
        self.aligns_with = aligns_with;
        self
    }

    pub fn with_locked(mut self, locked: bool) -> Self {
        self.locked = locked;
        self
    }
}
