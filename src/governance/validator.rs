//! Reference validation
//!
//! A proposal's citations must all resolve in the main scope: fork-only
//! and unknown identifiers fail the whole proposal, never a partial
//! acceptance. Amendments to locked entries must cite the unlock rule
//! for the target. Pure and deterministic; no I/O.

use super::proposal::Proposal;
use super::{GovernanceError, GovernanceResult};
use crate::graph::{Scope, TermGraph, TermId, TermKind};

/// Validate a proposal's payload against the main vocabulary.
pub fn validate(proposal: &Proposal, graph: &TermGraph) -> GovernanceResult<()> {
    for cited in &proposal.payload.aligns_with {
        if !graph.exists(cited, Scope::Main) {
            return Err(GovernanceError::InvalidReference { id: cited.clone() });
        }
    }

    if proposal.kind.is_amendment() {
        let target = &proposal.payload.identifier;
        let existing = graph
            .resolve(target, Scope::Main)
            .map_err(|_| GovernanceError::InvalidReference { id: target.clone() })?;
        if existing.locked && !cites_unlock_rule(proposal, graph, target) {
            return Err(GovernanceError::LockedViolation { id: target.clone() });
        }
    }

    Ok(())
}

/// Whether the proposal cites a main-scope rule that unlocks the target:
/// a rule whose own citations include the locked identifier.
fn cites_unlock_rule(proposal: &Proposal, graph: &TermGraph, target: &TermId) -> bool {
    proposal.payload.aligns_with.iter().any(|cited| {
        graph
            .resolve(cited, Scope::Main)
            .map(|entry| entry.kind == TermKind::Rule && entry.aligns_with.contains(target))
            .unwrap_or(false)
    })
}
