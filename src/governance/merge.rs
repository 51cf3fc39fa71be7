//! Fork-to-main merge
//!
//! Applies an approved proposal's payload onto the main snapshot,
//! producing a successor snapshot with the version bumped. A proposal
//! validated against an older snapshot is refused so the caller
//! re-validates instead of overwriting newer history. Fork data is
//! never read or written here.

use super::proposal::{Proposal, ProposalKind};
use super::{GovernanceError, GovernanceResult};
use crate::graph::{GraphSnapshot, TermKind};

/// Apply an approved proposal, returning the successor snapshot.
pub fn apply(main: &GraphSnapshot, proposal: &Proposal) -> GovernanceResult<GraphSnapshot> {
    if !matches!(proposal.state, super::ProposalState::Approved) {
        return Err(GovernanceError::InvalidTransition {
            from: proposal.state,
            action: "merge",
        });
    }

    match proposal.validated_against {
        Some(version) if version == main.version => {}
        validated => {
            return Err(GovernanceError::ConflictingRevision {
                validated: validated.unwrap_or(0),
                current: main.version,
            });
        }
    }

    let mut next = main.next();
    match proposal.kind {
        ProposalKind::NewTerm | ProposalKind::NewRule => {
            let kind = if proposal.kind == ProposalKind::NewRule {
                TermKind::Rule
            } else {
                proposal.payload.kind
            };
            next.terms.insert(proposal.payload.to_term(kind, 0, false))?;
        }
        ProposalKind::AmendTerm | ProposalKind::AmendRule => {
            let existing = next
                .terms
                .get(&proposal.payload.identifier)
                .cloned()
                .ok_or_else(|| GovernanceError::InvalidReference {
                    id: proposal.payload.identifier.clone(),
                })?;
            next.terms.replace(proposal.payload.to_term(
                existing.kind,
                existing.revision + 1,
                existing.locked,
            ));
        }
    }

    Ok(next)
}
