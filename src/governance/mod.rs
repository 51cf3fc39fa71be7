//! Governance core
//!
//! Proposal data model, the dialectic lifecycle state machine, reference
//! validation against the shared vocabulary, deterministic vote tallying,
//! and the fork-to-main merge. Everything here is pure and synchronous:
//! two nodes replaying the same public history must land in identical
//! states and outcomes.

pub mod dialectic;
pub mod lifecycle;
pub mod merge;
pub mod proposal;
pub mod tally;
pub mod validator;

use thiserror::Error;

use crate::graph::{GraphError, TermId};

pub use lifecycle::{ProposalState, RejectionReason};
pub use proposal::{Proposal, ProposalKind, ProposalPayload, Vote, VoteChoice};
pub use tally::{TallyOutcome, TallyResult};

/// Error types for governance operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GovernanceError {
    /// The payload cites an identifier that does not resolve in main
    #[error("invalid reference: {id} does not resolve in the main vocabulary")]
    InvalidReference { id: TermId },

    /// A locked entry was targeted without citing its unlock rule
    #[error("locked entry {id} cannot be amended without citing its unlock rule")]
    LockedViolation { id: TermId },

    /// The proposal document is missing or has an undecodable data block
    #[error("malformed proposal: {0}")]
    MalformedProposal(String),

    /// The requested lifecycle transition is not legal from this state
    #[error("cannot {action} a proposal in state {from:?}")]
    InvalidTransition {
        from: ProposalState,
        action: &'static str,
    },

    /// The vote cannot be recorded
    #[error("invalid vote: {0}")]
    InvalidVote(String),

    /// Main has advanced past the revision the proposal was validated
    /// against; the caller must re-validate against the newer snapshot
    #[error("conflicting revision: validated against {validated}, main is at {current}")]
    ConflictingRevision { validated: u64, current: u64 },

    /// Graph-level failure surfaced through a governance operation
    #[error(transparent)]
    Graph(#[from] GraphError),
}

pub type GovernanceResult<T> = Result<T, GovernanceError>;
