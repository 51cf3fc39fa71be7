//! Proposal lifecycle state machine
//!
//! Drafted → Thesis → Antithesis → Synthesis → Voting → terminal.
//! Validation gates entry into Thesis and re-runs after every synthesis
//! edit; terminal states are absorbing; nothing skips Thesis and no vote
//! is recorded outside Voting.

use serde::{Deserialize, Serialize};

use super::proposal::{Proposal, ProposalPayload, Vote};
use super::tally::TallyOutcome;
use super::{validator, GovernanceError, GovernanceResult};
use crate::graph::TermGraph;

/// Why a proposal ended in the rejected state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    /// The payload cited an identifier outside the main vocabulary.
    InvalidReference,
    /// The payload targeted a locked entry without its unlock rule.
    LockedViolation,
    /// The vote tally decided against the proposal.
    FailedVote,
}

/// Lifecycle state of a proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum ProposalState {
    /// Payload constructed, not yet validated.
    Drafted,
    /// Validation passed; open for debate.
    Thesis,
    /// A participant has raised a concern; re-entrant.
    Antithesis,
    /// The author has posted a revised payload.
    Synthesis,
    /// Open for votes; leaves only through explicit evaluation.
    Voting,
    Approved,
    Rejected { reason: RejectionReason },
    Expired,
    Withdrawn,
}

impl ProposalState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProposalState::Approved
                | ProposalState::Rejected { .. }
                | ProposalState::Expired
                | ProposalState::Withdrawn
        )
    }
}

impl Proposal {
    /// Submit the draft for debate. Validation failure is terminal: the
    /// proposal moves to rejected and the cause is returned.
    pub fn submit(&mut self, graph: &TermGraph) -> GovernanceResult<()> {
        if self.state != ProposalState::Drafted {
            return Err(GovernanceError::InvalidTransition {
                from: self.state,
                action: "submit",
            });
        }
        self.validate_payload(graph)?;
        self.state = ProposalState::Thesis;
        Ok(())
    }

    /// Record a concern raised against the current payload. Allowed from
    /// thesis, from synthesis (a new round), and while already in
    /// antithesis.
    pub fn raise_antithesis(&mut self) -> GovernanceResult<()> {
        match self.state {
            ProposalState::Thesis | ProposalState::Synthesis | ProposalState::Antithesis => {
                self.state = ProposalState::Antithesis;
                Ok(())
            }
            from => Err(GovernanceError::InvalidTransition {
                from,
                action: "raise antithesis",
            }),
        }
    }

    /// Post a revision addressing the raised concerns. The revision
    /// counter always advances, so earlier votes go stale; when a new
    /// payload is supplied it replaces the current one, and the result
    /// is re-validated either way. Validation failure is terminal.
    pub fn post_synthesis(
        &mut self,
        payload: Option<ProposalPayload>,
        graph: &TermGraph,
    ) -> GovernanceResult<()> {
        if self.state != ProposalState::Antithesis {
            return Err(GovernanceError::InvalidTransition {
                from: self.state,
                action: "post synthesis",
            });
        }
        if let Some(payload) = payload {
            self.payload = payload;
        }
        self.revision += 1;
        self.validate_payload(graph)?;
        self.state = ProposalState::Synthesis;
        Ok(())
    }

    /// Open the proposal for votes. Reached from thesis (no concerns
    /// raised) or from a synthesis that settled the debate.
    pub fn open_voting(&mut self, now: u64) -> GovernanceResult<()> {
        match self.state {
            ProposalState::Thesis | ProposalState::Synthesis => {
                self.state = ProposalState::Voting;
                self.voting_opened_at = Some(now);
                Ok(())
            }
            from => Err(GovernanceError::InvalidTransition {
                from,
                action: "open voting",
            }),
        }
    }

    /// Append a vote to the history. Votes only count while voting is
    /// open; deduplication happens at tally time.
    pub fn record_vote(&mut self, vote: Vote) -> GovernanceResult<()> {
        if self.state != ProposalState::Voting {
            return Err(GovernanceError::InvalidVote(format!(
                "proposal {} is not open for voting",
                self.id
            )));
        }
        if vote.proposal_id != self.id {
            return Err(GovernanceError::InvalidVote(format!(
                "vote targets {}, not {}",
                vote.proposal_id, self.id
            )));
        }
        self.votes.push(vote);
        Ok(())
    }

    /// The author cancels; allowed from any non-terminal state.
    pub fn withdraw(&mut self) -> GovernanceResult<()> {
        if self.state.is_terminal() {
            return Err(GovernanceError::InvalidTransition {
                from: self.state,
                action: "withdraw",
            });
        }
        self.state = ProposalState::Withdrawn;
        Ok(())
    }

    /// Settle the proposal from an explicit tally evaluation. A pending
    /// outcome leaves the proposal in voting.
    pub fn finalize(&mut self, outcome: TallyOutcome) -> GovernanceResult<()> {
        if self.state != ProposalState::Voting {
            return Err(GovernanceError::InvalidTransition {
                from: self.state,
                action: "finalize",
            });
        }
        self.state = match outcome {
            TallyOutcome::Approved => ProposalState::Approved,
            TallyOutcome::Rejected => ProposalState::Rejected {
                reason: RejectionReason::FailedVote,
            },
            TallyOutcome::Expired => ProposalState::Expired,
            TallyOutcome::Pending => return Ok(()),
        };
        Ok(())
    }

    /// Run reference validation, recording the snapshot version on
    /// success and moving to terminal rejection on failure.
    fn validate_payload(&mut self, graph: &TermGraph) -> GovernanceResult<()> {
        match validator::validate(self, graph) {
            Ok(()) => {
                self.validated_against = Some(graph.main_version());
                Ok(())
            }
            Err(err) => {
                let reason = match &err {
                    GovernanceError::LockedViolation { .. } => RejectionReason::LockedViolation,
                    _ => RejectionReason::InvalidReference,
                };
                self.state = ProposalState::Rejected { reason };
                Err(err)
            }
        }
    }
}
