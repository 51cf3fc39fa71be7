//! Deterministic vote tallying
//!
//! `evaluate` is a pure function of the public vote history and the
//! shared governance configuration. Every node runs it independently
//! against the same history and must reach the same outcome, so there is
//! no hidden state and the clock is injected by the caller.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::proposal::{Proposal, Vote, VoteChoice};
use crate::config::GovernanceConfig;

/// What an evaluation decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TallyOutcome {
    Approved,
    Rejected,
    /// The voting window elapsed without reaching quorum.
    Expired,
    /// Quorum not yet met and the window is still open.
    Pending,
}

/// Result of a tally evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TallyResult {
    pub outcome: TallyOutcome,
    pub approve_votes: usize,
    pub reject_votes: usize,
    /// Distinct voters counted after deduplication.
    pub counted_votes: usize,
    pub has_quorum: bool,
    /// Approve fraction of counted votes; 0 when none counted.
    pub approval_ratio: f64,
}

/// Evaluate a proposal's vote history.
///
/// Only votes bound to the proposal's current revision count; a voter's
/// later vote supersedes their earlier one. Once quorum is reached the
/// outcome is decided immediately — approval requires the approve
/// fraction to be strictly greater than the threshold. Quorum reached
/// exactly as the window closes still decides; expiry applies only while
/// quorum is short.
pub fn evaluate(
    proposal: &Proposal,
    votes: &[Vote],
    config: &GovernanceConfig,
    now: u64,
) -> TallyResult {
    // History is thread-ordered, so a plain overwrite keeps the latest
    // vote per voter.
    let mut counted: BTreeMap<&str, &Vote> = BTreeMap::new();
    for vote in votes {
        if vote.proposal_id != proposal.id || vote.revision != proposal.revision {
            continue;
        }
        counted.insert(vote.voter.as_str(), vote);
    }

    let approve_votes = counted
        .values()
        .filter(|v| v.choice == VoteChoice::Approve)
        .count();
    let counted_votes = counted.len();
    let reject_votes = counted_votes - approve_votes;

    let approval_ratio = if counted_votes > 0 {
        approve_votes as f64 / counted_votes as f64
    } else {
        0.0
    };

    let has_quorum = counted_votes >= config.quorum as usize;

    let outcome = if has_quorum {
        if approval_ratio > config.approval_threshold {
            TallyOutcome::Approved
        } else {
            TallyOutcome::Rejected
        }
    } else {
        let opened = proposal.voting_opened_at.unwrap_or(proposal.created_at);
        if now >= opened + config.voting_window_secs {
            TallyOutcome::Expired
        } else {
            TallyOutcome::Pending
        }
    };

    TallyResult {
        outcome,
        approve_votes,
        reject_votes,
        counted_votes,
        has_quorum,
        approval_ratio,
    }
}
