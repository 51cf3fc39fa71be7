//! Dialectic history replay
//!
//! A proposal's authoritative state lives in its public discussion
//! thread: the body carries the thesis and payload, comments carry
//! antithesis rounds, synthesis revisions, and vote markers. Replaying
//! a thread through the lifecycle state machine is deterministic, so
//! every node derives the same proposal state and vote history from the
//! same thread.

use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use super::lifecycle::ProposalState;
use super::proposal::{Proposal, ProposalKind, ProposalPayload, Vote, VoteChoice};
use super::GovernanceResult;
use crate::graph::{Scope, TermGraph, TermKind};
use crate::platform::Discussion;

/// Marker opening a proposal thread.
pub const THESIS_MARKER: &str = "[THESIS]";
/// Marker flagging a concern comment.
pub const ANTITHESIS_MARKER: &str = "[ANTITHESIS]";
/// Marker flagging a revision comment.
pub const SYNTHESIS_MARKER: &str = "[SYNTHESIS]";
/// Marker by which the author cancels their own proposal.
pub const WITHDRAWN_MARKER: &str = "[WITHDRAWN]";

fn vote_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\*\*VOTE:\s*(APPROVE|REJECT)\*\*").expect("vote pattern"))
}

/// Extract the vote from a comment body, if any. The last marker in a
/// body wins, mirroring how a voter corrects themselves in one post.
pub fn vote_marker(body: &str) -> Option<VoteChoice> {
    vote_re()
        .captures_iter(body)
        .last()
        .map(|c| match &c[1] {
            "APPROVE" => VoteChoice::Approve,
            _ => VoteChoice::Reject,
        })
}

/// Whether a discussion thread is a proposal at all.
pub fn is_proposal(discussion: &Discussion) -> bool {
    discussion.body.contains(THESIS_MARKER)
}

/// Infer what the payload does to the main vocabulary: amend when the
/// target already exists there, otherwise introduce it.
pub fn infer_kind(payload: &ProposalPayload, graph: &TermGraph) -> ProposalKind {
    match graph.resolve(&payload.identifier, Scope::Main) {
        Ok(existing) if existing.kind == TermKind::Rule => ProposalKind::AmendRule,
        Ok(_) => ProposalKind::AmendTerm,
        Err(_) if payload.kind == TermKind::Rule => ProposalKind::NewRule,
        Err(_) => ProposalKind::NewTerm,
    }
}

/// Replay a proposal thread into a proposal.
///
/// The body is parsed and submitted (validation gates entry into
/// thesis), then each comment is applied in thread order. Comments that
/// are illegal from the current state are skipped rather than failing
/// the replay; a terminal state stops it. Returns a malformed-proposal
/// error when the body has no decodable payload.
pub fn replay_discussion(discussion: &Discussion, graph: &TermGraph) -> GovernanceResult<Proposal> {
    let payload = ProposalPayload::parse_document(&discussion.body)?;
    let kind = infer_kind(&payload, graph);

    let mut proposal = Proposal::new(
        format!("prop-{}", discussion.number),
        discussion.author.clone(),
        kind,
        payload,
        discussion.created_at,
    )
    .with_thread(discussion.id.clone());

    if proposal.submit(graph).is_err() {
        // Terminal rejection; the proposal record still exists.
        return Ok(proposal);
    }

    for comment in &discussion.comments {
        if proposal.state.is_terminal() {
            break;
        }

        if comment.body.contains(WITHDRAWN_MARKER) {
            if comment.author == proposal.author {
                let _ = proposal.withdraw();
            } else {
                debug!(
                    "ignoring withdrawal from {} on {} (not the author)",
                    comment.author, proposal.id
                );
            }
        } else if comment.body.contains(SYNTHESIS_MARKER) {
            if comment.author != proposal.author {
                debug!(
                    "ignoring synthesis from {} on {} (not the author)",
                    comment.author, proposal.id
                );
                continue;
            }
            let revised = ProposalPayload::parse_document(&comment.body).ok();
            if proposal.post_synthesis(revised, graph).is_err()
                && !proposal.state.is_terminal()
            {
                debug!("ignoring out-of-order synthesis on {}", proposal.id);
            }
        } else if comment.body.contains(ANTITHESIS_MARKER) {
            if proposal.raise_antithesis().is_err() {
                debug!("ignoring out-of-order antithesis on {}", proposal.id);
            }
        } else if let Some(choice) = vote_marker(&comment.body) {
            if proposal.state != ProposalState::Voting
                && proposal.open_voting(comment.created_at).is_err()
            {
                debug!("ignoring vote outside voting on {}", proposal.id);
                continue;
            }
            let vote = Vote {
                voter: comment.author.clone(),
                proposal_id: proposal.id.clone(),
                revision: proposal.revision,
                choice,
                timestamp: comment.created_at,
            };
            let _ = proposal.record_vote(vote);
        }
    }

    Ok(proposal)
}

/// Replay every proposal thread in a batch, skipping non-proposals and
/// malformed documents.
pub fn replay_all(discussions: &[Discussion], graph: &TermGraph) -> Vec<Proposal> {
    let mut proposals = Vec::new();
    for discussion in discussions {
        if !is_proposal(discussion) {
            continue;
        }
        match replay_discussion(discussion, graph) {
            Ok(proposal) => proposals.push(proposal),
            Err(err) => {
                debug!("skipping malformed proposal thread #{}: {err}", discussion.number);
            }
        }
    }
    proposals
}
