//! Action decision boundary
//!
//! The core hands a read-only snapshot of its state to an external
//! decision function and gets one proposed action back. The decider is
//! never trusted: every returned action is re-validated against the
//! action mode, the vocabulary, and the proposal states before anything
//! is transmitted. The LLM-backed decider is one implementation; the
//! scripted decider drives tests.

pub mod llm;
pub mod scripted;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use llm::{LlmClient, LlmDecider};
pub use scripted::ScriptedDecider;

use crate::config::ActionMode;
use crate::governance::{ProposalPayload, ProposalState, VoteChoice};
use crate::graph::TermId;

/// Error types for decision operations
#[derive(Error, Debug)]
pub enum DeciderError {
    /// No decision provider is configured
    #[error("no decision provider available")]
    NoProvider,

    /// The provider call failed
    #[error("provider request failed: {0}")]
    Request(String),

    /// The provider answered but the decision could not be decoded
    #[error("undecodable decision: {0}")]
    Malformed(String),
}

pub type DeciderResult<T> = Result<T, DeciderError>;

/// One action the decider proposes; the core validates and applies it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeAction {
    /// Cast a vote on an open proposal.
    Vote {
        thread_id: String,
        choice: VoteChoice,
        reasoning: String,
    },
    /// Open a new proposal thread.
    Propose {
        title: String,
        payload: ProposalPayload,
        rationale: String,
    },
    /// Raise a concern on a proposal.
    PostAntithesis { thread_id: String, text: String },
    /// Post a revision addressing concerns.
    PostSynthesis {
        thread_id: String,
        payload: ProposalPayload,
        text: String,
    },
    /// Do nothing this invocation.
    Noop,
}

impl NodeAction {
    pub fn kind(&self) -> &'static str {
        match self {
            NodeAction::Vote { .. } => "vote",
            NodeAction::Propose { .. } => "propose",
            NodeAction::PostAntithesis { .. } => "post_antithesis",
            NodeAction::PostSynthesis { .. } => "post_synthesis",
            NodeAction::Noop => "noop",
        }
    }

    /// Whether the mode selector allows this action kind to be emitted.
    pub fn permitted_in(&self, mode: ActionMode) -> bool {
        match mode {
            ActionMode::Auto => true,
            ActionMode::VoteOnly => matches!(self, NodeAction::Vote { .. } | NodeAction::Noop),
            ActionMode::Respond => matches!(
                self,
                NodeAction::PostAntithesis { .. } | NodeAction::PostSynthesis { .. } | NodeAction::Noop
            ),
            ActionMode::Propose => matches!(self, NodeAction::Propose { .. } | NodeAction::Noop),
        }
    }
}

/// A fork-private value shown to the decider as motivation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForkValue {
    pub id: TermId,
    pub definition: String,
}

/// Digest of one proposal thread for the decider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposalDigest {
    pub thread_id: String,
    pub number: u64,
    pub title: String,
    pub author: String,
    pub state: ProposalState,
    pub approve_votes: usize,
    pub reject_votes: usize,
    pub body_excerpt: String,
    pub recent_comments: Vec<CommentDigest>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentDigest {
    pub author: String,
    pub excerpt: String,
}

/// Read-only view of the node's state handed to the decider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeciderSnapshot {
    pub node_name: String,
    pub mode: ActionMode,
    /// Fork-only values with definitions; motivation, never citable.
    pub fork_values: Vec<ForkValue>,
    /// Citable main identifiers.
    pub main_terms: Vec<TermId>,
    pub main_principles: Vec<TermId>,
    pub proposals: Vec<ProposalDigest>,
}

/// Capability interface for the external decision-maker.
#[async_trait]
pub trait ActionDecider: Send + Sync {
    async fn decide(&self, snapshot: &DeciderSnapshot) -> DeciderResult<NodeAction>;
}
