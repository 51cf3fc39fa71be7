//! Governance node orchestrator
//!
//! One `run_once` invocation: load the graph scopes, fetch the public
//! history, replay proposals, evaluate tallies, merge approvals, ask the
//! decider for an action, re-validate it, execute it, then persist. A
//! collaborator failure aborts before anything is persisted.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{ActionMode, ConfigError, GovernanceConfig, NodeConfig};
use crate::decider::{
    ActionDecider, CommentDigest, DeciderError, DeciderSnapshot, ForkValue, NodeAction,
    ProposalDigest,
};
use crate::governance::{
    dialectic, merge, tally, validator, GovernanceError, Proposal, ProposalState, TallyOutcome,
};
use crate::graph::{Origin, TermGraph, TermKind};
use crate::identity::NodeIdentity;
use crate::platform::{Discussion, DiscussionPlatform, PlatformError};
use crate::storage::{
    load_main_snapshot, load_vocabulary, save_main_snapshot, Storage, StorageError,
};
use crate::utils::timestamp_secs;

#[derive(Error, Debug)]
pub enum NodeError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("governance error: {0}")]
    Governance(#[from] GovernanceError),

    /// An external collaborator (platform or decider) failed; the
    /// invocation ended without mutating persisted state
    #[error("collaborator failure: {0}")]
    Collaborator(String),
}

impl From<PlatformError> for NodeError {
    fn from(err: PlatformError) -> Self {
        NodeError::Collaborator(err.to_string())
    }
}

impl From<DeciderError> for NodeError {
    fn from(err: DeciderError) -> Self {
        NodeError::Collaborator(err.to_string())
    }
}

/// What one invocation did.
#[derive(Debug, Default)]
pub struct RunReport {
    pub proposals_seen: usize,
    /// Tally outcomes for proposals that were open for voting.
    pub outcomes: Vec<(String, TallyOutcome)>,
    /// Proposal ids merged into the main snapshot this invocation.
    pub merged: Vec<String>,
    /// Kind of the action actually executed.
    pub action: &'static str,
}

/// A single participant's governance node.
pub struct GovernanceNode {
    identity: NodeIdentity,
    action_mode: ActionMode,
    fork_store: Storage,
    main_store: Storage,
    platform: Arc<dyn DiscussionPlatform>,
    decider: Arc<dyn ActionDecider>,
}

impl GovernanceNode {
    pub fn new(
        config: &NodeConfig,
        platform: Arc<dyn DiscussionPlatform>,
        decider: Arc<dyn ActionDecider>,
    ) -> Result<Self, NodeError> {
        Ok(GovernanceNode {
            identity: NodeIdentity::new(config.node_name.clone(), config.node_name.clone()),
            action_mode: config.action_mode,
            fork_store: Storage::new(&config.fork_path)?,
            main_store: Storage::new(&config.main_path)?,
            platform,
            decider,
        })
    }

    /// Run one full governance invocation.
    pub async fn run_once(&self) -> Result<RunReport, NodeError> {
        let governance = GovernanceConfig::load(&self.main_store)?;
        let (main_snapshot, main_reserved) = load_main_snapshot(&self.main_store)?;
        let (fork_set, _) = load_vocabulary(&self.fork_store, Origin::Fork)?;
        let mut graph = TermGraph::new(main_snapshot, fork_set);
        info!(
            "loaded graph: main v{} ({} entries), fork ({} entries)",
            graph.main_version(),
            graph.main().terms.len(),
            graph.fork().len()
        );

        let discussions = self.platform.fetch_discussions().await?;
        let mut proposals = dialectic::replay_all(&discussions, &graph);
        info!(
            "replayed {} proposals from {} discussions",
            proposals.len(),
            discussions.len()
        );

        let now = timestamp_secs();
        let mut report = RunReport {
            proposals_seen: proposals.len(),
            ..Default::default()
        };

        // Evaluate every open tally; merge approvals into main. A second
        // approval in the same pass sees the bumped version and fails the
        // revision check, forcing re-validation next invocation.
        for proposal in &mut proposals {
            if proposal.state != ProposalState::Voting {
                continue;
            }
            let result = tally::evaluate(proposal, &proposal.votes, &governance, now);
            if result.outcome == TallyOutcome::Pending {
                continue;
            }
            proposal.finalize(result.outcome)?;
            info!(
                "proposal {} decided: {:?} ({}A/{}R)",
                proposal.id, result.outcome, result.approve_votes, result.reject_votes
            );
            report.outcomes.push((proposal.id.clone(), result.outcome));

            if proposal.state == ProposalState::Approved {
                match merge::apply(graph.main(), proposal) {
                    Ok(next) => {
                        info!("merged {} into main v{}", proposal.id, next.version);
                        graph.set_main(next);
                        report.merged.push(proposal.id.clone());
                    }
                    Err(GovernanceError::ConflictingRevision { validated, current }) => {
                        warn!(
                            "skipping merge of {}: validated against v{validated}, main at v{current}",
                            proposal.id
                        );
                    }
                    Err(err) => return Err(err.into()),
                }
            }
        }

        let snapshot = self.build_snapshot(&graph, &governance, &proposals, &discussions, now);
        let proposed = self.decider.decide(&snapshot).await?;
        debug!("decider proposed: {}", proposed.kind());

        let action = if self.action_is_valid(&proposed, &graph, &proposals, now) {
            proposed
        } else {
            NodeAction::Noop
        };
        report.action = action.kind();
        self.execute(&action, &graph).await?;

        // All external effects succeeded; now persist.
        if !report.merged.is_empty() {
            save_main_snapshot(&self.main_store, graph.main(), &main_reserved)?;
            info!("persisted main snapshot v{}", graph.main_version());
        }

        Ok(report)
    }

    fn build_snapshot(
        &self,
        graph: &TermGraph,
        governance: &GovernanceConfig,
        proposals: &[Proposal],
        discussions: &[Discussion],
        now: u64,
    ) -> DeciderSnapshot {
        let fork_values = graph
            .fork_only()
            .map(|t| ForkValue {
                id: t.id.clone(),
                definition: t.definition.clone(),
            })
            .collect();

        let ids_of_kind = |kind: TermKind| {
            graph
                .main()
                .terms
                .iter()
                .filter(|t| t.kind == kind)
                .map(|t| t.id.clone())
                .collect()
        };

        let digests = proposals
            .iter()
            .filter_map(|p| {
                let thread_id = p.thread_id.clone()?;
                let discussion = discussions.iter().find(|d| d.id == thread_id)?;
                let result = tally::evaluate(p, &p.votes, governance, now);
                Some(ProposalDigest {
                    thread_id,
                    number: discussion.number,
                    title: discussion.title.clone(),
                    author: p.author.clone(),
                    state: p.state,
                    approve_votes: result.approve_votes,
                    reject_votes: result.reject_votes,
                    body_excerpt: excerpt(&discussion.body, 500),
                    recent_comments: discussion
                        .comments
                        .iter()
                        .rev()
                        .take(3)
                        .rev()
                        .map(|c| CommentDigest {
                            author: c.author.clone(),
                            excerpt: excerpt(&c.body, 200),
                        })
                        .collect(),
                })
            })
            .collect();

        DeciderSnapshot {
            node_name: self.identity.name.clone(),
            mode: self.action_mode,
            fork_values,
            main_terms: ids_of_kind(TermKind::Term),
            main_principles: ids_of_kind(TermKind::Principle),
            proposals: digests,
        }
    }

    /// Re-validate a proposed action. Anything the mode forbids, targets
    /// a thread in the wrong state, or cites outside main is dropped;
    /// the decider is advisory, never authoritative.
    fn action_is_valid(
        &self,
        action: &NodeAction,
        graph: &TermGraph,
        proposals: &[Proposal],
        now: u64,
    ) -> bool {
        if !action.permitted_in(self.action_mode) {
            warn!(
                "decider proposed {} but mode is {}; dropping",
                action.kind(),
                self.action_mode.as_str()
            );
            return false;
        }

        let find = |thread_id: &str| {
            proposals
                .iter()
                .find(|p| p.thread_id.as_deref() == Some(thread_id))
        };

        match action {
            NodeAction::Vote { thread_id, .. } => match find(thread_id) {
                Some(p) if p.state == ProposalState::Voting => true,
                Some(p) => {
                    warn!("vote on {} dropped: state is {:?}", p.id, p.state);
                    false
                }
                None => {
                    warn!("vote dropped: unknown thread {thread_id}");
                    false
                }
            },
            NodeAction::Propose { payload, .. } => {
                let kind = dialectic::infer_kind(payload, graph);
                let draft =
                    Proposal::draft(self.identity.handle.clone(), kind, payload.clone(), now);
                match validator::validate(&draft, graph) {
                    Ok(()) => true,
                    Err(err) => {
                        warn!("proposal dropped: {err}");
                        false
                    }
                }
            }
            NodeAction::PostAntithesis { thread_id, .. } => match find(thread_id) {
                Some(p) if !p.state.is_terminal() && p.state != ProposalState::Voting => true,
                Some(p) => {
                    warn!("antithesis on {} dropped: state is {:?}", p.id, p.state);
                    false
                }
                None => {
                    warn!("antithesis dropped: unknown thread {thread_id}");
                    false
                }
            },
            NodeAction::PostSynthesis {
                thread_id, payload, ..
            } => match find(thread_id) {
                Some(p) if p.state == ProposalState::Antithesis => {
                    if p.author != self.identity.handle {
                        warn!("synthesis on {} dropped: not the author", p.id);
                        return false;
                    }
                    let mut revised = p.clone();
                    revised.payload = payload.clone();
                    match validator::validate(&revised, graph) {
                        Ok(()) => true,
                        Err(err) => {
                            warn!("synthesis dropped: {err}");
                            false
                        }
                    }
                }
                Some(p) => {
                    warn!("synthesis on {} dropped: state is {:?}", p.id, p.state);
                    false
                }
                None => {
                    warn!("synthesis dropped: unknown thread {thread_id}");
                    false
                }
            },
            NodeAction::Noop => true,
        }
    }

    async fn execute(&self, action: &NodeAction, graph: &TermGraph) -> Result<(), NodeError> {
        let header = fork_header(graph);
        match action {
            NodeAction::Vote {
                thread_id,
                choice,
                reasoning,
            } => {
                let body = format!("{header}{}\n\n*{reasoning}*", choice.marker());
                self.platform.post_comment(thread_id, &body).await?;
                info!("cast {:?} vote on {thread_id}", choice);
            }
            NodeAction::Propose {
                title,
                payload,
                rationale,
            } => {
                let body = format!(
                    "{header}{} {rationale}\n\n{}",
                    dialectic::THESIS_MARKER,
                    payload.to_document_block()
                );
                let id = self.platform.create_discussion(title, &body).await?;
                info!("opened proposal thread {id}");
            }
            NodeAction::PostAntithesis { thread_id, text } => {
                let body = format!("{header}{} {text}", dialectic::ANTITHESIS_MARKER);
                self.platform.post_comment(thread_id, &body).await?;
                info!("raised antithesis on {thread_id}");
            }
            NodeAction::PostSynthesis {
                thread_id,
                payload,
                text,
            } => {
                let body = format!(
                    "{header}{} {text}\n\n{}",
                    dialectic::SYNTHESIS_MARKER,
                    payload.to_document_block()
                );
                self.platform.post_comment(thread_id, &body).await?;
                info!("posted synthesis on {thread_id}");
            }
            NodeAction::Noop => {
                info!("no action this invocation");
            }
        }
        Ok(())
    }
}

/// Header attached to every post: the fork values motivating this node,
/// shown for transparency but never citable.
fn fork_header(graph: &TermGraph) -> String {
    let values: Vec<String> = graph
        .fork_only()
        .map(|t| format!("- {}: \"{}\"", t.id, excerpt(&t.definition, 100)))
        .collect();
    if values.is_empty() {
        String::new()
    } else {
        format!("**MY FORK VALUES:**\n{}\n\n---\n\n", values.join("\n"))
    }
}

fn excerpt(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(max_chars).collect();
        format!("{truncated}...")
    }
}
