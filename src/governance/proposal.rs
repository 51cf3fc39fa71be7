//! Proposal and vote data model
//!
//! A proposal is authored against the fork's private motivations but
//! addressed to the main vocabulary: its payload may only cite main
//! identifiers. The wire form is a discussion body carrying a
//! `**PROPOSED DEFINITION**` heading and a fenced JSON data block.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::lifecycle::ProposalState;
use super::GovernanceError;
use crate::graph::{Origin, Term, TermId, TermKind};

/// Heading that introduces the payload data block in a proposal document.
pub const PROPOSED_DEFINITION_MARKER: &str = "**PROPOSED DEFINITION**";

/// What a proposal does to the main vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalKind {
    NewTerm,
    AmendTerm,
    NewRule,
    AmendRule,
}

impl ProposalKind {
    pub fn is_amendment(&self) -> bool {
        matches!(self, ProposalKind::AmendTerm | ProposalKind::AmendRule)
    }
}

/// The draft entry a proposal wants inserted into or amended in main.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposalPayload {
    /// Identifier of the entry being created or amended.
    pub identifier: TermId,
    /// Proposed definition text.
    pub definition: String,
    /// Cited identifiers; must all resolve in main.
    #[serde(default)]
    pub aligns_with: Vec<TermId>,
    /// Declared kind for new entries; amendments keep the existing kind.
    #[serde(default = "default_payload_kind")]
    pub kind: TermKind,
}

fn default_payload_kind() -> TermKind {
    TermKind::Term
}

/// Raw wire shape of the fenced data block.
#[derive(Deserialize)]
struct RawPayload {
    identifier: String,
    definition: String,
    #[serde(default)]
    aligns_with: Vec<String>,
    #[serde(default)]
    kind: Option<TermKind>,
}

fn fenced_block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"```(?:json)?\s*\n([\s\S]*?)```").expect("fenced block pattern")
    })
}

impl ProposalPayload {
    /// Extract the payload from a proposal document: the first fenced
    /// data block after the `**PROPOSED DEFINITION**` heading. Anything
    /// missing or undecodable is a malformed proposal; it never enters
    /// debate.
    pub fn parse_document(body: &str) -> Result<Self, GovernanceError> {
        let after_marker = body
            .split_once(PROPOSED_DEFINITION_MARKER)
            .map(|(_, rest)| rest)
            .ok_or_else(|| {
                GovernanceError::MalformedProposal("missing PROPOSED DEFINITION heading".into())
            })?;

        let captures = fenced_block_re().captures(after_marker).ok_or_else(|| {
            GovernanceError::MalformedProposal("missing fenced data block".into())
        })?;

        let raw: RawPayload = serde_json::from_str(&captures[1])
            .map_err(|e| GovernanceError::MalformedProposal(format!("undecodable block: {e}")))?;

        let identifier = TermId::new(raw.identifier)
            .map_err(|e| GovernanceError::MalformedProposal(e.to_string()))?;
        if identifier.is_reserved() {
            return Err(GovernanceError::MalformedProposal(format!(
                "{identifier} is a reserved identifier"
            )));
        }

        let mut aligns_with = Vec::with_capacity(raw.aligns_with.len());
        for id in raw.aligns_with {
            aligns_with
                .push(TermId::new(id).map_err(|e| GovernanceError::MalformedProposal(e.to_string()))?);
        }

        Ok(ProposalPayload {
            identifier,
            definition: raw.definition,
            aligns_with,
            kind: raw.kind.unwrap_or(TermKind::Term),
        })
    }

    /// Render the payload back into its wire form.
    pub fn to_document_block(&self) -> String {
        let json = serde_json::json!({
            "identifier": self.identifier.as_str(),
            "definition": self.definition,
            "aligns_with": self.aligns_with.iter().map(|id| id.as_str()).collect::<Vec<_>>(),
            "kind": self.kind,
        });
        format!("{PROPOSED_DEFINITION_MARKER}\n```json\n{json:#}\n```")
    }

    /// Materialize the payload as a main-scope entry.
    pub fn to_term(&self, kind: TermKind, revision: u32, locked: bool) -> Term {
        Term {
            id: self.identifier.clone(),
            kind,
            definition: self.definition.clone(),
            aligns_with: self.aligns_with.clone(),
            locked,
            origin: Origin::Main,
            revision,
        }
    }
}

/// A single vote in the public history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    /// Identity the vote is attributed to.
    pub voter: String,
    /// Proposal the vote belongs to.
    pub proposal_id: String,
    /// Payload revision the vote was cast against; votes bound to older
    /// revisions are stale and not counted.
    pub revision: u32,
    pub choice: VoteChoice,
    pub timestamp: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteChoice {
    Approve,
    Reject,
}

impl VoteChoice {
    /// The line-literal wire marker for this choice.
    pub fn marker(&self) -> &'static str {
        match self {
            VoteChoice::Approve => "**VOTE: APPROVE**",
            VoteChoice::Reject => "**VOTE: REJECT**",
        }
    }
}

/// A governance proposal progressing through the dialectic lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proposal {
    pub id: String,
    /// Identity of the author.
    pub author: String,
    pub kind: ProposalKind,
    pub payload: ProposalPayload,
    pub state: ProposalState,
    /// Bumped by every synthesis; votes are bound to a revision.
    pub revision: u32,
    /// Main snapshot version the payload last validated against.
    pub validated_against: Option<u64>,
    pub created_at: u64,
    /// When the proposal entered the voting state.
    pub voting_opened_at: Option<u64>,
    /// Opaque discussion-thread identifier owned by the platform.
    pub thread_id: Option<String>,
    /// Vote history in thread order.
    pub votes: Vec<Vote>,
}

impl Proposal {
    pub fn new(
        id: impl Into<String>,
        author: impl Into<String>,
        kind: ProposalKind,
        payload: ProposalPayload,
        created_at: u64,
    ) -> Self {
        Proposal {
            id: id.into(),
            author: author.into(),
            kind,
            payload,
            state: ProposalState::Drafted,
            revision: 0,
            validated_against: None,
            created_at,
            voting_opened_at: None,
            thread_id: None,
            votes: Vec::new(),
        }
    }

    /// Draft a fresh local proposal with a generated identifier.
    pub fn draft(
        author: impl Into<String>,
        kind: ProposalKind,
        payload: ProposalPayload,
        created_at: u64,
    ) -> Self {
        Self::new(format!("prop-{}", Uuid::new_v4()), author, kind, payload, created_at)
    }

    pub fn with_thread(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = Some(thread_id.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_well_formed_document() {
        let body = "\
[THESIS] Expand the harm definition.

**PROPOSED DEFINITION**
```json
{\"identifier\": \"@harm\", \"definition\": \"damage to any sentient being\", \"aligns_with\": [\"@wellbeing\"]}
```
";
        let payload = ProposalPayload::parse_document(body).unwrap();
        assert_eq!(payload.identifier.as_str(), "@harm");
        assert_eq!(payload.definition, "damage to any sentient being");
        assert_eq!(payload.aligns_with.len(), 1);
        assert_eq!(payload.kind, TermKind::Term);
    }

    #[test]
    fn missing_heading_is_malformed() {
        let err = ProposalPayload::parse_document("just prose").unwrap_err();
        assert!(matches!(err, GovernanceError::MalformedProposal(_)));
    }

    #[test]
    fn missing_block_is_malformed() {
        let body = "**PROPOSED DEFINITION**\nno block here";
        let err = ProposalPayload::parse_document(body).unwrap_err();
        assert!(matches!(err, GovernanceError::MalformedProposal(_)));
    }

    #[test]
    fn undecodable_json_is_malformed() {
        let body = "**PROPOSED DEFINITION**\n```json\n{not json}\n```";
        let err = ProposalPayload::parse_document(body).unwrap_err();
        assert!(matches!(err, GovernanceError::MalformedProposal(_)));
    }

    #[test]
    fn reserved_identifier_is_malformed() {
        let body = "**PROPOSED DEFINITION**\n```json\n{\"identifier\": \"@_fork\", \"definition\": \"x\"}\n```";
        let err = ProposalPayload::parse_document(body).unwrap_err();
        assert!(matches!(err, GovernanceError::MalformedProposal(_)));
    }

    #[test]
    fn document_block_round_trips() {
        let payload = ProposalPayload {
            identifier: TermId::new("@care").unwrap(),
            definition: "active concern for others".to_string(),
            aligns_with: vec![TermId::new("@wellbeing").unwrap()],
            kind: TermKind::Principle,
        };
        let rendered = payload.to_document_block();
        let reparsed = ProposalPayload::parse_document(&rendered).unwrap();
        assert_eq!(reparsed, payload);
    }
}
