//! LLM-backed decider
//!
//! Providers are tried in a fixed order — Gemini, OpenAI, Anthropic —
//! skipping any without a configured key. The model answers with a JSON
//! decision; the core re-validates whatever comes back, so a bad
//! decision can waste an invocation but never corrupt state.

use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::{ActionDecider, DeciderError, DeciderResult, DeciderSnapshot, NodeAction};
use crate::config::NodeConfig;
use crate::governance::{ProposalPayload, VoteChoice};
use crate::graph::{TermId, TermKind};

/// Supported decision providers, in fallback order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    Gemini,
    OpenAI,
    Anthropic,
}

impl LlmProvider {
    pub fn display_name(&self) -> &'static str {
        match self {
            LlmProvider::Gemini => "Gemini",
            LlmProvider::OpenAI => "OpenAI",
            LlmProvider::Anthropic => "Anthropic",
        }
    }

    fn all() -> &'static [LlmProvider] {
        &[LlmProvider::Gemini, LlmProvider::OpenAI, LlmProvider::Anthropic]
    }
}

/// Multi-provider text generation client.
pub struct LlmClient {
    http: Client,
    gemini_api_key: String,
    openai_api_key: String,
    anthropic_api_key: String,
    gemini_model: String,
}

impl LlmClient {
    pub fn from_config(config: &NodeConfig) -> Self {
        LlmClient {
            http: Client::new(),
            gemini_api_key: config.gemini_api_key.clone(),
            openai_api_key: config.openai_api_key.clone(),
            anthropic_api_key: config.anthropic_api_key.clone(),
            gemini_model: config.gemini_model.clone(),
        }
    }

    fn key_for(&self, provider: LlmProvider) -> &str {
        match provider {
            LlmProvider::Gemini => &self.gemini_api_key,
            LlmProvider::OpenAI => &self.openai_api_key,
            LlmProvider::Anthropic => &self.anthropic_api_key,
        }
    }

    /// Generate a completion, falling through the provider order until
    /// one answers.
    pub async fn generate(&self, prompt: &str) -> DeciderResult<String> {
        let mut any_configured = false;
        for provider in LlmProvider::all() {
            if self.key_for(*provider).is_empty() {
                continue;
            }
            any_configured = true;
            match self.call(*provider, prompt).await {
                Ok(text) => {
                    debug!("decision generated by {}", provider.display_name());
                    return Ok(text);
                }
                Err(err) => {
                    warn!("{} failed: {err}", provider.display_name());
                }
            }
        }
        if any_configured {
            Err(DeciderError::Request("all providers failed".to_string()))
        } else {
            Err(DeciderError::NoProvider)
        }
    }

    async fn call(&self, provider: LlmProvider, prompt: &str) -> DeciderResult<String> {
        match provider {
            LlmProvider::Gemini => self.call_gemini(prompt).await,
            LlmProvider::OpenAI => self.call_openai(prompt).await,
            LlmProvider::Anthropic => self.call_anthropic(prompt).await,
        }
    }

    async fn post_json(
        &self,
        builder: reqwest::RequestBuilder,
        body: Value,
    ) -> DeciderResult<Value> {
        let response = builder
            .json(&body)
            .send()
            .await
            .map_err(|e| DeciderError::Request(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(DeciderError::Request(format!("HTTP {status}")));
        }
        response
            .json()
            .await
            .map_err(|e| DeciderError::Request(e.to_string()))
    }

    async fn call_gemini(&self, prompt: &str) -> DeciderResult<String> {
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent",
            self.gemini_model
        );
        let body = self
            .post_json(
                self.http
                    .post(&url)
                    .query(&[("key", self.gemini_api_key.as_str())]),
                json!({ "contents": [{ "parts": [{ "text": prompt }] }] }),
            )
            .await?;
        body["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| DeciderError::Request("empty Gemini response".to_string()))
    }

    async fn call_openai(&self, prompt: &str) -> DeciderResult<String> {
        let body = self
            .post_json(
                self.http
                    .post("https://api.openai.com/v1/chat/completions")
                    .bearer_auth(&self.openai_api_key),
                json!({
                    "model": "gpt-4o-mini",
                    "messages": [{ "role": "user", "content": prompt }],
                    "max_tokens": 2000,
                }),
            )
            .await?;
        body["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| DeciderError::Request("empty OpenAI response".to_string()))
    }

    async fn call_anthropic(&self, prompt: &str) -> DeciderResult<String> {
        let body = self
            .post_json(
                self.http
                    .post("https://api.anthropic.com/v1/messages")
                    .header("x-api-key", &self.anthropic_api_key)
                    .header("anthropic-version", "2023-06-01"),
                json!({
                    "model": "claude-3-haiku-20240307",
                    "max_tokens": 2000,
                    "messages": [{ "role": "user", "content": prompt }],
                }),
            )
            .await?;
        body["content"][0]["text"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| DeciderError::Request("empty Anthropic response".to_string()))
    }
}

/// Wire shape of the model's decision.
#[derive(Deserialize)]
struct Decision {
    #[serde(default)]
    reasoning: String,
    action: String,
    #[serde(default)]
    target_thread_id: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    vote: Option<String>,
    #[serde(default)]
    payload: Option<DecisionPayload>,
}

#[derive(Deserialize)]
struct DecisionPayload {
    identifier: String,
    definition: String,
    #[serde(default)]
    aligns_with: Vec<String>,
    #[serde(default)]
    kind: Option<TermKind>,
}

impl DecisionPayload {
    fn into_payload(self) -> DeciderResult<ProposalPayload> {
        let identifier =
            TermId::new(self.identifier).map_err(|e| DeciderError::Malformed(e.to_string()))?;
        let mut aligns_with = Vec::with_capacity(self.aligns_with.len());
        for id in self.aligns_with {
            aligns_with.push(TermId::new(id).map_err(|e| DeciderError::Malformed(e.to_string()))?);
        }
        Ok(ProposalPayload {
            identifier,
            definition: self.definition,
            aligns_with,
            kind: self.kind.unwrap_or(TermKind::Term),
        })
    }
}

fn json_block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{[\s\S]*\}").expect("json block pattern"))
}

/// Decider backed by the multi-provider client.
pub struct LlmDecider {
    client: LlmClient,
}

impl LlmDecider {
    pub fn new(client: LlmClient) -> Self {
        LlmDecider { client }
    }

    fn build_prompt(snapshot: &DeciderSnapshot) -> String {
        let fork_values = if snapshot.fork_values.is_empty() {
            "- (aligned with the shared vocabulary)".to_string()
        } else {
            snapshot
                .fork_values
                .iter()
                .map(|v| {
                    let mut definition: String = v.definition.chars().take(100).collect();
                    if v.definition.chars().count() > 100 {
                        definition.push_str("...");
                    }
                    format!("- {}: \"{definition}\"", v.id)
                })
                .collect::<Vec<_>>()
                .join("\n")
        };

        let join_ids = |ids: &[TermId]| {
            ids.iter()
                .take(10)
                .map(|id| id.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        };

        let mut threads = String::new();
        for p in snapshot.proposals.iter().take(5) {
            threads.push_str(&format!(
                "\n### #{} [{:?}] {}\nAuthor: {} | Votes: {}A/{}R | thread_id: {}\n{}\n",
                p.number,
                p.state,
                p.title,
                p.author,
                p.approve_votes,
                p.reject_votes,
                p.thread_id,
                p.body_excerpt,
            ));
            for c in &p.recent_comments {
                threads.push_str(&format!("- @{}: {}\n", c.author, c.excerpt));
            }
        }

        format!(
            "You are {name}, a governance node in a shared-vocabulary community.\n\
             \n\
             YOUR FORK VALUES (personal beliefs, motivation only):\n{fork_values}\n\
             \n\
             SHARED VOCABULARY (the only identifiers you may cite):\n\
             Terms: {terms}\nPrinciples: {principles}\n\
             \n\
             CURRENT PROPOSAL THREADS:\n{threads}\n\
             \n\
             RULES:\n\
             1. Allowed actions: vote, propose, post_antithesis, post_synthesis, noop.\n\
             2. This invocation is restricted to mode: {mode}.\n\
             3. Proposals and syntheses must carry a payload object \
                {{identifier, definition, aligns_with, kind}}.\n\
             4. aligns_with may only cite shared identifiers, never your fork values.\n\
             5. Votes are approve or reject.\n\
             \n\
             Respond with JSON only:\n\
             {{\n\
               \"reasoning\": \"why\",\n\
               \"action\": \"vote|propose|post_antithesis|post_synthesis|noop\",\n\
               \"target_thread_id\": \"thread_id if responding or voting\",\n\
               \"title\": \"title if proposing\",\n\
               \"content\": \"text to post\",\n\
               \"vote\": \"approve|reject if voting\",\n\
               \"payload\": {{\"identifier\": \"@x\", \"definition\": \"...\", \"aligns_with\": [], \"kind\": \"term\"}}\n\
             }}",
            name = snapshot.node_name,
            fork_values = fork_values,
            terms = join_ids(&snapshot.main_terms),
            principles = join_ids(&snapshot.main_principles),
            threads = threads,
            mode = snapshot.mode.as_str(),
        )
    }

    fn parse_decision(response: &str) -> DeciderResult<NodeAction> {
        let raw = json_block_re()
            .find(response)
            .ok_or_else(|| DeciderError::Malformed("no JSON object in response".to_string()))?;
        let decision: Decision = serde_json::from_str(raw.as_str())
            .map_err(|e| DeciderError::Malformed(e.to_string()))?;

        let thread = |decision: &Decision| {
            decision
                .target_thread_id
                .clone()
                .ok_or_else(|| DeciderError::Malformed("missing target_thread_id".to_string()))
        };

        match decision.action.as_str() {
            "vote" => {
                let choice = match decision.vote.as_deref() {
                    Some("approve") | Some("APPROVE") => VoteChoice::Approve,
                    Some("reject") | Some("REJECT") => VoteChoice::Reject,
                    other => {
                        return Err(DeciderError::Malformed(format!(
                            "unusable vote choice {other:?}"
                        )))
                    }
                };
                Ok(NodeAction::Vote {
                    thread_id: thread(&decision)?,
                    choice,
                    reasoning: decision.reasoning,
                })
            }
            "propose" => {
                let payload = decision
                    .payload
                    .ok_or_else(|| DeciderError::Malformed("propose without payload".to_string()))?
                    .into_payload()?;
                Ok(NodeAction::Propose {
                    title: decision
                        .title
                        .unwrap_or_else(|| format!("Proposal: {}", payload.identifier)),
                    payload,
                    rationale: decision.reasoning,
                })
            }
            "post_antithesis" => Ok(NodeAction::PostAntithesis {
                thread_id: thread(&decision)?,
                text: decision.content.unwrap_or(decision.reasoning),
            }),
            "post_synthesis" => {
                let thread_id = thread(&decision)?;
                let payload = decision
                    .payload
                    .ok_or_else(|| {
                        DeciderError::Malformed("synthesis without payload".to_string())
                    })?
                    .into_payload()?;
                Ok(NodeAction::PostSynthesis {
                    thread_id,
                    payload,
                    text: decision.content.unwrap_or(decision.reasoning),
                })
            }
            "noop" => Ok(NodeAction::Noop),
            other => Err(DeciderError::Malformed(format!("unknown action {other:?}"))),
        }
    }
}

#[async_trait]
impl ActionDecider for LlmDecider {
    async fn decide(&self, snapshot: &DeciderSnapshot) -> DeciderResult<NodeAction> {
        let prompt = Self::build_prompt(snapshot);
        debug!("prompt size: {} chars", prompt.len());
        let response = self.client.generate(&prompt).await?;
        Self::parse_decision(&response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ActionMode;

    #[test]
    fn vote_decision_parses() {
        let response = r#"Sure! {"reasoning": "aligned with care", "action": "vote", "target_thread_id": "D_1", "vote": "approve"}"#;
        let action = LlmDecider::parse_decision(response).unwrap();
        assert_eq!(
            action,
            NodeAction::Vote {
                thread_id: "D_1".to_string(),
                choice: VoteChoice::Approve,
                reasoning: "aligned with care".to_string(),
            }
        );
    }

    #[test]
    fn propose_decision_carries_payload() {
        let response = r#"{"action": "propose", "title": "Add @care", "payload": {"identifier": "@care", "definition": "active concern", "aligns_with": ["@wellbeing"], "kind": "principle"}}"#;
        let action = LlmDecider::parse_decision(response).unwrap();
        match action {
            NodeAction::Propose { payload, .. } => {
                assert_eq!(payload.identifier.as_str(), "@care");
                assert_eq!(payload.kind, TermKind::Principle);
            }
            other => panic!("unexpected action {other:?}"),
        }
    }

    #[test]
    fn response_without_json_is_malformed() {
        assert!(matches!(
            LlmDecider::parse_decision("I decline to answer."),
            Err(DeciderError::Malformed(_))
        ));
    }

    #[test]
    fn vote_without_target_is_malformed() {
        let response = r#"{"action": "vote", "vote": "approve"}"#;
        assert!(matches!(
            LlmDecider::parse_decision(response),
            Err(DeciderError::Malformed(_))
        ));
    }

    #[test]
    fn prompt_mentions_mode_and_fork_values() {
        let snapshot = DeciderSnapshot {
            node_name: "node-a".to_string(),
            mode: ActionMode::VoteOnly,
            fork_values: vec![super::super::ForkValue {
                id: TermId::new("@my_personal_value").unwrap(),
                definition: "private belief".to_string(),
            }],
            main_terms: vec![TermId::new("@harm").unwrap()],
            main_principles: vec![],
            proposals: vec![],
        };
        let prompt = LlmDecider::build_prompt(&snapshot);
        assert!(prompt.contains("vote_only"));
        assert!(prompt.contains("@my_personal_value"));
        assert!(prompt.contains("@harm"));
    }
}
