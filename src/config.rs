//! Node and governance configuration
//!
//! Node settings come from environment variables, optionally overridden by
//! a YAML file. Governance parameters live with the shared vocabulary in
//! the main checkout, so every node evaluates under the same rules.

use std::env;
use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::storage::{Storage, StorageError};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(String),

    #[error("invalid value: {0}")]
    InvalidValue(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Which action kinds the node may emit this invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionMode {
    /// The decider chooses freely.
    #[default]
    Auto,
    /// Only cast votes.
    VoteOnly,
    /// Only post antithesis/synthesis responses.
    Respond,
    /// Only create new proposals.
    Propose,
}

impl ActionMode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_lowercase().as_str() {
            "auto" => Some(ActionMode::Auto),
            "vote_only" | "vote-only" => Some(ActionMode::VoteOnly),
            "respond" => Some(ActionMode::Respond),
            "propose" => Some(ActionMode::Propose),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionMode::Auto => "auto",
            ActionMode::VoteOnly => "vote_only",
            ActionMode::Respond => "respond",
            ActionMode::Propose => "propose",
        }
    }
}

/// Main node configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Checkout of this participant's fork.
    #[serde(default = "default_fork_path")]
    pub fork_path: PathBuf,
    /// Checkout of the shared main repository.
    #[serde(default = "default_main_path")]
    pub main_path: PathBuf,
    /// `owner/name` of the main repository on the discussion platform.
    pub main_repo: String,
    /// Platform API token.
    #[serde(default)]
    pub platform_token: String,
    /// Participant name this node posts and votes as.
    #[serde(default = "default_node_name")]
    pub node_name: String,
    /// Which action kinds may be emitted this invocation.
    #[serde(default)]
    pub action_mode: ActionMode,
    #[serde(default)]
    pub gemini_api_key: String,
    #[serde(default)]
    pub openai_api_key: String,
    #[serde(default)]
    pub anthropic_api_key: String,
    #[serde(default = "default_gemini_model")]
    pub gemini_model: String,
}

fn default_fork_path() -> PathBuf {
    PathBuf::from("./fork")
}

fn default_main_path() -> PathBuf {
    PathBuf::from("./main")
}

fn default_node_name() -> String {
    "anonymous-node".to_string()
}

fn default_gemini_model() -> String {
    "gemini-2.0-flash-exp".to_string()
}

fn env_or(key: &str, fallback: &str) -> String {
    env::var(key).unwrap_or_else(|_| fallback.to_string())
}

impl NodeConfig {
    /// Load configuration from environment variables, preferring a config
    /// file when `AGORA_CONFIG_FILE` points at one.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Ok(path) = env::var("AGORA_CONFIG_FILE") {
            if PathBuf::from(&path).exists() {
                return Self::from_file(&path);
            }
        }

        let action_mode_raw = env_or("AGORA_ACTION_MODE", "auto");
        let action_mode = ActionMode::parse(&action_mode_raw).ok_or_else(|| {
            ConfigError::InvalidValue(format!("unknown action mode {action_mode_raw:?}"))
        })?;

        Ok(NodeConfig {
            fork_path: PathBuf::from(env_or("AGORA_FORK_PATH", "./fork")),
            main_path: PathBuf::from(env_or("AGORA_MAIN_PATH", "./main")),
            main_repo: env_or("AGORA_MAIN_REPO", "agora-net/vocabulary"),
            platform_token: env::var("GITHUB_TOKEN")
                .or_else(|_| env::var("GH_PAT"))
                .unwrap_or_default(),
            node_name: env_or("AGORA_NODE_NAME", &default_node_name()),
            action_mode,
            gemini_api_key: env::var("GEMINI_API_KEY").unwrap_or_default(),
            openai_api_key: env::var("OPENAI_API_KEY").unwrap_or_default(),
            anthropic_api_key: env::var("ANTHROPIC_API_KEY").unwrap_or_default(),
            gemini_model: env_or("GEMINI_MODEL", &default_gemini_model()),
        })
    }

    /// Load configuration from a YAML file.
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

/// Governance parameters shared by every node.
///
/// These load from `data/governance.json` in the main checkout; because
/// the file is part of the shared state, all nodes tally under identical
/// quorum and threshold rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GovernanceConfig {
    /// Minimum distinct voters before a tally can decide.
    #[serde(default = "default_quorum")]
    pub quorum: u32,
    /// Approve fraction (exclusive) required for approval.
    #[serde(default = "default_approval_threshold")]
    pub approval_threshold: f64,
    /// Seconds a proposal stays open for votes before it can expire.
    #[serde(default = "default_voting_window_secs")]
    pub voting_window_secs: u64,
}

fn default_quorum() -> u32 {
    3
}

fn default_approval_threshold() -> f64 {
    0.66
}

fn default_voting_window_secs() -> u64 {
    7 * 24 * 60 * 60
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        GovernanceConfig {
            quorum: default_quorum(),
            approval_threshold: default_approval_threshold(),
            voting_window_secs: default_voting_window_secs(),
        }
    }
}

const GOVERNANCE_FILE: &str = "data/governance.json";

impl GovernanceConfig {
    /// Load from the main checkout, falling back to defaults when the
    /// file is absent.
    pub fn load(main_store: &Storage) -> Result<Self, ConfigError> {
        let config: GovernanceConfig = main_store
            .try_get_json(GOVERNANCE_FILE)?
            .unwrap_or_default();
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.quorum < 1 {
            return Err(ConfigError::InvalidValue(
                "quorum must be at least 1".to_string(),
            ));
        }
        if !(self.approval_threshold > 0.0 && self.approval_threshold < 1.0) {
            return Err(ConfigError::InvalidValue(format!(
                "approval threshold must be in (0, 1), got {}",
                self.approval_threshold
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_mode_parses_known_values() {
        assert_eq!(ActionMode::parse("auto"), Some(ActionMode::Auto));
        assert_eq!(ActionMode::parse("vote_only"), Some(ActionMode::VoteOnly));
        assert_eq!(ActionMode::parse("VOTE-ONLY"), Some(ActionMode::VoteOnly));
        assert_eq!(ActionMode::parse("respond"), Some(ActionMode::Respond));
        assert_eq!(ActionMode::parse("propose"), Some(ActionMode::Propose));
        assert_eq!(ActionMode::parse("yolo"), None);
    }

    #[test]
    fn governance_defaults_match_shared_rules() {
        let config = GovernanceConfig::default();
        assert_eq!(config.quorum, 3);
        assert!((config.approval_threshold - 0.66).abs() < f64::EPSILON);
        config.validate().unwrap();
    }

    #[test]
    fn governance_validation_rejects_bad_values() {
        let config = GovernanceConfig {
            quorum: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = GovernanceConfig {
            approval_threshold: 1.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn governance_loads_defaults_when_file_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = Storage::new(dir.path()).unwrap();
        let config = GovernanceConfig::load(&store).unwrap();
        assert_eq!(config.quorum, 3);
    }
}
