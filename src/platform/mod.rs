//! Discussion platform boundary
//!
//! The platform hosts the publicly readable debate and vote history. The
//! core consumes it through this narrow contract; the GitHub Discussions
//! client is one implementation, the in-memory platform another for
//! tests and offline runs.

pub mod github;
pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use github::GitHubPlatform;
pub use memory::InMemoryPlatform;

/// Error types for platform operations
#[derive(Error, Debug)]
pub enum PlatformError {
    /// The request could not be sent or came back non-success
    #[error("platform request failed: {0}")]
    Request(String),

    /// The response decoded but did not match the expected shape
    #[error("unexpected platform response: {0}")]
    Protocol(String),

    /// The repository has no usable discussion category
    #[error("no discussion category available")]
    NoCategory,
}

pub type PlatformResult<T> = Result<T, PlatformError>;

/// A comment in a discussion thread, in thread order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub author: String,
    pub body: String,
    pub created_at: u64,
}

/// One discussion thread: the public record a proposal lives in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Discussion {
    /// Opaque platform identifier.
    pub id: String,
    pub number: u64,
    pub title: String,
    pub author: String,
    pub body: String,
    pub created_at: u64,
    pub comments: Vec<Comment>,
}

/// Narrow contract over the discussion platform.
#[async_trait]
pub trait DiscussionPlatform: Send + Sync {
    /// Fetch the active discussions, most recently updated first.
    async fn fetch_discussions(&self) -> PlatformResult<Vec<Discussion>>;

    /// Post a comment to an existing discussion.
    async fn post_comment(&self, discussion_id: &str, body: &str) -> PlatformResult<()>;

    /// Open a new discussion, returning its platform identifier.
    async fn create_discussion(&self, title: &str, body: &str) -> PlatformResult<String>;
}
