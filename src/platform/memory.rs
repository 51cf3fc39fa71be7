//! In-memory platform double
//!
//! Holds discussions behind a mutex so tests and offline runs can script
//! a public history and observe what the node posts back.

use std::sync::Mutex;

use async_trait::async_trait;

use super::{Comment, Discussion, DiscussionPlatform, PlatformResult};
use crate::utils::timestamp_secs;

#[derive(Default)]
pub struct InMemoryPlatform {
    discussions: Mutex<Vec<Discussion>>,
    next_number: Mutex<u64>,
}

impl InMemoryPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_discussions(discussions: Vec<Discussion>) -> Self {
        let next = discussions.iter().map(|d| d.number).max().unwrap_or(0) + 1;
        InMemoryPlatform {
            discussions: Mutex::new(discussions),
            next_number: Mutex::new(next),
        }
    }

    /// Snapshot of the stored discussions, for assertions.
    pub fn discussions(&self) -> Vec<Discussion> {
        self.discussions.lock().unwrap().clone()
    }
}

#[async_trait]
impl DiscussionPlatform for InMemoryPlatform {
    async fn fetch_discussions(&self) -> PlatformResult<Vec<Discussion>> {
        Ok(self.discussions())
    }

    async fn post_comment(&self, discussion_id: &str, body: &str) -> PlatformResult<()> {
        let mut discussions = self.discussions.lock().unwrap();
        if let Some(discussion) = discussions.iter_mut().find(|d| d.id == discussion_id) {
            discussion.comments.push(Comment {
                author: "self".to_string(),
                body: body.to_string(),
                created_at: timestamp_secs(),
            });
        }
        Ok(())
    }

    async fn create_discussion(&self, title: &str, body: &str) -> PlatformResult<String> {
        let mut next_number = self.next_number.lock().unwrap();
        let number = *next_number;
        *next_number += 1;

        let id = format!("disc-{number}");
        self.discussions.lock().unwrap().push(Discussion {
            id: id.clone(),
            number,
            title: title.to_string(),
            author: "self".to_string(),
            body: body.to_string(),
            created_at: timestamp_secs(),
            comments: Vec::new(),
        });
        Ok(id)
    }
}
