//! GitHub Discussions client
//!
//! Talks to the GraphQL API. Repository and category identifiers are
//! fetched once per process and cached.

use chrono::DateTime;
use reqwest::Client;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{debug, info};

use async_trait::async_trait;

use super::{Comment, Discussion, DiscussionPlatform, PlatformError, PlatformResult};

const GRAPHQL_URL: &str = "https://api.github.com/graphql";
const USER_AGENT: &str = concat!("agora/", env!("CARGO_PKG_VERSION"));

const REPO_INFO_QUERY: &str = r#"
query($owner: String!, $name: String!) {
  repository(owner: $owner, name: $name) {
    id
    discussionCategories(first: 20) {
      nodes { id name }
    }
  }
}
"#;

const DISCUSSIONS_QUERY: &str = r#"
query($owner: String!, $name: String!) {
  repository(owner: $owner, name: $name) {
    discussions(first: 20, orderBy: {field: UPDATED_AT, direction: DESC}) {
      nodes {
        id
        number
        title
        author { login }
        body
        createdAt
        comments(first: 50) {
          nodes {
            body
            author { login }
            createdAt
          }
        }
      }
    }
  }
}
"#;

const ADD_COMMENT_MUTATION: &str = r#"
mutation($discussionId: ID!, $body: String!) {
  addDiscussionComment(input: {discussionId: $discussionId, body: $body}) {
    comment { id }
  }
}
"#;

const CREATE_DISCUSSION_MUTATION: &str = r#"
mutation($repoId: ID!, $categoryId: ID!, $title: String!, $body: String!) {
  createDiscussion(input: {repositoryId: $repoId, categoryId: $categoryId, title: $title, body: $body}) {
    discussion { id number }
  }
}
"#;

#[derive(Clone)]
struct RepoInfo {
    repo_id: String,
    categories: Vec<(String, String)>,
}

pub struct GitHubPlatform {
    http: Client,
    token: String,
    owner: String,
    name: String,
    info: RwLock<Option<RepoInfo>>,
}

impl GitHubPlatform {
    /// Build a client for `owner/name`.
    pub fn new(repo: &str, token: impl Into<String>) -> PlatformResult<Self> {
        let (owner, name) = repo
            .split_once('/')
            .ok_or_else(|| PlatformError::Protocol(format!("repository {repo:?} is not owner/name")))?;
        Ok(GitHubPlatform {
            http: Client::new(),
            token: token.into(),
            owner: owner.to_string(),
            name: name.to_string(),
            info: RwLock::new(None),
        })
    }

    async fn graphql(&self, query: &str, variables: Value) -> PlatformResult<Value> {
        let response = self
            .http
            .post(GRAPHQL_URL)
            .bearer_auth(&self.token)
            .header("User-Agent", USER_AGENT)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await
            .map_err(|e| PlatformError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PlatformError::Request(format!("HTTP {status}")));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| PlatformError::Request(e.to_string()))?;
        if let Some(errors) = body.get("errors") {
            return Err(PlatformError::Protocol(errors.to_string()));
        }
        body.get("data")
            .cloned()
            .ok_or_else(|| PlatformError::Protocol("response has no data".to_string()))
    }

    async fn ensure_repo_info(&self) -> PlatformResult<RepoInfo> {
        if let Some(info) = self.info.read().await.clone() {
            return Ok(info);
        }

        let data = self
            .graphql(
                REPO_INFO_QUERY,
                json!({ "owner": self.owner, "name": self.name }),
            )
            .await?;
        let repo = &data["repository"];
        let repo_id = repo["id"]
            .as_str()
            .ok_or_else(|| PlatformError::Protocol("repository id missing".to_string()))?
            .to_string();
        let categories = repo["discussionCategories"]["nodes"]
            .as_array()
            .map(|nodes| {
                nodes
                    .iter()
                    .filter_map(|c| {
                        Some((
                            c["name"].as_str()?.to_string(),
                            c["id"].as_str()?.to_string(),
                        ))
                    })
                    .collect()
            })
            .unwrap_or_default();

        let info = RepoInfo {
            repo_id,
            categories,
        };
        info!("connected to {}/{}", self.owner, self.name);
        *self.info.write().await = Some(info.clone());
        Ok(info)
    }

    fn pick_category(info: &RepoInfo) -> PlatformResult<String> {
        for preferred in ["Proposals", "General"] {
            if let Some((_, id)) = info.categories.iter().find(|(name, _)| name == preferred) {
                return Ok(id.clone());
            }
        }
        info.categories
            .first()
            .map(|(_, id)| id.clone())
            .ok_or(PlatformError::NoCategory)
    }
}

fn parse_timestamp(value: &Value) -> u64 {
    value
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.timestamp().max(0) as u64)
        .unwrap_or(0)
}

fn author_login(value: &Value) -> String {
    value["login"]
        .as_str()
        .unwrap_or("unknown")
        .to_string()
}

#[async_trait]
impl DiscussionPlatform for GitHubPlatform {
    async fn fetch_discussions(&self) -> PlatformResult<Vec<Discussion>> {
        let data = self
            .graphql(
                DISCUSSIONS_QUERY,
                json!({ "owner": self.owner, "name": self.name }),
            )
            .await?;

        let nodes = data["repository"]["discussions"]["nodes"]
            .as_array()
            .cloned()
            .unwrap_or_default();

        let mut discussions = Vec::with_capacity(nodes.len());
        for node in nodes {
            let comments = node["comments"]["nodes"]
                .as_array()
                .map(|comments| {
                    comments
                        .iter()
                        .map(|c| Comment {
                            author: author_login(&c["author"]),
                            body: c["body"].as_str().unwrap_or_default().to_string(),
                            created_at: parse_timestamp(&c["createdAt"]),
                        })
                        .collect()
                })
                .unwrap_or_default();

            discussions.push(Discussion {
                id: node["id"].as_str().unwrap_or_default().to_string(),
                number: node["number"].as_u64().unwrap_or(0),
                title: node["title"].as_str().unwrap_or_default().to_string(),
                author: author_login(&node["author"]),
                body: node["body"].as_str().unwrap_or_default().to_string(),
                created_at: parse_timestamp(&node["createdAt"]),
                comments,
            });
        }

        debug!("fetched {} discussions", discussions.len());
        Ok(discussions)
    }

    async fn post_comment(&self, discussion_id: &str, body: &str) -> PlatformResult<()> {
        self.graphql(
            ADD_COMMENT_MUTATION,
            json!({ "discussionId": discussion_id, "body": body }),
        )
        .await?;
        info!("posted comment to {discussion_id}");
        Ok(())
    }

    async fn create_discussion(&self, title: &str, body: &str) -> PlatformResult<String> {
        let info = self.ensure_repo_info().await?;
        let category_id = Self::pick_category(&info)?;

        let data = self
            .graphql(
                CREATE_DISCUSSION_MUTATION,
                json!({
                    "repoId": info.repo_id,
                    "categoryId": category_id,
                    "title": title,
                    "body": body,
                }),
            )
            .await?;

        let discussion = &data["createDiscussion"]["discussion"];
        let id = discussion["id"]
            .as_str()
            .ok_or_else(|| PlatformError::Protocol("created discussion has no id".to_string()))?
            .to_string();
        info!(
            "created discussion #{}",
            discussion["number"].as_u64().unwrap_or(0)
        );
        Ok(id)
    }
}
