//! Node identity
//!
//! A node acts under one participant identity: the platform handle its
//! posts and votes are attributed to. Vote deduplication keys on this
//! handle, so it must be stable across invocations.

use serde::{Deserialize, Serialize};

/// The participant identity a node posts and votes as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeIdentity {
    /// Display name used in prompts and log output.
    pub name: String,
    /// Platform handle votes are attributed to.
    pub handle: String,
}

impl NodeIdentity {
    pub fn new(name: impl Into<String>, handle: impl Into<String>) -> Self {
        NodeIdentity {
            name: name.into(),
            handle: handle.into(),
        }
    }
}
