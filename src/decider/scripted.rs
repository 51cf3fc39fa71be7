//! Scripted decider
//!
//! Returns a queued sequence of actions, then noop. Used by tests to
//! drive the node deterministically without a provider.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{ActionDecider, DeciderResult, DeciderSnapshot, NodeAction};

#[derive(Default)]
pub struct ScriptedDecider {
    actions: Mutex<VecDeque<NodeAction>>,
}

impl ScriptedDecider {
    pub fn new(actions: impl IntoIterator<Item = NodeAction>) -> Self {
        ScriptedDecider {
            actions: Mutex::new(actions.into_iter().collect()),
        }
    }
}

#[async_trait]
impl ActionDecider for ScriptedDecider {
    async fn decide(&self, _snapshot: &DeciderSnapshot) -> DeciderResult<NodeAction> {
        Ok(self
            .actions
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(NodeAction::Noop))
    }
}
