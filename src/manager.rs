//! Group chat manager
//!
//! [`GroupChatManager`] wraps a [`GroupChat`] behind the
//! [`Conversable`] interface so a whole group can stand where a single agent
//! is expected: as one leg of a two-party [`Chat`](crate::chat::Chat), as a
//! step recipient in a sequencer, or inside a nested chat tree. Its reply is
//! the final message of the group's transcript, re-attributed to the manager.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::agent::{Conversable, Reply};
use crate::chat::CompletionReason;
use crate::config::ModelSettings;
use crate::error::{ChatError, Result};
use crate::group::GroupChat;
use crate::items::Message;
use crate::model::ModelProvider;
use crate::usage::Usage;

/// An agent whose replies come from driving an enclosed group chat.
pub struct GroupChatManager {
    name: String,
    description: String,
    group: GroupChat,
}

impl GroupChatManager {
    pub fn new(name: impl Into<String>, group: GroupChat) -> Self {
        Self {
            name: name.into(),
            description: "Coordinates a group chat and reports its outcome.".to_string(),
            group,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn group(&self) -> &GroupChat {
        &self.group
    }
}

#[async_trait]
impl Conversable for GroupChatManager {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    /// The group's selector doubles as this participant's provider, so outer
    /// chats can compute reflection summaries over a managed group.
    fn provider(&self) -> Option<Arc<dyn ModelProvider>> {
        self.group.selector_client().map(|(p, _)| p)
    }

    fn settings(&self) -> ModelSettings {
        self.group
            .selector_client()
            .map(|(_, s)| s)
            .unwrap_or_default()
    }

    async fn reply(&self, history: &[Message], sender: &str) -> Result<Reply> {
        debug!(manager = %self.name, from = %sender, "running enclosed group chat");

        let result = self.group.run(history.to_vec()).await?;

        if let CompletionReason::CollaboratorFailure(message) = &result.reason {
            return Err(ChatError::Other(format!(
                "group chat under {} failed: {}",
                self.name, message
            )));
        }

        let content = result
            .last_message()
            .map(|m| m.content.clone())
            .unwrap_or_default();

        Ok(Reply {
            messages: vec![Message::assistant(self.name.clone(), content)],
            usage: Usage::empty(),
            cost: result.cost.unwrap_or(0.0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::Agent;
    use crate::chat::Chat;
    use crate::group::SpeakerSelection;
    use pretty_assertions::assert_eq;

    fn fixed(name: &str, reply: &str) -> Arc<dyn Conversable> {
        Arc::new(Agent::fixed(name, reply))
    }

    fn round_robin_group(replies: &[(&str, &str)], max_round: usize) -> GroupChat {
        GroupChat::new(replies.iter().map(|(n, r)| fixed(n, r)).collect())
            .speaker_selection(SpeakerSelection::RoundRobin)
            .max_round(max_round)
    }

    #[tokio::test]
    async fn test_manager_reply_is_final_group_message() {
        let manager = GroupChatManager::new(
            "chat_manager",
            round_robin_group(&[("a", "first"), ("b", "final word")], 2),
        );

        let history = vec![Message::user("outside", "discuss")];
        let reply = manager.reply(&history, "outside").await.unwrap();

        assert_eq!(reply.messages.len(), 1);
        let msg = &reply.messages[0];
        assert_eq!(msg.sender, "chat_manager");
        assert_eq!(msg.content, "final word");
    }

    #[tokio::test]
    async fn test_manager_nests_inside_two_party_chat() {
        let manager = Arc::new(GroupChatManager::new(
            "chat_manager",
            round_robin_group(&[("planner", "plan drafted"), ("critic", "plan approved")], 2),
        )) as Arc<dyn Conversable>;
        let asker = fixed("asker", "thanks");

        let result = Chat::new(asker, manager).max_turns(2).run("make a plan").await;

        assert_eq!(result.transcript.len(), 2);
        assert_eq!(result.transcript[1].sender, "chat_manager");
        assert_eq!(result.summary, Some("plan approved".to_string()));
    }

    #[tokio::test]
    async fn test_manager_empty_roster_surfaces_error() {
        let manager = GroupChatManager::new("chat_manager", GroupChat::new(vec![]));
        let history = vec![Message::user("outside", "discuss")];
        assert!(manager.reply(&history, "outside").await.is_err());
    }
}
