//! Nested chats
//!
//! [`NestedChats`] attaches a fixed list of [`ChatSpec`]s to a trigger agent.
//! Whenever the trigger receives a message from an enclosing chat, a local
//! [`ChatSequencer`] runs the attached specs over that history and only the
//! final step's summary comes back, as if it were the trigger agent's own
//! single reply. The enclosing orchestration sees one message, not N.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::agent::{Conversable, Reply};
use crate::config::ModelSettings;
use crate::error::Result;
use crate::human::{HumanInput, HumanInputMode};
use crate::items::Message;
use crate::model::ModelProvider;
use crate::sequencer::{ChatSequencer, ChatSpec};
use crate::usage::Usage;

/// A trigger agent with an attached sub-sequence of chats.
pub struct NestedChats {
    trigger: Arc<dyn Conversable>,
    specs: Vec<ChatSpec>,
}

impl NestedChats {
    /// Attach `specs` to `trigger`. The returned value is itself an agent and
    /// substitutes for the trigger everywhere.
    pub fn attach(trigger: Arc<dyn Conversable>, specs: Vec<ChatSpec>) -> Self {
        Self { trigger, specs }
    }
}

#[async_trait]
impl Conversable for NestedChats {
    fn name(&self) -> &str {
        self.trigger.name()
    }

    fn description(&self) -> &str {
        self.trigger.description()
    }

    fn human_input_mode(&self) -> HumanInputMode {
        self.trigger.human_input_mode()
    }

    fn human_input(&self) -> Option<Arc<dyn HumanInput>> {
        self.trigger.human_input()
    }

    fn provider(&self) -> Option<Arc<dyn ModelProvider>> {
        self.trigger.provider()
    }

    fn settings(&self) -> ModelSettings {
        self.trigger.settings()
    }

    fn is_termination_msg(&self, message: &Message) -> bool {
        self.trigger.is_termination_msg(message)
    }

    async fn reply(&self, history: &[Message], sender: &str) -> Result<Reply> {
        debug!(
            trigger = %self.trigger.name(),
            steps = self.specs.len(),
            from = %sender,
            "running nested chats"
        );

        let sequencer = ChatSequencer::new(self.trigger.clone());
        let results = sequencer.run_with_history(&self.specs, history).await?;

        let summary = results
            .last()
            .and_then(|r| r.summary.clone())
            .unwrap_or_default();
        let cost = results.iter().filter_map(|r| r.cost).sum::<f64>();

        Ok(Reply {
            messages: vec![Message::assistant(self.trigger.name(), summary)],
            usage: Usage::empty(),
            cost,
        })
    }
}
