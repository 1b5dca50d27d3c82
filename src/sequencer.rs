//! Sequential chats
//!
//! A [`ChatSequencer`] runs an ordered list of [`ChatSpec`]s against a shared
//! initiating agent, carrying each step's result into the next: a step's
//! opening message is either a literal string, used unmodified, or a function
//! of the previous results, which is how summary chaining is expressed.
//!
//! The caller always receives one [`ChatResult`] per attempted step. Under
//! the default error policy a collaborator failure in step *i* aborts the
//! remaining steps and returns the partial sequence; `FailFast` propagates
//! the failure instead.

use std::sync::Arc;
use tracing::{info, warn};

use crate::agent::Conversable;
use crate::chat::{Chat, ChatResult, CompletionReason, SummaryMethod};
use crate::error::{ChatError, Result};
use crate::items::Message;

/// Context handed to a computed opening message.
pub struct StepContext<'a> {
    /// Result of the immediately preceding step, if any.
    pub previous: Option<&'a ChatResult>,
    /// All results so far, in step order.
    pub results: &'a [ChatResult],
    /// History that triggered the sequence, when run from a nested chat.
    pub trigger_history: &'a [Message],
}

impl StepContext<'_> {
    /// The previous step's summary, or empty when absent.
    pub fn previous_summary(&self) -> &str {
        self.previous
            .and_then(|r| r.summary.as_deref())
            .unwrap_or("")
    }

    /// Content of the message that triggered the sequence, or empty.
    pub fn trigger_content(&self) -> &str {
        self.trigger_history
            .last()
            .map(|m| m.content.as_str())
            .unwrap_or("")
    }
}

/// Opening message of a chat step: a literal, or computed from what came
/// before. The `Computed` variant must be resolved before a spec can be
/// persisted.
#[derive(Clone)]
pub enum OpeningMessage {
    Literal(String),
    Computed(Arc<dyn Fn(&StepContext<'_>) -> String + Send + Sync>),
}

impl OpeningMessage {
    pub fn computed<F>(f: F) -> Self
    where
        F: Fn(&StepContext<'_>) -> String + Send + Sync + 'static,
    {
        OpeningMessage::Computed(Arc::new(f))
    }

    fn resolve(&self, ctx: &StepContext<'_>) -> String {
        match self {
            OpeningMessage::Literal(text) => text.clone(),
            OpeningMessage::Computed(f) => f(ctx),
        }
    }
}

impl From<&str> for OpeningMessage {
    fn from(text: &str) -> Self {
        OpeningMessage::Literal(text.to_string())
    }
}

impl From<String> for OpeningMessage {
    fn from(text: String) -> Self {
        OpeningMessage::Literal(text)
    }
}

/// Declarative description of one chat step. Consumed once by the sequencer.
#[derive(Clone)]
pub struct ChatSpec {
    pub recipient: Arc<dyn Conversable>,
    pub message: OpeningMessage,
    pub max_turns: usize,
    pub summary_method: SummaryMethod,
}

impl ChatSpec {
    pub fn new(recipient: Arc<dyn Conversable>, message: impl Into<OpeningMessage>) -> Self {
        Self {
            recipient,
            message: message.into(),
            max_turns: 10,
            summary_method: SummaryMethod::default(),
        }
    }

    pub fn max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns;
        self
    }

    pub fn summary_method(mut self, method: SummaryMethod) -> Self {
        self.summary_method = method;
        self
    }
}

/// What to do when a step fails on the collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Abort remaining steps and return the partial result sequence.
    #[default]
    ReturnPartial,
    /// Propagate the failure to the caller.
    FailFast,
}

/// Runs chat specs in order against a shared initiator.
pub struct ChatSequencer {
    initiator: Arc<dyn Conversable>,
    error_policy: ErrorPolicy,
}

impl ChatSequencer {
    pub fn new(initiator: Arc<dyn Conversable>) -> Self {
        Self {
            initiator,
            error_policy: ErrorPolicy::default(),
        }
    }

    pub fn error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.error_policy = policy;
        self
    }

    /// Run all specs in order, returning one result per attempted step.
    pub async fn run(&self, specs: &[ChatSpec]) -> Result<Vec<ChatResult>> {
        self.run_with_history(specs, &[]).await
    }

    /// Like [`ChatSequencer::run`], with the triggering history exposed to
    /// computed opening messages. Used by nested chats.
    pub async fn run_with_history(
        &self,
        specs: &[ChatSpec],
        trigger_history: &[Message],
    ) -> Result<Vec<ChatResult>> {
        let mut results: Vec<ChatResult> = Vec::with_capacity(specs.len());

        for (step, spec) in specs.iter().enumerate() {
            let opening = {
                let ctx = StepContext {
                    previous: results.last(),
                    results: &results,
                    trigger_history,
                };
                spec.message.resolve(&ctx)
            };

            info!(step, recipient = %spec.recipient.name(), "running chat step");

            let chat = Chat::new(self.initiator.clone(), spec.recipient.clone())
                .max_turns(spec.max_turns)
                .summary_method(spec.summary_method);
            let result = chat.run(opening).await;

            let failure = match &result.reason {
                CompletionReason::CollaboratorFailure(message) => Some(message.clone()),
                _ => None,
            };
            results.push(result);

            if let Some(message) = failure {
                warn!(step, %message, "chat step failed");
                match self.error_policy {
                    ErrorPolicy::FailFast => {
                        return Err(ChatError::Other(format!(
                            "chat step {} failed: {}",
                            step, message
                        )));
                    }
                    ErrorPolicy::ReturnPartial => break,
                }
            }
        }

        Ok(results)
    }
}
