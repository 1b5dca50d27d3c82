//! Two-party chat run loop
//!
//! A [`Chat`] drives an initiator and a recipient turn by turn: the current
//! speaker emits a message, the termination policy is evaluated, the human
//! override checkpoint runs when armed, then the speaker flips. Reaching
//! `max_turns` ends the chat unconditionally, regardless of the predicate.
//!
//! Every error raised inside the loop is recovered here: the caller always
//! gets a [`ChatResult`], possibly with a partial transcript and a
//! `CollaboratorFailure` reason, never a propagated fault.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::agent::Conversable;
use crate::error::ChatError;
use crate::human::HumanInputMode;
use crate::items::{Message, Transcript};
use crate::model::ModelProvider;
use crate::termination::TerminationPolicy;
use crate::usage::Usage;

/// Fixed instruction used by `ReflectionWithLlm` summaries.
const REFLECTION_PROMPT: &str =
    "Summarize the takeaway from the conversation. Do not add any introductory phrases.";

/// How a chat's summary is computed on completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SummaryMethod {
    /// The final message's content, verbatim.
    #[default]
    LastMsg,
    /// Ask the collaborator to reflect over the full transcript.
    ReflectionWithLlm,
}

/// Why a chat reached its terminal state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionReason {
    /// The configured turn budget ran out.
    MaxTurns,
    /// A termination predicate fired (and no human overrode it).
    Predicate,
    /// A human supplied an empty reply under ALWAYS mode.
    HumanAbort,
    /// The collaborator failed mid-chat; the transcript is partial.
    CollaboratorFailure(String),
}

/// Read-only record of a completed chat.
#[derive(Debug, Clone)]
pub struct ChatResult {
    pub transcript: Transcript,
    pub summary: Option<String>,
    pub cost: Option<f64>,
    pub reason: CompletionReason,
}

impl ChatResult {
    pub fn last_message(&self) -> Option<&Message> {
        self.transcript.last()
    }
}

/// A bounded exchange between two participants.
pub struct Chat {
    initiator: Arc<dyn Conversable>,
    recipient: Arc<dyn Conversable>,
    max_turns: usize,
    summary_method: SummaryMethod,
    termination: Option<Arc<dyn TerminationPolicy>>,
}

impl Chat {
    pub fn new(initiator: Arc<dyn Conversable>, recipient: Arc<dyn Conversable>) -> Self {
        Self {
            initiator,
            recipient,
            max_turns: 10,
            summary_method: SummaryMethod::default(),
            termination: None,
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

    /// Chat-level termination policy, OR-combined with each receiver's own
    /// predicate.
    pub fn termination(mut self, policy: Arc<dyn TerminationPolicy>) -> Self {
        self.termination = Some(policy);
        self
    }

    /// Run the chat to a terminal state. The opening message is turn 1.
    pub async fn run(&self, opening_message: impl Into<String>) -> ChatResult {
        let opening = opening_message.into();
        info!(
            initiator = %self.initiator.name(),
            recipient = %self.recipient.name(),
            "starting chat"
        );

        let mut transcript: Transcript = vec![Message::user(self.initiator.name(), opening)];
        let mut turns = 1usize;
        let mut usage = Usage::empty();
        let mut cost = 0.0f64;

        // The initiator spoke first; the recipient goes next.
        let mut speaker: &Arc<dyn Conversable> = &self.initiator;
        let mut responder: &Arc<dyn Conversable> = &self.recipient;

        let reason = loop {
            if turns >= self.max_turns {
                break CompletionReason::MaxTurns;
            }

            let last = transcript.last().expect("non-empty transcript");
            let predicate_fired = responder.is_termination_msg(last)
                || self
                    .termination
                    .as_ref()
                    .is_some_and(|p| p.should_terminate(last));

            if predicate_fired {
                match self.consult_override(responder, &mut transcript).await {
                    Some(true) => {
                        turns += 1;
                        std::mem::swap(&mut speaker, &mut responder);
                        continue;
                    }
                    _ => break CompletionReason::Predicate,
                }
            }

            debug!(turn = turns + 1, speaker = %responder.name(), "next turn");

            match self.produce_turn(speaker, responder, &mut transcript).await {
                Ok(Some((turn_usage, turn_cost))) => {
                    usage.add_usage(&turn_usage);
                    cost += turn_cost;
                }
                Ok(None) => break CompletionReason::HumanAbort,
                Err(e) => {
                    warn!(error = %e, "chat ended on collaborator failure");
                    break CompletionReason::CollaboratorFailure(e.to_string());
                }
            }

            turns += 1;
            std::mem::swap(&mut speaker, &mut responder);
        };

        info!(turns, reason = ?reason, "chat finished");

        let (summary, summary_accounting) = self.summarize(&transcript, &reason).await;
        if let Some((extra_usage, extra_cost)) = summary_accounting {
            usage.add_usage(&extra_usage);
            cost += extra_cost;
        }

        ChatResult {
            transcript,
            summary,
            cost: (usage.request_count > 0 || cost > 0.0).then_some(cost),
            reason,
        }
    }

    /// Produce the responder's turn and append it.
    ///
    /// Returns `Ok(None)` when an ALWAYS-mode human forced termination.
    async fn produce_turn(
        &self,
        speaker: &Arc<dyn Conversable>,
        responder: &Arc<dyn Conversable>,
        transcript: &mut Transcript,
    ) -> Result<Option<(Usage, f64)>, ChatError> {
        if responder.human_input_mode() == HumanInputMode::Always {
            if let Some(source) = responder.human_input() {
                let prompt = format!(
                    "As {}, reply to {} (empty to end the conversation): ",
                    responder.name(),
                    speaker.name()
                );
                let text = source.request_input(&prompt).await?;
                if text.trim().is_empty() {
                    return Ok(None);
                }
                transcript.push(Message::user(responder.name(), text));
                return Ok(Some((Usage::empty(), 0.0)));
            }
            warn!(agent = %responder.name(), "ALWAYS input mode without an input source");
        }

        let reply = responder.reply(transcript, speaker.name()).await?;
        let accounting = (reply.usage.clone(), reply.cost);
        transcript.extend(reply.messages);
        Ok(Some(accounting))
    }

    /// TERMINATE_ONLY checkpoint: give the responder's human a chance to keep
    /// the chat alive. Returns `Some(true)` when a non-empty reply was
    /// appended, `Some(false)` or `None` when termination stands.
    async fn consult_override(
        &self,
        responder: &Arc<dyn Conversable>,
        transcript: &mut Transcript,
    ) -> Option<bool> {
        if responder.human_input_mode() != HumanInputMode::TerminateOnly {
            return None;
        }
        let source = responder.human_input()?;
        let prompt = format!(
            "The chat is about to end. As {}, reply to continue (empty to confirm): ",
            responder.name()
        );
        match source.request_input(&prompt).await {
            Ok(text) if !text.trim().is_empty() => {
                transcript.push(Message::user(responder.name(), text));
                Some(true)
            }
            Ok(_) => Some(false),
            Err(e) => {
                warn!(error = %e, "human input failed at override checkpoint");
                Some(false)
            }
        }
    }

    async fn summarize(
        &self,
        transcript: &Transcript,
        reason: &CompletionReason,
    ) -> (Option<String>, Option<(Usage, f64)>) {
        // A failed chat degrades to a null summary.
        if matches!(reason, CompletionReason::CollaboratorFailure(_)) {
            return (None, None);
        }

        match self.summary_method {
            SummaryMethod::LastMsg => (transcript.last().map(|m| m.content.clone()), None),
            SummaryMethod::ReflectionWithLlm => {
                let Some((provider, settings)) = self.reflection_client() else {
                    warn!("no provider available for reflection summary");
                    return (transcript.last().map(|m| m.content.clone()), None);
                };

                let mut messages = vec![Message::system(REFLECTION_PROMPT)];
                for msg in transcript {
                    messages.push(Message::user(msg.sender.clone(), msg.content.clone()));
                }

                match provider.complete(messages, vec![], &settings).await {
                    Ok((response, usage)) => {
                        let cost = usage.estimate_cost(&settings.model);
                        (response.content, Some((usage, cost)))
                    }
                    Err(e) => {
                        warn!(error = %e, "reflection summary failed");
                        (None, None)
                    }
                }
            }
        }
    }

    fn reflection_client(&self) -> Option<(Arc<dyn ModelProvider>, crate::config::ModelSettings)> {
        if let Some(p) = self.recipient.provider() {
            return Some((p, self.recipient.settings()));
        }
        self.initiator
            .provider()
            .map(|p| (p, self.initiator.settings()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::Agent;
    use crate::config::ModelSettings;
    use crate::human::QueuedInput;
    use crate::model::ScriptedProvider;
    use crate::termination;
    use pretty_assertions::assert_eq;

    fn assistant(name: &str, provider: ScriptedProvider) -> Arc<dyn Conversable> {
        Arc::new(Agent::assistant(
            name,
            "test agent",
            Arc::new(provider),
            ModelSettings::default(),
        ))
    }

    #[tokio::test]
    async fn test_max_turns_bounds_the_chat() {
        let a = Arc::new(Agent::fixed("A", "ping")) as Arc<dyn Conversable>;
        let b = Arc::new(Agent::fixed("B", "pong")) as Arc<dyn Conversable>;

        let result = Chat::new(a, b).max_turns(2).run("start").await;
        assert_eq!(result.reason, CompletionReason::MaxTurns);
        assert_eq!(result.transcript.len(), 2);
    }

    #[tokio::test]
    async fn test_last_msg_summary_is_verbatim() {
        let a = Arc::new(Agent::fixed("A", "ping")) as Arc<dyn Conversable>;
        let b = Arc::new(Agent::fixed("B", "pong")) as Arc<dyn Conversable>;

        let result = Chat::new(a, b).max_turns(2).run("start").await;
        assert_eq!(result.summary, Some("pong".to_string()));
    }

    #[tokio::test]
    async fn test_contains_token_stops_within_one_round() {
        let a = Arc::new(Agent::fixed("A", "fine, TERMINATE")) as Arc<dyn Conversable>;
        let b = Arc::new(Agent::fixed("B", "keep going")) as Arc<dyn Conversable>;

        let result = Chat::new(a, b)
            .max_turns(20)
            .termination(Arc::new(termination::contains_token("terminate")))
            .run("start")
            .await;

        assert_eq!(result.reason, CompletionReason::Predicate);
        assert!(result.transcript.len() <= 3);
    }

    #[tokio::test]
    async fn test_receiver_predicate_checked_on_opening_message() {
        let a = Arc::new(Agent::fixed("A", "unused")) as Arc<dyn Conversable>;
        let b = Arc::new(
            Agent::fixed("B", "unused")
                .with_termination(Arc::new(termination::contains_token("elephant"))),
        ) as Arc<dyn Conversable>;

        let result = Chat::new(a, b).max_turns(10).run("is it an ELEPHANT?").await;
        assert_eq!(result.reason, CompletionReason::Predicate);
        assert_eq!(result.transcript.len(), 1);
    }

    #[tokio::test]
    async fn test_always_mode_empty_input_is_human_abort() {
        let human = Arc::new(
            Agent::user_proxy("human_proxy")
                .with_human_input_mode(crate::human::HumanInputMode::Always)
                .with_human_input(Arc::new(QueuedInput::new(vec![""]))),
        ) as Arc<dyn Conversable>;
        let bot = Arc::new(Agent::fixed("bot", "guess again")) as Arc<dyn Conversable>;

        let result = Chat::new(human, bot).max_turns(50).run("Parrot").await;
        assert_eq!(result.reason, CompletionReason::HumanAbort);
    }

    #[tokio::test]
    async fn test_always_mode_human_message_substitutes_reply() {
        let human = Arc::new(
            Agent::user_proxy("human_proxy")
                .with_human_input_mode(crate::human::HumanInputMode::Always)
                .with_human_input(Arc::new(QueuedInput::new(vec!["is it big?", ""]))),
        ) as Arc<dyn Conversable>;
        let bot = Arc::new(Agent::fixed("bot", "yes")) as Arc<dyn Conversable>;

        let result = Chat::new(human, bot).max_turns(50).run("Parrot").await;
        assert_eq!(result.reason, CompletionReason::HumanAbort);
        assert!(result
            .transcript
            .iter()
            .any(|m| m.content == "is it big?" && m.sender == "human_proxy"));
    }

    #[tokio::test]
    async fn test_terminate_only_override_continues_chat() {
        let stopper = Arc::new(Agent::fixed("stopper", "TERMINATE")) as Arc<dyn Conversable>;
        let overrider = Arc::new(
            Agent::fixed("overrider", "as you wish")
                .with_termination(Arc::new(termination::contains_token("TERMINATE")))
                .with_human_input_mode(crate::human::HumanInputMode::TerminateOnly)
                .with_human_input(Arc::new(QueuedInput::new(vec!["actually, continue"]))),
        ) as Arc<dyn Conversable>;

        let result = Chat::new(stopper, overrider).max_turns(6).run("hello").await;

        // The override message entered the transcript and the chat went on
        // past the first predicate hit.
        assert!(result
            .transcript
            .iter()
            .any(|m| m.content == "actually, continue"));
        assert!(result.transcript.len() > 2);
    }

    #[tokio::test]
    async fn test_terminate_only_empty_input_confirms_predicate() {
        let stopper = Arc::new(Agent::fixed("stopper", "TERMINATE")) as Arc<dyn Conversable>;
        let confirmer = Arc::new(
            Agent::fixed("confirmer", "unused")
                .with_termination(Arc::new(termination::contains_token("TERMINATE")))
                .with_human_input_mode(crate::human::HumanInputMode::TerminateOnly)
                .with_human_input(Arc::new(QueuedInput::new(vec![""]))),
        ) as Arc<dyn Conversable>;

        let result = Chat::new(stopper, confirmer).max_turns(6).run("hello").await;
        // Opening "hello" does not fire; stopper's TERMINATE does.
        assert_eq!(result.reason, CompletionReason::Predicate);
    }

    #[tokio::test]
    async fn test_collaborator_failure_yields_partial_result() {
        let failing = ScriptedProvider::new().with_failure(ChatError::Unreachable {
            message: "connection refused".to_string(),
        });
        let a = Arc::new(Agent::fixed("A", "unused")) as Arc<dyn Conversable>;
        let b = assistant("B", failing);

        let result = Chat::new(a, b).max_turns(5).run("start").await;
        assert!(matches!(
            result.reason,
            CompletionReason::CollaboratorFailure(_)
        ));
        assert_eq!(result.transcript.len(), 1);
        assert_eq!(result.summary, None);
    }

    #[tokio::test]
    async fn test_reflection_summary_uses_provider() {
        let provider = ScriptedProvider::new()
            .with_message("pong")
            .with_message("a short game of ping pong");
        let a = Arc::new(Agent::fixed("A", "ping")) as Arc<dyn Conversable>;
        let b = assistant("B", provider);

        let result = Chat::new(a, b)
            .max_turns(2)
            .summary_method(SummaryMethod::ReflectionWithLlm)
            .run("serve")
            .await;

        assert_eq!(result.summary, Some("a short game of ping pong".to_string()));
        assert!(result.cost.is_some());
    }

    #[tokio::test]
    async fn test_reflection_failure_degrades_to_null_summary() {
        let provider = ScriptedProvider::new()
            .with_message("pong")
            .with_failure(ChatError::RateLimited {
                message: "slow down".to_string(),
            });
        let a = Arc::new(Agent::fixed("A", "ping")) as Arc<dyn Conversable>;
        let b = assistant("B", provider);

        let result = Chat::new(a, b)
            .max_turns(2)
            .summary_method(SummaryMethod::ReflectionWithLlm)
            .run("serve")
            .await;

        assert_eq!(result.summary, None);
        assert_eq!(result.reason, CompletionReason::MaxTurns);
    }
}
