//! Group chat orchestration and speaker selection
//!
//! A [`GroupChat`] holds an ordered roster of participants and a shared
//! transcript. Each round, a speaker is chosen by the configured
//! [`SpeakerSelection`] strategy, produces its turn, and the transcript grows
//! by that turn; there is no mid-round exit once a speaker has begun
//! replying.
//!
//! The default `Auto` strategy asks a selector model to name the next
//! speaker. Any output that does not match a roster name falls back to
//! deterministic round-robin (roster order after the previous speaker) for
//! that round; malformed selector output must never crash the chat.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::agent::Conversable;
use crate::chat::{ChatResult, CompletionReason};
use crate::config::ModelSettings;
use crate::error::{ChatError, Result};
use crate::human::HumanInputMode;
use crate::items::{Message, Transcript};
use crate::model::ModelProvider;
use crate::termination::TerminationPolicy;
use crate::usage::Usage;

/// Strategy for choosing the next speaker each round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpeakerSelection {
    /// Ask the selector model; fall back to round-robin on any mismatch.
    #[default]
    Auto,
    /// Deterministic roster order.
    RoundRobin,
}

/// N agents sharing one transcript, driven round by round.
pub struct GroupChat {
    agents: Vec<Arc<dyn Conversable>>,
    max_round: usize,
    selection: SpeakerSelection,
    selector: Option<Arc<dyn ModelProvider>>,
    selector_settings: ModelSettings,
    send_introductions: bool,
    termination: Option<Arc<dyn TerminationPolicy>>,
}

impl GroupChat {
    pub fn new(agents: Vec<Arc<dyn Conversable>>) -> Self {
        Self {
            agents,
            max_round: 10,
            selection: SpeakerSelection::default(),
            selector: None,
            selector_settings: ModelSettings::default(),
            send_introductions: false,
            termination: None,
        }
    }

    pub fn max_round(mut self, max_round: usize) -> Self {
        self.max_round = max_round;
        self
    }

    pub fn speaker_selection(mut self, selection: SpeakerSelection) -> Self {
        self.selection = selection;
        self
    }

    /// Selector model used by [`SpeakerSelection::Auto`].
    pub fn selector(mut self, provider: Arc<dyn ModelProvider>, settings: ModelSettings) -> Self {
        self.selector = Some(provider);
        self.selector_settings = settings;
        self
    }

    /// Prepend a synthetic system message introducing every agent before
    /// round 1. Visible to all agents, not counted toward `max_round`.
    pub fn send_introductions(mut self, enabled: bool) -> Self {
        self.send_introductions = enabled;
        self
    }

    pub fn termination(mut self, policy: Arc<dyn TerminationPolicy>) -> Self {
        self.termination = Some(policy);
        self
    }

    pub fn agents(&self) -> &[Arc<dyn Conversable>] {
        &self.agents
    }

    pub(crate) fn selector_client(&self) -> Option<(Arc<dyn ModelProvider>, ModelSettings)> {
        self.selector
            .clone()
            .map(|p| (p, self.selector_settings.clone()))
    }

    fn introductions(&self) -> Message {
        let mut content = String::from(
            "Hello everyone. We have assembled a team today to answer questions and solve tasks. \
             In attendance are:\n",
        );
        for agent in &self.agents {
            content.push_str(&format!("\n{}: {}", agent.name(), agent.description()));
        }
        Message::system(content)
    }

    /// Run the group over the seed messages until a terminal state.
    ///
    /// Fails only on an empty roster; every runtime failure is recovered into
    /// the returned [`ChatResult`].
    pub async fn run(&self, seed: Transcript) -> Result<ChatResult> {
        if self.agents.is_empty() {
            return Err(ChatError::EmptyRoster);
        }

        info!(
            agents = self.agents.len(),
            max_round = self.max_round,
            "starting group chat"
        );

        let mut transcript: Transcript = Vec::new();
        if self.send_introductions {
            transcript.push(self.introductions());
        }
        transcript.extend(seed);

        let mut round = 0usize;
        let mut usage = Usage::empty();
        let mut cost = 0.0f64;
        let mut last_speaker: Option<usize> = None;

        let reason = loop {
            if round >= self.max_round {
                break CompletionReason::MaxTurns;
            }

            let idx = self.select_speaker(&transcript, last_speaker).await;
            let speaker = &self.agents[idx];
            debug!(round = round + 1, speaker = %speaker.name(), "selected speaker");

            let sender = transcript
                .last()
                .map(|m| m.sender.clone())
                .unwrap_or_else(|| "user".to_string());

            if speaker.human_input_mode() == HumanInputMode::Always {
                if let Some(source) = speaker.human_input() {
                    let prompt = format!(
                        "As {}, reply to the group (empty to end the conversation): ",
                        speaker.name()
                    );
                    match source.request_input(&prompt).await {
                        Ok(text) if text.trim().is_empty() => break CompletionReason::HumanAbort,
                        Ok(text) => transcript.push(Message::user(speaker.name(), text)),
                        Err(e) => break CompletionReason::CollaboratorFailure(e.to_string()),
                    }
                    round += 1;
                    last_speaker = Some(idx);
                    continue;
                }
            }

            match speaker.reply(&transcript, &sender).await {
                Ok(reply) => {
                    usage.add_usage(&reply.usage);
                    cost += reply.cost;
                    transcript.extend(reply.messages);
                }
                Err(e) => {
                    warn!(speaker = %speaker.name(), error = %e, "group chat ended on failure");
                    break CompletionReason::CollaboratorFailure(e.to_string());
                }
            }

            round += 1;
            last_speaker = Some(idx);

            // Termination is evaluated only after the reply completed.
            let last = transcript.last().expect("non-empty transcript");
            let fired = self
                .termination
                .as_ref()
                .is_some_and(|p| p.should_terminate(last))
                || self.agents.iter().any(|a| a.is_termination_msg(last));
            if fired {
                break CompletionReason::Predicate;
            }
        };

        info!(rounds = round, reason = ?reason, "group chat finished");

        let summary = if matches!(reason, CompletionReason::CollaboratorFailure(_)) {
            None
        } else {
            transcript.last().map(|m| m.content.clone())
        };

        Ok(ChatResult {
            transcript,
            summary,
            cost: (usage.request_count > 0 || cost > 0.0).then_some(cost),
            reason,
        })
    }

    /// Pick the next speaker index.
    async fn select_speaker(&self, transcript: &Transcript, last: Option<usize>) -> usize {
        if self.selection == SpeakerSelection::Auto {
            match self.ask_selector(transcript).await {
                Ok(idx) => return idx,
                Err(e) => {
                    warn!(error = %e, "falling back to round-robin selection");
                }
            }
        }
        self.round_robin(last)
    }

    fn round_robin(&self, last: Option<usize>) -> usize {
        match last {
            Some(idx) => (idx + 1) % self.agents.len(),
            None => 0,
        }
    }

    /// Ask the selector model to name the next speaker.
    async fn ask_selector(&self, transcript: &Transcript) -> Result<usize> {
        let (provider, settings) =
            self.selector_client()
                .ok_or_else(|| ChatError::InvalidSelectorOutput {
                    output: "no selector configured".to_string(),
                })?;

        let roster: Vec<String> = self.agents.iter().map(|a| a.name().to_string()).collect();
        let mut roles = String::new();
        for agent in &self.agents {
            roles.push_str(&format!("{}: {}\n", agent.name(), agent.description()));
        }

        let mut messages = vec![Message::system(format!(
            "You are in a role play game. The following roles are available:\n{}\
             Read the following conversation. Then select the next role to play. \
             Only return the role.",
            roles
        ))];
        for msg in transcript {
            messages.push(Message::user(msg.sender.clone(), msg.content.clone()));
        }
        messages.push(Message::user(
            "system",
            format!(
                "Read the above conversation. Then select the next role from {:?} to play. \
                 Only return the role.",
                roster
            ),
        ));

        let (response, _usage) = provider.complete(messages, vec![], &settings).await?;
        let choice = response.content.unwrap_or_default();
        let trimmed = choice.trim();

        // Exact match first, then a unique mention anywhere in the output.
        if let Some(idx) = self
            .agents
            .iter()
            .position(|a| a.name().eq_ignore_ascii_case(trimmed))
        {
            return Ok(idx);
        }
        let mentioned: Vec<usize> = self
            .agents
            .iter()
            .enumerate()
            .filter(|(_, a)| choice.to_lowercase().contains(&a.name().to_lowercase()))
            .map(|(i, _)| i)
            .collect();
        if mentioned.len() == 1 {
            return Ok(mentioned[0]);
        }

        Err(ChatError::InvalidSelectorOutput { output: choice })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::Agent;
    use crate::model::ScriptedProvider;
    use crate::termination;
    use pretty_assertions::assert_eq;

    fn fixed(name: &str, reply: &str) -> Arc<dyn Conversable> {
        Arc::new(Agent::fixed(name, reply).with_description(format!("{} description", name)))
    }

    fn seed(content: &str) -> Transcript {
        vec![Message::user("user", content)]
    }

    #[tokio::test]
    async fn test_empty_roster_is_rejected() {
        let group = GroupChat::new(vec![]);
        assert!(matches!(
            group.run(seed("hi")).await,
            Err(ChatError::EmptyRoster)
        ));
    }

    #[tokio::test]
    async fn test_round_robin_cycles_roster_in_order() {
        let group = GroupChat::new(vec![fixed("a", "1"), fixed("b", "2"), fixed("c", "3")])
            .speaker_selection(SpeakerSelection::RoundRobin)
            .max_round(4);

        let result = group.run(seed("go")).await.unwrap();
        let senders: Vec<&str> = result.transcript[1..]
            .iter()
            .map(|m| m.sender.as_str())
            .collect();
        assert_eq!(senders, vec!["a", "b", "c", "a"]);
        assert_eq!(result.reason, CompletionReason::MaxTurns);
    }

    #[tokio::test]
    async fn test_introductions_inserted_exactly_once_and_not_counted() {
        let group = GroupChat::new(vec![fixed("a", "1"), fixed("b", "2")])
            .speaker_selection(SpeakerSelection::RoundRobin)
            .send_introductions(true)
            .max_round(3);

        let result = group.run(seed("go")).await.unwrap();

        let intro_count = result
            .transcript
            .iter()
            .filter(|m| m.role == crate::items::Role::System && m.content.contains("In attendance"))
            .count();
        assert_eq!(intro_count, 1);
        assert!(result.transcript[0].content.contains("a: a description"));
        // intro + seed + exactly max_round replies
        assert_eq!(result.transcript.len(), 2 + 3);
    }

    #[tokio::test]
    async fn test_termination_policy_stops_group() {
        let group = GroupChat::new(vec![fixed("a", "working"), fixed("b", "TERMINATE")])
            .speaker_selection(SpeakerSelection::RoundRobin)
            .termination(Arc::new(termination::contains_token("terminate")))
            .max_round(10);

        let result = group.run(seed("go")).await.unwrap();
        assert_eq!(result.reason, CompletionReason::Predicate);
        assert_eq!(result.transcript.last().unwrap().sender, "b");
    }

    #[tokio::test]
    async fn test_auto_selection_follows_selector_output() {
        let selector = ScriptedProvider::new().with_message("c").with_message("a");
        let group = GroupChat::new(vec![fixed("a", "1"), fixed("b", "2"), fixed("c", "3")])
            .selector(Arc::new(selector), ModelSettings::default())
            .max_round(2);

        let result = group.run(seed("go")).await.unwrap();
        let senders: Vec<&str> = result.transcript[1..]
            .iter()
            .map(|m| m.sender.as_str())
            .collect();
        assert_eq!(senders, vec!["c", "a"]);
    }

    #[tokio::test]
    async fn test_unknown_selector_output_falls_back_to_round_robin() {
        let selector = ScriptedProvider::new()
            .with_message("nobody_by_that_name")
            .with_message("b");
        let group = GroupChat::new(vec![fixed("a", "1"), fixed("b", "2")])
            .selector(Arc::new(selector), ModelSettings::default())
            .max_round(2);

        let result = group.run(seed("go")).await.unwrap();
        let senders: Vec<&str> = result.transcript[1..]
            .iter()
            .map(|m| m.sender.as_str())
            .collect();
        // Round 1 falls back to roster order; round 2 honors the selector.
        assert_eq!(senders, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_selector_failure_falls_back_without_crashing() {
        let selector = ScriptedProvider::new().with_failure(ChatError::Unreachable {
            message: "selector down".to_string(),
        });
        let group = GroupChat::new(vec![fixed("a", "1"), fixed("b", "2")])
            .selector(Arc::new(selector), ModelSettings::default())
            .max_round(1);

        let result = group.run(seed("go")).await.unwrap();
        assert_eq!(result.transcript.last().unwrap().sender, "a");
        assert_eq!(result.reason, CompletionReason::MaxTurns);
    }

    #[tokio::test]
    async fn test_auto_without_selector_uses_round_robin() {
        let group = GroupChat::new(vec![fixed("a", "1"), fixed("b", "2")]).max_round(2);

        let result = group.run(seed("go")).await.unwrap();
        let senders: Vec<&str> = result.transcript[1..]
            .iter()
            .map(|m| m.sender.as_str())
            .collect();
        assert_eq!(senders, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_group_summary_is_last_message() {
        let group = GroupChat::new(vec![fixed("a", "alpha"), fixed("b", "omega")])
            .speaker_selection(SpeakerSelection::RoundRobin)
            .max_round(2);

        let result = group.run(seed("go")).await.unwrap();
        assert_eq!(result.summary, Some("omega".to_string()));
    }
}
