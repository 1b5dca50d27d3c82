//! # Agent (orientation)
//!
//! An [`Agent`] is a configured participant in a conversation: a name, a
//! system prompt, a reply policy, and an optional tool registry. Agents are
//! constructed once at configuration time and produce messages turn by turn.
//!
//! The [`Conversable`] trait is the one polymorphism seam in the crate: plain
//! agents, human proxies, and group-chat managers all implement it, so any
//! component expecting an agent accepts any of them transparently. Capability
//! probes (`provider`, `human_input`) replace type inspection.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::ModelSettings;
use crate::error::{ChatError, Result};
use crate::human::{HumanInput, HumanInputMode};
use crate::items::{Message, Role};
use crate::model::ModelProvider;
use crate::termination::TerminationPolicy;
use crate::tool::{Tool, ToolRegistry};
use crate::usage::Usage;

/// How an agent produces its turn.
#[derive(Clone)]
pub enum ReplyPolicy {
    /// No autonomous generation; replies with the configured default
    /// auto-reply. Used for pure proxies.
    Never,
    /// Invoke the model provider over the conversation history.
    Model,
    /// Always reply with a constant. Used in tests.
    Fixed(String),
}

/// Complete configuration for an [`Agent`].
///
/// Closed by construction: every recognized option and its effect is a field
/// here; there is no open-ended option bag.
#[derive(Clone)]
pub struct AgentConfig {
    /// The name of the agent, used for identification and sender attribution.
    pub name: String,

    /// The system instructions that guide the agent's behavior.
    pub system_message: String,

    /// A short capability description, shown to speaker selectors and in
    /// group-chat introductions.
    pub description: String,

    /// How this agent produces its turn.
    pub reply_policy: ReplyPolicy,

    /// Tools the agent may call. Read-only during execution.
    pub tools: Vec<Arc<dyn Tool>>,

    /// When this agent defers to a human.
    pub human_input_mode: HumanInputMode,

    /// Where human replies come from when the mode requires them.
    pub human_input: Option<Arc<dyn HumanInput>>,

    /// Per-agent termination predicate, checked against messages this agent
    /// receives.
    pub termination: Option<Arc<dyn TerminationPolicy>>,

    /// Reply content used by the `Never` policy.
    pub default_auto_reply: String,

    /// Model settings for collaborator calls.
    pub settings: ModelSettings,

    /// The completion collaborator; required by the `Model` policy.
    pub provider: Option<Arc<dyn ModelProvider>>,
}

/// One agent turn: the produced messages plus accounting.
///
/// A turn is usually a single message; a turn that carried tool calls also
/// includes the tool results appended before control returns.
#[derive(Debug, Clone)]
pub struct Reply {
    pub messages: Vec<Message>,
    pub usage: Usage,
    pub cost: f64,
}

impl Reply {
    fn single(message: Message) -> Self {
        Self {
            messages: vec![message],
            usage: Usage::empty(),
            cost: 0.0,
        }
    }

    /// The final message of the turn, the one termination is evaluated on.
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }
}

/// A conversational participant capable of producing messages.
///
/// Implemented by [`Agent`] and by
/// [`GroupChatManager`](crate::manager::GroupChatManager), which lets a whole
/// group chat stand in for a single participant.
#[async_trait]
pub trait Conversable: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    fn human_input_mode(&self) -> HumanInputMode {
        HumanInputMode::Never
    }

    /// Capability probe: the human input source, when one is attached.
    fn human_input(&self) -> Option<Arc<dyn HumanInput>> {
        None
    }

    /// Capability probe: the model provider, when this participant has one.
    /// Chats use it for reflection summaries.
    fn provider(&self) -> Option<Arc<dyn ModelProvider>> {
        None
    }

    /// Model settings accompanying [`Conversable::provider`].
    fn settings(&self) -> ModelSettings {
        ModelSettings::default()
    }

    /// Whether a received message satisfies this participant's termination
    /// predicate.
    fn is_termination_msg(&self, _message: &Message) -> bool {
        false
    }

    /// Produce this participant's turn given the conversation history.
    ///
    /// `history` must be non-empty: an agent never speaks without input.
    async fn reply(&self, history: &[Message], sender: &str) -> Result<Reply>;
}

/// A configured conversational agent.
///
/// ## Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use colloquy::{Agent, Conversable, ModelSettings, OpenAIProvider};
///
/// let provider = Arc::new(OpenAIProvider::new());
/// let guide = Agent::assistant(
///     "Guide_Agent",
///     "You provide customized travel recommendations.",
///     provider,
///     ModelSettings::new("gpt-4o-mini"),
/// )
/// .with_description("Recommends itineraries and activities.");
///
/// assert_eq!(guide.name(), "Guide_Agent");
/// ```
#[derive(Clone)]
pub struct Agent {
    pub config: AgentConfig,
    registry: ToolRegistry,
}

impl Agent {
    pub fn new(config: AgentConfig) -> Self {
        let registry = ToolRegistry::new(config.tools.clone());
        Self { config, registry }
    }

    /// Model-backed agent: the common case.
    pub fn assistant(
        name: impl Into<String>,
        system_message: impl Into<String>,
        provider: Arc<dyn ModelProvider>,
        settings: ModelSettings,
    ) -> Self {
        Self::new(AgentConfig {
            name: name.into(),
            system_message: system_message.into(),
            description: String::new(),
            reply_policy: ReplyPolicy::Model,
            tools: vec![],
            human_input_mode: HumanInputMode::Never,
            human_input: None,
            termination: None,
            default_auto_reply: String::new(),
            settings,
            provider: Some(provider),
        })
    }

    /// Proxy agent with no model of its own; pairs with a human input source
    /// or serves as a tool executor.
    pub fn user_proxy(name: impl Into<String>) -> Self {
        Self::new(AgentConfig {
            name: name.into(),
            system_message: String::new(),
            description: String::new(),
            reply_policy: ReplyPolicy::Never,
            tools: vec![],
            human_input_mode: HumanInputMode::Never,
            human_input: None,
            termination: None,
            default_auto_reply: String::new(),
            settings: ModelSettings::default(),
            provider: None,
        })
    }

    /// Agent that always replies with a constant. Used in tests.
    pub fn fixed(name: impl Into<String>, reply: impl Into<String>) -> Self {
        let reply = reply.into();
        Self::new(AgentConfig {
            name: name.into(),
            system_message: String::new(),
            description: String::new(),
            reply_policy: ReplyPolicy::Fixed(reply),
            tools: vec![],
            human_input_mode: HumanInputMode::Never,
            human_input: None,
            termination: None,
            default_auto_reply: String::new(),
            settings: ModelSettings::default(),
            provider: None,
        })
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.config.description = description.into();
        self
    }

    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.config.tools.push(tool.clone());
        self.registry.register(tool);
        self
    }

    pub fn with_tools(self, tools: Vec<Arc<dyn Tool>>) -> Self {
        tools.into_iter().fold(self, |agent, t| agent.with_tool(t))
    }

    pub fn with_human_input_mode(mut self, mode: HumanInputMode) -> Self {
        self.config.human_input_mode = mode;
        self
    }

    pub fn with_human_input(mut self, source: Arc<dyn HumanInput>) -> Self {
        self.config.human_input = Some(source);
        self
    }

    pub fn with_termination(mut self, policy: Arc<dyn TerminationPolicy>) -> Self {
        self.config.termination = Some(policy);
        self
    }

    pub fn with_default_auto_reply(mut self, reply: impl Into<String>) -> Self {
        self.config.default_auto_reply = reply.into();
        self
    }

    pub fn with_settings(mut self, settings: ModelSettings) -> Self {
        self.config.settings = settings;
        self
    }

    /// Build the model-facing view of the shared history.
    ///
    /// The agent's own messages keep their roles; everyone else's turns are
    /// flattened to user-role input attributed to their sender, so each agent
    /// sees the conversation from its own side.
    fn build_context(&self, history: &[Message]) -> Vec<Message> {
        let mut context = Vec::with_capacity(history.len() + 1);
        if !self.config.system_message.is_empty() {
            context.push(Message::system(self.config.system_message.clone()));
        }
        for msg in history {
            if msg.role == Role::System || msg.sender == self.config.name {
                context.push(msg.clone());
            } else {
                context.push(Message::user(msg.sender.clone(), msg.content.clone()));
            }
        }
        context
    }

    /// Run one model completion and resolve any tool calls it carries.
    async fn model_reply(&self, history: &[Message]) -> Result<Reply> {
        let provider = self
            .config
            .provider
            .as_ref()
            .ok_or_else(|| ChatError::Other(format!("agent {} has no provider", self.config.name)))?;

        let context = self.build_context(history);
        let completion = provider
            .complete(context, self.config.tools.clone(), &self.config.settings)
            .await;

        let (response, usage) = match completion {
            Ok(out) => out,
            // A malformed payload becomes a transcript message the
            // conversation can react to; transport failures propagate and the
            // chat boundary turns them into a terminal result.
            Err(ChatError::InvalidResponse { message }) => {
                warn!(agent = %self.config.name, %message, "invalid model response");
                return Ok(Reply::single(Message::system(format!(
                    "[{}] model returned an invalid response: {}",
                    self.config.name, message
                ))));
            }
            Err(e) => return Err(e),
        };

        let cost = usage.estimate_cost(&self.config.settings.model);
        let mut messages = Vec::new();

        if response.tool_calls.is_empty() {
            let content = response.content.unwrap_or_default();
            messages.push(Message::assistant(self.config.name.clone(), content));
            return Ok(Reply {
                messages,
                usage,
                cost,
            });
        }

        messages.push(Message::assistant_with_tool_calls(
            self.config.name.clone(),
            response.content.unwrap_or_default(),
            response.tool_calls.clone(),
        ));

        for call in &response.tool_calls {
            debug!(agent = %self.config.name, tool = %call.name, "executing tool call");
            match self.registry.execute(call).await {
                Ok(result) => {
                    messages.push(Message::tool(
                        self.config.name.clone(),
                        result.as_text(),
                        call.id.clone(),
                    ));
                }
                Err(ChatError::ToolNotFound { name }) => {
                    warn!(agent = %self.config.name, tool = %name, "unknown tool requested");
                    messages.push(Message::system(format!(
                        "[{}] tool not found: {}",
                        self.config.name, name
                    )));
                }
                Err(ChatError::ExecutionError { message }) => {
                    messages.push(Message::tool(
                        self.config.name.clone(),
                        format!("Error: {}", message),
                        call.id.clone(),
                    ));
                }
                Err(e) => return Err(e),
            }
        }

        Ok(Reply {
            messages,
            usage,
            cost,
        })
    }
}

#[async_trait]
impl Conversable for Agent {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn description(&self) -> &str {
        &self.config.description
    }

    fn human_input_mode(&self) -> HumanInputMode {
        self.config.human_input_mode
    }

    fn human_input(&self) -> Option<Arc<dyn HumanInput>> {
        self.config.human_input.clone()
    }

    fn provider(&self) -> Option<Arc<dyn ModelProvider>> {
        self.config.provider.clone()
    }

    fn settings(&self) -> ModelSettings {
        self.config.settings.clone()
    }

    fn is_termination_msg(&self, message: &Message) -> bool {
        self.config
            .termination
            .as_ref()
            .is_some_and(|policy| policy.should_terminate(message))
    }

    async fn reply(&self, history: &[Message], _sender: &str) -> Result<Reply> {
        if history.is_empty() {
            return Err(ChatError::Other(format!(
                "agent {} cannot reply to an empty history",
                self.config.name
            )));
        }

        match &self.config.reply_policy {
            ReplyPolicy::Never => Ok(Reply::single(Message::assistant(
                self.config.name.clone(),
                self.config.default_auto_reply.clone(),
            ))),
            ReplyPolicy::Fixed(content) => Ok(Reply::single(Message::assistant(
                self.config.name.clone(),
                content.clone(),
            ))),
            ReplyPolicy::Model => self.model_reply(history).await,
        }
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("name", &self.config.name)
            .field("model", &self.config.settings.model)
            .field("tools_count", &self.config.tools.len())
            .field("human_input_mode", &self.config.human_input_mode)
            .finish()
    }
}
