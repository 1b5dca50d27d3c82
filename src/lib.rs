//! # colloquy
//!
//! Multi-agent conversation orchestration over a hosted LLM collaborator:
//! two-party chats, group chats with pluggable speaker selection, sequential
//! chat pipelines with summary chaining, and nested chat trees.
//!
//! ## Core Concepts
//!
//! - **Agent**: a named participant with a system prompt, a reply policy, and
//!   an optional tool registry. Every participant implements [`Conversable`],
//!   so plain agents, human proxies, and group-chat managers interchange
//!   freely.
//! - **Chat**: a bounded two-party exchange driven turn by turn, with
//!   termination policies and human-in-the-loop checkpoints.
//! - **GroupChat / GroupChatManager**: N agents over one shared transcript;
//!   the manager makes the whole group addressable as a single agent.
//! - **ChatSequencer / NestedChats**: ordered chat pipelines whose steps feed
//!   each other through summaries, optionally attached to a trigger agent.
//!
//! Execution is strictly turn-sequential: one agent speaks at a time, and the
//! only suspension points are the model-call and human-input boundaries.
//!
//! ## Getting Started
//!
//! Set your OpenAI API key in the `OPENAI_API_KEY` environment variable.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use colloquy::{Agent, Chat, ModelSettings, OpenAIProvider, SummaryMethod};
//!
//! # async fn example() {
//! let provider = Arc::new(OpenAIProvider::new());
//!
//! let traveler = Agent::assistant(
//!     "Traveler_Agent",
//!     "You gather travel preferences and ask for itinerary advice.",
//!     provider.clone(),
//!     ModelSettings::new("gpt-4o-mini"),
//! );
//! let guide = Agent::assistant(
//!     "Guide_Agent",
//!     "You provide customized recommendations and practical travel tips.",
//!     provider,
//!     ModelSettings::new("gpt-4o-mini"),
//! );
//!
//! let result = Chat::new(Arc::new(traveler), Arc::new(guide))
//!     .max_turns(4)
//!     .summary_method(SummaryMethod::ReflectionWithLlm)
//!     .run("I'm planning a trip to Japan. Where should I start?")
//!     .await;
//!
//! println!("{}", result.summary.unwrap_or_default());
//! # }
//! ```

pub mod agent;
pub mod chat;
pub mod config;
pub mod error;
pub mod group;
pub mod human;
pub mod items;
pub mod manager;
pub mod model;
pub mod nested;
pub mod sequencer;
pub mod termination;
pub mod tool;
pub mod usage;

pub use agent::{Agent, AgentConfig, Conversable, Reply, ReplyPolicy};
pub use chat::{Chat, ChatResult, CompletionReason, SummaryMethod};
pub use config::ModelSettings;
pub use error::{ChatError, Result};
pub use group::{GroupChat, SpeakerSelection};
pub use human::{HumanInput, HumanInputMode, QueuedInput, StdinInput};
pub use items::{Message, ModelResponse, Role, ToolCall, Transcript};
pub use manager::GroupChatManager;
pub use model::{ModelProvider, OpenAIProvider, ScriptedProvider};
pub use nested::NestedChats;
pub use sequencer::{ChatSequencer, ChatSpec, ErrorPolicy, OpeningMessage, StepContext};
pub use termination::{
    contains_token, never, AutoReplyLimit, CompositeTermination, TerminationFn, TerminationPolicy,
};
pub use tool::{FunctionTool, Tool, ToolRegistry, ToolResult};
pub use usage::Usage;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_imports() {
        // Verify that the public surface stays object-safe where it must be.
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Agent>();
        assert_send_sync::<ChatError>();
    }
}
