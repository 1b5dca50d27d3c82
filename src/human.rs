//! Human input policies and sources
//!
//! [`HumanInputMode`] decides *when* a human is consulted; [`HumanInput`]
//! decides *how* the reply is obtained. The chat run loop suspends at this
//! boundary and waits for the reply before the state machine advances.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::error::Result;

/// When the owning agent defers to a human.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HumanInputMode {
    /// Every reply of the owning agent is replaced by human input. An empty
    /// reply is an explicit exit signal that force-terminates the chat.
    Always,
    /// Never consult a human.
    #[default]
    Never,
    /// Consult the human only when a termination predicate has fired, giving
    /// them a chance to override: a non-empty reply keeps the chat going.
    TerminateOnly,
}

/// Source of human-supplied replies.
#[async_trait]
pub trait HumanInput: Send + Sync {
    /// Block until the human has replied. An empty string means "stop".
    async fn request_input(&self, prompt: &str) -> Result<String>;
}

/// Reads replies from the process's standard input.
pub struct StdinInput;

#[async_trait]
impl HumanInput for StdinInput {
    async fn request_input(&self, prompt: &str) -> Result<String> {
        eprintln!("{}", prompt);
        let mut line = String::new();
        let mut reader = BufReader::new(tokio::io::stdin());
        reader.read_line(&mut line).await?;
        Ok(line.trim().to_string())
    }
}

/// Scripted reply queue for tests.
///
/// An exhausted queue yields empty strings, which chat loops treat as the
/// exit signal.
#[derive(Default)]
pub struct QueuedInput {
    replies: Mutex<VecDeque<String>>,
}

impl QueuedInput {
    pub fn new(replies: Vec<&str>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(String::from).collect()),
        }
    }
}

#[async_trait]
impl HumanInput for QueuedInput {
    async fn request_input(&self, _prompt: &str) -> Result<String> {
        Ok(self.replies.lock().unwrap().pop_front().unwrap_or_default())
    }
}
