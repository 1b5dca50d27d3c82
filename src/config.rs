//! Model configuration
//!
//! Every agent is handed an explicit [`ModelSettings`] at construction time;
//! there is no process-wide model configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings governing a single agent's collaborator calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSettings {
    /// Model identifier, e.g. "gpt-4o" or "gpt-3.5-turbo".
    pub model: String,

    /// Sampling temperature. `None` uses the provider default.
    pub temperature: Option<f32>,

    /// Cap on generated tokens per completion. `None` uses the provider default.
    pub max_tokens: Option<u32>,

    /// Per-call timeout; an elapsed timeout is reported as `Unreachable`.
    pub timeout: Duration,

    /// Retries on transport failures before giving up.
    pub max_retries: usize,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o".to_string(),
            temperature: Some(0.7),
            max_tokens: None,
            timeout: Duration::from_secs(60),
            max_retries: 3,
        }
    }
}

impl ModelSettings {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }
}
