//! Error types for the orchestration core

use thiserror::Error;

/// Result type alias for the orchestration core
pub type Result<T> = std::result::Result<T, ChatError>;

/// Error taxonomy for chats, group chats, and sequencers.
///
/// All of these are recovered at the chat boundary: they become either a
/// transcript message the conversation can react to, or an early terminal
/// [`ChatResult`](crate::chat::ChatResult) with a partial transcript. None
/// should escape a chat run loop as an unhandled fault.
#[derive(Debug, Error)]
pub enum ChatError {
    /// A tool call named a tool absent from the executing agent's registry
    #[error("tool not found: {name}")]
    ToolNotFound { name: String },

    /// A registered tool ran and failed
    #[error("tool execution error: {message}")]
    ExecutionError { message: String },

    /// The completion collaborator could not be reached
    #[error("model provider unreachable: {message}")]
    Unreachable { message: String },

    /// The completion collaborator refused the request due to rate limiting
    #[error("model provider rate limited: {message}")]
    RateLimited { message: String },

    /// The completion collaborator returned a payload we could not use
    #[error("invalid model response: {message}")]
    InvalidResponse { message: String },

    /// A speaker selector named an agent outside the roster
    #[error("speaker selector returned an unknown agent: {output}")]
    InvalidSelectorOutput { output: String },

    /// A human supplied an empty reply under ALWAYS input mode
    #[error("chat aborted by human input")]
    HumanAbort,

    /// A group chat was configured with no agents
    #[error("group chat has an empty roster")]
    EmptyRoster,

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// IO error (human input sources)
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl ChatError {
    /// Collaborator failures abort a chat; everything else is folded into the
    /// transcript and the conversation continues.
    pub fn is_collaborator_failure(&self) -> bool {
        matches!(
            self,
            ChatError::Unreachable { .. }
                | ChatError::RateLimited { .. }
                | ChatError::InvalidResponse { .. }
        )
    }
}
