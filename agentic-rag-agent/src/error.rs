//! Error types for the `agentic-rag-agent` crate.

use thiserror::Error;

/// Errors that can occur while answering a conversation turn.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The caller supplied unusable input (e.g. an empty message).
    #[error("{0}")]
    InvalidInput(String),

    /// A supplied session id does not exist for this user.
    #[error("session '{0}' not found")]
    SessionNotFound(String),

    /// The answer generator failed before or during streaming.
    #[error("generate failed ({provider}): {message}")]
    GenerationError {
        /// The generator that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },
}

impl AgentError {
    pub fn generation(provider: impl Into<String>, message: impl Into<String>) -> Self {
        AgentError::GenerationError { provider: provider.into(), message: message.into() }
    }

    /// Whether the error was caused by the caller's input.
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, AgentError::InvalidInput(_))
    }
}

/// A convenience result type for agent operations.
pub type Result<T> = std::result::Result<T, AgentError>;
