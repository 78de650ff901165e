//! The answer generator interface.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Who produced a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

/// One message in a session's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self { role: Role::User, text: text.into() }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self { role: Role::Model, text: text.into() }
    }
}

/// External capabilities a generator may use while answering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorTool {
    /// Live web search, executed by the generator's provider.
    WebSearch,
}

/// Everything the generator needs for one answer.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    /// System instruction, including any injected grounding context.
    pub instruction: String,
    /// Earlier turns of the session, oldest first.
    pub history: Vec<Turn>,
    /// The new user message.
    pub message: String,
    pub tools: Vec<GeneratorTool>,
}

/// A fragment of the generator's streamed output.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationChunk {
    pub text: String,
    /// Reasoning output that is not part of the answer.
    pub thought: bool,
}

impl GenerationChunk {
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: text.into(), thought: false }
    }
}

/// Ordered, cancellable stream of output fragments. Dropping it cancels the
/// underlying request.
pub type GenerationStream = Pin<Box<dyn Stream<Item = Result<GenerationChunk>> + Send>>;

/// An answer generator such as a hosted LLM.
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    /// Name used in logs and error messages.
    fn name(&self) -> &str;

    /// Start generating. Errors before the first fragment are returned
    /// directly; later ones arrive as stream items.
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationStream>;
}
