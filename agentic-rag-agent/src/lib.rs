//! # agentic-rag-agent
//!
//! Conversation orchestration on top of `agentic-rag-index`.
//!
//! A [`ConversationOrchestrator`] resolves the session, retrieves context
//! for the message, builds a grounded instruction and drains an
//! [`AnswerGenerator`] stream into the final answer. Sessions live behind
//! the [`SessionService`] trait; [`InMemorySessionService`] keeps them in
//! process memory.
//!
//! The `gemini` feature (on by default) provides `GeminiGenerator`.

pub mod error;
pub mod generator;
pub mod orchestrator;
pub mod session;

#[cfg(feature = "gemini")]
pub mod gemini;

pub use error::{AgentError, Result};
pub use generator::{
    AnswerGenerator, GenerationChunk, GenerationRequest, GenerationStream, GeneratorTool, Role,
    Turn,
};
pub use orchestrator::{
    ChatInput, ChatOutput, ConversationOrchestrator, DEFAULT_USER_ID, OrchestratorConfig,
    build_instruction,
};
pub use session::{InMemorySessionService, Session, SessionService};

#[cfg(feature = "gemini")]
pub use gemini::GeminiGenerator;
