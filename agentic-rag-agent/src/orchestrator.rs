//! Conversation orchestration: retrieve, ground, generate, record.

use std::fmt::Write as _;
use std::sync::Arc;

use agentic_rag_index::{HybridRetriever, RetrievedContext};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{AgentError, Result};
use crate::generator::{AnswerGenerator, GenerationRequest, GeneratorTool, Turn};
use crate::session::SessionService;

/// User id applied when a request does not carry one.
pub const DEFAULT_USER_ID: &str = "default_user";

const STRATEGY: &str = "\
STRATEGY:
1. Read the retrieved documents above first and check whether they answer the user's question.
2. When they contain enough information, build your answer from them.
3. When they are missing or incomplete, or the question needs real-time data, use google_search.
4. Always say whether your answer comes from the internal documents or from web search.
5. Cite your sources when you can.
";

/// Static settings of the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorConfig {
    /// App name sessions are created under.
    pub app_name: String,
    /// Base persona instruction.
    pub instruction: String,
    /// Earlier turns sent to the generator with each message.
    pub max_history_turns: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            app_name: "agentic_rag".to_string(),
            instruction: "You are a helpful RAG assistant.".to_string(),
            max_history_turns: 10,
        }
    }
}

/// One user message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatInput {
    pub message: String,
    pub session_id: Option<String>,
    pub user_id: Option<String>,
}

/// The answer and the session it was recorded in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatOutput {
    pub answer: String,
    pub session_id: String,
}

/// Build the generator instruction: the base instruction, a listing of the
/// retrieved passages (only when there are any), then the strategy directives.
pub fn build_instruction(base: &str, context: &RetrievedContext) -> String {
    let mut out = String::with_capacity(base.len() + STRATEGY.len() + 256);
    out.push_str(base);
    out.push_str("\n\n");

    if !context.is_empty() {
        out.push_str("## Retrieved Knowledge Base Documents\n\n");
        for (i, result) in context.results.iter().enumerate() {
            let _ = writeln!(out, "### Document {} (Score: {:.2})", i + 1, result.score);
            out.push_str(&result.content);
            out.push_str("\n\n");
        }
    }

    out.push_str(STRATEGY);
    out
}

/// Answers user messages with retrieval-grounded generation.
pub struct ConversationOrchestrator {
    config: OrchestratorConfig,
    retriever: Arc<HybridRetriever>,
    sessions: Arc<dyn SessionService>,
    generator: Arc<dyn AnswerGenerator>,
}

impl ConversationOrchestrator {
    pub fn new(
        config: OrchestratorConfig,
        retriever: Arc<HybridRetriever>,
        sessions: Arc<dyn SessionService>,
        generator: Arc<dyn AnswerGenerator>,
    ) -> Self {
        Self { config, retriever, sessions, generator }
    }

    pub fn sessions(&self) -> &Arc<dyn SessionService> {
        &self.sessions
    }

    /// Answer one message.
    ///
    /// Creates a session when none is given. Retrieval failures are logged and
    /// answered without grounding context; session and generation failures
    /// abort the request. The generator stream is drained in order and the
    /// first error discards everything received so far.
    ///
    /// # Errors
    ///
    /// - [`AgentError::InvalidInput`] for an empty message.
    /// - [`AgentError::SessionNotFound`] for an unknown `session_id`.
    /// - [`AgentError::GenerationError`] when the generator fails.
    pub async fn respond(&self, input: ChatInput) -> Result<ChatOutput> {
        if input.message.trim().is_empty() {
            return Err(AgentError::InvalidInput("message must not be empty".to_string()));
        }
        let user_id =
            input.user_id.as_deref().filter(|u| !u.is_empty()).unwrap_or(DEFAULT_USER_ID);

        let session_id = match input.session_id.as_deref().filter(|s| !s.is_empty()) {
            Some(id) => {
                self.sessions
                    .get(&self.config.app_name, user_id, id)
                    .await?
                    .ok_or_else(|| AgentError::SessionNotFound(id.to_string()))?
                    .id
            }
            None => self.sessions.create(&self.config.app_name, user_id).await?.id,
        };

        let context = match self.retriever.retrieve(&input.message).await {
            Ok(context) => context,
            Err(e) => {
                warn!(
                    session.id = %session_id,
                    error = %e,
                    "retrieval failed, answering without context"
                );
                RetrievedContext::empty(&input.message)
            }
        };
        debug!(session.id = %session_id, documents = context.results.len(), "retrieved context");

        let history = self.sessions.history(&session_id, self.config.max_history_turns).await?;
        let request = GenerationRequest {
            instruction: build_instruction(&self.config.instruction, &context),
            history,
            message: input.message.clone(),
            tools: vec![GeneratorTool::WebSearch],
        };

        let mut stream = self.generator.generate(request).await?;
        let mut answer = String::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            if !chunk.thought {
                answer.push_str(&chunk.text);
            }
        }

        self.sessions
            .append(&session_id, vec![Turn::user(input.message), Turn::model(answer.clone())])
            .await?;

        info!(
            session.id = %session_id,
            user.id = user_id,
            generator = self.generator.name(),
            answer_len = answer.len(),
            "answered message"
        );
        Ok(ChatOutput { answer, session_id })
    }
}
