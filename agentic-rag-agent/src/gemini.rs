//! Gemini answer generator over the streaming REST API.
//!
//! This module is only available when the `gemini` feature is enabled.

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, error, instrument};

use crate::error::{AgentError, Result};
use crate::generator::{
    AnswerGenerator, GenerationChunk, GenerationRequest, GenerationStream, GeneratorTool, Role,
};

/// Default Generative Language API base URL.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

const DEFAULT_MODEL: &str = "gemini-2.5-flash";
const PROVIDER: &str = "Gemini";

/// An [`AnswerGenerator`] calling `models/{model}:streamGenerateContent?alt=sse`.
///
/// Web search maps to Gemini's native `google_search` tool.
///
/// # Example
///
/// ```rust,ignore
/// use agentic_rag_agent::gemini::GeminiGenerator;
///
/// let generator = GeminiGenerator::new("your-api-key")?
///     .with_model("gemini-2.5-flash")
///     .with_temperature(0.7);
/// ```
pub struct GeminiGenerator {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    temperature: Option<f32>,
    max_output_tokens: Option<u32>,
}

impl GeminiGenerator {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(AgentError::generation(PROVIDER, "API key must not be empty"));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            temperature: None,
            max_output_tokens: None,
        })
    }

    /// Set the model name (with or without the `models/` prefix).
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        let model = model.into();
        self.model = model.strip_prefix("models/").map(str::to_string).unwrap_or(model);
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_output_tokens(mut self, tokens: u32) -> Self {
        self.max_output_tokens = Some(tokens);
        self
    }

    fn request_body(&self, request: &GenerationRequest) -> Value {
        let mut contents: Vec<Value> = request
            .history
            .iter()
            .map(|turn| {
                let role = match turn.role {
                    Role::User => "user",
                    Role::Model => "model",
                };
                json!({ "role": role, "parts": [{ "text": turn.text }] })
            })
            .collect();
        contents.push(json!({ "role": "user", "parts": [{ "text": request.message }] }));

        let mut body = json!({
            "systemInstruction": { "parts": [{ "text": request.instruction }] },
            "contents": contents,
        });

        let tools: Vec<Value> = request
            .tools
            .iter()
            .map(|tool| match tool {
                GeneratorTool::WebSearch => json!({ "google_search": {} }),
            })
            .collect();
        if !tools.is_empty() {
            body["tools"] = Value::Array(tools);
        }

        let mut generation_config = serde_json::Map::new();
        if let Some(t) = self.temperature {
            generation_config.insert("temperature".to_string(), json!(t));
        }
        if let Some(n) = self.max_output_tokens {
            generation_config.insert("maxOutputTokens".to_string(), json!(n));
        }
        if !generation_config.is_empty() {
            body["generationConfig"] = Value::Object(generation_config);
        }

        body
    }
}

// ── Gemini API response types ──────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    error: Option<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
    #[serde(default)]
    thought: bool,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

/// Turn one SSE `data:` payload into output fragments.
fn parse_event(data: &str) -> Result<Vec<GenerationChunk>> {
    let response: StreamResponse = serde_json::from_str(data)
        .map_err(|e| AgentError::generation(PROVIDER, format!("invalid stream payload: {e}")))?;
    if let Some(err) = response.error {
        return Err(AgentError::generation(PROVIDER, err.message));
    }

    Ok(response
        .candidates
        .into_iter()
        .filter_map(|c| c.content)
        .flat_map(|c| c.parts)
        .filter_map(|p| p.text.map(|text| GenerationChunk { text, thought: p.thought }))
        .collect())
}

#[async_trait]
impl AnswerGenerator for GeminiGenerator {
    fn name(&self) -> &str {
        PROVIDER
    }

    #[instrument(skip_all, fields(model = %self.model, history = request.history.len()))]
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationStream> {
        let url = format!("{}/models/{}:streamGenerateContent?alt=sse", self.base_url, self.model);
        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&self.request_body(&request))
            .send()
            .await
            .map_err(|e| {
                error!(provider = PROVIDER, error = %e, "request failed");
                AgentError::generation(PROVIDER, format!("request failed: {e}"))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            error!(provider = PROVIDER, %status, "API error");
            return Err(AgentError::generation(
                PROVIDER,
                format!("API returned {status}: {detail}"),
            ));
        }

        debug!(provider = PROVIDER, "streaming response");
        let mut events = response.bytes_stream().eventsource();
        let stream = async_stream::stream! {
            while let Some(event) = events.next().await {
                let event = match event {
                    Ok(event) => event,
                    Err(e) => {
                        yield Err(AgentError::generation(PROVIDER, format!("stream error: {e}")));
                        return;
                    }
                };
                if event.data.trim().is_empty() {
                    continue;
                }
                match parse_event(&event.data) {
                    Ok(chunks) => {
                        for chunk in chunks {
                            yield Ok(chunk);
                        }
                    }
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::Turn;

    #[test]
    fn body_carries_instruction_history_and_search_tool() {
        let generator = GeminiGenerator::new("key").unwrap().with_temperature(0.5);
        let body = generator.request_body(&GenerationRequest {
            instruction: "be helpful".to_string(),
            history: vec![Turn::user("hi"), Turn::model("hello")],
            message: "what is rust?".to_string(),
            tools: vec![GeneratorTool::WebSearch],
        });

        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "be helpful");
        assert_eq!(body["contents"].as_array().unwrap().len(), 3);
        assert_eq!(body["contents"][1]["role"], "model");
        assert_eq!(body["contents"][2]["parts"][0]["text"], "what is rust?");
        assert_eq!(body["tools"], json!([{ "google_search": {} }]));
        assert_eq!(body["generationConfig"]["temperature"], json!(0.5f32));
        assert!(body["generationConfig"].get("maxOutputTokens").is_none());
    }

    #[test]
    fn parse_event_keeps_thoughts_flagged_and_surfaces_errors() {
        let chunks = parse_event(
            r#"{"candidates":[{"content":{"role":"model","parts":[
                {"text":"thinking","thought":true},{"text":"Answer"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].thought);
        assert_eq!(chunks[1], GenerationChunk::text("Answer"));

        let err = parse_event(r#"{"error":{"code":500,"message":"backend down"}}"#).unwrap_err();
        assert!(err.to_string().contains("backend down"));

        assert!(parse_event(r#"{"candidates":[{"finishReason":"STOP"}]}"#).unwrap().is_empty());
    }
}
