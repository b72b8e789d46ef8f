//! Answer generation
//!
//! Joins retrieved chunk texts into a bounded context, fills the QA prompt
//! and returns the chat model's reply verbatim. No retries.

pub mod prompt;

use crate::config::{GenerationConfig, LlmConfig, SecretConfig};
use crate::document::Chunk;
use crate::errors::{AppError, Result};
use crate::metrics;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, instrument};

const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// Chat message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One chat turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

/// Trait for chat completion backends
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Complete a conversation, returning the assistant text
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// OpenAI-compatible chat completions client
pub struct OpenAIChatModel {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

impl OpenAIChatModel {
    /// Create a client from config and secrets.
    ///
    /// `llm.api_base` wins over `OPENAI_BASE_URL`.
    pub fn new(config: &LlmConfig, secrets: &SecretConfig) -> Result<Self> {
        let api_key = secrets.openai_api_key.clone().ok_or_else(|| AppError::Configuration {
            message: "OPENAI_API_KEY is required for answer generation".to_string(),
        })?;

        let base = config
            .api_base
            .clone()
            .or_else(|| secrets.openai_base_url.clone())
            .unwrap_or_else(|| OPENAI_API_BASE.to_string());

        // No client timeout: the request runs as long as the model takes
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", base.trim_end_matches('/')),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl ChatModel for OpenAIChatModel {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::LlmError {
                message: format!("LLM API request failed: {}", e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::LlmError {
                message: format!("LLM API error {}: {}", status, body),
            });
        }

        let chat_response: ChatResponse = response.json().await.map_err(|e| AppError::LlmError {
            message: format!("Failed to parse LLM response: {}", e),
        })?;

        chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AppError::LlmError {
                message: "Empty response from LLM".to_string(),
            })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Caps applied to retrieved context before prompt assembly
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextBudget {
    pub max_chunks: usize,
    pub max_chars: usize,
}

impl From<&GenerationConfig> for ContextBudget {
    fn from(config: &GenerationConfig) -> Self {
        Self {
            max_chunks: config.max_context_chunks,
            max_chars: config.max_context_chars,
        }
    }
}

impl ContextBudget {
    /// Join chunk texts in order with a blank line, stopping at the chunk
    /// cap; the last admitted text is cut at a char boundary so the joined
    /// result (separators included) never exceeds `max_chars`.
    pub fn assemble(&self, context: &[Chunk]) -> String {
        let separator_len = prompt::CONTEXT_SEPARATOR.chars().count();
        let mut parts: Vec<String> = Vec::new();
        let mut used = 0usize;

        for chunk in context.iter().take(self.max_chunks) {
            let overhead = if parts.is_empty() { 0 } else { separator_len };
            let remaining = self.max_chars.saturating_sub(used + overhead);
            if remaining == 0 {
                break;
            }

            let length = chunk.content.chars().count();
            if length <= remaining {
                parts.push(chunk.content.clone());
                used += overhead + length;
            } else {
                parts.push(chunk.content.chars().take(remaining).collect());
                break;
            }
        }

        parts.join(prompt::CONTEXT_SEPARATOR)
    }
}

/// Produces answers from a question and retrieved chunks
pub struct AnswerGenerator {
    model: Arc<dyn ChatModel>,
    budget: ContextBudget,
}

impl AnswerGenerator {
    pub fn new(model: Arc<dyn ChatModel>, budget: ContextBudget) -> Self {
        Self { model, budget }
    }

    /// Get the model name
    pub fn model_name(&self) -> &str {
        self.model.model_name()
    }

    /// Generate an answer. Model failures propagate unchanged.
    #[instrument(skip(self, context), fields(model = %self.model.model_name(), chunks = context.len()))]
    pub async fn generate(&self, question: &str, context: &[Chunk]) -> Result<String> {
        let joined = self.budget.assemble(context);
        debug!(context_chars = joined.chars().count(), "Prompt assembled");

        let messages = prompt::build_messages(question, &joined);

        let start = Instant::now();
        let result = self.model.complete(&messages).await;
        metrics::record_generation(
            start.elapsed().as_secs_f64(),
            self.model.model_name(),
            result.is_ok(),
        );

        result
    }
}
