//! Question answering handler

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use chrono::Utc;
use qa_agent_common::{
    document::Metadata,
    errors::{AppError, Result},
};
use serde::Serialize;
use serde_json::{Map, Value};
use std::time::Instant;

use crate::agent::QaRequest;
use crate::AppState;

/// One retrieved chunk in the response
#[derive(Debug, Serialize)]
pub struct ContextItem {
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

/// Answer response
#[derive(Debug, Serialize)]
pub struct AskResponse {
    pub question: String,
    pub answer: String,
    pub context: Vec<ContextItem>,
    pub timestamp: String,
}

/// Answer a question.
///
/// Accepts `{question, content_hash}` or `{question, file_type, file_url}`.
/// A blank question is rejected before the agent runs; failures other than
/// parameter errors surface as 500 with the underlying message.
pub async fn ask(
    State(state): State<AppState>,
    payload: std::result::Result<Json<Map<String, Value>>, JsonRejection>,
) -> Result<Json<AskResponse>> {
    let start = Instant::now();

    let Json(params) = payload.map_err(|e| AppError::Validation {
        message: e.body_text(),
        field: None,
    })?;

    if let Some(question) = params.get("question").and_then(Value::as_str) {
        if question.trim().is_empty() {
            return Err(AppError::Validation {
                message: "Question must not be empty".to_string(),
                field: Some("question".to_string()),
            });
        }
    }

    let request = QaRequest::from_params(&params)?;
    tracing::info!(question = %request.question(), "Question received");

    let outcome = state.agent.run(request).await.map_err(|e| {
        if e.is_client_error() {
            e
        } else {
            AppError::RequestFailed {
                message: e.to_string(),
            }
        }
    })?;

    tracing::info!(
        context_chunks = outcome.context.len(),
        latency_ms = start.elapsed().as_millis() as u64,
        "Answer generated"
    );

    Ok(Json(AskResponse {
        question: outcome.question,
        answer: outcome.answer,
        context: outcome
            .context
            .iter()
            .map(|chunk| ContextItem {
                content: chunk.content.clone(),
                metadata: Some(chunk.flattened_metadata()),
            })
            .collect(),
        timestamp: Utc::now().to_rfc3339(),
    }))
}
