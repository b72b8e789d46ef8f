//! Question answering pipeline
//!
//! `QaAgent` runs a fixed, strictly sequential pipeline over a
//! `PipelineState`:
//! - ingest variant: `ingest_and_retrieve` then `generate`
//! - query variant: `retrieve` then `generate`
//!
//! Each stage reads the accumulated state and returns a partial update that
//! is merged into it before the next stage runs.

use qa_agent_common::{
    config::AppConfig,
    document::Chunk,
    embeddings,
    errors::{AppError, Result},
    generation::{AnswerGenerator, ChatModel, ContextBudget, OpenAIChatModel},
    SecretConfig, VectorStore,
};
use qa_agent_ingestion::IngestionProcessor;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{info, instrument};
use validator::Validate;

const QUERY_KEYS: [&str; 2] = ["content_hash", "question"];
const INGEST_KEYS: [&str; 3] = ["file_type", "file_url", "question"];

/// A validated request, in one of the two accepted shapes
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "Map<String, Value>")]
pub enum QaRequest {
    /// Answer from records already stored under `content_hash`
    Query { question: String, content_hash: String },
    /// Fetch and store a document, then answer from it
    Ingest {
        question: String,
        file_type: String,
        file_url: String,
    },
}

#[derive(Validate)]
struct IngestParams {
    #[validate(length(min = 1))]
    file_type: String,
    #[validate(url)]
    file_url: String,
}

impl QaRequest {
    /// Validate a parameter map. The key set must be exactly
    /// `{question, content_hash}` or `{question, file_type, file_url}`.
    pub fn from_params(params: &Map<String, Value>) -> Result<Self> {
        if params.is_empty() {
            return Err(AppError::MissingParams);
        }

        let mut keys: Vec<&str> = params.keys().map(String::as_str).collect();
        keys.sort_unstable();

        let text = |key: &str| -> Result<String> {
            params
                .get(key)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| AppError::InvalidParams {
                    message: format!("'{}' must be a string", key),
                })
        };

        if keys == QUERY_KEYS {
            Ok(QaRequest::Query {
                question: text("question")?,
                content_hash: text("content_hash")?,
            })
        } else if keys == INGEST_KEYS {
            let params = IngestParams {
                file_type: text("file_type")?,
                file_url: text("file_url")?,
            };
            params.validate().map_err(|e| AppError::InvalidParams {
                message: e.to_string(),
            })?;

            Ok(QaRequest::Ingest {
                question: text("question")?,
                file_type: params.file_type,
                file_url: params.file_url,
            })
        } else {
            Err(AppError::InvalidParams {
                message: format!(
                    "expected keys {{question, content_hash}} or {{question, file_type, file_url}}, got {{{}}}",
                    keys.join(", ")
                ),
            })
        }
    }

    pub fn question(&self) -> &str {
        match self {
            QaRequest::Query { question, .. } | QaRequest::Ingest { question, .. } => question,
        }
    }
}

impl TryFrom<Map<String, Value>> for QaRequest {
    type Error = AppError;

    fn try_from(params: Map<String, Value>) -> Result<Self> {
        Self::from_params(&params)
    }
}

/// State carried through the pipeline
#[derive(Debug, Clone, Default)]
pub struct PipelineState {
    pub question: String,
    pub content_hash: Option<String>,
    pub file_type: Option<String>,
    pub file_url: Option<String>,
    pub context: Vec<Chunk>,
    pub answer: Option<String>,
}

/// Partial update returned by a stage
#[derive(Debug, Default)]
pub struct StateUpdate {
    pub content_hash: Option<String>,
    pub context: Option<Vec<Chunk>>,
    pub answer: Option<String>,
}

impl PipelineState {
    /// Shallow merge: fields present in the update overwrite the state
    pub fn merge(&mut self, update: StateUpdate) {
        if let Some(content_hash) = update.content_hash {
            self.content_hash = Some(content_hash);
        }
        if let Some(context) = update.context {
            self.context = context;
        }
        if let Some(answer) = update.answer {
            self.answer = Some(answer);
        }
    }
}

impl From<QaRequest> for PipelineState {
    fn from(request: QaRequest) -> Self {
        match request {
            QaRequest::Query { question, content_hash } => Self {
                question,
                content_hash: Some(content_hash),
                ..Self::default()
            },
            QaRequest::Ingest {
                question,
                file_type,
                file_url,
            } => Self {
                question,
                file_type: Some(file_type),
                file_url: Some(file_url),
                ..Self::default()
            },
        }
    }
}

/// Final result of a pipeline run
#[derive(Debug, Clone)]
pub struct QaOutcome {
    pub question: String,
    pub answer: String,
    pub context: Vec<Chunk>,
    pub content_hash: Option<String>,
}

/// The question answering agent. One instance serves every request.
pub struct QaAgent {
    store: Arc<VectorStore>,
    processor: IngestionProcessor,
    generator: AnswerGenerator,
    top_k: usize,
}

impl QaAgent {
    pub fn new(
        store: Arc<VectorStore>,
        processor: IngestionProcessor,
        generator: AnswerGenerator,
        top_k: usize,
    ) -> Self {
        Self {
            store,
            processor,
            generator,
            top_k,
        }
    }

    /// Wire the agent from configuration with the given chat model
    pub async fn with_chat_model(config: &AppConfig, secrets: &SecretConfig, model: Arc<dyn ChatModel>) -> Result<Self> {
        let embedder = embeddings::create_embedder(&config.embedding, secrets)?;
        let store = VectorStore::connect(&config.vector_store, embedder).await?;
        let processor = IngestionProcessor::from_config(config)?;
        let generator = AnswerGenerator::new(model, ContextBudget::from(&config.generation));

        Ok(Self::new(Arc::new(store), processor, generator, config.retrieval.top_k))
    }

    /// Wire the agent from configuration with the OpenAI-compatible chat model
    pub async fn from_config(config: &AppConfig, secrets: &SecretConfig) -> Result<Self> {
        let model = Arc::new(OpenAIChatModel::new(&config.llm, secrets)?);
        Self::with_chat_model(config, secrets, model).await
    }

    pub fn store(&self) -> &VectorStore {
        &self.store
    }

    /// Run the pipeline for one request
    #[instrument(skip(self, request), fields(question = %request.question()))]
    pub async fn run(&self, request: QaRequest) -> Result<QaOutcome> {
        let ingest = matches!(request, QaRequest::Ingest { .. });
        let mut state = PipelineState::from(request);

        if ingest {
            let update = self.ingest_and_retrieve(&state).await?;
            state.merge(update);
        } else {
            let update = self.retrieve(&state).await?;
            state.merge(update);
        }

        let update = self.generate(&state).await?;
        state.merge(update);

        info!(
            content_hash = ?state.content_hash,
            context_chunks = state.context.len(),
            "Question answered"
        );

        Ok(QaOutcome {
            question: state.question,
            answer: state.answer.unwrap_or_default(),
            context: state.context,
            content_hash: state.content_hash,
        })
    }

    /// Store the requested document, then retrieve from it
    async fn ingest_and_retrieve(&self, state: &PipelineState) -> Result<StateUpdate> {
        let (Some(file_type), Some(file_url)) = (&state.file_type, &state.file_url) else {
            return Err(AppError::InvalidParams {
                message: "file_type and file_url are required for ingestion".to_string(),
            });
        };

        let report = self.processor.ingest(file_type, file_url, &self.store).await?;
        let context = self.search(&state.question, &report.content_hash).await?;

        Ok(StateUpdate {
            content_hash: Some(report.content_hash),
            context: Some(context),
            answer: None,
        })
    }

    /// Retrieve stored chunks for the requested content hash
    async fn retrieve(&self, state: &PipelineState) -> Result<StateUpdate> {
        let Some(content_hash) = &state.content_hash else {
            return Err(AppError::InvalidParams {
                message: "content_hash is required for retrieval".to_string(),
            });
        };

        let context = self.search(&state.question, content_hash).await?;
        Ok(StateUpdate {
            context: Some(context),
            ..StateUpdate::default()
        })
    }

    async fn generate(&self, state: &PipelineState) -> Result<StateUpdate> {
        let answer = self.generator.generate(&state.question, &state.context).await?;
        Ok(StateUpdate {
            answer: Some(answer),
            ..StateUpdate::default()
        })
    }

    async fn search(&self, question: &str, content_hash: &str) -> Result<Vec<Chunk>> {
        self.store.query(question, Some(content_hash), self.top_k).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_empty_params_are_missing() {
        let err = QaRequest::from_params(&Map::new()).unwrap_err();
        assert!(matches!(err, AppError::MissingParams));
        assert!(err.is_client_error());
    }

    #[test]
    fn test_query_shape() {
        let request = QaRequest::from_params(&params(json!({
            "question": "Is there a dolphin?",
            "content_hash": "abc"
        })))
        .unwrap();

        assert_eq!(
            request,
            QaRequest::Query {
                question: "Is there a dolphin?".into(),
                content_hash: "abc".into()
            }
        );
    }

    #[test]
    fn test_ingest_shape() {
        let request = QaRequest::from_params(&params(json!({
            "question": "Is there a dolphin?",
            "file_type": "txt",
            "file_url": "https://example.com/dolphin.txt"
        })))
        .unwrap();

        assert!(matches!(request, QaRequest::Ingest { ref file_type, .. } if file_type == "txt"));
        assert_eq!(request.question(), "Is there a dolphin?");
    }

    #[test]
    fn test_wrong_key_sets_are_invalid() {
        let shapes = [
            json!({ "question": "q" }),
            json!({ "content_hash": "abc" }),
            json!({ "question": "q", "file_type": "txt" }),
            json!({ "question": "q", "content_hash": "abc", "extra": 1 }),
            json!({ "question": "q", "content_hash": "abc", "file_type": "txt", "file_url": "https://x.y/z" }),
        ];

        for shape in shapes {
            let err = QaRequest::from_params(&params(shape.clone())).unwrap_err();
            assert!(
                matches!(err, AppError::InvalidParams { .. }),
                "{} should be invalid",
                shape
            );
        }
    }

    #[test]
    fn test_non_string_values_are_invalid() {
        let err = QaRequest::from_params(&params(json!({
            "question": "q",
            "content_hash": 42
        })))
        .unwrap_err();
        assert!(matches!(err, AppError::InvalidParams { ref message } if message.contains("content_hash")));
    }

    #[test]
    fn test_bad_url_is_invalid() {
        let err = QaRequest::from_params(&params(json!({
            "question": "q",
            "file_type": "txt",
            "file_url": "not a url"
        })))
        .unwrap_err();
        assert!(matches!(err, AppError::InvalidParams { .. }));
    }

    #[test]
    fn test_deserialize_validates_at_boundary() {
        let request: QaRequest =
            serde_json::from_value(json!({ "question": "q", "content_hash": "abc" })).unwrap();
        assert!(matches!(request, QaRequest::Query { .. }));

        let result: std::result::Result<QaRequest, _> = serde_json::from_value(json!({ "question": "q" }));
        assert!(result.is_err());
    }

    #[test]
    fn test_merge_overwrites_present_fields_only() {
        let mut state = PipelineState::from(QaRequest::Query {
            question: "q".into(),
            content_hash: "abc".into(),
        });

        state.merge(StateUpdate {
            answer: Some("first".into()),
            ..StateUpdate::default()
        });
        state.merge(StateUpdate {
            answer: Some("second".into()),
            ..StateUpdate::default()
        });

        assert_eq!(state.content_hash.as_deref(), Some("abc"));
        assert_eq!(state.answer.as_deref(), Some("second"));
        assert!(state.context.is_empty());
    }
}
