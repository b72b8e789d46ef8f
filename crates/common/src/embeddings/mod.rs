//! Embedding service abstraction
//!
//! Provides a unified interface for the configured embedding backend:
//! - Hugging Face inference router (feature-extraction pipeline)
//! - OpenAI-compatible `/embeddings` endpoints
//! - A deterministic feature-hashing embedder for offline use and tests
//!
//! Calls are never retried; a failed request fails the ingestion or query.

use crate::config::{EmbeddingConfig, SecretConfig};
use crate::errors::{AppError, Result};
use crate::metrics;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Trait for embedding generation
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts (batch)
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Get the model name
    fn model_name(&self) -> &str;

    /// Get the embedding dimension, 0 when only known after the first call
    fn dimension(&self) -> usize;
}

const HUGGINGFACE_ROUTER: &str = "https://router.huggingface.co";
const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

fn http_client(timeout_secs: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| AppError::Configuration {
            message: format!("Failed to create HTTP client: {}", e),
        })
}

/// Hugging Face inference client
pub struct HuggingFaceEmbedder {
    client: reqwest::Client,
    api_token: String,
    model: String,
    endpoint: String,
    batch_size: usize,
}

#[derive(Serialize)]
struct FeatureExtractionRequest<'a> {
    inputs: &'a [String],
}

impl HuggingFaceEmbedder {
    /// Create a new Hugging Face embedder for a model/provider pair
    pub fn new(api_token: String, config: &EmbeddingConfig) -> Result<Self> {
        let base = config
            .api_base
            .clone()
            .unwrap_or_else(|| HUGGINGFACE_ROUTER.to_string());
        let endpoint = format!(
            "{}/{}/models/{}/pipeline/feature-extraction",
            base.trim_end_matches('/'),
            config.provider,
            config.model
        );

        Ok(Self {
            client: http_client(config.timeout_secs)?,
            api_token,
            model: config.model.clone(),
            endpoint,
            batch_size: config.batch_size.max(1),
        })
    }

    async fn make_request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_token)
            .json(&FeatureExtractionRequest { inputs: texts })
            .send()
            .await
            .map_err(|e| AppError::EmbeddingError {
                message: format!("Request failed: {}", e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::EmbeddingError {
                message: format!("API error {}: {}", status, body),
            });
        }

        let embeddings: Vec<Vec<f32>> = response.json().await.map_err(|e| AppError::EmbeddingError {
            message: format!("Failed to parse response: {}", e),
        })?;

        if embeddings.len() != texts.len() {
            return Err(AppError::EmbeddingError {
                message: format!(
                    "Expected {} embeddings, received {}",
                    texts.len(),
                    embeddings.len()
                ),
            });
        }

        Ok(embeddings)
    }
}

#[async_trait]
impl Embedder for HuggingFaceEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let embeddings = self.embed_batch(&[text.to_string()]).await?;
        embeddings.into_iter().next().ok_or_else(|| AppError::EmbeddingError {
            message: "Empty response".to_string(),
        })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut all_embeddings = Vec::with_capacity(texts.len());

        for batch in texts.chunks(self.batch_size) {
            let start = Instant::now();
            let result = self.make_request(batch).await;
            metrics::record_embedding(
                start.elapsed().as_secs_f64(),
                &self.model,
                batch.len(),
                result.is_ok(),
            );
            all_embeddings.extend(result?);
        }

        Ok(all_embeddings)
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        0
    }
}

/// OpenAI embedding client
pub struct OpenAIEmbedder {
    client: reqwest::Client,
    api_key: String,
    model: String,
    dimension: usize,
    base_url: String,
    batch_size: usize,
}

#[derive(Serialize)]
struct OpenAIRequest<'a> {
    input: &'a [String],
    model: &'a str,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    data: Vec<OpenAIEmbedding>,
}

#[derive(Deserialize)]
struct OpenAIEmbedding {
    embedding: Vec<f32>,
}

impl OpenAIEmbedder {
    /// Create a new OpenAI embedder
    pub fn new(api_key: String, config: &EmbeddingConfig, base_url: Option<String>) -> Result<Self> {
        let dimension = match config.model.as_str() {
            "text-embedding-ada-002" => 1536,
            "text-embedding-3-small" => 1536,
            "text-embedding-3-large" => 3072,
            _ => 0,
        };

        Ok(Self {
            client: http_client(config.timeout_secs)?,
            api_key,
            model: config.model.clone(),
            dimension,
            base_url: base_url.unwrap_or_else(|| OPENAI_API_BASE.to_string()),
            batch_size: config.batch_size.max(1),
        })
    }

    async fn make_request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/embeddings", self.base_url.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&OpenAIRequest {
                input: texts,
                model: &self.model,
            })
            .send()
            .await
            .map_err(|e| AppError::EmbeddingError {
                message: format!("Request failed: {}", e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::EmbeddingError {
                message: format!("API error {}: {}", status, body),
            });
        }

        let result: OpenAIResponse = response.json().await.map_err(|e| AppError::EmbeddingError {
            message: format!("Failed to parse response: {}", e),
        })?;

        Ok(result.data.into_iter().map(|e| e.embedding).collect())
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let embeddings = self.embed_batch(&[text.to_string()]).await?;
        embeddings.into_iter().next().ok_or_else(|| AppError::EmbeddingError {
            message: "Empty response".to_string(),
        })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut all_embeddings = Vec::with_capacity(texts.len());

        for batch in texts.chunks(self.batch_size) {
            let start = Instant::now();
            let result = self.make_request(batch).await;
            metrics::record_embedding(
                start.elapsed().as_secs_f64(),
                &self.model,
                batch.len(),
                result.is_ok(),
            );
            all_embeddings.extend(result?);
        }

        Ok(all_embeddings)
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Feature-hashing embedder.
///
/// Each lowercase alphanumeric token is hashed into one of `dimension`
/// buckets with a hash-derived sign, and the vector is L2-normalised.
/// Texts sharing words land close together, which is enough for offline
/// runs and tests.
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];

        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let digest = Sha256::digest(token.to_lowercase().as_bytes());
            let mut bucket_bytes = [0u8; 8];
            bucket_bytes.copy_from_slice(&digest[..8]);
            let bucket = (u64::from_le_bytes(bucket_bytes) % self.dimension as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        vector
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_text(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }

    fn model_name(&self) -> &str {
        "feature-hash"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Create an embedder based on configuration
pub fn create_embedder(config: &EmbeddingConfig, secrets: &SecretConfig) -> Result<Arc<dyn Embedder>> {
    match config.backend.as_str() {
        "huggingface" => {
            let token = secrets.huggingfacehub_api_token.clone().ok_or_else(|| {
                AppError::Configuration {
                    message: "HUGGINGFACEHUB_API_TOKEN is required for the huggingface embedding backend"
                        .to_string(),
                }
            })?;
            Ok(Arc::new(HuggingFaceEmbedder::new(token, config)?))
        }
        "openai" => {
            let key = secrets.openai_api_key.clone().ok_or_else(|| AppError::Configuration {
                message: "OPENAI_API_KEY is required for the openai embedding backend".to_string(),
            })?;
            let base_url = config
                .api_base
                .clone()
                .or_else(|| secrets.openai_base_url.clone());
            Ok(Arc::new(OpenAIEmbedder::new(key, config, base_url)?))
        }
        "hash" => Ok(Arc::new(HashEmbedder::new(config.dimension))),
        other => Err(AppError::Configuration {
            message: format!("Unknown embedding backend: {}", other),
        }),
    }
}

/// Cosine similarity of two vectors, 0.0 when undefined
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    let denom = norm_a * norm_b;

    if denom <= f32::EPSILON {
        0.0
    } else {
        dot / denom
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hash_embedder_dimension_and_norm() {
        let embedder = HashEmbedder::new(64);
        let embedding = embedder.embed("A dolphin named Jian-Jian-tun exists.").await.unwrap();
        assert_eq!(embedding.len(), 64);

        let norm: f32 = embedding.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_hash_embedder_is_deterministic_and_case_insensitive() {
        let embedder = HashEmbedder::new(128);
        let a = embedder.embed("Jian-Jian-tun").await.unwrap();
        let b = embedder.embed("jian jian TUN").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_hash_embedder_ranks_shared_words_higher() {
        let embedder = HashEmbedder::new(256);
        let query = embedder.embed("Is there a dolphin named Jian-Jian-tun?").await.unwrap();
        let related = embedder.embed("A dolphin named Jian-Jian-tun exists.").await.unwrap();
        let unrelated = embedder.embed("Quarterly revenue grew in Europe.").await.unwrap();

        assert!(cosine_similarity(&query, &related) > cosine_similarity(&query, &unrelated));
    }

    #[tokio::test]
    async fn test_hash_batch() {
        let embedder = HashEmbedder::new(32);
        let texts = vec!["text1".to_string(), "text2".to_string()];
        let embeddings = embedder.embed_batch(&texts).await.unwrap();
        assert_eq!(embeddings.len(), 2);
        assert_eq!(embeddings[0].len(), 32);
    }

    #[test]
    fn test_cosine_similarity_edge_cases() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert!((cosine_similarity(&[1.0, 2.0], &[2.0, 4.0]) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_create_embedder_requires_token() {
        let config = EmbeddingConfig::default();
        let result = create_embedder(&config, &SecretConfig::default());
        assert!(matches!(result, Err(AppError::Configuration { .. })));
    }

    #[test]
    fn test_create_embedder_hash_backend() {
        let config = EmbeddingConfig {
            backend: "hash".into(),
            dimension: 48,
            ..EmbeddingConfig::default()
        };
        let embedder = create_embedder(&config, &SecretConfig::default()).unwrap();
        assert_eq!(embedder.dimension(), 48);
        assert_eq!(embedder.model_name(), "feature-hash");
    }

    #[test]
    fn test_huggingface_endpoint_uses_provider_and_model() {
        let config = EmbeddingConfig {
            api_base: Some("http://localhost:9000/".into()),
            ..EmbeddingConfig::default()
        };
        let embedder = HuggingFaceEmbedder::new("token".into(), &config).unwrap();
        assert_eq!(
            embedder.endpoint,
            "http://localhost:9000/hf-inference/models/sentence-transformers/all-MiniLM-L6-v2/pipeline/feature-extraction"
        );
    }

    #[test]
    fn test_unknown_backend() {
        let config = EmbeddingConfig {
            backend: "word2vec".into(),
            ..EmbeddingConfig::default()
        };
        assert!(create_embedder(&config, &SecretConfig::default()).is_err());
    }
}
