//! Embedding client for generating vector representations
//!
//! Supports the OpenAI embeddings API (and compatible endpoints).
//!
//! Author: hephaex@gmail.com

use std::time::Duration;

use async_trait::async_trait;
use docchat_core::{ConfigError, DocChatError, EmbeddingConfig, Result, RetryConfig, RetryPolicy};
use reqwest::Client;
use serde::{Deserialize, Serialize};

// ============================================================================
// Embedding Trait
// ============================================================================

/// Trait for embedding generation
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Generate embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let results = self.embed_batch(&[text.to_string()]).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| DocChatError::embedding("No embedding returned"))
    }

    /// Generate embeddings for multiple texts; one vector per input, in order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Model identifier, for logging
    fn model(&self) -> &str;
}

// ============================================================================
// OpenAI Embedding Client
// ============================================================================

/// OpenAI embedding API client
pub struct OpenAiEmbedding {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    retry: RetryPolicy,
}

#[derive(Debug, Serialize)]
struct OpenAiEmbeddingRequest<'a> {
    input: &'a [String],
    model: &'a str,
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

impl OpenAiEmbedding {
    /// Create a new OpenAI embedding client
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: model.into(),
            retry: RetryPolicy::none(),
        }
    }

    /// Create from config
    pub fn from_config(config: &EmbeddingConfig, retry: &RetryConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .as_ref()
            .ok_or_else(|| ConfigError::MissingRequired("OPENAI_API_KEY".to_string()))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DocChatError::embedding(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key: api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            retry: RetryPolicy::from_config(retry),
        })
    }

    /// Set custom base URL (for compatible APIs)
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set retry policy
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let request = OpenAiEmbeddingRequest {
            input: texts,
            model: &self.model,
        };

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| DocChatError::embedding(format!("Embedding request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(DocChatError::EmbeddingError {
                status: Some(status.as_u16()),
                message: format!("OpenAI embedding error: {error_text}"),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| DocChatError::embedding(format!("Failed to read embedding response: {e}")))?;

        parse_embedding_response(&body, texts.len())
    }
}

/// Decode an embeddings response, restoring input order by `index`
fn parse_embedding_response(body: &str, expected: usize) -> Result<Vec<Vec<f32>>> {
    let result: OpenAiEmbeddingResponse = serde_json::from_str(body).map_err(|e| {
        DocChatError::EmbeddingError {
            status: Some(200),
            message: format!("Failed to parse embedding response: {e}"),
        }
    })?;

    if result.data.len() != expected {
        return Err(DocChatError::EmbeddingError {
            status: Some(200),
            message: format!(
                "Expected {expected} embeddings, provider returned {}",
                result.data.len()
            ),
        });
    }

    // Sort by index and extract embeddings
    let mut embeddings = result.data;
    embeddings.sort_by_key(|e| e.index);

    if embeddings.iter().enumerate().any(|(i, e)| e.index != i) {
        return Err(DocChatError::EmbeddingError {
            status: Some(200),
            message: "Embedding response indices do not match the input".to_string(),
        });
    }

    Ok(embeddings.into_iter().map(|e| e.embedding).collect())
}

#[async_trait]
impl EmbeddingClient for OpenAiEmbedding {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        tracing::debug!("Embedding {} texts with {}", texts.len(), self.model);
        self.retry.run("embedding request", move || self.request(texts)).await
    }

    fn model(&self) -> &str {
        &self.model
    }
}

// ============================================================================
// Tests
// ============================================================================
