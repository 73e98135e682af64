//! docchat Configuration Management
//!
//! Handles configuration from environment variables, config files,
//! and command-line arguments with sensible defaults for development.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Source document
    pub document: DocumentConfig,

    /// Vector store location and collection
    pub store: StoreConfig,

    /// Chunking parameters
    pub chunking: ChunkingConfig,

    /// Retrieval parameters
    pub retrieval: RetrievalConfig,

    /// Embedding provider configuration
    pub embedding: EmbeddingConfig,

    /// Chat completion provider configuration
    pub completion: CompletionConfig,

    /// Retry policy for provider calls
    pub retry: RetryConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup (defaults + lookup values)
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        config.apply_lookup(lookup)?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path,
            message: e.to_string(),
        })
    }

    /// Merge with environment variables (env takes precedence)
    pub fn with_env_override(mut self) -> Result<Self, ConfigError> {
        self.apply_lookup(|key| std::env::var(key).ok())?;
        Ok(self)
    }

    /// Override fields for every key the lookup resolves to a non-empty value
    pub fn apply_lookup<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        // Document and store
        if let Some(path) = get("DOCCHAT_DOCUMENT") {
            self.document.path = PathBuf::from(path);
        }
        if let Some(dir) = get("DOCCHAT_STORE_DIR") {
            self.store.directory = PathBuf::from(dir);
        }
        if let Some(name) = get("DOCCHAT_COLLECTION") {
            self.store.collection = name;
        }
        if let Some(metric) = get("DOCCHAT_DISTANCE") {
            self.store.distance = metric.parse()?;
        }
        if let Some(k) = get("DOCCHAT_TOP_K") {
            self.retrieval.top_k = k.parse().map_err(|_| ConfigError::InvalidValue {
                key: "DOCCHAT_TOP_K".to_string(),
                value: k,
            })?;
        }

        // Embeddings
        if let Some(key) = get("OPENAI_API_KEY") {
            self.embedding.api_key = Some(key);
        }
        if let Some(url) = get("OPENAI_BASE_URL") {
            self.embedding.base_url = url.clone();
            self.completion.base_url = url;
        }
        if let Some(model) = get("EMBEDDING_MODEL") {
            self.embedding.model = model;
        }

        // Completions
        if let Some(provider) = get("COMPLETION_PROVIDER") {
            self.completion.provider = provider.parse()?;
        }
        if let Some(key) = get("AZURE_OPENAI_API_KEY") {
            self.completion.api_key = Some(key);
        }
        if let Some(endpoint) = get("AZURE_OPENAI_ENDPOINT") {
            self.completion.endpoint = Some(endpoint);
        }
        if let Some(version) = get("AZURE_OPENAI_API_VERSION") {
            self.completion.api_version = version;
        }
        if let Some(deployment) = get("AZURE_OPENAI_DEPLOYMENT") {
            self.completion.deployment = deployment;
        }
        if let Some(model) = get("LLM_MODEL") {
            self.completion.model = model;
        }

        // Logging
        if let Some(level) = get("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = get("LOG_FORMAT") {
            self.logging.json_format = format.eq_ignore_ascii_case("json");
        }

        Ok(())
    }

    /// API key used for chat completions.
    ///
    /// The OpenAI provider shares the embedding key unless one is set explicitly.
    pub fn completion_api_key(&self) -> Option<&str> {
        match (&self.completion.api_key, self.completion.provider) {
            (Some(key), _) => Some(key.as_str()),
            (None, CompletionProvider::OpenAi) => self.embedding.api_key.as_deref(),
            (None, CompletionProvider::Azure) => None,
        }
    }

    /// Check that credentials are present and parameters are consistent.
    ///
    /// Must pass before any provider client is constructed.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.embedding.api_key.is_none() {
            return Err(ConfigError::MissingRequired("OPENAI_API_KEY".to_string()));
        }

        match self.completion.provider {
            CompletionProvider::Azure => {
                if self.completion_api_key().is_none() {
                    return Err(ConfigError::MissingRequired(
                        "AZURE_OPENAI_API_KEY".to_string(),
                    ));
                }
                if self.completion.endpoint.is_none() {
                    return Err(ConfigError::MissingRequired(
                        "AZURE_OPENAI_ENDPOINT".to_string(),
                    ));
                }
            }
            CompletionProvider::OpenAi => {
                if self.completion_api_key().is_none() {
                    return Err(ConfigError::MissingRequired("OPENAI_API_KEY".to_string()));
                }
            }
        }

        self.validate_pipeline()
    }

    /// Check the parameters that do not involve credentials
    pub fn validate_pipeline(&self) -> Result<(), ConfigError> {
        if self.chunking.chunk_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "chunking.chunk_size".to_string(),
                value: "0".to_string(),
            });
        }
        if self.chunking.overlap >= self.chunking.chunk_size {
            return Err(ConfigError::InvalidValue {
                key: "chunking.overlap".to_string(),
                value: format!(
                    "{} (must be smaller than chunk_size {})",
                    self.chunking.overlap, self.chunking.chunk_size
                ),
            });
        }
        if self.retrieval.top_k == 0 {
            return Err(ConfigError::InvalidValue {
                key: "retrieval.top_k".to_string(),
                value: "0".to_string(),
            });
        }
        if self.store.collection.trim().is_empty() {
            return Err(ConfigError::MissingRequired("store.collection".to_string()));
        }
        Ok(())
    }
}

/// Source document configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentConfig {
    /// Path to the document answered against
    pub path: PathBuf,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/document.pdf"),
        }
    }
}

/// Vector store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding persisted collections (created if missing)
    pub directory: PathBuf,

    /// Collection name
    pub collection: String,

    /// Distance metric used for new collections
    pub distance: DistanceMetric,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("data/vector_store"),
            collection: "documents".to_string(),
            distance: DistanceMetric::L2,
        }
    }
}

/// Distance metric for nearest-neighbour queries (smaller is closer)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// Squared Euclidean distance
    #[default]
    L2,
    /// One minus cosine similarity
    Cosine,
    /// One minus dot product
    InnerProduct,
}

impl std::str::FromStr for DistanceMetric {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "l2" => Ok(Self::L2),
            "cosine" => Ok(Self::Cosine),
            "ip" | "inner_product" => Ok(Self::InnerProduct),
            _ => Err(ConfigError::InvalidValue {
                key: "DOCCHAT_DISTANCE".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Chunking configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Window size in characters
    pub chunk_size: usize,

    /// Characters shared by consecutive windows
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 800,
            overlap: 200,
        }
    }
}

impl ChunkingConfig {
    /// Distance between window starts
    pub fn step(&self) -> usize {
        self.chunk_size.saturating_sub(self.overlap)
    }
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Number of passages retrieved per question
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: 4 }
    }
}

/// Embedding provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// OpenAI API key
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// OpenAI API base URL
    pub base_url: String,

    /// Embedding model name
    pub model: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "text-embedding-3-small".to_string(),
            timeout_secs: 60,
        }
    }
}

/// Chat completion provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    /// Provider to use
    pub provider: CompletionProvider,

    /// Provider API key
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// Azure OpenAI resource endpoint
    pub endpoint: Option<String>,

    /// Azure OpenAI API version
    pub api_version: String,

    /// Azure OpenAI deployment name
    pub deployment: String,

    /// OpenAI API base URL
    pub base_url: String,

    /// Model name (OpenAI provider)
    pub model: String,

    /// Sampling temperature
    pub temperature: f32,

    /// Maximum tokens for completion
    pub max_tokens: u32,

    /// Replaces the built-in system prompt when set
    pub system_prompt: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            provider: CompletionProvider::Azure,
            api_key: None,
            endpoint: None,
            api_version: "2024-06-01".to_string(),
            deployment: "gpt-4o".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o".to_string(),
            temperature: 0.2,
            max_tokens: 1024,
            system_prompt: None,
            timeout_secs: 60,
        }
    }
}

/// Supported completion providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompletionProvider {
    Azure,
    #[serde(rename = "openai")]
    OpenAi,
}

impl std::str::FromStr for CompletionProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "azure" => Ok(Self::Azure),
            "openai" => Ok(Self::OpenAi),
            _ => Err(ConfigError::InvalidValue {
                key: "COMPLETION_PROVIDER".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Retry configuration for provider requests
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt (0 disables retrying)
    pub max_retries: u32,

    /// Delay before the first retry in milliseconds
    pub initial_backoff_ms: u64,

    /// Upper bound on any single delay in milliseconds
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_backoff_ms: 500,
            max_backoff_ms: 8000,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// JSON format for logs
    pub json_format: bool,

    /// Include file/line in logs
    pub include_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            include_location: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}
