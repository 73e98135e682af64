//! docchat Core - Shared types, errors and provider traits
//!
//! This crate defines the abstractions used throughout docchat:
//! - Common error type and result alias
//! - Chat message model sent to completion providers
//! - The `LlmClient` trait implemented by completion backends
//! - Configuration management
//! - Retry policy for remote provider calls

pub mod config;
pub mod retry;

pub use config::{
    AppConfig, ChunkingConfig, CompletionConfig, CompletionProvider, ConfigError, DistanceMetric,
    DocumentConfig, EmbeddingConfig, LoggingConfig, RetrievalConfig, RetryConfig, StoreConfig,
};
pub use retry::RetryPolicy;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Core error type for docchat operations
#[derive(Error, Debug)]
pub enum DocChatError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Document not found: {}", .0.display())]
    DocumentNotFound(PathBuf),

    #[error("Document unreadable: {}: {message}", .path.display())]
    DocumentUnreadable { path: PathBuf, message: String },

    #[error("Embedding provider error{}: {message}", status_suffix(.status))]
    EmbeddingError {
        status: Option<u16>,
        message: String,
    },

    #[error("Completion provider error{}: {message}", status_suffix(.status))]
    CompletionError {
        status: Option<u16>,
        message: String,
    },

    #[error("Write conflict in collection '{collection}': duplicate ids {ids:?}")]
    WriteConflict {
        collection: String,
        ids: Vec<String>,
    },

    #[error("Vector store error: {0}")]
    StoreError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

impl DocChatError {
    /// Build an embedding error without an HTTP status (transport or parse failure)
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::EmbeddingError {
            status: None,
            message: message.into(),
        }
    }

    /// Build a completion error without an HTTP status
    pub fn completion(message: impl Into<String>) -> Self {
        Self::CompletionError {
            status: None,
            message: message.into(),
        }
    }

    /// Whether a retry of the same provider request may succeed.
    ///
    /// Transport failures (no status) and 408/429/5xx responses are transient;
    /// everything else, including local errors, is permanent.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::EmbeddingError { status, .. } | Self::CompletionError { status, .. } => {
                match status {
                    None => true,
                    Some(code) => *code == 408 || *code == 429 || (500..600).contains(code),
                }
            }
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, DocChatError>;

// ============================================================================
// Chat Messages
// ============================================================================

/// Role of a conversation message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A role-tagged message sent to a chat completion model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

// ============================================================================
// Traits
// ============================================================================

/// Trait for chat completion clients
#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    /// Send the messages and return the text of the first response choice
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;

    /// Get client name for logging
    fn name(&self) -> &str;
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_message_wire_format() {
        let msg = ChatMessage::system("be brief");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json, serde_json::json!({"role": "system", "content": "be brief"}));
    }

    #[test]
    fn test_transient_classification() {
        assert!(DocChatError::embedding("connection reset").is_transient());
        assert!(DocChatError::CompletionError {
            status: Some(429),
            message: "rate limited".into()
        }
        .is_transient());
        assert!(DocChatError::EmbeddingError {
            status: Some(503),
            message: "unavailable".into()
        }
        .is_transient());
        assert!(!DocChatError::EmbeddingError {
            status: Some(401),
            message: "bad key".into()
        }
        .is_transient());
        assert!(!DocChatError::ValidationError("x".into()).is_transient());
    }

    #[test]
    fn test_error_display_includes_status() {
        let err = DocChatError::CompletionError {
            status: Some(500),
            message: "boom".into(),
        };
        assert_eq!(err.to_string(), "Completion provider error (HTTP 500): boom");

        let err = DocChatError::embedding("timed out");
        assert_eq!(err.to_string(), "Embedding provider error: timed out");
    }

    #[test]
    fn test_config_error_converts() {
        let err: DocChatError = ConfigError::MissingRequired("OPENAI_API_KEY".into()).into();
        assert!(matches!(err, DocChatError::Config(_)));
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }
}
