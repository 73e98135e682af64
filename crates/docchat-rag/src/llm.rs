//! LLM Client implementations
//!
//! Provides chat completion clients for Azure OpenAI deployments and the
//! OpenAI API. Both send the full message list and return the first choice.
//!
//! Author: hephaex@gmail.com

use std::time::Duration;

use async_trait::async_trait;
use docchat_core::{
    AppConfig, ChatMessage, CompletionProvider, ConfigError, DocChatError, LlmClient, Result,
    RetryPolicy,
};
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};

// ============================================================================
// Wire Types
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// Extract the first choice's content from a chat completion body
fn parse_chat_response(body: &str) -> Result<String> {
    let result: ChatResponse = serde_json::from_str(body).map_err(|e| {
        DocChatError::CompletionError {
            status: Some(200),
            message: format!("Failed to parse response: {e}"),
        }
    })?;

    result
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| DocChatError::CompletionError {
            status: Some(200),
            message: "No response generated".to_string(),
        })
}

/// Send a prepared request and decode the first choice
async fn send_chat(provider: &str, request: RequestBuilder) -> Result<String> {
    let response = request
        .send()
        .await
        .map_err(|e| DocChatError::completion(format!("Request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        return Err(DocChatError::CompletionError {
            status: Some(status.as_u16()),
            message: format!("{provider} error: {error_text}"),
        });
    }

    let body = response
        .text()
        .await
        .map_err(|e| DocChatError::completion(format!("Failed to read response: {e}")))?;

    parse_chat_response(&body)
}

fn http_client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| DocChatError::completion(format!("Failed to build HTTP client: {e}")))
}

// ============================================================================
// Azure OpenAI Client
// ============================================================================

/// Azure OpenAI chat completion client (deployment based)
pub struct AzureOpenAiClient {
    client: Client,
    api_key: String,
    endpoint: String,
    deployment: String,
    api_version: String,
    max_tokens: u32,
    temperature: f32,
    retry: RetryPolicy,
}

impl AzureOpenAiClient {
    /// Create a new Azure OpenAI client
    pub fn new(
        api_key: impl Into<String>,
        endpoint: impl Into<String>,
        deployment: impl Into<String>,
        api_version: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            deployment: deployment.into(),
            api_version: api_version.into(),
            max_tokens: 1024,
            temperature: 0.2,
            retry: RetryPolicy::none(),
        }
    }

    /// Create from config
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let api_key = config
            .completion_api_key()
            .ok_or_else(|| ConfigError::MissingRequired("AZURE_OPENAI_API_KEY".to_string()))?;
        let endpoint = config
            .completion
            .endpoint
            .as_deref()
            .ok_or_else(|| ConfigError::MissingRequired("AZURE_OPENAI_ENDPOINT".to_string()))?;

        let mut client = Self::new(
            api_key,
            endpoint,
            config.completion.deployment.clone(),
            config.completion.api_version.clone(),
        );
        client.client = http_client(config.completion.timeout_secs)?;
        client.max_tokens = config.completion.max_tokens;
        client.temperature = config.completion.temperature;
        client.retry = RetryPolicy::from_config(&config.retry);
        Ok(client)
    }

    /// Set sampling temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    fn url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions",
            self.endpoint, self.deployment
        )
    }
}

#[async_trait]
impl LlmClient for AzureOpenAiClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let request = ChatRequest {
            model: None,
            messages,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        self.retry
            .run("completion request", || {
                send_chat(
                    "Azure OpenAI",
                    self.client
                        .post(self.url())
                        .query(&[("api-version", self.api_version.as_str())])
                        .header("api-key", &self.api_key)
                        .json(&request),
                )
            })
            .await
    }

    fn name(&self) -> &str {
        "azure-openai"
    }
}

// ============================================================================
// OpenAI Client
// ============================================================================

/// OpenAI chat completion client
pub struct OpenAiChatClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    retry: RetryPolicy,
}

impl OpenAiChatClient {
    /// Create a new OpenAI client
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        max_tokens: u32,
        temperature: f32,
    ) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: model.into(),
            max_tokens,
            temperature,
            retry: RetryPolicy::none(),
        }
    }

    /// Create from config
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let api_key = config
            .completion_api_key()
            .ok_or_else(|| ConfigError::MissingRequired("OPENAI_API_KEY".to_string()))?;

        Ok(Self {
            client: http_client(config.completion.timeout_secs)?,
            api_key: api_key.to_string(),
            base_url: config.completion.base_url.trim_end_matches('/').to_string(),
            model: config.completion.model.clone(),
            max_tokens: config.completion.max_tokens,
            temperature: config.completion.temperature,
            retry: RetryPolicy::from_config(&config.retry),
        })
    }

    /// Set custom base URL (for compatible APIs)
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

#[async_trait]
impl LlmClient for OpenAiChatClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let request = ChatRequest {
            model: Some(&self.model),
            messages,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        self.retry
            .run("completion request", || {
                send_chat(
                    "OpenAI",
                    self.client
                        .post(format!("{}/chat/completions", self.base_url))
                        .bearer_auth(&self.api_key)
                        .json(&request),
                )
            })
            .await
    }

    fn name(&self) -> &str {
        "openai"
    }
}

// ============================================================================
// Factory function
// ============================================================================

/// Create an LLM client from config
pub fn create_llm_client(config: &AppConfig) -> Result<Box<dyn LlmClient>> {
    match config.completion.provider {
        CompletionProvider::Azure => Ok(Box::new(AzureOpenAiClient::from_config(config)?)),
        CompletionProvider::OpenAi => Ok(Box::new(OpenAiChatClient::from_config(config)?)),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn azure_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.embedding.api_key = Some("sk-test".to_string());
        config.completion.api_key = Some("az-test".to_string());
        config.completion.endpoint = Some("https://example.openai.azure.com/".to_string());
        config
    }

    #[test]
    fn test_azure_url() {
        let client = AzureOpenAiClient::from_config(&azure_config()).unwrap();
        assert_eq!(
            client.url(),
            "https://example.openai.azure.com/openai/deployments/gpt-4o/chat/completions"
        );
        assert_eq!(client.api_version, "2024-06-01");
        assert!((client.temperature - 0.2).abs() < f32::EPSILON);
    }

    #[test]
    fn test_azure_requires_endpoint() {
        let mut config = azure_config();
        config.completion.endpoint = None;
        assert!(matches!(
            AzureOpenAiClient::from_config(&config).err(),
            Some(DocChatError::Config(_))
        ));
    }

    #[test]
    fn test_factory_selects_provider() {
        let client = create_llm_client(&azure_config()).unwrap();
        assert_eq!(client.name(), "azure-openai");

        let mut config = azure_config();
        config.completion.provider = CompletionProvider::OpenAi;
        config.completion.api_key = None;
        let client = create_llm_client(&config).unwrap();
        assert_eq!(client.name(), "openai");
    }

    #[test]
    fn test_openai_client_creation() {
        let client = OpenAiChatClient::new("test-key", "gpt-4o-mini", 2048, 0.1);
        assert_eq!(client.model, "gpt-4o-mini");
    }

    #[test]
    fn test_request_wire_format() {
        let messages = vec![ChatMessage::system("rules"), ChatMessage::user("hi")];
        let request = ChatRequest {
            model: None,
            messages: &messages,
            max_tokens: 64,
            temperature: 0.2,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("model").is_none());
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "hi");
    }

    #[test]
    fn test_parse_first_choice() {
        let body = r#"{
            "choices": [
                {"index": 0, "message": {"role": "assistant", "content": "  first  "}, "finish_reason": "stop"},
                {"index": 1, "message": {"role": "assistant", "content": "second"}, "finish_reason": "stop"}
            ]
        }"#;
        assert_eq!(parse_chat_response(body).unwrap(), "  first  ");
    }

    #[test]
    fn test_parse_no_choices() {
        let err = parse_chat_response(r#"{"choices": []}"#).unwrap_err();
        assert!(matches!(err, DocChatError::CompletionError { .. }));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_parse_null_content() {
        let body = r#"{"choices": [{"message": {"role": "assistant", "content": null}}]}"#;
        assert!(parse_chat_response(body).is_err());
    }
}
