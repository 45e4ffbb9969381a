//! OpenAI-compatible HTTP client
//!
//! Talks to any server exposing `/v1/chat/completions` (Ollama, LM Studio,
//! vLLM, hosted OpenAI). Messages carrying an image are sent as a content-part
//! array with an `image_url` part, which is what vision models expect.

use super::client::LLMClient;
use super::error::BackendError;
use super::types::{ChatMessage, LLMRequest, LLMResponse, MessageRole};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Default request timeout for API calls
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

pub struct OpenAICompatibleClient {
    /// API endpoint URL, without the `/v1` suffix
    endpoint: String,

    /// Model name to use for inference
    model: String,

    /// Bearer token, if the server wants one
    api_key: Option<String>,

    /// Shared HTTP client with connection pooling
    http_client: Client,

    /// Request timeout duration
    timeout: Duration,
}

impl OpenAICompatibleClient {
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Result<Self, BackendError> {
        Self::with_timeout(endpoint, model, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn with_timeout(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, BackendError> {
        let http_client = Client::builder().timeout(timeout).build().map_err(|e| {
            BackendError::ConfigurationError {
                message: format!("Failed to build HTTP client: {}", e),
            }
        })?;

        Ok(Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: None,
            http_client,
            timeout,
        })
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key.filter(|key| !key.is_empty());
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Checks if the server is available via `/v1/models`
    ///
    /// `Ok(false)` when unreachable or unhealthy, `Err` for anything else.
    pub async fn health_check(&self) -> Result<bool, BackendError> {
        let url = format!("{}/v1/models", self.endpoint);

        debug!("Checking service health at {}", url);

        match self.authorized(self.http_client.get(&url)).send().await {
            Ok(response) => {
                let is_healthy = response.status().is_success();
                if is_healthy {
                    info!("Service health check successful");
                } else {
                    warn!("Service health check failed with status: {}", response.status());
                }
                Ok(is_healthy)
            }
            Err(e) => {
                if e.is_timeout() {
                    warn!("Service health check timed out");
                    Ok(false)
                } else if e.is_connect() {
                    warn!("Cannot connect to service at {}", self.endpoint);
                    Ok(false)
                } else {
                    error!("Service health check error: {}", e);
                    Err(BackendError::NetworkError {
                        message: format!("Health check failed: {}", e),
                    })
                }
            }
        }
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    fn build_request(&self, request: &LLMRequest) -> OpenAIRequest {
        OpenAIRequest {
            model: self.model.clone(),
            messages: request.messages.iter().map(Message::from).collect(),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream: Some(false),
        }
    }

    fn map_send_error(&self, e: reqwest::Error) -> BackendError {
        if e.is_timeout() {
            error!("Service request timed out after {:?}", self.timeout);
            BackendError::TimeoutError {
                seconds: self.timeout.as_secs(),
            }
        } else if e.is_connect() {
            error!("Cannot connect to service at {}", self.endpoint);
            BackendError::NetworkError {
                message: format!("Connection failed: {}", e),
            }
        } else {
            error!("Service request error: {}", e);
            BackendError::NetworkError {
                message: format!("Request failed: {}", e),
            }
        }
    }
}

fn status_error(status: StatusCode, retry_after: Option<u64>, body: String) -> BackendError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => BackendError::RateLimitError { retry_after },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => BackendError::AuthenticationError {
            message: format!("HTTP {}: {}", status, body),
        },
        _ => BackendError::ApiError {
            message: format!("HTTP {}: {}", status, body),
            status_code: Some(status.as_u16()),
        },
    }
}

#[async_trait]
impl LLMClient for OpenAICompatibleClient {
    async fn chat(&self, request: LLMRequest) -> Result<LLMResponse, BackendError> {
        let url = format!("{}/v1/chat/completions", self.endpoint);
        let body = self.build_request(&request);

        debug!(
            messages = body.messages.len(),
            images = request.messages.iter().filter(|m| m.has_image()).count(),
            "Sending chat request"
        );

        let start = Instant::now();

        let response = self
            .authorized(self.http_client.post(&url))
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        if !response.status().is_success() {
            let status = response.status();
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            let text = response.text().await.unwrap_or_default();

            error!("Service API returned error status {}: {}", status, text);
            return Err(status_error(status, retry_after, text));
        }

        let api_response: OpenAIResponse = response.json().await.map_err(|e| {
            error!("Failed to parse service response: {}", e);
            BackendError::InvalidResponse {
                message: format!("JSON parse error: {}", e),
                raw_response: None,
            }
        })?;

        let elapsed = start.elapsed();
        debug!(
            elapsed_ms = elapsed.as_millis(),
            prompt_tokens = api_response.usage.as_ref().map(|u| u.prompt_tokens).unwrap_or(0),
            completion_tokens = api_response
                .usage
                .as_ref()
                .map(|u| u.completion_tokens)
                .unwrap_or(0),
            "Chat completion received"
        );

        let content = api_response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .ok_or_else(|| BackendError::InvalidResponse {
                message: "No content in service response".to_string(),
                raw_response: None,
            })?;

        Ok(LLMResponse::text(content, elapsed))
    }

    fn name(&self) -> &str {
        "openai-compatible"
    }

    fn model_info(&self) -> Option<String> {
        Some(format!("{} @ {}", self.model, self.endpoint))
    }
}

impl fmt::Debug for OpenAICompatibleClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAICompatibleClient")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize)]
struct Message {
    role: MessageRole,
    content: MessageContent,
}

/// Plain text, or text plus an image as content parts
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, Serialize)]
struct ImageUrl {
    url: String,
}

impl From<&ChatMessage> for Message {
    fn from(message: &ChatMessage) -> Self {
        let content = match &message.image_url {
            Some(url) => MessageContent::Parts(vec![
                ContentPart::Text {
                    text: message.content.clone(),
                },
                ContentPart::ImageUrl {
                    image_url: ImageUrl { url: url.clone() },
                },
            ]),
            None => MessageContent::Text(message.content.clone()),
        };
        Self {
            role: message.role,
            content,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAIResponse {
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Clone, Deserialize)]
struct Choice {
    message: Option<ResponseMessage>,
}

#[derive(Debug, Clone, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client() -> OpenAICompatibleClient {
        OpenAICompatibleClient::new("http://localhost:11434/", "qwen2.5vl:7b").unwrap()
    }

    #[test]
    fn test_client_creation() {
        let client = client();
        assert_eq!(client.endpoint(), "http://localhost:11434");
        assert_eq!(client.name(), "openai-compatible");
        assert_eq!(
            client.model_info().unwrap(),
            "qwen2.5vl:7b @ http://localhost:11434"
        );
    }

    #[test]
    fn test_text_message_serialization() {
        let request = client().build_request(
            &LLMRequest::new(vec![ChatMessage::system("Be precise")]).with_temperature(0.1),
        );

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["messages"][0], json!({"role": "system", "content": "Be precise"}));
        assert!(value.get("max_tokens").is_none());
        assert_eq!(value["stream"], false);
    }

    #[test]
    fn test_image_message_serialization() {
        let request = client().build_request(&LLMRequest::new(vec![ChatMessage::user_with_image(
            "Calibrate",
            "data:image/jpeg;base64,AAAA",
        )]));

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value["messages"][0]["content"],
            json!([
                {"type": "text", "text": "Calibrate"},
                {"type": "image_url", "image_url": {"url": "data:image/jpeg;base64,AAAA"}}
            ])
        );
    }

    #[test]
    fn test_response_parsing() {
        let response: OpenAIResponse = serde_json::from_value(json!({
            "id": "test-id",
            "object": "chat.completion",
            "choices": [{"index": 0, "finish_reason": "stop", "message": {"role": "assistant", "content": "{}"}}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        }))
        .unwrap();

        assert_eq!(response.choices.len(), 1);
        assert_eq!(response.usage.unwrap().prompt_tokens, 10);
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_error(StatusCode::TOO_MANY_REQUESTS, Some(7), String::new()),
            BackendError::RateLimitError {
                retry_after: Some(7)
            }
        );
        assert!(matches!(
            status_error(StatusCode::UNAUTHORIZED, None, "nope".into()),
            BackendError::AuthenticationError { .. }
        ));
        assert!(status_error(StatusCode::BAD_GATEWAY, None, String::new()).is_transient());
    }

    #[test]
    fn test_debug_hides_api_key() {
        let client = client().with_api_key(Some("secret".to_string()));
        let debug_str = format!("{:?}", client);
        assert!(debug_str.contains("OpenAICompatibleClient"));
        assert!(!debug_str.contains("secret"));
    }

    #[tokio::test]
    async fn test_health_check_unreachable() {
        let client =
            OpenAICompatibleClient::with_timeout("http://127.0.0.1:1", "m", Duration::from_secs(2))
                .unwrap();
        assert!(!client.health_check().await.unwrap());
    }
}
