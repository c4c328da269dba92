//! Generation client for OpenAI-compatible chat-completions APIs.

use super::{parse_json_payload, with_retry, Generation, GenerationClient, GenerationRequest};
use crate::config::ProviderConfig;
use crate::errors::{ClientError, GenerationError};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

const MAX_ERROR_BODY_CHARS: usize = 512;

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    total_tokens: u64,
}

/// A [`GenerationClient`] backed by an OpenAI-compatible HTTP API.
///
/// Requests run in JSON response mode with the schema's format
/// instructions as the system message. Transient failures are retried
/// according to [`ProviderConfig::retry`].
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    config: ProviderConfig,
    model: String,
    endpoint: String,
}

impl OpenAiClient {
    /// Creates a client for `model`.
    pub fn new(config: ProviderConfig, model: impl Into<String>) -> Result<Self, GenerationError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| GenerationError::unreachable(format!("failed to build HTTP client: {e}")))?;
        let endpoint = format!("{}/chat/completions", config.base_url.trim_end_matches('/'));

        Ok(Self {
            http,
            config,
            model: model.into(),
            endpoint,
        })
    }

    /// Returns the chat-completions endpoint URL.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn request_body(&self, request: &GenerationRequest) -> Value {
        json!({
            "model": self.model,
            "temperature": request.temperature,
            "response_format": {"type": "json_object"},
            "messages": [
                {"role": "system", "content": request.schema.format_instructions()},
                {"role": "user", "content": request.prompt},
            ],
        })
    }

    async fn send_once(&self, body: &Value) -> Result<ChatResponse, GenerationError> {
        let mut builder = self.http.post(&self.endpoint).json(body);
        if let Some(ref key) = self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| self.transport_error(&e))?;
        let status = response.status();

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = truncate(&text);
            return Err(if status == StatusCode::TOO_MANY_REQUESTS {
                GenerationError::rate_limited(message)
            } else {
                GenerationError::provider(status.as_u16(), message)
            });
        }

        response.json::<ChatResponse>().await.map_err(|e| {
            if e.is_timeout() {
                self.transport_error(&e)
            } else {
                GenerationError::provider(status.as_u16(), format!("unreadable response envelope: {e}"))
            }
        })
    }

    #[allow(clippy::cast_precision_loss)]
    fn transport_error(&self, error: &reqwest::Error) -> GenerationError {
        if error.is_timeout() {
            GenerationError::timeout(self.config.timeout_secs as f64)
        } else {
            GenerationError::unreachable(error.to_string())
        }
    }
}

#[async_trait]
impl GenerationClient for OpenAiClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<Generation, ClientError> {
        let body = self.request_body(request);
        debug!(
            stage = %request.stage,
            model = %self.model,
            temperature = request.temperature,
            prompt_chars = request.prompt.chars().count(),
            "Sending chat completion"
        );

        let response = with_retry(&self.config.retry, request.stage.as_str(), |_| {
            self.send_once(&body)
        })
        .await?;

        let tokens = response.usage.map_or(0, |u| u.total_tokens);
        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(GenerationError::EmptyResponse)?;

        debug!(stage = %request.stage, tokens, "Received chat completion");
        let value = parse_json_payload(&content)?;
        Ok(Generation::new(value, tokens))
    }

    fn model_id(&self) -> String {
        self.model.clone()
    }
}

fn truncate(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= MAX_ERROR_BODY_CHARS {
        trimmed.to_string()
    } else {
        let mut out: String = trimmed.chars().take(MAX_ERROR_BODY_CHARS).collect();
        out.push_str("...");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StageId;
    use crate::generation::{FieldKind, FieldSpec, OutputSchema, RetryConfig};
    use pretty_assertions::assert_eq;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(server: &MockServer) -> ProviderConfig {
        ProviderConfig::new()
            .with_base_url(server.uri())
            .with_api_key("sk-test")
            .with_retry(RetryConfig::disabled())
    }

    fn request() -> GenerationRequest {
        let schema = OutputSchema::new("tips")
            .field(FieldSpec::new("tips", "Posting advice", FieldKind::string()));
        GenerationRequest::new(StageId::Optimizer, "Give tips.", schema, 0.5)
    }

    fn completion(content: &str, tokens: u64) -> Value {
        json!({
            "choices": [{"message": {"role": "assistant", "content": content}}],
            "usage": {"prompt_tokens": 10, "completion_tokens": tokens - 10, "total_tokens": tokens},
        })
    }

    #[tokio::test]
    async fn test_generate_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({
                "model": "gpt-4o-mini",
                "temperature": 0.5,
                "response_format": {"type": "json_object"},
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(completion("```json\n{\"tips\": \"Post at noon.\"}\n```", 57)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = OpenAiClient::new(config(&server), "gpt-4o-mini").unwrap();
        let generation = client.generate(&request()).await.unwrap();

        assert_eq!(generation.value, json!({"tips": "Post at noon."}));
        assert_eq!(generation.tokens_used, 57);
        assert_eq!(client.model_id(), "gpt-4o-mini");
    }

    #[tokio::test]
    async fn test_client_error_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
            .expect(1)
            .mount(&server)
            .await;

        let cfg = config(&server).with_retry(RetryConfig::new().with_base_delay_ms(1));
        let client = OpenAiClient::new(cfg, "gpt-4o-mini").unwrap();
        let err = client.generate(&request()).await.unwrap_err();

        assert_eq!(
            err,
            ClientError::Generation(GenerationError::provider(401, "invalid api key"))
        );
    }

    #[tokio::test]
    async fn test_server_error_retried_until_exhausted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .expect(2)
            .mount(&server)
            .await;

        let retry = RetryConfig::new().with_max_attempts(2).with_base_delay_ms(1);
        let client = OpenAiClient::new(config(&server).with_retry(retry), "gpt-4o-mini").unwrap();
        let err = client.generate(&request()).await.unwrap_err();

        assert!(matches!(
            err,
            ClientError::Generation(GenerationError::RetriesExhausted { attempts: 2, .. })
        ));
    }

    #[tokio::test]
    async fn test_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&server)
            .await;

        let client = OpenAiClient::new(config(&server), "gpt-4o-mini").unwrap();
        let err = client.generate(&request()).await.unwrap_err();

        assert_eq!(err, ClientError::Generation(GenerationError::rate_limited("slow down")));
    }

    #[tokio::test]
    async fn test_non_json_content_is_schema_mismatch() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("Sorry, I can't.", 20)))
            .mount(&server)
            .await;

        let client = OpenAiClient::new(config(&server), "gpt-4o-mini").unwrap();
        let err = client.generate(&request()).await.unwrap_err();

        assert!(matches!(err, ClientError::SchemaMismatch(_)));
    }

    #[tokio::test]
    async fn test_empty_choices() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
            .mount(&server)
            .await;

        let client = OpenAiClient::new(config(&server), "gpt-4o-mini").unwrap();
        let err = client.generate(&request()).await.unwrap_err();

        assert_eq!(err, ClientError::Generation(GenerationError::EmptyResponse));
    }

    #[tokio::test]
    async fn test_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(completion("{\"tips\": \"late\"}", 20))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let client =
            OpenAiClient::new(config(&server).with_timeout_secs(1), "gpt-4o-mini").unwrap();
        let err = client.generate(&request()).await.unwrap_err();

        assert_eq!(err, ClientError::Generation(GenerationError::timeout(1.0)));
    }

    #[tokio::test]
    async fn test_unreachable() {
        let cfg = ProviderConfig::new()
            .with_base_url("http://127.0.0.1:1")
            .with_retry(RetryConfig::disabled());
        let client = OpenAiClient::new(cfg, "gpt-4o-mini").unwrap();
        let err = client.generate(&request()).await.unwrap_err();

        assert!(matches!(
            err,
            ClientError::Generation(GenerationError::Unreachable { .. })
        ));
    }

    #[test]
    fn test_endpoint_joins_base_url() {
        let cfg = ProviderConfig::new().with_base_url("http://localhost:9000/v1/");
        let client = OpenAiClient::new(cfg, "m").unwrap();
        assert_eq!(client.endpoint(), "http://localhost:9000/v1/chat/completions");
    }
}
