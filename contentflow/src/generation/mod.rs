//! The generation client seam and structured-output helpers.
//!
//! Stages never talk to a provider directly. They build a
//! [`GenerationRequest`] carrying a prompt and an [`OutputSchema`], hand it to
//! a [`GenerationClient`], and decode the answer through
//! [`generate_structured`], which enforces the schema for every client
//! implementation alike.

mod limit;
#[cfg(feature = "openai")]
mod openai;
mod parse;
mod retry;
mod schema;

pub use limit::ConcurrencyLimitedClient;
#[cfg(feature = "openai")]
pub use openai::OpenAiClient;
pub use parse::parse_json_payload;
pub use retry::{
    should_retry, with_retry, BackoffStrategy, JitterStrategy, RetryConfig, RetryDecision,
};
pub use schema::{FieldKind, FieldSpec, OutputSchema};

use crate::core::StageId;
use crate::errors::{ClientError, SchemaMismatchError};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;

/// One structured-generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    /// The rendered stage prompt. Format instructions come from `schema`.
    pub prompt: String,
    /// The shape the answer must take.
    pub schema: OutputSchema,
    /// Sampling temperature.
    pub temperature: f32,
    /// The stage issuing the call.
    pub stage: StageId,
}

impl GenerationRequest {
    /// Creates a new request.
    #[must_use]
    pub fn new(stage: StageId, prompt: impl Into<String>, schema: OutputSchema, temperature: f32) -> Self {
        Self {
            prompt: prompt.into(),
            schema,
            temperature,
            stage,
        }
    }
}

/// A parsed provider answer.
#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    /// The JSON object the provider produced.
    pub value: Value,
    /// Tokens consumed by the call.
    pub tokens_used: u64,
}

impl Generation {
    /// Creates a new generation.
    #[must_use]
    pub const fn new(value: Value, tokens_used: u64) -> Self {
        Self { value, tokens_used }
    }
}

/// A source of structured model output.
///
/// Implementations must be safe to share between concurrent runs.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Sends one request and returns the parsed JSON answer.
    async fn generate(&self, request: &GenerationRequest) -> Result<Generation, ClientError>;

    /// Identifier of the model serving requests.
    fn model_id(&self) -> String;
}

#[async_trait]
impl<C: GenerationClient + ?Sized> GenerationClient for Arc<C> {
    async fn generate(&self, request: &GenerationRequest) -> Result<Generation, ClientError> {
        (**self).generate(request).await
    }

    fn model_id(&self) -> String {
        (**self).model_id()
    }
}

/// Calls `client` and decodes the answer into `T`.
///
/// The payload is coerced through the request schema first, so trimming and
/// enum normalization apply before deserialization. Any value that still
/// fails to deserialize is reported as a schema mismatch.
pub async fn generate_structured<T: DeserializeOwned>(
    client: &dyn GenerationClient,
    request: &GenerationRequest,
) -> Result<(T, u64), ClientError> {
    let generation = client.generate(request).await?;
    let coerced = request.schema.coerce(generation.value)?;
    let decoded = serde_json::from_value(coerced).map_err(|e| {
        SchemaMismatchError::new(format!(
            "payload does not match '{}': {e}",
            request.schema.name()
        ))
    })?;
    Ok((decoded, generation.tokens_used))
}

/// Serializes `value` as pretty JSON with object keys sorted.
///
/// The output is byte-identical for equal values, which keeps prompts that
/// embed earlier stage output stable.
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let value = serde_json::to_value(value)?;
    serde_json::to_string_pretty(&sort_keys(value))
}

fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, sort_keys(v)))
                    .collect::<Map<String, Value>>(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ContentItem, ContentType};
    use crate::errors::GenerationError;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn item_request() -> GenerationRequest {
        let schema = OutputSchema::new("post")
            .field(FieldSpec::new("text", "Body", FieldKind::bounded_string(280)))
            .field(FieldSpec::new(
                "contentType",
                "Tone",
                FieldKind::enumeration(ContentType::ALL.map(ContentType::as_str)),
            ));
        GenerationRequest::new(StageId::Creator, "write a post", schema, 0.0)
    }

    #[tokio::test]
    async fn test_generate_structured_decodes_coerced_value() {
        let mut client = MockGenerationClient::new();
        client.expect_generate().times(1).returning(|_| {
            Ok(Generation::new(
                json!({"text": "  Ship it. ", "contentType": "Educational"}),
                42,
            ))
        });

        let (item, tokens): (ContentItem, u64) =
            generate_structured(&client, &item_request()).await.unwrap();

        assert_eq!(item, ContentItem::new("Ship it.", ContentType::Educational));
        assert_eq!(tokens, 42);
    }

    #[tokio::test]
    async fn test_generate_structured_reports_schema_mismatch() {
        let mut client = MockGenerationClient::new();
        client
            .expect_generate()
            .returning(|_| Ok(Generation::new(json!({"text": "no type"}), 3)));

        let err = generate_structured::<ContentItem>(&client, &item_request())
            .await
            .unwrap_err();

        match err {
            ClientError::SchemaMismatch(e) => assert_eq!(e.path.as_deref(), Some("$.contentType")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_generate_structured_passes_generation_errors_through() {
        let mut client = MockGenerationClient::new();
        client
            .expect_generate()
            .returning(|_| Err(GenerationError::unreachable("connection refused").into()));

        let err = generate_structured::<ContentItem>(&client, &item_request())
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::Generation(GenerationError::Unreachable { .. })));
    }

    #[test]
    fn test_canonical_json_sorts_keys() {
        let a = canonical_json(&json!({"b": 1, "a": {"d": 2, "c": 3}})).unwrap();
        let b = canonical_json(&json!({"a": {"c": 3, "d": 2}, "b": 1})).unwrap();

        assert_eq!(a, b);
        assert!(a.find("\"a\"").unwrap() < a.find("\"b\"").unwrap());
    }
}
