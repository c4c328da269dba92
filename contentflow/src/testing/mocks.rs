//! A scripted generation client for tests and benchmarks.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::core::StageId;
use crate::errors::{ClientError, GenerationError};
use crate::generation::{parse_json_payload, Generation, GenerationClient, GenerationRequest};

/// One canned answer for a stage.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptedReply {
    /// A parsed JSON payload.
    Json {
        /// The payload.
        value: serde_json::Value,
        /// Tokens to report.
        tokens: u64,
    },
    /// Raw model text, parsed like provider output.
    Raw {
        /// The raw text.
        content: String,
        /// Tokens to report.
        tokens: u64,
    },
    /// A provider failure.
    Fail(GenerationError),
}

impl ScriptedReply {
    /// A JSON reply.
    #[must_use]
    pub const fn json(value: serde_json::Value, tokens: u64) -> Self {
        Self::Json { value, tokens }
    }

    /// A raw-text reply.
    #[must_use]
    pub fn raw(content: impl Into<String>, tokens: u64) -> Self {
        Self::Raw {
            content: content.into(),
            tokens,
        }
    }

    /// A failing reply.
    #[must_use]
    pub const fn fail(error: GenerationError) -> Self {
        Self::Fail(error)
    }
}

/// A request as seen by the scripted client.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    /// Calling stage.
    pub stage: StageId,
    /// Rendered prompt.
    pub prompt: String,
    /// Requested temperature.
    pub temperature: f32,
    /// Name of the requested schema.
    pub schema_name: String,
}

/// A [`GenerationClient`] that answers from per-stage scripts.
///
/// Replies for a stage are consumed in order; the last one repeats, so a
/// single reply serves any number of runs.
#[derive(Debug)]
pub struct ScriptedGenerationClient {
    model_id: String,
    replies: Mutex<HashMap<StageId, VecDeque<ScriptedReply>>>,
    calls: Mutex<Vec<RecordedCall>>,
    delay: Option<Duration>,
    disconnected: AtomicBool,
}

impl Default for ScriptedGenerationClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedGenerationClient {
    /// Creates a client with no scripted replies.
    #[must_use]
    pub fn new() -> Self {
        Self {
            model_id: "scripted-model".to_string(),
            replies: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            delay: None,
            disconnected: AtomicBool::new(false),
        }
    }

    /// Sets the reported model id.
    #[must_use]
    pub fn with_model_id(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    /// Appends a reply for `stage`.
    #[must_use]
    pub fn with_reply(self, stage: StageId, reply: ScriptedReply) -> Self {
        self.push_reply(stage, reply);
        self
    }

    /// Delays every answer by `delay`.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Appends a reply for `stage` on a shared client.
    pub fn push_reply(&self, stage: StageId, reply: ScriptedReply) {
        self.replies.lock().entry(stage).or_default().push_back(reply);
    }

    /// Makes every later call fail as if the provider were unreachable.
    pub fn disconnect(&self) {
        self.disconnected.store(true, Ordering::SeqCst);
    }

    /// Returns every recorded call.
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    /// Returns the calling stage of every recorded call, in order.
    #[must_use]
    pub fn call_order(&self) -> Vec<StageId> {
        self.calls.lock().iter().map(|c| c.stage).collect()
    }

    /// Returns the number of recorded calls.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    fn next_reply(&self, stage: StageId) -> Option<ScriptedReply> {
        let mut replies = self.replies.lock();
        let queue = replies.get_mut(&stage)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

#[async_trait]
impl GenerationClient for ScriptedGenerationClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<Generation, ClientError> {
        self.calls.lock().push(RecordedCall {
            stage: request.stage,
            prompt: request.prompt.clone(),
            temperature: request.temperature,
            schema_name: request.schema.name().to_string(),
        });

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.disconnected.load(Ordering::SeqCst) {
            return Err(GenerationError::unreachable("scripted client is disconnected").into());
        }

        match self.next_reply(request.stage) {
            Some(ScriptedReply::Json { value, tokens }) => Ok(Generation::new(value, tokens)),
            Some(ScriptedReply::Raw { content, tokens }) => {
                Ok(Generation::new(parse_json_payload(&content)?, tokens))
            }
            Some(ScriptedReply::Fail(err)) => Err(err.into()),
            None => Err(GenerationError::unreachable(format!(
                "no scripted reply for stage '{}'",
                request.stage
            ))
            .into()),
        }
    }

    fn model_id(&self) -> String {
        self.model_id.clone()
    }
}
