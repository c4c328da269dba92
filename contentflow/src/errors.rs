//! Error types for contentflow.
//!
//! The taxonomy separates provider failures ([`GenerationError`]) from output
//! that does not fit the expected shape ([`SchemaMismatchError`]), wraps both
//! with the owning stage ([`StageError`]), and keeps bad input
//! ([`ValidationError`]) apart so callers can decide whether a retry makes
//! sense.

use crate::core::{StageId, TransitionError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Failure classification exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    /// The input topic was rejected before any stage ran.
    BadInput,
    /// The provider was unreachable, timed out or refused the request.
    GenerationFailed,
    /// The provider answered but the payload did not fit the schema.
    SchemaMismatch,
    /// The caller cancelled the run.
    Cancelled,
    /// A pipeline invariant was broken.
    Internal,
}

impl ErrorKind {
    /// HTTP status a transport layer should map this kind to.
    #[must_use]
    pub const fn status_code(self) -> u16 {
        match self {
            Self::BadInput => 422,
            Self::GenerationFailed | Self::SchemaMismatch => 502,
            Self::Cancelled => 499,
            Self::Internal => 500,
        }
    }

    /// Returns the wire name of the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BadInput => "badInput",
            Self::GenerationFailed => "generationFailed",
            Self::SchemaMismatch => "schemaMismatch",
            Self::Cancelled => "cancelled",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provider-level failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GenerationError {
    /// The provider could not be reached.
    #[error("Provider unreachable: {message}")]
    Unreachable {
        /// Transport error description.
        message: String,
    },

    /// The request exceeded its deadline.
    #[error("Provider request timed out after {timeout_seconds}s")]
    Timeout {
        /// The configured timeout.
        timeout_seconds: f64,
    },

    /// The provider throttled the request.
    #[error("Provider rate limit exceeded: {message}")]
    RateLimited {
        /// Provider message.
        message: String,
    },

    /// The provider answered with an error status.
    #[error("Provider returned HTTP {status}: {message}")]
    Provider {
        /// HTTP status code.
        status: u16,
        /// Response body or reason.
        message: String,
    },

    /// The provider answered without any content.
    #[error("Provider returned an empty response")]
    EmptyResponse,

    /// Every retry attempt failed.
    #[error("Provider request failed after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        /// Number of attempts made.
        attempts: usize,
        /// Description of the last failure.
        last_error: String,
    },
}

impl GenerationError {
    /// Creates an unreachable error.
    #[must_use]
    pub fn unreachable(message: impl Into<String>) -> Self {
        Self::Unreachable {
            message: message.into(),
        }
    }

    /// Creates a timeout error.
    #[must_use]
    pub const fn timeout(timeout_seconds: f64) -> Self {
        Self::Timeout { timeout_seconds }
    }

    /// Creates a rate-limited error.
    #[must_use]
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::RateLimited {
            message: message.into(),
        }
    }

    /// Creates a provider status error.
    #[must_use]
    pub fn provider(status: u16, message: impl Into<String>) -> Self {
        Self::Provider {
            status,
            message: message.into(),
        }
    }

    /// Returns true if repeating the same request may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Unreachable { .. }
            | Self::Timeout { .. }
            | Self::RateLimited { .. }
            | Self::RetriesExhausted { .. } => true,
            Self::Provider { status, .. } => *status >= 500,
            Self::EmptyResponse => false,
        }
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();

        let kind = match self {
            Self::Unreachable { .. } => "Unreachable",
            Self::Timeout { timeout_seconds } => {
                map.insert("timeout_seconds".to_string(), serde_json::json!(timeout_seconds));
                "Timeout"
            }
            Self::RateLimited { .. } => "RateLimited",
            Self::Provider { status, .. } => {
                map.insert("status".to_string(), serde_json::json!(status));
                "Provider"
            }
            Self::EmptyResponse => "EmptyResponse",
            Self::RetriesExhausted { attempts, .. } => {
                map.insert("attempts".to_string(), serde_json::json!(attempts));
                "RetriesExhausted"
            }
        };

        map.insert("type".to_string(), serde_json::json!(kind));
        map.insert("transient".to_string(), serde_json::json!(self.is_transient()));
        map.insert("message".to_string(), serde_json::json!(self.to_string()));
        map
    }
}

/// The provider answered, but the payload does not fit the expected schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct SchemaMismatchError {
    /// What was wrong.
    pub message: String,
    /// JSON path of the offending value (e.g. `$.items[2].text`).
    pub path: Option<String>,
    /// The raw provider output, when available.
    pub raw: Option<String>,
}

impl SchemaMismatchError {
    /// Creates a new schema mismatch error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            path: None,
            raw: None,
        }
    }

    /// Creates a schema mismatch error for a specific JSON path.
    #[must_use]
    pub fn at(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            path: Some(path.into()),
            raw: None,
        }
    }

    /// Attaches the raw provider output.
    #[must_use]
    pub fn with_raw(mut self, raw: impl Into<String>) -> Self {
        self.raw = Some(raw.into());
        self
    }
}

impl fmt::Display for SchemaMismatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.path {
            Some(ref path) => write!(f, "Schema mismatch at '{}': {}", path, self.message),
            None => write!(f, "Schema mismatch: {}", self.message),
        }
    }
}

/// Everything a generation client can fail with.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClientError {
    /// Provider-level failure.
    #[error(transparent)]
    Generation(#[from] GenerationError),

    /// Output did not fit the expected schema.
    #[error(transparent)]
    SchemaMismatch(#[from] SchemaMismatchError),
}

/// Error raised when a stage writes a context field that is already set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Context conflict: field '{field}' was already written")]
pub struct ContextConflictError {
    /// The field that was written twice.
    pub field: &'static str,
}

impl ContextConflictError {
    /// Creates a new context conflict error.
    #[must_use]
    pub const fn new(field: &'static str) -> Self {
        Self { field }
    }
}

/// The underlying reason a stage failed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StageFailure {
    /// The generation client failed.
    #[error(transparent)]
    Generation(GenerationError),

    /// The client output did not fit the stage schema.
    #[error(transparent)]
    SchemaMismatch(SchemaMismatchError),

    /// A field written by an earlier stage is absent or empty.
    #[error("required input '{field}' is missing")]
    MissingInput {
        /// The missing context field.
        field: &'static str,
    },

    /// The stage tried to overwrite a context field.
    #[error(transparent)]
    Conflict(#[from] ContextConflictError),

    /// Earlier stage output could not be rendered into the prompt.
    #[error("failed to render prompt: {message}")]
    Prompt {
        /// Render failure.
        message: String,
    },
}

impl From<ClientError> for StageFailure {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Generation(e) => Self::Generation(e),
            ClientError::SchemaMismatch(e) => Self::SchemaMismatch(e),
        }
    }
}

impl From<GenerationError> for StageFailure {
    fn from(err: GenerationError) -> Self {
        Self::Generation(err)
    }
}

impl From<SchemaMismatchError> for StageFailure {
    fn from(err: SchemaMismatchError) -> Self {
        Self::SchemaMismatch(err)
    }
}

/// A failure attributed to one pipeline stage.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Stage '{stage}' failed: {cause}")]
pub struct StageError {
    /// The stage that failed.
    pub stage: StageId,
    /// Why it failed.
    #[source]
    pub cause: StageFailure,
}

impl StageError {
    /// Creates a new stage error.
    #[must_use]
    pub fn new(stage: StageId, cause: impl Into<StageFailure>) -> Self {
        Self {
            stage,
            cause: cause.into(),
        }
    }

    /// Creates an error for a missing prior-stage field.
    #[must_use]
    pub const fn missing_input(stage: StageId, field: &'static str) -> Self {
        Self {
            stage,
            cause: StageFailure::MissingInput { field },
        }
    }

    /// Returns the wrapped generation error, if that is the cause.
    #[must_use]
    pub const fn generation_error(&self) -> Option<&GenerationError> {
        match self.cause {
            StageFailure::Generation(ref e) => Some(e),
            _ => None,
        }
    }

    /// Returns the wrapped schema mismatch, if that is the cause.
    #[must_use]
    pub const fn schema_mismatch(&self) -> Option<&SchemaMismatchError> {
        match self.cause {
            StageFailure::SchemaMismatch(ref e) => Some(e),
            _ => None,
        }
    }
}

/// Error raised when the input topic is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationError {
    /// The error message.
    pub message: String,
    /// The offending input field.
    pub field: String,
}

impl ValidationError {
    /// Creates a new validation error for `field`.
    #[must_use]
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            field: field.into(),
        }
    }

    /// The topic is empty or whitespace-only.
    #[must_use]
    pub fn empty_topic() -> Self {
        Self::new("topic", "Topic cannot be empty or whitespace-only")
    }

    /// The topic exceeds the configured maximum length.
    #[must_use]
    pub fn topic_too_long(length: usize, max: usize) -> Self {
        Self::new(
            "topic",
            format!("Topic is {length} characters long; the maximum is {max}"),
        )
    }
}

/// The error returned by a pipeline run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    /// The topic was rejected before the run started.
    #[error("Invalid input: {0}")]
    Validation(#[from] ValidationError),

    /// A stage failed; the run was halted.
    #[error(transparent)]
    Stage(#[from] StageError),

    /// The caller cancelled the run while a stage was pending.
    #[error("Pipeline cancelled during stage '{stage}': {reason}")]
    Cancelled {
        /// The stage that was abandoned.
        stage: StageId,
        /// The cancellation reason.
        reason: String,
    },

    /// The orchestrator attempted an illegal state transition.
    #[error(transparent)]
    Transition(#[from] TransitionError),
}

impl PipelineError {
    /// Classifies the failure for callers.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::BadInput,
            Self::Stage(e) => match e.cause {
                StageFailure::Generation(_) => ErrorKind::GenerationFailed,
                StageFailure::SchemaMismatch(_) => ErrorKind::SchemaMismatch,
                StageFailure::MissingInput { .. }
                | StageFailure::Conflict(_)
                | StageFailure::Prompt { .. } => ErrorKind::Internal,
            },
            Self::Cancelled { .. } => ErrorKind::Cancelled,
            Self::Transition(_) => ErrorKind::Internal,
        }
    }

    /// Returns the stage the failure is attributed to, if any.
    #[must_use]
    pub const fn stage(&self) -> Option<StageId> {
        match self {
            Self::Stage(e) => Some(e.stage),
            Self::Cancelled { stage, .. } => Some(*stage),
            Self::Validation(_) | Self::Transition(_) => None,
        }
    }

    /// Returns true if running the same input again may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Stage(e) => match e.generation_error() {
                Some(err) => err.is_transient(),
                None => false,
            },
            _ => false,
        }
    }

    /// Converts to a dictionary suitable for a client-visible error body.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let kind = self.kind();
        let mut map = HashMap::new();
        map.insert("error".to_string(), serde_json::json!(kind));
        map.insert("status".to_string(), serde_json::json!(kind.status_code()));
        map.insert("message".to_string(), serde_json::json!(self.to_string()));
        map.insert("retryable".to_string(), serde_json::json!(self.is_retryable()));

        if let Some(stage) = self.stage() {
            map.insert("stage".to_string(), serde_json::json!(stage));
        }
        if let Self::Validation(ref e) = self {
            map.insert("field".to_string(), serde_json::json!(e.field));
        }
        if let Self::Stage(ref e) = self {
            if let Some(path) = e.schema_mismatch().and_then(|m| m.path.as_ref()) {
                map.insert("path".to_string(), serde_json::json!(path));
            }
        }

        map
    }
}
