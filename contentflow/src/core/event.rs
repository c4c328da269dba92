//! Progress events emitted while a run executes.

use super::{PipelineResult, StageId};
use crate::errors::{ErrorKind, PipelineError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A milestone notification for one run.
///
/// A run reports exactly one `Started`, a `StageStarted`/`StageCompleted`
/// pair per finished stage in pipeline order, and exactly one terminal
/// `Result` or `Error` event last.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ProgressEvent {
    /// The run accepted its topic and is about to start the first stage.
    Started {
        /// The validated topic.
        topic: String,
        /// Correlation id of the run.
        run_id: Uuid,
    },
    /// A stage is about to call the generation client.
    StageStarted {
        /// Stage identifier.
        stage_id: StageId,
        /// Human-readable stage name.
        stage_name: String,
    },
    /// A stage finished and its output was recorded.
    StageCompleted {
        /// Stage identifier.
        stage_id: StageId,
        /// Human-readable stage name.
        stage_name: String,
        /// Wall-clock time spent in the stage.
        duration_ms: f64,
    },
    /// The run completed.
    Result {
        /// The final pipeline output.
        data: PipelineResult,
    },
    /// The run failed; no further events follow.
    Error {
        /// Human-readable failure description.
        message: String,
        /// Failure classification.
        error_kind: ErrorKind,
    },
}

impl ProgressEvent {
    /// Creates a `StageStarted` event.
    #[must_use]
    pub fn stage_started(stage: StageId) -> Self {
        Self::StageStarted {
            stage_id: stage,
            stage_name: stage.display_name().to_string(),
        }
    }

    /// Creates a `StageCompleted` event.
    #[must_use]
    pub fn stage_completed(stage: StageId, duration_ms: f64) -> Self {
        Self::StageCompleted {
            stage_id: stage,
            stage_name: stage.display_name().to_string(),
            duration_ms,
        }
    }

    /// Creates an `Error` event describing `error`.
    #[must_use]
    pub fn from_error(error: &PipelineError) -> Self {
        Self::Error {
            message: error.to_string(),
            error_kind: error.kind(),
        }
    }

    /// Returns the wire name of the event kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Started { .. } => "started",
            Self::StageStarted { .. } => "stageStarted",
            Self::StageCompleted { .. } => "stageCompleted",
            Self::Result { .. } => "result",
            Self::Error { .. } => "error",
        }
    }

    /// Returns the stage the event refers to, if any.
    #[must_use]
    pub const fn stage(&self) -> Option<StageId> {
        match self {
            Self::StageStarted { stage_id, .. } | Self::StageCompleted { stage_id, .. } => {
                Some(*stage_id)
            }
            _ => None,
        }
    }

    /// Returns true for `Result` and `Error` events.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Result { .. } | Self::Error { .. })
    }

    /// Encodes the event as one server-sent-events frame.
    ///
    /// # Errors
    ///
    /// Fails if the event cannot be serialized.
    pub fn to_sse_frame(&self) -> Result<String, serde_json::Error> {
        Ok(format!("data: {}\n\n", serde_json::to_string(self)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_started_wire_format() {
        let run_id = Uuid::nil();
        let event = ProgressEvent::Started {
            topic: "rust".to_string(),
            run_id,
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "kind": "started",
                "topic": "rust",
                "runId": "00000000-0000-0000-0000-000000000000"
            })
        );
    }

    #[test]
    fn test_stage_event_wire_format() {
        let json = serde_json::to_value(ProgressEvent::stage_started(StageId::Creator)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "kind": "stageStarted",
                "stageId": "creator",
                "stageName": "Content Creator"
            })
        );

        let json =
            serde_json::to_value(ProgressEvent::stage_completed(StageId::Optimizer, 12.5)).unwrap();
        assert_eq!(json["kind"], "stageCompleted");
        assert_eq!(json["durationMs"], 12.5);
    }

    #[test]
    fn test_error_wire_format() {
        let event = ProgressEvent::Error {
            message: "boom".to_string(),
            error_kind: ErrorKind::GenerationFailed,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "error");
        assert_eq!(json["errorKind"], "generationFailed");
        assert!(event.is_terminal());
    }

    #[test]
    fn test_event_roundtrip() {
        let event = ProgressEvent::stage_completed(StageId::Strategist, 3.0);
        let json = serde_json::to_string(&event).unwrap();
        let parsed: ProgressEvent = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed, event);
        assert_eq!(parsed.kind(), "stageCompleted");
        assert_eq!(parsed.stage(), Some(StageId::Strategist));
        assert!(!parsed.is_terminal());
    }

    #[test]
    fn test_sse_frame() {
        let frame = ProgressEvent::stage_started(StageId::Strategist)
            .to_sse_frame()
            .unwrap();
        assert!(frame.starts_with("data: {"));
        assert!(frame.ends_with("}\n\n"));
        assert!(frame.contains("\"kind\":\"stageStarted\""));
        assert_eq!(frame.matches('\n').count(), 2);
    }
}
