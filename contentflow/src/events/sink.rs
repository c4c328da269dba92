//! Progress sink trait and implementations.

use crate::core::ProgressEvent;
use parking_lot::RwLock;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn, Level};

/// Receiver of progress events for one run.
///
/// `try_emit` is called inline by the orchestrator, so it must never block
/// and never fail. Delivery problems are the sink's own business.
pub trait ProgressSink: Send + Sync {
    /// Delivers one event without blocking.
    fn try_emit(&self, event: &ProgressEvent);
}

/// A no-op sink that discards all events.
///
/// Used by run-to-completion callers that do not observe progress.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpProgressSink;

impl ProgressSink for NoOpProgressSink {
    fn try_emit(&self, _event: &ProgressEvent) {}
}

/// A sink that mirrors events into the tracing log.
#[derive(Debug, Clone)]
pub struct LoggingProgressSink {
    level: Level,
}

impl Default for LoggingProgressSink {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

impl LoggingProgressSink {
    /// Creates a new logging sink with the specified level.
    #[must_use]
    pub const fn new(level: Level) -> Self {
        Self { level }
    }

    /// Creates a debug-level logging sink.
    #[must_use]
    pub const fn debug() -> Self {
        Self::new(Level::DEBUG)
    }

    /// Creates an info-level logging sink.
    #[must_use]
    pub const fn info() -> Self {
        Self::new(Level::INFO)
    }
}

impl ProgressSink for LoggingProgressSink {
    fn try_emit(&self, event: &ProgressEvent) {
        if let ProgressEvent::Error {
            message,
            error_kind,
        } = event
        {
            warn!(error_kind = %error_kind, "Progress: {}", message);
            return;
        }

        let stage = event.stage().map(|s| s.as_str());
        let duration_ms = match event {
            ProgressEvent::StageCompleted { duration_ms, .. } => Some(*duration_ms),
            _ => None,
        };

        if self.level == Level::DEBUG {
            debug!(kind = event.kind(), stage, duration_ms, "Progress: {}", event.kind());
        } else {
            info!(kind = event.kind(), stage, duration_ms, "Progress: {}", event.kind());
        }
    }
}

/// A sink that forwards events into an unbounded channel.
///
/// Send failures mean the receiver is gone; they are ignored so a departed
/// observer never affects the run.
#[derive(Debug, Clone)]
pub struct ChannelProgressSink {
    sender: UnboundedSender<ProgressEvent>,
}

impl ChannelProgressSink {
    /// Creates a sink that sends into `sender`.
    #[must_use]
    pub const fn new(sender: UnboundedSender<ProgressEvent>) -> Self {
        Self { sender }
    }

    /// Returns true if the receiving side has been dropped.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

impl ProgressSink for ChannelProgressSink {
    fn try_emit(&self, event: &ProgressEvent) {
        if self.sender.send(event.clone()).is_err() {
            debug!(kind = event.kind(), "Progress receiver dropped; event discarded");
        }
    }
}

/// A collecting sink for testing purposes.
#[derive(Debug, Default)]
pub struct CollectingProgressSink {
    events: RwLock<Vec<ProgressEvent>>,
}

impl CollectingProgressSink {
    /// Creates a new collecting sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected events.
    #[must_use]
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.read().clone()
    }

    /// Returns the kinds of the collected events, in order.
    #[must_use]
    pub fn kinds(&self) -> Vec<&'static str> {
        self.events.read().iter().map(ProgressEvent::kind).collect()
    }

    /// Returns the number of collected events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Returns true if no events have been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }
}

impl ProgressSink for CollectingProgressSink {
    fn try_emit(&self, event: &ProgressEvent) {
        self.events.write().push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StageId;
    use crate::errors::ErrorKind;

    fn sample_events() -> Vec<ProgressEvent> {
        vec![
            ProgressEvent::stage_started(StageId::Strategist),
            ProgressEvent::stage_completed(StageId::Strategist, 12.5),
            ProgressEvent::Error {
                message: "boom".to_string(),
                error_kind: ErrorKind::GenerationFailed,
            },
        ]
    }

    #[test]
    fn test_noop_and_logging_sinks_accept_everything() {
        for event in sample_events() {
            NoOpProgressSink.try_emit(&event);
            LoggingProgressSink::default().try_emit(&event);
            LoggingProgressSink::debug().try_emit(&event);
        }
    }

    #[test]
    fn test_collecting_sink() {
        let sink = CollectingProgressSink::new();
        assert!(sink.is_empty());

        for event in sample_events() {
            sink.try_emit(&event);
        }

        assert_eq!(sink.len(), 3);
        assert_eq!(sink.kinds(), vec!["stageStarted", "stageCompleted", "error"]);
    }

    #[tokio::test]
    async fn test_channel_sink_forwards_in_order() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let sink = ChannelProgressSink::new(tx);

        for event in sample_events() {
            sink.try_emit(&event);
        }

        assert_eq!(rx.recv().await.unwrap().kind(), "stageStarted");
        assert_eq!(rx.recv().await.unwrap().kind(), "stageCompleted");
        assert_eq!(rx.recv().await.unwrap().kind(), "error");
    }

    #[test]
    fn test_channel_sink_ignores_dropped_receiver() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let sink = ChannelProgressSink::new(tx);
        drop(rx);

        assert!(sink.is_closed());
        sink.try_emit(&ProgressEvent::stage_started(StageId::Creator));
    }
}
