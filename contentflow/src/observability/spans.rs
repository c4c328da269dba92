//! Tracing spans and timing for pipeline runs.

use crate::context::RunIdentity;
use crate::core::StageId;
use std::time::Instant;
use tracing::{info_span, Span};

/// Creates the span that wraps one whole run.
#[must_use]
pub fn run_span(identity: &RunIdentity) -> Span {
    info_span!("pipeline_run", run_id = %identity.run_id)
}

/// Creates the span that wraps one stage of a run.
#[must_use]
pub fn stage_span(stage: StageId) -> Span {
    info_span!("stage", stage = stage.as_str(), tokens = tracing::field::Empty)
}

/// Simple span timing helper.
#[derive(Debug)]
pub struct SpanTimer {
    start: Instant,
    name: &'static str,
}

impl SpanTimer {
    /// Starts a new span timer.
    #[must_use]
    pub fn start(name: &'static str) -> Self {
        Self {
            start: Instant::now(),
            name,
        }
    }

    /// Returns the elapsed time in milliseconds.
    #[must_use]
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }

    /// Returns the span name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Finishes the span and returns the duration.
    #[must_use]
    pub fn finish(self) -> f64 {
        self.elapsed_ms()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_span_timer() {
        let timer = SpanTimer::start("creator");
        std::thread::sleep(Duration::from_millis(5));

        assert_eq!(timer.name(), "creator");
        let elapsed = timer.finish();
        assert!(elapsed >= 5.0);
    }

    #[test]
    fn test_spans_can_be_entered() {
        let identity = RunIdentity::new();
        let run = run_span(&identity);
        let _run = run.enter();
        let stage = stage_span(StageId::Optimizer);
        stage.record("tokens", 42_u64);
    }
}
