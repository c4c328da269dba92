//! Progress sinks for observing pipeline runs.
//!
//! The orchestrator reports every milestone to a [`ProgressSink`]. Sinks
//! log, collect or forward events; none of them can stall the run.

mod sink;

pub use sink::{
    ChannelProgressSink, CollectingProgressSink, LoggingProgressSink, NoOpProgressSink,
    ProgressSink,
};
