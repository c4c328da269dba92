//! Context management for pipeline execution.
//!
//! This module provides:
//! - RunIdentity for correlating a run's logs and events
//! - PipelineContext, the typed append-only record for one run
//! - StageUpdate, the per-stage write set applied by the orchestrator

mod identity;
mod pipeline;

pub use identity::RunIdentity;
pub use pipeline::{PipelineContext, StageUpdate};
