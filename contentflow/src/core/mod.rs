//! Core domain model types for contentflow.
//!
//! This module contains the fundamental types used throughout the crate:
//! - Stage identifiers and the run state machine
//! - Strategy, content items and usage accounting
//! - Progress events

mod event;
mod models;
mod stage_id;
mod status;

pub use event::ProgressEvent;
pub use models::{
    ContentItem, ContentType, ModelInfo, PipelineResult, Strategy, UsageLedger, UsageReport,
};
pub use stage_id::StageId;
pub use status::{RunState, RunStateMachine, TransitionError};
