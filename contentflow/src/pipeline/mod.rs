//! Pipeline orchestration.
//!
//! This module provides:
//! - ContentPipeline, the fixed three-stage orchestrator
//! - ProgressStream, the event stream of a background run

mod orchestrator;
mod stream;

pub use orchestrator::ContentPipeline;
pub use stream::ProgressStream;
