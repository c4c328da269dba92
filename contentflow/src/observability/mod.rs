//! Observability utilities.

mod spans;

pub use spans::{run_span, stage_span, SpanTimer};
