//! Assertion helpers for pipeline results and progress events.

use crate::core::{PipelineResult, ProgressEvent, StageId};

/// Kinds of the events a successful run emits, in order.
pub const SUCCESS_EVENT_KINDS: [&str; 8] = [
    "started",
    "stageStarted",
    "stageCompleted",
    "stageStarted",
    "stageCompleted",
    "stageStarted",
    "stageCompleted",
    "result",
];

/// Asserts that `events` have exactly the given kinds, in order.
///
/// # Panics
///
/// Panics if the kinds differ.
pub fn assert_event_kinds(events: &[ProgressEvent], expected: &[&str]) {
    let actual: Vec<&str> = events.iter().map(ProgressEvent::kind).collect();
    assert_eq!(actual, expected, "unexpected progress event sequence");
}

/// Asserts that stage events name the stages in pipeline order.
///
/// # Panics
///
/// Panics if a stage event is out of order.
pub fn assert_stage_order(events: &[ProgressEvent]) {
    let stages: Vec<StageId> = events.iter().filter_map(ProgressEvent::stage).collect();
    let mut expected = Vec::new();
    for stage in StageId::ALL.iter().take(stages.len().div_ceil(2)) {
        expected.push(*stage);
        expected.push(*stage);
    }
    expected.truncate(stages.len());
    assert_eq!(stages, expected, "stage events out of pipeline order");
}

/// Asserts that a result is complete and its usage adds up.
///
/// # Panics
///
/// Panics if the result has the wrong item count, empty tips, or a total
/// that differs from the per-stage sum.
pub fn assert_complete_result(result: &PipelineResult, item_count: usize) {
    assert_eq!(result.items.len(), item_count, "wrong item count");
    assert!(!result.tips.trim().is_empty(), "tips are empty");
    let usage = result.model_info.usage;
    assert_eq!(
        usage.total,
        usage.strategist + usage.creator + usage.optimizer,
        "usage total differs from the per-stage sum"
    );
}
