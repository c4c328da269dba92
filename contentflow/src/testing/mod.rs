//! Testing utilities for content pipelines.
//!
//! This module provides:
//! - A scripted generation client with call recording
//! - Sample strategies, posts and tips
//! - Assertions for progress events and results

mod assertions;
mod fixtures;
mod mocks;

pub use assertions::{
    assert_complete_result, assert_event_kinds, assert_stage_order, SUCCESS_EVENT_KINDS,
};
pub use fixtures::{
    draft_items, happy_path_client, refined_items, sample_strategy, sample_tips,
    CREATOR_TOKENS, OPTIMIZER_TOKENS, SAMPLE_TOPIC, STRATEGIST_TOKENS,
};
pub use mocks::{RecordedCall, ScriptedGenerationClient, ScriptedReply};
