//! The accumulating record threaded through the stages of one run.

use super::RunIdentity;
use crate::core::{ContentItem, ModelInfo, PipelineResult, StageId, Strategy, UsageLedger};
use crate::errors::{ContextConflictError, StageError};

/// The output of one stage, applied to the context by the orchestrator.
///
/// Each variant carries only the fields its stage owns, so a stage cannot
/// write anything else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageUpdate {
    /// Strategist output.
    Strategy {
        /// The generated strategy.
        strategy: Strategy,
        /// Tokens consumed by the call.
        tokens: u64,
    },
    /// Creator output.
    Items {
        /// Draft items.
        items: Vec<ContentItem>,
        /// Tokens consumed by the call.
        tokens: u64,
    },
    /// Optimizer output.
    Refined {
        /// Refined items.
        items: Vec<ContentItem>,
        /// Consolidated posting tips.
        tips: String,
        /// Tokens consumed by the call.
        tokens: u64,
    },
}

impl StageUpdate {
    /// Returns the stage that owns this update.
    #[must_use]
    pub const fn stage(&self) -> StageId {
        match self {
            Self::Strategy { .. } => StageId::Strategist,
            Self::Items { .. } => StageId::Creator,
            Self::Refined { .. } => StageId::Optimizer,
        }
    }

    /// Returns the tokens consumed by the stage call.
    #[must_use]
    pub const fn tokens(&self) -> u64 {
        match self {
            Self::Strategy { tokens, .. } | Self::Items { tokens, .. } | Self::Refined { tokens, .. } => {
                *tokens
            }
        }
    }
}

/// Append-only state for one run.
///
/// `topic` is fixed at construction; every other field is written at most
/// once, by the stage that owns it.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    identity: RunIdentity,
    topic: String,
    strategy: Option<Strategy>,
    generated_items: Option<Vec<ContentItem>>,
    final_items: Option<Vec<ContentItem>>,
    tips_notes: Option<String>,
    usage: UsageLedger,
}

impl PipelineContext {
    /// Creates a fresh context for `topic`.
    #[must_use]
    pub fn new(topic: impl Into<String>, identity: RunIdentity) -> Self {
        Self {
            identity,
            topic: topic.into(),
            strategy: None,
            generated_items: None,
            final_items: None,
            tips_notes: None,
            usage: UsageLedger::new(),
        }
    }

    /// Returns the run identity.
    #[must_use]
    pub const fn identity(&self) -> &RunIdentity {
        &self.identity
    }

    /// Returns the input topic.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Returns the strategy, if the strategist has run.
    #[must_use]
    pub const fn strategy(&self) -> Option<&Strategy> {
        self.strategy.as_ref()
    }

    /// Returns the draft items, if the creator has run.
    #[must_use]
    pub fn generated_items(&self) -> Option<&[ContentItem]> {
        self.generated_items.as_deref()
    }

    /// Returns the refined items, if the optimizer has run.
    #[must_use]
    pub fn final_items(&self) -> Option<&[ContentItem]> {
        self.final_items.as_deref()
    }

    /// Returns the posting tips, if the optimizer has run.
    #[must_use]
    pub fn tips_notes(&self) -> Option<&str> {
        self.tips_notes.as_deref()
    }

    /// Returns the token ledger.
    #[must_use]
    pub const fn usage(&self) -> &UsageLedger {
        &self.usage
    }

    /// Returns the complete strategy or fails the requesting stage.
    pub fn require_strategy(&self, stage: StageId) -> Result<&Strategy, StageError> {
        self.strategy
            .as_ref()
            .filter(|s| s.is_complete())
            .ok_or(StageError::missing_input(stage, "strategy"))
    }

    /// Returns the non-empty draft items or fails the requesting stage.
    pub fn require_generated_items(&self, stage: StageId) -> Result<&[ContentItem], StageError> {
        self.generated_items
            .as_deref()
            .filter(|items| !items.is_empty())
            .ok_or(StageError::missing_input(stage, "generatedItems"))
    }

    /// Applies a stage's output.
    ///
    /// Fails without modifying the context if any field the update owns has
    /// already been written.
    pub fn apply(&mut self, update: StageUpdate) -> Result<(), StageError> {
        let stage = update.stage();
        let tokens = update.tokens();

        match update {
            StageUpdate::Strategy { strategy, .. } => {
                ensure_unset(stage, &self.strategy, "strategy")?;
                self.strategy = Some(strategy);
            }
            StageUpdate::Items { items, .. } => {
                ensure_unset(stage, &self.generated_items, "generatedItems")?;
                self.generated_items = Some(items);
            }
            StageUpdate::Refined { items, tips, .. } => {
                ensure_unset(stage, &self.final_items, "finalItems")?;
                ensure_unset(stage, &self.tips_notes, "tipsNotes")?;
                self.final_items = Some(items);
                self.tips_notes = Some(tips);
            }
        }

        self.usage.record(stage, tokens);
        Ok(())
    }

    /// Consumes the context and extracts the final result.
    pub fn into_result(self, model_id: impl Into<String>) -> Result<PipelineResult, StageError> {
        let usage = self.usage.report();
        let items = self
            .final_items
            .ok_or(StageError::missing_input(StageId::Optimizer, "finalItems"))?;
        let tips = self
            .tips_notes
            .ok_or(StageError::missing_input(StageId::Optimizer, "tipsNotes"))?;

        Ok(PipelineResult {
            items,
            tips,
            model_info: ModelInfo {
                model_id: model_id.into(),
                usage,
            },
        })
    }
}

fn ensure_unset<T>(
    stage: StageId,
    slot: &Option<T>,
    field: &'static str,
) -> Result<(), StageError> {
    if slot.is_some() {
        return Err(StageError::new(stage, ContextConflictError::new(field)));
    }
    Ok(())
}
