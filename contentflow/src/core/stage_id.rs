//! Identifiers for the fixed pipeline stages.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the three stages of the content pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageId {
    /// Plans the topic restatement, audience and content angles.
    Strategist,
    /// Drafts the batch of posts from the strategy.
    Creator,
    /// Polishes the drafts and writes posting tips.
    Optimizer,
}

impl StageId {
    /// All stages in pipeline order.
    pub const ALL: [Self; 3] = [Self::Strategist, Self::Creator, Self::Optimizer];

    /// Returns the machine-readable identifier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Strategist => "strategist",
            Self::Creator => "creator",
            Self::Optimizer => "optimizer",
        }
    }

    /// Returns the human-readable stage name shown to progress observers.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Strategist => "Content Strategist",
            Self::Creator => "Content Creator",
            Self::Optimizer => "Quality Optimizer",
        }
    }

    /// Returns the stage that follows this one, if any.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Strategist => Some(Self::Creator),
            Self::Creator => Some(Self::Optimizer),
            Self::Optimizer => None,
        }
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
