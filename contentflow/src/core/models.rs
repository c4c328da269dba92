//! Domain records produced by the pipeline stages.

use super::StageId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The tone tag attached to each generated post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    /// Teaches something concrete.
    Educational,
    /// Motivates the reader.
    Inspirational,
    /// Entertains or amuses.
    Entertaining,
}

impl ContentType {
    /// All accepted content types.
    pub const ALL: [Self; 3] = [Self::Educational, Self::Inspirational, Self::Entertaining];

    /// Returns the wire name of the content type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Educational => "educational",
            Self::Inspirational => "inspirational",
            Self::Entertaining => "entertaining",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of the strategist stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Strategy {
    /// One-sentence restatement of the topic.
    pub main_topic: String,
    /// One-sentence description of the target audience.
    pub audience: String,
    /// Distinct content angles, in priority order.
    pub angles: Vec<String>,
}

impl Strategy {
    /// Returns true if every field has visible text and there is at least
    /// one angle.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.main_topic.trim().is_empty()
            && !self.audience.trim().is_empty()
            && !self.angles.is_empty()
            && self.angles.iter().all(|a| !a.trim().is_empty())
    }
}

/// A single ready-to-post update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentItem {
    /// Post body.
    pub text: String,
    /// Tone tag.
    pub content_type: ContentType,
}

impl ContentItem {
    /// Creates a new content item.
    #[must_use]
    pub fn new(text: impl Into<String>, content_type: ContentType) -> Self {
        Self {
            text: text.into(),
            content_type,
        }
    }
}

/// Per-stage token accounting for one run.
///
/// Counts are additive and never reset. The total is always derived from
/// the per-stage entries, so it cannot drift from their sum.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsageLedger {
    per_stage: BTreeMap<StageId, u64>,
}

impl UsageLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `tokens` to the count for `stage`.
    pub fn record(&mut self, stage: StageId, tokens: u64) {
        *self.per_stage.entry(stage).or_insert(0) += tokens;
    }

    /// Returns the count recorded for `stage`.
    #[must_use]
    pub fn get(&self, stage: StageId) -> u64 {
        self.per_stage.get(&stage).copied().unwrap_or(0)
    }

    /// Returns the sum of all per-stage counts.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.per_stage.values().sum()
    }

    /// Returns a serializable snapshot of the ledger.
    #[must_use]
    pub fn report(&self) -> UsageReport {
        UsageReport {
            strategist: self.get(StageId::Strategist),
            creator: self.get(StageId::Creator),
            optimizer: self.get(StageId::Optimizer),
            total: self.total(),
        }
    }
}

/// Token usage as reported to callers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageReport {
    /// Tokens spent by the strategist.
    pub strategist: u64,
    /// Tokens spent by the creator.
    pub creator: u64,
    /// Tokens spent by the optimizer.
    pub optimizer: u64,
    /// Sum of the three stages.
    pub total: u64,
}

/// Model identity and accounting attached to a result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    /// Model that served the run.
    pub model_id: String,
    /// Token usage per stage.
    pub usage: UsageReport,
}

/// The value returned by a completed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineResult {
    /// Refined, ready-to-post items.
    pub items: Vec<ContentItem>,
    /// Consolidated posting and engagement guidance.
    pub tips: String,
    /// Model identity and token usage.
    pub model_info: ModelInfo,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_usage_ledger_is_additive() {
        let mut ledger = UsageLedger::new();
        ledger.record(StageId::Strategist, 100);
        ledger.record(StageId::Creator, 250);
        ledger.record(StageId::Creator, 50);

        assert_eq!(ledger.get(StageId::Creator), 300);
        assert_eq!(ledger.get(StageId::Optimizer), 0);
        assert_eq!(ledger.total(), 400);
    }

    #[test]
    fn test_usage_report_total_matches_sum() {
        let mut ledger = UsageLedger::new();
        ledger.record(StageId::Strategist, 7);
        ledger.record(StageId::Creator, 11);
        ledger.record(StageId::Optimizer, 13);

        let report = ledger.report();
        assert_eq!(report.total, report.strategist + report.creator + report.optimizer);
        assert_eq!(report.total, 31);
    }

    #[test]
    fn test_content_item_wire_format() {
        let item = ContentItem::new("Automate invoices today.", ContentType::Educational);
        let json = serde_json::to_value(&item).unwrap();

        assert_eq!(
            json,
            serde_json::json!({"text": "Automate invoices today.", "contentType": "educational"})
        );
    }

    #[test]
    fn test_strategy_wire_format() {
        let json = serde_json::json!({
            "mainTopic": "AI automation",
            "audience": "small business owners",
            "angles": ["cost savings", "time savings", "competitive edge"]
        });

        let strategy: Strategy = serde_json::from_value(json).unwrap();
        assert_eq!(strategy.main_topic, "AI automation");
        assert_eq!(strategy.angles.len(), 3);
    }

    #[test]
    fn test_result_wire_format() {
        let result = PipelineResult {
            items: vec![ContentItem::new("a", ContentType::Entertaining)],
            tips: "Post in the morning.".to_string(),
            model_info: ModelInfo {
                model_id: "gpt-4o-mini".to_string(),
                usage: UsageReport {
                    strategist: 1,
                    creator: 2,
                    optimizer: 3,
                    total: 6,
                },
            },
        };

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["modelInfo"]["modelId"], "gpt-4o-mini");
        assert_eq!(json["modelInfo"]["usage"]["total"], 6);
        assert_eq!(json["items"][0]["contentType"], "entertaining");
    }
}
