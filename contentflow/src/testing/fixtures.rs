//! Sample data for pipeline tests.

use serde_json::json;

use super::{ScriptedGenerationClient, ScriptedReply};
use crate::core::{ContentItem, ContentType, StageId, Strategy};

/// Topic used by the end-to-end scenarios.
pub const SAMPLE_TOPIC: &str = "AI automation for small businesses";

/// Tokens reported by [`happy_path_client`] for the strategist.
pub const STRATEGIST_TOKENS: u64 = 120;
/// Tokens reported by [`happy_path_client`] for the creator.
pub const CREATOR_TOKENS: u64 = 340;
/// Tokens reported by [`happy_path_client`] for the optimizer.
pub const OPTIMIZER_TOKENS: u64 = 410;

/// A strategy for [`SAMPLE_TOPIC`].
#[must_use]
pub fn sample_strategy() -> Strategy {
    Strategy {
        main_topic: "Using AI tools to automate routine work in small businesses.".to_string(),
        audience: "Owners of businesses with fewer than fifty employees.".to_string(),
        angles: vec![
            "Hours saved on admin work".to_string(),
            "Cheap tools that need no engineers".to_string(),
            "Keeping a human touch with customers".to_string(),
        ],
    }
}

/// Five draft posts.
#[must_use]
pub fn draft_items() -> Vec<ContentItem> {
    vec![
        ContentItem::new(
            "Invoices eat your Fridays? An AI bookkeeping tool can draft them in minutes.",
            ContentType::Educational,
        ),
        ContentItem::new(
            "You did not start a business to copy data between spreadsheets.",
            ContentType::Inspirational,
        ),
        ContentItem::new(
            "My chatbot now answers the phone politely. Better than I do before coffee.",
            ContentType::Entertaining,
        ),
        ContentItem::new(
            "Three tasks to automate this week: scheduling, reminders, receipts.",
            ContentType::Educational,
        ),
        ContentItem::new(
            "Small teams win when machines handle the busywork and people handle people.",
            ContentType::Inspirational,
        ),
    ]
}

/// Five refined posts.
#[must_use]
pub fn refined_items() -> Vec<ContentItem> {
    vec![
        ContentItem::new(
            "Fridays lost to invoices? AI bookkeeping drafts them in minutes.",
            ContentType::Educational,
        ),
        ContentItem::new(
            "You started a business, not a data entry job. Let software copy the spreadsheets.",
            ContentType::Inspirational,
        ),
        ContentItem::new(
            "My chatbot answers the phone more politely than I do before coffee.",
            ContentType::Entertaining,
        ),
        ContentItem::new(
            "Automate three things this week:\n1. Scheduling\n2. Reminders\n3. Receipts",
            ContentType::Educational,
        ),
        ContentItem::new(
            "Small teams win when machines do the busywork and people do the people work.",
            ContentType::Inspirational,
        ),
    ]
}

/// A tips paragraph.
#[must_use]
pub fn sample_tips() -> String {
    "Post on weekday mornings, reply to every comment within the first hour, \
     and pin the most practical post to your profile."
        .to_string()
}

/// A client that answers every stage successfully.
#[must_use]
pub fn happy_path_client() -> ScriptedGenerationClient {
    ScriptedGenerationClient::new()
        .with_reply(
            StageId::Strategist,
            ScriptedReply::json(
                json!({
                    "mainTopic": sample_strategy().main_topic,
                    "audience": sample_strategy().audience,
                    "angles": sample_strategy().angles,
                }),
                STRATEGIST_TOKENS,
            ),
        )
        .with_reply(
            StageId::Creator,
            ScriptedReply::json(json!({ "items": draft_items() }), CREATOR_TOKENS),
        )
        .with_reply(
            StageId::Optimizer,
            ScriptedReply::json(
                json!({ "items": refined_items(), "tips": sample_tips() }),
                OPTIMIZER_TOKENS,
            ),
        )
}
