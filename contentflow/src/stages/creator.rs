use super::prompts::{render, CREATOR_TEMPLATE};
use super::{ensure_texts_present, items_field, prompt_error, Stage};
use crate::config::PipelineConfig;
use crate::context::{PipelineContext, StageUpdate};
use crate::core::{ContentItem, StageId, Strategy};
use crate::errors::StageError;
use crate::generation::{
    canonical_json, generate_structured, GenerationClient, GenerationRequest, OutputSchema,
};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct DraftBatch {
    items: Vec<ContentItem>,
}

/// Drafts the batch of posts from the strategy.
#[derive(Debug, Clone)]
pub struct CreatorStage {
    temperature: f32,
    item_count: usize,
    max_item_chars: usize,
}

impl CreatorStage {
    /// Creates the stage from pipeline settings.
    #[must_use]
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            temperature: config.temperature(StageId::Creator),
            item_count: config.item_count,
            max_item_chars: config.max_item_chars,
        }
    }

    /// The shape the creator expects back.
    #[must_use]
    pub fn schema(&self) -> OutputSchema {
        OutputSchema::new("draft_posts").field(items_field(
            self.item_count,
            self.max_item_chars,
            "The drafted posts",
        ))
    }

    /// Renders the prompt for `topic` and `strategy`.
    ///
    /// The strategy is embedded in canonical JSON, so equal strategies
    /// produce byte-identical prompts.
    pub fn render_prompt(&self, topic: &str, strategy: &Strategy) -> Result<String, StageError> {
        let strategy =
            canonical_json(strategy).map_err(|e| prompt_error(StageId::Creator, e))?;

        render(
            CREATOR_TEMPLATE,
            &json!({
                "topic": topic,
                "strategy": strategy,
                "item_count": self.item_count,
                "max_chars": self.max_item_chars,
            }),
        )
        .map_err(|e| prompt_error(StageId::Creator, e))
    }
}

#[async_trait]
impl Stage for CreatorStage {
    fn id(&self) -> StageId {
        StageId::Creator
    }

    async fn execute(
        &self,
        ctx: &PipelineContext,
        client: &dyn GenerationClient,
    ) -> Result<StageUpdate, StageError> {
        let strategy = ctx.require_strategy(self.id())?;
        let prompt = self.render_prompt(ctx.topic(), strategy)?;
        debug!(stage = %self.id(), prompt = %prompt, "Rendered prompt");

        let request = GenerationRequest::new(self.id(), prompt, self.schema(), self.temperature);
        let (batch, tokens): (DraftBatch, u64) = generate_structured(client, &request)
            .await
            .map_err(|e| StageError::new(self.id(), e))?;
        ensure_texts_present(self.id(), &batch.items)?;

        Ok(StageUpdate::Items {
            items: batch.items,
            tokens,
        })
    }
}
