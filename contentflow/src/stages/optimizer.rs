use super::prompts::{render, OPTIMIZER_TEMPLATE};
use super::{ensure_texts_present, items_field, prompt_error, Stage};
use crate::config::PipelineConfig;
use crate::context::{PipelineContext, StageUpdate};
use crate::core::{ContentItem, StageId};
use crate::errors::{SchemaMismatchError, StageError};
use crate::generation::{
    canonical_json, generate_structured, FieldKind, FieldSpec, GenerationClient,
    GenerationRequest, OutputSchema,
};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct RefinedBatch {
    items: Vec<ContentItem>,
    tips: String,
}

/// Polishes the drafts and writes posting tips. Terminal stage.
#[derive(Debug, Clone)]
pub struct OptimizerStage {
    temperature: f32,
    item_count: usize,
    max_item_chars: usize,
}

impl OptimizerStage {
    /// Creates the stage from pipeline settings.
    #[must_use]
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            temperature: config.temperature(StageId::Optimizer),
            item_count: config.item_count,
            max_item_chars: config.max_item_chars,
        }
    }

    /// The shape the optimizer expects back.
    #[must_use]
    pub fn schema(&self) -> OutputSchema {
        OutputSchema::new("refined_posts")
            .field(items_field(
                self.item_count,
                self.max_item_chars,
                "The polished posts, in the same order as the drafts",
            ))
            .field(FieldSpec::new(
                "tips",
                "One paragraph of posting and engagement tips",
                FieldKind::string(),
            ))
    }

    /// Renders the prompt for `topic` and the draft `items`.
    pub fn render_prompt(&self, topic: &str, items: &[ContentItem]) -> Result<String, StageError> {
        let items = canonical_json(&items).map_err(|e| prompt_error(StageId::Optimizer, e))?;

        render(
            OPTIMIZER_TEMPLATE,
            &json!({
                "topic": topic,
                "items": items,
                "item_count": self.item_count,
                "max_chars": self.max_item_chars,
            }),
        )
        .map_err(|e| prompt_error(StageId::Optimizer, e))
    }
}

#[async_trait]
impl Stage for OptimizerStage {
    fn id(&self) -> StageId {
        StageId::Optimizer
    }

    async fn execute(
        &self,
        ctx: &PipelineContext,
        client: &dyn GenerationClient,
    ) -> Result<StageUpdate, StageError> {
        let drafts = ctx.require_generated_items(self.id())?;
        let prompt = self.render_prompt(ctx.topic(), drafts)?;
        debug!(stage = %self.id(), prompt = %prompt, "Rendered prompt");

        let request = GenerationRequest::new(self.id(), prompt, self.schema(), self.temperature);
        let (batch, tokens): (RefinedBatch, u64) = generate_structured(client, &request)
            .await
            .map_err(|e| StageError::new(self.id(), e))?;

        ensure_texts_present(self.id(), &batch.items)?;
        if batch.tips.is_empty() {
            return Err(StageError::new(
                self.id(),
                SchemaMismatchError::at("$.tips", "tips paragraph is empty"),
            ));
        }

        Ok(StageUpdate::Refined {
            items: batch.items,
            tips: batch.tips,
            tokens,
        })
    }
}
