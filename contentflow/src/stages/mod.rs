//! Stage trait and the three content stages.
//!
//! A stage reads the [`PipelineContext`], makes exactly one generation call
//! and returns a [`StageUpdate`] holding only the fields it owns. Applying
//! the update is left to the orchestrator.

mod creator;
mod optimizer;
pub mod prompts;
mod strategist;

pub use creator::CreatorStage;
pub use optimizer::OptimizerStage;
pub use strategist::StrategistStage;

use crate::config::PipelineConfig;
use crate::context::{PipelineContext, StageUpdate};
use crate::core::{ContentItem, ContentType, StageId};
use crate::errors::{SchemaMismatchError, StageError, StageFailure};
use crate::generation::{FieldKind, FieldSpec, GenerationClient, OutputSchema};
use async_trait::async_trait;
use std::fmt::{Debug, Display};
use std::sync::Arc;

/// Trait for pipeline stages.
#[async_trait]
pub trait Stage: Send + Sync + Debug {
    /// Returns the stage identifier.
    fn id(&self) -> StageId;

    /// Returns the human-readable stage name.
    fn name(&self) -> &str {
        self.id().display_name()
    }

    /// Executes the stage against the current context.
    ///
    /// # Errors
    ///
    /// Returns a [`StageError`] tagged with [`Stage::id`] when a required
    /// input is missing or the generation call fails.
    async fn execute(
        &self,
        ctx: &PipelineContext,
        client: &dyn GenerationClient,
    ) -> Result<StageUpdate, StageError>;
}

/// Builds the fixed stage sequence for `config`.
#[must_use]
pub fn default_stages(config: &PipelineConfig) -> Vec<Arc<dyn Stage>> {
    vec![
        Arc::new(StrategistStage::new(config)),
        Arc::new(CreatorStage::new(config)),
        Arc::new(OptimizerStage::new(config)),
    ]
}

fn item_schema(max_chars: usize) -> OutputSchema {
    OutputSchema::new("post")
        .field(FieldSpec::new(
            "text",
            format!("The post body, at most {max_chars} characters"),
            FieldKind::bounded_string(max_chars),
        ))
        .field(FieldSpec::new(
            "contentType",
            "The tone of the post",
            FieldKind::enumeration(ContentType::ALL.map(ContentType::as_str)),
        ))
}

fn items_field(count: usize, max_chars: usize, description: &str) -> FieldSpec {
    FieldSpec::new(
        "items",
        description,
        FieldKind::array_of(FieldKind::Object(item_schema(max_chars)), count),
    )
}

fn prompt_error(stage: StageId, err: impl Display) -> StageError {
    StageError::new(
        stage,
        StageFailure::Prompt {
            message: err.to_string(),
        },
    )
}

fn ensure_texts_present(stage: StageId, items: &[ContentItem]) -> Result<(), StageError> {
    match items.iter().position(|item| item.text.is_empty()) {
        Some(i) => Err(StageError::new(
            stage,
            SchemaMismatchError::at(format!("$.items[{i}].text"), "post text is empty"),
        )),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_stages_in_pipeline_order() {
        let stages = default_stages(&PipelineConfig::default());
        let ids: Vec<StageId> = stages.iter().map(|s| s.id()).collect();

        assert_eq!(ids, StageId::ALL.to_vec());
        assert_eq!(stages[0].name(), "Content Strategist");
    }

    #[test]
    fn test_item_schema_shape() {
        let schema = item_schema(280).to_json_schema();
        assert_eq!(schema["properties"]["text"]["maxLength"], 280);
        assert_eq!(
            schema["properties"]["contentType"]["enum"],
            serde_json::json!(["educational", "inspirational", "entertaining"])
        );
    }

    #[test]
    fn test_empty_text_rejected() {
        let items = vec![
            ContentItem::new("ok", ContentType::Educational),
            ContentItem::new("", ContentType::Educational),
        ];
        let err = ensure_texts_present(StageId::Creator, &items).unwrap_err();
        assert_eq!(
            err.schema_mismatch().and_then(|e| e.path.as_deref()),
            Some("$.items[1].text")
        );
    }
}
