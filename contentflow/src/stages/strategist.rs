use super::prompts::{render, STRATEGIST_TEMPLATE};
use super::{prompt_error, Stage};
use crate::config::PipelineConfig;
use crate::context::{PipelineContext, StageUpdate};
use crate::core::{StageId, Strategy};
use crate::errors::{SchemaMismatchError, StageError};
use crate::generation::{
    generate_structured, FieldKind, FieldSpec, GenerationClient, GenerationRequest, OutputSchema,
};
use async_trait::async_trait;
use serde_json::json;
use std::collections::HashSet;
use tracing::debug;

/// Plans the topic restatement, audience and content angles.
#[derive(Debug, Clone)]
pub struct StrategistStage {
    temperature: f32,
    angle_count: usize,
}

impl StrategistStage {
    /// Creates the stage from pipeline settings.
    #[must_use]
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            temperature: config.temperature(StageId::Strategist),
            angle_count: config.angle_count,
        }
    }

    /// The shape the strategist expects back.
    #[must_use]
    pub fn schema(&self) -> OutputSchema {
        OutputSchema::new("content_strategy")
            .field(FieldSpec::new(
                "mainTopic",
                "The topic restated in one sentence",
                FieldKind::string(),
            ))
            .field(FieldSpec::new(
                "audience",
                "The target audience in one sentence",
                FieldKind::string(),
            ))
            .field(FieldSpec::new(
                "angles",
                "Distinct content angles",
                FieldKind::array_of(FieldKind::string(), self.angle_count),
            ))
    }

    /// Renders the prompt for `topic`.
    pub fn render_prompt(&self, topic: &str) -> Result<String, StageError> {
        render(
            STRATEGIST_TEMPLATE,
            &json!({ "topic": topic, "angle_count": self.angle_count }),
        )
        .map_err(|e| prompt_error(StageId::Strategist, e))
    }
}

/// Rejects blank fields and repeated angles.
fn ensure_strategy_complete(strategy: &Strategy) -> Result<(), SchemaMismatchError> {
    if strategy.main_topic.trim().is_empty() {
        return Err(SchemaMismatchError::at("$.mainTopic", "main topic is empty"));
    }
    if strategy.audience.trim().is_empty() {
        return Err(SchemaMismatchError::at("$.audience", "audience is empty"));
    }

    let mut seen = HashSet::new();
    for (i, angle) in strategy.angles.iter().enumerate() {
        let angle = angle.trim();
        if angle.is_empty() {
            return Err(SchemaMismatchError::at(format!("$.angles[{i}]"), "angle is empty"));
        }
        if !seen.insert(angle.to_lowercase()) {
            return Err(SchemaMismatchError::at(
                format!("$.angles[{i}]"),
                format!("angle '{angle}' repeats an earlier angle"),
            ));
        }
    }
    Ok(())
}

#[async_trait]
impl Stage for StrategistStage {
    fn id(&self) -> StageId {
        StageId::Strategist
    }

    async fn execute(
        &self,
        ctx: &PipelineContext,
        client: &dyn GenerationClient,
    ) -> Result<StageUpdate, StageError> {
        let prompt = self.render_prompt(ctx.topic())?;
        debug!(stage = %self.id(), prompt = %prompt, "Rendered prompt");

        let request = GenerationRequest::new(self.id(), prompt, self.schema(), self.temperature);
        let (strategy, tokens): (Strategy, u64) = generate_structured(client, &request)
            .await
            .map_err(|e| StageError::new(self.id(), e))?;
        ensure_strategy_complete(&strategy).map_err(|e| StageError::new(self.id(), e))?;

        Ok(StageUpdate::Strategy { strategy, tokens })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RunIdentity;
    use crate::testing::{sample_strategy, ScriptedGenerationClient, ScriptedReply};
    use serde_json::json;

    fn stage() -> StrategistStage {
        StrategistStage::new(&PipelineConfig::default())
    }

    #[test]
    fn test_prompt_mentions_topic_and_angle_count() {
        let prompt = stage()
            .render_prompt("AI automation for small businesses")
            .unwrap();
        assert!(prompt.contains("Topic: AI automation for small businesses"));
        assert!(prompt.contains("Exactly 3 distinct angles"));
    }

    #[tokio::test]
    async fn test_execute_returns_strategy_update() {
        let client = ScriptedGenerationClient::new().with_reply(
            StageId::Strategist,
            ScriptedReply::json(serde_json::to_value(sample_strategy()).unwrap(), 120),
        );
        let ctx = PipelineContext::new("AI automation", RunIdentity::new());

        let update = stage().execute(&ctx, &client).await.unwrap();

        assert_eq!(
            update,
            StageUpdate::Strategy {
                strategy: sample_strategy(),
                tokens: 120
            }
        );
        let calls = client.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].temperature, 0.0);
    }

    #[tokio::test]
    async fn test_wrong_angle_count_is_schema_mismatch() {
        let client = ScriptedGenerationClient::new().with_reply(
            StageId::Strategist,
            ScriptedReply::json(
                json!({"mainTopic": "AI", "audience": "owners", "angles": ["one", "two"]}),
                10,
            ),
        );
        let ctx = PipelineContext::new("AI", RunIdentity::new());

        let err = stage().execute(&ctx, &client).await.unwrap_err();

        assert_eq!(err.stage, StageId::Strategist);
        let mismatch = err.schema_mismatch().unwrap();
        assert_eq!(mismatch.path.as_deref(), Some("$.angles"));
    }

    async fn run_with_reply(value: serde_json::Value) -> Result<StageUpdate, StageError> {
        let client = ScriptedGenerationClient::new()
            .with_reply(StageId::Strategist, ScriptedReply::json(value, 10));
        let ctx = PipelineContext::new("AI", RunIdentity::new());
        stage().execute(&ctx, &client).await
    }

    #[tokio::test]
    async fn test_blank_strategy_is_schema_mismatch() {
        let err = run_with_reply(json!({"mainTopic": "  ", "audience": "", "angles": ["", " ", ""]}))
            .await
            .unwrap_err();
        assert_eq!(
            err.schema_mismatch().and_then(|e| e.path.as_deref()),
            Some("$.mainTopic")
        );

        let err = run_with_reply(json!({"mainTopic": "AI", "audience": " ", "angles": ["a", "b", "c"]}))
            .await
            .unwrap_err();
        assert_eq!(
            err.schema_mismatch().and_then(|e| e.path.as_deref()),
            Some("$.audience")
        );

        let err = run_with_reply(json!({"mainTopic": "AI", "audience": "owners", "angles": ["a", " ", "c"]}))
            .await
            .unwrap_err();
        assert_eq!(err.stage, StageId::Strategist);
        assert_eq!(
            err.schema_mismatch().and_then(|e| e.path.as_deref()),
            Some("$.angles[1]")
        );
    }

    #[tokio::test]
    async fn test_repeated_angle_is_schema_mismatch() {
        let err = run_with_reply(json!({
            "mainTopic": "AI",
            "audience": "owners",
            "angles": ["Save time", "Cut costs", "save time "]
        }))
        .await
        .unwrap_err();

        assert_eq!(
            err.schema_mismatch().and_then(|e| e.path.as_deref()),
            Some("$.angles[2]")
        );
    }
}
