//! The sequential orchestrator that threads one context through the stages.

use super::ProgressStream;
use crate::cancellation::CancellationToken;
use crate::config::{ConfigError, PipelineConfig};
use crate::context::{PipelineContext, RunIdentity};
use crate::core::{PipelineResult, ProgressEvent, RunStateMachine, StageId};
use crate::errors::{ErrorKind, PipelineError};
use crate::events::{ChannelProgressSink, NoOpProgressSink, ProgressSink};
use crate::generation::GenerationClient;
use crate::observability::{run_span, stage_span, SpanTimer};
use crate::stages::{default_stages, Stage};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn, Instrument};

/// Runs the strategist, creator and optimizer stages in order.
///
/// The pipeline holds no per-run state, so one instance can serve many
/// concurrent runs. Cloning is cheap.
#[derive(Clone)]
pub struct ContentPipeline {
    client: Arc<dyn GenerationClient>,
    stages: Arc<[Arc<dyn Stage>]>,
    config: Arc<PipelineConfig>,
}

impl fmt::Debug for ContentPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentPipeline")
            .field("model_id", &self.client.model_id())
            .field("stages", &self.stage_ids())
            .field("config", &self.config)
            .finish()
    }
}

impl ContentPipeline {
    /// Creates a pipeline with the default stages.
    ///
    /// # Errors
    ///
    /// Fails if `config` does not pass [`PipelineConfig::validate`].
    pub fn new(
        client: Arc<dyn GenerationClient>,
        config: PipelineConfig,
    ) -> Result<Self, ConfigError> {
        let stages = default_stages(&config);
        Self::with_stages(client, config, stages)
    }

    /// Creates a pipeline with custom stage implementations.
    ///
    /// # Errors
    ///
    /// Fails if `config` is invalid or `stages` does not hold exactly one
    /// stage per [`StageId`], in pipeline order.
    pub fn with_stages(
        client: Arc<dyn GenerationClient>,
        config: PipelineConfig,
        stages: Vec<Arc<dyn Stage>>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let ids: Vec<StageId> = stages.iter().map(|s| s.id()).collect();
        if ids != StageId::ALL {
            return Err(ConfigError::OutOfRange {
                field: "stages",
                message: format!("expected {:?}, got {ids:?}", StageId::ALL),
            });
        }

        Ok(Self {
            client,
            stages: stages.into(),
            config: Arc::new(config),
        })
    }

    /// Returns the stage sequence.
    #[must_use]
    pub fn stage_ids(&self) -> Vec<StageId> {
        self.stages.iter().map(|s| s.id()).collect()
    }

    /// Returns the pipeline settings.
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Runs the pipeline to completion.
    pub async fn run(&self, topic: &str) -> Result<PipelineResult, PipelineError> {
        self.run_observed(topic, &NoOpProgressSink, &CancellationToken::new())
            .await
    }

    /// Runs the pipeline until it completes or `token` is cancelled.
    pub async fn run_with_cancellation(
        &self,
        topic: &str,
        token: &CancellationToken,
    ) -> Result<PipelineResult, PipelineError> {
        self.run_observed(topic, &NoOpProgressSink, token).await
    }

    /// Runs the pipeline, reporting every milestone to `sink`.
    ///
    /// A rejected topic produces a single `Error` event. Otherwise the sink
    /// sees `Started`, a `StageStarted`/`StageCompleted` pair per finished
    /// stage, and one terminal `Result` or `Error`.
    pub async fn run_observed(
        &self,
        topic: &str,
        sink: &dyn ProgressSink,
        token: &CancellationToken,
    ) -> Result<PipelineResult, PipelineError> {
        let topic = match self.config.validate_topic(topic) {
            Ok(topic) => topic,
            Err(e) => {
                let err = PipelineError::from(e);
                warn!(error = %err, "Topic rejected");
                sink.try_emit(&ProgressEvent::from_error(&err));
                return Err(err);
            }
        };

        let identity = RunIdentity::new();
        let span = run_span(&identity);
        self.execute(topic, identity, sink, token)
            .instrument(span)
            .await
    }

    /// Starts a run in the background and returns its progress events.
    ///
    /// Must be called from within a Tokio runtime. Dropping the stream
    /// detaches from the run; use [`ProgressStream::cancel`] to stop it.
    #[must_use]
    pub fn stream(&self, topic: impl Into<String>) -> ProgressStream {
        let (tx, rx) = mpsc::unbounded_channel();
        let token = Arc::new(CancellationToken::new());
        let pipeline = self.clone();
        let topic = topic.into();
        let run_token = token.clone();

        let handle = tokio::spawn(async move {
            let sink = ChannelProgressSink::new(tx);
            if let Err(err) = pipeline.run_observed(&topic, &sink, &run_token).await {
                debug!(error_kind = %err.kind(), "Streamed run ended with an error");
            }
        });

        ProgressStream::new(rx, token, handle)
    }

    async fn execute(
        &self,
        topic: String,
        identity: RunIdentity,
        sink: &dyn ProgressSink,
        token: &CancellationToken,
    ) -> Result<PipelineResult, PipelineError> {
        let timer = SpanTimer::start("pipeline_run");
        let mut machine = RunStateMachine::new();
        let mut ctx = PipelineContext::new(topic.clone(), identity);

        info!(topic = %topic, model = %self.config.model, "Pipeline started");
        sink.try_emit(&ProgressEvent::Started {
            topic,
            run_id: ctx.identity().run_id,
        });

        for stage in self.stages.iter() {
            if let Err(err) = self
                .run_stage(stage.as_ref(), &mut ctx, &mut machine, sink, token)
                .await
            {
                return Err(Self::fail(err, &mut machine, sink));
            }
        }

        let finished = machine
            .complete()
            .map_err(PipelineError::from)
            .and_then(|()| {
                ctx.into_result(self.client.model_id())
                    .map_err(PipelineError::from)
            });

        match finished {
            Ok(result) => {
                info!(
                    tokens = result.model_info.usage.total,
                    duration_ms = timer.finish(),
                    "Pipeline completed"
                );
                sink.try_emit(&ProgressEvent::Result {
                    data: result.clone(),
                });
                Ok(result)
            }
            Err(err) => Err(Self::fail(err, &mut machine, sink)),
        }
    }

    async fn run_stage(
        &self,
        stage: &dyn Stage,
        ctx: &mut PipelineContext,
        machine: &mut RunStateMachine,
        sink: &dyn ProgressSink,
        token: &CancellationToken,
    ) -> Result<(), PipelineError> {
        let id = stage.id();
        machine.begin_stage(id)?;
        sink.try_emit(&ProgressEvent::stage_started(id));

        let span = stage_span(id);
        let timer = SpanTimer::start(id.as_str());
        debug!(stage = %id, "Stage started");

        let update = tokio::select! {
            biased;
            () = token.cancelled() => {
                return Err(PipelineError::Cancelled {
                    stage: id,
                    reason: token.reason().unwrap_or_else(|| "cancelled".to_string()),
                });
            }
            result = stage.execute(ctx, self.client.as_ref()).instrument(span.clone()) => result?,
        };

        let tokens = update.tokens();
        ctx.apply(update)?;

        let duration_ms = timer.finish();
        span.record("tokens", tokens);
        info!(stage = %id, tokens, duration_ms, "Stage completed");
        sink.try_emit(&ProgressEvent::stage_completed(id, duration_ms));
        Ok(())
    }

    fn fail(
        err: PipelineError,
        machine: &mut RunStateMachine,
        sink: &dyn ProgressSink,
    ) -> PipelineError {
        if let Err(transition) = machine.fail() {
            debug!(error = %transition, "Run already terminal");
        }

        if err.kind() == ErrorKind::Cancelled {
            warn!(stage = ?err.stage(), "Pipeline cancelled: {}", err);
        } else {
            error!(
                error_kind = %err.kind(),
                stage = ?err.stage(),
                retryable = err.is_retryable(),
                "Pipeline failed: {}",
                err
            );
        }

        sink.try_emit(&ProgressEvent::from_error(&err));
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::happy_path_client;

    #[test]
    fn test_default_stage_order() {
        let pipeline =
            ContentPipeline::new(Arc::new(happy_path_client()), PipelineConfig::default())
                .unwrap();
        assert_eq!(pipeline.stage_ids(), StageId::ALL.to_vec());
    }

    #[test]
    fn test_with_stages_rejects_wrong_order() {
        let config = PipelineConfig::default();
        let mut stages = default_stages(&config);
        stages.swap(0, 1);

        let err = ContentPipeline::with_stages(Arc::new(happy_path_client()), config, stages)
            .unwrap_err();
        assert!(matches!(err, ConfigError::OutOfRange { field: "stages", .. }));
    }

    #[test]
    fn test_debug_shows_model() {
        let pipeline =
            ContentPipeline::new(Arc::new(happy_path_client()), PipelineConfig::default())
                .unwrap();
        assert!(format!("{pipeline:?}").contains("scripted-model"));
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = PipelineConfig {
            item_count: 0,
            ..PipelineConfig::default()
        };

        let err = ContentPipeline::new(Arc::new(happy_path_client()), config).unwrap_err();
        assert!(matches!(err, ConfigError::OutOfRange { field: "item_count", .. }));
    }
}
