//! # Contentflow
//!
//! A three-stage LLM pipeline that turns a topic into ready-to-post social
//! media updates.
//!
//! A run threads one context through a fixed sequence of stages:
//!
//! - **Strategist**: distills the topic into a strategy (main topic,
//!   audience, angles)
//! - **Creator**: writes draft posts from the strategy
//! - **Optimizer**: polishes the drafts and adds posting tips
//!
//! Every stage asks a [`GenerationClient`](generation::GenerationClient) for
//! JSON that matches a declared schema. Runs either complete with a
//! [`PipelineResult`](core::PipelineResult) or report progress events as a
//! stream.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use contentflow::prelude::*;
//!
//! let config = ContentflowConfig::from_env()?;
//! let client = OpenAiClient::new(config.provider.clone(), config.pipeline.model.clone())?;
//! let pipeline = ContentPipeline::new(Arc::new(client), config.pipeline)?;
//!
//! // Run to completion
//! let result = pipeline.run("AI automation for small businesses").await?;
//!
//! // Or stream progress
//! let mut events = pipeline.stream("AI automation for small businesses");
//! while let Some(event) = events.next().await {
//!     println!("{}", event.kind());
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod config;
pub mod context;
pub mod core;
pub mod errors;
pub mod events;
pub mod generation;
pub mod observability;
pub mod pipeline;
pub mod stages;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::config::{ConfigError, ContentflowConfig, PipelineConfig, ProviderConfig};
    pub use crate::context::{PipelineContext, RunIdentity, StageUpdate};
    pub use crate::core::{
        ContentItem, ContentType, ModelInfo, PipelineResult, ProgressEvent, StageId, Strategy,
        UsageReport,
    };
    pub use crate::errors::{
        ClientError, ErrorKind, GenerationError, PipelineError, SchemaMismatchError, StageError,
        ValidationError,
    };
    pub use crate::events::{
        ChannelProgressSink, CollectingProgressSink, LoggingProgressSink, NoOpProgressSink,
        ProgressSink,
    };
    pub use crate::generation::{
        ConcurrencyLimitedClient, Generation, GenerationClient, GenerationRequest, OutputSchema,
        RetryConfig,
    };
    #[cfg(feature = "openai")]
    pub use crate::generation::OpenAiClient;
    pub use crate::pipeline::{ContentPipeline, ProgressStream};
    pub use crate::stages::Stage;
}
