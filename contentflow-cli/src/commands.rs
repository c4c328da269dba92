//! CLI command definitions, routing, and tracing setup.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use contentflow::cancellation::CancellationToken;
use contentflow::config::ContentflowConfig;
use contentflow::core::{PipelineResult, ProgressEvent};
use contentflow::events::LoggingProgressSink;
use contentflow::generation::{ConcurrencyLimitedClient, OpenAiClient};
use contentflow::pipeline::ContentPipeline;
use futures::StreamExt;
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Contentflow: turn a topic into social media posts.
#[derive(Parser)]
#[command(
    name = "contentflow",
    version,
    about = "Turn a topic into ready-to-post social media updates.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Model to use instead of the configured one.
    #[arg(long, global = true, env = "CONTENTFLOW_MODEL")]
    pub model: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run the pipeline to completion and print the result as JSON.
    Run {
        /// Topic to write about.
        topic: String,

        /// Print the posts as plain text instead.
        #[arg(long)]
        text: bool,
    },

    /// Run the pipeline and print progress events as server-sent events.
    Stream {
        /// Topic to write about.
        topic: String,
    },

    /// Print the effective configuration (API key omitted).
    Config,
}

// ---------------------------------------------------------------------------
// Tracing
// ---------------------------------------------------------------------------

/// Logs go to stderr so stdout stays machine-readable.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = match cli.verbose {
        0 => "contentflow=info,contentflow_cli=info",
        1 => "contentflow=debug,contentflow_cli=debug",
        _ => "contentflow=trace,contentflow_cli=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Dispatch a parsed CLI invocation.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.model)?;
    match cli.command {
        Command::Run { topic, text } => cmd_run(config, &topic, text).await,
        Command::Stream { topic } => cmd_stream(config, &topic).await,
        Command::Config => cmd_config(&config),
    }
}

fn load_config(model: Option<String>) -> Result<ContentflowConfig> {
    let mut config = ContentflowConfig::from_env().context("invalid environment")?;
    if let Some(model) = model {
        config.pipeline = config.pipeline.with_model(model);
    }
    config.pipeline.validate()?;
    Ok(config)
}

fn build_pipeline(config: ContentflowConfig) -> Result<ContentPipeline> {
    if config.provider.api_key.is_none() {
        warn!("OPENAI_API_KEY is not set; requests will be sent without credentials");
    }

    let client = OpenAiClient::new(config.provider.clone(), config.pipeline.model.clone())
        .context("failed to create the provider client")?;
    let client = ConcurrencyLimitedClient::new(client, config.provider.max_concurrency);
    Ok(ContentPipeline::new(Arc::new(client), config.pipeline)?)
}

/// Cancels `token` on Ctrl-C.
fn cancel_on_ctrl_c(token: Arc<CancellationToken>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel("interrupted");
        }
    });
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

async fn cmd_run(config: ContentflowConfig, topic: &str, text: bool) -> Result<()> {
    let pipeline = build_pipeline(config)?;
    let token = Arc::new(CancellationToken::new());
    cancel_on_ctrl_c(token.clone());

    let result = pipeline
        .run_observed(topic, &LoggingProgressSink::info(), &token)
        .await;

    match result {
        Ok(result) if text => {
            print_result(&result);
            Ok(())
        }
        Ok(result) => {
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
        Err(err) => bail!("{} ({})", err, err.kind()),
    }
}

async fn cmd_stream(config: ContentflowConfig, topic: &str) -> Result<()> {
    let pipeline = build_pipeline(config)?;
    let mut events = pipeline.stream(topic);
    let mut failure = None;

    loop {
        let event = tokio::select! {
            event = events.next() => event,
            _ = tokio::signal::ctrl_c() => {
                events.cancel("interrupted");
                continue;
            }
        };
        let Some(event) = event else { break };

        print!("{}", event.to_sse_frame()?);
        if let ProgressEvent::Error {
            message,
            error_kind,
        } = event
        {
            failure = Some(format!("{message} ({error_kind})"));
        }
    }

    match failure {
        Some(failure) => bail!(failure),
        None => Ok(()),
    }
}

fn cmd_config(config: &ContentflowConfig) -> Result<()> {
    info!(has_api_key = config.provider.api_key.is_some(), "Effective configuration");
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}

fn print_result(result: &PipelineResult) {
    for (i, item) in result.items.iter().enumerate() {
        println!("{}. [{}] {}", i + 1, item.content_type.as_str(), item.text);
        println!();
    }
    println!("Tips: {}", result.tips);
    println!();
    let usage = &result.model_info.usage;
    println!(
        "Model: {} | tokens: {} (strategist {}, creator {}, optimizer {})",
        result.model_info.model_id, usage.total, usage.strategist, usage.creator, usage.optimizer
    );
}
