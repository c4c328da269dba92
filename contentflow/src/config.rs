//! Configuration for the pipeline and the provider client.
//!
//! Values come from serde defaults, then environment variables, then
//! explicit `with_*` overrides.

use crate::core::StageId;
use crate::errors::ValidationError;
use crate::generation::RetryConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Environment variable holding the provider API key.
pub const ENV_API_KEY: &str = "OPENAI_API_KEY";
/// Environment variable overriding the provider base URL.
pub const ENV_BASE_URL: &str = "OPENAI_BASE_URL";
/// Environment variable overriding the model id.
pub const ENV_MODEL: &str = "CONTENTFLOW_MODEL";
/// Environment variable overriding the request timeout, in seconds.
pub const ENV_TIMEOUT_SECS: &str = "CONTENTFLOW_TIMEOUT_SECS";
/// Environment variable overriding the concurrent request bound.
pub const ENV_MAX_CONCURRENCY: &str = "CONTENTFLOW_MAX_CONCURRENCY";

/// Error raised for unusable configuration values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// An environment variable could not be parsed.
    #[error("Invalid value '{value}' for {key}: {reason}")]
    InvalidEnv {
        /// Variable name.
        key: String,
        /// Raw value.
        value: String,
        /// Parse failure.
        reason: String,
    },

    /// A field is outside its accepted range.
    #[error("Invalid configuration for '{field}': {message}")]
    OutOfRange {
        /// Field name.
        field: &'static str,
        /// What is wrong.
        message: String,
    },
}

/// Settings that shape the pipeline itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Model id reported in results and sent to the provider.
    #[serde(default = "default_model")]
    pub model: String,

    /// Strategist sampling temperature.
    #[serde(default = "default_strategist_temperature")]
    pub strategist_temperature: f32,

    /// Creator sampling temperature.
    #[serde(default = "default_creator_temperature")]
    pub creator_temperature: f32,

    /// Optimizer sampling temperature.
    #[serde(default = "default_optimizer_temperature")]
    pub optimizer_temperature: f32,

    /// Longest accepted topic, in characters.
    #[serde(default = "default_max_topic_chars")]
    pub max_topic_chars: usize,

    /// Number of angles the strategist must propose.
    #[serde(default = "default_angle_count")]
    pub angle_count: usize,

    /// Number of items the creator and optimizer must produce.
    #[serde(default = "default_item_count")]
    pub item_count: usize,

    /// Longest accepted item text, in characters.
    #[serde(default = "default_max_item_chars")]
    pub max_item_chars: usize,
}

fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_strategist_temperature() -> f32 {
    0.0
}
fn default_creator_temperature() -> f32 {
    0.0
}
fn default_optimizer_temperature() -> f32 {
    0.5
}
const fn default_max_topic_chars() -> usize {
    500
}
const fn default_angle_count() -> usize {
    3
}
const fn default_item_count() -> usize {
    5
}
const fn default_max_item_chars() -> usize {
    280
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            strategist_temperature: default_strategist_temperature(),
            creator_temperature: default_creator_temperature(),
            optimizer_temperature: default_optimizer_temperature(),
            max_topic_chars: default_max_topic_chars(),
            angle_count: default_angle_count(),
            item_count: default_item_count(),
            max_item_chars: default_max_item_chars(),
        }
    }
}

impl PipelineConfig {
    /// Creates a config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the model id.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Sets the temperature for one stage.
    #[must_use]
    pub fn with_temperature(mut self, stage: StageId, temperature: f32) -> Self {
        match stage {
            StageId::Strategist => self.strategist_temperature = temperature,
            StageId::Creator => self.creator_temperature = temperature,
            StageId::Optimizer => self.optimizer_temperature = temperature,
        }
        self
    }

    /// Sets the maximum topic length.
    #[must_use]
    pub const fn with_max_topic_chars(mut self, max: usize) -> Self {
        self.max_topic_chars = max;
        self
    }

    /// Returns the temperature configured for `stage`.
    #[must_use]
    pub fn temperature(&self, stage: StageId) -> f32 {
        match stage {
            StageId::Strategist => self.strategist_temperature,
            StageId::Creator => self.creator_temperature,
            StageId::Optimizer => self.optimizer_temperature,
        }
    }

    /// Checks that every value is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for stage in StageId::ALL {
            let t = self.temperature(stage);
            if !(0.0..=1.0).contains(&t) {
                return Err(ConfigError::OutOfRange {
                    field: "temperature",
                    message: format!("{stage} temperature {t} is outside [0, 1]"),
                });
            }
        }
        for (field, value) in [
            ("max_topic_chars", self.max_topic_chars),
            ("angle_count", self.angle_count),
            ("item_count", self.item_count),
            ("max_item_chars", self.max_item_chars),
        ] {
            if value == 0 {
                return Err(ConfigError::OutOfRange {
                    field,
                    message: "must be greater than zero".to_string(),
                });
            }
        }
        if self.model.trim().is_empty() {
            return Err(ConfigError::OutOfRange {
                field: "model",
                message: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Trims `topic` and checks it against the configured bounds.
    pub fn validate_topic(&self, topic: &str) -> Result<String, ValidationError> {
        let trimmed = topic.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::empty_topic());
        }
        let length = trimmed.chars().count();
        if length > self.max_topic_chars {
            return Err(ValidationError::topic_too_long(length, self.max_topic_chars));
        }
        Ok(trimmed.to_string())
    }
}

/// Settings for the HTTP provider client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Base URL of the chat-completions API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// API key. Never serialized.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Maximum concurrent in-flight requests.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Retry policy for transient failures.
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}
const fn default_timeout_secs() -> u64 {
    60
}
const fn default_max_concurrency() -> usize {
    4
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
            max_concurrency: default_max_concurrency(),
            retry: RetryConfig::default(),
        }
    }
}

impl ProviderConfig {
    /// Creates a config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the base URL.
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Sets the API key.
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub const fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Sets the concurrency bound.
    #[must_use]
    pub const fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max;
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Returns the request timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Pipeline and provider settings together.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentflowConfig {
    /// Pipeline settings.
    #[serde(default)]
    pub pipeline: PipelineConfig,
    /// Provider settings.
    #[serde(default)]
    pub provider: ProviderConfig,
}

impl ContentflowConfig {
    /// Builds a config from defaults overridden by process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from defaults overridden by `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = get(ENV_API_KEY) {
            config.provider.api_key = Some(key);
        }
        if let Some(url) = get(ENV_BASE_URL) {
            config.provider.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(model) = get(ENV_MODEL) {
            config.pipeline.model = model;
        }
        if let Some(raw) = get(ENV_TIMEOUT_SECS) {
            config.provider.timeout_secs = parse_env(ENV_TIMEOUT_SECS, &raw)?;
        }
        if let Some(raw) = get(ENV_MAX_CONCURRENCY) {
            config.provider.max_concurrency = parse_env(ENV_MAX_CONCURRENCY, &raw)?;
        }

        config.pipeline.validate()?;
        Ok(config)
    }
}

fn parse_env<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidEnv {
        key: key.to_string(),
        value: raw.to_string(),
        reason: e.to_string(),
    })
}
