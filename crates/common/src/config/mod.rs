//! Configuration management for ragdesk
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with RAGDESK__)
//! - Configuration files (config/default.toml, config/{env}.toml, config/local.toml)
//! - Default values
//!
//! `GEMINI_API_KEY` is honored when no key is configured otherwise.

use crate::errors::{AppError, Result};
use crate::models::ChunkingConfig;
use crate::retry::RetryPolicy;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// Remote service configuration
    #[serde(default)]
    pub api: ApiConfig,

    /// Store selection
    #[serde(default)]
    pub store: StoreConfig,

    /// Upload, chunking, and retry configuration
    #[serde(default)]
    pub ingestion: IngestionConfig,

    /// Generation configuration
    #[serde(default)]
    pub query: QueryConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    /// API key sent as `x-goog-api-key`
    pub api_key: Option<String>,

    /// Service root, without version
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// API version path segment
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Generation model
    #[serde(default = "default_model")]
    pub model: String,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub timeout_secs: u64,

    /// Page size for store listing
    #[serde(default = "default_page_size")]
    pub list_page_size: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    /// Display name used when a store is created
    #[serde(default = "default_store_display_name")]
    pub default_display_name: String,

    /// Existing store to use, e.g. `fileSearchStores/abc`
    pub resource_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IngestionConfig {
    #[serde(default = "default_max_tokens_per_chunk")]
    pub max_tokens_per_chunk: u32,

    #[serde(default = "default_overlap_tokens")]
    pub overlap_tokens: u32,

    /// Attempts per remote step, first call included
    #[serde(default = "default_retry_attempts")]
    pub retry_max_attempts: u32,

    #[serde(default = "default_retry_initial_delay")]
    pub retry_initial_delay_ms: u64,

    #[serde(default = "default_retry_max_delay")]
    pub retry_max_delay_ms: u64,

    /// How long to wait for remote indexing, in seconds
    #[serde(default = "default_index_timeout")]
    pub index_timeout_secs: u64,

    #[serde(default = "default_index_poll_interval")]
    pub index_poll_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueryConfig {
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Retry generation calls with the ingestion retry policy
    #[serde(default)]
    pub retry_generation: bool,

    /// Replaces the built-in grounding instruction
    pub system_instruction: Option<String>,

    /// Language answers are written in; empty leaves it to the model
    #[serde(default = "default_answer_language")]
    pub answer_language: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub json_logging: bool,

    /// Service name attached to log output
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

// Default value functions
fn default_base_url() -> String { "https://generativelanguage.googleapis.com".to_string() }
fn default_api_version() -> String { "v1beta".to_string() }
fn default_model() -> String { "gemini-2.5-flash".to_string() }
fn default_request_timeout() -> u64 { 60 }
fn default_answer_language() -> String { "Korean".to_string() }
fn default_page_size() -> u32 { 20 }
fn default_store_display_name() -> String { "MyRAGFileSearchStore".to_string() }
fn default_max_tokens_per_chunk() -> u32 { crate::models::DEFAULT_MAX_TOKENS_PER_CHUNK }
fn default_overlap_tokens() -> u32 { crate::models::DEFAULT_OVERLAP_TOKENS }
fn default_retry_attempts() -> u32 { 3 }
fn default_retry_initial_delay() -> u64 { 1_000 }
fn default_retry_max_delay() -> u64 { 32_000 }
fn default_index_timeout() -> u64 { 300 }
fn default_index_poll_interval() -> u64 { 5 }
fn default_temperature() -> f32 { 0.2 }
fn default_log_level() -> String { "info".to_string() }
fn default_service_name() -> String { "ragdesk".to_string() }

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            api_version: default_api_version(),
            model: default_model(),
            timeout_secs: default_request_timeout(),
            list_page_size: default_page_size(),
        }
    }
}

impl ApiConfig {
    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            default_display_name: default_store_display_name(),
            resource_id: None,
        }
    }
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            max_tokens_per_chunk: default_max_tokens_per_chunk(),
            overlap_tokens: default_overlap_tokens(),
            retry_max_attempts: default_retry_attempts(),
            retry_initial_delay_ms: default_retry_initial_delay(),
            retry_max_delay_ms: default_retry_max_delay(),
            index_timeout_secs: default_index_timeout(),
            index_poll_interval_secs: default_index_poll_interval(),
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            retry_generation: false,
            system_instruction: None,
            answer_language: default_answer_language(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: false,
            service_name: default_service_name(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> std::result::Result<Self, ConfigError> {
        let env = std::env::var("RAGDESK_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))
            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            // Load local overrides
            .add_source(File::with_name("config/local").required(false))
            // e.g., RAGDESK__API__MODEL=gemini-2.5-pro
            .add_source(
                Environment::with_prefix("RAGDESK")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = config.try_deserialize()?;
        Ok(config.with_env_api_key())
    }

    /// Load from a specific TOML file
    pub fn from_file(path: &str) -> std::result::Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("RAGDESK")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = config.try_deserialize()?;
        Ok(config.with_env_api_key())
    }

    fn with_env_api_key(mut self) -> Self {
        if self.api.api_key.as_deref().map_or(true, str::is_empty) {
            self.api.api_key = std::env::var("GEMINI_API_KEY")
                .ok()
                .filter(|key| !key.trim().is_empty());
        }
        self
    }

    /// Fail early when the remote service cannot be reached at all
    pub fn validate(&self) -> Result<()> {
        if self.api.api_key.as_deref().map_or(true, |k| k.trim().is_empty()) {
            return Err(AppError::Configuration {
                message: "GEMINI_API_KEY (or RAGDESK__API__API_KEY) must be set".to_string(),
            });
        }
        if self.ingestion.index_poll_interval_secs == 0 {
            return Err(AppError::Configuration {
                message: "ingestion.index_poll_interval_secs must be positive".to_string(),
            });
        }
        Ok(())
    }

    /// Chunking configuration, clamped to the service cap
    pub fn chunking(&self) -> ChunkingConfig {
        ChunkingConfig::new(self.ingestion.max_tokens_per_chunk, self.ingestion.overlap_tokens)
    }

    /// Retry policy shared by uploads, imports, and opt-in generation retries
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.ingestion.retry_max_attempts,
            Duration::from_millis(self.ingestion.retry_initial_delay_ms),
            Duration::from_millis(self.ingestion.retry_max_delay_ms),
        )
    }

    pub fn index_timeout(&self) -> Duration {
        Duration::from_secs(self.ingestion.index_timeout_secs)
    }

    pub fn index_poll_interval(&self) -> Duration {
        Duration::from_secs(self.ingestion.index_poll_interval_secs)
    }
}
