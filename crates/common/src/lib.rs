//! ragdesk Common Library
//!
//! Shared code for the ingestion and search crates including:
//! - Data model (stores, indexed files, query results)
//! - Remote file-search client abstraction
//! - Error types and the error taxonomy
//! - Retry policy
//! - Configuration management
//! - Metrics and logging setup

pub mod client;
pub mod config;
pub mod errors;
pub mod metrics;
pub mod models;
pub mod retry;
pub mod taxonomy;
pub mod telemetry;

// Re-export commonly used types
pub use client::{FileSearchApi, GeminiClient};
pub use config::AppConfig;
pub use errors::{AppError, ErrorCategory, Result};
pub use retry::RetryPolicy;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
