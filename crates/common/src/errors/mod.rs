//! Error types for ragdesk
//!
//! Provides a single error enum with:
//! - Distinct variants for local validation, remote, and internal failures
//! - An explicit category tag attached where the error is created
//! - Transient vs. fatal classification used by the retry executor

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error categories for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    // Local input
    Validation,

    // Transient remote failures
    Unavailable,
    Internal,
    ResourceExhausted,

    // Remote failures that will not resolve on retry
    Timeout,
    InvalidArgument,
    Unauthenticated,
    PermissionDenied,
    NotFound,
    AlreadyExists,
    FailedPrecondition,
    Indexing,

    // Process-level
    Configuration,
    Unknown,
}

impl ErrorCategory {
    /// Categories the default retry policy treats as transient
    pub const TRANSIENT: &'static [ErrorCategory] = &[
        ErrorCategory::Unavailable,
        ErrorCategory::Internal,
        ErrorCategory::ResourceExhausted,
    ];

    /// Whether a failure of this category is expected to resolve on retry
    pub fn is_transient(&self) -> bool {
        Self::TRANSIENT.contains(self)
    }

    /// Map an upstream `google.rpc.Code` status name
    pub fn from_rpc_status(status: &str) -> Option<Self> {
        let category = match status {
            "INVALID_ARGUMENT" | "OUT_OF_RANGE" => ErrorCategory::InvalidArgument,
            "UNAUTHENTICATED" => ErrorCategory::Unauthenticated,
            "PERMISSION_DENIED" => ErrorCategory::PermissionDenied,
            "NOT_FOUND" => ErrorCategory::NotFound,
            "ALREADY_EXISTS" | "ABORTED" => ErrorCategory::AlreadyExists,
            "FAILED_PRECONDITION" => ErrorCategory::FailedPrecondition,
            "RESOURCE_EXHAUSTED" => ErrorCategory::ResourceExhausted,
            "INTERNAL" | "DATA_LOSS" => ErrorCategory::Internal,
            "UNAVAILABLE" => ErrorCategory::Unavailable,
            "DEADLINE_EXCEEDED" => ErrorCategory::Timeout,
            "UNKNOWN" => ErrorCategory::Unknown,
            _ => return None,
        };
        Some(category)
    }

    /// Map an HTTP status code when the body carries no usable status name
    pub fn from_http_status(status: u16) -> Self {
        match status {
            400 => ErrorCategory::InvalidArgument,
            401 => ErrorCategory::Unauthenticated,
            403 => ErrorCategory::PermissionDenied,
            404 => ErrorCategory::NotFound,
            409 => ErrorCategory::AlreadyExists,
            412 => ErrorCategory::FailedPrecondition,
            408 => ErrorCategory::Timeout,
            429 => ErrorCategory::ResourceExhausted,
            500 => ErrorCategory::Internal,
            502..=504 => ErrorCategory::Unavailable,
            s if s >= 500 => ErrorCategory::Internal,
            _ => ErrorCategory::Unknown,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Local validation errors
    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("Not a regular file: {path}")]
    NotAFile { path: String },

    #[error("File too large: {size} bytes exceeds limit of {limit} bytes")]
    PayloadTooLarge { size: u64, limit: u64 },

    #[error("Unsupported file type: {extension:?} (supported: {supported})")]
    UnsupportedFileType { extension: String, supported: String },

    #[error("Validation failed: {message}")]
    Validation { message: String },

    // Remote service errors, tagged at the HTTP boundary
    #[error("Remote error {status} ({category:?}): {message}")]
    Remote {
        category: ErrorCategory,
        status: u16,
        message: String,
        retry_after: Option<Duration>,
    },

    /// An import operation the service finished with an error status
    #[error("Indexing of {file} failed with code {code}: {message}")]
    Indexing {
        file: String,
        code: i32,
        message: String,
    },

    #[error("Request timed out: {message}")]
    Timeout { message: String },

    #[error("Transport error: {message}")]
    Transport { message: String },

    // Internal errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl AppError {
    /// Shorthand for a remote error without retry hint
    pub fn remote(category: ErrorCategory, status: u16, message: impl Into<String>) -> Self {
        AppError::Remote {
            category,
            status,
            message: message.into(),
            retry_after: None,
        }
    }

    /// Get the category for this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            AppError::FileNotFound { .. }
            | AppError::NotAFile { .. }
            | AppError::PayloadTooLarge { .. }
            | AppError::UnsupportedFileType { .. }
            | AppError::Validation { .. } => ErrorCategory::Validation,
            AppError::Remote { category, .. } => *category,
            AppError::Indexing { .. } => ErrorCategory::Indexing,
            AppError::Timeout { .. } => ErrorCategory::Timeout,
            AppError::Transport { .. } => ErrorCategory::Unavailable,
            AppError::Configuration { .. } => ErrorCategory::Configuration,
            AppError::Serialization(_) | AppError::Io(_) | AppError::Internal { .. } => {
                ErrorCategory::Unknown
            }
        }
    }

    /// Suggested wait reported by the remote service, if any
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            AppError::Remote { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Check if this error is expected to resolve on retry
    pub fn is_transient(&self) -> bool {
        self.category().is_transient()
    }

    /// Check if this error came from bad local input
    pub fn is_validation(&self) -> bool {
        self.category() == ErrorCategory::Validation
    }

    pub fn is_not_found(&self) -> bool {
        self.category() == ErrorCategory::NotFound
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AppError::Timeout {
                message: err.to_string(),
            }
        } else if err.is_decode() {
            AppError::Internal {
                message: format!("Failed to decode response: {}", err),
            }
        } else if let Some(status) = err.status() {
            AppError::remote(
                ErrorCategory::from_http_status(status.as_u16()),
                status.as_u16(),
                err.to_string(),
            )
        } else {
            AppError::Transport {
                message: err.to_string(),
            }
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_variants_share_category() {
        let errors = [
            AppError::FileNotFound { path: "a.pdf".into() },
            AppError::NotAFile { path: "dir".into() },
            AppError::PayloadTooLarge { size: 2, limit: 1 },
            AppError::UnsupportedFileType {
                extension: ".exe".into(),
                supported: ".pdf".into(),
            },
        ];
        for err in errors {
            assert_eq!(err.category(), ErrorCategory::Validation);
            assert!(!err.is_transient());
        }
    }

    #[test]
    fn test_transient_split() {
        assert!(ErrorCategory::Unavailable.is_transient());
        assert!(ErrorCategory::Internal.is_transient());
        assert!(ErrorCategory::ResourceExhausted.is_transient());

        assert!(!ErrorCategory::InvalidArgument.is_transient());
        assert!(!ErrorCategory::PermissionDenied.is_transient());
        assert!(!ErrorCategory::NotFound.is_transient());
        assert!(!ErrorCategory::AlreadyExists.is_transient());
        assert!(!ErrorCategory::Timeout.is_transient());
        assert!(!ErrorCategory::Indexing.is_transient());
    }

    #[test]
    fn test_indexing_failure_category() {
        let err = AppError::Indexing {
            file: "files/abc".into(),
            code: 3,
            message: "unsupported document".into(),
        };
        assert_eq!(err.category(), ErrorCategory::Indexing);
        assert_eq!(
            err.to_string(),
            "Indexing of files/abc failed with code 3: unsupported document"
        );
    }

    #[test]
    fn test_rpc_status_takes_names() {
        assert_eq!(
            ErrorCategory::from_rpc_status("RESOURCE_EXHAUSTED"),
            Some(ErrorCategory::ResourceExhausted)
        );
        assert_eq!(
            ErrorCategory::from_rpc_status("ALREADY_EXISTS"),
            Some(ErrorCategory::AlreadyExists)
        );
        assert_eq!(ErrorCategory::from_rpc_status("SOMETHING_NEW"), None);
    }

    #[test]
    fn test_http_status_fallback() {
        assert_eq!(ErrorCategory::from_http_status(404), ErrorCategory::NotFound);
        assert_eq!(ErrorCategory::from_http_status(429), ErrorCategory::ResourceExhausted);
        assert_eq!(ErrorCategory::from_http_status(503), ErrorCategory::Unavailable);
        assert_eq!(ErrorCategory::from_http_status(507), ErrorCategory::Internal);
        assert_eq!(ErrorCategory::from_http_status(418), ErrorCategory::Unknown);
    }

    #[test]
    fn test_transport_errors_are_retryable() {
        let err = AppError::Transport {
            message: "connection reset".into(),
        };
        assert_eq!(err.category(), ErrorCategory::Unavailable);
        assert!(err.is_transient());
    }

    #[test]
    fn test_retry_after_only_on_remote() {
        let err = AppError::Remote {
            category: ErrorCategory::ResourceExhausted,
            status: 429,
            message: "quota".into(),
            retry_after: Some(Duration::from_secs(30)),
        };
        assert_eq!(err.retry_after(), Some(Duration::from_secs(30)));
        assert_eq!(AppError::Internal { message: "x".into() }.retry_after(), None);
    }
}
