//! Error taxonomy
//!
//! Maps an error category to a user-facing message, a severity, and a
//! remediation hint, and writes a structured log record for the failure.
//! The mapping is a plain `match` over [`ErrorCategory`]; nothing depends on
//! the order in which error types are declared.

use crate::errors::{AppError, ErrorCategory};
use serde::{Deserialize, Serialize};
use std::error::Error as StdError;
use std::fmt;
use tracing::{error, info, warn};

/// How loudly a failure is reported
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Critical => "CRITICAL",
        };
        f.write_str(s)
    }
}

/// User-facing description of a failure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorInfo {
    pub category: ErrorCategory,
    pub message: String,
    pub severity: Severity,
    pub remediation: String,
}

/// Static description for a category
pub fn describe(category: ErrorCategory) -> ErrorInfo {
    let (message, severity, remediation) = match category {
        ErrorCategory::Validation => (
            "The file could not be accepted for upload.",
            Severity::Error,
            "Check the file size and type. Supported types are PDF, TXT, Markdown, HWP and HWPX; the maximum size is 100 MB.",
        ),
        ErrorCategory::Unavailable => (
            "The search service is temporarily unavailable.",
            Severity::Warning,
            "Wait a moment and try again.",
        ),
        ErrorCategory::Internal => (
            "The search service reported an internal error.",
            Severity::Warning,
            "Try again shortly. If the problem persists, report it to an administrator.",
        ),
        ErrorCategory::ResourceExhausted => (
            "The API rate limit or quota was exceeded.",
            Severity::Warning,
            "Wait before trying again. If this keeps happening, check the API usage quota or request an increase.",
        ),
        ErrorCategory::Timeout => (
            "The request to the search service timed out.",
            Severity::Error,
            "Try again. Large documents and long questions can take longer to process.",
        ),
        ErrorCategory::InvalidArgument => (
            "The search service rejected the request parameters.",
            Severity::Error,
            "This points to an internal problem. Report it to the development team.",
        ),
        ErrorCategory::Unauthenticated => (
            "The API key was rejected.",
            Severity::Critical,
            "Check that GEMINI_API_KEY is set to a valid key.",
        ),
        ErrorCategory::PermissionDenied => (
            "Access to the search service was denied.",
            Severity::Critical,
            "Check the API key permissions and that it belongs to the intended project.",
        ),
        ErrorCategory::NotFound => (
            "The requested resource could not be found.",
            Severity::Error,
            "The store or document may have been deleted, or the identifier is wrong.",
        ),
        ErrorCategory::AlreadyExists => (
            "A resource with that name already exists.",
            Severity::Warning,
            "Choose a different name or reuse the existing resource.",
        ),
        ErrorCategory::FailedPrecondition => (
            "The service cannot process the request in the resource's current state.",
            Severity::Error,
            "Check the resource state, for example whether indexing has finished, and try again.",
        ),
        ErrorCategory::Indexing => (
            "The document could not be indexed.",
            Severity::Error,
            "The document content may be unreadable, or indexing hit a temporary fault. Check the file and upload it again later.",
        ),
        ErrorCategory::Configuration => (
            "The application is misconfigured.",
            Severity::Critical,
            "Check the API key and environment settings (GEMINI_API_KEY, RAGDESK__* variables).",
        ),
        ErrorCategory::Unknown => (
            "An unexpected error occurred.",
            Severity::Critical,
            "The service hit a temporary problem. Try again later or contact an administrator.",
        ),
    };

    ErrorInfo {
        category,
        message: message.to_string(),
        severity,
        remediation: remediation.to_string(),
    }
}

/// Description for a concrete error, including any suggested wait
pub fn for_error(err: &AppError) -> ErrorInfo {
    let mut info = describe(err.category());
    if let Some(wait) = err.retry_after() {
        let secs = wait.as_secs_f64().ceil() as u64;
        info.remediation = format!("{} Suggested wait: {}s.", info.remediation, secs.max(1));
    }
    info
}

/// Describe a failure and log it under `context`
pub fn handle(err: &AppError, context: &str) -> ErrorInfo {
    let info = for_error(err);
    log_error(err, context, info.severity);
    info
}

/// Render the error and every `source()` beneath it
pub fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str(" <- ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}

fn log_error(err: &AppError, context: &str, severity: Severity) {
    let category = err.category();
    match severity {
        Severity::Critical | Severity::Error => {
            error!(
                context,
                severity = %severity,
                category = ?category,
                error = %err,
                trace = %error_chain(err),
                detail = ?err,
                "Operation failed"
            );
        }
        Severity::Warning => {
            warn!(
                context,
                severity = %severity,
                category = ?category,
                error = %err,
                "Operation failed"
            );
        }
        Severity::Info => {
            info!(context, severity = %severity, category = ?category, "Operation failed");
        }
    }
}
