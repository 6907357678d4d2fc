//! Normalized query outcome

use serde::{Deserialize, Serialize};

/// Result of a grounded query.
///
/// Failures are values: callers branch on `success` rather than on a caught
/// error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResult {
    pub answer_text: String,
    /// Unique source identifiers in first-seen order
    pub citations: Vec<String>,
    pub success: bool,
    pub error_message: Option<String>,
    pub remediation_hint: Option<String>,
}

impl QueryResult {
    pub fn answered(answer_text: impl Into<String>, citations: Vec<String>) -> Self {
        Self {
            answer_text: answer_text.into(),
            citations,
            success: true,
            error_message: None,
            remediation_hint: None,
        }
    }

    pub fn failed(message: impl Into<String>, remediation: Option<String>) -> Self {
        Self {
            answer_text: String::new(),
            citations: Vec::new(),
            success: false,
            error_message: Some(message.into()),
            remediation_hint: remediation,
        }
    }
}
