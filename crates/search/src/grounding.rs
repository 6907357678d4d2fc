//! Citation extraction from grounding metadata
//!
//! Sources are collected in the order the service reports them:
//! 1. Each grounding chunk's retrieved context (title, else uri)
//! 2. Each grounding chunk's web source (title, else uri)
//! 3. `source` entries of the retrieval metadata
//!
//! Duplicates keep their first position.

use ragdesk_common::client::wire::{ContextReference, GenerateContentResponse, GroundingMetadata};
use serde_json::Value;
use std::collections::HashSet;

/// Unique source identifiers for the first candidate, first seen wins
pub fn extract_citations(response: &GenerateContentResponse) -> Vec<String> {
    match response.grounding_metadata() {
        Some(metadata) => citations_from_metadata(metadata),
        None => Vec::new(),
    }
}

pub fn citations_from_metadata(metadata: &GroundingMetadata) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut citations = Vec::new();
    let mut push = |source: String| {
        if seen.insert(source.clone()) {
            citations.push(source);
        }
    };

    for chunk in &metadata.grounding_chunks {
        if let Some(source) = chunk.retrieved_context.as_ref().and_then(label) {
            push(source);
        }
        if let Some(source) = chunk.web.as_ref().and_then(label) {
            push(source);
        }
    }

    if let Some(retrieval) = &metadata.retrieval_metadata {
        for source in retrieval_sources(retrieval) {
            push(source);
        }
    }

    citations
}

fn label(reference: &ContextReference) -> Option<String> {
    non_empty(reference.title.as_deref()).or_else(|| non_empty(reference.uri.as_deref()))
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

// Accepts a single object or a list of objects carrying `source`
fn retrieval_sources(value: &Value) -> Vec<String> {
    let entries: Vec<&Value> = match value {
        Value::Array(items) => items.iter().collect(),
        Value::Object(_) => vec![value],
        _ => Vec::new(),
    };

    entries
        .into_iter()
        .filter_map(|entry| match entry.get("source")? {
            Value::String(s) => non_empty(Some(s.as_str())),
            Value::Null => None,
            other => Some(other.to_string()),
        })
        .collect()
}
