//! ragdesk search
//!
//! Answers questions from the documents in one store. The generation call is
//! restricted to that store, and the sources the service reports are returned
//! as citations alongside the answer.

pub mod grounding;
pub mod orchestrator;

pub use grounding::extract_citations;
pub use orchestrator::{QueryOptions, QueryOrchestrator};
