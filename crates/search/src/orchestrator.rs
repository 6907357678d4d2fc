//! Grounded query execution
//!
//! Builds a generation request restricted to one store, runs it, and turns
//! the outcome into a [`QueryResult`]. Failures come back as values with
//! `success == false`; nothing here returns an error to the caller.

use crate::grounding::extract_citations;
use ragdesk_common::client::wire::{Content, GenerationConfig, Tool};
use ragdesk_common::client::{FileSearchApi, GenerateContentRequest, GenerateContentResponse};
use ragdesk_common::config::AppConfig;
use ragdesk_common::errors::Result;
use ragdesk_common::metrics;
use ragdesk_common::models::{QueryResult, StoreHandle};
use ragdesk_common::retry::RetryPolicy;
use ragdesk_common::taxonomy;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument, warn};

/// Low temperature keeps answers close to the retrieved text
pub const DEFAULT_TEMPERATURE: f32 = 0.2;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Security-analyst grounding instruction; `query.system_instruction` replaces it
pub const DEFAULT_SYSTEM_INSTRUCTION: &str = "\
You are a security assistant. You answer questions about the security documents, \
threat intelligence and security policies retrieved from the file search store.
- Only answer security-related questions.
- Base every statement on the retrieved context. Do not use outside knowledge.
- Be strongest on threat analysis, vulnerability assessment, policy interpretation and compliance.
- If the retrieved context does not contain the answer, say that the documents do not cover it.
- Do not speculate, guess, or fill gaps with assumptions.
- Name the source document for each fact when possible.
- Keep answers concise and factual.";

const NO_ANSWER_REMEDIATION: &str =
    "Rephrase the question, or check that the store contains documents on this topic.";

/// Generation settings for a query
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOptions {
    pub model: String,
    pub temperature: f32,
    pub system_instruction: String,
    /// Language every answer is written in; `None` leaves it to the model
    pub answer_language: Option<String>,
    /// Retry transient generation failures with the shared policy
    pub retry_generation: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
            answer_language: None,
            retry_generation: false,
        }
    }
}

impl QueryOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            model: config.api.model.clone(),
            temperature: config.query.temperature,
            system_instruction: config
                .query
                .system_instruction
                .clone()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_SYSTEM_INSTRUCTION.to_string()),
            answer_language: Some(config.query.answer_language.trim().to_string())
                .filter(|lang| !lang.is_empty()),
            retry_generation: config.query.retry_generation,
        }
    }

    /// Instruction sent with every request, answer language included
    pub fn instruction(&self) -> String {
        match &self.answer_language {
            Some(lang) => format!("{}\n- Answer in {}.", self.system_instruction, lang),
            None => self.system_instruction.clone(),
        }
    }
}

/// Runs store-scoped grounded queries
pub struct QueryOrchestrator {
    api: Arc<dyn FileSearchApi>,
    options: QueryOptions,
    retry: RetryPolicy,
}

impl QueryOrchestrator {
    pub fn new(api: Arc<dyn FileSearchApi>, options: QueryOptions) -> Self {
        Self {
            api,
            options,
            retry: RetryPolicy::default(),
        }
    }

    /// Policy used when `retry_generation` is on
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn options(&self) -> &QueryOptions {
        &self.options
    }

    /// Request restricted to `store`
    pub fn build_request(&self, question: &str, store: &StoreHandle) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: vec![Content::user(question)],
            system_instruction: Some(Content::instruction(&self.options.instruction())),
            generation_config: Some(GenerationConfig {
                temperature: self.options.temperature,
            }),
            tools: vec![Tool::file_search(vec![store.resource_id.clone()])],
        }
    }

    /// Answer `question` from the documents in `store`
    #[instrument(skip(self, question), fields(store = %store.resource_id, question_len = question.len()))]
    pub async fn run_query(&self, question: &str, store: &StoreHandle) -> QueryResult {
        let started = Instant::now();
        let result = self.answer(question, store).await;
        metrics::record_query(started.elapsed().as_secs_f64(), result.success);
        result
    }

    async fn answer(&self, question: &str, store: &StoreHandle) -> QueryResult {
        let question = question.trim();
        if question.is_empty() {
            return QueryResult::failed(
                "The question is empty.",
                Some("Enter a question about the uploaded documents.".to_string()),
            );
        }

        let preview: String = question.chars().take(50).collect();
        info!(question = %preview, model = %self.options.model, "Running grounded query");

        let request = self.build_request(question, store);
        let response = match self.generate(&request).await {
            Ok(response) => response,
            Err(e) => {
                let info = taxonomy::handle(&e, "run_query");
                return QueryResult::failed(info.message, Some(info.remediation));
            }
        };

        let citations = extract_citations(&response);
        match response.text() {
            Some(answer) => {
                info!(citations = citations.len(), "Query answered");
                QueryResult::answered(answer, citations)
            }
            None => {
                let message = no_answer_message(&response);
                warn!(error = %message, "Query returned no answer");
                QueryResult::failed(message, Some(NO_ANSWER_REMEDIATION.to_string()))
            }
        }
    }

    async fn generate(&self, request: &GenerateContentRequest) -> Result<GenerateContentResponse> {
        let model = self.options.model.as_str();
        if self.options.retry_generation {
            self.retry
                .execute("generate_content", || self.api.generate_content(model, request))
                .await
        } else {
            self.api.generate_content(model, request).await
        }
    }
}

fn no_answer_message(response: &GenerateContentResponse) -> String {
    let mut message = String::from("The model returned no answer text.");
    if let Some(reason) = response.block_reason() {
        message.push_str(&format!(" (prompt block reason: {})", reason));
    }
    if let Some(reason) = response.finish_reason() {
        message.push_str(&format!(" (finish reason: {})", reason));
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragdesk_common::client::{MockFileSearchApi, MockOp};
    use ragdesk_common::errors::{AppError, ErrorCategory};
    use serde_json::json;
    use std::time::Duration;

    fn store() -> StoreHandle {
        StoreHandle::new("fileSearchStores/security-docs", "security-docs")
    }

    fn orchestrator(api: &Arc<MockFileSearchApi>, options: QueryOptions) -> QueryOrchestrator {
        QueryOrchestrator::new(api.clone(), options).with_retry_policy(RetryPolicy::new(
            3,
            Duration::from_millis(1),
            Duration::from_millis(2),
        ))
    }

    #[tokio::test]
    async fn test_answer_with_citations() {
        let api = Arc::new(MockFileSearchApi::new());
        api.push_response(
            serde_json::from_value(json!({
                "candidates": [{
                    "content": {"parts": [{"text": "Rotate keys every 90 days."}]},
                    "finishReason": "STOP",
                    "groundingMetadata": {"groundingChunks": [
                        {"retrievedContext": {"title": "Doc1"}},
                        {"retrievedContext": {"title": "Doc1"}},
                        {"retrievedContext": {"uri": "loc://x"}}
                    ]}
                }]
            }))
            .unwrap(),
        );

        let result = orchestrator(&api, QueryOptions::default())
            .run_query("How often are keys rotated?", &store())
            .await;

        assert!(result.success);
        assert_eq!(result.answer_text, "Rotate keys every 90 days.");
        assert_eq!(result.citations, vec!["Doc1", "loc://x"]);
        assert_eq!(result.error_message, None);
    }

    #[tokio::test]
    async fn test_request_is_store_scoped() {
        let api = Arc::new(MockFileSearchApi::new());
        orchestrator(&api, QueryOptions::default())
            .run_query("  What is the escalation path?  ", &store())
            .await;

        let (model, request) = api.last_generate().unwrap();
        assert_eq!(model, DEFAULT_MODEL);
        assert_eq!(request.file_search_stores(), vec!["fileSearchStores/security-docs"]);
        assert_eq!(request.generation_config, Some(GenerationConfig { temperature: 0.2 }));
        assert_eq!(
            request.contents[0].parts[0].text.as_deref(),
            Some("What is the escalation path?")
        );
        let instruction = request.system_instruction.unwrap();
        assert!(instruction.parts[0]
            .text
            .as_deref()
            .unwrap()
            .contains("Do not speculate"));
    }

    #[tokio::test]
    async fn test_missing_answer_is_failure_with_diagnostics() {
        let api = Arc::new(MockFileSearchApi::new());
        api.push_response(
            serde_json::from_value(json!({
                "candidates": [{"finishReason": "SAFETY"}],
                "promptFeedback": {"blockReason": "OTHER"}
            }))
            .unwrap(),
        );

        let result = orchestrator(&api, QueryOptions::default())
            .run_query("question", &store())
            .await;

        assert!(!result.success);
        let message = result.error_message.unwrap();
        assert!(message.contains("no answer text"));
        assert!(message.contains("OTHER"));
        assert!(message.contains("SAFETY"));
        assert!(result.answer_text.is_empty());
    }

    #[tokio::test]
    async fn test_remote_error_goes_through_taxonomy() {
        let api = Arc::new(MockFileSearchApi::new());
        api.fail_next(
            MockOp::GenerateContent,
            AppError::remote(ErrorCategory::PermissionDenied, 403, "raw upstream body"),
        );

        let result = orchestrator(&api, QueryOptions::default())
            .run_query("question", &store())
            .await;

        assert!(!result.success);
        let message = result.error_message.unwrap();
        assert_eq!(message, "Access to the search service was denied.");
        assert!(!message.contains("raw upstream body"));
        assert!(result.remediation_hint.is_some());
    }

    #[tokio::test]
    async fn test_generation_not_retried_by_default() {
        let api = Arc::new(MockFileSearchApi::new());
        api.fail_next(
            MockOp::GenerateContent,
            AppError::remote(ErrorCategory::Unavailable, 503, "overloaded"),
        );

        let result = orchestrator(&api, QueryOptions::default())
            .run_query("question", &store())
            .await;

        assert!(!result.success);
        assert_eq!(api.calls(MockOp::GenerateContent), 1);
    }

    #[tokio::test]
    async fn test_generation_retry_opt_in() {
        let api = Arc::new(MockFileSearchApi::new());
        api.fail_next(
            MockOp::GenerateContent,
            AppError::remote(ErrorCategory::Unavailable, 503, "overloaded"),
        );

        let options = QueryOptions {
            retry_generation: true,
            ..QueryOptions::default()
        };
        let result = orchestrator(&api, options).run_query("question", &store()).await;

        assert!(result.success);
        assert_eq!(result.answer_text, "Mock answer.");
        assert_eq!(api.calls(MockOp::GenerateContent), 2);
    }

    #[tokio::test]
    async fn test_rate_limit_hint_includes_wait() {
        let api = Arc::new(MockFileSearchApi::new());
        api.fail_next(
            MockOp::GenerateContent,
            AppError::Remote {
                category: ErrorCategory::ResourceExhausted,
                status: 429,
                message: "quota".into(),
                retry_after: Some(Duration::from_secs(30)),
            },
        );

        let result = orchestrator(&api, QueryOptions::default())
            .run_query("question", &store())
            .await;

        assert!(result.remediation_hint.unwrap().ends_with("Suggested wait: 30s."));
    }

    #[tokio::test]
    async fn test_empty_question_makes_no_call() {
        let api = Arc::new(MockFileSearchApi::new());
        let result = orchestrator(&api, QueryOptions::default())
            .run_query("   ", &store())
            .await;

        assert!(!result.success);
        assert!(result.error_message.is_some());
        assert_eq!(api.calls(MockOp::GenerateContent), 0);
    }

    #[test]
    fn test_options_from_config() {
        let mut config = AppConfig::default();
        config.api.model = "gemini-2.5-pro".to_string();
        config.query.retry_generation = true;
        config.query.system_instruction = Some("Answer in Korean.".to_string());

        let options = QueryOptions::from_config(&config);
        assert_eq!(options.model, "gemini-2.5-pro");
        assert!(options.retry_generation);
        assert_eq!(options.system_instruction, "Answer in Korean.");
        assert_eq!(options.temperature, DEFAULT_TEMPERATURE);
        assert_eq!(options.answer_language.as_deref(), Some("Korean"));

        config.query.system_instruction = Some(" ".to_string());
        assert_eq!(
            QueryOptions::from_config(&config).system_instruction,
            DEFAULT_SYSTEM_INSTRUCTION
        );
    }

    #[test]
    fn test_instruction_is_security_scoped_with_language() {
        let options = QueryOptions::from_config(&AppConfig::default());
        let instruction = options.instruction();
        assert!(instruction.starts_with("You are a security assistant."));
        assert!(instruction.ends_with("- Answer in Korean."));

        let mut config = AppConfig::default();
        config.query.answer_language = "  ".to_string();
        let options = QueryOptions::from_config(&config);
        assert_eq!(options.answer_language, None);
        assert_eq!(options.instruction(), DEFAULT_SYSTEM_INSTRUCTION);
    }
}
