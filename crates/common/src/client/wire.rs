//! JSON shapes of the generation endpoint
//!
//! Only the fields ragdesk reads or writes are modeled; everything else in a
//! response is ignored.

use serde::{Deserialize, Serialize};

/// `models/{model}:generateContent` request body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Tool>,
}

impl GenerateContentRequest {
    /// Single-turn user question
    pub fn from_question(question: &str) -> Self {
        Self {
            contents: vec![Content::user(question)],
            system_instruction: None,
            generation_config: None,
            tools: Vec::new(),
        }
    }

    /// Stores the retrieval tool is restricted to
    pub fn file_search_stores(&self) -> Vec<&str> {
        self.tools
            .iter()
            .filter_map(|t| t.file_search.as_ref())
            .flat_map(|fs| fs.file_search_store_names.iter().map(String::as_str))
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    pub fn user(text: &str) -> Self {
        Self {
            role: Some("user".to_string()),
            parts: vec![Part::text(text)],
        }
    }

    /// System instructions carry no role
    pub fn instruction(text: &str) -> Self {
        Self {
            role: None,
            parts: vec![Part::text(text)],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Set on reasoning parts, which are not part of the answer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thought: Option<bool>,
}

impl Part {
    pub fn text(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            thought: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_search: Option<FileSearchTool>,
}

impl Tool {
    pub fn file_search(store_names: Vec<String>) -> Self {
        Self {
            file_search: Some(FileSearchTool {
                file_search_store_names: store_names,
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSearchTool {
    pub file_search_store_names: Vec<String>,
}

/// `models/{model}:generateContent` response body
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,

    pub prompt_feedback: Option<PromptFeedback>,
}

impl GenerateContentResponse {
    /// Answer text of the first candidate, `None` when blank
    pub fn text(&self) -> Option<String> {
        let candidate = self.candidates.first()?;
        let content = candidate.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter(|p| p.thought != Some(true))
            .filter_map(|p| p.text.as_deref())
            .collect();

        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }

    pub fn block_reason(&self) -> Option<&str> {
        self.prompt_feedback.as_ref()?.block_reason.as_deref()
    }

    pub fn finish_reason(&self) -> Option<&str> {
        self.candidates.first()?.finish_reason.as_deref()
    }

    pub fn grounding_metadata(&self) -> Option<&GroundingMetadata> {
        self.candidates.first()?.grounding_metadata.as_ref()
    }

    /// Response carrying a plain answer, mostly for tests
    pub fn with_text(text: &str) -> Self {
        Self {
            candidates: vec![Candidate {
                content: Some(Content {
                    role: Some("model".to_string()),
                    parts: vec![Part::text(text)],
                }),
                finish_reason: Some("STOP".to_string()),
                grounding_metadata: None,
            }],
            prompt_feedback: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub content: Option<Content>,
    pub finish_reason: Option<String>,
    pub grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    pub block_reason: Option<String>,
}

/// Sources the service used to ground an answer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroundingMetadata {
    #[serde(default)]
    pub grounding_chunks: Vec<GroundingChunk>,

    /// Shape varies by tool; read leniently
    pub retrieval_metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroundingChunk {
    pub retrieved_context: Option<ContextReference>,
    pub web: Option<ContextReference>,
}

/// Title and location of one retrieved source
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextReference {
    pub title: Option<String>,
    pub uri: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_shape() {
        let mut request = GenerateContentRequest::from_question("What is CVE-2024-1?");
        request.system_instruction = Some(Content::instruction("Answer from context only."));
        request.generation_config = Some(GenerationConfig { temperature: 0.2 });
        request.tools = vec![Tool::file_search(vec!["fileSearchStores/s1".to_string()])];

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["contents"][0]["role"], "user");
        assert_eq!(value["contents"][0]["parts"][0]["text"], "What is CVE-2024-1?");
        assert!(value["systemInstruction"].get("role").is_none());
        assert_eq!(
            value["tools"][0]["fileSearch"]["fileSearchStoreNames"][0],
            "fileSearchStores/s1"
        );
        assert!((value["generationConfig"]["temperature"].as_f64().unwrap() - 0.2).abs() < 1e-6);
        assert_eq!(request.file_search_stores(), vec!["fileSearchStores/s1"]);
    }

    #[test]
    fn test_response_parsing() {
        let body = json!({
            "candidates": [{
                "content": {"role": "model", "parts": [
                    {"text": "thinking...", "thought": true},
                    {"text": "Patch "},
                    {"text": "now."}
                ]},
                "finishReason": "STOP",
                "groundingMetadata": {
                    "groundingChunks": [
                        {"retrievedContext": {"title": "policy.pdf", "text": "..."}}
                    ],
                    "groundingSupports": []
                }
            }],
            "usageMetadata": {"totalTokenCount": 10}
        });

        let response: GenerateContentResponse = serde_json::from_value(body).unwrap();
        assert_eq!(response.text().as_deref(), Some("Patch now."));
        assert_eq!(response.finish_reason(), Some("STOP"));
        let chunks = &response.grounding_metadata().unwrap().grounding_chunks;
        assert_eq!(chunks[0].retrieved_context.as_ref().unwrap().title.as_deref(), Some("policy.pdf"));
    }

    #[test]
    fn test_blocked_response_has_no_text() {
        let body = json!({"promptFeedback": {"blockReason": "SAFETY"}});
        let response: GenerateContentResponse = serde_json::from_value(body).unwrap();
        assert_eq!(response.text(), None);
        assert_eq!(response.block_reason(), Some("SAFETY"));
        assert_eq!(response.finish_reason(), None);
    }

    #[test]
    fn test_whitespace_answer_counts_as_missing() {
        let response = GenerateContentResponse::with_text("  \n");
        assert_eq!(response.text(), None);
    }
}
