//! REST client for the hosted file-search service

use super::{FileSearchApi, FileUpload, GenerateContentRequest, GenerateContentResponse};
use crate::config::ApiConfig;
use crate::errors::{AppError, ErrorCategory, Result};
use crate::metrics::RemoteCallMetrics;
use crate::models::{ChunkingConfig, Operation, OperationError, RemoteFile, StoreHandle};
use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

const API_KEY_HEADER: &str = "x-goog-api-key";
const UPLOAD_URL_HEADER: &str = "x-goog-upload-url";

/// Client for the `generativelanguage` REST API
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    api_version: String,
    page_size: u32,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.base_url)
            .field("api_version", &self.api_version)
            .finish_non_exhaustive()
    }
}

impl GeminiClient {
    /// Build a client from configuration; the API key is required
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or_else(|| AppError::Configuration {
                message: "API key is not configured".to_string(),
            })?
            .to_string();

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_version: config.api_version.clone(),
            page_size: config.list_page_size,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}/{}", self.base_url, self.api_version, path)
    }

    fn upload_endpoint(&self) -> String {
        format!("{}/upload/{}/files", self.base_url, self.api_version)
    }

    /// Send with credentials and turn non-2xx responses into tagged errors
    async fn execute(&self, operation: &'static str, request: RequestBuilder) -> Result<Response> {
        let call = RemoteCallMetrics::start(operation);

        let response = match request.header(API_KEY_HEADER, &self.api_key).send().await {
            Ok(response) => response,
            Err(e) => {
                call.finish(0);
                return Err(e.into());
            }
        };

        let status = response.status();
        call.finish(status.as_u16());

        if status.is_success() {
            return Ok(response);
        }

        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await.unwrap_or_default();

        Err(error_from_response(status.as_u16(), retry_after.as_deref(), &body))
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<T> {
        let response = self.execute(operation, request).await?;
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl FileSearchApi for GeminiClient {
    #[instrument(skip(self))]
    async fn create_store(&self, display_name: &str) -> Result<StoreHandle> {
        let body = CreateStoreRequest { display_name };
        let store: StoreResource = self
            .send_json(
                "create_store",
                self.client.post(self.endpoint("fileSearchStores")).json(&body),
            )
            .await?;
        Ok(store.into())
    }

    #[instrument(skip(self))]
    async fn get_store(&self, resource_id: &str) -> Result<StoreHandle> {
        let store: StoreResource = self
            .send_json("get_store", self.client.get(self.endpoint(resource_id)))
            .await?;
        Ok(store.into())
    }

    #[instrument(skip(self))]
    async fn list_stores(&self) -> Result<Vec<StoreHandle>> {
        let mut stores = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .get(self.endpoint("fileSearchStores"))
                .query(&[("pageSize", self.page_size.to_string())]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token)]);
            }

            let page: ListStoresResponse = self.send_json("list_stores", request).await?;
            stores.extend(page.file_search_stores.into_iter().map(StoreHandle::from));

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!(count = stores.len(), "Listed stores");
        Ok(stores)
    }

    #[instrument(skip(self))]
    async fn delete_store(&self, resource_id: &str) -> Result<()> {
        let request = self
            .client
            .delete(self.endpoint(resource_id))
            .query(&[("force", "true")]);
        self.execute("delete_store", request).await?;
        Ok(())
    }

    #[instrument(skip(self, upload), fields(display_name = %upload.display_name, size = upload.bytes.len()))]
    async fn upload_file(&self, upload: &FileUpload) -> Result<RemoteFile> {
        let start = self
            .client
            .post(self.upload_endpoint())
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", upload.bytes.len().to_string())
            .header("X-Goog-Upload-Header-Content-Type", &upload.mime_type)
            .json(&StartUploadRequest {
                file: UploadMetadata {
                    display_name: &upload.display_name,
                },
            });

        let response = self.execute("upload_start", start).await?;
        let upload_url = response
            .headers()
            .get(UPLOAD_URL_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| AppError::Internal {
                message: "Upload session response carried no upload URL".to_string(),
            })?;

        let finish = self
            .client
            .post(upload_url)
            .header("X-Goog-Upload-Offset", "0")
            .header("X-Goog-Upload-Command", "upload, finalize")
            .body(upload.bytes.clone());

        let uploaded: UploadResponse = self.send_json("upload_file", finish).await?;
        Ok(uploaded.file.into())
    }

    #[instrument(skip(self))]
    async fn import_file(
        &self,
        store_id: &str,
        file_name: &str,
        chunking: &ChunkingConfig,
    ) -> Result<Operation> {
        let body = ImportFileRequest::new(file_name, chunking);
        let operation: OperationResource = self
            .send_json(
                "import_file",
                self.client
                    .post(self.endpoint(&format!("{}:importFile", store_id)))
                    .json(&body),
            )
            .await?;
        Ok(operation.into())
    }

    #[instrument(skip(self))]
    async fn delete_document(&self, document_name: &str) -> Result<()> {
        let request = self
            .client
            .delete(self.endpoint(document_name))
            .query(&[("force", "true")]);
        self.execute("delete_document", request).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_operation(&self, operation_name: &str) -> Result<Operation> {
        let operation: OperationResource = self
            .send_json("get_operation", self.client.get(self.endpoint(operation_name)))
            .await?;
        Ok(operation.into())
    }

    #[instrument(skip(self, request))]
    async fn generate_content(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse> {
        let model = model.strip_prefix("models/").unwrap_or(model);
        let url = self.endpoint(&format!("models/{}:generateContent", model));
        self.send_json("generate_content", self.client.post(url).json(request))
            .await
    }
}

/// Tag a failed response with a category and any retry hint.
///
/// The `google.rpc` status name in the body wins over the HTTP status code.
/// A `RetryInfo` detail wins over the `Retry-After` header.
pub(crate) fn error_from_response(status: u16, retry_after: Option<&str>, body: &str) -> AppError {
    let parsed = serde_json::from_str::<ErrorEnvelope>(body).ok().map(|e| e.error);

    let category = parsed
        .as_ref()
        .and_then(|e| e.status.as_deref())
        .and_then(ErrorCategory::from_rpc_status)
        .unwrap_or_else(|| ErrorCategory::from_http_status(status));

    let hinted = parsed.as_ref().and_then(|e| {
        e.details.iter().find_map(|detail| {
            let is_retry_info = detail
                .get("@type")
                .and_then(|t| t.as_str())
                .is_some_and(|t| t.ends_with("google.rpc.RetryInfo"));
            if !is_retry_info {
                return None;
            }
            detail
                .get("retryDelay")
                .and_then(|d| d.as_str())
                .and_then(parse_duration)
        })
    });
    let retry_after = hinted.or_else(|| {
        retry_after
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
    });

    let message = parsed
        .and_then(|e| e.message)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                format!("HTTP {}", status)
            } else {
                trimmed.chars().take(500).collect()
            }
        });

    AppError::Remote {
        category,
        status,
        message,
        retry_after,
    }
}

/// Parse a protobuf JSON duration such as `"30s"` or `"1.5s"`
fn parse_duration(value: &str) -> Option<Duration> {
    let seconds: f64 = value.trim().strip_suffix('s')?.parse().ok()?;
    Duration::try_from_secs_f64(seconds).ok()
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    status: Option<String>,
    #[serde(default)]
    details: Vec<serde_json::Value>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateStoreRequest<'a> {
    display_name: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoreResource {
    name: String,
    #[serde(default)]
    display_name: Option<String>,
}

impl From<StoreResource> for StoreHandle {
    fn from(store: StoreResource) -> Self {
        StoreHandle::new(store.name, store.display_name.unwrap_or_default())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListStoresResponse {
    #[serde(default)]
    file_search_stores: Vec<StoreResource>,
    next_page_token: Option<String>,
}

#[derive(Serialize)]
struct StartUploadRequest<'a> {
    file: UploadMetadata<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadMetadata<'a> {
    display_name: &'a str,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    file: FileResource,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileResource {
    name: String,
    mime_type: Option<String>,
    /// int64 travels as a JSON string
    size_bytes: Option<String>,
}

impl From<FileResource> for RemoteFile {
    fn from(file: FileResource) -> Self {
        RemoteFile {
            name: file.name,
            mime_type: file.mime_type,
            size_bytes: file.size_bytes.and_then(|s| s.parse().ok()),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ImportFileRequest<'a> {
    file_name: &'a str,
    chunking_config: ChunkingConfigBody,
}

impl<'a> ImportFileRequest<'a> {
    fn new(file_name: &'a str, chunking: &ChunkingConfig) -> Self {
        Self {
            file_name,
            chunking_config: ChunkingConfigBody {
                white_space_config: WhiteSpaceConfig {
                    max_tokens_per_chunk: chunking.max_tokens_per_chunk,
                    max_overlap_tokens: chunking.overlap_tokens,
                },
            },
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChunkingConfigBody {
    white_space_config: WhiteSpaceConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WhiteSpaceConfig {
    max_tokens_per_chunk: u32,
    max_overlap_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct OperationResource {
    name: String,
    #[serde(default)]
    done: bool,
    error: Option<StatusBody>,
    response: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct StatusBody {
    #[serde(default)]
    code: i32,
    #[serde(default)]
    message: String,
}

impl From<OperationResource> for Operation {
    fn from(op: OperationResource) -> Self {
        let document_name = op
            .response
            .as_ref()
            .and_then(|r| r.get("documentName"))
            .and_then(|d| d.as_str())
            .map(str::to_string);

        Operation {
            name: op.name,
            done: op.done,
            error: op.error.map(|e| OperationError {
                code: e.code,
                message: e.message,
            }),
            document_name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config() -> ApiConfig {
        ApiConfig {
            api_key: Some("test-key".to_string()),
            base_url: "https://example.test/".to_string(),
            ..ApiConfig::default()
        }
    }

    #[test]
    fn test_client_requires_api_key() {
        let mut config = config();
        config.api_key = None;
        let err = GeminiClient::new(&config).unwrap_err();
        assert!(matches!(err, AppError::Configuration { .. }));

        config.api_key = Some("   ".to_string());
        assert!(GeminiClient::new(&config).is_err());
    }

    #[test]
    fn test_endpoints() {
        let client = GeminiClient::new(&config()).unwrap();
        assert_eq!(
            client.endpoint("fileSearchStores/abc:importFile"),
            "https://example.test/v1beta/fileSearchStores/abc:importFile"
        );
        assert_eq!(client.upload_endpoint(), "https://example.test/upload/v1beta/files");
    }

    #[test]
    fn test_rpc_status_beats_http_status() {
        let body = json!({
            "error": {"code": 400, "message": "quota hit", "status": "RESOURCE_EXHAUSTED"}
        })
        .to_string();
        let err = error_from_response(400, None, &body);
        assert_eq!(err.category(), ErrorCategory::ResourceExhausted);
        assert!(err.to_string().contains("quota hit"));
    }

    #[test]
    fn test_retry_info_detail() {
        let body = json!({
            "error": {
                "code": 429,
                "message": "Resource has been exhausted",
                "status": "RESOURCE_EXHAUSTED",
                "details": [
                    {"@type": "type.googleapis.com/google.rpc.QuotaFailure"},
                    {"@type": "type.googleapis.com/google.rpc.RetryInfo", "retryDelay": "30s"}
                ]
            }
        })
        .to_string();
        let err = error_from_response(429, Some("5"), &body);
        assert_eq!(err.retry_after(), Some(Duration::from_secs(30)));
        assert!(err.is_transient());
    }

    #[test]
    fn test_retry_after_header_fallback() {
        let err = error_from_response(503, Some("7"), "upstream connect error");
        assert_eq!(err.category(), ErrorCategory::Unavailable);
        assert_eq!(err.retry_after(), Some(Duration::from_secs(7)));
        assert!(err.to_string().contains("upstream connect error"));
    }

    #[test]
    fn test_empty_body_uses_status() {
        let err = error_from_response(404, None, "");
        assert!(err.is_not_found());
        assert!(err.to_string().contains("HTTP 404"));
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("30s"), Some(Duration::from_secs(30)));
        assert_eq!(parse_duration("1.5s"), Some(Duration::from_millis(1500)));
        assert_eq!(parse_duration("30"), None);
        assert_eq!(parse_duration("-1s"), None);
        assert_eq!(parse_duration("NaNs"), None);
        assert_eq!(parse_duration("1e30s"), None);
    }

    #[test]
    fn test_out_of_range_retry_delay_is_ignored() {
        let body = json!({
            "error": {
                "code": 429,
                "message": "slow down",
                "status": "RESOURCE_EXHAUSTED",
                "details": [
                    {"@type": "type.googleapis.com/google.rpc.RetryInfo", "retryDelay": "1e30s"}
                ]
            }
        })
        .to_string();
        let err = error_from_response(429, Some("9"), &body);
        assert_eq!(err.category(), ErrorCategory::ResourceExhausted);
        assert_eq!(err.retry_after(), Some(Duration::from_secs(9)));
    }

    #[test]
    fn test_import_request_body() {
        let body = ImportFileRequest::new("files/abc", &ChunkingConfig::new(300, 30));
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(
            value,
            json!({
                "fileName": "files/abc",
                "chunkingConfig": {
                    "whiteSpaceConfig": {"maxTokensPerChunk": 300, "maxOverlapTokens": 30}
                }
            })
        );
    }

    #[test]
    fn test_operation_conversion() {
        let pending: OperationResource =
            serde_json::from_value(json!({"name": "fileSearchStores/s/operations/op1"})).unwrap();
        let pending = Operation::from(pending);
        assert!(!pending.done);
        assert_eq!(pending.document_name, None);

        let done: OperationResource = serde_json::from_value(json!({
            "name": "fileSearchStores/s/operations/op1",
            "done": true,
            "response": {
                "@type": "type.googleapis.com/google.ai.generativelanguage.v1main.ImportFileResponse",
                "documentName": "fileSearchStores/s/documents/d1"
            }
        }))
        .unwrap();
        let done = Operation::from(done);
        assert!(done.succeeded());
        assert_eq!(done.document_name.as_deref(), Some("fileSearchStores/s/documents/d1"));

        let failed: OperationResource = serde_json::from_value(json!({
            "name": "op2",
            "done": true,
            "error": {"code": 3, "message": "unsupported document"}
        }))
        .unwrap();
        let failed = Operation::from(failed);
        assert!(!failed.succeeded());
        assert_eq!(failed.error.unwrap().message, "unsupported document");
    }

    #[test]
    fn test_file_size_parsed_from_string() {
        let file: FileResource = serde_json::from_value(json!({
            "name": "files/abc",
            "mimeType": "application/pdf",
            "sizeBytes": "2048"
        }))
        .unwrap();
        let file = RemoteFile::from(file);
        assert_eq!(file.size_bytes, Some(2048));
    }
}
