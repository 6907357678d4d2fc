//! In-memory file-search service for tests

use super::{FileSearchApi, FileUpload, GenerateContentRequest, GenerateContentResponse};
use crate::errors::{AppError, ErrorCategory, Result};
use crate::models::{ChunkingConfig, Operation, OperationError, RemoteFile, StoreHandle};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

/// Remote call kinds, for scripting failures and counting calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOp {
    CreateStore,
    GetStore,
    ListStores,
    DeleteStore,
    UploadFile,
    ImportFile,
    DeleteDocument,
    GetOperation,
    GenerateContent,
}

/// A recorded import call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedImport {
    pub store_id: String,
    pub file_name: String,
    pub chunking: ChunkingConfig,
}

#[derive(Debug)]
struct MockOperation {
    remaining_polls: u32,
    document_name: String,
    error: Option<OperationError>,
}

#[derive(Debug, Default)]
struct MockState {
    next_id: u32,
    stores: Vec<StoreHandle>,
    files: Vec<RemoteFile>,
    documents: Vec<String>,
    operations: HashMap<String, MockOperation>,
    imports: Vec<RecordedImport>,
    failures: HashMap<MockOp, VecDeque<AppError>>,
    calls: HashMap<MockOp, u32>,
    responses: VecDeque<GenerateContentResponse>,
    last_generate: Option<(String, GenerateContentRequest)>,
    import_polls: Option<u32>,
    import_error: Option<OperationError>,
    import_rejection: Option<OperationError>,
}

impl MockState {
    fn id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    /// Count the call and hand back a scripted failure, if one is queued
    fn enter(&mut self, op: MockOp) -> Result<()> {
        *self.calls.entry(op).or_default() += 1;
        match self.failures.get_mut(&op).and_then(VecDeque::pop_front) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn not_found(what: &str, name: &str) -> AppError {
    AppError::remote(ErrorCategory::NotFound, 404, format!("{} not found: {}", what, name))
}

/// Mock service for testing.
///
/// Imports finish immediately unless [`with_pending_imports`] says otherwise.
///
/// [`with_pending_imports`]: MockFileSearchApi::with_pending_imports
#[derive(Debug, Default)]
pub struct MockFileSearchApi {
    state: Mutex<MockState>,
}

impl MockFileSearchApi {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Seed an existing store
    pub fn with_store(self, resource_id: &str, display_name: &str) -> Self {
        self.state().stores.push(StoreHandle::new(resource_id, display_name));
        self
    }

    /// Imports stay pending for `polls` operation lookups before finishing
    pub fn with_pending_imports(self, polls: u32) -> Self {
        self.state().import_polls = Some(polls);
        self
    }

    /// Imports finish with an operation error
    pub fn with_failing_imports(self, code: i32, message: &str) -> Self {
        {
            let mut state = self.state();
            state.import_polls.get_or_insert(0);
            state.import_error = Some(OperationError {
                code,
                message: message.to_string(),
            });
        }
        self
    }

    /// Imports come back already finished with an operation error
    pub fn with_rejected_imports(self, code: i32, message: &str) -> Self {
        self.state().import_rejection = Some(OperationError {
            code,
            message: message.to_string(),
        });
        self
    }

    /// Queue a failure for the next call of `op`
    pub fn fail_next(&self, op: MockOp, err: AppError) {
        self.state().failures.entry(op).or_default().push_back(err);
    }

    /// Queue a generation response; without one a plain answer is returned
    pub fn push_response(&self, response: GenerateContentResponse) {
        self.state().responses.push_back(response);
    }

    pub fn calls(&self, op: MockOp) -> u32 {
        self.state().calls.get(&op).copied().unwrap_or(0)
    }

    pub fn stores(&self) -> Vec<StoreHandle> {
        self.state().stores.clone()
    }

    pub fn uploaded_files(&self) -> Vec<RemoteFile> {
        self.state().files.clone()
    }

    pub fn documents(&self) -> Vec<String> {
        self.state().documents.clone()
    }

    pub fn imports(&self) -> Vec<RecordedImport> {
        self.state().imports.clone()
    }

    /// Model and request of the latest generation call
    pub fn last_generate(&self) -> Option<(String, GenerateContentRequest)> {
        self.state().last_generate.clone()
    }
}

#[async_trait]
impl FileSearchApi for MockFileSearchApi {
    async fn create_store(&self, display_name: &str) -> Result<StoreHandle> {
        let mut state = self.state();
        state.enter(MockOp::CreateStore)?;
        let id = state.id();
        let store = StoreHandle::new(format!("fileSearchStores/mock-store-{}", id), display_name);
        state.stores.push(store.clone());
        Ok(store)
    }

    async fn get_store(&self, resource_id: &str) -> Result<StoreHandle> {
        let mut state = self.state();
        state.enter(MockOp::GetStore)?;
        let store = state
            .stores
            .iter()
            .find(|s| s.resource_id == resource_id)
            .cloned();
        store.ok_or_else(|| not_found("store", resource_id))
    }

    async fn list_stores(&self) -> Result<Vec<StoreHandle>> {
        let mut state = self.state();
        state.enter(MockOp::ListStores)?;
        Ok(state.stores.clone())
    }

    async fn delete_store(&self, resource_id: &str) -> Result<()> {
        let mut state = self.state();
        state.enter(MockOp::DeleteStore)?;
        let before = state.stores.len();
        state.stores.retain(|s| s.resource_id != resource_id);
        if state.stores.len() == before {
            return Err(not_found("store", resource_id));
        }
        let prefix = format!("{}/", resource_id);
        state.documents.retain(|d| !d.starts_with(&prefix));
        Ok(())
    }

    async fn upload_file(&self, upload: &FileUpload) -> Result<RemoteFile> {
        let mut state = self.state();
        state.enter(MockOp::UploadFile)?;
        let id = state.id();
        let file = RemoteFile {
            name: format!("files/mock-file-{}", id),
            mime_type: Some(upload.mime_type.clone()),
            size_bytes: Some(upload.bytes.len() as u64),
        };
        state.files.push(file.clone());
        Ok(file)
    }

    async fn import_file(
        &self,
        store_id: &str,
        file_name: &str,
        chunking: &ChunkingConfig,
    ) -> Result<Operation> {
        let mut state = self.state();
        state.enter(MockOp::ImportFile)?;
        if !state.stores.iter().any(|s| s.resource_id == store_id) {
            return Err(not_found("store", store_id));
        }

        state.imports.push(RecordedImport {
            store_id: store_id.to_string(),
            file_name: file_name.to_string(),
            chunking: *chunking,
        });

        let id = state.id();
        let operation_name = format!("{}/operations/mock-op-{}", store_id, id);
        let document_name = format!("{}/documents/mock-doc-{}", store_id, id);

        if let Some(rejection) = state.import_rejection.clone() {
            return Ok(Operation {
                name: operation_name,
                done: true,
                error: Some(rejection),
                document_name: None,
            });
        }

        let import_polls = state.import_polls;
        match import_polls {
            None => {
                state.documents.push(document_name.clone());
                Ok(Operation {
                    name: operation_name,
                    done: true,
                    error: None,
                    document_name: Some(document_name),
                })
            }
            Some(polls) => {
                let error = state.import_error.clone();
                state.operations.insert(
                    operation_name.clone(),
                    MockOperation {
                        remaining_polls: polls,
                        document_name,
                        error,
                    },
                );
                Ok(Operation {
                    name: operation_name,
                    done: false,
                    error: None,
                    document_name: None,
                })
            }
        }
    }

    async fn delete_document(&self, document_name: &str) -> Result<()> {
        let mut state = self.state();
        state.enter(MockOp::DeleteDocument)?;
        let before = state.documents.len();
        state.documents.retain(|d| d != document_name);
        if state.documents.len() == before {
            return Err(not_found("document", document_name));
        }
        Ok(())
    }

    async fn get_operation(&self, operation_name: &str) -> Result<Operation> {
        let mut state = self.state();
        state.enter(MockOp::GetOperation)?;

        let operation = state
            .operations
            .get_mut(operation_name)
            .ok_or_else(|| not_found("operation", operation_name))?;

        if operation.remaining_polls > 0 {
            operation.remaining_polls -= 1;
            return Ok(Operation {
                name: operation_name.to_string(),
                done: false,
                error: None,
                document_name: None,
            });
        }

        let finished = Operation {
            name: operation_name.to_string(),
            done: true,
            error: operation.error.clone(),
            document_name: operation
                .error
                .is_none()
                .then(|| operation.document_name.clone()),
        };
        if let Some(document) = finished.document_name.clone() {
            if !state.documents.contains(&document) {
                state.documents.push(document);
            }
        }
        Ok(finished)
    }

    async fn generate_content(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse> {
        let mut state = self.state();
        state.last_generate = Some((model.to_string(), request.clone()));
        state.enter(MockOp::GenerateContent)?;
        Ok(state
            .responses
            .pop_front()
            .unwrap_or_else(|| GenerateContentResponse::with_text("Mock answer.")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_store_lifecycle() {
        let api = MockFileSearchApi::new();
        let store = api.create_store("docs").await.unwrap();
        assert_eq!(api.get_store(&store.resource_id).await.unwrap(), store);
        assert_eq!(api.list_stores().await.unwrap().len(), 1);

        api.delete_store(&store.resource_id).await.unwrap();
        assert!(api.get_store(&store.resource_id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_scripted_failure_is_consumed_once() {
        let api = MockFileSearchApi::new();
        api.fail_next(
            MockOp::ListStores,
            AppError::remote(ErrorCategory::Unavailable, 503, "down"),
        );

        assert!(api.list_stores().await.is_err());
        assert!(api.list_stores().await.is_ok());
        assert_eq!(api.calls(MockOp::ListStores), 2);
    }

    #[tokio::test]
    async fn test_pending_import_finishes_after_polls() {
        let api = MockFileSearchApi::new()
            .with_store("fileSearchStores/s", "s")
            .with_pending_imports(2);

        let op = api
            .import_file("fileSearchStores/s", "files/f", &ChunkingConfig::default())
            .await
            .unwrap();
        assert!(!op.done);

        assert!(!api.get_operation(&op.name).await.unwrap().done);
        assert!(!api.get_operation(&op.name).await.unwrap().done);
        let done = api.get_operation(&op.name).await.unwrap();
        assert!(done.succeeded());
        assert_eq!(api.documents(), vec![done.document_name.unwrap()]);
    }

    #[tokio::test]
    async fn test_failing_import() {
        let api = MockFileSearchApi::new()
            .with_store("fileSearchStores/s", "s")
            .with_failing_imports(3, "bad file");

        let op = api
            .import_file("fileSearchStores/s", "files/f", &ChunkingConfig::default())
            .await
            .unwrap();
        let finished = api.get_operation(&op.name).await.unwrap();
        assert!(finished.done);
        assert!(!finished.succeeded());
        assert!(api.documents().is_empty());
    }

    #[tokio::test]
    async fn test_upload_clones_share_one_buffer() {
        let upload = FileUpload {
            display_name: "a.pdf".to_string(),
            mime_type: "application/pdf".to_string(),
            bytes: vec![7u8; 4096].into(),
        };
        let retried = upload.clone();
        assert_eq!(retried.bytes.as_ptr(), upload.bytes.as_ptr());

        let api = MockFileSearchApi::new();
        let file = api.upload_file(&retried).await.unwrap();
        assert_eq!(file.size_bytes, Some(4096));
    }

    #[tokio::test]
    async fn test_rejected_import_is_finished() {
        let api = MockFileSearchApi::new()
            .with_store("fileSearchStores/s", "s")
            .with_rejected_imports(3, "bad file");

        let op = api
            .import_file("fileSearchStores/s", "files/f", &ChunkingConfig::default())
            .await
            .unwrap();
        assert!(op.done);
        assert_eq!(op.error.unwrap().code, 3);
        assert!(api.documents().is_empty());
    }
}
