//! Remote file-search service abstraction
//!
//! Provides one interface over the hosted service:
//! - Store management (create, get, list, delete)
//! - Raw file upload and import into a store
//! - Indexed document deletion and operation polling
//! - Grounded content generation
//!
//! [`GeminiClient`] talks to the real service; [`MockFileSearchApi`] is an
//! in-memory double for tests.

mod http;
mod mock;
pub mod wire;

pub use http::GeminiClient;
pub use mock::{MockFileSearchApi, MockOp, RecordedImport};
pub use wire::{GenerateContentRequest, GenerateContentResponse};

use crate::errors::Result;
use crate::models::{ChunkingConfig, Operation, RemoteFile, StoreHandle};
use async_trait::async_trait;
use bytes::Bytes;

/// File contents handed to [`FileSearchApi::upload_file`]
///
/// `bytes` is reference-counted, so retried uploads share one buffer.
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub display_name: String,
    pub mime_type: String,
    pub bytes: Bytes,
}

/// Calls the hosted file-search service understands.
///
/// Every method is a single remote call. Retrying is the caller's business.
#[async_trait]
pub trait FileSearchApi: Send + Sync {
    /// Create a store; the service assigns the resource id
    async fn create_store(&self, display_name: &str) -> Result<StoreHandle>;

    async fn get_store(&self, resource_id: &str) -> Result<StoreHandle>;

    /// All stores visible to the credential, every page
    async fn list_stores(&self) -> Result<Vec<StoreHandle>>;

    /// Delete a store together with its documents
    async fn delete_store(&self, resource_id: &str) -> Result<()>;

    /// Put raw bytes into object storage
    async fn upload_file(&self, upload: &FileUpload) -> Result<RemoteFile>;

    /// Register an uploaded file with a store; indexing may still be running
    async fn import_file(
        &self,
        store_id: &str,
        file_name: &str,
        chunking: &ChunkingConfig,
    ) -> Result<Operation>;

    /// Remove an indexed document (and its chunks) from a store
    async fn delete_document(&self, document_name: &str) -> Result<()>;

    async fn get_operation(&self, operation_name: &str) -> Result<Operation>;

    async fn generate_content(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse>;

    /// Cheapest call that proves the credential works
    async fn verify_connection(&self) -> bool {
        match self.list_stores().await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(error = %e, "Connection check failed");
                false
            }
        }
    }
}
