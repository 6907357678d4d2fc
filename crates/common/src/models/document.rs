//! Uploaded files, indexed documents, and long-running operations

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Raw file stored in the service's object storage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFile {
    /// Resource name, e.g. `files/abc123`
    pub name: String,
    pub mime_type: Option<String>,
    pub size_bytes: Option<u64>,
}

/// Error reported by a finished operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationError {
    pub code: i32,
    pub message: String,
}

/// Asynchronous completion handle returned by an import
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub name: String,
    pub done: bool,
    pub error: Option<OperationError>,
    /// Indexed document created by the import, once known
    pub document_name: Option<String>,
}

impl Operation {
    /// Finished and no error reported
    pub fn succeeded(&self) -> bool {
        self.done && self.error.is_none()
    }
}

/// A local file that was uploaded and registered with a store.
///
/// `remote_corpus_id` is the only handle that can later delete the indexed
/// document; the caller has to keep it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedFile {
    /// File name on local disk
    pub local_name: String,
    /// Name shown by the service
    pub display_name: String,
    pub size_bytes: u64,
    pub mime_type: String,
    /// Object-storage resource name (`files/...`)
    pub remote_file_id: String,
    /// Indexed document name, or the import operation name while indexing runs
    pub remote_corpus_id: String,
    /// Import operation, for [`Operation`] polling
    pub operation_id: Option<String>,
    pub uploaded_at: DateTime<Utc>,
}
