//! Ingestion processor
//!
//! Core upload logic: validate locally, upload the bytes, and import the
//! upload into the bound store. Remote steps go through the shared retry
//! policy; validation failures never reach it.

use crate::validator;
use chrono::Utc;
use ragdesk_common::client::{FileSearchApi, FileUpload};
use ragdesk_common::errors::{AppError, ErrorCategory, Result};
use ragdesk_common::metrics;
use ragdesk_common::models::{ChunkingConfig, IndexedFile, StoreHandle};
use ragdesk_common::retry::RetryPolicy;
use ragdesk_common::taxonomy;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

/// One file that could not be ingested
#[derive(Debug, Clone, Serialize)]
pub struct FailedUpload {
    pub path: PathBuf,
    pub error: String,
    pub category: ErrorCategory,
    /// User-facing description of the failure
    pub message: String,
    /// What to do about it, with a suggested wait when the service gave one
    pub remediation: String,
}

/// Per-item results of a batch upload
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchOutcome {
    pub succeeded: Vec<IndexedFile>,
    pub failed: Vec<FailedUpload>,
    pub total: usize,
}

impl BatchOutcome {
    pub fn success_count(&self) -> usize {
        self.succeeded.len()
    }

    pub fn failure_count(&self) -> usize {
        self.failed.len()
    }

    pub fn is_complete_success(&self) -> bool {
        self.failed.is_empty() && self.succeeded.len() == self.total
    }
}

/// Uploads files into one store with one chunking configuration
pub struct DocumentIngestor {
    api: Arc<dyn FileSearchApi>,
    store: StoreHandle,
    chunking: ChunkingConfig,
    retry: RetryPolicy,
}

impl DocumentIngestor {
    /// Bind an ingestor to a store.
    ///
    /// The chunking configuration is clamped to the service cap.
    pub fn new(
        api: Arc<dyn FileSearchApi>,
        store: StoreHandle,
        chunking: ChunkingConfig,
        retry: RetryPolicy,
    ) -> Result<Self> {
        if store.resource_id.trim().is_empty() {
            return Err(AppError::Validation {
                message: "store resource id must not be empty".to_string(),
            });
        }

        Ok(Self {
            api,
            store,
            chunking: chunking.clamped(),
            retry,
        })
    }

    pub fn store(&self) -> &StoreHandle {
        &self.store
    }

    /// Effective chunking configuration sent with every import
    pub fn chunking(&self) -> ChunkingConfig {
        self.chunking
    }

    /// Validate, upload, and import a single file
    #[instrument(skip(self), fields(path = %path.display(), store = %self.store.resource_id))]
    pub async fn upload_one(&self, path: &Path, display_name: Option<&str>) -> Result<IndexedFile> {
        let result = self.ingest(path, display_name).await;
        match &result {
            Ok(file) => metrics::record_ingestion(true, file.size_bytes),
            Err(_) => metrics::record_ingestion(false, 0),
        }
        result
    }

    async fn ingest(&self, path: &Path, display_name: Option<&str>) -> Result<IndexedFile> {
        let validation = validator::validate(path)?;
        let display_name = display_name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(&validation.name)
            .to_string();

        info!(file = %validation.name, "Uploading file");

        let upload = FileUpload {
            display_name: display_name.clone(),
            mime_type: validation.mime_type.clone(),
            bytes: tokio::fs::read(path).await?.into(),
        };

        let remote = self
            .retry
            .execute("upload_file", || self.api.upload_file(&upload))
            .await?;
        debug!(remote_file = %remote.name, "Raw file uploaded");

        let operation = self
            .retry
            .execute("import_file", || {
                self.api
                    .import_file(&self.store.resource_id, &remote.name, &self.chunking)
            })
            .await?;

        if let Some(op_error) = operation.error {
            return Err(AppError::Indexing {
                file: remote.name,
                code: op_error.code,
                message: op_error.message,
            });
        }

        let remote_corpus_id = operation
            .document_name
            .clone()
            .unwrap_or_else(|| operation.name.clone());

        info!(
            file = %validation.name,
            remote_file = %remote.name,
            corpus = %remote_corpus_id,
            indexed = operation.done,
            "File uploaded"
        );

        Ok(IndexedFile {
            local_name: validation.name,
            display_name,
            size_bytes: remote.size_bytes.unwrap_or(validation.size),
            mime_type: validation.mime_type,
            remote_file_id: remote.name,
            remote_corpus_id,
            operation_id: Some(operation.name),
            uploaded_at: Utc::now(),
        })
    }

    /// Upload files one after another; a failure never stops the batch
    #[instrument(skip(self, paths), fields(count = paths.len()))]
    pub async fn upload_batch(&self, paths: &[PathBuf]) -> BatchOutcome {
        info!(store = %self.store.resource_id, "Starting batch upload");

        let mut outcome = BatchOutcome {
            total: paths.len(),
            ..BatchOutcome::default()
        };

        for path in paths {
            match self.upload_one(path, None).await {
                Ok(file) => outcome.succeeded.push(file),
                Err(e) => {
                    let info = taxonomy::handle(&e, "upload_batch");
                    warn!(path = %path.display(), category = ?info.category, "File upload failed");
                    outcome.failed.push(FailedUpload {
                        path: path.clone(),
                        error: e.to_string(),
                        category: info.category,
                        message: info.message,
                        remediation: info.remediation,
                    });
                }
            }
        }

        info!(
            succeeded = outcome.success_count(),
            failed = outcome.failure_count(),
            total = outcome.total,
            "Batch upload finished"
        );
        outcome
    }

    /// Poll an import operation until it finishes.
    ///
    /// `true` only when the service reports done without error. Timeout, a
    /// missing operation, a reported error, or a failed lookup all give
    /// `false`, which means the indexing state is unknown.
    #[instrument(skip(self))]
    pub async fn wait_for_remote_indexing(
        &self,
        operation_id: &str,
        timeout: Duration,
        poll_interval: Duration,
    ) -> bool {
        info!("Waiting for indexing");
        let started = Instant::now();
        // An unrepresentable deadline means no deadline
        let deadline = started.checked_add(timeout);

        while deadline.map_or(true, |d| Instant::now() < d) {
            match self.api.get_operation(operation_id).await {
                Ok(op) if op.done => {
                    if let Some(op_error) = op.error {
                        error!(code = op_error.code, message = %op_error.message, "Indexing failed");
                        return false;
                    }
                    info!("Indexing finished");
                    return true;
                }
                Ok(_) => {
                    debug!(elapsed_ms = started.elapsed().as_millis() as u64, "Indexing in progress");
                    tokio::time::sleep(poll_interval).await;
                }
                Err(e) if e.is_not_found() => {
                    warn!("Operation not found");
                    return false;
                }
                Err(e) => {
                    error!(error = %e, "Operation lookup failed");
                    return false;
                }
            }
        }

        warn!(timeout_secs = timeout.as_secs_f64(), "Timed out waiting for indexing");
        false
    }
}
