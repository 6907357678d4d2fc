//! Store lifecycle
//!
//! Every operation here is best-effort: failures are logged through the error
//! taxonomy and reported as `None`, an empty list, or `false`. Nothing is
//! retried; a name conflict or a missing store is the caller's decision.

use ragdesk_common::client::FileSearchApi;
use ragdesk_common::models::StoreHandle;
use ragdesk_common::taxonomy;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Create, look up, and delete stores and indexed documents
pub struct StoreManager {
    api: Arc<dyn FileSearchApi>,
}

impl StoreManager {
    pub fn new(api: Arc<dyn FileSearchApi>) -> Self {
        Self { api }
    }

    /// Create a store. `None` on a name conflict or any remote failure.
    #[instrument(skip(self))]
    pub async fn create_store(&self, display_name: &str) -> Option<StoreHandle> {
        match self.api.create_store(display_name).await {
            Ok(store) => {
                info!(store = %store.resource_id, display_name, "Store created");
                Some(store)
            }
            Err(e) => {
                taxonomy::handle(&e, "create_store");
                None
            }
        }
    }

    /// Fetch a store by resource id. `None` when missing or on failure.
    #[instrument(skip(self))]
    pub async fn get_store(&self, resource_id: &str) -> Option<StoreHandle> {
        match self.api.get_store(resource_id).await {
            Ok(store) => Some(store),
            Err(e) if e.is_not_found() => {
                warn!(store = %resource_id, "Store not found");
                None
            }
            Err(e) => {
                taxonomy::handle(&e, "get_store");
                None
            }
        }
    }

    /// Every visible store in service order; empty on failure
    #[instrument(skip(self))]
    pub async fn list_stores(&self) -> Vec<StoreHandle> {
        match self.api.list_stores().await {
            Ok(stores) => {
                debug!(count = stores.len(), "Stores listed");
                stores
            }
            Err(e) => {
                taxonomy::handle(&e, "list_stores");
                Vec::new()
            }
        }
    }

    /// `true` only when the service confirmed the deletion
    #[instrument(skip(self))]
    pub async fn delete_store(&self, resource_id: &str) -> bool {
        match self.api.delete_store(resource_id).await {
            Ok(()) => {
                info!(store = %resource_id, "Store deleted");
                true
            }
            Err(e) if e.is_not_found() => {
                warn!(store = %resource_id, "Store not found");
                false
            }
            Err(e) => {
                taxonomy::handle(&e, "delete_store");
                false
            }
        }
    }

    /// Remove one indexed document from its store.
    ///
    /// A document that no longer exists counts as already deleted and yields
    /// `false` without an error. An import operation name is resolved to its
    /// document first.
    #[instrument(skip(self))]
    pub async fn delete_indexed_file(&self, remote_corpus_id: &str) -> bool {
        let Some(document) = self.resolve_document(remote_corpus_id).await else {
            return false;
        };

        match self.api.delete_document(&document).await {
            Ok(()) => {
                info!(document = %document, "Indexed file deleted");
                true
            }
            Err(e) if e.is_not_found() => {
                info!(document = %document, "Indexed file already deleted");
                false
            }
            Err(e) => {
                taxonomy::handle(&e, "delete_indexed_file");
                false
            }
        }
    }

    async fn resolve_document(&self, remote_corpus_id: &str) -> Option<String> {
        if !remote_corpus_id.contains("/operations/") {
            return Some(remote_corpus_id.to_string());
        }

        match self.api.get_operation(remote_corpus_id).await {
            Ok(op) => match op.document_name {
                Some(document) if op.succeeded() => Some(document),
                _ => {
                    warn!(
                        operation = %remote_corpus_id,
                        done = op.done,
                        "Import has not produced a document"
                    );
                    None
                }
            },
            Err(e) if e.is_not_found() => {
                info!(operation = %remote_corpus_id, "Import operation no longer exists");
                None
            }
            Err(e) => {
                taxonomy::handle(&e, "delete_indexed_file");
                None
            }
        }
    }

    /// First store whose display name matches exactly
    pub async fn find_by_display_name(&self, display_name: &str) -> Option<StoreHandle> {
        self.list_stores()
            .await
            .into_iter()
            .find(|s| s.display_name == display_name)
    }

    /// Reuse the store with this display name, creating it if none exists
    #[instrument(skip(self))]
    pub async fn get_or_create_store(&self, display_name: &str) -> Option<StoreHandle> {
        if let Some(store) = self.find_by_display_name(display_name).await {
            debug!(store = %store.resource_id, "Reusing existing store");
            return Some(store);
        }
        self.create_store(display_name).await
    }
}
