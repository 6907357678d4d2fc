//! ragdesk ingestion
//!
//! Gets local documents into a remote file-search store:
//! 1. Validates the file locally (size and type)
//! 2. Uploads the raw bytes with retry on transient failures
//! 3. Imports the upload into a store with the configured chunking
//!
//! Store lifecycle helpers live in [`stores`].

pub mod processor;
pub mod stores;
pub mod validator;

pub use processor::{BatchOutcome, DocumentIngestor, FailedUpload};
pub use stores::StoreManager;
pub use validator::{validate, FileValidation};
