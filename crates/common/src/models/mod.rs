//! Data model shared by ingestion and search
//!
//! None of these types are persisted by ragdesk; retaining store and file
//! identifiers across restarts is up to the caller.

mod chunking;
mod document;
mod query;
mod store;

pub use chunking::{
    ChunkingConfig, DEFAULT_MAX_TOKENS_PER_CHUNK, DEFAULT_OVERLAP_TOKENS, MAX_TOKENS_PER_CHUNK_CAP,
};
pub use document::{IndexedFile, Operation, OperationError, RemoteFile};
pub use query::QueryResult;
pub use store::StoreHandle;
