//! Chunking configuration sent with every import

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Largest chunk size the service accepts
pub const MAX_TOKENS_PER_CHUNK_CAP: u32 = 2043;
pub const DEFAULT_MAX_TOKENS_PER_CHUNK: u32 = 200;
pub const DEFAULT_OVERLAP_TOKENS: u32 = 20;

/// How the service splits an imported document into retrievable segments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Maximum tokens per chunk, never above [`MAX_TOKENS_PER_CHUNK_CAP`]
    pub max_tokens_per_chunk: u32,
    /// Tokens shared between consecutive chunks
    pub overlap_tokens: u32,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_tokens_per_chunk: DEFAULT_MAX_TOKENS_PER_CHUNK,
            overlap_tokens: DEFAULT_OVERLAP_TOKENS,
        }
    }
}

impl ChunkingConfig {
    /// Build a config, clamping the chunk size to the service cap
    pub fn new(max_tokens_per_chunk: u32, overlap_tokens: u32) -> Self {
        Self {
            max_tokens_per_chunk,
            overlap_tokens,
        }
        .clamped()
    }

    /// Values above the cap are clamped, never rejected
    pub fn clamped(self) -> Self {
        if self.max_tokens_per_chunk > MAX_TOKENS_PER_CHUNK_CAP {
            warn!(
                requested = self.max_tokens_per_chunk,
                cap = MAX_TOKENS_PER_CHUNK_CAP,
                "max_tokens_per_chunk exceeds the cap, clamping"
            );
            return Self {
                max_tokens_per_chunk: MAX_TOKENS_PER_CHUNK_CAP,
                ..self
            };
        }
        self
    }
}
