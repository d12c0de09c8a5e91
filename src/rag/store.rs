//! RagStore trait: the storage seam behind the vector index.
//!
//! The shipped implementation is `SqliteRagStore` in the `sqlite` module.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::chunker::Chunk;
use crate::core::errors::ApiError;

/// A chunk owned by the store, with its identifier and embedding.
#[derive(Debug, Clone)]
pub struct IndexedChunk {
    /// UUID v4 assigned at write time.
    pub chunk_id: String,
    pub chunk: Chunk,
    pub embedding: Vec<f32>,
}

/// Result of a similarity search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkSearchResult {
    pub chunk_id: String,
    pub chunk: Chunk,
    /// Cosine similarity (higher = better).
    pub score: f32,
}

/// The embedding space an index was built in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexManifest {
    pub embedding_model: String,
    pub dimension: usize,
}

#[async_trait]
pub trait RagStore: Send + Sync {
    /// Insert chunks and record the manifest they were embedded under, in one
    /// transaction: either all become searchable or nothing changes.
    async fn insert_batch(
        &self,
        items: Vec<IndexedChunk>,
        manifest: &IndexManifest,
    ) -> Result<(), ApiError>;

    /// Top `limit` chunks by cosine similarity, best first. Equal scores keep
    /// insertion order.
    async fn search(
        &self,
        query_embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<ChunkSearchResult>, ApiError>;

    async fn count(&self) -> Result<usize, ApiError>;

    /// Remove every chunk and forget the manifest. Returns the number of
    /// chunks removed.
    async fn clear(&self) -> Result<usize, ApiError>;

    async fn manifest(&self) -> Result<Option<IndexManifest>, ApiError>;
}
