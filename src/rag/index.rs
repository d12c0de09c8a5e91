//! Vector index adapter: pairs a `RagStore` with the embedding capability.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::chunker::Chunk;
use super::sqlite::SqliteRagStore;
use super::store::{ChunkSearchResult, IndexManifest, IndexedChunk, RagStore};
use crate::core::errors::ApiError;
use crate::llm::LlmProvider;

/// Embedding capability bound to one model.
#[derive(Clone)]
pub struct Embedder {
    provider: Arc<dyn LlmProvider>,
    model_id: String,
    batch_size: usize,
}

impl Embedder {
    pub fn new(provider: Arc<dyn LlmProvider>, model_id: impl Into<String>, batch_size: usize) -> Self {
        Self {
            provider,
            model_id: model_id.into(),
            batch_size: batch_size.max(1),
        }
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// Embeds `texts` in batches. Every returned vector has the same,
    /// non-zero dimension and only finite components.
    pub async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ApiError> {
        let mut vectors = Vec::with_capacity(texts.len());

        for batch in texts.chunks(self.batch_size) {
            let embedded = self.provider.embed(batch, &self.model_id).await?;
            if embedded.len() != batch.len() {
                return Err(ApiError::EmbeddingService(format!(
                    "expected {} embeddings from {}, got {}",
                    batch.len(),
                    self.model_id,
                    embedded.len()
                )));
            }
            vectors.extend(embedded);
        }

        validate_vectors(&vectors)?;
        Ok(vectors)
    }

    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>, ApiError> {
        let mut vectors = self.embed_texts(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| ApiError::EmbeddingService("no embedding returned for query".to_string()))
    }
}

fn validate_vectors(vectors: &[Vec<f32>]) -> Result<(), ApiError> {
    let Some(first) = vectors.first() else {
        return Ok(());
    };
    let dimension = first.len();
    if dimension == 0 {
        return Err(ApiError::EmbeddingService(
            "embedding service returned an empty vector".to_string(),
        ));
    }

    for (i, vector) in vectors.iter().enumerate() {
        if vector.len() != dimension {
            return Err(ApiError::EmbeddingService(format!(
                "embedding {} has dimension {}, expected {}",
                i,
                vector.len(),
                dimension
            )));
        }
        if vector.iter().any(|v| !v.is_finite()) {
            return Err(ApiError::EmbeddingService(format!(
                "embedding {} contains non-finite values",
                i
            )));
        }
    }
    Ok(())
}

/// Searchable, persisted collection of embedded chunks.
pub struct VectorIndex {
    store: Arc<dyn RagStore>,
    embedder: Embedder,
}

impl VectorIndex {
    pub fn new(store: Arc<dyn RagStore>, embedder: Embedder) -> Self {
        Self { store, embedder }
    }

    /// Creates the index at `location`, or appends to the one already there.
    pub async fn open_or_create(location: &Path, embedder: Embedder) -> Result<Self, ApiError> {
        let store = SqliteRagStore::open_or_create(location).await?;
        Ok(Self::new(Arc::new(store), embedder))
    }

    /// Reopens a persisted index without re-embedding anything.
    pub async fn load(location: &Path, embedder: Embedder) -> Result<Self, ApiError> {
        let store = SqliteRagStore::open_existing(location).await?;
        Ok(Self::new(Arc::new(store), embedder))
    }

    /// Embeds and stores `chunks` in one transaction. Returns how many were written.
    pub async fn write(&self, chunks: &[Chunk]) -> Result<usize, ApiError> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.embedder.embed_texts(&texts).await?;
        let dimension = embeddings.first().map(|v| v.len()).unwrap_or(0);

        let current = IndexManifest {
            embedding_model: self.embedder.model_id().to_string(),
            dimension,
        };
        if let Some(existing) = self.store.manifest().await? {
            check_manifest(&existing, &current)?;
        }

        let items: Vec<IndexedChunk> = chunks
            .iter()
            .cloned()
            .zip(embeddings)
            .map(|(chunk, embedding)| IndexedChunk {
                chunk_id: uuid::Uuid::new_v4().to_string(),
                chunk,
                embedding,
            })
            .collect();

        let written = items.len();
        self.store.insert_batch(items, &current).await?;

        tracing::debug!(
            "Indexed {} chunk(s) with {} (dim {})",
            written,
            current.embedding_model,
            dimension
        );
        Ok(written)
    }

    /// The `k` stored chunks most similar to `query_text`.
    pub async fn search(&self, query_text: &str, k: usize) -> Result<Vec<ChunkSearchResult>, ApiError> {
        if k == 0 || self.store.count().await? == 0 {
            return Ok(Vec::new());
        }

        let query_embedding = self.embedder.embed_query(query_text).await?;

        if let Some(existing) = self.store.manifest().await? {
            let current = IndexManifest {
                embedding_model: self.embedder.model_id().to_string(),
                dimension: query_embedding.len(),
            };
            check_manifest(&existing, &current)?;
        }

        self.store.search(&query_embedding, k).await
    }

    pub async fn count(&self) -> Result<usize, ApiError> {
        self.store.count().await
    }

    pub async fn clear(&self) -> Result<usize, ApiError> {
        self.store.clear().await
    }

    pub async fn manifest(&self) -> Result<Option<IndexManifest>, ApiError> {
        self.store.manifest().await
    }
}

fn check_manifest(existing: &IndexManifest, current: &IndexManifest) -> Result<(), ApiError> {
    if existing.embedding_model != current.embedding_model {
        return Err(ApiError::BadRequest(format!(
            "index was built with embedding model '{}' but '{}' is configured; clear the index to rebuild it",
            existing.embedding_model, current.embedding_model
        )));
    }
    if existing.dimension != current.dimension {
        return Err(ApiError::BadRequest(format!(
            "index holds {}-dimensional embeddings but the embedding service returned {}; clear the index to rebuild it",
            existing.dimension, current.dimension
        )));
    }
    Ok(())
}

/// Where the persisted index lives, plus the embedder used to read and write it.
#[derive(Clone)]
pub struct IndexLocation {
    dir: PathBuf,
    embedder: Embedder,
}

impl IndexLocation {
    pub fn new(dir: PathBuf, embedder: Embedder) -> Self {
        Self { dir, embedder }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn open_or_create(&self) -> Result<VectorIndex, ApiError> {
        VectorIndex::open_or_create(&self.dir, self.embedder.clone()).await
    }

    pub async fn load(&self) -> Result<VectorIndex, ApiError> {
        VectorIndex::load(&self.dir, self.embedder.clone()).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::llm::ChatRequest;

    /// Two-dimensional embedding: (mentions "sky", mentions "water").
    struct KeywordEmbedder {
        calls: AtomicUsize,
        batches: Mutex<Vec<usize>>,
        dimension: usize,
    }

    impl KeywordEmbedder {
        fn new(dimension: usize) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                batches: Mutex::new(Vec::new()),
                dimension,
            }
        }
    }

    #[async_trait]
    impl LlmProvider for KeywordEmbedder {
        fn name(&self) -> &str {
            "keyword"
        }

        async fn health_check(&self) -> Result<bool, ApiError> {
            Ok(true)
        }

        async fn chat(&self, _request: ChatRequest, _model_id: &str) -> Result<String, ApiError> {
            Err(ApiError::Generation("not a chat model".to_string()))
        }

        async fn embed(&self, inputs: &[String], _model_id: &str) -> Result<Vec<Vec<f32>>, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.batches.lock().unwrap().push(inputs.len());
            Ok(inputs
                .iter()
                .map(|text| {
                    let lower = text.to_lowercase();
                    let mut v = vec![0.1; self.dimension];
                    if lower.contains("sky") {
                        v[0] += 1.0;
                    }
                    if lower.contains("water") {
                        v[1] += 1.0;
                    }
                    v
                })
                .collect())
        }
    }

    struct BrokenEmbedder(Vec<Vec<f32>>);

    #[async_trait]
    impl LlmProvider for BrokenEmbedder {
        fn name(&self) -> &str {
            "broken"
        }

        async fn health_check(&self) -> Result<bool, ApiError> {
            Ok(false)
        }

        async fn chat(&self, _request: ChatRequest, _model_id: &str) -> Result<String, ApiError> {
            Err(ApiError::Generation("unused".to_string()))
        }

        async fn embed(&self, _inputs: &[String], _model_id: &str) -> Result<Vec<Vec<f32>>, ApiError> {
            Ok(self.0.clone())
        }
    }

    fn chunk(text: &str, sequence_index: usize) -> Chunk {
        Chunk {
            text: text.to_string(),
            source: "notes.txt".to_string(),
            page: None,
            total_pages: None,
            sequence_index,
        }
    }

    #[tokio::test]
    async fn write_then_search_ranks_by_similarity() {
        let tmp = tempfile::tempdir().unwrap();
        let provider = Arc::new(KeywordEmbedder::new(2));
        let embedder = Embedder::new(provider.clone(), "kw", 2);
        let index = VectorIndex::open_or_create(tmp.path(), embedder).await.unwrap();

        let written = index
            .write(&[
                chunk("Water is wet.", 0),
                chunk("The sky is blue.", 1),
                chunk("Grass grows.", 2),
            ])
            .await
            .unwrap();
        assert_eq!(written, 3);
        assert_eq!(*provider.batches.lock().unwrap(), vec![2, 1]);

        let results = index.search("What color is the sky?", 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk.text, "The sky is blue.");
        assert!(results[0].score > results[1].score);
    }

    #[tokio::test]
    async fn empty_writes_and_searches_do_not_embed() {
        let tmp = tempfile::tempdir().unwrap();
        let provider = Arc::new(KeywordEmbedder::new(2));
        let index = VectorIndex::open_or_create(tmp.path(), Embedder::new(provider.clone(), "kw", 8))
            .await
            .unwrap();

        assert_eq!(index.write(&[]).await.unwrap(), 0);
        assert!(index.search("anything", 4).await.unwrap().is_empty());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);

        index.write(&[chunk("sky", 0)]).await.unwrap();
        assert!(index.search("sky", 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn load_reopens_without_reembedding() {
        let tmp = tempfile::tempdir().unwrap();
        let location = tmp.path().join("index");
        let provider = Arc::new(KeywordEmbedder::new(2));

        let err = VectorIndex::load(&location, Embedder::new(provider.clone(), "kw", 8))
            .await
            .err()
            .unwrap();
        assert_eq!(err.kind(), "index_not_found");

        VectorIndex::open_or_create(&location, Embedder::new(provider.clone(), "kw", 8))
            .await
            .unwrap()
            .write(&[chunk("The sky is blue.", 0)])
            .await
            .unwrap();
        let calls_after_write = provider.calls.load(Ordering::SeqCst);

        let reloaded = VectorIndex::load(&location, Embedder::new(provider.clone(), "kw", 8))
            .await
            .unwrap();
        assert_eq!(reloaded.count().await.unwrap(), 1);
        assert_eq!(provider.calls.load(Ordering::SeqCst), calls_after_write);
    }

    #[tokio::test]
    async fn switching_embedding_model_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let provider = Arc::new(KeywordEmbedder::new(2));

        VectorIndex::open_or_create(tmp.path(), Embedder::new(provider.clone(), "model-a", 8))
            .await
            .unwrap()
            .write(&[chunk("sky", 0)])
            .await
            .unwrap();

        let other = VectorIndex::open_or_create(tmp.path(), Embedder::new(provider.clone(), "model-b", 8))
            .await
            .unwrap();
        let err = other.write(&[chunk("water", 1)]).await.unwrap_err();
        assert_eq!(err.kind(), "bad_request");
        assert!(err.to_string().contains("model-a"));
        assert_eq!(other.search("sky", 1).await.unwrap_err().kind(), "bad_request");

        other.clear().await.unwrap();
        other.write(&[chunk("water", 1)]).await.unwrap();
        assert_eq!(
            other.manifest().await.unwrap().unwrap().embedding_model,
            "model-b"
        );
    }

    #[tokio::test]
    async fn malformed_embeddings_are_embedding_service_errors() {
        let cases = vec![
            vec![vec![1.0]],
            vec![vec![], vec![]],
            vec![vec![1.0, 2.0], vec![1.0]],
            vec![vec![1.0, f32::NAN], vec![1.0, 1.0]],
        ];

        for vectors in cases {
            let tmp = tempfile::tempdir().unwrap();
            let embedder = Embedder::new(Arc::new(BrokenEmbedder(vectors)), "broken", 8);
            let index = VectorIndex::open_or_create(tmp.path(), embedder).await.unwrap();

            let err = index.write(&[chunk("a", 0), chunk("b", 1)]).await.unwrap_err();
            assert_eq!(err.kind(), "embedding_service_error");
            assert_eq!(index.count().await.unwrap(), 0);
        }
    }
}
