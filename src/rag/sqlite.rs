//! SQLite-backed RAG store implementation.
//!
//! In-process vector store using SQLite for chunks and metadata and
//! brute-force cosine similarity for search.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};

use super::chunker::Chunk;
use super::store::{ChunkSearchResult, IndexManifest, IndexedChunk, RagStore};
use crate::core::errors::ApiError;

pub const INDEX_FILE_NAME: &str = "rag.db";

pub struct SqliteRagStore {
    pool: SqlitePool,
    db_path: PathBuf,
}

impl SqliteRagStore {
    /// Opens the index in `dir`, creating the directory and database if needed.
    pub async fn open_or_create(dir: &Path) -> Result<Self, ApiError> {
        std::fs::create_dir_all(dir)?;
        Self::connect(dir.join(INDEX_FILE_NAME), true).await
    }

    /// Opens a previously persisted index. Fails with `IndexNotFound` when
    /// nothing was ever written to `dir`.
    pub async fn open_existing(dir: &Path) -> Result<Self, ApiError> {
        let db_path = dir.join(INDEX_FILE_NAME);
        if !db_path.is_file() {
            return Err(ApiError::IndexNotFound(format!(
                "no index at {}",
                dir.display()
            )));
        }
        Self::connect(db_path, false).await
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    async fn connect(db_path: PathBuf, create: bool) -> Result<Self, ApiError> {
        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(create)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(ApiError::internal)?;

        let store = Self { pool, db_path };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), ApiError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS rag_chunks (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                chunk_id TEXT NOT NULL UNIQUE,
                content TEXT NOT NULL,
                source TEXT NOT NULL DEFAULT '',
                page INTEGER,
                total_pages INTEGER,
                sequence_index INTEGER NOT NULL DEFAULT 0,
                embedding BLOB NOT NULL,
                created_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS rag_meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        Ok(())
    }

    fn serialize_embedding(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    fn deserialize_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect()
    }

    fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
        if a.len() != b.len() || a.is_empty() {
            return 0.0;
        }

        let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        let denom = norm_a * norm_b;

        if denom <= f32::EPSILON {
            0.0
        } else {
            dot / denom
        }
    }

    fn row_to_chunk(row: &sqlx::sqlite::SqliteRow) -> Chunk {
        let page: Option<i64> = row.get("page");
        let total_pages: Option<i64> = row.get("total_pages");
        let sequence_index: i64 = row.get("sequence_index");

        Chunk {
            text: row.get("content"),
            source: row.get("source"),
            page: page.map(|p| p as usize),
            total_pages: total_pages.map(|p| p as usize),
            sequence_index: sequence_index as usize,
        }
    }
}

#[async_trait]
impl RagStore for SqliteRagStore {
    async fn insert_batch(
        &self,
        items: Vec<IndexedChunk>,
        manifest: &IndexManifest,
    ) -> Result<(), ApiError> {
        if items.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await.map_err(ApiError::internal)?;

        for item in &items {
            let blob = Self::serialize_embedding(&item.embedding);

            sqlx::query(
                "INSERT INTO rag_chunks (chunk_id, content, source, page, total_pages, sequence_index, embedding)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )
            .bind(&item.chunk_id)
            .bind(&item.chunk.text)
            .bind(&item.chunk.source)
            .bind(item.chunk.page.map(|p| p as i64))
            .bind(item.chunk.total_pages.map(|p| p as i64))
            .bind(item.chunk.sequence_index as i64)
            .bind(&blob)
            .execute(&mut *tx)
            .await
            .map_err(ApiError::internal)?;
        }

        for (key, value) in [
            ("embedding_model", manifest.embedding_model.clone()),
            ("embedding_dim", manifest.dimension.to_string()),
        ] {
            sqlx::query(
                "INSERT OR REPLACE INTO rag_meta (key, value, updated_at)
                 VALUES (?1, ?2, STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))",
            )
            .bind(key)
            .bind(value)
            .execute(&mut *tx)
            .await
            .map_err(ApiError::internal)?;
        }

        tx.commit().await.map_err(ApiError::internal)?;
        Ok(())
    }

    async fn search(
        &self,
        query_embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<ChunkSearchResult>, ApiError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            "SELECT chunk_id, content, source, page, total_pages, sequence_index, embedding
             FROM rag_chunks
             ORDER BY seq",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        let mut scored: Vec<ChunkSearchResult> = rows
            .iter()
            .map(|row| {
                let embedding_bytes: Vec<u8> = row.get("embedding");
                let stored_emb = Self::deserialize_embedding(&embedding_bytes);

                ChunkSearchResult {
                    chunk_id: row.get("chunk_id"),
                    chunk: Self::row_to_chunk(row),
                    score: Self::cosine_similarity(query_embedding, &stored_emb),
                }
            })
            .collect();

        // Stable sort: rows arrive in insertion order, so ties keep it.
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(limit);

        Ok(scored)
    }

    async fn count(&self) -> Result<usize, ApiError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM rag_chunks")
            .fetch_one(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        Ok(count as usize)
    }

    async fn clear(&self) -> Result<usize, ApiError> {
        let mut tx = self.pool.begin().await.map_err(ApiError::internal)?;

        let result = sqlx::query("DELETE FROM rag_chunks")
            .execute(&mut *tx)
            .await
            .map_err(ApiError::internal)?;

        sqlx::query("DELETE FROM rag_meta")
            .execute(&mut *tx)
            .await
            .map_err(ApiError::internal)?;

        tx.commit().await.map_err(ApiError::internal)?;
        Ok(result.rows_affected() as usize)
    }

    async fn manifest(&self) -> Result<Option<IndexManifest>, ApiError> {
        let rows = sqlx::query(
            "SELECT key, value FROM rag_meta WHERE key IN ('embedding_model', 'embedding_dim')",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        let mut model = None;
        let mut dimension = None;
        for row in &rows {
            let key: String = row.get("key");
            let value: String = row.get("value");
            match key.as_str() {
                "embedding_model" => model = Some(value),
                "embedding_dim" => dimension = value.parse::<usize>().ok(),
                _ => {}
            }
        }

        Ok(match (model, dimension) {
            (Some(embedding_model), Some(dimension)) => Some(IndexManifest {
                embedding_model,
                dimension,
            }),
            _ => None,
        })
    }
}
