//! RAG (Retrieval-Augmented Generation) pipeline.
//!
//! - `loader` + `chunker`: uploaded bytes to overlapping, cited chunks
//! - `index`: embeds chunks and persists them in a `RagStore`
//! - `ingest`: batch entry point for documents
//! - `answerer`: retrieves top-k chunks and asks the language model

pub mod answerer;
pub mod chunker;
pub mod context_builder;
pub mod index;
pub mod ingest;
pub mod loader;
pub mod sqlite;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use answerer::{Answer, AnswerSettings, Answerer, NO_CONTEXT_ANSWER};
pub use chunker::{Chunk, ChunkingConfig, TextChunker};
pub use index::{Embedder, IndexLocation, VectorIndex};
pub use ingest::{DocumentOutcome, IngestReport, IngestService, UploadedFile};
pub use sqlite::SqliteRagStore;
pub use store::{ChunkSearchResult, IndexManifest, IndexedChunk, RagStore};
