//! Document ingestion: load, chunk and index a batch of uploaded files.

use serde::Serialize;

use super::chunker::{Chunk, TextChunker};
use super::index::IndexLocation;
use super::loader;
use crate::core::config::IngestPolicy;
use crate::core::errors::ApiError;

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            bytes: bytes.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentOutcome {
    pub filename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunks: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    /// Documents whose chunks were written.
    pub documents: usize,
    pub chunks: usize,
    pub outcomes: Vec<DocumentOutcome>,
}

pub struct IngestService {
    chunker: TextChunker,
    index: IndexLocation,
    policy: IngestPolicy,
}

impl IngestService {
    pub fn new(chunker: TextChunker, index: IndexLocation, policy: IngestPolicy) -> Self {
        Self {
            chunker,
            index,
            policy,
        }
    }

    /// Ingests `files` in order. Chunks of every accepted document are written
    /// in one index transaction after all documents have been processed.
    pub async fn ingest(&self, files: Vec<UploadedFile>) -> Result<IngestReport, ApiError> {
        if files.is_empty() {
            return Err(ApiError::BadRequest("no documents provided".to_string()));
        }

        let mut outcomes = Vec::with_capacity(files.len());
        let mut pending: Vec<Chunk> = Vec::new();
        let mut first_error: Option<ApiError> = None;
        let mut accepted: Vec<String> = Vec::new();

        for file in files {
            let filename = file.filename.clone();
            match self.process(file).await {
                Ok(chunks) => {
                    accepted.push(filename.clone());
                    outcomes.push(DocumentOutcome {
                        filename,
                        chunks: Some(chunks.len()),
                        error: None,
                    });
                    pending.extend(chunks);
                }
                Err(e) => {
                    tracing::error!("Error processing {}: {}", filename, e);
                    if self.policy == IngestPolicy::FailFast {
                        return Err(e);
                    }
                    outcomes.push(DocumentOutcome {
                        filename,
                        chunks: None,
                        error: Some(e.to_string()),
                    });
                    first_error.get_or_insert(e);
                }
            }
        }

        if accepted.is_empty() {
            if let Some(e) = first_error {
                return Err(e);
            }
        }

        let written = self.write(&pending).await.map_err(|e| {
            tracing::error!("Ingestion of {:?} failed: {}", accepted, e);
            e
        })?;

        tracing::info!(
            "Ingested {} document(s), {} chunk(s), {} failed",
            accepted.len(),
            written,
            outcomes.len() - accepted.len()
        );

        Ok(IngestReport {
            documents: accepted.len(),
            chunks: written,
            outcomes,
        })
    }

    async fn write(&self, chunks: &[Chunk]) -> Result<usize, ApiError> {
        let index = self.index.open_or_create().await?;
        index.write(chunks).await
    }

    async fn process(&self, file: UploadedFile) -> Result<Vec<Chunk>, ApiError> {
        let UploadedFile { filename, bytes } = file;

        let document = tokio::task::spawn_blocking(move || loader::extract(&filename, &bytes))
            .await
            .map_err(|e| ApiError::Extraction(format!("extraction task failed: {}", e)))??;

        let chunks = self.chunker.chunk_document(&document);
        if chunks.is_empty() {
            return Err(ApiError::Extraction(format!(
                "{}: no text chunks could be produced",
                document.source
            )));
        }

        tracing::info!(
            "Processed {}: {} - {} chunks created",
            document.kind.label(),
            document.source,
            chunks.len()
        );
        Ok(chunks)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    use super::*;
    use crate::rag::chunker::ChunkingConfig;
    use crate::rag::index::Embedder;
    use crate::rag::testing::{CapturedLogs, FakeProvider};

    fn service(dir: &std::path::Path, provider: Arc<FakeProvider>, policy: IngestPolicy) -> IngestService {
        let chunker = TextChunker::new(ChunkingConfig::default()).unwrap();
        let location = IndexLocation::new(dir.join("index"), Embedder::new(provider, "fake-embed", 16));
        IngestService::new(chunker, location, policy)
    }

    #[tokio::test]
    async fn text_document_becomes_one_chunk() {
        let tmp = tempfile::tempdir().unwrap();
        let provider = Arc::new(FakeProvider::default());
        let service = service(tmp.path(), provider, IngestPolicy::FailFast);

        let report = service
            .ingest(vec![UploadedFile::new("sky.txt", "The sky is blue. Water is wet.")])
            .await
            .unwrap();

        assert_eq!(report.documents, 1);
        assert_eq!(report.chunks, 1);
        assert_eq!(report.outcomes[0].chunks, Some(1));
        assert!(tmp.path().join("index").join("rag.db").is_file());
    }

    #[tokio::test]
    async fn fail_fast_writes_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let provider = Arc::new(FakeProvider::default());
        let service = service(tmp.path(), provider.clone(), IngestPolicy::FailFast);

        let err = service
            .ingest(vec![
                UploadedFile::new("sky.txt", "The sky is blue."),
                UploadedFile::new("report.docx", vec![0u8; 16]),
            ])
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "unsupported_format");
        assert!(!tmp.path().join("index").exists());
        assert_eq!(provider.embed_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn partial_policy_reports_failures_and_keeps_successes() {
        let tmp = tempfile::tempdir().unwrap();
        let provider = Arc::new(FakeProvider::default());
        let service = service(tmp.path(), provider, IngestPolicy::Partial);

        let report = service
            .ingest(vec![
                UploadedFile::new("empty.txt", "   "),
                UploadedFile::new("sky.txt", "The sky is blue."),
                UploadedFile::new("slides.pptx", vec![1u8, 2, 3]),
            ])
            .await
            .unwrap();

        assert_eq!(report.documents, 1);
        assert_eq!(report.chunks, 1);
        assert_eq!(report.outcomes.len(), 3);
        assert!(report.outcomes[0].error.as_deref().unwrap().contains("empty.txt"));
        assert_eq!(report.outcomes[1].chunks, Some(1));
        assert!(report.outcomes[2].error.as_deref().unwrap().contains("unsupported format"));
    }

    #[tokio::test]
    async fn partial_policy_with_no_successes_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let service = service(tmp.path(), Arc::new(FakeProvider::default()), IngestPolicy::Partial);

        let err = service
            .ingest(vec![UploadedFile::new("a.docx", vec![0u8])])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "unsupported_format");
    }

    #[tokio::test]
    async fn embedding_failure_aborts_the_batch_and_logs_the_files() {
        let tmp = tempfile::tempdir().unwrap();
        let provider = Arc::new(FakeProvider::failing_embeddings());
        let service = service(tmp.path(), provider, IngestPolicy::Partial);

        let logs = CapturedLogs::default();
        let _guard = logs.install();
        let err = service
            .ingest(vec![
                UploadedFile::new("sky.txt", "The sky is blue."),
                UploadedFile::new("lake.txt", "Water is wet."),
            ])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "embedding_service_error");

        let output = logs.contents();
        assert!(output.contains("ERROR"), "{}", output);
        assert!(output.contains("Ingestion of [\"sky.txt\", \"lake.txt\"] failed"), "{}", output);
        assert!(output.contains("503 Service Unavailable"), "{}", output);
    }

    #[tokio::test]
    async fn empty_batch_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let service = service(tmp.path(), Arc::new(FakeProvider::default()), IngestPolicy::FailFast);
        assert_eq!(service.ingest(Vec::new()).await.unwrap_err().kind(), "bad_request");
    }
}
