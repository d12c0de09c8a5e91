use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use crate::core::config::{AppConfig, AppPaths, ConfigService};
use crate::llm::{LlmProvider, OpenAiProvider};
use crate::rag::{AnswerSettings, Answerer, Embedder, IndexLocation, IngestService, TextChunker};

pub mod error;

use error::InitializationError;

/// Application state shared across all routes.
///
/// The persisted index is the only state that outlives a request; this struct
/// holds the services that read and write it.
pub struct AppState {
    pub paths: Arc<AppPaths>,
    pub config: AppConfig,
    pub index: IndexLocation,
    pub ingest: IngestService,
    pub answerer: Answerer,
    /// Serializes ingestion so one writer at a time touches the index.
    pub ingest_lock: Mutex<()>,
}

impl AppState {
    /// Loads configuration, checks credentials and wires the OpenAI-compatible
    /// chat and embedding providers into the pipeline.
    pub async fn initialize(paths: Arc<AppPaths>) -> Result<Arc<Self>, InitializationError> {
        let config_service = ConfigService::new(paths.clone());
        let config = config_service
            .load_app_config()
            .map_err(|e| InitializationError::Config(e.into()))?;

        config
            .require_credentials()
            .map_err(|e| InitializationError::Credentials(e.into()))?;

        let chat: Arc<dyn LlmProvider> = Arc::new(
            OpenAiProvider::new(
                config.llm.base_url.clone(),
                config.llm.api_key.clone(),
                Duration::from_secs(config.llm.timeout_secs),
            )
            .map_err(|e| InitializationError::Llm(e.into()))?,
        );
        let embeddings: Arc<dyn LlmProvider> = Arc::new(
            OpenAiProvider::new(
                config.embedding_base_url().to_string(),
                config.embedding.api_key.clone(),
                Duration::from_secs(config.embedding.timeout_secs),
            )
            .map_err(|e| InitializationError::Llm(e.into()))?,
        );

        let state = Self::from_parts(paths, config, chat, embeddings)
            .map_err(|e| InitializationError::Rag(e.into()))?;
        Ok(Arc::new(state))
    }

    /// Builds the state from already constructed providers.
    pub fn from_parts(
        paths: Arc<AppPaths>,
        config: AppConfig,
        chat: Arc<dyn LlmProvider>,
        embeddings: Arc<dyn LlmProvider>,
    ) -> Result<Self, crate::core::errors::ApiError> {
        let embedder = Embedder::new(
            embeddings,
            config.embedding.model.clone(),
            config.embedding.batch_size,
        );
        let index = IndexLocation::new(paths.index_dir.clone(), embedder);

        let chunker = TextChunker::new(config.chunking)?;
        let ingest = IngestService::new(chunker, index.clone(), config.ingest.policy);
        let answerer = Answerer::new(index.clone(), chat, AnswerSettings::from_config(&config));

        tracing::info!(
            "RAG pipeline ready: chunk_size={} overlap={} top_k={} chat={} embedding={} index={}",
            config.chunking.chunk_size,
            config.chunking.chunk_overlap,
            config.retrieval.top_k,
            config.llm.model,
            config.embedding.model,
            paths.index_dir.display()
        );

        Ok(Self {
            paths,
            config,
            index,
            ingest,
            answerer,
            ingest_lock: Mutex::new(()),
        })
    }
}
