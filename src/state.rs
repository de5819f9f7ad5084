use std::sync::Arc;

use crate::core::config::{AppConfig, AppPaths};
use crate::embedding::{Bm25SparseEmbedder, RemoteDenseEmbedder};
use crate::history::HistoryStore;
use crate::llm::OpenAiCompatProvider;
use crate::rag::generate::AnswerGenerator;
use crate::rag::indexer::IndexingPipeline;
use crate::rag::retriever::HybridRetriever;
use crate::rag::session::{RagSession, SearchSettings};
use crate::vector::{MemoryStore, QdrantStore, VectorStore};

#[derive(Clone)]
pub struct AppState {
    pub paths: Arc<AppPaths>,
    pub config: AppConfig,
    pub history: Arc<HistoryStore>,
    pub pipeline: Arc<IndexingPipeline>,
    pub session: Arc<RagSession>,
}

impl AppState {
    pub async fn initialize(paths: Arc<AppPaths>) -> anyhow::Result<Arc<Self>> {
        let config = AppConfig::load(&paths)?;
        let history = Arc::new(HistoryStore::new(paths.db_path.clone()).await?);

        let provider = Arc::new(OpenAiCompatProvider::new(config.llm.base_url.clone()));
        let dense = Arc::new(RemoteDenseEmbedder::new(
            provider.clone(),
            config.llm.embedding_model.clone(),
            config.vector.dense_dim,
        ));
        let sparse = Arc::new(Bm25SparseEmbedder::new());

        let store: Arc<dyn VectorStore> = if config.vector.qdrant_url.is_empty() {
            tracing::warn!("no qdrant url configured, using in-process vector store");
            Arc::new(MemoryStore::new())
        } else {
            Arc::new(QdrantStore::new(config.vector.qdrant_url.clone()))
        };

        let pipeline = Arc::new(IndexingPipeline::new(
            dense.clone(),
            sparse.clone(),
            store.clone(),
            config.rag.chunk_size,
            config.rag.chunk_overlap,
        ));

        let retriever = HybridRetriever::new(dense, sparse, store);
        let generator = AnswerGenerator::new(provider, config.llm.chat_model.clone());
        let session = Arc::new(RagSession::new(
            history.clone(),
            retriever,
            generator,
            SearchSettings {
                top_k: config.rag.top_k,
                dense_weight: config.rag.dense_weight,
                sparse_weight: config.rag.sparse_weight,
            },
        ));

        Ok(Arc::new(AppState {
            paths,
            config,
            history,
            pipeline,
            session,
        }))
    }
}
