//! Indexing pipeline: file -> text -> chunks -> dual embeddings -> upsert.

use std::path::Path;
use std::sync::Arc;

use uuid::Uuid;

use crate::core::errors::RagError;
use crate::embedding::{DenseEmbedder, SparseEmbedder};
use crate::vector::{collection_for_user, Distance, PointPayload, PointRecord, VectorStore};

use super::chunker::split_text;
use super::extract::{extract_text, FileKind};
use super::FileEntry;

/// An immutable chunk of document text awaiting embedding.
#[derive(Debug, Clone)]
pub struct DocumentChunk {
    pub id: String,
    pub text: String,
    pub file_id: String,
    pub user_id: String,
}

pub struct IndexingPipeline {
    dense: Arc<dyn DenseEmbedder>,
    sparse: Arc<dyn SparseEmbedder>,
    store: Arc<dyn VectorStore>,
    chunk_size: usize,
    chunk_overlap: usize,
}

impl IndexingPipeline {
    pub fn new(
        dense: Arc<dyn DenseEmbedder>,
        sparse: Arc<dyn SparseEmbedder>,
        store: Arc<dyn VectorStore>,
        chunk_size: usize,
        chunk_overlap: usize,
    ) -> Self {
        Self {
            dense,
            sparse,
            store,
            chunk_size,
            chunk_overlap,
        }
    }

    /// Rebuild the user's collection from their full file set.
    ///
    /// The collection is recreated (destroying prior points) and every
    /// file is re-chunked and re-embedded. A chunk that fails either
    /// embedding is dropped with a warning; extraction and store
    /// failures surface to the caller. Returns the indexed point count.
    pub async fn reindex_user(
        &self,
        user_id: &str,
        files: &[FileEntry],
    ) -> Result<usize, RagError> {
        let mut chunks = Vec::new();
        for file in files {
            let kind = FileKind::detect(&file.file_type, &file.file_name);
            let text = extract_text(Path::new(&file.file_path), kind)?;

            for piece in split_text(&text, self.chunk_size, self.chunk_overlap) {
                if piece.trim().is_empty() {
                    continue;
                }
                chunks.push(DocumentChunk {
                    id: Uuid::new_v4().to_string(),
                    text: piece,
                    file_id: file.file_id.clone(),
                    user_id: user_id.to_string(),
                });
            }
            tracing::debug!("chunked {} into {} pieces so far", file.file_name, chunks.len());
        }

        let collection = collection_for_user(user_id);
        self.store
            .ensure_collection(&collection, self.dense.dimension(), Distance::Cosine)
            .await?;

        let mut points = Vec::new();
        for chunk in chunks {
            let dense = match self.dense.embed(&chunk.text).await {
                Ok(vector) => vector,
                Err(e) => {
                    tracing::warn!("dropping chunk {} (dense embed): {}", chunk.id, e);
                    continue;
                }
            };
            let sparse = match self.sparse.embed(&chunk.text).await {
                Ok(vector) => vector,
                Err(e) => {
                    tracing::warn!("dropping chunk {} (sparse embed): {}", chunk.id, e);
                    continue;
                }
            };
            points.push(PointRecord {
                id: chunk.id,
                dense,
                sparse,
                payload: PointPayload {
                    text: chunk.text,
                    file_id: chunk.file_id,
                    user_id: chunk.user_id,
                },
            });
        }

        if points.is_empty() {
            tracing::warn!("no embeddings generated for {}", collection);
            return Ok(0);
        }

        let count = points.len();
        self.store.upsert(&collection, points).await?;
        tracing::info!("indexed {} points into {}", count, collection);
        Ok(count)
    }
}
