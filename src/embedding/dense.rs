use std::sync::Arc;

use async_trait::async_trait;

use crate::core::errors::RagError;
use crate::llm::LlmProvider;

use super::DenseEmbedder;

/// Dense embedder backed by the configured model endpoint.
pub struct RemoteDenseEmbedder {
    provider: Arc<dyn LlmProvider>,
    model_id: String,
    dimension: usize,
}

impl RemoteDenseEmbedder {
    pub fn new(provider: Arc<dyn LlmProvider>, model_id: String, dimension: usize) -> Self {
        Self {
            provider,
            model_id,
            dimension,
        }
    }
}

#[async_trait]
impl DenseEmbedder for RemoteDenseEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError> {
        let mut vectors = self
            .provider
            .embed(&[text.to_string()], &self.model_id)
            .await?;

        let vector = vectors
            .pop()
            .ok_or_else(|| RagError::EmbeddingUnavailable("empty embedding response".into()))?;

        if vector.len() != self.dimension {
            return Err(RagError::EmbeddingUnavailable(format!(
                "dimension mismatch: expected {}, got {}",
                self.dimension,
                vector.len()
            )));
        }

        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
