use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::core::errors::RagError;

use super::types::ChatRequest;

#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// provider name for logging (e.g. "openai-compat")
    fn name(&self) -> &str;

    /// chat completion (non-streaming)
    async fn chat(&self, request: ChatRequest, model_id: &str) -> Result<String, RagError>;

    /// chat completion (streaming); each received item is one text delta
    async fn stream_chat(
        &self,
        request: ChatRequest,
        model_id: &str,
    ) -> Result<mpsc::Receiver<Result<String, RagError>>, RagError>;

    /// generate embeddings, one vector per input
    async fn embed(&self, inputs: &[String], model_id: &str) -> Result<Vec<Vec<f32>>, RagError>;
}
