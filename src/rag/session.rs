//! Session controller for a single "ask" operation.
//!
//! Sequence: history check (expansion + titling when prior turns exist),
//! collection lookup from the owning user, hybrid retrieval, generation,
//! and persisting one completed turn. The ORIGINAL query is persisted,
//! never the expanded one.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::core::errors::RagError;
use crate::vector::collection_for_user;

use super::generate::{AnswerGenerator, StreamEvent};
use super::retriever::HybridRetriever;
use super::{ChatTurn, FileEntry};

/// Conversation-history collaborator.
#[async_trait]
pub trait ChatHistory: Send + Sync {
    async fn turns(&self, conversation_id: &str) -> Result<Vec<ChatTurn>, RagError>;

    async fn append_turn(
        &self,
        conversation_id: &str,
        human_message: &str,
        ai_response: &str,
    ) -> Result<bool, RagError>;

    async fn rename(&self, conversation_id: &str, title: &str) -> Result<bool, RagError>;

    /// Owning user of the conversation.
    async fn owner(&self, conversation_id: &str) -> Result<String, RagError>;
}

/// File-metadata collaborator.
#[async_trait]
pub trait FileRegistry: Send + Sync {
    async fn list_files(&self, user_id: &str) -> Result<Vec<FileEntry>, RagError>;
}

#[derive(Debug, Clone, Copy)]
pub struct SearchSettings {
    pub top_k: usize,
    pub dense_weight: f32,
    pub sparse_weight: f32,
}

pub struct RagSession {
    history: Arc<dyn ChatHistory>,
    retriever: HybridRetriever,
    generator: AnswerGenerator,
    settings: SearchSettings,
}

impl RagSession {
    pub fn new(
        history: Arc<dyn ChatHistory>,
        retriever: HybridRetriever,
        generator: AnswerGenerator,
        settings: SearchSettings,
    ) -> Self {
        Self {
            history,
            retriever,
            generator,
            settings,
        }
    }

    /// History check and retrieval shared by both ask paths. Returns the
    /// query to generate with and the retrieved context texts.
    async fn prepare(
        &self,
        conversation_id: &str,
        message: &str,
    ) -> Result<(String, Vec<String>), RagError> {
        let turns = self.history.turns(conversation_id).await?;

        let query = if turns.is_empty() {
            message.to_string()
        } else {
            let (title, expanded) = tokio::join!(
                self.generator.name_conversation(&turns),
                self.generator.expand_query(message, &turns),
            );
            if let Err(e) = self.history.rename(conversation_id, &title).await {
                tracing::warn!("failed to rename conversation {}: {}", conversation_id, e);
            }
            expanded
        };

        let user_id = self.history.owner(conversation_id).await?;
        let collection = collection_for_user(&user_id);
        tracing::debug!("asking against collection {}", collection);

        let points = self
            .retriever
            .search(
                &query,
                &collection,
                self.settings.top_k,
                self.settings.dense_weight,
                self.settings.sparse_weight,
            )
            .await?;

        let context = points.into_iter().map(|p| p.payload.text).collect();
        Ok((query, context))
    }

    /// Complete answer in one shot. The turn is persisted with the
    /// original message when the answer is non-empty.
    pub async fn ask(&self, conversation_id: &str, message: &str) -> Result<String, RagError> {
        let (query, context) = self.prepare(conversation_id, message).await?;
        let answer = self.generator.generate(&query, &context).await;

        if !answer.is_empty() {
            if let Err(e) = self
                .history
                .append_turn(conversation_id, message, &answer)
                .await
            {
                tracing::warn!("failed to persist turn: {}", e);
            }
        }

        Ok(answer)
    }

    /// Streaming answer. `Content` deltas are accumulated and one turn
    /// is persisted when `Done` arrives with non-empty text; nothing is
    /// persisted after `Error` or if the consumer disconnects early.
    pub async fn ask_stream(
        &self,
        conversation_id: &str,
        message: &str,
    ) -> Result<mpsc::Receiver<StreamEvent>, RagError> {
        let (query, context) = self.prepare(conversation_id, message).await?;
        let mut inner = self.generator.generate_stream(&query, &context).await;

        let (tx, rx) = mpsc::channel(32);
        let history = self.history.clone();
        let conversation_id = conversation_id.to_string();
        let original_message = message.to_string();

        tokio::spawn(async move {
            let mut accumulated = String::new();

            while let Some(event) = inner.recv().await {
                match event {
                    StreamEvent::Content(delta) => {
                        accumulated.push_str(&delta);
                        if tx.send(StreamEvent::Content(delta)).await.is_err() {
                            // consumer disconnected mid-sequence: stop the
                            // producer and persist nothing
                            return;
                        }
                    }
                    StreamEvent::Done => {
                        let _ = tx.send(StreamEvent::Done).await;
                        if !accumulated.is_empty() {
                            if let Err(e) = history
                                .append_turn(&conversation_id, &original_message, &accumulated)
                                .await
                            {
                                tracing::warn!("failed to persist streamed turn: {}", e);
                            }
                        }
                        return;
                    }
                    StreamEvent::Error(message) => {
                        let _ = tx.send(StreamEvent::Error(message)).await;
                        return;
                    }
                }
            }
        });

        Ok(rx)
    }
}
