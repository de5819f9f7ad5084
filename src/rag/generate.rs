//! Answer generation over retrieved context.
//!
//! One-shot and streaming generation share the same grounding prompt.
//! Model failures never abort an ask: the one-shot path returns the
//! failure as answer text, query expansion falls back to the raw query
//! and conversation naming falls back to a fixed title.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::llm::{ChatMessage, ChatRequest, LlmProvider};

use super::ChatTurn;

pub const FALLBACK_TITLE: &str = "New Chat";

/// Unit of the streaming answer protocol. `Done` and `Error` are
/// terminal: nothing follows either of them.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Content(String),
    Done,
    Error(String),
}

pub struct AnswerGenerator {
    llm: Arc<dyn LlmProvider>,
    model_id: String,
}

impl AnswerGenerator {
    pub fn new(llm: Arc<dyn LlmProvider>, model_id: String) -> Self {
        Self { llm, model_id }
    }

    /// Rewrite `query` using recent history for disambiguation. Falls
    /// back to the original query on any model failure.
    pub async fn expand_query(&self, query: &str, history: &[ChatTurn]) -> String {
        let prompt = format!(
            "Based on the following chat history, rewrite the user's query so it \
             is self-contained and unambiguous. Reply with the rewritten query only.\n\n\
             Chat history:\n{}\n\nUser's query: {}\n\nRewritten query:",
            format_history(history),
            query
        );

        let request = ChatRequest::new(vec![ChatMessage::user(prompt)]);
        match self.llm.chat(request, &self.model_id).await {
            Ok(expanded) if !expanded.trim().is_empty() => expanded.trim().to_string(),
            Ok(_) => query.to_string(),
            Err(e) => {
                tracing::warn!("query expansion failed, using raw query: {}", e);
                query.to_string()
            }
        }
    }

    /// Short title for the conversation, at most five words.
    pub async fn name_conversation(&self, history: &[ChatTurn]) -> String {
        let prompt = format!(
            "Provide a title for the conversation below. The title must be no \
             longer than 5 words. Reply with the title only.\n\n\
             Chat history:\n{}\n\nTitle:",
            format_history(history)
        );

        let request = ChatRequest::new(vec![ChatMessage::user(prompt)]);
        match self.llm.chat(request, &self.model_id).await {
            Ok(title) if !title.trim().is_empty() => title.trim().to_string(),
            Ok(_) => FALLBACK_TITLE.to_string(),
            Err(e) => {
                tracing::warn!("conversation naming failed: {}", e);
                FALLBACK_TITLE.to_string()
            }
        }
    }

    /// One-shot answer. A model failure is returned as answer text so
    /// the caller presents it like any other response.
    pub async fn generate(&self, query: &str, context_chunks: &[String]) -> String {
        let prompt = answer_prompt(query, context_chunks);
        let request = ChatRequest::new(vec![ChatMessage::user(prompt)]);

        match self.llm.chat(request, &self.model_id).await {
            Ok(answer) => answer,
            Err(e) => {
                tracing::error!("generation failed: {}", e);
                format!("Error generating response: {}", e)
            }
        }
    }

    /// Streaming answer. Yields one `Content` per model delta, then
    /// exactly one `Done`; any failure yields one `Error` and ends the
    /// sequence. The producer stops as soon as the receiver is dropped.
    pub async fn generate_stream(
        &self,
        query: &str,
        context_chunks: &[String],
    ) -> mpsc::Receiver<StreamEvent> {
        let prompt = answer_prompt(query, context_chunks);
        let request = ChatRequest::new(vec![ChatMessage::user(prompt)]);

        let (tx, rx) = mpsc::channel(32);
        let llm = self.llm.clone();
        let model_id = self.model_id.clone();

        tokio::spawn(async move {
            let mut deltas = match llm.stream_chat(request, &model_id).await {
                Ok(deltas) => deltas,
                Err(e) => {
                    let _ = tx
                        .send(StreamEvent::Error(format!(
                            "Error generating response: {}",
                            e
                        )))
                        .await;
                    return;
                }
            };

            while let Some(delta) = deltas.recv().await {
                match delta {
                    Ok(text) => {
                        if tx.send(StreamEvent::Content(text)).await.is_err() {
                            // consumer went away; dropping `deltas` stops
                            // the provider task as well
                            return;
                        }
                    }
                    Err(e) => {
                        let _ = tx
                            .send(StreamEvent::Error(format!(
                                "Error generating response: {}",
                                e
                            )))
                            .await;
                        return;
                    }
                }
            }

            let _ = tx.send(StreamEvent::Done).await;
        });

        rx
    }
}

/// Grounding prompt: answer only from the retrieved context.
fn answer_prompt(query: &str, context_chunks: &[String]) -> String {
    let context = context_chunks.join("\n\n");
    format!(
        "Based on the following context information, please answer the user's \
         question.\nIf the answer cannot be found in the context, please say so.\n\n\
         Context:\n{}\n\nQuestion: {}\n\nAnswer:",
        context, query
    )
}

fn format_history(history: &[ChatTurn]) -> String {
    history
        .iter()
        .map(|turn| format!("Human: {}\nAI: {}", turn.human_message, turn.ai_response))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use crate::core::errors::RagError;

    use super::*;

    /// Stub model: echoes the prompt back, or fails, or streams fixed
    /// deltas; records every prompt it was asked.
    struct StubLlm {
        fail: bool,
        deltas: Vec<Result<String, ()>>,
        prompts: Mutex<Vec<String>>,
    }

    impl StubLlm {
        fn echo() -> Self {
            Self {
                fail: false,
                deltas: Vec::new(),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                deltas: Vec::new(),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn streaming(deltas: Vec<Result<String, ()>>) -> Self {
            Self {
                fail: false,
                deltas,
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LlmProvider for StubLlm {
        fn name(&self) -> &str {
            "stub"
        }

        async fn chat(&self, request: ChatRequest, _model_id: &str) -> Result<String, RagError> {
            let prompt = request.messages[0].content.clone();
            self.prompts.lock().await.push(prompt.clone());
            if self.fail {
                return Err(RagError::GenerationUnavailable("model down".into()));
            }
            Ok(prompt)
        }

        async fn stream_chat(
            &self,
            _request: ChatRequest,
            _model_id: &str,
        ) -> Result<mpsc::Receiver<Result<String, RagError>>, RagError> {
            if self.fail {
                return Err(RagError::GenerationUnavailable("model down".into()));
            }
            let (tx, rx) = mpsc::channel(8);
            let deltas = self.deltas.clone();
            tokio::spawn(async move {
                for delta in deltas {
                    let item = delta
                        .map_err(|_| RagError::GenerationUnavailable("mid-stream".into()));
                    if tx.send(item).await.is_err() {
                        return;
                    }
                }
            });
            Ok(rx)
        }

        async fn embed(
            &self,
            _inputs: &[String],
            _model_id: &str,
        ) -> Result<Vec<Vec<f32>>, RagError> {
            Err(RagError::EmbeddingUnavailable("stub".into()))
        }
    }

    fn generator(stub: StubLlm) -> AnswerGenerator {
        AnswerGenerator::new(Arc::new(stub), "test-model".to_string())
    }

    async fn drain(mut rx: mpsc::Receiver<StreamEvent>) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn prompt_contains_all_context_chunks() {
        let generator = generator(StubLlm::echo());
        let context = vec![
            "X is a thing.".to_string(),
            "X was invented in 1990.".to_string(),
        ];

        let answer = generator.generate("What is X?", &context).await;
        assert!(answer.contains("X is a thing."));
        assert!(answer.contains("X was invented in 1990."));
        assert!(answer.contains("What is X?"));
    }

    #[tokio::test]
    async fn generation_failure_becomes_answer_text() {
        let generator = generator(StubLlm::failing());
        let answer = generator.generate("q", &[]).await;
        assert!(answer.starts_with("Error generating response:"));
    }

    #[tokio::test]
    async fn expansion_falls_back_to_original_query() {
        let generator = generator(StubLlm::failing());
        let expanded = generator
            .expand_query("what about it?", &[ChatTurn {
                human_message: "tell me about X".to_string(),
                ai_response: "X is a thing".to_string(),
            }])
            .await;
        assert_eq!(expanded, "what about it?");
    }

    #[tokio::test]
    async fn naming_falls_back_to_fixed_title() {
        let generator = generator(StubLlm::failing());
        let title = generator.name_conversation(&[]).await;
        assert_eq!(title, FALLBACK_TITLE);
    }

    #[tokio::test]
    async fn stream_ends_with_exactly_one_done() {
        let generator = generator(StubLlm::streaming(vec![
            Ok("Hel".to_string()),
            Ok("lo".to_string()),
        ]));
        let events = drain(generator.generate_stream("q", &[]).await).await;

        assert_eq!(
            events,
            vec![
                StreamEvent::Content("Hel".to_string()),
                StreamEvent::Content("lo".to_string()),
                StreamEvent::Done,
            ]
        );
    }

    #[tokio::test]
    async fn mid_stream_failure_ends_with_one_error() {
        let generator = generator(StubLlm::streaming(vec![
            Ok("partial".to_string()),
            Err(()),
        ]));
        let events = drain(generator.generate_stream("q", &[]).await).await;

        assert_eq!(events.len(), 2);
        assert_eq!(events[0], StreamEvent::Content("partial".to_string()));
        assert!(matches!(events[1], StreamEvent::Error(_)));
    }

    #[tokio::test]
    async fn upfront_failure_yields_single_error_event() {
        let generator = generator(StubLlm::failing());
        let events = drain(generator.generate_stream("q", &[]).await).await;

        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], StreamEvent::Error(_)));
    }
}
