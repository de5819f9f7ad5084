use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use crate::core::errors::RagError;
use crate::rag::generate::StreamEvent;
use crate::rag::session::{ChatHistory, FileRegistry};
use crate::state::AppState;

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[derive(Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
}

pub async fn create_user(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateUserRequest>,
) -> Result<Json<Value>, RagError> {
    if req.username.trim().is_empty() {
        return Err(RagError::BadRequest("username must not be empty".into()));
    }
    let user_id = state.history.create_user(req.username.trim()).await?;
    Ok(Json(json!({ "user_id": user_id })))
}

#[derive(Deserialize)]
pub struct CreateConversationRequest {
    pub user_id: String,
}

pub async fn create_conversation(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateConversationRequest>,
) -> Result<Json<Value>, RagError> {
    let conversation_id = state.history.create_conversation(&req.user_id).await?;
    Ok(Json(json!({ "conversation_id": conversation_id })))
}

pub async fn list_conversations(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<Value>, RagError> {
    let conversations = state.history.list_conversations(&user_id).await?;
    Ok(Json(json!({ "conversations": conversations })))
}

pub async fn get_messages(
    State(state): State<Arc<AppState>>,
    Path(conversation_id): Path<String>,
) -> Result<Json<Value>, RagError> {
    let turns = state.history.turns(&conversation_id).await?;
    Ok(Json(json!({ "messages": turns })))
}

#[derive(Deserialize)]
pub struct UploadFileRequest {
    pub file_name: String,
    pub file_type: String,
    pub file_path: String,
}

/// Register an uploaded file and rebuild the user's collection from
/// their full file set.
pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Json(req): Json<UploadFileRequest>,
) -> Result<Json<Value>, RagError> {
    state
        .history
        .register_file(&user_id, &req.file_name, &req.file_type, &req.file_path)
        .await?;

    let files = state.history.list_files(&user_id).await?;
    let indexed = state.pipeline.reindex_user(&user_id, &files).await?;

    Ok(Json(json!({ "indexed_points": indexed })))
}

#[derive(Deserialize)]
pub struct AskRequest {
    pub message: String,
}

pub async fn ask(
    State(state): State<Arc<AppState>>,
    Path(conversation_id): Path<String>,
    Json(req): Json<AskRequest>,
) -> Result<Json<Value>, RagError> {
    let answer = state.session.ask(&conversation_id, &req.message).await?;
    Ok(Json(json!({ "response": answer })))
}

/// Streaming ask. Each `StreamEvent` becomes one newline-delimited JSON
/// frame on the response body.
pub async fn ask_stream(
    State(state): State<Arc<AppState>>,
    Path(conversation_id): Path<String>,
    Json(req): Json<AskRequest>,
) -> Result<Response, RagError> {
    let events = state
        .session
        .ask_stream(&conversation_id, &req.message)
        .await?;

    let body = Body::from_stream(futures_util::stream::unfold(
        events,
        |mut events: mpsc::Receiver<StreamEvent>| async move {
            let event = events.recv().await?;
            let line = format!("{}\n", frame(&event));
            Some((Ok::<_, Infallible>(line), events))
        },
    ));

    let response = Response::builder()
        .header(header::CONTENT_TYPE, "application/x-ndjson")
        .body(body)
        .map_err(RagError::internal)?;
    Ok(response.into_response())
}

/// Wire framing for one stream event.
fn frame(event: &StreamEvent) -> Value {
    match event {
        StreamEvent::Content(text) => json!({
            "content": text,
            "type": "content",
            "done": false,
        }),
        StreamEvent::Done => json!({
            "content": "",
            "type": "done",
            "done": true,
        }),
        StreamEvent::Error(message) => json!({
            "content": message,
            "type": "error",
            "done": true,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_frame_contract() {
        let value = frame(&StreamEvent::Content("hel".to_string()));
        assert_eq!(
            value,
            json!({ "content": "hel", "type": "content", "done": false })
        );
    }

    #[test]
    fn done_frame_contract() {
        let value = frame(&StreamEvent::Done);
        assert_eq!(value, json!({ "content": "", "type": "done", "done": true }));
    }

    #[test]
    fn error_frame_contract() {
        let value = frame(&StreamEvent::Error("boom".to_string()));
        assert_eq!(
            value,
            json!({ "content": "boom", "type": "error", "done": true })
        );
    }
}
