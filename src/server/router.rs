use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::server::handlers;
use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/users", post(handlers::create_user))
        .route(
            "/api/users/:user_id/conversations",
            get(handlers::list_conversations),
        )
        .route("/api/users/:user_id/files", post(handlers::upload_file))
        .route("/api/conversations", post(handlers::create_conversation))
        .route(
            "/api/conversations/:conversation_id/messages",
            get(handlers::get_messages),
        )
        .route(
            "/api/conversations/:conversation_id/ask",
            post(handlers::ask),
        )
        .route(
            "/api/conversations/:conversation_id/ask/stream",
            post(handlers::ask_stream),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
