use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;

use docchat_backend::core::config::AppPaths;
use docchat_backend::core::logging;
use docchat_backend::server::router;
use docchat_backend::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // logging first so state construction diagnostics are captured
    let paths = Arc::new(AppPaths::new());
    logging::init(&paths);

    let state = AppState::initialize(paths).await?;

    let bind_addr = format!("{}:{}", state.config.server.host, state.config.server.port);
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind to {}", bind_addr))?;
    let addr = listener.local_addr()?;
    tracing::info!("listening on {}", addr);

    let app: Router = router::router(state);
    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}
