mod handlers;
mod render;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::signal;

use crate::app::App;
use crate::error::{AppError, Result};

#[derive(Clone)]
pub struct AppState {
    pub app: Arc<App>,
}

pub fn router(app: Arc<App>) -> Router {
    Router::new()
        .route("/", get(handlers::refresh_all))
        .route("/add", post(handlers::add_subreddit))
        .route("/{subreddit_name}", get(handlers::subreddit_playlist))
        .with_state(AppState { app })
}

pub async fn serve(app: Arc<App>, bind_address: &str) -> Result<()> {
    let addr: SocketAddr = bind_address
        .parse()
        .map_err(|e| AppError::Config(format!("invalid bind_address {bind_address:?}: {e}")))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on http://{}", addr);

    axum::serve(listener, router(app))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        tracing::error!("Failed to install Ctrl+C handler: {}", e);
    }
    tracing::info!("Shutting down");
}
