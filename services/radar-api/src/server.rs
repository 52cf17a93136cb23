//! Router construction and the listening loop.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{extract::Extension, routing::get, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::handlers::{
    health_handler, latest_png_handler, metadata_handler, metrics_handler, LATEST_PNG_PATH,
    METADATA_PATH,
};
use crate::state::AppState;

/// Build the router. Every response, errors included, carries
/// `Access-Control-Allow-Origin: *`.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(METADATA_PATH, get(metadata_handler))
        .route("/api/radar/metadata", get(metadata_handler))
        .route(LATEST_PNG_PATH, get(latest_png_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(Extension(state))
}

pub async fn run_server(state: Arc<AppState>, addr: SocketAddr) -> anyhow::Result<()> {
    let app = create_router(state);

    info!(addr = %addr, "Radar API listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
