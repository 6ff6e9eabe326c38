//! Status and metrics endpoint served next to the controller.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use scrapefleet_core::controller::ControllerStatus;

use crate::metrics::encode_metrics;

/// State shared with the handlers.
#[derive(Clone)]
pub struct HttpState {
    status: Arc<RwLock<ControllerStatus>>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
}

pub fn create_router(status: Arc<RwLock<ControllerStatus>>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/status", get(controller_status))
        .route("/metrics", get(metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(HttpState { status })
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

async fn controller_status(State(state): State<HttpState>) -> Json<ControllerStatus> {
    Json(state.status.read().await.clone())
}

async fn metrics() -> Response {
    match encode_metrics() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Serve `router` on `addr` until `shutdown` is cancelled.
pub async fn serve(addr: SocketAddr, router: Router, shutdown: CancellationToken) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Status endpoint listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("Status endpoint error")
}
