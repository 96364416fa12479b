//! The launcher's own health check server.
//!
//! External liveness checks probe this endpoint to confirm the launcher
//! process itself is up; it shares nothing with the supervision loops.

use std::net::SocketAddr;

use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::info;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Health check server failed to start: port {port}: {reason}")]
    Bind { port: u16, reason: String },

    #[error("Health check server failed: {0}")]
    Serve(String),
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

/// Build the health check router.
///
/// `GET /healthz` returns 200 with `{"status":"ok"}`; other methods get 405.
pub fn router() -> Router {
    Router::new().route("/healthz", get(healthz))
}

async fn healthz() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// Serve the health endpoint on the given port until the process exits.
pub async fn serve_health(port: u16) -> Result<(), ApiError> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await.map_err(|e| ApiError::Bind {
        port,
        reason: e.to_string(),
    })?;

    info!("Starting health check server at port {port}");

    axum::serve(listener, router().into_make_service())
        .await
        .map_err(|e| ApiError::Serve(e.to_string()))
}
