//! Service liveness endpoint.
//!
//! Ledger balance health lives under `/balances/health`; this route only
//! reports whether the process and its database pool respond.

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;

use crate::AppState;

/// Liveness response.
#[derive(Serialize)]
pub struct HealthResponse {
    /// `healthy` or `degraded`.
    pub status: &'static str,
    /// Service version.
    pub version: &'static str,
    /// Whether the database answered a ping.
    pub database: bool,
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = state.db.ping().await.is_ok();
    Json(HealthResponse {
        status: if database { "healthy" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        database,
    })
}

/// Creates the liveness route.
pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
