//! Balance health routes: equation check, auto-heal, reconciliation.

use axum::{
    Json, Router,
    extract::State,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;
use serde::Deserialize;
use tally_core::Action;
use tally_core::balance::SubledgerBalance;

use crate::{AppState, error::ApiError, middleware::AuthUser};

/// Creates the balance health routes (requires auth middleware to be applied externally).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/balances/health", get(check_equation))
        .route("/balances/heal", post(auto_heal))
        .route("/balances/reconcile", post(reconcile_subledger))
}

/// Request body for a subledger reconciliation.
#[derive(Debug, Deserialize)]
pub struct ReconcileRequest {
    /// Subledger balances to compare against the GL.
    pub balances: Vec<SubledgerBalance>,
}

async fn check_equation(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    auth.require(Action::RunHealthCheck)?;
    let report = state.health().check_equation(Utc::now()).await?;
    Ok(Json(report))
}

async fn auto_heal(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    auth.require(Action::AutoHeal)?;
    let result = state.health().auto_heal(auth.actor(), Utc::now()).await?;
    Ok(Json(result))
}

async fn reconcile_subledger(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<ReconcileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    auth.require(Action::RunHealthCheck)?;
    let report = state
        .balances()
        .reconcile_subledger(&req.balances, Utc::now())
        .await?;
    Ok(Json(report))
}
