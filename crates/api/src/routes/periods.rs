//! Accounting period routes: lifecycle, closing and statistics.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;
use tally_core::{Action, PeriodKey};

use crate::{AppState, error::ApiError, middleware::AuthUser};

/// Creates the period routes (requires auth middleware to be applied externally).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/periods", get(list_periods))
        .route("/periods/status-counts", get(status_counts))
        .route("/periods/ensure", post(ensure_period))
        .route("/periods/validate", get(validate_posting))
        .route("/periods/{year}/{month}", get(get_period))
        .route("/periods/{year}/{month}/close-preview", get(preview_close))
        .route("/periods/{year}/{month}/close", post(close_period))
        .route("/periods/{year}/{month}/reopen", post(reopen_period))
        .route("/periods/{year}/{month}/lock", post(lock_period))
        .route("/periods/{year}/{month}/summary", get(period_summary))
}

/// Query parameters for listing periods.
#[derive(Debug, Deserialize)]
pub struct ListPeriodsQuery {
    /// Only periods of this year.
    pub year: Option<i32>,
}

/// A date in a request body or query string.
#[derive(Debug, Deserialize)]
pub struct DateRequest {
    /// The date.
    pub date: NaiveDate,
}

/// Request body for close and reopen.
#[derive(Debug, Deserialize)]
pub struct ReasonRequest {
    /// Why the transition is made.
    #[serde(default)]
    pub reason: String,
}

/// Validates the path before any database work.
fn period_key(year: i32, month: u32) -> Result<PeriodKey, ApiError> {
    Ok(PeriodKey::new(year, month)?)
}

async fn list_periods(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(query): Query<ListPeriodsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let periods = state.periods().list_periods(query.year).await?;
    Ok(Json(json!({ "data": periods })))
}

async fn status_counts(
    State(state): State<AppState>,
    _auth: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.periods().status_counts().await?))
}

async fn ensure_period(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<DateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    auth.require(Action::DraftEntry)?;
    let period = state.periods().ensure_period(req.date, Utc::now()).await?;
    Ok(Json(period))
}

async fn validate_posting(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(query): Query<DateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let status = state
        .periods()
        .validate_posting(query.date, Utc::now().date_naive())
        .await?;
    Ok(Json(json!({
        "date": query.date,
        "period": PeriodKey::from_date(query.date).to_string(),
        "status": status,
    })))
}

async fn get_period(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path((year, month)): Path<(i32, u32)>,
) -> Result<impl IntoResponse, ApiError> {
    let key = period_key(year, month)?;
    let period = state.periods().get_period(key.year(), key.month()).await?;
    Ok(Json(period))
}

async fn preview_close(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path((year, month)): Path<(i32, u32)>,
) -> Result<impl IntoResponse, ApiError> {
    let key = period_key(year, month)?;
    let preview = state
        .periods()
        .preview_close(key.year(), key.month(), Utc::now())
        .await?;
    Ok(Json(preview))
}

async fn close_period(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((year, month)): Path<(i32, u32)>,
    Json(req): Json<ReasonRequest>,
) -> Result<impl IntoResponse, ApiError> {
    auth.require(Action::ClosePeriod)?;
    let key = period_key(year, month)?;
    let outcome = state
        .periods()
        .close(auth.actor(), key.year(), key.month(), &req.reason, Utc::now())
        .await?;
    Ok(Json(outcome))
}

async fn reopen_period(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((year, month)): Path<(i32, u32)>,
    Json(req): Json<ReasonRequest>,
) -> Result<impl IntoResponse, ApiError> {
    auth.require(Action::ReopenPeriod)?;
    let key = period_key(year, month)?;
    let period = state
        .periods()
        .reopen(auth.actor(), key.year(), key.month(), &req.reason, Utc::now())
        .await?;
    Ok(Json(period))
}

async fn lock_period(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((year, month)): Path<(i32, u32)>,
) -> Result<impl IntoResponse, ApiError> {
    auth.require(Action::LockPeriod)?;
    let key = period_key(year, month)?;
    let period = state
        .periods()
        .lock(auth.actor(), key.year(), key.month(), Utc::now())
        .await?;
    Ok(Json(period))
}

async fn period_summary(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path((year, month)): Path<(i32, u32)>,
) -> Result<impl IntoResponse, ApiError> {
    let key = period_key(year, month)?;
    let summary = state
        .periods()
        .period_summary(key.year(), key.month())
        .await?;
    Ok(Json(json!({ "period": key.to_string(), "summary": summary })))
}
