//! Chart of accounts routes.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tally_core::{AccountType, Action};
use tally_db::repositories::CreateAccountInput;
use tally_shared::types::AccountId;
use uuid::Uuid;

use crate::{AppState, error::ApiError, middleware::AuthUser};

/// Creates the account routes (requires auth middleware to be applied externally).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/accounts", get(list_accounts).post(create_account))
        .route("/accounts/{account_id}", get(get_account))
        .route("/accounts/{account_id}/active", patch(set_active))
        .route("/accounts/{account_id}/recompute", post(recompute_balance))
}

/// Query parameters for listing accounts.
#[derive(Debug, Deserialize)]
pub struct ListAccountsQuery {
    /// Filter by account type.
    #[serde(rename = "type")]
    pub account_type: Option<AccountType>,
}

/// Request body for creating an account.
#[derive(Debug, Deserialize)]
pub struct CreateAccountRequest {
    /// Account code (must be unique).
    pub code: String,
    /// Account name.
    pub name: String,
    /// Account type: ASSET, LIABILITY, EQUITY, REVENUE, EXPENSE.
    #[serde(rename = "type")]
    pub account_type: AccountType,
    /// Aggregation-only account (default: false).
    #[serde(default)]
    pub is_header: bool,
    /// Parent account ID for hierarchical structure.
    pub parent_id: Option<Uuid>,
}

/// Request body for toggling an account.
#[derive(Debug, Deserialize)]
pub struct SetActiveRequest {
    /// New activation state.
    pub is_active: bool,
}

async fn list_accounts(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(query): Query<ListAccountsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let accounts = state.accounts().list_accounts(query.account_type).await?;
    Ok(Json(json!({ "data": accounts })))
}

async fn get_account(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(account_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let account = state
        .accounts()
        .get_account(AccountId::from_uuid(account_id))
        .await?;
    Ok(Json(account))
}

async fn create_account(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<CreateAccountRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if !auth.role().can_administer() {
        return Err(ApiError::forbidden(
            "Only admin or owner can change the chart of accounts",
        ));
    }
    if req.code.trim().is_empty() || req.name.trim().is_empty() {
        return Err(ApiError::validation("Account code and name are required"));
    }

    let account = state
        .accounts()
        .create_account(CreateAccountInput {
            code: req.code.trim().to_string(),
            name: req.name.trim().to_string(),
            account_type: req.account_type,
            is_header: req.is_header,
            parent_id: req.parent_id.map(AccountId::from_uuid),
        })
        .await?;
    Ok((StatusCode::CREATED, Json(account)))
}

async fn set_active(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(account_id): Path<Uuid>,
    Json(req): Json<SetActiveRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if !auth.role().can_administer() {
        return Err(ApiError::forbidden(
            "Only admin or owner can change the chart of accounts",
        ));
    }
    let account = state
        .accounts()
        .set_active(AccountId::from_uuid(account_id), req.is_active)
        .await?;
    Ok(Json(account))
}

async fn recompute_balance(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(account_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    auth.require(Action::RecomputeBalance)?;
    let id = AccountId::from_uuid(account_id);
    let balance = state
        .balances()
        .recompute_account(auth.actor(), id, Utc::now())
        .await?;
    Ok(Json(json!({ "account_id": id, "balance": balance })))
}
