//! Journal entry routes: drafts, posting, reversal.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use tally_core::{Action, DraftInput, EntryStatus, SourceType};
use tally_db::repositories::EntryFilter;
use tally_shared::types::{JournalEntryId, PageRequest};
use uuid::Uuid;

use crate::{AppState, error::ApiError, middleware::AuthUser};

/// Creates the journal entry routes (requires auth middleware to be applied externally).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/entries", get(list_entries).post(create_draft))
        .route(
            "/entries/{entry_id}",
            get(get_entry).put(update_draft).delete(delete_draft),
        )
        .route("/entries/{entry_id}/post", post(post_entry))
        .route("/entries/{entry_id}/reverse", post(reverse_entry))
}

/// Query parameters for listing entries.
#[derive(Debug, Deserialize)]
pub struct ListEntriesQuery {
    /// Filter by status.
    pub status: Option<EntryStatus>,
    /// Filter by source.
    pub source_type: Option<SourceType>,
    /// Entries dated on or after.
    pub from: Option<NaiveDate>,
    /// Entries dated on or before.
    pub to: Option<NaiveDate>,
    /// Page number (1-indexed).
    pub page: Option<u32>,
    /// Items per page.
    pub per_page: Option<u32>,
}

/// Request body for reversing an entry.
#[derive(Debug, Deserialize)]
pub struct ReverseRequest {
    /// Why the entry is reversed.
    pub reason: String,
    /// Date for the reversal; defaults to the original date or today.
    pub entry_date: Option<NaiveDate>,
}

async fn list_entries(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(query): Query<ListEntriesQuery>,
) -> Result<impl IntoResponse, ApiError> {
    if let (Some(from), Some(to)) = (query.from, query.to) {
        if from > to {
            return Err(ApiError::validation("'from' must not be after 'to'"));
        }
    }
    let defaults = PageRequest::default();
    let page = PageRequest {
        page: query.page.unwrap_or(defaults.page),
        per_page: query.per_page.unwrap_or(defaults.per_page),
    };
    let filter = EntryFilter {
        status: query.status,
        source_type: query.source_type,
        from: query.from,
        to: query.to,
    };
    let entries = state.journal().list_entries(&filter, page).await?;
    Ok(Json(entries))
}

async fn get_entry(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(entry_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let entry = state
        .journal()
        .get_entry(JournalEntryId::from_uuid(entry_id))
        .await?;
    Ok(Json(entry))
}

async fn create_draft(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(input): Json<DraftInput>,
) -> Result<impl IntoResponse, ApiError> {
    auth.require(Action::DraftEntry)?;
    let entry = state
        .journal()
        .create_draft(auth.actor(), &input, Utc::now())
        .await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

async fn update_draft(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(entry_id): Path<Uuid>,
    Json(input): Json<DraftInput>,
) -> Result<impl IntoResponse, ApiError> {
    auth.require(Action::DraftEntry)?;
    let entry = state
        .journal()
        .update_draft(
            auth.actor(),
            JournalEntryId::from_uuid(entry_id),
            &input,
            Utc::now(),
        )
        .await?;
    Ok(Json(entry))
}

async fn delete_draft(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(entry_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    auth.require(Action::DeleteEntry)?;
    state
        .journal()
        .delete(auth.actor(), JournalEntryId::from_uuid(entry_id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn post_entry(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(entry_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    auth.require(Action::PostEntry)?;
    let entry = state
        .journal()
        .post(auth.actor(), JournalEntryId::from_uuid(entry_id), Utc::now())
        .await?;
    Ok(Json(entry))
}

async fn reverse_entry(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(entry_id): Path<Uuid>,
    Json(req): Json<ReverseRequest>,
) -> Result<impl IntoResponse, ApiError> {
    auth.require(Action::ReverseEntry)?;
    let outcome = state
        .journal()
        .reverse(
            auth.actor(),
            JournalEntryId::from_uuid(entry_id),
            &req.reason,
            req.entry_date,
            Utc::now(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}
