//! HTTP API layer with Axum routes and middleware.
//!
//! This crate provides:
//! - REST routes for accounts, journal entries, periods and balance health
//! - JWT authentication middleware and the `AuthUser` extractor
//! - Error responses carrying the ledger's stable error codes

pub mod error;
pub mod middleware;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::http::header::AUTHORIZATION;
use sea_orm::DatabaseConnection;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::sensitive_headers::SetSensitiveRequestHeadersLayer;
use tower_http::trace::TraceLayer;
use tally_db::{
    AccountRepository, BalanceRepository, HealthRepository, JournalRepository, LedgerSettings,
    PeriodRepository,
};
use tally_shared::JwtService;

pub use error::ApiError;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub db: Arc<DatabaseConnection>,
    /// JWT service for token operations.
    pub jwt_service: Arc<JwtService>,
    /// Ledger policy used by every repository.
    pub settings: LedgerSettings,
}

impl AppState {
    /// Account repository over the shared pool.
    #[must_use]
    pub fn accounts(&self) -> AccountRepository {
        AccountRepository::new((*self.db).clone())
    }

    /// Journal repository over the shared pool.
    #[must_use]
    pub fn journal(&self) -> JournalRepository {
        JournalRepository::new((*self.db).clone(), self.settings.clone())
    }

    /// Period repository over the shared pool.
    #[must_use]
    pub fn periods(&self) -> PeriodRepository {
        PeriodRepository::new((*self.db).clone(), self.settings.clone())
    }

    /// Balance repository over the shared pool.
    #[must_use]
    pub fn balances(&self) -> BalanceRepository {
        BalanceRepository::new((*self.db).clone(), self.settings.clone())
    }

    /// Health repository over the shared pool.
    #[must_use]
    pub fn health(&self) -> HealthRepository {
        HealthRepository::new((*self.db).clone(), self.settings.clone())
    }
}

/// Creates the main application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", routes::api_routes_with_state(state.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(SetSensitiveRequestHeadersLayer::new([AUTHORIZATION]))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
