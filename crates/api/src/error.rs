//! Error responses.
//!
//! Every failure is rendered as
//! `{"error": CODE, "message": ..., "details": {...}}` with the status
//! code the ledger taxonomy assigns.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Map, Value, json};
use tally_shared::AppError;
use tracing::{error, warn};

/// Handler error wrapping [`AppError`].
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl<E> From<E> for ApiError
where
    E: Into<AppError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

impl ApiError {
    /// 403 with a message.
    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self(AppError::Forbidden(message.into()))
    }

    /// 400 with a message.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self(AppError::Validation(message.into()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            error!(code = self.0.error_code(), error = %self.0, "Request failed");
        } else if status == StatusCode::CONFLICT {
            warn!(code = self.0.error_code(), error = %self.0, "Request rejected");
        }

        // Internal failures never leak their cause.
        let message = match &self.0 {
            AppError::Database(_) | AppError::Internal(_) => "An error occurred".to_string(),
            AppError::Domain(_)
                if status.is_server_error() && status != StatusCode::GATEWAY_TIMEOUT =>
            {
                "An error occurred".to_string()
            }
            other => other.to_string(),
        };

        let mut body = Map::new();
        body.insert("error".to_string(), json!(self.0.error_code()));
        body.insert("message".to_string(), json!(message));
        if let Some(details) = self.0.details() {
            body.insert("details".to_string(), details.clone());
        }
        (status, Json(Value::Object(body))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use tally_core::{LedgerError, PeriodKey};

    async fn body_of(response: Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_ledger_error_keeps_code_and_details() {
        let period = PeriodKey::new(2026, 1).unwrap();
        let response = ApiError::from(LedgerError::PeriodClosed { period }).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let body = body_of(response).await;
        assert_eq!(body["error"], "PERIOD_CLOSED");
        assert!(body["message"].as_str().unwrap().contains("2026-01"));
        assert!(body.get("details").is_some());
    }

    #[tokio::test]
    async fn test_database_error_is_hidden() {
        let response = ApiError(AppError::Database("password=hunter2".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_of(response).await;
        assert_eq!(body["error"], "DATABASE_ERROR");
        assert_eq!(body["message"], "An error occurred");
        assert!(body.get("details").is_none());
    }

    #[tokio::test]
    async fn test_timeout_is_gateway_timeout() {
        let err = LedgerError::Timeout {
            operation: "close period",
            seconds: 60,
        };
        let response = ApiError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
        let body = body_of(response).await;
        assert_eq!(body["error"], "OPERATION_TIMEOUT");
    }
}
