//! Application-wide error types.

use serde_json::Value;
use thiserror::Error;

/// Result type alias using `AppError`.
pub type AppResult<T> = Result<T, AppError>;

/// A domain failure that already knows its HTTP status and stable error code.
///
/// Produced by converting a ledger error; carried through `AppError::Domain`
/// so the HTTP layer can render it without knowing the ledger taxonomy.
#[derive(Debug, Clone, PartialEq)]
pub struct DomainFailure {
    /// HTTP status code.
    pub status_code: u16,
    /// Stable machine-readable code (e.g. `PERIOD_CLOSED`).
    pub error_code: &'static str,
    /// Human-readable message.
    pub message: String,
    /// Structured details (offending period, accounts, ...), or `Value::Null`.
    pub details: Value,
}

/// Application error types.
#[derive(Debug, Error)]
pub enum AppError {
    /// Authentication failed.
    #[error("Authentication failed: {0}")]
    Unauthorized(String),

    /// Access denied.
    #[error("Access denied: {0}")]
    Forbidden(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Validation error.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Ledger rule or policy failure with its own code.
    #[error("{}", .0.message)]
    Domain(DomainFailure),

    /// Operation exceeded its time budget and was cancelled.
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Unauthorized(_) => 401,
            Self::Forbidden(_) => 403,
            Self::NotFound(_) => 404,
            Self::Validation(_) => 400,
            Self::Domain(failure) => failure.status_code,
            Self::Timeout(_) => 504,
            Self::Database(_) | Self::Internal(_) => 500,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Domain(failure) => failure.error_code,
            Self::Timeout(_) => "TIMEOUT",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns structured details for the response body, if any.
    #[must_use]
    pub fn details(&self) -> Option<&Value> {
        match self {
            Self::Domain(failure) if !failure.details.is_null() => Some(&failure.details),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(AppError::Unauthorized(String::new()).status_code(), 401);
        assert_eq!(AppError::Forbidden(String::new()).status_code(), 403);
        assert_eq!(AppError::NotFound(String::new()).status_code(), 404);
        assert_eq!(AppError::Validation(String::new()).status_code(), 400);
        assert_eq!(AppError::Timeout(String::new()).status_code(), 504);
        assert_eq!(AppError::Database(String::new()).status_code(), 500);
        assert_eq!(AppError::Internal(String::new()).status_code(), 500);
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            AppError::Unauthorized(String::new()).error_code(),
            "UNAUTHORIZED"
        );
        assert_eq!(AppError::Forbidden(String::new()).error_code(), "FORBIDDEN");
        assert_eq!(AppError::NotFound(String::new()).error_code(), "NOT_FOUND");
        assert_eq!(
            AppError::Validation(String::new()).error_code(),
            "VALIDATION_ERROR"
        );
        assert_eq!(AppError::Timeout(String::new()).error_code(), "TIMEOUT");
        assert_eq!(
            AppError::Database(String::new()).error_code(),
            "DATABASE_ERROR"
        );
    }

    #[test]
    fn test_domain_failure_passthrough() {
        let err = AppError::Domain(DomainFailure {
            status_code: 409,
            error_code: "PERIOD_CLOSED",
            message: "Accounting period 2026-01 is closed".to_string(),
            details: json!({ "period": "2026-01" }),
        });
        assert_eq!(err.status_code(), 409);
        assert_eq!(err.error_code(), "PERIOD_CLOSED");
        assert_eq!(err.to_string(), "Accounting period 2026-01 is closed");
        assert_eq!(err.details(), Some(&json!({ "period": "2026-01" })));
    }

    #[test]
    fn test_null_details_are_omitted() {
        let err = AppError::Domain(DomainFailure {
            status_code: 400,
            error_code: "EMPTY_ENTRY",
            message: "empty".to_string(),
            details: Value::Null,
        });
        assert!(err.details().is_none());
        assert!(AppError::Internal("x".into()).details().is_none());
    }
}
