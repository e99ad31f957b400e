//! Repository errors and the serialization-retry loop.

use std::future::Future;
use std::time::Duration;

use sea_orm::{DbErr, RuntimeErr};
use tally_core::LedgerError;
use tally_shared::error::AppError;
use tracing::warn;

/// PostgreSQL `serialization_failure`.
const SQLSTATE_SERIALIZATION_FAILURE: &str = "40001";
/// PostgreSQL `deadlock_detected`.
const SQLSTATE_DEADLOCK_DETECTED: &str = "40P01";

/// Error types for ledger repository operations.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    /// A ledger rule rejected the operation.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

impl RepoError {
    /// Returns true if the whole transaction may be re-run.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Ledger(e) => e.is_retryable(),
            Self::Database(e) => is_serialization_failure(e),
        }
    }

    /// Converts into the ledger taxonomy; database failures become `Database`.
    #[must_use]
    pub fn into_ledger(self) -> LedgerError {
        match self {
            Self::Ledger(e) => e,
            Self::Database(e) => LedgerError::Database(e.to_string()),
        }
    }
}

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::Ledger(e) => e.into(),
            RepoError::Database(e) => Self::Database(e.to_string()),
        }
    }
}

/// Returns true for serialization failures and deadlocks.
#[must_use]
pub fn is_serialization_failure(err: &DbErr) -> bool {
    let code = match err {
        DbErr::Exec(RuntimeErr::SqlxError(sqlx::Error::Database(e)))
        | DbErr::Query(RuntimeErr::SqlxError(sqlx::Error::Database(e)))
        | DbErr::Conn(RuntimeErr::SqlxError(sqlx::Error::Database(e))) => {
            e.code().map(|c| c.into_owned())
        }
        _ => None,
    };
    match code {
        Some(code) => code == SQLSTATE_SERIALIZATION_FAILURE || code == SQLSTATE_DEADLOCK_DETECTED,
        None => err.to_string().contains("could not serialize access"),
    }
}

/// Runs `op` and re-runs it up to `max_retries` more times while it fails
/// with a serialization conflict.
///
/// `op` must open and commit its own transaction, so every attempt starts
/// from a clean snapshot. Exhausting the retries yields
/// `LedgerError::ConcurrencyConflict`.
pub async fn with_retry<T, F, Fut>(max_retries: u32, mut op: F) -> Result<T, RepoError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RepoError>>,
{
    let mut attempts: u32 = 0;
    loop {
        attempts += 1;
        match op().await {
            Err(e) if e.is_retryable() => {
                if attempts > max_retries {
                    warn!(attempts, error = %e, "Giving up after serialization conflicts");
                    return Err(LedgerError::ConcurrencyConflict { attempts }.into());
                }
                warn!(attempts, error = %e, "Serialization conflict, retrying");
                tokio::time::sleep(Duration::from_millis(10 * u64::from(attempts))).await;
            }
            other => return other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn conflict() -> RepoError {
        LedgerError::ConcurrencyConflict { attempts: 1 }.into()
    }

    #[tokio::test]
    async fn test_retry_succeeds_after_conflicts() {
        let calls = AtomicU32::new(0);
        let result = with_retry(3, || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(conflict())
            } else {
                Ok(42)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(2, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(conflict())
        })
        .await;

        assert!(matches!(
            result,
            Err(RepoError::Ledger(LedgerError::ConcurrencyConflict { attempts: 3 }))
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_errors_surface_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(5, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(LedgerError::EmptyEntry.into())
        })
        .await;

        assert!(matches!(result, Err(RepoError::Ledger(LedgerError::EmptyEntry))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_plain_db_errors_are_not_retryable() {
        assert!(!RepoError::Database(DbErr::RecordNotFound("x".into())).is_retryable());
        assert!(is_serialization_failure(&DbErr::Custom(
            "could not serialize access due to concurrent update".into()
        )));
    }
}
