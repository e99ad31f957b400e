//! Repository abstractions for data access.
//!
//! Repositories provide a clean interface for database operations,
//! hiding the `SeaORM` implementation details from the rest of the application.
//! Ledger rules come from `tally_core`; these types only add locking,
//! transactions and persistence around them.

pub mod account;
pub mod balance;
pub mod convert;
pub mod error;
pub mod health;
pub mod journal;
pub mod ledger_tx;
pub mod period;

use std::time::Duration;

use tally_core::EngineConfig;
use tally_shared::config::AppConfig;

pub use account::{AccountRepository, AccountWithBalance, CreateAccountInput};
pub use balance::BalanceRepository;
pub use error::{RepoError, with_retry};
pub use health::{HealthRepository, HealthRun};
pub use journal::{EntryFilter, JournalRepository};
pub use period::PeriodRepository;

/// Runtime policy shared by the ledger repositories.
#[derive(Debug, Clone)]
pub struct LedgerSettings {
    /// Retained earnings code, posting window, alert threshold.
    pub policy: EngineConfig,
    /// Extra attempts on serialization conflicts.
    pub max_retries: u32,
    /// Upper bound for a period close.
    pub close_timeout: Duration,
    /// Upper bound for a health check or auto-heal run.
    pub health_timeout: Duration,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            policy: EngineConfig::default(),
            max_retries: 3,
            close_timeout: Duration::from_secs(60),
            health_timeout: Duration::from_secs(600),
        }
    }
}

impl From<&AppConfig> for LedgerSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            policy: EngineConfig::from(&config.ledger).with_health(&config.health),
            max_retries: config.ledger.max_retries,
            close_timeout: Duration::from_secs(config.ledger.close_timeout_secs),
            health_timeout: Duration::from_secs(config.health.timeout_secs),
        }
    }
}

/// Runs `fut` with an upper bound, mapping expiry to `LedgerError::Timeout`.
pub(crate) async fn bounded<T>(
    operation: &'static str,
    limit: Duration,
    fut: impl std::future::Future<Output = Result<T, RepoError>>,
) -> Result<T, RepoError> {
    tokio::time::timeout(limit, fut).await.unwrap_or_else(|_| {
        Err(tally_core::LedgerError::Timeout {
            operation,
            seconds: limit.as_secs(),
        }
        .into())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_core::LedgerError;

    #[tokio::test]
    async fn test_bounded_passes_through_fast_work() {
        let result = bounded("quick", Duration::from_secs(1), async { Ok::<_, RepoError>(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_bounded_maps_expiry_to_timeout() {
        let result = bounded("close period", Duration::from_millis(1), async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok::<_, RepoError>(())
        })
        .await;

        match result {
            Err(RepoError::Ledger(LedgerError::Timeout { operation, seconds })) => {
                assert_eq!(operation, "close period");
                assert_eq!(seconds, 0);
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_bounded_keeps_inner_errors() {
        let result: Result<(), RepoError> = bounded("close period", Duration::from_secs(1), async {
            Err(LedgerError::DescriptionRequired.into())
        })
        .await;
        assert!(matches!(result, Err(RepoError::Ledger(LedgerError::DescriptionRequired))));
    }
}
