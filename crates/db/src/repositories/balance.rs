//! Balance repository: recompute and subledger reconciliation.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{DatabaseConnection, EntityTrait, QuerySelect};
use tally_core::auth::{Action, Actor};
use tally_core::balance::{GlBalance, ReconciliationReport, SubledgerBalance, reconcile_subledger};
use tally_core::error::UnavailableReason;
use tally_core::LedgerError;
use tally_shared::types::AccountId;
use tracing::{info, warn};

use super::LedgerSettings;
use super::convert::account_from_model;
use super::error::{RepoError, with_retry};
use super::ledger_tx::{begin, implied_balance, line_totals, load_chart, write_balance};
use crate::entities::accounts;

/// Balance repository.
#[derive(Debug, Clone)]
pub struct BalanceRepository {
    db: DatabaseConnection,
    settings: LedgerSettings,
}

impl BalanceRepository {
    /// Creates a new balance repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection, settings: LedgerSettings) -> Self {
        Self { db, settings }
    }

    /// Balance an account should hold according to its posted lines.
    pub async fn recomputed_balance(&self, id: AccountId) -> Result<Decimal, RepoError> {
        let model = accounts::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await?
            .ok_or(not_found(id))?;
        let account = account_from_model(model);
        if account.is_header {
            return Err(LedgerError::AccountUnavailable {
                account_id: id,
                reason: UnavailableReason::Header,
            }
            .into());
        }
        let totals = line_totals(&self.db, None).await?;
        Ok(implied_balance(&account, &totals))
    }

    /// Rewrites an account's stored balance from its posted lines.
    ///
    /// Returns the new balance.
    pub async fn recompute_account(
        &self,
        actor: &Actor,
        id: AccountId,
        now: DateTime<Utc>,
    ) -> Result<Decimal, RepoError> {
        actor.authorize(Action::RecomputeBalance)?;
        let (previous, balance) = with_retry(self.settings.max_retries, || async {
            let txn = begin(&self.db).await?;
            let model = accounts::Entity::find_by_id(id.into_inner())
                .lock_exclusive()
                .one(&txn)
                .await?
                .ok_or(not_found(id))?;
            let account = account_from_model(model);
            if account.is_header {
                return Err(RepoError::from(LedgerError::AccountUnavailable {
                    account_id: id,
                    reason: UnavailableReason::Header,
                }));
            }
            let totals = line_totals(&txn, None).await?;
            let balance = implied_balance(&account, &totals);
            write_balance(&txn, id, balance, now).await?;
            txn.commit().await?;
            Ok((account.balance, balance))
        })
        .await?;

        if previous == balance {
            info!(account_id = %id, %balance, "Balance recomputed, no drift");
        } else {
            warn!(account_id = %id, %previous, %balance, "Balance drift repaired by recompute");
        }
        Ok(balance)
    }

    /// Compares subledger snapshots against GL balances recomputed from lines.
    pub async fn reconcile_subledger(
        &self,
        snapshots: &[SubledgerBalance],
        now: DateTime<Utc>,
    ) -> Result<ReconciliationReport, RepoError> {
        let chart = load_chart(&self.db).await?;
        let totals = line_totals(&self.db, None).await?;
        let report = reconcile_subledger(
            snapshots,
            |id| {
                let account = chart.get(id)?;
                if account.is_header {
                    return Err(LedgerError::AccountUnavailable {
                        account_id: id,
                        reason: UnavailableReason::Header,
                    });
                }
                Ok(GlBalance {
                    account_id: id,
                    code: account.code.clone(),
                    name: account.name.clone(),
                    balance: implied_balance(account, &totals),
                })
            },
            self.settings.policy.alert_threshold,
            now,
        )?;

        if !report.discrepancies.is_empty() {
            warn!(
                status = ?report.status,
                discrepancies = report.discrepancies.len(),
                max_difference = %report.metrics.max_abs_difference,
                "Subledger reconciliation found discrepancies"
            );
        }
        Ok(report)
    }
}

const fn not_found(account_id: AccountId) -> LedgerError {
    LedgerError::AccountUnavailable {
        account_id,
        reason: UnavailableReason::NotFound,
    }
}
