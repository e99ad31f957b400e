//! Balance health repository: equation check and auto-heal.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use tally_core::accounts::{Account, ChartOfAccounts};
use tally_core::auth::{Action, Actor};
use tally_core::health::{
    AccountSnapshot, EquationReport, HealingResult, check_equation, plan_heal,
};
use tally_shared::types::AccountId;
use tracing::{info, warn};

use super::error::{RepoError, with_retry};
use super::ledger_tx::{begin, implied_balance, line_totals, load_chart, lock_accounts, write_balance};
use super::{LedgerSettings, bounded};

/// Outcome of one scheduled health run.
#[derive(Debug, Clone, Serialize)]
pub struct HealthRun {
    /// Equation check result.
    pub report: EquationReport,
    /// Auto-heal result, when enabled and drift was found.
    pub healing: Option<HealingResult>,
}

/// Balance health repository.
#[derive(Debug, Clone)]
pub struct HealthRepository {
    db: DatabaseConnection,
    settings: LedgerSettings,
}

impl HealthRepository {
    /// Creates a new health repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection, settings: LedgerSettings) -> Self {
        Self { db, settings }
    }

    /// Checks the accounting equation over stored balances and compares each
    /// stored balance with the one implied by posted lines.
    pub async fn check_equation(&self, now: DateTime<Utc>) -> Result<EquationReport, RepoError> {
        let report = bounded("balance health check", self.settings.health_timeout, async {
            let chart = load_chart(&self.db).await?;
            let totals = line_totals(&self.db, None).await?;
            Ok(check_equation(&snapshots(chart.iter(), &totals), now))
        })
        .await?;

        if report.is_healthy() {
            info!(difference = %report.difference, "Balance health check passed");
        } else {
            warn!(
                is_valid = report.is_valid,
                difference = %report.difference,
                drift = report.drift.len(),
                "Balance health check found problems"
            );
        }
        Ok(report)
    }

    /// Applies the whitelisted fixes and re-checks, in one transaction.
    pub async fn auto_heal(
        &self,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<HealingResult, RepoError> {
        actor.authorize(Action::AutoHeal)?;
        let result = bounded(
            "balance auto-heal",
            self.settings.health_timeout,
            with_retry(self.settings.max_retries, || self.heal_once(now)),
        )
        .await?;

        for action in &result.actions {
            info!(
                account_id = %action.account_id(),
                new_balance = %action.new_balance(),
                action = ?action,
                "Balance healed"
            );
        }
        if !result.healed {
            warn!(
                remaining = result.remaining_drift.len(),
                difference = %result.after.difference,
                "Auto-heal left problems that need manual review"
            );
        }
        Ok(result)
    }

    async fn heal_once(&self, now: DateTime<Utc>) -> Result<HealingResult, RepoError> {
        let txn = begin(&self.db).await?;
        let chart = load_chart(&txn).await?;
        let mut locked = lock_accounts(&txn, chart.iter().map(|a| a.id)).await?;
        let totals = line_totals(&txn, None).await?;

        let before = check_equation(&snapshots(ordered(&chart, &locked), &totals), now);
        let actions = plan_heal(&before);
        for action in &actions {
            let id = action.account_id();
            write_balance(&txn, id, action.new_balance(), now).await?;
            if let Some(account) = locked.get_mut(&id) {
                account.balance = action.new_balance();
            }
        }
        let after = check_equation(&snapshots(ordered(&chart, &locked), &totals), now);

        txn.commit().await?;
        Ok(HealingResult::new(actions, before, after))
    }

    /// One scheduler tick: check, then heal if enabled and needed.
    pub async fn run_scheduled(
        &self,
        auto_heal: bool,
        now: DateTime<Utc>,
    ) -> Result<HealthRun, RepoError> {
        let report = self.check_equation(now).await?;
        let healing = if auto_heal && !report.is_healthy() {
            Some(self.auto_heal(&Actor::system(), now).await?)
        } else {
            None
        };
        Ok(HealthRun { report, healing })
    }
}

/// Locked accounts in chart (code) order.
fn ordered<'a>(
    chart: &'a ChartOfAccounts,
    locked: &'a HashMap<AccountId, Account>,
) -> impl Iterator<Item = &'a Account> {
    chart.iter().filter_map(|a| locked.get(&a.id))
}

fn snapshots<'a>(
    accounts: impl Iterator<Item = &'a Account>,
    totals: &HashMap<AccountId, (Decimal, Decimal)>,
) -> Vec<AccountSnapshot> {
    accounts
        .map(|a| AccountSnapshot::new(a, implied_balance(a, totals)))
        .collect()
}
