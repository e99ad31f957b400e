//! Period repository: lifecycle, closing and statistics.
//!
//! A close locks the period row first. Postings lock the same row before
//! touching balances, so they either finish before the close reads the
//! as-of balances or find the period CLOSED afterwards.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect};
use tally_core::auth::{Action, Actor};
use tally_core::journal::{JournalService, PreparedLine, SourceType};
use tally_core::period::{
    AccountingPeriod, ClosingCandidate, ClosingPreview, ClosingService, DraftWarning,
    PeriodAction, PeriodKey, PeriodService, PeriodStatus, PeriodStatusCounts, PeriodSummary,
};
use tally_core::{CloseOutcome, EntryStatus, JournalEntry, LedgerError};
use tally_shared::types::JournalEntryId;
use tracing::info;
use uuid::Uuid;

use super::convert::period_from_models;
use super::error::{RepoError, with_retry};
use super::ledger_tx::{
    apply_deltas, begin, ensure_period_row, entries_in_period, find_period, implied_balance,
    insert_entry, line_totals, load_chart, load_period, lock_accounts, lock_period,
    next_entry_number, persist_transition, posting_status, require_postable,
};
use super::{LedgerSettings, bounded};
use crate::entities::{accounting_periods, period_events, sea_orm_active_enums};

/// Period repository.
#[derive(Debug, Clone)]
pub struct PeriodRepository {
    db: DatabaseConnection,
    settings: LedgerSettings,
}

impl PeriodRepository {
    /// Creates a new period repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection, settings: LedgerSettings) -> Self {
        Self { db, settings }
    }

    /// Gets a period with its audit events.
    pub async fn get_period(&self, year: i32, month: u32) -> Result<AccountingPeriod, RepoError> {
        let key = PeriodKey::new(year, month)?;
        let row = find_period(&self.db, key)
            .await?
            .ok_or(LedgerError::PeriodNotFound(key))?;
        load_period(&self.db, row).await
    }

    /// Lists periods chronologically, optionally for one year.
    pub async fn list_periods(&self, year: Option<i32>) -> Result<Vec<AccountingPeriod>, RepoError> {
        let mut query = accounting_periods::Entity::find();
        if let Some(year) = year {
            query = query.filter(accounting_periods::Column::Year.eq(year));
        }
        let rows = query
            .order_by_asc(accounting_periods::Column::Year)
            .order_by_asc(accounting_periods::Column::Month)
            .all(&self.db)
            .await?;

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let mut events: HashMap<Uuid, Vec<period_events::Model>> = HashMap::new();
        if !ids.is_empty() {
            for event in period_events::Entity::find()
                .filter(period_events::Column::PeriodId.is_in(ids))
                .all(&self.db)
                .await?
            {
                events.entry(event.period_id).or_default().push(event);
            }
        }

        rows.into_iter()
            .map(|row| {
                let own = events.remove(&row.id).unwrap_or_default();
                period_from_models(row, own).map_err(RepoError::from)
            })
            .collect()
    }

    /// Returns the period for `date`, creating it OPEN if it is missing and
    /// `date` lies inside the posting window.
    pub async fn ensure_period(
        &self,
        date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<AccountingPeriod, RepoError> {
        let key = PeriodKey::from_date(date);
        let window = self.settings.policy.window;
        with_retry(self.settings.max_retries, || async {
            let txn = begin(&self.db).await?;
            let row = match lock_period(&txn, key).await? {
                Some(row) => row,
                None => {
                    window.check(date, now.date_naive())?;
                    ensure_period_row(&txn, key, now).await?
                }
            };
            let period = load_period(&txn, row).await?;
            txn.commit().await?;
            Ok(period)
        })
        .await
    }

    /// Status an ordinary posting dated `date` would meet.
    pub async fn validate_posting(
        &self,
        date: NaiveDate,
        today: NaiveDate,
    ) -> Result<PeriodStatus, RepoError> {
        let row = find_period(&self.db, PeriodKey::from_date(date)).await?;
        Ok(posting_status(
            row.as_ref(),
            &self.settings.policy.window,
            date,
            today,
        )?)
    }

    /// Previews closing a period without changing anything.
    pub async fn preview_close(
        &self,
        year: i32,
        month: u32,
        now: DateTime<Utc>,
    ) -> Result<ClosingPreview, RepoError> {
        let key = PeriodKey::new(year, month)?;
        let status = match find_period(&self.db, key).await? {
            Some(row) => row.status.into(),
            None => {
                self.check_new_period(key, now)?;
                PeriodStatus::Open
            }
        };

        let chart = load_chart(&self.db).await?;
        let code = &self.settings.policy.retained_earnings_code;
        let retained = ClosingService::require_retained_earnings(chart.find_by_code(code), code)?;
        let totals = line_totals(&self.db, Some(key.last_day())).await?;
        let candidates: Vec<ClosingCandidate> = chart
            .iter()
            .filter(|a| a.account_type.is_temporary())
            .map(|a| ClosingCandidate::from_account(a, implied_balance(a, &totals)))
            .collect();
        let plan = ClosingService::plan(key, &candidates, retained);

        let drafts = entries_in_period(
            &self.db,
            key,
            Some(sea_orm_active_enums::EntryStatus::Draft),
        )
        .await?
        .iter()
        .map(DraftWarning::from)
        .collect();

        Ok(ClosingService::preview(key, status, &candidates, plan, drafts))
    }

    /// Closes a period: posts the closing entry and flips OPEN → CLOSED.
    ///
    /// Fails with `UnclosedBalances`, leaving everything untouched, if any
    /// revenue or expense account would still carry a balance.
    pub async fn close(
        &self,
        actor: &Actor,
        year: i32,
        month: u32,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<CloseOutcome, RepoError> {
        actor.authorize(Action::ClosePeriod)?;
        let key = PeriodKey::new(year, month)?;
        let outcome = bounded(
            "close period",
            self.settings.close_timeout,
            with_retry(self.settings.max_retries, || self.close_once(actor, key, reason, now)),
        )
        .await?;

        info!(
            period = %key,
            closing_entry = ?outcome.closing_entry.as_ref().map(|e| e.id),
            net_income = %outcome.net_income,
            accounts_closed = outcome.closed_accounts.len(),
            "Period closed"
        );
        Ok(outcome)
    }

    async fn close_once(
        &self,
        actor: &Actor,
        key: PeriodKey,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<CloseOutcome, RepoError> {
        let txn = begin(&self.db).await?;

        let row = match lock_period(&txn, key).await? {
            Some(row) => row,
            None => {
                self.check_new_period(key, now)?;
                ensure_period_row(&txn, key, now).await?
            }
        };
        let mut period = load_period(&txn, row).await?;
        let reason = PeriodService::validate_close(actor, &period, reason)?;

        let chart = load_chart(&txn).await?;
        let code = &self.settings.policy.retained_earnings_code;
        let retained_id =
            ClosingService::require_retained_earnings(chart.find_by_code(code), code)?.id;
        let temporary: Vec<_> = chart
            .iter()
            .filter(|a| a.account_type.is_temporary())
            .map(|a| a.id)
            .collect();
        let mut locked =
            lock_accounts(&txn, temporary.iter().copied().chain([retained_id])).await?;

        let totals = line_totals(&txn, Some(key.last_day())).await?;
        let candidates: Vec<ClosingCandidate> = temporary
            .iter()
            .filter_map(|id| locked.get(id))
            .map(|a| ClosingCandidate::from_account(a, implied_balance(a, &totals)))
            .collect();
        let retained = locked
            .get(&retained_id)
            .ok_or(LedgerError::RetainedEarningsUnavailable {
                code: code.clone(),
            })?;
        let plan = ClosingService::plan(key, &candidates, retained);
        ClosingService::ensure_closed(key, &ClosingService::project(&candidates, &plan))?;

        let closing_entry = if plan.is_empty() {
            None
        } else {
            let prepared = JournalService::prepare_lines(
                &format!("Closing entry for {key}"),
                &plan.lines,
                |id| require_postable(&locked, id),
            )?;
            JournalService::require_balanced(prepared.totals)?;
            let deltas = JournalService::balance_deltas(
                prepared.lines.iter().map(|l| (l.account_id, l.debit, l.credit)),
            );
            apply_deltas(&txn, &mut locked, &deltas, now).await?;

            let entry_date = key.last_day();
            let entry = JournalEntry {
                id: JournalEntryId::new(),
                entry_number: next_entry_number(&txn, key.year()).await?,
                entry_date,
                description: prepared.description,
                source_type: SourceType::Closing,
                reference: Some(format!("CLOSE-{key}")),
                status: EntryStatus::Posted,
                totals: prepared.totals,
                reversal_of: None,
                reversed_by_entry: None,
                reversal_reason: None,
                created_by: actor.user_id,
                created_at: now,
                posted_by: Some(actor.user_id),
                posted_at: Some(now),
                reversed_by: None,
                reversed_at: None,
                lines: prepared.lines.into_iter().map(PreparedLine::into_line).collect(),
            };
            insert_entry(&txn, &entry).await?;
            Some(entry)
        };

        period.closing_entry_id = closing_entry.as_ref().map(|e| e.id);
        PeriodService::apply(&mut period, PeriodAction::Close, actor, Some(reason), now);
        persist_transition(&txn, &period, now).await?;
        txn.commit().await?;

        Ok(CloseOutcome {
            period,
            closing_entry,
            total_revenue: plan.total_revenue,
            total_expense: plan.total_expense,
            net_income: plan.net_income,
            closed_accounts: plan.closed_accounts,
        })
    }

    /// Reopens a CLOSED period. The closing entry stays POSTED.
    pub async fn reopen(
        &self,
        actor: &Actor,
        year: i32,
        month: u32,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<AccountingPeriod, RepoError> {
        actor.authorize(Action::ReopenPeriod)?;
        let key = PeriodKey::new(year, month)?;
        let period = with_retry(self.settings.max_retries, || async {
            let txn = begin(&self.db).await?;
            let row = lock_period(&txn, key)
                .await?
                .ok_or(LedgerError::PeriodNotFound(key))?;
            let mut period = load_period(&txn, row).await?;
            let reason = PeriodService::validate_reopen(actor, &period, reason)?;
            PeriodService::apply(&mut period, PeriodAction::Reopen, actor, Some(reason), now);
            persist_transition(&txn, &period, now).await?;
            txn.commit().await?;
            Ok(period)
        })
        .await?;

        info!(period = %key, actor = %actor.user_id, "Period reopened");
        Ok(period)
    }

    /// Locks a CLOSED period permanently.
    pub async fn lock(
        &self,
        actor: &Actor,
        year: i32,
        month: u32,
        now: DateTime<Utc>,
    ) -> Result<AccountingPeriod, RepoError> {
        actor.authorize(Action::LockPeriod)?;
        let key = PeriodKey::new(year, month)?;
        let period = with_retry(self.settings.max_retries, || async {
            let txn = begin(&self.db).await?;
            let row = lock_period(&txn, key)
                .await?
                .ok_or(LedgerError::PeriodNotFound(key))?;
            let mut period = load_period(&txn, row).await?;
            PeriodService::validate_lock(actor, &period)?;
            PeriodService::apply(&mut period, PeriodAction::Lock, actor, None, now);
            persist_transition(&txn, &period, now).await?;
            txn.commit().await?;
            Ok(period)
        })
        .await?;

        info!(period = %key, actor = %actor.user_id, "Period locked");
        Ok(period)
    }

    /// Journal statistics for entries dated in a period.
    pub async fn period_summary(&self, year: i32, month: u32) -> Result<PeriodSummary, RepoError> {
        let key = PeriodKey::new(year, month)?;
        let entries = entries_in_period(&self.db, key, None).await?;
        Ok(PeriodSummary::from_entries(&entries))
    }

    /// Number of periods in each status.
    pub async fn status_counts(&self) -> Result<PeriodStatusCounts, RepoError> {
        let statuses: Vec<sea_orm_active_enums::PeriodStatus> = accounting_periods::Entity::find()
            .select_only()
            .column(accounting_periods::Column::Status)
            .into_tuple()
            .all(&self.db)
            .await?;
        Ok(PeriodStatusCounts::from_statuses(
            statuses.into_iter().map(PeriodStatus::from),
        ))
    }

    /// A missing period may be created if its first or last day is in the window.
    fn check_new_period(&self, key: PeriodKey, now: DateTime<Utc>) -> Result<(), LedgerError> {
        let window = &self.settings.policy.window;
        let today = now.date_naive();
        window
            .check(key.last_day(), today)
            .or_else(|_| window.check(key.first_day(), today))
    }
}
