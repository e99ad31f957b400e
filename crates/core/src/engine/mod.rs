//! In-memory ledger engine.
//!
//! `LedgerEngine` owns a chart of accounts, the journal and the period table,
//! and drives them through the journal, balance, period and health rules.
//! Every operation validates completely before it mutates anything, so a
//! rejected call leaves the engine exactly as it was.

#[cfg(test)]
mod props;

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tally_shared::config::{HealthCheckConfig, LedgerConfig};
use tally_shared::types::{AccountId, JournalEntryId};

use crate::accounts::{Account, ChartOfAccounts};
use crate::auth::{Action, Actor};
use crate::balance::{
    BalanceService, GlBalance, ReconciliationReport, SubledgerBalance, reconcile_subledger,
};
use crate::error::{LedgerError, UnavailableReason};
use crate::health::{AccountSnapshot, EquationReport, HealingResult, check_equation, plan_heal};
use crate::journal::{
    AccountDelta, DraftInput, EntryStatus, JournalEntry, JournalLine, JournalService, LineInput,
    PreparedDraft, PreparedLine, ReversalService, SourceType, format_entry_number,
};
use crate::period::{
    AccountClosure, AccountingPeriod, ClosingCandidate, ClosingPreview, ClosingService,
    DraftWarning, PeriodAction, PeriodKey, PeriodService, PeriodStatus, PeriodStatusCounts,
    PeriodSummary, PostingWindow,
};

/// Engine policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Code of the account receiving net income on close.
    pub retained_earnings_code: String,
    /// Posting window around today.
    pub window: PostingWindow,
    /// Discrepancy count above which reconciliation reports ERROR.
    pub alert_threshold: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retained_earnings_code: "3201".to_string(),
            window: PostingWindow::default(),
            alert_threshold: 3,
        }
    }
}

impl From<&LedgerConfig> for EngineConfig {
    fn from(config: &LedgerConfig) -> Self {
        Self {
            retained_earnings_code: config.retained_earnings_code.clone(),
            window: PostingWindow::new(config.max_past_years, config.max_future_days),
            ..Self::default()
        }
    }
}

impl EngineConfig {
    /// Takes the alert threshold from the health settings.
    #[must_use]
    pub fn with_health(mut self, health: &HealthCheckConfig) -> Self {
        self.alert_threshold = health.alert_threshold;
        self
    }
}

/// A reversed entry and its compensating entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReversalOutcome {
    /// The original, now REVERSED.
    pub original: JournalEntry,
    /// The compensating entry, POSTED.
    pub reversal: JournalEntry,
}

/// Result of a successful close.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CloseOutcome {
    /// The period, now CLOSED.
    pub period: AccountingPeriod,
    /// The posted closing entry, if anything needed closing.
    pub closing_entry: Option<JournalEntry>,
    /// Revenue closed.
    pub total_revenue: Decimal,
    /// Expense closed.
    pub total_expense: Decimal,
    /// Net income moved to retained earnings.
    pub net_income: Decimal,
    /// Accounts zeroed.
    pub closed_accounts: Vec<AccountClosure>,
}

/// In-memory double-entry ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEngine {
    config: EngineConfig,
    chart: ChartOfAccounts,
    entries: BTreeMap<JournalEntryId, JournalEntry>,
    periods: BTreeMap<PeriodKey, AccountingPeriod>,
    sequences: BTreeMap<i32, u64>,
}

impl LedgerEngine {
    /// Creates an engine over `chart` with an empty journal.
    #[must_use]
    pub fn new(chart: ChartOfAccounts, config: EngineConfig) -> Self {
        Self {
            config,
            chart,
            entries: BTreeMap::new(),
            periods: BTreeMap::new(),
            sequences: BTreeMap::new(),
        }
    }

    // ========== Accessors ==========

    /// Engine policy.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The chart with current stored balances.
    #[must_use]
    pub const fn chart(&self) -> &ChartOfAccounts {
        &self.chart
    }

    /// Looks up an active account.
    pub fn account(&self, id: AccountId) -> Result<&Account, LedgerError> {
        self.chart.require_active(id)
    }

    /// Displayed balance; headers roll up their descendants.
    pub fn account_balance(&self, id: AccountId) -> Result<Decimal, LedgerError> {
        self.chart.rollup(id)
    }

    /// Looks up an entry.
    pub fn entry(&self, id: JournalEntryId) -> Result<&JournalEntry, LedgerError> {
        self.entries.get(&id).ok_or(LedgerError::EntryNotFound(id))
    }

    /// All entries, oldest first.
    pub fn entries(&self) -> impl Iterator<Item = &JournalEntry> {
        self.entries.values()
    }

    /// Looks up a period.
    pub fn period(&self, year: i32, month: u32) -> Result<&AccountingPeriod, LedgerError> {
        let key = PeriodKey::new(year, month)?;
        self.periods.get(&key).ok_or(LedgerError::PeriodNotFound(key))
    }

    /// All periods in chronological order.
    pub fn periods(&self) -> impl Iterator<Item = &AccountingPeriod> {
        self.periods.values()
    }

    // ========== Period Manager ==========

    /// Returns the period for `date`, creating it OPEN if it does not exist
    /// and `date` lies inside the posting window.
    pub fn ensure_period(
        &mut self,
        date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<&AccountingPeriod, LedgerError> {
        let key = PeriodKey::from_date(date);
        if !self.periods.contains_key(&key) {
            self.config.window.check(date, now.date_naive())?;
            self.periods.insert(key, AccountingPeriod::open(key, now));
        }
        self.periods.get(&key).ok_or(LedgerError::PeriodNotFound(key))
    }

    /// Status an ordinary posting dated `date` would meet.
    ///
    /// An existing period reports its own status. The window only applies
    /// when the period would have to be created.
    pub fn validate_posting(
        &self,
        date: NaiveDate,
        today: NaiveDate,
    ) -> Result<PeriodStatus, LedgerError> {
        let key = PeriodKey::from_date(date);
        match self.periods.get(&key) {
            Some(period) => Ok(period.status),
            None => {
                self.config.window.check(date, today)?;
                Ok(PeriodStatus::Open)
            }
        }
    }

    fn posting_gate(&self, date: NaiveDate, today: NaiveDate) -> Result<PeriodKey, LedgerError> {
        let key = PeriodKey::from_date(date);
        let status = self.validate_posting(date, today)?;
        PeriodService::require_open(key, status)?;
        Ok(key)
    }

    fn open_period(&mut self, key: PeriodKey, now: DateTime<Utc>) {
        self.periods
            .entry(key)
            .or_insert_with(|| AccountingPeriod::open(key, now));
    }

    /// Existing period, or a new OPEN one if any day of it is in the window.
    fn period_or_new(&self, key: PeriodKey, now: DateTime<Utc>) -> Result<AccountingPeriod, LedgerError> {
        if let Some(period) = self.periods.get(&key) {
            return Ok(period.clone());
        }
        let today = now.date_naive();
        self.config
            .window
            .check(key.last_day(), today)
            .or_else(|_| self.config.window.check(key.first_day(), today))?;
        Ok(AccountingPeriod::open(key, now))
    }

    /// Previews closing a period without changing anything.
    pub fn preview_close(
        &self,
        year: i32,
        month: u32,
        now: DateTime<Utc>,
    ) -> Result<ClosingPreview, LedgerError> {
        let key = PeriodKey::new(year, month)?;
        let status = self.period_or_new(key, now)?.status;
        let retained = self.retained_earnings()?;
        let candidates = self.closing_candidates(key);
        let plan = ClosingService::plan(key, &candidates, retained);
        let drafts = self
            .entries
            .values()
            .filter(|e| e.status == EntryStatus::Draft && key.contains(e.entry_date))
            .map(DraftWarning::from)
            .collect();
        Ok(ClosingService::preview(key, status, &candidates, plan, drafts))
    }

    /// Closes a period: posts the closing entry and flips OPEN → CLOSED.
    ///
    /// Fails with `UnclosedBalances`, leaving everything untouched, if any
    /// revenue or expense account would still carry a balance.
    pub fn close(
        &mut self,
        actor: &Actor,
        year: i32,
        month: u32,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<CloseOutcome, LedgerError> {
        let key = PeriodKey::new(year, month)?;
        let mut period = self.period_or_new(key, now)?;
        let reason = PeriodService::validate_close(actor, &period, reason)?;

        let retained = self.retained_earnings()?;
        let candidates = self.closing_candidates(key);
        let plan = ClosingService::plan(key, &candidates, retained);
        ClosingService::ensure_closed(key, &ClosingService::project(&candidates, &plan))?;

        let prepared = if plan.is_empty() {
            None
        } else {
            let prepared = self.prepare_lines(&format!("Closing entry for {key}"), &plan.lines)?;
            JournalService::require_balanced(prepared.totals)?;
            Some(prepared)
        };

        let closing_entry = match prepared {
            Some(prepared) => Some(self.insert_posted(
                prepared,
                key.last_day(),
                SourceType::Closing,
                Some(format!("CLOSE-{key}")),
                None,
                actor,
                now,
            )?),
            None => None,
        };

        period.closing_entry_id = closing_entry.as_ref().map(|e| e.id);
        PeriodService::apply(&mut period, PeriodAction::Close, actor, Some(reason), now);
        self.periods.insert(key, period.clone());

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
    pub fn reopen(
        &mut self,
        actor: &Actor,
        year: i32,
        month: u32,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<AccountingPeriod, LedgerError> {
        let key = PeriodKey::new(year, month)?;
        let period = self.periods.get_mut(&key).ok_or(LedgerError::PeriodNotFound(key))?;
        let reason = PeriodService::validate_reopen(actor, period, reason)?;
        PeriodService::apply(period, PeriodAction::Reopen, actor, Some(reason), now);
        Ok(period.clone())
    }

    /// Locks a CLOSED period permanently.
    pub fn lock(
        &mut self,
        actor: &Actor,
        year: i32,
        month: u32,
        now: DateTime<Utc>,
    ) -> Result<AccountingPeriod, LedgerError> {
        let key = PeriodKey::new(year, month)?;
        let period = self.periods.get_mut(&key).ok_or(LedgerError::PeriodNotFound(key))?;
        PeriodService::validate_lock(actor, period)?;
        PeriodService::apply(period, PeriodAction::Lock, actor, None, now);
        Ok(period.clone())
    }

    /// Journal statistics for entries dated in a period.
    pub fn period_summary(&self, year: i32, month: u32) -> Result<PeriodSummary, LedgerError> {
        let key = PeriodKey::new(year, month)?;
        Ok(PeriodSummary::from_entries(
            self.entries.values().filter(|e| key.contains(e.entry_date)),
        ))
    }

    /// Number of periods in each status.
    #[must_use]
    pub fn period_status_counts(&self) -> PeriodStatusCounts {
        PeriodStatusCounts::from_statuses(self.periods.values().map(|p| p.status))
    }

    fn retained_earnings(&self) -> Result<&Account, LedgerError> {
        let code = &self.config.retained_earnings_code;
        ClosingService::require_retained_earnings(self.chart.find_by_code(code), code)
    }

    fn closing_candidates(&self, key: PeriodKey) -> Vec<ClosingCandidate> {
        let through = key.last_day();
        self.chart
            .iter()
            .filter(|a| a.account_type.is_temporary())
            .map(|a| ClosingCandidate::from_account(a, self.line_balance(a, Some(through))))
            .collect()
    }

    // ========== Journal Entry Engine ==========

    /// Creates a DRAFT entry.
    pub fn create_draft(
        &mut self,
        actor: &Actor,
        input: &DraftInput,
        now: DateTime<Utc>,
    ) -> Result<JournalEntry, LedgerError> {
        actor.authorize(Action::DraftEntry)?;
        let prepared =
            JournalService::prepare_draft(input, |id| self.chart.require_postable(id).map(|_| ()))?;

        let entry = JournalEntry {
            id: JournalEntryId::new(),
            entry_number: self.next_entry_number(input.entry_date.year()),
            entry_date: input.entry_date,
            description: prepared.description,
            source_type: input.source_type,
            reference: input.reference.clone(),
            status: EntryStatus::Draft,
            totals: prepared.totals,
            reversal_of: None,
            reversed_by_entry: None,
            reversal_reason: None,
            created_by: actor.user_id,
            created_at: now,
            posted_by: None,
            posted_at: None,
            reversed_by: None,
            reversed_at: None,
            lines: into_lines(prepared.lines),
        };
        self.entries.insert(entry.id, entry.clone());
        Ok(entry)
    }

    /// Replaces the content of a DRAFT entry.
    pub fn update_draft(
        &mut self,
        actor: &Actor,
        id: JournalEntryId,
        input: &DraftInput,
    ) -> Result<JournalEntry, LedgerError> {
        actor.authorize(Action::DraftEntry)?;
        JournalService::validate_can_modify(self.entry(id)?.status)?;
        let prepared =
            JournalService::prepare_draft(input, |a| self.chart.require_postable(a).map(|_| ()))?;

        let entry = self.entries.get_mut(&id).ok_or(LedgerError::EntryNotFound(id))?;
        entry.entry_date = input.entry_date;
        entry.description = prepared.description;
        entry.source_type = input.source_type;
        entry.reference.clone_from(&input.reference);
        entry.totals = prepared.totals;
        entry.lines = into_lines(prepared.lines);
        Ok(entry.clone())
    }

    /// Posts a DRAFT entry and updates every touched balance.
    pub fn post(
        &mut self,
        actor: &Actor,
        id: JournalEntryId,
        now: DateTime<Utc>,
    ) -> Result<JournalEntry, LedgerError> {
        actor.authorize(Action::PostEntry)?;
        let entry = self.entry(id)?;
        let totals = JournalService::check_postable(entry)?;
        for line in &entry.lines {
            self.chart.require_postable(line.account_id)?;
        }
        let key = self.posting_gate(entry.entry_date, now.date_naive())?;
        let deltas = JournalService::balance_deltas(
            entry.lines.iter().map(|l| (l.account_id, l.debit, l.credit)),
        );

        self.open_period(key, now);
        self.apply_deltas(&deltas)?;
        let entry = self.entries.get_mut(&id).ok_or(LedgerError::EntryNotFound(id))?;
        entry.status = EntryStatus::Posted;
        entry.totals = totals;
        entry.posted_by = Some(actor.user_id);
        entry.posted_at = Some(now);
        Ok(entry.clone())
    }

    /// Reverses a POSTED entry with a compensating entry.
    ///
    /// The compensating entry is dated on the original date while that
    /// period still accepts postings, otherwise on `entry_date` (default
    /// today), whose period must be OPEN.
    pub fn reverse(
        &mut self,
        actor: &Actor,
        id: JournalEntryId,
        reason: &str,
        entry_date: Option<NaiveDate>,
        now: DateTime<Utc>,
    ) -> Result<ReversalOutcome, LedgerError> {
        actor.authorize(Action::ReverseEntry)?;
        let today = now.date_naive();
        let original = self.entry(id)?;
        JournalService::validate_can_reverse(original.status)?;

        let original_open = self.posting_gate(original.entry_date, today).is_ok();
        let date = ReversalService::reversal_date(
            original.entry_date,
            original_open,
            entry_date.unwrap_or(today),
        );
        let plan = ReversalService::plan(original, reason, date)?;
        let prepared = self.prepare_lines(&plan.description, &plan.lines)?;
        JournalService::require_balanced(prepared.totals)?;
        let key = self.posting_gate(date, today)?;

        self.open_period(key, now);
        let reversal = self.insert_posted(
            prepared,
            date,
            SourceType::Reversal,
            Some(plan.reference),
            Some(id),
            actor,
            now,
        )?;

        let original = self.entries.get_mut(&id).ok_or(LedgerError::EntryNotFound(id))?;
        original.status = EntryStatus::Reversed;
        original.reversed_by_entry = Some(reversal.id);
        original.reversal_reason = Some(plan.reason);
        original.reversed_by = Some(actor.user_id);
        original.reversed_at = Some(now);

        Ok(ReversalOutcome {
            original: original.clone(),
            reversal,
        })
    }

    /// Deletes a DRAFT entry and its lines.
    pub fn delete(&mut self, actor: &Actor, id: JournalEntryId) -> Result<JournalEntry, LedgerError> {
        actor.authorize(Action::DeleteEntry)?;
        JournalService::validate_can_delete(self.entry(id)?.status)?;
        self.entries.remove(&id).ok_or(LedgerError::EntryNotFound(id))
    }

    fn prepare_lines(
        &self,
        description: &str,
        lines: &[LineInput],
    ) -> Result<PreparedDraft, LedgerError> {
        JournalService::prepare_lines(description, lines, |id| {
            self.chart.require_postable(id).map(|_| ())
        })
    }

    /// Inserts an engine-generated POSTED entry and applies its deltas.
    #[allow(clippy::too_many_arguments)]
    fn insert_posted(
        &mut self,
        prepared: PreparedDraft,
        entry_date: NaiveDate,
        source_type: SourceType,
        reference: Option<String>,
        reversal_of: Option<JournalEntryId>,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<JournalEntry, LedgerError> {
        let deltas = JournalService::balance_deltas(
            prepared.lines.iter().map(|l| (l.account_id, l.debit, l.credit)),
        );
        self.apply_deltas(&deltas)?;

        let entry = JournalEntry {
            id: JournalEntryId::new(),
            entry_number: self.next_entry_number(entry_date.year()),
            entry_date,
            description: prepared.description,
            source_type,
            reference,
            status: EntryStatus::Posted,
            totals: prepared.totals,
            reversal_of,
            reversed_by_entry: None,
            reversal_reason: None,
            created_by: actor.user_id,
            created_at: now,
            posted_by: Some(actor.user_id),
            posted_at: Some(now),
            reversed_by: None,
            reversed_at: None,
            lines: into_lines(prepared.lines),
        };
        self.entries.insert(entry.id, entry.clone());
        Ok(entry)
    }

    fn next_entry_number(&mut self, year: i32) -> String {
        let sequence = self.sequences.entry(year).or_insert(0);
        *sequence += 1;
        format_entry_number(year, *sequence)
    }

    // ========== Balance Aggregator ==========

    fn apply_deltas(&mut self, deltas: &[AccountDelta]) -> Result<(), LedgerError> {
        for delta in deltas {
            let account = self.chart.get(delta.account_id)?;
            let balance = BalanceService::apply_delta(
                account.balance,
                account.normal_balance(),
                delta.debit,
                delta.credit,
            );
            self.chart.set_balance(delta.account_id, balance)?;
        }
        Ok(())
    }

    /// Balance from posted lines, optionally only those dated on or before `through`.
    fn line_balance(&self, account: &Account, through: Option<NaiveDate>) -> Decimal {
        let lines = self
            .entries
            .values()
            .filter(|e| through.is_none_or(|d| e.entry_date <= d))
            .flat_map(|e| {
                e.lines
                    .iter()
                    .filter(|l| l.account_id == account.id)
                    .map(move |l| (e.status, l.debit, l.credit))
            });
        BalanceService::recompute(account.normal_balance(), lines)
    }

    /// Balance an account should hold according to its posted lines.
    pub fn recomputed_balance(&self, id: AccountId) -> Result<Decimal, LedgerError> {
        let account = self.chart.get(id)?;
        if account.is_header {
            return Err(LedgerError::AccountUnavailable {
                account_id: id,
                reason: UnavailableReason::Header,
            });
        }
        Ok(self.line_balance(account, None))
    }

    /// Rewrites an account's stored balance from its posted lines.
    pub fn recompute_account(&mut self, actor: &Actor, id: AccountId) -> Result<Decimal, LedgerError> {
        actor.authorize(Action::RecomputeBalance)?;
        let balance = self.recomputed_balance(id)?;
        self.chart.set_balance(id, balance)?;
        Ok(balance)
    }

    /// Compares subledger snapshots against GL balances recomputed from lines.
    pub fn reconcile_subledger(
        &self,
        snapshots: &[SubledgerBalance],
        now: DateTime<Utc>,
    ) -> Result<ReconciliationReport, LedgerError> {
        reconcile_subledger(
            snapshots,
            |id| {
                let account = self.chart.get(id)?;
                Ok(GlBalance {
                    account_id: id,
                    code: account.code.clone(),
                    name: account.name.clone(),
                    balance: self.recomputed_balance(id)?,
                })
            },
            self.config.alert_threshold,
            now,
        )
    }

    // ========== Balance Health Monitor ==========

    /// Checks the accounting equation over stored balances.
    #[must_use]
    pub fn check_equation(&self, now: DateTime<Utc>) -> EquationReport {
        let snapshots: Vec<AccountSnapshot> = self
            .chart
            .iter()
            .map(|a| AccountSnapshot::new(a, self.line_balance(a, None)))
            .collect();
        check_equation(&snapshots, now)
    }

    /// Applies the whitelisted fixes and re-checks.
    pub fn auto_heal(&mut self, actor: &Actor, now: DateTime<Utc>) -> Result<HealingResult, LedgerError> {
        actor.authorize(Action::AutoHeal)?;
        let before = self.check_equation(now);
        let actions = plan_heal(&before);
        for action in &actions {
            self.chart.set_balance(action.account_id(), action.new_balance())?;
        }
        let after = self.check_equation(now);
        Ok(HealingResult::new(actions, before, after))
    }
}

fn into_lines(lines: Vec<PreparedLine>) -> Vec<JournalLine> {
    lines.into_iter().map(PreparedLine::into_line).collect()
}
