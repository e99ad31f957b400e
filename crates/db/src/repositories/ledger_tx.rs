//! Transaction building blocks shared by the ledger repositories.
//!
//! Lock order is always: period rows (by year, month), then journal entry
//! rows, then account rows by id. Every writer follows it, so concurrent
//! writers queue on the same rows instead of deadlocking.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction,
    DbBackend, DbErr, EntityTrait, IsolationLevel, QueryFilter, QueryOrder, QuerySelect, Set,
    Statement, TransactionTrait,
};
use tally_core::accounts::{Account, ChartOfAccounts};
use tally_core::error::UnavailableReason;
use tally_core::journal::{AccountDelta, JournalEntry, JournalLine, format_entry_number};
use tally_core::period::{AccountingPeriod, PeriodEvent, PeriodKey, PeriodService, PostingWindow};
use tally_core::balance::BalanceService;
use tally_core::{LedgerError, PeriodStatus};
use tally_shared::types::{AccountId, JournalEntryId};
use uuid::Uuid;

use super::convert::{account_from_model, entry_from_models, period_from_models};
use super::error::RepoError;
use crate::entities::{
    accounting_periods, accounts, journal_entries, journal_lines, period_events,
    sea_orm_active_enums::{EntryStatus, PeriodStatus as DbPeriodStatus},
};

/// Opens a SERIALIZABLE transaction.
pub async fn begin(db: &DatabaseConnection) -> Result<DatabaseTransaction, DbErr> {
    db.begin_with_config(Some(IsolationLevel::Serializable), None)
        .await
}

// ========== Periods ==========

/// Reads a period row with `FOR UPDATE`.
pub async fn lock_period<C: ConnectionTrait>(
    conn: &C,
    key: PeriodKey,
) -> Result<Option<accounting_periods::Model>, DbErr> {
    accounting_periods::Entity::find()
        .filter(accounting_periods::Column::Year.eq(key.year()))
        .filter(accounting_periods::Column::Month.eq(key.month().cast_signed()))
        .lock_exclusive()
        .one(conn)
        .await
}

/// Reads a period row without locking.
pub async fn find_period<C: ConnectionTrait>(
    conn: &C,
    key: PeriodKey,
) -> Result<Option<accounting_periods::Model>, DbErr> {
    accounting_periods::Entity::find()
        .filter(accounting_periods::Column::Year.eq(key.year()))
        .filter(accounting_periods::Column::Month.eq(key.month().cast_signed()))
        .one(conn)
        .await
}

/// Loads a period with its audit events.
pub async fn load_period<C: ConnectionTrait>(
    conn: &C,
    model: accounting_periods::Model,
) -> Result<AccountingPeriod, RepoError> {
    let events = period_events::Entity::find()
        .filter(period_events::Column::PeriodId.eq(model.id))
        .order_by_asc(period_events::Column::CreatedAt)
        .all(conn)
        .await?;
    Ok(period_from_models(model, events)?)
}

/// Status an ordinary posting dated `date` meets, given the (locked) period row.
///
/// An existing row reports its own status; the window only gates creating
/// a missing period.
pub fn posting_status(
    period: Option<&accounting_periods::Model>,
    window: &PostingWindow,
    date: NaiveDate,
    today: NaiveDate,
) -> Result<PeriodStatus, LedgerError> {
    match period {
        Some(p) => Ok(p.status.into()),
        None => {
            window.check(date, today)?;
            Ok(PeriodStatus::Open)
        }
    }
}

/// Rejects an ordinary posting unless its period accepts postings.
pub fn posting_gate(
    period: Option<&accounting_periods::Model>,
    window: &PostingWindow,
    date: NaiveDate,
    today: NaiveDate,
) -> Result<PeriodKey, LedgerError> {
    let key = PeriodKey::from_date(date);
    let status = posting_status(period, window, date, today)?;
    PeriodService::require_open(key, status)?;
    Ok(key)
}

/// Returns the period row, inserting an OPEN one if it is missing.
///
/// A concurrent insert of the same period is absorbed by the unique key.
pub async fn ensure_period_row(
    txn: &DatabaseTransaction,
    key: PeriodKey,
    now: DateTime<Utc>,
) -> Result<accounting_periods::Model, RepoError> {
    if let Some(existing) = lock_period(txn, key).await? {
        return Ok(existing);
    }
    let period = AccountingPeriod::open(key, now);
    let row = accounting_periods::ActiveModel {
        id: Set(period.id.into_inner()),
        year: Set(key.year()),
        month: Set(key.month().cast_signed()),
        status: Set(DbPeriodStatus::Open),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
        ..Default::default()
    };
    accounting_periods::Entity::insert(row)
        .on_conflict(
            OnConflict::columns([
                accounting_periods::Column::Year,
                accounting_periods::Column::Month,
            ])
            .do_nothing()
            .to_owned(),
        )
        .exec_without_returning(txn)
        .await?;
    lock_period(txn, key)
        .await?
        .ok_or(LedgerError::PeriodNotFound(key).into())
}

/// Writes a period's new state and appends its latest audit event.
pub async fn persist_transition(
    txn: &DatabaseTransaction,
    period: &AccountingPeriod,
    now: DateTime<Utc>,
) -> Result<(), RepoError> {
    accounting_periods::ActiveModel {
        id: Set(period.id.into_inner()),
        status: Set(period.status.into()),
        closed_by: Set(period.closed_by.map(|u| u.into_inner())),
        closed_at: Set(period.closed_at.map(Into::into)),
        locked_by: Set(period.locked_by.map(|u| u.into_inner())),
        locked_at: Set(period.locked_at.map(Into::into)),
        closing_entry_id: Set(period.closing_entry_id.map(JournalEntryId::into_inner)),
        updated_at: Set(now.into()),
        ..Default::default()
    }
    .update(txn)
    .await?;

    if let Some(event) = period.events.last() {
        insert_event(txn, period, event).await?;
    }
    Ok(())
}

async fn insert_event(
    txn: &DatabaseTransaction,
    period: &AccountingPeriod,
    event: &PeriodEvent,
) -> Result<(), DbErr> {
    period_events::ActiveModel {
        id: Set(Uuid::now_v7()),
        period_id: Set(period.id.into_inner()),
        action: Set(event.action.into()),
        actor_id: Set(event.actor.into_inner()),
        reason: Set(event.reason.clone()),
        created_at: Set(event.at.into()),
    }
    .insert(txn)
    .await?;
    Ok(())
}

// ========== Accounts ==========

/// Loads the whole chart.
pub async fn load_chart<C: ConnectionTrait>(conn: &C) -> Result<ChartOfAccounts, RepoError> {
    let accounts = accounts::Entity::find()
        .order_by_asc(accounts::Column::Code)
        .all(conn)
        .await?
        .into_iter()
        .map(account_from_model)
        .collect();
    Ok(ChartOfAccounts::new(accounts)?)
}

/// Locks account rows in id order and returns them keyed by id.
///
/// Missing ids are reported as `AccountUnavailable`.
pub async fn lock_accounts(
    txn: &DatabaseTransaction,
    ids: impl IntoIterator<Item = AccountId>,
) -> Result<HashMap<AccountId, Account>, RepoError> {
    let ids: BTreeSet<AccountId> = ids.into_iter().collect();
    let rows = accounts::Entity::find()
        .filter(accounts::Column::Id.is_in(ids.iter().map(|id| id.into_inner())))
        .order_by_asc(accounts::Column::Id)
        .lock_exclusive()
        .all(txn)
        .await?;
    let found: HashMap<AccountId, Account> = rows
        .into_iter()
        .map(account_from_model)
        .map(|a| (a.id, a))
        .collect();
    if let Some(missing) = ids.iter().find(|id| !found.contains_key(id)) {
        return Err(LedgerError::AccountUnavailable {
            account_id: *missing,
            reason: UnavailableReason::NotFound,
        }
        .into());
    }
    Ok(found)
}

/// Looks up a locked account that must accept postings.
pub fn require_postable(
    locked: &HashMap<AccountId, Account>,
    id: AccountId,
) -> Result<(), LedgerError> {
    locked
        .get(&id)
        .ok_or(LedgerError::AccountUnavailable {
            account_id: id,
            reason: UnavailableReason::NotFound,
        })?
        .require_postable()
}

/// Applies per-account deltas to locked accounts and writes the new balances.
pub async fn apply_deltas(
    txn: &DatabaseTransaction,
    locked: &mut HashMap<AccountId, Account>,
    deltas: &[AccountDelta],
    now: DateTime<Utc>,
) -> Result<(), RepoError> {
    for delta in deltas {
        let account = locked.get_mut(&delta.account_id).ok_or(LedgerError::AccountUnavailable {
            account_id: delta.account_id,
            reason: UnavailableReason::NotFound,
        })?;
        account.balance = BalanceService::apply_delta(
            account.balance,
            account.normal_balance(),
            delta.debit,
            delta.credit,
        );
        write_balance(txn, account.id, account.balance, now).await?;
    }
    Ok(())
}

/// Overwrites one stored balance.
pub async fn write_balance<C: ConnectionTrait>(
    conn: &C,
    id: AccountId,
    balance: Decimal,
    now: DateTime<Utc>,
) -> Result<(), DbErr> {
    accounts::ActiveModel {
        id: Set(id.into_inner()),
        balance: Set(balance),
        updated_at: Set(now.into()),
        ..Default::default()
    }
    .update(conn)
    .await?;
    Ok(())
}

/// `(debit, credit)` totals per account over lines of POSTED and REVERSED
/// entries, optionally only those dated on or before `through`.
pub async fn line_totals<C: ConnectionTrait>(
    conn: &C,
    through: Option<NaiveDate>,
) -> Result<HashMap<AccountId, (Decimal, Decimal)>, DbErr> {
    let rows = conn
        .query_all(Statement::from_sql_and_values(
            DbBackend::Postgres,
            LINE_TOTALS_SQL,
            [through.into()],
        ))
        .await?;
    let mut totals = HashMap::with_capacity(rows.len());
    for row in rows {
        let account_id: Uuid = row.try_get("", "account_id")?;
        let debit: Decimal = row.try_get("", "debit")?;
        let credit: Decimal = row.try_get("", "credit")?;
        totals.insert(AccountId::from(account_id), (debit, credit));
    }
    Ok(totals)
}

const LINE_TOTALS_SQL: &str = r"
SELECT l.account_id,
       COALESCE(SUM(l.debit), 0) AS debit,
       COALESCE(SUM(l.credit), 0) AS credit
FROM journal_lines l
JOIN journal_entries e ON e.id = l.entry_id
WHERE e.status IN ('POSTED', 'REVERSED')
  AND ($1::date IS NULL OR e.entry_date <= $1::date)
GROUP BY l.account_id
";

/// Balance of `account` implied by `totals`; headers imply nothing.
pub fn implied_balance(
    account: &Account,
    totals: &HashMap<AccountId, (Decimal, Decimal)>,
) -> Decimal {
    if account.is_header {
        return Decimal::ZERO;
    }
    totals
        .get(&account.id)
        .map_or(Decimal::ZERO, |&(debit, credit)| {
            account.normal_balance().balance_change(debit, credit)
        })
}

// ========== Entries ==========

/// Allocates the next `JE-YYYY-NNNNNN` number for `year`.
pub async fn next_entry_number(txn: &DatabaseTransaction, year: i32) -> Result<String, RepoError> {
    let row = txn
        .query_one(Statement::from_sql_and_values(
            DbBackend::Postgres,
            NEXT_SEQUENCE_SQL,
            [year.into()],
        ))
        .await?
        .ok_or_else(|| LedgerError::Internal("entry sequence returned no row".to_string()))?;
    let value: i64 = row.try_get("", "last_value")?;
    Ok(format_entry_number(year, value.unsigned_abs()))
}

const NEXT_SEQUENCE_SQL: &str = r"
INSERT INTO journal_entry_sequences (year, last_value)
VALUES ($1, 1)
ON CONFLICT (year) DO UPDATE SET last_value = journal_entry_sequences.last_value + 1
RETURNING last_value
";

/// Inserts an entry header and its lines.
pub async fn insert_entry(txn: &DatabaseTransaction, entry: &JournalEntry) -> Result<(), DbErr> {
    journal_entries::ActiveModel {
        id: Set(entry.id.into_inner()),
        entry_number: Set(entry.entry_number.clone()),
        entry_date: Set(entry.entry_date),
        description: Set(entry.description.clone()),
        source_type: Set(entry.source_type.into()),
        reference: Set(entry.reference.clone()),
        status: Set(entry.status.into()),
        total_debit: Set(entry.totals.total_debit),
        total_credit: Set(entry.totals.total_credit),
        is_balanced: Set(entry.totals.is_balanced),
        reversal_of: Set(entry.reversal_of.map(JournalEntryId::into_inner)),
        reversed_by_entry: Set(entry.reversed_by_entry.map(JournalEntryId::into_inner)),
        reversal_reason: Set(entry.reversal_reason.clone()),
        created_by: Set(entry.created_by.into_inner()),
        created_at: Set(entry.created_at.into()),
        posted_by: Set(entry.posted_by.map(|u| u.into_inner())),
        posted_at: Set(entry.posted_at.map(Into::into)),
        reversed_by: Set(entry.reversed_by.map(|u| u.into_inner())),
        reversed_at: Set(entry.reversed_at.map(Into::into)),
        updated_at: Set(entry.created_at.into()),
    }
    .insert(txn)
    .await?;
    insert_lines(txn, entry.id, &entry.lines).await
}

/// Inserts lines for an entry.
pub async fn insert_lines(
    txn: &DatabaseTransaction,
    entry_id: JournalEntryId,
    lines: &[JournalLine],
) -> Result<(), DbErr> {
    if lines.is_empty() {
        return Ok(());
    }
    let rows = lines.iter().map(|line| journal_lines::ActiveModel {
        id: Set(line.id.into_inner()),
        entry_id: Set(entry_id.into_inner()),
        line_number: Set(line.line_number.cast_signed()),
        account_id: Set(line.account_id.into_inner()),
        debit: Set(line.debit),
        credit: Set(line.credit),
        description: Set(line.description.clone()),
    });
    journal_lines::Entity::insert_many(rows)
        .exec_without_returning(txn)
        .await?;
    Ok(())
}

/// Reads an entry header with `FOR UPDATE`, then its lines.
pub async fn lock_entry(
    txn: &DatabaseTransaction,
    id: JournalEntryId,
) -> Result<JournalEntry, RepoError> {
    let model = journal_entries::Entity::find_by_id(id.into_inner())
        .lock_exclusive()
        .one(txn)
        .await?
        .ok_or(LedgerError::EntryNotFound(id))?;
    let lines = entry_lines(txn, &[model.id]).await?;
    Ok(entry_from_models(model, lines.into_values().flatten().collect()))
}

/// Reads an entry without locking.
pub async fn load_entry<C: ConnectionTrait>(
    conn: &C,
    id: JournalEntryId,
) -> Result<JournalEntry, RepoError> {
    let model = journal_entries::Entity::find_by_id(id.into_inner())
        .one(conn)
        .await?
        .ok_or(LedgerError::EntryNotFound(id))?;
    let lines = entry_lines(conn, &[model.id]).await?;
    Ok(entry_from_models(model, lines.into_values().flatten().collect()))
}

/// Lines of several entries, grouped by entry id.
pub async fn entry_lines<C: ConnectionTrait>(
    conn: &C,
    entry_ids: &[Uuid],
) -> Result<HashMap<Uuid, Vec<journal_lines::Model>>, DbErr> {
    let mut grouped: HashMap<Uuid, Vec<journal_lines::Model>> = HashMap::new();
    if entry_ids.is_empty() {
        return Ok(grouped);
    }
    let lines = journal_lines::Entity::find()
        .filter(journal_lines::Column::EntryId.is_in(entry_ids.iter().copied()))
        .order_by_asc(journal_lines::Column::LineNumber)
        .all(conn)
        .await?;
    for line in lines {
        grouped.entry(line.entry_id).or_default().push(line);
    }
    Ok(grouped)
}

/// Entries dated inside `key`, with lines.
pub async fn entries_in_period<C: ConnectionTrait>(
    conn: &C,
    key: PeriodKey,
    status: Option<EntryStatus>,
) -> Result<Vec<JournalEntry>, DbErr> {
    let mut query = journal_entries::Entity::find()
        .filter(journal_entries::Column::EntryDate.gte(key.first_day()))
        .filter(journal_entries::Column::EntryDate.lte(key.last_day()));
    if let Some(status) = status {
        query = query.filter(journal_entries::Column::Status.eq(status));
    }
    let models = query
        .order_by_asc(journal_entries::Column::EntryNumber)
        .all(conn)
        .await?;
    let ids: Vec<Uuid> = models.iter().map(|m| m.id).collect();
    let mut lines = entry_lines(conn, &ids).await?;
    Ok(models
        .into_iter()
        .map(|m| {
            let own = lines.remove(&m.id).unwrap_or_default();
            entry_from_models(m, own)
        })
        .collect())
}

/// Marks an entry POSTED.
pub async fn mark_posted(
    txn: &DatabaseTransaction,
    entry: &JournalEntry,
    now: DateTime<Utc>,
) -> Result<(), DbErr> {
    journal_entries::ActiveModel {
        id: Set(entry.id.into_inner()),
        status: Set(EntryStatus::Posted),
        total_debit: Set(entry.totals.total_debit),
        total_credit: Set(entry.totals.total_credit),
        is_balanced: Set(entry.totals.is_balanced),
        posted_by: Set(entry.posted_by.map(|u| u.into_inner())),
        posted_at: Set(entry.posted_at.map(Into::into)),
        updated_at: Set(now.into()),
        ..Default::default()
    }
    .update(txn)
    .await?;
    Ok(())
}

/// Marks an entry REVERSED by `entry.reversed_by_entry`.
pub async fn mark_reversed(
    txn: &DatabaseTransaction,
    entry: &JournalEntry,
    now: DateTime<Utc>,
) -> Result<(), DbErr> {
    journal_entries::ActiveModel {
        id: Set(entry.id.into_inner()),
        status: Set(EntryStatus::Reversed),
        reversed_by_entry: Set(entry.reversed_by_entry.map(JournalEntryId::into_inner)),
        reversal_reason: Set(entry.reversal_reason.clone()),
        reversed_by: Set(entry.reversed_by.map(|u| u.into_inner())),
        reversed_at: Set(entry.reversed_at.map(Into::into)),
        updated_at: Set(now.into()),
        ..Default::default()
    }
    .update(txn)
    .await?;
    Ok(())
}
