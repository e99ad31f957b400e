//! Model ↔ domain conversions.

use chrono::{DateTime, Utc};
use sea_orm::prelude::DateTimeWithTimeZone;
use tally_core::accounts::Account;
use tally_core::journal::{EntryTotals, JournalEntry, JournalLine};
use tally_core::period::{AccountingPeriod, PeriodEvent, PeriodKey};
use tally_core::LedgerError;
use tally_shared::types::{AccountId, JournalEntryId, JournalLineId, PeriodId, UserId};

use crate::entities::{accounting_periods, accounts, journal_entries, journal_lines, period_events};

fn utc(value: DateTimeWithTimeZone) -> DateTime<Utc> {
    value.with_timezone(&Utc)
}

/// Builds a domain account from its row.
pub fn account_from_model(model: accounts::Model) -> Account {
    Account {
        id: AccountId::from(model.id),
        code: model.code,
        name: model.name,
        account_type: model.account_type.into(),
        is_header: model.is_header,
        parent_id: model.parent_id.map(AccountId::from),
        balance: model.balance,
        is_active: model.is_active,
    }
}

/// Builds a domain line from its row.
pub fn line_from_model(model: journal_lines::Model) -> JournalLine {
    JournalLine {
        id: JournalLineId::from(model.id),
        line_number: model.line_number.unsigned_abs(),
        account_id: AccountId::from(model.account_id),
        debit: model.debit,
        credit: model.credit,
        description: model.description,
    }
}

/// Builds a domain entry from its header row and line rows.
pub fn entry_from_models(
    model: journal_entries::Model,
    lines: Vec<journal_lines::Model>,
) -> JournalEntry {
    let mut lines: Vec<JournalLine> = lines.into_iter().map(line_from_model).collect();
    lines.sort_by_key(|l| l.line_number);
    JournalEntry {
        id: JournalEntryId::from(model.id),
        entry_number: model.entry_number,
        entry_date: model.entry_date,
        description: model.description,
        source_type: model.source_type.into(),
        reference: model.reference,
        status: model.status.into(),
        totals: EntryTotals {
            total_debit: model.total_debit,
            total_credit: model.total_credit,
            is_balanced: model.is_balanced,
        },
        reversal_of: model.reversal_of.map(JournalEntryId::from),
        reversed_by_entry: model.reversed_by_entry.map(JournalEntryId::from),
        reversal_reason: model.reversal_reason,
        created_by: UserId::from(model.created_by),
        created_at: utc(model.created_at),
        posted_by: model.posted_by.map(UserId::from),
        posted_at: model.posted_at.map(utc),
        reversed_by: model.reversed_by.map(UserId::from),
        reversed_at: model.reversed_at.map(utc),
        lines,
    }
}

/// Builds a domain period key from a row.
pub fn period_key(model: &accounting_periods::Model) -> Result<PeriodKey, LedgerError> {
    PeriodKey::new(model.year, model.month.unsigned_abs())
}

/// Builds a domain period from its row and audit events.
pub fn period_from_models(
    model: accounting_periods::Model,
    events: Vec<period_events::Model>,
) -> Result<AccountingPeriod, LedgerError> {
    let mut events = events;
    events.sort_by_key(|e| e.created_at);
    Ok(AccountingPeriod {
        id: PeriodId::from(model.id),
        key: period_key(&model)?,
        status: model.status.into(),
        closed_by: model.closed_by.map(UserId::from),
        closed_at: model.closed_at.map(utc),
        locked_by: model.locked_by.map(UserId::from),
        locked_at: model.locked_at.map(utc),
        closing_entry_id: model.closing_entry_id.map(JournalEntryId::from),
        created_at: utc(model.created_at),
        events: events
            .into_iter()
            .map(|e| PeriodEvent {
                action: e.action.into(),
                actor: UserId::from(e.actor_id),
                reason: e.reason,
                at: utc(e.created_at),
            })
            .collect(),
    })
}
