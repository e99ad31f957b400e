//! `SeaORM` entities for the ledger schema.

pub mod accounting_periods;
pub mod accounts;
pub mod journal_entries;
pub mod journal_lines;
pub mod period_events;
pub mod sea_orm_active_enums;
