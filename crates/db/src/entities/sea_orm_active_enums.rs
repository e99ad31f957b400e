//! `SeaORM` active enums for the ledger's Postgres enum types.
//!
//! Each enum mirrors a `tally_core` type one-to-one; the `From` impls
//! below are the only place the two representations meet.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use tally_core::accounts::AccountType as CoreAccountType;
use tally_core::journal::{EntryStatus as CoreEntryStatus, SourceType};
use tally_core::period::{PeriodAction as CorePeriodAction, PeriodStatus as CorePeriodStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "account_type")]
pub enum AccountType {
    #[sea_orm(string_value = "ASSET")]
    Asset,
    #[sea_orm(string_value = "LIABILITY")]
    Liability,
    #[sea_orm(string_value = "EQUITY")]
    Equity,
    #[sea_orm(string_value = "REVENUE")]
    Revenue,
    #[sea_orm(string_value = "EXPENSE")]
    Expense,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "entry_status")]
pub enum EntryStatus {
    #[sea_orm(string_value = "DRAFT")]
    Draft,
    #[sea_orm(string_value = "POSTED")]
    Posted,
    #[sea_orm(string_value = "REVERSED")]
    Reversed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "entry_source")]
pub enum EntrySource {
    #[sea_orm(string_value = "MANUAL")]
    Manual,
    #[sea_orm(string_value = "SALE")]
    Sale,
    #[sea_orm(string_value = "PURCHASE")]
    Purchase,
    #[sea_orm(string_value = "PAYMENT")]
    Payment,
    #[sea_orm(string_value = "EXPENSE")]
    Expense,
    #[sea_orm(string_value = "ASSET")]
    Asset,
    #[sea_orm(string_value = "ADJUSTMENT")]
    Adjustment,
    #[sea_orm(string_value = "CLOSING")]
    Closing,
    #[sea_orm(string_value = "REVERSAL")]
    Reversal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "period_status")]
pub enum PeriodStatus {
    #[sea_orm(string_value = "OPEN")]
    Open,
    #[sea_orm(string_value = "CLOSED")]
    Closed,
    #[sea_orm(string_value = "LOCKED")]
    Locked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "period_action")]
pub enum PeriodAction {
    #[sea_orm(string_value = "CLOSE")]
    Close,
    #[sea_orm(string_value = "REOPEN")]
    Reopen,
    #[sea_orm(string_value = "LOCK")]
    Lock,
}

// ========== Conversions ==========

impl From<AccountType> for CoreAccountType {
    fn from(value: AccountType) -> Self {
        match value {
            AccountType::Asset => Self::Asset,
            AccountType::Liability => Self::Liability,
            AccountType::Equity => Self::Equity,
            AccountType::Revenue => Self::Revenue,
            AccountType::Expense => Self::Expense,
        }
    }
}

impl From<CoreAccountType> for AccountType {
    fn from(value: CoreAccountType) -> Self {
        match value {
            CoreAccountType::Asset => Self::Asset,
            CoreAccountType::Liability => Self::Liability,
            CoreAccountType::Equity => Self::Equity,
            CoreAccountType::Revenue => Self::Revenue,
            CoreAccountType::Expense => Self::Expense,
        }
    }
}

impl From<EntryStatus> for CoreEntryStatus {
    fn from(value: EntryStatus) -> Self {
        match value {
            EntryStatus::Draft => Self::Draft,
            EntryStatus::Posted => Self::Posted,
            EntryStatus::Reversed => Self::Reversed,
        }
    }
}

impl From<CoreEntryStatus> for EntryStatus {
    fn from(value: CoreEntryStatus) -> Self {
        match value {
            CoreEntryStatus::Draft => Self::Draft,
            CoreEntryStatus::Posted => Self::Posted,
            CoreEntryStatus::Reversed => Self::Reversed,
        }
    }
}

impl From<EntrySource> for SourceType {
    fn from(value: EntrySource) -> Self {
        match value {
            EntrySource::Manual => Self::Manual,
            EntrySource::Sale => Self::Sale,
            EntrySource::Purchase => Self::Purchase,
            EntrySource::Payment => Self::Payment,
            EntrySource::Expense => Self::Expense,
            EntrySource::Asset => Self::Asset,
            EntrySource::Adjustment => Self::Adjustment,
            EntrySource::Closing => Self::Closing,
            EntrySource::Reversal => Self::Reversal,
        }
    }
}

impl From<SourceType> for EntrySource {
    fn from(value: SourceType) -> Self {
        match value {
            SourceType::Manual => Self::Manual,
            SourceType::Sale => Self::Sale,
            SourceType::Purchase => Self::Purchase,
            SourceType::Payment => Self::Payment,
            SourceType::Expense => Self::Expense,
            SourceType::Asset => Self::Asset,
            SourceType::Adjustment => Self::Adjustment,
            SourceType::Closing => Self::Closing,
            SourceType::Reversal => Self::Reversal,
        }
    }
}

impl From<PeriodStatus> for CorePeriodStatus {
    fn from(value: PeriodStatus) -> Self {
        match value {
            PeriodStatus::Open => Self::Open,
            PeriodStatus::Closed => Self::Closed,
            PeriodStatus::Locked => Self::Locked,
        }
    }
}

impl From<CorePeriodStatus> for PeriodStatus {
    fn from(value: CorePeriodStatus) -> Self {
        match value {
            CorePeriodStatus::Open => Self::Open,
            CorePeriodStatus::Closed => Self::Closed,
            CorePeriodStatus::Locked => Self::Locked,
        }
    }
}

impl From<PeriodAction> for CorePeriodAction {
    fn from(value: PeriodAction) -> Self {
        match value {
            PeriodAction::Close => Self::Close,
            PeriodAction::Reopen => Self::Reopen,
            PeriodAction::Lock => Self::Lock,
        }
    }
}

impl From<CorePeriodAction> for PeriodAction {
    fn from(value: CorePeriodAction) -> Self {
        match value {
            CorePeriodAction::Close => Self::Close,
            CorePeriodAction::Reopen => Self::Reopen,
            CorePeriodAction::Lock => Self::Lock,
        }
    }
}
