//! Ledger error types.
//!
//! Every failure the engine can produce is a `LedgerError` variant with a
//! stable machine-readable code. Variants are grouped into the coarse
//! [`ErrorKind`] taxonomy that callers branch on.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::{Value, json};
use tally_shared::error::{AppError, DomainFailure};
use tally_shared::types::{AccountId, JournalEntryId};
use thiserror::Error;

use crate::accounts::AccountType;
use crate::auth::{Action, UserRole};
use crate::journal::SourceType;
use crate::period::PeriodKey;

/// Coarse classification of ledger failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Bad input shape; rejected before any write.
    Validation,
    /// Target period is closed.
    PeriodClosed,
    /// Target period is locked.
    PeriodLocked,
    /// Date falls outside the posting window.
    DateOutOfRange,
    /// Period close aborted because temporary accounts still hold balances.
    UnclosedBalances,
    /// Referenced account is unknown, inactive, or a header.
    AccountUnavailable,
    /// Serialization failure; safe to retry.
    ConcurrencyConflict,
    /// Referenced entry or period does not exist.
    NotFound,
    /// Caller lacks the role for the operation.
    Forbidden,
    /// Storage or invariant failure.
    Internal,
}

/// Why an account cannot receive postings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnavailableReason {
    /// No account with that id exists.
    NotFound,
    /// The account is deactivated.
    Inactive,
    /// The account is an aggregation-only header.
    Header,
}

impl std::fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound => write!(f, "not found"),
            Self::Inactive => write!(f, "inactive"),
            Self::Header => write!(f, "a header account"),
        }
    }
}

/// A revenue or expense account that still holds a balance after closing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnclosedAccount {
    /// Account id.
    pub account_id: AccountId,
    /// Account code.
    pub code: String,
    /// Account name.
    pub name: String,
    /// Account type (always REVENUE or EXPENSE).
    pub account_type: AccountType,
    /// Remaining balance, signed by normal balance.
    pub balance: Decimal,
}

/// Errors that can occur during ledger operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    // ========== Validation Errors ==========
    /// Entry has no lines, or every line is zero.
    #[error("Journal entry has no amounts")]
    EmptyEntry,

    /// Entry has fewer than two lines.
    #[error("Journal entry must have at least 2 lines, got {count}")]
    InsufficientLines {
        /// Number of lines supplied.
        count: usize,
    },

    /// Line carries both a debit and a credit.
    #[error("Line {line_number} has both a debit and a credit amount")]
    LineHasBothSides {
        /// 1-based line number.
        line_number: u32,
    },

    /// Line carries neither a debit nor a credit.
    #[error("Line {line_number} has neither a debit nor a credit amount")]
    LineHasNoAmount {
        /// 1-based line number.
        line_number: u32,
    },

    /// Line amount is negative.
    #[error("Line {line_number} has a negative amount")]
    NegativeAmount {
        /// 1-based line number.
        line_number: u32,
    },

    /// Debits and credits differ by more than the tolerance.
    #[error("Journal entry is not balanced. Debit: {debit}, Credit: {credit}")]
    UnbalancedEntry {
        /// Total debit.
        debit: Decimal,
        /// Total credit.
        credit: Decimal,
    },

    /// Entry description is blank.
    #[error("Journal entry description is required")]
    DescriptionRequired,

    /// A reason is mandatory for this operation.
    #[error("A reason is required to {action}")]
    ReasonRequired {
        /// The operation that needs a reason.
        action: Action,
    },

    /// Source type is reserved for entries the engine generates itself.
    #[error("Source type {0} cannot be used for manual drafts")]
    ReservedSourceType(SourceType),

    /// Purchase entries need an approved purchase outcome.
    #[error("Purchase entries require an approved purchase")]
    PurchaseNotApproved,

    /// Requested status change is not allowed from the current status.
    #[error("Cannot change {entity} from {from} to {to}")]
    InvalidStatusTransition {
        /// What is being transitioned.
        entity: &'static str,
        /// Current status.
        from: &'static str,
        /// Requested status.
        to: &'static str,
    },

    /// Year/month pair is not a calendar month.
    #[error("Invalid accounting period {year}-{month}")]
    InvalidPeriod {
        /// Year.
        year: i32,
        /// Month.
        month: u32,
    },

    /// Chart of accounts is malformed (duplicate code, missing parent, cycle).
    #[error("Invalid chart of accounts: {0}")]
    InvalidHierarchy(String),

    // ========== Period Policy Errors ==========
    /// Period is closed; ordinary postings are rejected.
    #[error("Accounting period {period} is closed")]
    PeriodClosed {
        /// The closed period.
        period: PeriodKey,
    },

    /// Period is locked; nothing is accepted.
    #[error("Accounting period {period} is locked")]
    PeriodLocked {
        /// The locked period.
        period: PeriodKey,
    },

    /// Date is outside the window in which periods may be created.
    #[error("Date {date} is outside the allowed posting window {earliest} to {latest}")]
    DateOutOfRange {
        /// Offending date.
        date: NaiveDate,
        /// Earliest accepted date.
        earliest: NaiveDate,
        /// Latest accepted date.
        latest: NaiveDate,
    },

    /// Closing left revenue or expense balances behind.
    #[error("Cannot close {period}: {} account(s) still carry a balance", accounts.len())]
    UnclosedBalances {
        /// The period being closed.
        period: PeriodKey,
        /// Accounts that prevent the close.
        accounts: Vec<UnclosedAccount>,
    },

    // ========== Account Errors ==========
    /// Account cannot receive postings.
    #[error("Account {account_id} is {reason}")]
    AccountUnavailable {
        /// The account.
        account_id: AccountId,
        /// Why it is unavailable.
        reason: UnavailableReason,
    },

    /// Retained earnings account is missing or unusable.
    #[error("Retained earnings account {code} is missing or is not a postable equity account")]
    RetainedEarningsUnavailable {
        /// Configured account code.
        code: String,
    },

    // ========== Authorization Errors ==========
    /// Role does not allow the action.
    #[error("Role {role} is not allowed to {action}")]
    NotAuthorized {
        /// Attempted action.
        action: Action,
        /// Caller role.
        role: UserRole,
    },

    // ========== Not Found ==========
    /// Journal entry not found.
    #[error("Journal entry not found: {0}")]
    EntryNotFound(JournalEntryId),

    /// Accounting period not found.
    #[error("Accounting period not found: {0}")]
    PeriodNotFound(PeriodKey),

    // ========== Concurrency Errors ==========
    /// Transaction kept failing to serialize.
    #[error("Concurrent modification detected after {attempts} attempt(s), please retry")]
    ConcurrencyConflict {
        /// Attempts made before giving up.
        attempts: u32,
    },

    // ========== Internal Errors ==========
    /// Operation exceeded its time budget and was rolled back.
    #[error("{operation} timed out after {seconds}s and was rolled back")]
    Timeout {
        /// Operation name.
        operation: &'static str,
        /// Budget in seconds.
        seconds: u64,
    },

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl LedgerError {
    /// Returns the coarse error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::EmptyEntry
            | Self::InsufficientLines { .. }
            | Self::LineHasBothSides { .. }
            | Self::LineHasNoAmount { .. }
            | Self::NegativeAmount { .. }
            | Self::UnbalancedEntry { .. }
            | Self::DescriptionRequired
            | Self::ReasonRequired { .. }
            | Self::ReservedSourceType(_)
            | Self::PurchaseNotApproved
            | Self::InvalidStatusTransition { .. }
            | Self::InvalidPeriod { .. }
            | Self::InvalidHierarchy(_) => ErrorKind::Validation,
            Self::PeriodClosed { .. } => ErrorKind::PeriodClosed,
            Self::PeriodLocked { .. } => ErrorKind::PeriodLocked,
            Self::DateOutOfRange { .. } => ErrorKind::DateOutOfRange,
            Self::UnclosedBalances { .. } => ErrorKind::UnclosedBalances,
            Self::AccountUnavailable { .. } | Self::RetainedEarningsUnavailable { .. } => {
                ErrorKind::AccountUnavailable
            }
            Self::NotAuthorized { .. } => ErrorKind::Forbidden,
            Self::EntryNotFound(_) | Self::PeriodNotFound(_) => ErrorKind::NotFound,
            Self::ConcurrencyConflict { .. } => ErrorKind::ConcurrencyConflict,
            Self::Timeout { .. } | Self::Database(_) | Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::EmptyEntry => "EMPTY_ENTRY",
            Self::InsufficientLines { .. } => "INSUFFICIENT_LINES",
            Self::LineHasBothSides { .. } => "LINE_HAS_BOTH_SIDES",
            Self::LineHasNoAmount { .. } => "LINE_HAS_NO_AMOUNT",
            Self::NegativeAmount { .. } => "NEGATIVE_AMOUNT",
            Self::UnbalancedEntry { .. } => "UNBALANCED_ENTRY",
            Self::DescriptionRequired => "DESCRIPTION_REQUIRED",
            Self::ReasonRequired { .. } => "REASON_REQUIRED",
            Self::ReservedSourceType(_) => "RESERVED_SOURCE_TYPE",
            Self::PurchaseNotApproved => "PURCHASE_NOT_APPROVED",
            Self::InvalidStatusTransition { .. } => "INVALID_STATUS_TRANSITION",
            Self::InvalidPeriod { .. } => "INVALID_PERIOD",
            Self::InvalidHierarchy(_) => "INVALID_HIERARCHY",
            Self::PeriodClosed { .. } => "PERIOD_CLOSED",
            Self::PeriodLocked { .. } => "PERIOD_LOCKED",
            Self::DateOutOfRange { .. } => "DATE_OUT_OF_RANGE",
            Self::UnclosedBalances { .. } => "UNCLOSED_BALANCES",
            Self::AccountUnavailable { .. } => "ACCOUNT_UNAVAILABLE",
            Self::RetainedEarningsUnavailable { .. } => "RETAINED_EARNINGS_UNAVAILABLE",
            Self::NotAuthorized { .. } => "NOT_AUTHORIZED",
            Self::EntryNotFound(_) => "ENTRY_NOT_FOUND",
            Self::PeriodNotFound(_) => "PERIOD_NOT_FOUND",
            Self::ConcurrencyConflict { .. } => "CONCURRENCY_CONFLICT",
            Self::Timeout { .. } => "OPERATION_TIMEOUT",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        if let Self::Timeout { .. } = self {
            return 504;
        }
        match self.kind() {
            ErrorKind::Validation | ErrorKind::DateOutOfRange | ErrorKind::AccountUnavailable => {
                400
            }
            ErrorKind::Forbidden => 403,
            ErrorKind::NotFound => 404,
            ErrorKind::PeriodClosed
            | ErrorKind::PeriodLocked
            | ErrorKind::UnclosedBalances
            | ErrorKind::ConcurrencyConflict => 409,
            ErrorKind::Internal => 500,
        }
    }

    /// Returns true if this error is retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict { .. })
    }

    /// Structured context for the response body.
    #[must_use]
    pub fn details(&self) -> Value {
        match self {
            Self::UnbalancedEntry { debit, credit } => json!({
                "debit": debit.to_string(),
                "credit": credit.to_string(),
                "difference": (debit - credit).to_string(),
            }),
            Self::LineHasBothSides { line_number }
            | Self::LineHasNoAmount { line_number }
            | Self::NegativeAmount { line_number } => json!({ "line_number": line_number }),
            Self::PeriodClosed { period } | Self::PeriodLocked { period } => {
                json!({ "period": period.to_string() })
            }
            Self::DateOutOfRange {
                date,
                earliest,
                latest,
            } => json!({
                "date": date,
                "earliest": earliest,
                "latest": latest,
            }),
            Self::UnclosedBalances { period, accounts } => json!({
                "period": period.to_string(),
                "accounts": accounts,
            }),
            Self::AccountUnavailable { account_id, reason } => json!({
                "account_id": account_id,
                "reason": reason,
            }),
            Self::RetainedEarningsUnavailable { code } => json!({ "code": code }),
            Self::NotAuthorized { action, role } => json!({
                "action": action,
                "role": role,
            }),
            Self::ConcurrencyConflict { attempts } => json!({ "attempts": attempts }),
            Self::Timeout { operation, seconds } => json!({
                "operation": operation,
                "seconds": seconds,
            }),
            _ => Value::Null,
        }
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        Self::Domain(DomainFailure {
            status_code: err.http_status_code(),
            error_code: err.error_code(),
            message: err.to_string(),
            details: err.details(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn period() -> PeriodKey {
        PeriodKey::new(2026, 3).unwrap()
    }

    #[rstest]
    #[case(LedgerError::EmptyEntry, ErrorKind::Validation, 400)]
    #[case(LedgerError::UnbalancedEntry { debit: dec!(10), credit: dec!(9) }, ErrorKind::Validation, 400)]
    #[case(LedgerError::PeriodClosed { period: period() }, ErrorKind::PeriodClosed, 409)]
    #[case(LedgerError::PeriodLocked { period: period() }, ErrorKind::PeriodLocked, 409)]
    #[case(LedgerError::UnclosedBalances { period: period(), accounts: vec![] }, ErrorKind::UnclosedBalances, 409)]
    #[case(LedgerError::AccountUnavailable { account_id: AccountId::new(), reason: UnavailableReason::Header }, ErrorKind::AccountUnavailable, 400)]
    #[case(LedgerError::NotAuthorized { action: Action::ClosePeriod, role: UserRole::Viewer }, ErrorKind::Forbidden, 403)]
    #[case(LedgerError::EntryNotFound(JournalEntryId::new()), ErrorKind::NotFound, 404)]
    #[case(LedgerError::ConcurrencyConflict { attempts: 3 }, ErrorKind::ConcurrencyConflict, 409)]
    #[case(LedgerError::Database("boom".into()), ErrorKind::Internal, 500)]
    #[case(LedgerError::Timeout { operation: "close period", seconds: 60 }, ErrorKind::Internal, 504)]
    fn test_kind_and_status(
        #[case] err: LedgerError,
        #[case] kind: ErrorKind,
        #[case] status: u16,
    ) {
        assert_eq!(err.kind(), kind);
        assert_eq!(err.http_status_code(), status);
    }

    #[test]
    fn test_only_concurrency_is_retryable() {
        assert!(LedgerError::ConcurrencyConflict { attempts: 1 }.is_retryable());
        assert!(!LedgerError::EmptyEntry.is_retryable());
        assert!(!LedgerError::Database("x".into()).is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = LedgerError::UnbalancedEntry {
            debit: dec!(1000000.00),
            credit: dec!(900000.00),
        };
        assert_eq!(
            err.to_string(),
            "Journal entry is not balanced. Debit: 1000000.00, Credit: 900000.00"
        );
        assert_eq!(
            LedgerError::PeriodClosed { period: period() }.to_string(),
            "Accounting period 2026-03 is closed"
        );
    }

    #[test]
    fn test_period_closed_converts_with_details() {
        let app: AppError = LedgerError::PeriodClosed { period: period() }.into();
        assert_eq!(app.status_code(), 409);
        assert_eq!(app.error_code(), "PERIOD_CLOSED");
        assert_eq!(app.details(), Some(&json!({ "period": "2026-03" })));
    }

    #[test]
    fn test_unclosed_balances_lists_accounts() {
        let err = LedgerError::UnclosedBalances {
            period: period(),
            accounts: vec![UnclosedAccount {
                account_id: AccountId::new(),
                code: "4102".to_string(),
                name: "Legacy Revenue".to_string(),
                account_type: AccountType::Revenue,
                balance: dec!(250.00),
            }],
        };
        let details = err.details();
        assert_eq!(details["period"], "2026-03");
        assert_eq!(details["accounts"][0]["code"], "4102");
        assert_eq!(details["accounts"][0]["account_type"], "REVENUE");
        assert!(err.to_string().contains("1 account(s)"));
    }

    #[test]
    fn test_validation_without_details() {
        let app: AppError = LedgerError::DescriptionRequired.into();
        assert_eq!(app.status_code(), 400);
        assert!(app.details().is_none());
    }
}
