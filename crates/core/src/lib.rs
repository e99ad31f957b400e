//! Core ledger logic for Tally.
//!
//! This crate contains pure business logic with ZERO web or database dependencies.
//! All domain types, validation rules, and calculations live here.
//!
//! # Modules
//!
//! - `accounts` - Chart of accounts and normal-balance rules
//! - `journal` - Journal entry validation, posting deltas and reversals
//! - `balance` - Incremental and recomputed balances, subledger reconciliation
//! - `period` - Accounting periods, posting window and period closing
//! - `health` - Accounting equation check and safe auto-heal
//! - `engine` - In-memory ledger driving all of the above
//! - `auth` - Roles and authorization decisions
//! - `error` - Ledger error taxonomy

pub mod accounts;
pub mod auth;
pub mod balance;
pub mod engine;
pub mod error;
pub mod health;
pub mod journal;
pub mod period;

pub use accounts::{Account, AccountType, ChartOfAccounts, NormalBalance, standard_accounts};
pub use auth::{Action, Actor, UserRole};
pub use engine::{CloseOutcome, EngineConfig, LedgerEngine, ReversalOutcome};
pub use error::{ErrorKind, LedgerError, UnavailableReason, UnclosedAccount};
pub use journal::{DraftInput, EntryStatus, JournalEntry, JournalLine, LineInput, SourceType};
pub use period::{AccountingPeriod, PeriodKey, PeriodStatus, PostingWindow};
