//! Journal entry domain types.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tally_shared::types::{AccountId, JournalEntryId, JournalLineId, UserId, within_tolerance};

/// Journal entry lifecycle status.
///
/// DRAFT → POSTED → REVERSED. Only drafts are editable; REVERSED is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryStatus {
    /// Work in progress; may be edited or deleted.
    Draft,
    /// Applied to balances; immutable.
    Posted,
    /// Cancelled by a compensating entry; immutable.
    Reversed,
}

impl EntryStatus {
    /// Returns true if the entry can be modified.
    #[must_use]
    pub const fn is_editable(&self) -> bool {
        matches!(self, Self::Draft)
    }

    /// Lines of entries in this status count toward account balances.
    ///
    /// Reversed entries keep counting: their compensating entry cancels them.
    #[must_use]
    pub const fn affects_balances(&self) -> bool {
        matches!(self, Self::Posted | Self::Reversed)
    }

    /// Returns the stored representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Posted => "POSTED",
            Self::Reversed => "REVERSED",
        }
    }
}

impl std::fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Origin subsystem of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceType {
    /// Manual journal.
    Manual,
    /// Sales module.
    Sale,
    /// Purchases module; requires an approved purchase.
    Purchase,
    /// Payments module.
    Payment,
    /// Expense module.
    Expense,
    /// Fixed-asset module.
    Asset,
    /// Adjusting entry.
    Adjustment,
    /// Period-end closing entry; engine only.
    Closing,
    /// Compensating entry for a reversal; engine only.
    Reversal,
}

impl SourceType {
    /// All source types.
    pub const ALL: [Self; 9] = [
        Self::Manual,
        Self::Sale,
        Self::Purchase,
        Self::Payment,
        Self::Expense,
        Self::Asset,
        Self::Adjustment,
        Self::Closing,
        Self::Reversal,
    ];

    /// Source types that only the engine itself may create.
    #[must_use]
    pub const fn is_reserved(self) -> bool {
        matches!(self, Self::Closing | Self::Reversal)
    }

    /// Everything except manual journals is generated by some subsystem.
    #[must_use]
    pub const fn is_auto_generated(self) -> bool {
        !matches!(self, Self::Manual)
    }

    /// Returns the stored representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Manual => "MANUAL",
            Self::Sale => "SALE",
            Self::Purchase => "PURCHASE",
            Self::Payment => "PAYMENT",
            Self::Expense => "EXPENSE",
            Self::Asset => "ASSET",
            Self::Adjustment => "ADJUSTMENT",
            Self::Closing => "CLOSING",
            Self::Reversal => "REVERSAL",
        }
    }
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown source type: {s}"))
    }
}

/// Outcome of the external purchase-approval workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalOutcome {
    /// Purchase approved; its entry may be drafted.
    Approved,
    /// Purchase rejected; no entry may be drafted.
    Rejected,
}

/// Input for a single journal line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineInput {
    /// The account to post to.
    pub account_id: AccountId,
    /// Debit amount (zero if credit).
    #[serde(default)]
    pub debit: Decimal,
    /// Credit amount (zero if debit).
    #[serde(default)]
    pub credit: Decimal,
    /// Optional line description.
    #[serde(default)]
    pub description: Option<String>,
}

impl LineInput {
    /// A debit line.
    #[must_use]
    pub fn debit(account_id: AccountId, amount: Decimal) -> Self {
        Self {
            account_id,
            debit: amount,
            credit: Decimal::ZERO,
            description: None,
        }
    }

    /// A credit line.
    #[must_use]
    pub fn credit(account_id: AccountId, amount: Decimal) -> Self {
        Self {
            account_id,
            debit: Decimal::ZERO,
            credit: amount,
            description: None,
        }
    }

    /// Attaches a description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Input for creating or replacing a draft entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftInput {
    /// Date the entry is booked on.
    pub entry_date: NaiveDate,
    /// Entry description.
    pub description: String,
    /// Origin subsystem.
    #[serde(default = "default_source_type")]
    pub source_type: SourceType,
    /// External reference (invoice number, payment id, ...).
    #[serde(default)]
    pub reference: Option<String>,
    /// Purchase-approval outcome; required for PURCHASE entries.
    #[serde(default)]
    pub approval: Option<ApprovalOutcome>,
    /// The lines.
    pub lines: Vec<LineInput>,
}

fn default_source_type() -> SourceType {
    SourceType::Manual
}

impl DraftInput {
    /// A manual draft with the given lines.
    #[must_use]
    pub fn manual(entry_date: NaiveDate, description: impl Into<String>, lines: Vec<LineInput>) -> Self {
        Self {
            entry_date,
            description: description.into(),
            source_type: SourceType::Manual,
            reference: None,
            approval: None,
            lines,
        }
    }
}

/// Cached debit/credit totals of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryTotals {
    /// Sum of line debits.
    pub total_debit: Decimal,
    /// Sum of line credits.
    pub total_credit: Decimal,
    /// Whether debits equal credits within the tolerance.
    pub is_balanced: bool,
}

impl EntryTotals {
    /// Creates totals from debit and credit sums.
    #[must_use]
    pub fn new(total_debit: Decimal, total_credit: Decimal) -> Self {
        Self {
            total_debit,
            total_credit,
            is_balanced: within_tolerance(total_debit, total_credit),
        }
    }

    /// Sums a set of `(debit, credit)` pairs.
    pub fn from_amounts(amounts: impl IntoIterator<Item = (Decimal, Decimal)>) -> Self {
        let (debit, credit) = amounts
            .into_iter()
            .fold((Decimal::ZERO, Decimal::ZERO), |(d, c), (ld, lc)| (d + ld, c + lc));
        Self::new(debit, credit)
    }

    /// Debits minus credits.
    #[must_use]
    pub fn difference(&self) -> Decimal {
        self.total_debit - self.total_credit
    }
}

/// A persisted journal line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalLine {
    /// Line id.
    pub id: JournalLineId,
    /// 1-based position within the entry.
    pub line_number: u32,
    /// Account posted to.
    pub account_id: AccountId,
    /// Debit amount (zero if credit).
    pub debit: Decimal,
    /// Credit amount (zero if debit).
    pub credit: Decimal,
    /// Optional line description.
    pub description: Option<String>,
}

/// A journal entry with its lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Entry id.
    pub id: JournalEntryId,
    /// Human-readable number, `JE-YYYY-NNNNNN`.
    pub entry_number: String,
    /// Booking date.
    pub entry_date: NaiveDate,
    /// Description.
    pub description: String,
    /// Origin subsystem.
    pub source_type: SourceType,
    /// External reference.
    pub reference: Option<String>,
    /// Lifecycle status.
    pub status: EntryStatus,
    /// Cached totals.
    pub totals: EntryTotals,
    /// For a reversal entry, the entry it compensates.
    pub reversal_of: Option<JournalEntryId>,
    /// For a reversed entry, its compensating entry.
    pub reversed_by_entry: Option<JournalEntryId>,
    /// Reason given when reversing.
    pub reversal_reason: Option<String>,
    /// Creator.
    pub created_by: UserId,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Poster.
    pub posted_by: Option<UserId>,
    /// Posting time.
    pub posted_at: Option<DateTime<Utc>>,
    /// Reverser.
    pub reversed_by: Option<UserId>,
    /// Reversal time.
    pub reversed_at: Option<DateTime<Utc>>,
    /// Lines, ordered by line number.
    pub lines: Vec<JournalLine>,
}

impl JournalEntry {
    /// Totals recomputed from the lines, ignoring the cached value.
    #[must_use]
    pub fn line_totals(&self) -> EntryTotals {
        EntryTotals::from_amounts(self.lines.iter().map(|l| (l.debit, l.credit)))
    }
}

/// Formats an entry number from the year and per-year sequence.
#[must_use]
pub fn format_entry_number(year: i32, sequence: u64) -> String {
    format!("JE-{year}-{sequence:06}")
}
