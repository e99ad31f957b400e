//! Accounting period domain types.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tally_shared::types::{JournalEntryId, PeriodId, UserId};

use crate::error::LedgerError;
use crate::journal::{EntryStatus, JournalEntry};

/// A calendar month identifying a period, displayed as `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeriodKey {
    year: i32,
    month: u32,
}

impl PeriodKey {
    /// Creates a key, rejecting months outside 1..=12 and unrepresentable years.
    pub fn new(year: i32, month: u32) -> Result<Self, LedgerError> {
        let key = Self { year, month };
        let representable = (1..=12).contains(&month)
            && NaiveDate::from_ymd_opt(year, month, 1).is_some()
            && key.following_first_day().is_some();
        if representable {
            Ok(key)
        } else {
            Err(LedgerError::InvalidPeriod { year, month })
        }
    }

    /// The period containing `date`.
    #[must_use]
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// Year.
    #[must_use]
    pub const fn year(&self) -> i32 {
        self.year
    }

    /// Month, 1-based.
    #[must_use]
    pub const fn month(&self) -> u32 {
        self.month
    }

    fn following_first_day(&self) -> Option<NaiveDate> {
        if self.month == 12 {
            NaiveDate::from_ymd_opt(self.year.checked_add(1)?, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(self.year, self.month + 1, 1)
        }
    }

    /// First day of the month.
    #[must_use]
    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or_default()
    }

    /// Last day of the month.
    #[must_use]
    pub fn last_day(&self) -> NaiveDate {
        self.following_first_day()
            .and_then(|d| d.pred_opt())
            .unwrap_or_default()
    }

    /// True if `date` falls in this month.
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        Self::from_date(date) == *self
    }
}

impl std::fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl std::str::FromStr for PeriodKey {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || LedgerError::InvalidPeriod { year: 0, month: 0 };
        let (year, month) = s.split_once('-').ok_or_else(invalid)?;
        let year = year.parse().map_err(|_| invalid())?;
        let month = month.parse().map_err(|_| invalid())?;
        Self::new(year, month)
    }
}

/// Period state.
///
/// OPEN → CLOSED → LOCKED, with CLOSED → OPEN via reopen. LOCKED is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PeriodStatus {
    /// Accepts postings.
    Open,
    /// Rejects ordinary postings; may be reopened.
    Closed,
    /// Rejects everything.
    Locked,
}

impl PeriodStatus {
    /// Returns true if ordinary postings are accepted.
    #[must_use]
    pub const fn allows_posting(&self) -> bool {
        matches!(self, Self::Open)
    }

    /// Returns the stored representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Closed => "CLOSED",
            Self::Locked => "LOCKED",
        }
    }
}

impl std::fmt::Display for PeriodStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Audited period transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PeriodAction {
    /// OPEN → CLOSED.
    Close,
    /// CLOSED → OPEN.
    Reopen,
    /// CLOSED → LOCKED.
    Lock,
}

impl PeriodAction {
    /// Returns the stored representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Close => "CLOSE",
            Self::Reopen => "REOPEN",
            Self::Lock => "LOCK",
        }
    }
}

/// One audit-trail row for a period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodEvent {
    /// What happened.
    pub action: PeriodAction,
    /// Who did it.
    pub actor: UserId,
    /// Why (required for close and reopen).
    pub reason: Option<String>,
    /// When.
    pub at: DateTime<Utc>,
}

/// An accounting period with its audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountingPeriod {
    /// Period id.
    pub id: PeriodId,
    /// Year and month.
    pub key: PeriodKey,
    /// Current state.
    pub status: PeriodStatus,
    /// Last closer.
    pub closed_by: Option<UserId>,
    /// Last close time.
    pub closed_at: Option<DateTime<Utc>>,
    /// Locker.
    pub locked_by: Option<UserId>,
    /// Lock time.
    pub locked_at: Option<DateTime<Utc>>,
    /// Closing entry of the most recent close, if one was needed.
    pub closing_entry_id: Option<JournalEntryId>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Close / reopen / lock history, oldest first.
    pub events: Vec<PeriodEvent>,
}

impl AccountingPeriod {
    /// A freshly created OPEN period.
    #[must_use]
    pub fn open(key: PeriodKey, now: DateTime<Utc>) -> Self {
        Self {
            id: PeriodId::new(),
            key,
            status: PeriodStatus::Open,
            closed_by: None,
            closed_at: None,
            locked_by: None,
            locked_at: None,
            closing_entry_id: None,
            created_at: now,
            events: Vec::new(),
        }
    }

    /// Reopen events, oldest first.
    pub fn reopen_history(&self) -> impl Iterator<Item = &PeriodEvent> {
        self.events
            .iter()
            .filter(|e| e.action == PeriodAction::Reopen)
    }
}

/// Journal statistics for one period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PeriodSummary {
    /// Entries dated in the period.
    pub total_entries: u64,
    /// Posted entries.
    pub posted_entries: u64,
    /// Draft entries.
    pub draft_entries: u64,
    /// Reversed entries.
    pub reversed_entries: u64,
    /// Debit total of posted and reversed entries.
    pub posted_debit: Decimal,
    /// Credit total of posted and reversed entries.
    pub posted_credit: Decimal,
}

impl PeriodSummary {
    /// Tallies the entries of one period.
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = &'a JournalEntry>) -> Self {
        entries.into_iter().fold(Self::default(), |mut acc, entry| {
            acc.total_entries += 1;
            match entry.status {
                EntryStatus::Draft => acc.draft_entries += 1,
                EntryStatus::Posted => acc.posted_entries += 1,
                EntryStatus::Reversed => acc.reversed_entries += 1,
            }
            if entry.status.affects_balances() {
                acc.posted_debit += entry.totals.total_debit;
                acc.posted_credit += entry.totals.total_credit;
            }
            acc
        })
    }
}

/// Number of periods in each state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PeriodStatusCounts {
    /// Open periods.
    pub open: u64,
    /// Closed periods.
    pub closed: u64,
    /// Locked periods.
    pub locked: u64,
}

impl PeriodStatusCounts {
    /// Counts statuses.
    pub fn from_statuses(statuses: impl IntoIterator<Item = PeriodStatus>) -> Self {
        statuses.into_iter().fold(Self::default(), |mut acc, status| {
            match status {
                PeriodStatus::Open => acc.open += 1,
                PeriodStatus::Closed => acc.closed += 1,
                PeriodStatus::Locked => acc.locked += 1,
            }
            acc
        })
    }
}
