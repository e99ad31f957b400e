//! Posting window: how far from today periods may be auto-created.

use chrono::{Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

/// Bounds, relative to today, on dates that may create a new period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostingWindow {
    /// Years into the past.
    pub max_past_years: u32,
    /// Days into the future.
    pub max_future_days: u32,
}

impl Default for PostingWindow {
    fn default() -> Self {
        Self {
            max_past_years: 2,
            max_future_days: 7,
        }
    }
}

impl PostingWindow {
    /// Creates a window.
    #[must_use]
    pub const fn new(max_past_years: u32, max_future_days: u32) -> Self {
        Self {
            max_past_years,
            max_future_days,
        }
    }

    /// Earliest and latest accepted dates, inclusive.
    #[must_use]
    pub fn bounds(&self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        let earliest = today
            .checked_sub_months(Months::new(self.max_past_years.saturating_mul(12)))
            .unwrap_or(NaiveDate::MIN);
        let latest = today
            .checked_add_days(Days::new(u64::from(self.max_future_days)))
            .unwrap_or(NaiveDate::MAX);
        (earliest, latest)
    }

    /// Fails with `DateOutOfRange` if `date` is outside the window.
    pub fn check(&self, date: NaiveDate, today: NaiveDate) -> Result<(), LedgerError> {
        let (earliest, latest) = self.bounds(today);
        if date < earliest || date > latest {
            return Err(LedgerError::DateOutOfRange {
                date,
                earliest,
                latest,
            });
        }
        Ok(())
    }
}
