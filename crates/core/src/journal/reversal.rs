//! Reversal of posted entries.
//!
//! A posted entry is never mutated or deleted. Reversing it creates a new
//! compensating entry with every line's debit and credit swapped, referencing
//! the original, and marks the original REVERSED.

use chrono::NaiveDate;

use super::service::JournalService;
use super::types::{JournalEntry, LineInput};
use crate::auth::Action;
use crate::error::LedgerError;

/// The compensating entry to be posted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReversalPlan {
    /// Booking date of the compensating entry.
    pub entry_date: NaiveDate,
    /// Description, including the reason.
    pub description: String,
    /// `REV-<original reference or number>`.
    pub reference: String,
    /// Swapped lines in the original order.
    pub lines: Vec<LineInput>,
    /// Trimmed reason.
    pub reason: String,
}

/// Stateless service for creating reversing entries.
pub struct ReversalService;

impl ReversalService {
    /// Picks the booking date for a reversal.
    ///
    /// The original date is reused while its period is still open for
    /// postings; otherwise the compensating entry lands on `fallback`
    /// (normally today), whose period must be open.
    #[must_use]
    pub fn reversal_date(
        original_date: NaiveDate,
        original_period_accepts_postings: bool,
        fallback: NaiveDate,
    ) -> NaiveDate {
        if original_period_accepts_postings {
            original_date
        } else {
            fallback
        }
    }

    /// Builds the compensating entry for `original`.
    ///
    /// For each original line debits become credits, credits become debits,
    /// the account is preserved, and the description is prefixed with
    /// "Reversing: ".
    pub fn plan(
        original: &JournalEntry,
        reason: &str,
        entry_date: NaiveDate,
    ) -> Result<ReversalPlan, LedgerError> {
        JournalService::validate_can_reverse(original.status)?;

        let reason = reason.trim();
        if reason.is_empty() {
            return Err(LedgerError::ReasonRequired {
                action: Action::ReverseEntry,
            });
        }

        let lines = original
            .lines
            .iter()
            .map(|line| LineInput {
                account_id: line.account_id,
                debit: line.credit,
                credit: line.debit,
                description: Some(format!(
                    "Reversing: {}",
                    line.description.as_deref().unwrap_or(&original.description)
                )),
            })
            .collect();

        let reference = format!(
            "REV-{}",
            original.reference.as_deref().unwrap_or(&original.entry_number)
        );

        Ok(ReversalPlan {
            entry_date,
            description: format!("Reversal of {}: {reason}", original.entry_number),
            reference,
            lines,
            reason: reason.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::types::{EntryStatus, EntryTotals, JournalLine, SourceType};
    use chrono::Utc;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use tally_shared::types::{AccountId, JournalEntryId, JournalLineId, UserId};

    fn posted_entry() -> JournalEntry {
        let line = |n: u32, debit: Decimal, credit: Decimal, desc: Option<&str>| JournalLine {
            id: JournalLineId::new(),
            line_number: n,
            account_id: AccountId::new(),
            debit,
            credit,
            description: desc.map(str::to_string),
        };
        JournalEntry {
            id: JournalEntryId::new(),
            entry_number: "JE-2026-000007".to_string(),
            entry_date: NaiveDate::from_ymd_opt(2026, 3, 10).unwrap(),
            description: "Office supplies".to_string(),
            source_type: SourceType::Manual,
            reference: None,
            status: EntryStatus::Posted,
            totals: EntryTotals::new(dec!(100), dec!(100)),
            reversal_of: None,
            reversed_by_entry: None,
            reversal_reason: None,
            created_by: UserId::new(),
            created_at: Utc::now(),
            posted_by: None,
            posted_at: None,
            reversed_by: None,
            reversed_at: None,
            lines: vec![
                line(1, dec!(60), dec!(0), Some("Paper")),
                line(2, dec!(40), dec!(0), None),
                line(3, dec!(0), dec!(100), Some("Cash payment")),
            ],
        }
    }

    #[test]
    fn test_plan_swaps_sides() {
        let original = posted_entry();
        let plan = ReversalService::plan(&original, "Duplicate entry", original.entry_date).unwrap();

        assert_eq!(plan.lines.len(), 3);
        for (orig, rev) in original.lines.iter().zip(&plan.lines) {
            assert_eq!(rev.account_id, orig.account_id);
            assert_eq!(rev.debit, orig.credit);
            assert_eq!(rev.credit, orig.debit);
        }
        assert_eq!(plan.lines[0].description.as_deref(), Some("Reversing: Paper"));
        assert_eq!(
            plan.lines[1].description.as_deref(),
            Some("Reversing: Office supplies")
        );
    }

    #[test]
    fn test_plan_reference_and_description() {
        let mut original = posted_entry();
        let plan = ReversalService::plan(&original, " Duplicate entry ", original.entry_date).unwrap();
        assert_eq!(plan.reference, "REV-JE-2026-000007");
        assert_eq!(plan.description, "Reversal of JE-2026-000007: Duplicate entry");
        assert_eq!(plan.reason, "Duplicate entry");

        original.reference = Some("INV-118".to_string());
        let plan = ReversalService::plan(&original, "Wrong customer", original.entry_date).unwrap();
        assert_eq!(plan.reference, "REV-INV-118");
    }

    #[test]
    fn test_plan_requires_reason() {
        let original = posted_entry();
        assert_eq!(
            ReversalService::plan(&original, "  ", original.entry_date),
            Err(LedgerError::ReasonRequired {
                action: Action::ReverseEntry
            })
        );
    }

    #[test]
    fn test_plan_requires_posted() {
        let mut original = posted_entry();
        original.status = EntryStatus::Reversed;
        assert!(matches!(
            ReversalService::plan(&original, "again", original.entry_date),
            Err(LedgerError::InvalidStatusTransition { .. })
        ));

        original.status = EntryStatus::Draft;
        assert!(ReversalService::plan(&original, "draft", original.entry_date).is_err());
    }

    #[test]
    fn test_reversal_date() {
        let original = NaiveDate::from_ymd_opt(2026, 1, 20).unwrap();
        let today = NaiveDate::from_ymd_opt(2026, 3, 5).unwrap();
        assert_eq!(ReversalService::reversal_date(original, true, today), original);
        assert_eq!(ReversalService::reversal_date(original, false, today), today);
    }
}
