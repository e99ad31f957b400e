//! Property-based tests for ReversalService.

use chrono::{NaiveDate, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use tally_shared::types::{AccountId, JournalEntryId, JournalLineId, UserId};

use super::reversal::ReversalService;
use super::service::JournalService;
use super::types::{EntryStatus, EntryTotals, JournalEntry, JournalLine, SourceType};

fn arb_amount() -> impl Strategy<Value = Decimal> {
    (1i64..1_000_000i64).prop_map(|n| Decimal::new(n, 2))
}

/// A posted entry with 2-5 debit lines against one credit line.
fn arb_posted_entry() -> impl Strategy<Value = JournalEntry> {
    prop::collection::vec(arb_amount(), 1..5).prop_map(|debits| {
        let total: Decimal = debits.iter().copied().sum();
        let mut lines: Vec<JournalLine> = debits
            .into_iter()
            .enumerate()
            .map(|(i, amount)| JournalLine {
                id: JournalLineId::new(),
                line_number: u32::try_from(i + 1).unwrap(),
                account_id: AccountId::new(),
                debit: amount,
                credit: Decimal::ZERO,
                description: None,
            })
            .collect();
        lines.push(JournalLine {
            id: JournalLineId::new(),
            line_number: u32::try_from(lines.len() + 1).unwrap(),
            account_id: AccountId::new(),
            debit: Decimal::ZERO,
            credit: total,
            description: Some("Settlement".to_string()),
        });
        JournalEntry {
            id: JournalEntryId::new(),
            entry_number: "JE-2026-000001".to_string(),
            entry_date: NaiveDate::from_ymd_opt(2026, 2, 1).unwrap(),
            description: "Generated".to_string(),
            source_type: SourceType::Sale,
            reference: None,
            status: EntryStatus::Posted,
            totals: EntryTotals::new(total, total),
            reversal_of: None,
            reversed_by_entry: None,
            reversal_reason: None,
            created_by: UserId::new(),
            created_at: Utc::now(),
            posted_by: None,
            posted_at: None,
            reversed_by: None,
            reversed_at: None,
            lines,
        }
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// The compensating entry is balanced with the same totals as the original.
    #[test]
    fn prop_reversal_is_balanced(entry in arb_posted_entry()) {
        let plan = ReversalService::plan(&entry, "Error", entry.entry_date).unwrap();
        let draft = JournalService::prepare_lines(&plan.description, &plan.lines, |_| Ok(())).unwrap();

        prop_assert!(draft.totals.is_balanced);
        prop_assert_eq!(draft.totals.total_debit, entry.totals.total_credit);
        prop_assert_eq!(draft.totals.total_credit, entry.totals.total_debit);
    }

    /// Original plus reversal nets to zero on every account.
    #[test]
    fn prop_reversal_nets_to_zero(entry in arb_posted_entry()) {
        let plan = ReversalService::plan(&entry, "Error", entry.entry_date).unwrap();
        let combined = entry
            .lines
            .iter()
            .map(|l| (l.account_id, l.debit, l.credit))
            .chain(plan.lines.iter().map(|l| (l.account_id, l.debit, l.credit)));

        for delta in JournalService::balance_deltas(combined) {
            prop_assert_eq!(delta.debit, delta.credit);
        }
    }

    /// Reversal never applies to anything but a posted entry.
    #[test]
    fn prop_only_posted_reversible(
        entry in arb_posted_entry(),
        status in prop_oneof![Just(EntryStatus::Draft), Just(EntryStatus::Reversed)],
    ) {
        let mut entry = entry;
        entry.status = status;
        prop_assert!(ReversalService::plan(&entry, "Error", entry.entry_date).is_err());
    }
}
