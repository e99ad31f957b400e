//! Property-based tests for JournalService.
//!
//! - Prepared totals equal the line sums
//! - Balance within tolerance decides postability
//! - Per-account deltas preserve the entry totals

use chrono::NaiveDate;
use proptest::prelude::*;
use rust_decimal::Decimal;
use tally_shared::types::{AccountId, BALANCE_TOLERANCE};

use super::service::JournalService;
use super::types::{DraftInput, LineInput};
use crate::error::LedgerError;

/// Strategy to generate positive decimal amounts (0.01 to 10,000.00).
fn positive_amount() -> impl Strategy<Value = Decimal> {
    (1i64..1_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

fn ok_account_validator(_id: AccountId) -> Result<(), LedgerError> {
    Ok(())
}

fn make_input(lines: Vec<LineInput>) -> DraftInput {
    DraftInput::manual(
        NaiveDate::from_ymd_opt(2026, 1, 15).unwrap(),
        "Generated entry",
        lines,
    )
}

/// Debit lines split across a few accounts, balanced by one credit line.
fn balanced_lines() -> impl Strategy<Value = Vec<LineInput>> {
    prop::collection::vec(positive_amount(), 1..6).prop_map(|debits| {
        let accounts: Vec<AccountId> = (0..3).map(|_| AccountId::new()).collect();
        let total: Decimal = debits.iter().copied().sum();
        let mut lines: Vec<LineInput> = debits
            .into_iter()
            .enumerate()
            .map(|(i, amount)| LineInput::debit(accounts[i % 3], amount))
            .collect();
        lines.push(LineInput::credit(AccountId::new(), total));
        lines
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Balanced inputs prepare successfully and report balanced totals.
    #[test]
    fn prop_balanced_draft_totals(lines in balanced_lines()) {
        let expected_debit: Decimal = lines.iter().map(|l| l.debit).sum();
        let expected_credit: Decimal = lines.iter().map(|l| l.credit).sum();

        let draft = JournalService::prepare_draft(&make_input(lines), ok_account_validator).unwrap();

        prop_assert_eq!(draft.totals.total_debit, expected_debit);
        prop_assert_eq!(draft.totals.total_credit, expected_credit);
        prop_assert!(draft.totals.is_balanced);
        prop_assert!(JournalService::require_balanced(draft.totals).is_ok());
    }

    /// An imbalance beyond one cent is never postable; within one cent always is.
    #[test]
    fn prop_tolerance_decides_balance(
        amount in positive_amount(),
        skew_cents in 0i64..500i64,
    ) {
        let lines = vec![
            LineInput::debit(AccountId::new(), amount),
            LineInput::credit(AccountId::new(), amount + Decimal::new(skew_cents, 2)),
        ];
        let draft = JournalService::prepare_draft(&make_input(lines), ok_account_validator).unwrap();
        let within = skew_cents <= 1;

        prop_assert_eq!(draft.totals.difference().abs() <= BALANCE_TOLERANCE, within);
        prop_assert_eq!(draft.totals.is_balanced, within);
        if !within {
            let is_unbalanced_error = matches!(
                JournalService::require_balanced(draft.totals),
                Err(LedgerError::UnbalancedEntry { .. })
            );
            prop_assert!(is_unbalanced_error);
        }
    }

    /// Aggregated deltas carry exactly the entry's debit and credit totals.
    #[test]
    fn prop_deltas_preserve_totals(lines in balanced_lines()) {
        let draft = JournalService::prepare_draft(&make_input(lines), ok_account_validator).unwrap();
        let deltas = JournalService::balance_deltas(
            draft.lines.iter().map(|l| (l.account_id, l.debit, l.credit)),
        );

        let delta_debit: Decimal = deltas.iter().map(|d| d.debit).sum();
        let delta_credit: Decimal = deltas.iter().map(|d| d.credit).sum();
        prop_assert_eq!(delta_debit, draft.totals.total_debit);
        prop_assert_eq!(delta_credit, draft.totals.total_credit);
        prop_assert!(deltas.len() <= draft.lines.len());
    }

    /// A single line is always rejected, whatever its amount.
    #[test]
    fn prop_single_line_rejected(amount in positive_amount(), debit_side in any::<bool>()) {
        let line = if debit_side {
            LineInput::debit(AccountId::new(), amount)
        } else {
            LineInput::credit(AccountId::new(), amount)
        };
        let result = JournalService::prepare_draft(&make_input(vec![line]), ok_account_validator);
        prop_assert_eq!(result, Err(LedgerError::InsufficientLines { count: 1 }));
    }
}
