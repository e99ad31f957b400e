//! Property-based tests for the incremental and full balance paths.

use proptest::prelude::*;
use rust_decimal::Decimal;

use super::BalanceService;
use crate::accounts::NormalBalance;
use crate::journal::EntryStatus;

fn arb_amount() -> impl Strategy<Value = Decimal> {
    (0i64..1_000_000i64).prop_map(|n| Decimal::new(n, 2))
}

fn arb_normal() -> impl Strategy<Value = NormalBalance> {
    prop_oneof![Just(NormalBalance::Debit), Just(NormalBalance::Credit)]
}

fn arb_status() -> impl Strategy<Value = EntryStatus> {
    prop_oneof![
        Just(EntryStatus::Draft),
        Just(EntryStatus::Posted),
        Just(EntryStatus::Reversed),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Applying every counted line incrementally converges to the full recompute.
    #[test]
    fn prop_incremental_converges_to_recompute(
        normal in arb_normal(),
        lines in prop::collection::vec((arb_status(), arb_amount(), arb_amount()), 0..40),
    ) {
        let incremental = lines
            .iter()
            .filter(|(status, ..)| status.affects_balances())
            .fold(Decimal::ZERO, |acc, &(_, debit, credit)| {
                BalanceService::apply_delta(acc, normal, debit, credit)
            });

        prop_assert_eq!(incremental, BalanceService::recompute(normal, lines));
    }

    /// Applying a delta and then its mirror returns to the starting balance.
    #[test]
    fn prop_mirror_delta_round_trips(
        normal in arb_normal(),
        start in arb_amount(),
        debit in arb_amount(),
        credit in arb_amount(),
    ) {
        let moved = BalanceService::apply_delta(start, normal, debit, credit);
        let back = BalanceService::apply_delta(moved, normal, credit, debit);
        prop_assert_eq!(back, start);
    }

    /// Debit-normal and credit-normal views of the same lines are negations.
    #[test]
    fn prop_normal_sides_are_negations(
        lines in prop::collection::vec((arb_status(), arb_amount(), arb_amount()), 0..20),
    ) {
        let debit_view = BalanceService::recompute(NormalBalance::Debit, lines.clone());
        let credit_view = BalanceService::recompute(NormalBalance::Credit, lines);
        prop_assert_eq!(debit_view, -credit_view);
    }
}
