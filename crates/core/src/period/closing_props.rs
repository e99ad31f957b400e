//! Property-based tests for closing-entry generation.

use proptest::prelude::*;
use rust_decimal::Decimal;

use super::closing::{ClosingCandidate, ClosingService};
use super::types::PeriodKey;
use crate::accounts::{Account, AccountType};
use crate::journal::EntryTotals;

/// Signed balances, including contra balances, in cents.
fn arb_balance() -> impl Strategy<Value = Decimal> {
    (-500_000i64..5_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

fn arb_candidates() -> impl Strategy<Value = Vec<ClosingCandidate>> {
    prop::collection::vec((any::<bool>(), arb_balance()), 0..12).prop_map(|specs| {
        specs
            .into_iter()
            .enumerate()
            .map(|(idx, (is_revenue, balance))| {
                let (prefix, account_type) = if is_revenue {
                    (4, AccountType::Revenue)
                } else {
                    (6, AccountType::Expense)
                };
                let account = Account::new(format!("{prefix}{idx:03}"), "Generated", account_type);
                ClosingCandidate::from_account(&account, balance)
            })
            .collect()
    })
}

fn period() -> PeriodKey {
    PeriodKey::new(2026, 3).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// The generated closing entry always balances exactly.
    #[test]
    fn prop_closing_entry_is_balanced(candidates in arb_candidates()) {
        let retained = Account::new("3201", "Retained Earnings", AccountType::Equity);
        let plan = ClosingService::plan(period(), &candidates, &retained);
        let totals = EntryTotals::from_amounts(plan.lines.iter().map(|l| (l.debit, l.credit)));
        prop_assert_eq!(totals.total_debit, totals.total_credit);
        prop_assert!(plan.lines.iter().all(|l| l.debit.is_zero() != l.credit.is_zero()));
    }

    /// After the closing entry every temporary account is exactly zero.
    #[test]
    fn prop_closing_zeroes_temporary_accounts(candidates in arb_candidates()) {
        let retained = Account::new("3201", "Retained Earnings", AccountType::Equity);
        let plan = ClosingService::plan(period(), &candidates, &retained);
        let after = ClosingService::project(&candidates, &plan);
        prop_assert!(after.iter().all(|c| c.balance.is_zero()));
        prop_assert!(ClosingService::ensure_closed(period(), &after).is_ok());
    }

    /// Net income equals revenue minus expense, and retained earnings moves by it.
    #[test]
    fn prop_net_income_reaches_retained_earnings(candidates in arb_candidates()) {
        let retained = Account::new("3201", "Retained Earnings", AccountType::Equity);
        let plan = ClosingService::plan(period(), &candidates, &retained);

        let revenue: Decimal = candidates
            .iter()
            .filter(|c| c.account_type == AccountType::Revenue)
            .map(|c| c.balance)
            .sum();
        let expense: Decimal = candidates
            .iter()
            .filter(|c| c.account_type == AccountType::Expense)
            .map(|c| c.balance)
            .sum();
        prop_assert_eq!(plan.net_income, revenue - expense);

        let retained_change: Decimal = plan
            .lines
            .iter()
            .filter(|l| l.account_id == retained.id)
            .map(|l| retained.normal_balance().balance_change(l.debit, l.credit))
            .sum();
        prop_assert_eq!(retained_change, plan.net_income);
    }
}
