//! Property-based tests over whole engine workflows.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use tally_shared::types::{AccountId, UserId};

use super::{EngineConfig, LedgerEngine};
use crate::accounts::{ChartOfAccounts, standard_accounts};
use crate::auth::{Actor, UserRole};
use crate::journal::{DraftInput, EntryStatus, JournalEntry, LineInput};
use crate::period::PeriodStatus;

/// Postable codes of the standard chart.
const POSTABLE: &[&str] = &[
    "1101", "1102", "1201", "1301", "1501", "2101", "2102", "3101", "3201", "4101", "4201",
    "5101", "5201", "5202",
];

/// One generated posting: debit index, credit index, amount in cents, day of March.
type Posting = (usize, usize, i64, u32);

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 4, 5, 10, 0, 0).unwrap()
}

fn actor() -> Actor {
    Actor::new(UserId::new(), UserRole::Owner)
}

fn engine() -> LedgerEngine {
    LedgerEngine::new(
        ChartOfAccounts::new(standard_accounts()).unwrap(),
        EngineConfig::default(),
    )
}

fn arb_posting() -> impl Strategy<Value = Posting> {
    (0..POSTABLE.len(), 0..POSTABLE.len(), 1i64..100_000_000i64, 1u32..=28)
}

fn account(engine: &LedgerEngine, index: usize) -> AccountId {
    engine.chart().find_by_code(POSTABLE[index]).unwrap().id
}

fn draft_input(engine: &LedgerEngine, posting: Posting) -> DraftInput {
    let (debit, credit, cents, day) = posting;
    let amount = Decimal::new(cents, 2);
    DraftInput::manual(
        NaiveDate::from_ymd_opt(2026, 3, day).unwrap(),
        "Generated",
        vec![
            LineInput::debit(account(engine, debit), amount),
            LineInput::credit(account(engine, credit), amount),
        ],
    )
}

fn post(engine: &mut LedgerEngine, posting: Posting) -> JournalEntry {
    let input = draft_input(engine, posting);
    let draft = engine.create_draft(&actor(), &input, now()).unwrap();
    engine.post(&actor(), draft.id, now()).unwrap()
}

fn stored_balances(engine: &LedgerEngine) -> Vec<Decimal> {
    engine.chart().iter().map(|a| a.balance).collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Every posted entry balances and every stored balance matches its lines.
    #[test]
    fn prop_stored_balances_match_lines(
        postings in prop::collection::vec(arb_posting(), 1..20),
        reverse_mask in prop::collection::vec(any::<bool>(), 20),
    ) {
        let mut engine = engine();
        let mut posted = Vec::new();
        for posting in &postings {
            posted.push(post(&mut engine, *posting).id);
        }
        for (id, reverse) in posted.iter().zip(&reverse_mask) {
            if *reverse {
                engine.reverse(&actor(), *id, "Generated reversal", None, now()).unwrap();
            }
        }

        for entry in engine.entries() {
            if entry.status != EntryStatus::Draft {
                prop_assert!(entry.totals.is_balanced);
                prop_assert_eq!(entry.totals.total_debit, entry.totals.total_credit);
            }
        }
        for account in engine.chart().iter().filter(|a| !a.is_header) {
            prop_assert_eq!(account.balance, engine.recomputed_balance(account.id).unwrap());
        }
        prop_assert!(engine.check_equation(now()).is_healthy());
    }

    /// Posting and then reversing an entry restores every stored balance.
    #[test]
    fn prop_reversal_round_trips(
        setup in prop::collection::vec(arb_posting(), 0..10),
        target in arb_posting(),
    ) {
        let mut engine = engine();
        for posting in &setup {
            post(&mut engine, *posting);
        }
        let before = stored_balances(&engine);

        let entry = post(&mut engine, target);
        let outcome = engine.reverse(&actor(), entry.id, "Round trip", None, now()).unwrap();

        prop_assert_eq!(outcome.reversal.entry_date, entry.entry_date);
        prop_assert_eq!(stored_balances(&engine), before);
    }

    /// Closing zeroes every revenue and expense account and keeps the equation.
    #[test]
    fn prop_close_zeroes_temporary_accounts(
        postings in prop::collection::vec(arb_posting(), 0..20),
    ) {
        let mut engine = engine();
        for posting in &postings {
            post(&mut engine, *posting);
        }
        let outcome = engine.close(&actor(), 2026, 3, "Month end", now()).unwrap();

        prop_assert_eq!(outcome.period.status, PeriodStatus::Closed);
        for account in engine.chart().iter().filter(|a| a.account_type.is_temporary()) {
            prop_assert_eq!(account.balance, Decimal::ZERO);
        }
        if let Some(closing) = &outcome.closing_entry {
            prop_assert!(closing.totals.is_balanced);
        }
        prop_assert!(engine.check_equation(now()).is_healthy());
    }

    /// A rejected posting into a closed period leaves the engine untouched.
    #[test]
    fn prop_closed_period_rejects_without_side_effects(
        setup in prop::collection::vec(arb_posting(), 0..10),
        late in arb_posting(),
    ) {
        let mut engine = engine();
        for posting in &setup {
            post(&mut engine, *posting);
        }
        engine.close(&actor(), 2026, 3, "Month end", now()).unwrap();

        let input = draft_input(&engine, late);
        let draft = engine.create_draft(&actor(), &input, now()).unwrap();
        let before = engine.clone();

        prop_assert!(engine.post(&actor(), draft.id, now()).is_err());
        prop_assert_eq!(&engine, &before);
    }
}
