//! Balance Aggregator rules.
//!
//! Two code paths must always agree: the incremental [`BalanceService::apply_delta`]
//! used right after a post or reversal, and the full
//! [`BalanceService::recompute`] over every line that counts toward balances.
//!
//! - `reconcile` - Subledger vs. general ledger comparison

pub mod reconcile;

#[cfg(test)]
mod props;

use rust_decimal::Decimal;

use crate::accounts::NormalBalance;
use crate::journal::EntryStatus;

pub use reconcile::{
    Discrepancy, GlBalance, ReconciliationMetrics, ReconciliationReport, ReconciliationStatus,
    SubledgerBalance, reconcile_subledger,
};

/// Stateless balance arithmetic.
pub struct BalanceService;

impl BalanceService {
    /// Incremental update: `current` moved by one delta, signed by normal balance.
    #[must_use]
    pub fn apply_delta(
        current: Decimal,
        normal: NormalBalance,
        debit: Decimal,
        credit: Decimal,
    ) -> Decimal {
        current + normal.balance_change(debit, credit)
    }

    /// Full recompute from `(status, debit, credit)` line triples.
    ///
    /// Only lines of entries whose status affects balances are counted.
    pub fn recompute(
        normal: NormalBalance,
        lines: impl IntoIterator<Item = (EntryStatus, Decimal, Decimal)>,
    ) -> Decimal {
        lines
            .into_iter()
            .filter(|(status, ..)| status.affects_balances())
            .fold(Decimal::ZERO, |acc, (_, debit, credit)| {
                acc + normal.balance_change(debit, credit)
            })
    }
}
