//! Safe balance corrections.
//!
//! Only two fixes are whitelisted: zeroing a header account's stored
//! balance, and rewriting a drifted account's balance from its posted lines.
//! No journal entry is ever invented to force the equation to balance.

use rust_decimal::Decimal;
use serde::Serialize;
use tally_shared::types::AccountId;

use super::equation::{DriftFinding, DriftKind, EquationReport};

/// One correction applied by auto-heal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum HealAction {
    /// Set a header account's stored balance to zero.
    ClearHeaderBalance {
        /// Header account.
        account_id: AccountId,
        /// Account code.
        account_code: String,
        /// Balance before the fix.
        previous: Decimal,
    },
    /// Replace a stored balance with the recomputed one.
    Recompute {
        /// Account.
        account_id: AccountId,
        /// Account code.
        account_code: String,
        /// Balance before the fix.
        previous: Decimal,
        /// Balance derived from posted lines.
        recomputed: Decimal,
    },
}

impl HealAction {
    /// Account the action writes.
    #[must_use]
    pub const fn account_id(&self) -> AccountId {
        match self {
            Self::ClearHeaderBalance { account_id, .. } | Self::Recompute { account_id, .. } => {
                *account_id
            }
        }
    }

    /// Balance the account holds after the action.
    #[must_use]
    pub const fn new_balance(&self) -> Decimal {
        match self {
            Self::ClearHeaderBalance { .. } => Decimal::ZERO,
            Self::Recompute { recomputed, .. } => *recomputed,
        }
    }

    fn from_finding(finding: &DriftFinding) -> Self {
        match finding.kind {
            DriftKind::HeaderBalance => Self::ClearHeaderBalance {
                account_id: finding.account_id,
                account_code: finding.account_code.clone(),
                previous: finding.stored,
            },
            DriftKind::BalanceMismatch => Self::Recompute {
                account_id: finding.account_id,
                account_code: finding.account_code.clone(),
                previous: finding.stored,
                recomputed: finding.expected,
            },
        }
    }
}

/// Outcome of an auto-heal run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealingResult {
    /// Corrections applied.
    pub actions: Vec<HealAction>,
    /// Report before healing.
    pub before: EquationReport,
    /// Report after healing.
    pub after: EquationReport,
    /// Drift still present after healing.
    pub remaining_drift: Vec<DriftFinding>,
    /// True if the ledger is healthy after healing.
    pub healed: bool,
}

impl HealingResult {
    /// Combines the two reports.
    #[must_use]
    pub fn new(actions: Vec<HealAction>, before: EquationReport, after: EquationReport) -> Self {
        Self {
            actions,
            healed: after.is_healthy(),
            remaining_drift: after.drift.clone(),
            before,
            after,
        }
    }
}

/// Corrections for every drift finding in `report`.
#[must_use]
pub fn plan_heal(report: &EquationReport) -> Vec<HealAction> {
    report.drift.iter().map(HealAction::from_finding).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::{Account, AccountType};
    use crate::health::equation::{AccountSnapshot, check_equation};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    #[test]
    fn test_plan_covers_each_finding() {
        let mut header = Account::new("1000", "Assets", AccountType::Asset).header();
        header.balance = dec!(75);
        let mut cash = Account::new("1101", "Cash", AccountType::Asset);
        cash.balance = dec!(90);

        let report = check_equation(
            &[AccountSnapshot::new(&header, dec!(0)), AccountSnapshot::new(&cash, dec!(100))],
            Utc::now(),
        );
        let actions = plan_heal(&report);

        assert_eq!(actions.len(), 2);
        assert_eq!(
            actions[0],
            HealAction::ClearHeaderBalance {
                account_id: header.id,
                account_code: "1000".to_string(),
                previous: dec!(75),
            }
        );
        assert_eq!(actions[1].account_id(), cash.id);
        assert_eq!(actions[1].new_balance(), dec!(100));
    }

    #[test]
    fn test_no_drift_no_actions() {
        let cash = Account::new("1101", "Cash", AccountType::Asset);
        let report = check_equation(&[AccountSnapshot::new(&cash, dec!(0))], Utc::now());
        assert!(plan_heal(&report).is_empty());
    }

    #[test]
    fn test_result_reports_remaining_drift() {
        let mut cash = Account::new("1101", "Cash", AccountType::Asset);
        cash.balance = dec!(10);
        let before = check_equation(&[AccountSnapshot::new(&cash, dec!(0))], Utc::now());
        let after = before.clone();
        let result = HealingResult::new(vec![], before, after);
        assert!(!result.healed);
        assert_eq!(result.remaining_drift.len(), 1);
    }
}
