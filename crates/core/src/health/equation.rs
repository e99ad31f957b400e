//! Accounting equation check.
//!
//! Assets = Liabilities + Equity + (Revenue - Expense), evaluated over the
//! stored account balances, plus per-account drift between the stored
//! balance and the balance derived from posted lines.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tally_shared::types::{AccountId, is_negligible};

use crate::accounts::{Account, AccountType};

/// Stored and line-derived balance of one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountSnapshot {
    /// Account id.
    pub account_id: AccountId,
    /// Account code.
    pub code: String,
    /// Account name.
    pub name: String,
    /// Classification.
    pub account_type: AccountType,
    /// Header accounts should never hold a stored balance.
    pub is_header: bool,
    /// Balance column as stored.
    pub stored: Decimal,
    /// Balance recomputed from posted lines; zero for headers.
    pub recomputed: Decimal,
}

impl AccountSnapshot {
    /// Pairs an account with its recomputed balance.
    #[must_use]
    pub fn new(account: &Account, recomputed: Decimal) -> Self {
        Self {
            account_id: account.id,
            code: account.code.clone(),
            name: account.name.clone(),
            account_type: account.account_type,
            is_header: account.is_header,
            stored: account.balance,
            recomputed: if account.is_header {
                Decimal::ZERO
            } else {
                recomputed
            },
        }
    }
}

/// Stored balance totals per account type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct TypeTotals {
    /// Σ assets.
    pub assets: Decimal,
    /// Σ liabilities.
    pub liabilities: Decimal,
    /// Σ equity.
    pub equity: Decimal,
    /// Σ revenue.
    pub revenue: Decimal,
    /// Σ expense.
    pub expense: Decimal,
}

impl TypeTotals {
    fn add(&mut self, account_type: AccountType, amount: Decimal) {
        match account_type {
            AccountType::Asset => self.assets += amount,
            AccountType::Liability => self.liabilities += amount,
            AccountType::Equity => self.equity += amount,
            AccountType::Revenue => self.revenue += amount,
            AccountType::Expense => self.expense += amount,
        }
    }

    /// Revenue minus expense.
    #[must_use]
    pub fn net_income(&self) -> Decimal {
        self.revenue - self.expense
    }
}

/// What kind of drift an account shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftKind {
    /// Header account holds a stored balance.
    HeaderBalance,
    /// Stored balance differs from the posted lines.
    BalanceMismatch,
}

/// A non-fatal health finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DriftFinding {
    /// Always `DRIFT_DETECTED`.
    pub code: &'static str,
    /// Kind of drift.
    pub kind: DriftKind,
    /// Affected account.
    pub account_id: AccountId,
    /// Account code.
    pub account_code: String,
    /// Stored balance.
    pub stored: Decimal,
    /// Balance the account should hold.
    pub expected: Decimal,
    /// Stored minus expected.
    pub amount: Decimal,
    /// Human-readable description.
    pub message: String,
}

impl DriftFinding {
    /// Stable finding code.
    pub const CODE: &'static str = "DRIFT_DETECTED";

    fn from_snapshot(snapshot: &AccountSnapshot) -> Option<Self> {
        let amount = snapshot.stored - snapshot.recomputed;
        if amount.is_zero() {
            return None;
        }
        let (kind, message) = if snapshot.is_header {
            (
                DriftKind::HeaderBalance,
                format!(
                    "Header account {} {} has a non-zero balance of {}",
                    snapshot.code, snapshot.name, snapshot.stored
                ),
            )
        } else {
            (
                DriftKind::BalanceMismatch,
                format!(
                    "Account {} {} stored balance {} differs from posted lines {}",
                    snapshot.code, snapshot.name, snapshot.stored, snapshot.recomputed
                ),
            )
        };
        Some(Self {
            code: Self::CODE,
            kind,
            account_id: snapshot.account_id,
            account_code: snapshot.code.clone(),
            stored: snapshot.stored,
            expected: snapshot.recomputed,
            amount,
            message,
        })
    }
}

/// Result of an equation check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EquationReport {
    /// True if the equation holds within tolerance.
    pub is_valid: bool,
    /// Totals by type.
    pub totals: TypeTotals,
    /// Revenue minus expense.
    pub net_income: Decimal,
    /// Equity plus net income.
    pub adjusted_equity: Decimal,
    /// Assets minus (liabilities + adjusted equity).
    pub difference: Decimal,
    /// Problems found, most severe first.
    pub diagnoses: Vec<String>,
    /// Suggested follow-ups.
    pub recommendations: Vec<String>,
    /// Per-account drift.
    pub drift: Vec<DriftFinding>,
    /// Check time.
    pub checked_at: DateTime<Utc>,
}

impl EquationReport {
    /// Equation holds and no account drifts.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.is_valid && self.drift.is_empty()
    }
}

/// Evaluates the equation and per-account drift.
#[must_use]
pub fn check_equation(snapshots: &[AccountSnapshot], now: DateTime<Utc>) -> EquationReport {
    let mut totals = TypeTotals::default();
    for snapshot in snapshots {
        totals.add(snapshot.account_type, snapshot.stored);
    }

    let net_income = totals.net_income();
    let adjusted_equity = totals.equity + net_income;
    let right_side = totals.liabilities + adjusted_equity;
    let difference = totals.assets - right_side;
    let is_valid = is_negligible(difference);

    let mut drift: Vec<DriftFinding> = snapshots.iter().filter_map(DriftFinding::from_snapshot).collect();
    drift.sort_by(|a, b| a.account_code.cmp(&b.account_code));

    let mut diagnoses = Vec::new();
    if !is_valid {
        diagnoses.push(format!(
            "Accounting equation not balanced: Assets ({}) != Liabilities + Equity + Net Income ({right_side}). Difference: {difference}",
            totals.assets
        ));
    }
    diagnoses.extend(drift.iter().map(|d| d.message.clone()));
    if net_income < Decimal::ZERO {
        diagnoses.push(format!(
            "Net loss detected: {net_income} (Revenue: {}, Expenses: {})",
            totals.revenue, totals.expense
        ));
    }

    let mut recommendations = Vec::new();
    if !is_valid {
        recommendations.push(if difference > Decimal::ZERO {
            "Assets exceed Liabilities + Equity. Check for missing liabilities or understated equity.".to_string()
        } else {
            "Liabilities + Equity exceed Assets. Check for missing assets or overstated liabilities.".to_string()
        });
    }
    if !drift.is_empty() {
        recommendations
            .push("Run auto-heal to clear header balances and recompute drifted accounts.".to_string());
    }
    if !net_income.is_zero() {
        recommendations.push(
            "Consider running period-end closing entries to move net income to retained earnings."
                .to_string(),
        );
    }

    EquationReport {
        is_valid,
        totals,
        net_income,
        adjusted_equity,
        difference,
        diagnoses,
        recommendations,
        drift,
        checked_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn snap(account: &Account, recomputed: Decimal) -> AccountSnapshot {
        AccountSnapshot::new(account, recomputed)
    }

    fn with_balance(mut account: Account, balance: Decimal) -> Account {
        account.balance = balance;
        account
    }

    #[test]
    fn test_balanced_ledger_is_healthy() {
        let cash = with_balance(Account::new("1101", "Cash", AccountType::Asset), dec!(1000000));
        let sales = with_balance(
            Account::new("4101", "Sales Revenue", AccountType::Revenue),
            dec!(1000000),
        );
        let report = check_equation(
            &[snap(&cash, dec!(1000000)), snap(&sales, dec!(1000000))],
            Utc::now(),
        );

        assert!(report.is_valid);
        assert!(report.is_healthy());
        assert_eq!(report.net_income, dec!(1000000));
        assert_eq!(report.difference, dec!(0));
        assert!(report.diagnoses.is_empty());
        assert_eq!(report.recommendations.len(), 1);
        assert!(report.recommendations[0].contains("closing entries"));
    }

    #[test]
    fn test_header_balance_breaks_equation() {
        let cash = with_balance(Account::new("1101", "Cash", AccountType::Asset), dec!(500));
        let capital = with_balance(Account::new("3101", "Capital", AccountType::Equity), dec!(500));
        let header = with_balance(Account::new("1000", "Assets", AccountType::Asset).header(), dec!(75));

        let report = check_equation(
            &[snap(&cash, dec!(500)), snap(&capital, dec!(500)), snap(&header, dec!(0))],
            Utc::now(),
        );

        assert!(!report.is_valid);
        assert_eq!(report.difference, dec!(75));
        assert_eq!(report.drift.len(), 1);
        assert_eq!(report.drift[0].kind, DriftKind::HeaderBalance);
        assert_eq!(report.drift[0].code, "DRIFT_DETECTED");
        assert_eq!(report.drift[0].amount, dec!(75));
        assert!(report.diagnoses[0].starts_with("Accounting equation not balanced"));
        assert!(report.diagnoses[1].contains("Header account 1000"));
        assert!(report.recommendations[0].starts_with("Assets exceed"));
    }

    #[test]
    fn test_mismatch_detected_and_understated_assets() {
        let cash = with_balance(Account::new("1101", "Cash", AccountType::Asset), dec!(400));
        let capital = with_balance(Account::new("3101", "Capital", AccountType::Equity), dec!(500));
        let report = check_equation(
            &[snap(&cash, dec!(500)), snap(&capital, dec!(500))],
            Utc::now(),
        );

        assert!(!report.is_valid);
        assert_eq!(report.difference, dec!(-100));
        assert_eq!(report.drift[0].kind, DriftKind::BalanceMismatch);
        assert_eq!(report.drift[0].expected, dec!(500));
        assert!(report.recommendations[0].starts_with("Liabilities + Equity exceed"));
    }

    #[test]
    fn test_net_loss_is_diagnosed() {
        let cash = with_balance(Account::new("1101", "Cash", AccountType::Asset), dec!(-200));
        let rent = with_balance(Account::new("6101", "Rent", AccountType::Expense), dec!(200));
        let report = check_equation(&[snap(&cash, dec!(-200)), snap(&rent, dec!(200))], Utc::now());

        assert!(report.is_valid);
        assert!(report.drift.is_empty());
        assert_eq!(report.net_income, dec!(-200));
        assert!(report.diagnoses[0].starts_with("Net loss detected"));
    }

    #[test]
    fn test_rounding_within_tolerance() {
        let cash = with_balance(Account::new("1101", "Cash", AccountType::Asset), dec!(100.005));
        let capital = with_balance(Account::new("3101", "Capital", AccountType::Equity), dec!(100));
        let report = check_equation(
            &[snap(&cash, dec!(100.005)), snap(&capital, dec!(100))],
            Utc::now(),
        );
        assert!(report.is_valid);
    }
}
