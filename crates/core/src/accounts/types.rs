//! Account types and the normal-balance sign table.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tally_shared::types::AccountId;

use crate::error::{LedgerError, UnavailableReason};

/// The side on which an account naturally increases.
///
/// - Asset/Expense: balance += debit - credit (debit-normal)
/// - Liability/Equity/Revenue: balance += credit - debit (credit-normal)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NormalBalance {
    /// Debit-normal accounts (Asset, Expense).
    Debit,
    /// Credit-normal accounts (Liability, Equity, Revenue).
    Credit,
}

impl NormalBalance {
    /// Calculates the signed balance change for a debit/credit pair.
    #[must_use]
    pub fn balance_change(self, debit: Decimal, credit: Decimal) -> Decimal {
        match self {
            Self::Debit => debit - credit,
            Self::Credit => credit - debit,
        }
    }

    /// Returns the `(debit, credit)` pair that moves a balance by `change`.
    ///
    /// Exactly one side is non-zero unless `change` is zero.
    #[must_use]
    pub fn amounts_for_change(self, change: Decimal) -> (Decimal, Decimal) {
        let increase_side_debit = matches!(self, Self::Debit);
        match (change >= Decimal::ZERO, increase_side_debit) {
            (true, true) | (false, false) => (change.abs(), Decimal::ZERO),
            (true, false) | (false, true) => (Decimal::ZERO, change.abs()),
        }
    }
}

/// Chart-of-accounts classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountType {
    /// Resources owned.
    Asset,
    /// Obligations owed.
    Liability,
    /// Owners' residual interest.
    Equity,
    /// Income; closed into retained earnings each period.
    Revenue,
    /// Costs; closed into retained earnings each period.
    Expense,
}

impl AccountType {
    /// All types in chart order.
    pub const ALL: [Self; 5] = [
        Self::Asset,
        Self::Liability,
        Self::Equity,
        Self::Revenue,
        Self::Expense,
    ];

    /// Normal-balance lookup.
    #[must_use]
    pub const fn normal_balance(self) -> NormalBalance {
        match self {
            Self::Asset | Self::Expense => NormalBalance::Debit,
            Self::Liability | Self::Equity | Self::Revenue => NormalBalance::Credit,
        }
    }

    /// Temporary accounts are zeroed by period-end closing.
    #[must_use]
    pub const fn is_temporary(self) -> bool {
        matches!(self, Self::Revenue | Self::Expense)
    }

    /// Returns the stored representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Asset => "ASSET",
            Self::Liability => "LIABILITY",
            Self::Equity => "EQUITY",
            Self::Revenue => "REVENUE",
            Self::Expense => "EXPENSE",
        }
    }
}

impl std::fmt::Display for AccountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AccountType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown account type: {s}"))
    }
}

/// A chart-of-accounts entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Account id.
    pub id: AccountId,
    /// Unique code, hierarchical by convention (e.g. "1101").
    pub code: String,
    /// Display name.
    pub name: String,
    /// Classification.
    pub account_type: AccountType,
    /// Aggregation-only node; never posted to.
    pub is_header: bool,
    /// Parent in the hierarchy.
    pub parent_id: Option<AccountId>,
    /// Stored running balance, signed by normal balance.
    pub balance: Decimal,
    /// Inactive accounts keep their history but accept no postings.
    pub is_active: bool,
}

impl Account {
    /// Creates an active, zero-balance account.
    #[must_use]
    pub fn new(code: impl Into<String>, name: impl Into<String>, account_type: AccountType) -> Self {
        Self {
            id: AccountId::new(),
            code: code.into(),
            name: name.into(),
            account_type,
            is_header: false,
            parent_id: None,
            balance: Decimal::ZERO,
            is_active: true,
        }
    }

    /// Marks the account as a header.
    #[must_use]
    pub fn header(mut self) -> Self {
        self.is_header = true;
        self
    }

    /// Sets the parent.
    #[must_use]
    pub fn with_parent(mut self, parent_id: AccountId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    /// Normal-balance side for this account's type.
    #[must_use]
    pub const fn normal_balance(&self) -> NormalBalance {
        self.account_type.normal_balance()
    }

    /// False for header or inactive accounts.
    #[must_use]
    pub const fn is_postable(&self) -> bool {
        self.is_active && !self.is_header
    }

    /// Fails with `AccountUnavailable` unless the account is postable.
    pub fn require_postable(&self) -> Result<(), LedgerError> {
        let reason = if self.is_header {
            UnavailableReason::Header
        } else if !self.is_active {
            UnavailableReason::Inactive
        } else {
            return Ok(());
        };
        Err(LedgerError::AccountUnavailable {
            account_id: self.id,
            reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    #[rstest]
    #[case(AccountType::Asset, NormalBalance::Debit)]
    #[case(AccountType::Expense, NormalBalance::Debit)]
    #[case(AccountType::Liability, NormalBalance::Credit)]
    #[case(AccountType::Equity, NormalBalance::Credit)]
    #[case(AccountType::Revenue, NormalBalance::Credit)]
    fn test_normal_balance_table(#[case] account_type: AccountType, #[case] normal: NormalBalance) {
        assert_eq!(account_type.normal_balance(), normal);
    }

    #[test]
    fn test_balance_change() {
        assert_eq!(NormalBalance::Debit.balance_change(dec!(100), dec!(30)), dec!(70));
        assert_eq!(NormalBalance::Credit.balance_change(dec!(100), dec!(30)), dec!(-70));
    }

    #[rstest]
    #[case(NormalBalance::Debit, dec!(50), (dec!(50), dec!(0)))]
    #[case(NormalBalance::Debit, dec!(-50), (dec!(0), dec!(50)))]
    #[case(NormalBalance::Credit, dec!(50), (dec!(0), dec!(50)))]
    #[case(NormalBalance::Credit, dec!(-50), (dec!(50), dec!(0)))]
    fn test_amounts_for_change(
        #[case] normal: NormalBalance,
        #[case] change: Decimal,
        #[case] expected: (Decimal, Decimal),
    ) {
        let (debit, credit) = normal.amounts_for_change(change);
        assert_eq!((debit, credit), expected);
        assert_eq!(normal.balance_change(debit, credit), change);
    }

    #[test]
    fn test_temporary_types() {
        assert!(AccountType::Revenue.is_temporary());
        assert!(AccountType::Expense.is_temporary());
        assert!(!AccountType::Equity.is_temporary());
    }

    #[test]
    fn test_account_type_parse() {
        assert_eq!("revenue".parse::<AccountType>().unwrap(), AccountType::Revenue);
        assert_eq!("ASSET".parse::<AccountType>().unwrap(), AccountType::Asset);
        assert!("income".parse::<AccountType>().is_err());
    }

    #[test]
    fn test_require_postable() {
        let cash = Account::new("1101", "Cash", AccountType::Asset);
        assert!(cash.require_postable().is_ok());

        let header = Account::new("1000", "Assets", AccountType::Asset).header();
        assert!(matches!(
            header.require_postable(),
            Err(LedgerError::AccountUnavailable {
                reason: UnavailableReason::Header,
                ..
            })
        ));

        let mut legacy = Account::new("1199", "Old Cash", AccountType::Asset);
        legacy.is_active = false;
        assert!(!legacy.is_postable());
        assert!(matches!(
            legacy.require_postable(),
            Err(LedgerError::AccountUnavailable {
                reason: UnavailableReason::Inactive,
                ..
            })
        ));
    }
}
