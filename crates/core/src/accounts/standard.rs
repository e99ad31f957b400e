//! A small default chart of accounts.

use super::types::{Account, AccountType};

/// `(code, name, type, parent code)` rows.
const STANDARD_CHART: &[(&str, &str, AccountType, Option<&str>)] = &[
    ("1000", "Assets", AccountType::Asset, None),
    ("1100", "Current Assets", AccountType::Asset, Some("1000")),
    ("1101", "Cash", AccountType::Asset, Some("1100")),
    ("1102", "Bank", AccountType::Asset, Some("1100")),
    ("1201", "Accounts Receivable", AccountType::Asset, Some("1100")),
    ("1301", "Inventory", AccountType::Asset, Some("1100")),
    ("1501", "Equipment", AccountType::Asset, Some("1000")),
    ("2000", "Liabilities", AccountType::Liability, None),
    ("2101", "Accounts Payable", AccountType::Liability, Some("2000")),
    ("2102", "Tax Payable", AccountType::Liability, Some("2000")),
    ("3000", "Equity", AccountType::Equity, None),
    ("3101", "Share Capital", AccountType::Equity, Some("3000")),
    ("3201", "Retained Earnings", AccountType::Equity, Some("3000")),
    ("4000", "Revenue", AccountType::Revenue, None),
    ("4101", "Sales Revenue", AccountType::Revenue, Some("4000")),
    ("4201", "Service Revenue", AccountType::Revenue, Some("4000")),
    ("5000", "Expenses", AccountType::Expense, None),
    ("5101", "Cost of Goods Sold", AccountType::Expense, Some("5000")),
    ("5201", "Salaries Expense", AccountType::Expense, Some("5000")),
    ("5202", "Rent Expense", AccountType::Expense, Some("5000")),
];

/// Codes that only aggregate their children.
const HEADER_CODES: &[&str] = &["1000", "1100", "2000", "3000", "4000", "5000"];

/// Builds the default chart with fresh ids, parents before children.
#[must_use]
pub fn standard_accounts() -> Vec<Account> {
    let mut accounts: Vec<Account> = Vec::with_capacity(STANDARD_CHART.len());
    for &(code, name, account_type, parent_code) in STANDARD_CHART {
        let mut account = Account::new(code, name, account_type);
        if HEADER_CODES.contains(&code) {
            account = account.header();
        }
        if let Some(parent) = parent_code.and_then(|p| accounts.iter().find(|a| a.code == p)) {
            account = account.with_parent(parent.id);
        }
        accounts.push(account);
    }
    accounts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::ChartOfAccounts;

    #[test]
    fn test_standard_chart_is_valid() {
        let chart = ChartOfAccounts::new(standard_accounts()).unwrap();
        assert_eq!(chart.len(), STANDARD_CHART.len());

        let retained = chart.find_by_code("3201").unwrap();
        assert_eq!(retained.account_type, AccountType::Equity);
        assert!(retained.is_postable());

        let current = chart.find_by_code("1100").unwrap();
        assert!(current.is_header);
        assert_eq!(chart.children(current.id).count(), 4);
    }
}
