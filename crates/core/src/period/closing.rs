//! Closing-entry generation.
//!
//! At period end every revenue and expense account is zeroed by one
//! composite entry, with the net result moved into retained earnings.

use std::collections::HashMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use tally_shared::types::{AccountId, JournalEntryId, is_negligible};

use super::types::{PeriodKey, PeriodStatus};
use crate::accounts::{Account, AccountType};
use crate::error::{LedgerError, UnclosedAccount};
use crate::journal::{JournalEntry, LineInput};

/// A temporary account considered for closing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosingCandidate {
    /// Account id.
    pub account_id: AccountId,
    /// Account code.
    pub code: String,
    /// Account name.
    pub name: String,
    /// REVENUE or EXPENSE.
    pub account_type: AccountType,
    /// Header accounts are never posted to.
    pub is_header: bool,
    /// Inactive accounts are never posted to.
    pub is_active: bool,
    /// Balance as of the period end for postable accounts, the stored
    /// balance for headers; signed by normal balance.
    pub balance: Decimal,
}

impl ClosingCandidate {
    /// Builds a candidate from an account and its as-of balance.
    #[must_use]
    pub fn from_account(account: &Account, balance: Decimal) -> Self {
        Self {
            account_id: account.id,
            code: account.code.clone(),
            name: account.name.clone(),
            account_type: account.account_type,
            is_header: account.is_header,
            is_active: account.is_active,
            balance: if account.is_header {
                account.balance
            } else {
                balance
            },
        }
    }

    const fn is_closable(&self) -> bool {
        self.account_type.is_temporary() && self.is_active && !self.is_header
    }

    fn to_unclosed(&self) -> UnclosedAccount {
        UnclosedAccount {
            account_id: self.account_id,
            code: self.code.clone(),
            name: self.name.clone(),
            account_type: self.account_type,
            balance: self.balance,
        }
    }
}

/// One account zeroed by the closing entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountClosure {
    /// Account id.
    pub account_id: AccountId,
    /// Account code.
    pub code: String,
    /// Account name.
    pub name: String,
    /// REVENUE or EXPENSE.
    pub account_type: AccountType,
    /// Balance before closing.
    pub balance: Decimal,
}

/// The generated closing entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosingPlan {
    /// Lines zeroing each account, then the retained earnings line.
    /// Empty when there is nothing to close.
    pub lines: Vec<LineInput>,
    /// Accounts the lines zero out.
    pub closed_accounts: Vec<AccountClosure>,
    /// Sum of revenue balances closed.
    pub total_revenue: Decimal,
    /// Sum of expense balances closed.
    pub total_expense: Decimal,
    /// Revenue minus expense.
    pub net_income: Decimal,
}

impl ClosingPlan {
    /// True if no closing entry is needed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// A draft still dated in the period being closed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DraftWarning {
    /// Entry id.
    pub entry_id: JournalEntryId,
    /// Entry number.
    pub entry_number: String,
    /// Entry date.
    pub entry_date: NaiveDate,
    /// Entry description.
    pub description: String,
}

impl From<&JournalEntry> for DraftWarning {
    fn from(entry: &JournalEntry) -> Self {
        Self {
            entry_id: entry.id,
            entry_number: entry.entry_number.clone(),
            entry_date: entry.entry_date,
            description: entry.description.clone(),
        }
    }
}

/// What closing a period would do, without doing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClosingPreview {
    /// The period.
    pub period: PeriodKey,
    /// Current status.
    pub status: PeriodStatus,
    /// Sum of revenue balances to close.
    pub total_revenue: Decimal,
    /// Sum of expense balances to close.
    pub total_expense: Decimal,
    /// Revenue minus expense.
    pub net_income: Decimal,
    /// Accounts the closing entry would zero.
    pub closed_accounts: Vec<AccountClosure>,
    /// Lines of the closing entry.
    pub lines: Vec<LineInput>,
    /// Accounts that would still carry a balance afterwards.
    pub blocking_accounts: Vec<UnclosedAccount>,
    /// Drafts dated in the period; they will not be posted by closing.
    pub draft_entries: Vec<DraftWarning>,
    /// True if `close` would succeed now.
    pub can_close: bool,
}

/// Stateless closing rules.
pub struct ClosingService;

impl ClosingService {
    /// Fails unless `retained` is an active, postable equity account.
    pub fn require_retained_earnings<'a>(
        retained: Option<&'a Account>,
        code: &str,
    ) -> Result<&'a Account, LedgerError> {
        match retained {
            Some(account) if account.account_type == AccountType::Equity && account.is_postable() => {
                Ok(account)
            }
            _ => Err(LedgerError::RetainedEarningsUnavailable {
                code: code.to_string(),
            }),
        }
    }

    /// Generates the closing entry for `candidates`.
    ///
    /// Each active non-header revenue or expense account with a non-zero
    /// balance gets one line moving it to zero; retained earnings receives a
    /// single net line, credited for net income and debited for a net loss,
    /// omitted when the net is zero.
    pub fn plan(
        period: PeriodKey,
        candidates: &[ClosingCandidate],
        retained: &Account,
    ) -> ClosingPlan {
        let mut ordered: Vec<&ClosingCandidate> = candidates
            .iter()
            .filter(|c| c.is_closable() && !c.balance.is_zero())
            .collect();
        ordered.sort_by(|a, b| a.code.cmp(&b.code));

        let mut lines = Vec::with_capacity(ordered.len() + 1);
        let mut closed_accounts = Vec::with_capacity(ordered.len());
        let mut total_revenue = Decimal::ZERO;
        let mut total_expense = Decimal::ZERO;

        for candidate in ordered {
            let normal = candidate.account_type.normal_balance();
            let (debit, credit) = normal.amounts_for_change(-candidate.balance);
            lines.push(LineInput {
                account_id: candidate.account_id,
                debit,
                credit,
                description: Some(format!(
                    "Close {} {} for {period}",
                    candidate.code, candidate.name
                )),
            });
            match candidate.account_type {
                AccountType::Revenue => total_revenue += candidate.balance,
                _ => total_expense += candidate.balance,
            }
            closed_accounts.push(AccountClosure {
                account_id: candidate.account_id,
                code: candidate.code.clone(),
                name: candidate.name.clone(),
                account_type: candidate.account_type,
                balance: candidate.balance,
            });
        }

        let net_income = total_revenue - total_expense;
        if !net_income.is_zero() {
            let (debit, credit) = retained.normal_balance().amounts_for_change(net_income);
            let label = if net_income > Decimal::ZERO {
                "Net income"
            } else {
                "Net loss"
            };
            lines.push(LineInput {
                account_id: retained.id,
                debit,
                credit,
                description: Some(format!("{label} for {period} to retained earnings")),
            });
        }

        ClosingPlan {
            lines,
            closed_accounts,
            total_revenue,
            total_expense,
            net_income,
        }
    }

    /// Candidate balances after the plan's lines are applied.
    #[must_use]
    pub fn project(candidates: &[ClosingCandidate], plan: &ClosingPlan) -> Vec<ClosingCandidate> {
        let mut moved: HashMap<AccountId, (Decimal, Decimal)> = HashMap::new();
        for line in &plan.lines {
            let slot = moved.entry(line.account_id).or_default();
            slot.0 += line.debit;
            slot.1 += line.credit;
        }
        candidates
            .iter()
            .map(|c| {
                let mut after = c.clone();
                if let Some(&(debit, credit)) = moved.get(&c.account_id) {
                    after.balance += c.account_type.normal_balance().balance_change(debit, credit);
                }
                after
            })
            .collect()
    }

    /// Temporary accounts still carrying a balance.
    ///
    /// Postable balances are compared within tolerance; header accounts
    /// must hold exactly nothing.
    #[must_use]
    pub fn find_unclosed(candidates: &[ClosingCandidate]) -> Vec<UnclosedAccount> {
        let mut unclosed: Vec<UnclosedAccount> = candidates
            .iter()
            .filter(|c| c.account_type.is_temporary())
            .filter(|c| {
                if c.is_header {
                    !c.balance.is_zero()
                } else {
                    !is_negligible(c.balance)
                }
            })
            .map(ClosingCandidate::to_unclosed)
            .collect();
        unclosed.sort_by(|a, b| a.code.cmp(&b.code));
        unclosed
    }

    /// Fails with `UnclosedBalances` if anything remains after closing.
    pub fn ensure_closed(
        period: PeriodKey,
        after: &[ClosingCandidate],
    ) -> Result<(), LedgerError> {
        let accounts = Self::find_unclosed(after);
        if accounts.is_empty() {
            Ok(())
        } else {
            Err(LedgerError::UnclosedBalances { period, accounts })
        }
    }

    /// Assembles a preview from the plan and the projected balances.
    #[must_use]
    pub fn preview(
        period: PeriodKey,
        status: PeriodStatus,
        candidates: &[ClosingCandidate],
        plan: ClosingPlan,
        drafts: Vec<DraftWarning>,
    ) -> ClosingPreview {
        let blocking_accounts = Self::find_unclosed(&Self::project(candidates, &plan));
        let can_close = status == PeriodStatus::Open && blocking_accounts.is_empty();
        ClosingPreview {
            period,
            status,
            total_revenue: plan.total_revenue,
            total_expense: plan.total_expense,
            net_income: plan.net_income,
            closed_accounts: plan.closed_accounts,
            lines: plan.lines,
            blocking_accounts,
            draft_entries: drafts,
            can_close,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::EntryTotals;
    use rust_decimal_macros::dec;

    fn key() -> PeriodKey {
        PeriodKey::new(2026, 3).unwrap()
    }

    fn retained() -> Account {
        Account::new("3201", "Retained Earnings", AccountType::Equity)
    }

    fn candidate(code: &str, account_type: AccountType, balance: Decimal) -> ClosingCandidate {
        let account = Account::new(code, format!("Account {code}"), account_type);
        ClosingCandidate::from_account(&account, balance)
    }

    #[test]
    fn test_close_revenue_only() {
        let re = retained();
        let sales = candidate("4101", AccountType::Revenue, dec!(5000000));
        let plan = ClosingService::plan(key(), std::slice::from_ref(&sales), &re);

        assert_eq!(plan.lines.len(), 2);
        assert_eq!(plan.lines[0].account_id, sales.account_id);
        assert_eq!(plan.lines[0].debit, dec!(5000000));
        assert_eq!(plan.lines[1].account_id, re.id);
        assert_eq!(plan.lines[1].credit, dec!(5000000));
        assert_eq!(plan.net_income, dec!(5000000));

        let totals = EntryTotals::from_amounts(plan.lines.iter().map(|l| (l.debit, l.credit)));
        assert!(totals.is_balanced);
    }

    #[test]
    fn test_net_loss_debits_retained_earnings() {
        let re = retained();
        let candidates = [
            candidate("4101", AccountType::Revenue, dec!(1000)),
            candidate("6101", AccountType::Expense, dec!(1500)),
        ];
        let plan = ClosingService::plan(key(), &candidates, &re);

        assert_eq!(plan.lines.len(), 3);
        assert_eq!((plan.lines[1].debit, plan.lines[1].credit), (dec!(0), dec!(1500)));
        assert_eq!((plan.lines[2].debit, plan.lines[2].credit), (dec!(500), dec!(0)));
        assert_eq!(plan.net_income, dec!(-500));
    }

    #[test]
    fn test_break_even_omits_retained_line() {
        let candidates = [
            candidate("4101", AccountType::Revenue, dec!(800)),
            candidate("6101", AccountType::Expense, dec!(800)),
        ];
        let plan = ClosingService::plan(key(), &candidates, &retained());
        assert_eq!(plan.lines.len(), 2);
        assert!(plan.net_income.is_zero());
    }

    #[test]
    fn test_nothing_to_close() {
        let candidates = [candidate("4101", AccountType::Revenue, dec!(0))];
        let plan = ClosingService::plan(key(), &candidates, &retained());
        assert!(plan.is_empty());
        assert!(ClosingService::ensure_closed(key(), &candidates).is_ok());
    }

    #[test]
    fn test_contra_balance_is_closed_on_the_other_side() {
        let candidates = [candidate("4102", AccountType::Revenue, dec!(-200))];
        let plan = ClosingService::plan(key(), &candidates, &retained());
        assert_eq!((plan.lines[0].debit, plan.lines[0].credit), (dec!(0), dec!(200)));
        assert_eq!((plan.lines[1].debit, plan.lines[1].credit), (dec!(200), dec!(0)));
    }

    #[test]
    fn test_projection_zeroes_closed_accounts() {
        let candidates = [
            candidate("4101", AccountType::Revenue, dec!(1200.50)),
            candidate("6101", AccountType::Expense, dec!(300.25)),
        ];
        let plan = ClosingService::plan(key(), &candidates, &retained());
        let after = ClosingService::project(&candidates, &plan);
        assert!(after.iter().all(|c| c.balance.is_zero()));
        assert!(ClosingService::ensure_closed(key(), &after).is_ok());
    }

    #[test]
    fn test_inactive_account_blocks_close() {
        let mut legacy = Account::new("4199", "Legacy Revenue", AccountType::Revenue);
        legacy.is_active = false;
        let candidates = [
            candidate("4101", AccountType::Revenue, dec!(100)),
            ClosingCandidate::from_account(&legacy, dec!(250)),
        ];
        let plan = ClosingService::plan(key(), &candidates, &retained());
        let after = ClosingService::project(&candidates, &plan);

        match ClosingService::ensure_closed(key(), &after) {
            Err(LedgerError::UnclosedBalances { period, accounts }) => {
                assert_eq!(period, key());
                assert_eq!(accounts.len(), 1);
                assert_eq!(accounts[0].code, "4199");
                assert_eq!(accounts[0].balance, dec!(250));
            }
            other => panic!("expected UnclosedBalances, got {other:?}"),
        }
    }

    #[test]
    fn test_header_with_stored_balance_blocks_close() {
        let mut header = Account::new("4000", "Revenue", AccountType::Revenue).header();
        header.balance = dec!(10);
        let candidates = [ClosingCandidate::from_account(&header, dec!(0))];
        let unclosed = ClosingService::find_unclosed(&candidates);
        assert_eq!(unclosed.len(), 1);
        assert_eq!(unclosed[0].balance, dec!(10));
    }

    #[test]
    fn test_sub_tolerance_residue_is_not_blocking() {
        let candidates = [candidate("4101", AccountType::Revenue, dec!(0.004))];
        assert!(ClosingService::find_unclosed(&candidates).is_empty());
    }

    #[test]
    fn test_retained_earnings_must_be_postable_equity() {
        let re = retained();
        assert!(ClosingService::require_retained_earnings(Some(&re), "3201").is_ok());
        assert_eq!(
            ClosingService::require_retained_earnings(None, "3201"),
            Err(LedgerError::RetainedEarningsUnavailable {
                code: "3201".to_string()
            })
        );

        let wrong_type = Account::new("3201", "Misfiled", AccountType::Asset);
        assert!(ClosingService::require_retained_earnings(Some(&wrong_type), "3201").is_err());

        let header = retained().header();
        assert!(ClosingService::require_retained_earnings(Some(&header), "3201").is_err());
    }

    #[test]
    fn test_preview_reports_blockers() {
        let mut legacy = Account::new("4199", "Legacy Revenue", AccountType::Revenue);
        legacy.is_active = false;
        let candidates = [
            candidate("4101", AccountType::Revenue, dec!(100)),
            ClosingCandidate::from_account(&legacy, dec!(5)),
        ];
        let plan = ClosingService::plan(key(), &candidates, &retained());
        let preview = ClosingService::preview(key(), PeriodStatus::Open, &candidates, plan, vec![]);
        assert!(!preview.can_close);
        assert_eq!(preview.blocking_accounts.len(), 1);
        assert_eq!(preview.total_revenue, dec!(100));
        assert_eq!(preview.closed_accounts.len(), 1);
    }

    #[test]
    fn test_preview_of_closed_period_cannot_close() {
        let candidates = [candidate("4101", AccountType::Revenue, dec!(0))];
        let plan = ClosingService::plan(key(), &candidates, &retained());
        let preview =
            ClosingService::preview(key(), PeriodStatus::Closed, &candidates, plan, vec![]);
        assert!(!preview.can_close);
        assert!(preview.blocking_accounts.is_empty());
    }
}
