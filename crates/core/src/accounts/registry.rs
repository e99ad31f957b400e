//! Chart of accounts stored as an arena with explicit parent indices.

use std::collections::{HashMap, HashSet};

use rust_decimal::Decimal;
use tally_shared::types::AccountId;

use super::types::{Account, AccountType};
use crate::error::{LedgerError, UnavailableReason};

/// In-memory chart of accounts.
///
/// Accounts live in a flat `Vec`; `index` maps ids to slots and `children`
/// maps a parent id to its direct children's slots. Header balances are never
/// stored here as postable values: [`ChartOfAccounts::rollup`] derives them at
/// read time.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChartOfAccounts {
    accounts: Vec<Account>,
    index: HashMap<AccountId, usize>,
    by_code: HashMap<String, usize>,
    children: HashMap<AccountId, Vec<usize>>,
}

impl ChartOfAccounts {
    /// Builds a chart, rejecting duplicate ids or codes, dangling parents, and cycles.
    pub fn new(accounts: Vec<Account>) -> Result<Self, LedgerError> {
        let mut index = HashMap::with_capacity(accounts.len());
        let mut by_code = HashMap::with_capacity(accounts.len());

        for (slot, account) in accounts.iter().enumerate() {
            if index.insert(account.id, slot).is_some() {
                return Err(LedgerError::InvalidHierarchy(format!(
                    "duplicate account id {}",
                    account.id
                )));
            }
            if by_code.insert(account.code.clone(), slot).is_some() {
                return Err(LedgerError::InvalidHierarchy(format!(
                    "duplicate account code {}",
                    account.code
                )));
            }
        }

        let mut children: HashMap<AccountId, Vec<usize>> = HashMap::new();
        for (slot, account) in accounts.iter().enumerate() {
            if let Some(parent_id) = account.parent_id {
                if !index.contains_key(&parent_id) {
                    return Err(LedgerError::InvalidHierarchy(format!(
                        "account {} references unknown parent {parent_id}",
                        account.code
                    )));
                }
                children.entry(parent_id).or_default().push(slot);
            }
        }

        let chart = Self {
            accounts,
            index,
            by_code,
            children,
        };
        chart.check_acyclic()?;
        Ok(chart)
    }

    fn check_acyclic(&self) -> Result<(), LedgerError> {
        for account in &self.accounts {
            let mut seen = HashSet::new();
            let mut current = Some(account);
            while let Some(node) = current {
                if !seen.insert(node.id) {
                    return Err(LedgerError::InvalidHierarchy(format!(
                        "parent cycle through account {}",
                        node.code
                    )));
                }
                current = node
                    .parent_id
                    .and_then(|pid| self.index.get(&pid))
                    .map(|&slot| &self.accounts[slot]);
            }
        }
        Ok(())
    }

    /// Number of accounts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    /// True when the chart has no accounts.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Looks up an account by id, active or not.
    ///
    /// Balance bookkeeping still has to see deactivated accounts; callers
    /// serving an account to a user go through [`Self::require_active`].
    pub fn get(&self, id: AccountId) -> Result<&Account, LedgerError> {
        self.index
            .get(&id)
            .map(|&slot| &self.accounts[slot])
            .ok_or(LedgerError::AccountUnavailable {
                account_id: id,
                reason: UnavailableReason::NotFound,
            })
    }

    /// Looks up an account, failing with `Inactive` for deactivated ones.
    pub fn require_active(&self, id: AccountId) -> Result<&Account, LedgerError> {
        let account = self.get(id)?;
        if !account.is_active {
            return Err(LedgerError::AccountUnavailable {
                account_id: id,
                reason: UnavailableReason::Inactive,
            });
        }
        Ok(account)
    }

    /// Looks up an account by code.
    #[must_use]
    pub fn find_by_code(&self, code: &str) -> Option<&Account> {
        self.by_code.get(code).map(|&slot| &self.accounts[slot])
    }

    /// All accounts in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Account> {
        self.accounts.iter()
    }

    /// Accounts of one type, ordered by code.
    #[must_use]
    pub fn list_by_type(&self, account_type: AccountType) -> Vec<&Account> {
        let mut list: Vec<&Account> = self
            .accounts
            .iter()
            .filter(|a| a.account_type == account_type)
            .collect();
        list.sort_by(|a, b| a.code.cmp(&b.code));
        list
    }

    /// False for unknown, header, or inactive accounts.
    #[must_use]
    pub fn is_postable(&self, id: AccountId) -> bool {
        self.get(id).is_ok_and(Account::is_postable)
    }

    /// Returns the account if it can receive postings.
    pub fn require_postable(&self, id: AccountId) -> Result<&Account, LedgerError> {
        let account = self.get(id)?;
        account.require_postable()?;
        Ok(account)
    }

    /// Direct children of `id`.
    pub fn children(&self, id: AccountId) -> impl Iterator<Item = &Account> {
        self.children
            .get(&id)
            .into_iter()
            .flatten()
            .map(|&slot| &self.accounts[slot])
    }

    /// Displayed balance: own balance for postable accounts, otherwise the
    /// sum of active non-header descendants reached through active nodes.
    pub fn rollup(&self, id: AccountId) -> Result<Decimal, LedgerError> {
        let root = self.get(id)?;
        if !root.is_header {
            return Ok(root.balance);
        }

        let mut total = Decimal::ZERO;
        let mut stack: Vec<&Account> = self.children(id).collect();
        while let Some(node) = stack.pop() {
            if !node.is_active {
                continue;
            }
            if node.is_header {
                stack.extend(self.children(node.id));
            } else {
                total += node.balance;
            }
        }
        Ok(total)
    }

    /// Header accounts holding a stored balance, which should always be zero.
    #[must_use]
    pub fn headers_with_stray_balance(&self) -> Vec<&Account> {
        self.accounts
            .iter()
            .filter(|a| a.is_header && !a.balance.is_zero())
            .collect()
    }

    /// Overwrites the stored balance of an account.
    pub(crate) fn set_balance(&mut self, id: AccountId, balance: Decimal) -> Result<(), LedgerError> {
        let slot = *self.index.get(&id).ok_or(LedgerError::AccountUnavailable {
            account_id: id,
            reason: UnavailableReason::NotFound,
        })?;
        self.accounts[slot].balance = balance;
        Ok(())
    }
}
