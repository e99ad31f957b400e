//! Account repository for chart of accounts database operations.

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, DatabaseConnection, EntityTrait, PaginatorTrait, Set, TransactionTrait,
};
use tally_core::accounts::{Account, AccountType, ChartOfAccounts, standard_accounts};
use tally_core::LedgerError;
use tally_core::error::UnavailableReason;
use tally_shared::types::AccountId;
use tracing::info;

use super::error::RepoError;
use super::ledger_tx::load_chart;
use crate::entities::accounts;

/// Account with its displayed balance.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct AccountWithBalance {
    /// The account record.
    pub account: Account,
    /// Stored balance for postable accounts, rollup of active descendants for headers.
    pub balance: Decimal,
}

/// Input for creating an account.
#[derive(Debug, Clone)]
pub struct CreateAccountInput {
    /// Account code (unique).
    pub code: String,
    /// Account name.
    pub name: String,
    /// Account type.
    pub account_type: AccountType,
    /// Aggregation-only account.
    pub is_header: bool,
    /// Parent account.
    pub parent_id: Option<AccountId>,
}

/// Account repository.
#[derive(Debug, Clone)]
pub struct AccountRepository {
    db: DatabaseConnection,
}

impl AccountRepository {
    /// Creates a new account repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Loads the chart with stored balances.
    pub async fn chart(&self) -> Result<ChartOfAccounts, RepoError> {
        load_chart(&self.db).await
    }

    /// Lists accounts in code order, optionally of one type.
    pub async fn list_accounts(
        &self,
        account_type: Option<AccountType>,
    ) -> Result<Vec<AccountWithBalance>, RepoError> {
        let chart = self.chart().await?;
        chart
            .iter()
            .filter(|a| account_type.is_none_or(|t| a.account_type == t))
            .map(|a| {
                Ok(AccountWithBalance {
                    balance: chart.rollup(a.id)?,
                    account: a.clone(),
                })
            })
            .collect()
    }

    /// Gets one active account with its displayed balance.
    pub async fn get_account(&self, id: AccountId) -> Result<AccountWithBalance, RepoError> {
        let chart = self.chart().await?;
        let account = chart.require_active(id)?.clone();
        Ok(AccountWithBalance {
            balance: chart.rollup(id)?,
            account,
        })
    }

    /// Creates an account after checking the resulting chart is well formed.
    pub async fn create_account(&self, input: CreateAccountInput) -> Result<Account, RepoError> {
        let txn = self.db.begin().await?;
        let chart = load_chart(&txn).await?;

        let mut account = Account::new(input.code, input.name, input.account_type);
        if input.is_header {
            account = account.header();
        }
        if let Some(parent_id) = input.parent_id {
            account = account.with_parent(parent_id);
        }

        let mut accounts: Vec<Account> = chart.iter().cloned().collect();
        accounts.push(account.clone());
        ChartOfAccounts::new(accounts)?;

        insert_account(&txn, &account).await?;
        txn.commit().await?;

        info!(account_id = %account.id, code = %account.code, "Account created");
        Ok(account)
    }

    /// Activates or deactivates an account.
    pub async fn set_active(&self, id: AccountId, is_active: bool) -> Result<Account, RepoError> {
        let model = accounts::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await?
            .ok_or(LedgerError::AccountUnavailable {
                account_id: id,
                reason: UnavailableReason::NotFound,
            })?;
        let mut active: accounts::ActiveModel = model.into();
        active.is_active = Set(is_active);
        active.updated_at = Set(Utc::now().into());
        let updated = active.update(&self.db).await?;

        info!(account_id = %id, is_active, "Account activation changed");
        Ok(super::convert::account_from_model(updated))
    }

    /// Inserts the standard chart when no accounts exist yet.
    ///
    /// Returns the number of accounts inserted.
    pub async fn seed_standard(&self) -> Result<usize, RepoError> {
        let txn = self.db.begin().await?;
        if accounts::Entity::find().count(&txn).await? > 0 {
            return Ok(0);
        }
        let accounts = standard_accounts();
        for account in &accounts {
            insert_account(&txn, account).await?;
        }
        txn.commit().await?;

        info!(count = accounts.len(), "Seeded standard chart of accounts");
        Ok(accounts.len())
    }
}

async fn insert_account<C: sea_orm::ConnectionTrait>(
    conn: &C,
    account: &Account,
) -> Result<(), RepoError> {
    let now = Utc::now().into();
    accounts::ActiveModel {
        id: Set(account.id.into_inner()),
        code: Set(account.code.clone()),
        name: Set(account.name.clone()),
        account_type: Set(account.account_type.into()),
        is_header: Set(account.is_header),
        parent_id: Set(account.parent_id.map(AccountId::into_inner)),
        balance: Set(account.balance),
        is_active: Set(account.is_active),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(conn)
    .await?;
    Ok(())
}
