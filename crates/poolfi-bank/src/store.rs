//! Store contracts
//!
//! The core consumes persistence through these narrow interfaces. They are
//! the only suspension points of the accounting engine besides oracle
//! resolution; implementations decide transactionality and serialization of
//! writes per bank.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::account::Account;
use crate::balance::Balance;
use crate::bank::Bank;
use crate::config::BankConfig;
use crate::group::Group;

/// Store-layer failures.
///
/// `NotFound` is the only variant find-or-create helpers may interpret as
/// "create"; everything else must surface to the caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("store backend failure: {0}")]
    Backend(String),
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn get_account_by_id(&self, account_id: Uuid) -> Result<Account, StoreError>;
    async fn list_accounts_by_pubkey(
        &self,
        group_id: Uuid,
        pubkey: &str,
    ) -> Result<Vec<Account>, StoreError>;
    async fn get_account_by_pubkey(
        &self,
        group_id: Uuid,
        pubkey: &str,
        index: u8,
    ) -> Result<Account, StoreError>;
    async fn create_account(&self, account: &Account) -> Result<(), StoreError>;
    async fn upsert_account(&self, account: &Account) -> Result<(), StoreError>;
}

#[async_trait]
pub trait BankStore: Send + Sync {
    async fn create_bank(&self, bank: &Bank) -> Result<(), StoreError>;
    async fn upsert_bank(&self, bank: &Bank) -> Result<(), StoreError>;
    async fn list_banks(&self) -> Result<Vec<Bank>, StoreError>;
    async fn get_bank_by_id(&self, bank_id: Uuid) -> Result<Bank, StoreError>;
    async fn list_banks_by_group_id(&self, group_id: Uuid) -> Result<Vec<Bank>, StoreError>;
    async fn get_bank_by_name(&self, name: &str) -> Result<Bank, StoreError>;
    async fn get_bank_by_asset_id(&self, asset_id: &str) -> Result<Bank, StoreError>;
    async fn update_bank_config(
        &self,
        bank_id: Uuid,
        config: &BankConfig,
    ) -> Result<(), StoreError>;
    async fn update_bank(&self, bank_id: Uuid, bank: &Bank) -> Result<(), StoreError>;
}

#[async_trait]
pub trait BalanceStore: Send + Sync {
    async fn find_balance(&self, bank_id: Uuid, account_id: Uuid) -> Result<Balance, StoreError>;
    async fn upsert_balance(&self, balance: &Balance) -> Result<(), StoreError>;
    /// All balances of an account, optionally narrowed to one bank.
    async fn list_balances(
        &self,
        account_id: Uuid,
        bank_id: Option<Uuid>,
    ) -> Result<Vec<Balance>, StoreError>;
}

#[async_trait]
pub trait GroupStore: Send + Sync {
    async fn create_group(&self, group: &Group) -> Result<(), StoreError>;
    async fn get_group_by_id(&self, id: Uuid) -> Result<Group, StoreError>;
    async fn get_group_by_name(&self, name: &str) -> Result<Group, StoreError>;
    async fn delete_group(&self, name: &str) -> Result<(), StoreError>;
    async fn update_group(&self, name: &str, group: &Group) -> Result<(), StoreError>;
    async fn list_groups(&self) -> Result<Vec<Group>, StoreError>;
}

/// The aggregate view the accounting and risk engines work against.
pub trait BankAccountService: BankStore + BalanceStore + AccountStore {}

impl<T: BankStore + BalanceStore + AccountStore> BankAccountService for T {}
