//! In-memory stores
//!
//! Reference implementations of the store contracts, used by tests and
//! local runs. Writes clone the entity into the map; readers get value
//! snapshots, matching the discard-on-failure contract of the engine.

use async_trait::async_trait;
use poolfi_bank::{
    Account, AccountStore, Balance, BalanceStore, Bank, BankAccountWrapper, BankConfig, BankStore,
    Group, GroupStore, StoreError,
};
use poolfi_risk::{BankAccountWrapperStore, LiquidateResult};
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
pub struct MemoryStore {
    accounts: RwLock<HashMap<Uuid, Account>>,
    banks: RwLock<HashMap<Uuid, Bank>>,
    /// keyed by (bank, account)
    balances: RwLock<HashMap<(Uuid, Uuid), Balance>>,
    groups: RwLock<HashMap<Uuid, Group>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn get_account_by_id(&self, account_id: Uuid) -> Result<Account, StoreError> {
        self.accounts
            .read()
            .expect("account lock poisoned")
            .get(&account_id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn list_accounts_by_pubkey(
        &self,
        group_id: Uuid,
        pubkey: &str,
    ) -> Result<Vec<Account>, StoreError> {
        Ok(self
            .accounts
            .read()
            .expect("account lock poisoned")
            .values()
            .filter(|a| a.group_id == group_id && a.pub_key == pubkey)
            .cloned()
            .collect())
    }

    async fn get_account_by_pubkey(
        &self,
        group_id: Uuid,
        pubkey: &str,
        index: u8,
    ) -> Result<Account, StoreError> {
        self.accounts
            .read()
            .expect("account lock poisoned")
            .values()
            .find(|a| a.group_id == group_id && a.pub_key == pubkey && a.index == index)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn create_account(&self, account: &Account) -> Result<(), StoreError> {
        let mut accounts = self.accounts.write().expect("account lock poisoned");
        if accounts.contains_key(&account.id) {
            return Err(StoreError::Backend(format!(
                "account {} already exists",
                account.id
            )));
        }
        accounts.insert(account.id, account.clone());
        Ok(())
    }

    async fn upsert_account(&self, account: &Account) -> Result<(), StoreError> {
        self.accounts
            .write()
            .expect("account lock poisoned")
            .insert(account.id, account.clone());
        Ok(())
    }
}

#[async_trait]
impl BankStore for MemoryStore {
    async fn create_bank(&self, bank: &Bank) -> Result<(), StoreError> {
        let mut banks = self.banks.write().expect("bank lock poisoned");
        if banks.contains_key(&bank.id) {
            return Err(StoreError::Backend(format!(
                "bank {} already exists",
                bank.id
            )));
        }
        banks.insert(bank.id, bank.clone());
        Ok(())
    }

    async fn upsert_bank(&self, bank: &Bank) -> Result<(), StoreError> {
        self.banks
            .write()
            .expect("bank lock poisoned")
            .insert(bank.id, bank.clone());
        Ok(())
    }

    async fn list_banks(&self) -> Result<Vec<Bank>, StoreError> {
        Ok(self
            .banks
            .read()
            .expect("bank lock poisoned")
            .values()
            .cloned()
            .collect())
    }

    async fn get_bank_by_id(&self, bank_id: Uuid) -> Result<Bank, StoreError> {
        self.banks
            .read()
            .expect("bank lock poisoned")
            .get(&bank_id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn list_banks_by_group_id(&self, group_id: Uuid) -> Result<Vec<Bank>, StoreError> {
        Ok(self
            .banks
            .read()
            .expect("bank lock poisoned")
            .values()
            .filter(|b| b.group_id == group_id)
            .cloned()
            .collect())
    }

    async fn get_bank_by_name(&self, name: &str) -> Result<Bank, StoreError> {
        self.banks
            .read()
            .expect("bank lock poisoned")
            .values()
            .find(|b| b.name == name)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn get_bank_by_asset_id(&self, asset_id: &str) -> Result<Bank, StoreError> {
        self.banks
            .read()
            .expect("bank lock poisoned")
            .values()
            .find(|b| b.asset_id == asset_id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn update_bank_config(
        &self,
        bank_id: Uuid,
        config: &BankConfig,
    ) -> Result<(), StoreError> {
        let mut banks = self.banks.write().expect("bank lock poisoned");
        let bank = banks.get_mut(&bank_id).ok_or(StoreError::NotFound)?;
        bank.config = *config;
        Ok(())
    }

    async fn update_bank(&self, bank_id: Uuid, bank: &Bank) -> Result<(), StoreError> {
        let mut banks = self.banks.write().expect("bank lock poisoned");
        if !banks.contains_key(&bank_id) {
            return Err(StoreError::NotFound);
        }
        banks.insert(bank_id, bank.clone());
        Ok(())
    }
}

#[async_trait]
impl BalanceStore for MemoryStore {
    async fn find_balance(&self, bank_id: Uuid, account_id: Uuid) -> Result<Balance, StoreError> {
        self.balances
            .read()
            .expect("balance lock poisoned")
            .get(&(bank_id, account_id))
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn upsert_balance(&self, balance: &Balance) -> Result<(), StoreError> {
        self.balances
            .write()
            .expect("balance lock poisoned")
            .insert((balance.bank_id, balance.account_id), balance.clone());
        Ok(())
    }

    async fn list_balances(
        &self,
        account_id: Uuid,
        bank_id: Option<Uuid>,
    ) -> Result<Vec<Balance>, StoreError> {
        Ok(self
            .balances
            .read()
            .expect("balance lock poisoned")
            .values()
            .filter(|b| {
                b.account_id == account_id && bank_id.map_or(true, |id| b.bank_id == id)
            })
            .cloned()
            .collect())
    }
}

#[async_trait]
impl GroupStore for MemoryStore {
    async fn create_group(&self, group: &Group) -> Result<(), StoreError> {
        let mut groups = self.groups.write().expect("group lock poisoned");
        if groups.contains_key(&group.id) {
            return Err(StoreError::Backend(format!(
                "group {} already exists",
                group.id
            )));
        }
        groups.insert(group.id, group.clone());
        Ok(())
    }

    async fn get_group_by_id(&self, id: Uuid) -> Result<Group, StoreError> {
        self.groups
            .read()
            .expect("group lock poisoned")
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn get_group_by_name(&self, name: &str) -> Result<Group, StoreError> {
        self.groups
            .read()
            .expect("group lock poisoned")
            .values()
            .find(|g| g.name == name)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn delete_group(&self, name: &str) -> Result<(), StoreError> {
        let mut groups = self.groups.write().expect("group lock poisoned");
        let id = groups
            .values()
            .find(|g| g.name == name)
            .map(|g| g.id)
            .ok_or(StoreError::NotFound)?;
        groups.remove(&id);
        Ok(())
    }

    async fn update_group(&self, name: &str, group: &Group) -> Result<(), StoreError> {
        let mut groups = self.groups.write().expect("group lock poisoned");
        let id = groups
            .values()
            .find(|g| g.name == name)
            .map(|g| g.id)
            .ok_or(StoreError::NotFound)?;
        groups.insert(id, group.clone());
        Ok(())
    }

    async fn list_groups(&self) -> Result<Vec<Group>, StoreError> {
        Ok(self
            .groups
            .read()
            .expect("group lock poisoned")
            .values()
            .cloned()
            .collect())
    }
}

#[async_trait]
impl BankAccountWrapperStore for MemoryStore {
    async fn store_bank_account(&self, wrapper: &BankAccountWrapper) -> Result<(), StoreError> {
        self.upsert_bank(&wrapper.bank).await?;
        self.upsert_balance(&wrapper.balance).await
    }

    async fn store_liquidation_result(&self, result: &LiquidateResult) -> Result<(), StoreError> {
        self.upsert_bank(&result.asset_bank).await?;
        self.upsert_bank(&result.liability_bank).await?;
        self.upsert_balance(&result.liquidator_asset_wrapper.balance)
            .await?;
        self.upsert_balance(&result.liquidator_liability_wrapper.balance)
            .await?;
        self.upsert_balance(&result.liquidatee_asset_wrapper.balance)
            .await?;
        self.upsert_balance(&result.liquidatee_liability_wrapper.balance)
            .await
    }
}
