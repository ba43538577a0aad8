//! Persistence contract for mutated wrappers and liquidation results

use async_trait::async_trait;
use poolfi_bank::{BankAccountWrapper, StoreError};

use crate::liquidation::LiquidateResult;

#[async_trait]
pub trait BankAccountWrapperStore: Send + Sync {
    /// Persist the bank and balance of a successfully mutated wrapper.
    async fn store_bank_account(&self, wrapper: &BankAccountWrapper) -> Result<(), StoreError>;

    /// Persist everything a liquidation touched, atomically.
    async fn store_liquidation_result(&self, result: &LiquidateResult) -> Result<(), StoreError>;
}
