//! Risk engine
//!
//! A `RiskEngine` holds a snapshot of one account's positions, each paired
//! with its bank and price feed. In-flight wrappers substitute the persisted
//! state for their bank so that post-mutation checks see the mutation before
//! it is committed.

use poolfi_bank::{
    Account, AccountFlags, Balance, BalanceStore, Bank, BankAccountService, BankAccountWrapper,
    BankStore, RiskTier,
};
use poolfi_core::consts::{BANKRUPT_THRESHOLD, ZERO_AMOUNT_THRESHOLD};
use poolfi_core::math::calc_value;
use poolfi_core::{BalanceSide, PriceBias, RequirementType};
use poolfi_oracle::{PriceAdapter, PriceAdapterMgr};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::error::RiskError;

/// One position of the snapshot: a bank, the account's balance in it, and
/// the price feed serving the bank.
#[derive(Clone)]
pub struct BankAccountWithPriceFeed {
    pub bank: Bank,
    pub balance: Balance,
    pub price_feed: Arc<dyn PriceAdapter>,
}

impl BankAccountWithPriceFeed {
    /// (weighted assets, weighted liabilities) of this position.
    pub fn calc_weighted_assets_and_liabs_values(
        &self,
        requirement_type: RequirementType,
    ) -> Result<(Decimal, Decimal), RiskError> {
        match self.balance.get_side().map_err(RiskError::Bank)? {
            BalanceSide::Assets => Ok((
                self.calc_weighted_assets(requirement_type)?,
                Decimal::ZERO,
            )),
            BalanceSide::Liabilities => Ok((
                Decimal::ZERO,
                self.calc_weighted_liabs(requirement_type)?,
            )),
            BalanceSide::Empty => Ok((Decimal::ZERO, Decimal::ZERO)),
        }
    }

    /// Weighted asset value: low-biased price, asset weight, and under the
    /// Initial regime the optional USD-cap discount. Isolated banks
    /// contribute nothing.
    pub fn calc_weighted_assets(
        &self,
        requirement_type: RequirementType,
    ) -> Result<Decimal, RiskError> {
        match self.bank.config.risk_tier {
            RiskTier::Collateral => {
                let mut asset_weight = self
                    .bank
                    .config
                    .get_weight(requirement_type, BalanceSide::Assets);

                let low_price = self
                    .price_feed
                    .price_of_type(requirement_type.oracle_price_type(), PriceBias::Low)?;

                if requirement_type == RequirementType::Initial {
                    let discount = self.bank.maybe_get_asset_weight_init_discount(low_price);
                    if discount > Decimal::ZERO {
                        asset_weight *= discount;
                    }
                }

                let amount = self.bank.get_asset_amount(self.balance.asset_shares);
                Ok(calc_value(amount, low_price, Some(asset_weight)))
            }
            RiskTier::Isolated => Ok(Decimal::ZERO),
        }
    }

    /// Weighted liability value: high-biased price and liability weight.
    /// Isolated banks contribute nothing.
    pub fn calc_weighted_liabs(
        &self,
        requirement_type: RequirementType,
    ) -> Result<Decimal, RiskError> {
        match self.bank.config.risk_tier {
            RiskTier::Collateral => {
                let liability_weight = self
                    .bank
                    .config
                    .get_weight(requirement_type, BalanceSide::Liabilities);

                let high_price = self
                    .price_feed
                    .price_of_type(requirement_type.oracle_price_type(), PriceBias::High)?;

                let amount = self.bank.get_liability_amount(self.balance.liability_shares);
                Ok(calc_value(amount, high_price, Some(liability_weight)))
            }
            RiskTier::Isolated => Ok(Decimal::ZERO),
        }
    }

    pub fn is_empty(&self, side: BalanceSide) -> bool {
        self.balance.is_empty(side)
    }
}

/// Build the snapshot for `account_id`: every persisted balance paired with
/// its bank and feed, in-flight wrappers substituted for their banks, and
/// wrappers over banks with no persisted balance appended.
pub async fn load_bank_accounts_with_price_feeds(
    service: &dyn BankAccountService,
    account_id: Uuid,
    changed_bank_accounts: &[BankAccountWrapper],
    price_feed_mgr: &dyn PriceAdapterMgr,
) -> Result<Vec<BankAccountWithPriceFeed>, RiskError> {
    let mut changed_by_bank: HashMap<Uuid, &BankAccountWrapper> = HashMap::new();
    for wrapper in changed_bank_accounts {
        changed_by_bank.insert(wrapper.bank.id, wrapper);
    }

    let balances = service.list_balances(account_id, None).await?;

    let mut bank_accounts = Vec::with_capacity(balances.len());

    if balances.is_empty() {
        for wrapper in changed_bank_accounts {
            let price_feed = price_feed_mgr.get_price_adapter(&wrapper.bank).await?;
            bank_accounts.push(BankAccountWithPriceFeed {
                bank: wrapper.bank.clone(),
                balance: wrapper.balance.clone(),
                price_feed,
            });
        }
        return Ok(bank_accounts);
    }

    for balance in &balances {
        let bank = service.get_bank_by_id(balance.bank_id).await?;
        let price_feed = price_feed_mgr.get_price_adapter(&bank).await?;

        if let Some(wrapper) = changed_by_bank.get(&balance.bank_id) {
            bank_accounts.push(BankAccountWithPriceFeed {
                bank: wrapper.bank.clone(),
                balance: wrapper.balance.clone(),
                price_feed,
            });
            continue;
        }

        bank_accounts.push(BankAccountWithPriceFeed {
            bank,
            balance: balance.clone(),
            price_feed,
        });
    }

    let existing_bank_ids: Vec<Uuid> = bank_accounts.iter().map(|ba| ba.bank.id).collect();
    for wrapper in changed_bank_accounts {
        if !existing_bank_ids.contains(&wrapper.bank.id) {
            let price_feed = price_feed_mgr.get_price_adapter(&wrapper.bank).await?;
            bank_accounts.push(BankAccountWithPriceFeed {
                bank: wrapper.bank.clone(),
                balance: wrapper.balance.clone(),
                price_feed,
            });
        }
    }

    Ok(bank_accounts)
}

pub struct RiskEngine {
    pub account: Account,
    pub bank_accounts_with_price: Vec<BankAccountWithPriceFeed>,
}

impl RiskEngine {
    /// Build the engine for an account; refused while the account is inside
    /// a flashloan.
    pub async fn new(
        service: &dyn BankAccountService,
        account: &Account,
        changed_bank_accounts: &[BankAccountWrapper],
        price_feed_mgr: &dyn PriceAdapterMgr,
    ) -> Result<Self, RiskError> {
        if account.get_flag(AccountFlags::IN_FLASHLOAN) {
            return Err(RiskError::AccountInFlashloan);
        }
        Self::new_no_flashloan_check(service, account, changed_bank_accounts, price_feed_mgr).await
    }

    pub async fn new_no_flashloan_check(
        service: &dyn BankAccountService,
        account: &Account,
        changed_bank_accounts: &[BankAccountWrapper],
        price_feed_mgr: &dyn PriceAdapterMgr,
    ) -> Result<Self, RiskError> {
        let bank_accounts_with_price = load_bank_accounts_with_price_feeds(
            service,
            account.id,
            changed_bank_accounts,
            price_feed_mgr,
        )
        .await?;

        Ok(Self {
            account: account.clone(),
            bank_accounts_with_price,
        })
    }

    /// Initial health gate applied after position-opening mutations; skipped
    /// entirely inside a flashloan.
    pub async fn check_account_init_health(
        service: &dyn BankAccountService,
        account: &Account,
        changed_bank_accounts: &[BankAccountWrapper],
        price_feed_mgr: &dyn PriceAdapterMgr,
    ) -> Result<(), RiskError> {
        if account.get_flag(AccountFlags::IN_FLASHLOAN) {
            return Ok(());
        }

        let engine = Self::new_no_flashloan_check(
            service,
            account,
            changed_bank_accounts,
            price_feed_mgr,
        )
        .await?;

        engine.check_account_health(RequirementType::Initial)
    }

    /// (weighted assets, weighted liabilities) over the whole snapshot.
    pub fn get_account_health_components(
        &self,
        requirement_type: RequirementType,
    ) -> Result<(Decimal, Decimal), RiskError> {
        let mut total_assets = Decimal::ZERO;
        let mut total_liabilities = Decimal::ZERO;
        for position in &self.bank_accounts_with_price {
            let (assets, liabilities) =
                position.calc_weighted_assets_and_liabs_values(requirement_type)?;
            total_assets += assets;
            total_liabilities += liabilities;
        }
        Ok((total_assets, total_liabilities))
    }

    pub fn get_account_health(
        &self,
        requirement_type: RequirementType,
    ) -> Result<Decimal, RiskError> {
        let (total_assets, total_liabilities) =
            self.get_account_health_components(requirement_type)?;
        Ok(total_assets - total_liabilities)
    }

    pub fn check_account_health(&self, requirement_type: RequirementType) -> Result<(), RiskError> {
        let (total_assets, total_liabilities) =
            self.get_account_health_components(requirement_type)?;
        if total_assets < total_liabilities {
            return Err(RiskError::RiskEngineInitRejected);
        }
        self.check_account_risk_tiers()
    }

    /// Liquidation entry gate: the target bank must carry a pure liability
    /// position and the account must be unhealthy under Maintenance.
    /// Returns the pre-liquidation health.
    pub fn check_pre_liquidation_condition_and_get_account_health(
        &self,
        bank_id: Uuid,
    ) -> Result<Decimal, RiskError> {
        if self.account.get_flag(AccountFlags::IN_FLASHLOAN) {
            return Err(RiskError::AccountInFlashloan);
        }

        let liability_bank_balance = self
            .bank_accounts_with_price
            .iter()
            .find(|ba| ba.balance.bank_id == bank_id)
            .ok_or(RiskError::Bank(
                poolfi_bank::BankError::LendingAccountBalanceNotFound,
            ))?;

        if liability_bank_balance.is_empty(BalanceSide::Liabilities) {
            return Err(RiskError::IllegalLiquidation);
        }
        if !liability_bank_balance.is_empty(BalanceSide::Assets) {
            return Err(RiskError::IllegalLiquidation);
        }

        let (total_assets, total_liabilities) =
            self.get_account_health_components(RequirementType::Maintenance)?;

        let account_health = total_assets - total_liabilities;
        if account_health > Decimal::ZERO {
            return Err(RiskError::AccountNotUnhealthy);
        }

        Ok(account_health)
    }

    /// Liquidation exit gate: the target position must still be a pure
    /// liability, the account must still be at or below the Maintenance
    /// level, and its health must have strictly improved.
    pub fn check_post_liquidation_condition_and_get_account_health(
        &self,
        bank_id: Uuid,
        pre_liquidation_health: Decimal,
    ) -> Result<Decimal, RiskError> {
        if self.account.get_flag(AccountFlags::IN_FLASHLOAN) {
            return Err(RiskError::AccountInFlashloan);
        }

        let liability_bank_balance = self
            .bank_accounts_with_price
            .iter()
            .find(|ba| ba.balance.bank_id == bank_id)
            .ok_or(RiskError::Bank(
                poolfi_bank::BankError::LendingAccountBalanceNotFound,
            ))?;

        if liability_bank_balance.is_empty(BalanceSide::Liabilities) {
            return Err(RiskError::IllegalLiquidation);
        }
        if !liability_bank_balance.is_empty(BalanceSide::Assets) {
            return Err(RiskError::IllegalLiquidation);
        }

        let (total_assets, total_liabilities) =
            self.get_account_health_components(RequirementType::Maintenance)?;

        let account_health = total_assets - total_liabilities;
        if account_health > Decimal::ZERO {
            return Err(RiskError::AccountNotUnhealthy);
        }

        if account_health <= pre_liquidation_health {
            return Err(RiskError::IllegalLiquidation);
        }

        Ok(account_health)
    }

    /// Bankruptcy gate under the Equity view: liabilities outstanding, no
    /// meaningful assets left.
    pub fn check_account_bankrupt(&self) -> Result<(), RiskError> {
        if self.account.get_flag(AccountFlags::IN_FLASHLOAN) {
            return Err(RiskError::AccountInFlashloan);
        }

        let (total_assets, total_liabilities) =
            self.get_account_health_components(RequirementType::Equity)?;

        debug!(%total_assets, %total_liabilities, "bankruptcy check");

        if total_assets >= total_liabilities {
            return Err(RiskError::AccountNotBankrupt);
        }
        if total_assets >= BANKRUPT_THRESHOLD {
            return Err(RiskError::AccountNotBankrupt);
        }
        if total_liabilities <= ZERO_AMOUNT_THRESHOLD {
            return Err(RiskError::AccountNotBankrupt);
        }

        Ok(())
    }

    /// An isolated-tier liability must be the account's only liability.
    pub fn check_account_risk_tiers(&self) -> Result<(), RiskError> {
        let balances_with_liabilities: Vec<&BankAccountWithPriceFeed> = self
            .bank_accounts_with_price
            .iter()
            .filter(|ba| !ba.balance.is_empty(BalanceSide::Liabilities))
            .collect();

        let in_isolated_risk_tier = balances_with_liabilities
            .iter()
            .any(|ba| ba.bank.config.risk_tier == RiskTier::Isolated);

        if in_isolated_risk_tier && balances_with_liabilities.len() != 1 {
            return Err(RiskError::IsolatedAccountIllegalState);
        }

        Ok(())
    }
}
