//! LendingService - user-operation compositions
//!
//! Every operation follows the same shape: load the entities, accrue
//! interest on each touched bank before mutating it, run the wrapper
//! mutation protocol, apply the health checks the operation requires, and
//! persist only after everything succeeded.

use poolfi_bank::{
    find_bank_account_wrapper, find_or_create_bank_account_wrapper, Account, AccountStore, Bank,
    BankAccountService, BankAccountWrapper, BankConfig, BankError, BankFlags, BankStore, Group,
    GroupStore,
};
use poolfi_core::consts::{
    LIQUIDATION_INSURANCE_FEE, LIQUIDATION_LIQUIDATOR_FEE, ONE, ZERO_AMOUNT_THRESHOLD,
};
use poolfi_core::math::{calc_amount, calc_value};
use poolfi_core::{Clock, PriceBias, RequirementType};
use poolfi_oracle::PriceAdapterMgr;
use poolfi_risk::{
    compute_liquidation_price_for_bank, compute_net_apy, BankAccountWrapperStore, LiquidateResult,
    LiquidationBalances, RiskEngine,
};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::error::ServiceError;

/// Everything the service needs from persistence.
pub trait LendingStore: BankAccountService + BankAccountWrapperStore + GroupStore {}

impl<T: BankAccountService + BankAccountWrapperStore + GroupStore> LendingStore for T {}

pub struct LendingService<S, M> {
    store: Arc<S>,
    price_feed_mgr: Arc<M>,
    clock: Arc<dyn Clock>,
}

impl<S, M> LendingService<S, M>
where
    S: LendingStore,
    M: PriceAdapterMgr,
{
    pub fn new(store: Arc<S>, price_feed_mgr: Arc<M>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            price_feed_mgr,
            clock,
        }
    }

    fn now(&self) -> i64 {
        self.clock.now_unix()
    }

    fn service(&self) -> &dyn BankAccountService {
        self.store.as_ref()
    }

    fn mgr(&self) -> &dyn PriceAdapterMgr {
        self.price_feed_mgr.as_ref()
    }

    // ---- administration ----

    pub async fn create_group(
        &self,
        admin_key: &str,
        name: &str,
        description: &str,
    ) -> Result<Group, ServiceError> {
        let group = Group::new(&*self.clock, admin_key, name, description);
        self.store.create_group(&group).await?;
        Ok(group)
    }

    pub async fn create_account(
        &self,
        group_id: Uuid,
        pub_key: &str,
        index: u8,
    ) -> Result<Account, ServiceError> {
        self.store.get_group_by_id(group_id).await?;
        let account = Account::new(&*self.clock, group_id, pub_key, index);
        self.store.create_account(&account).await?;
        Ok(account)
    }

    pub async fn create_bank(
        &self,
        group_id: Uuid,
        name: &str,
        asset_id: &str,
        config: BankConfig,
    ) -> Result<Bank, ServiceError> {
        config.validate().map_err(ServiceError::Bank)?;
        config.validate_oracle_setup().map_err(ServiceError::Bank)?;
        self.store.get_group_by_id(group_id).await?;

        let bank = Bank::new(&*self.clock, group_id, name, asset_id, config);
        self.store.create_bank(&bank).await?;
        Ok(bank)
    }

    pub async fn update_bank_config(
        &self,
        bank_id: Uuid,
        patch: &BankConfig,
    ) -> Result<(), ServiceError> {
        let mut bank = self.store.get_bank_by_id(bank_id).await?;
        bank.configure(patch)?;
        self.store.update_bank_config(bank_id, &bank.config).await?;
        Ok(())
    }

    /// Flip group-updatable capability flags on a bank.
    pub async fn update_bank_flags(
        &self,
        bank_id: Uuid,
        value: bool,
        flags: BankFlags,
    ) -> Result<(), ServiceError> {
        if !BankFlags::is_valid_group_update(flags) {
            return Err(ServiceError::Bank(BankError::InvalidConfig));
        }
        let mut bank = self.store.get_bank_by_id(bank_id).await?;
        bank.update_flag(value, flags);
        self.store.update_bank(bank_id, &bank).await?;
        Ok(())
    }

    /// Configure the emissions program of a bank. `flags` may only name
    /// emissions capabilities and replaces the bank's flag set.
    pub async fn setup_emissions(
        &self,
        bank_id: Uuid,
        flags: BankFlags,
        rate: Decimal,
        total_emissions: Decimal,
        emissions_asset_id: &str,
    ) -> Result<(), ServiceError> {
        if !BankFlags::is_valid_emissions_update(flags) {
            return Err(ServiceError::Bank(BankError::InvalidConfig));
        }
        let mut bank = self.store.get_bank_by_id(bank_id).await?;
        bank.override_emissions_flag(flags);
        bank.emissions_rate = rate;
        bank.emissions_remaining = total_emissions;
        bank.emissions_asset_id = emissions_asset_id.to_string();
        self.store.update_bank(bank_id, &bank).await?;
        Ok(())
    }

    // ---- wrapper loading ----

    async fn load_wrapper(
        &self,
        account_id: Uuid,
        bank_id: Uuid,
    ) -> Result<(Account, BankAccountWrapper), ServiceError> {
        let account = self.store.get_account_by_id(account_id).await?;
        let mut bank = self.store.get_bank_by_id(bank_id).await?;
        bank.accrue_interest(self.now())?;

        let wrapper =
            find_bank_account_wrapper(self.service(), self.clock.clone(), &bank, &account).await?;
        Ok((account, wrapper))
    }

    async fn load_wrapper_or_create(
        &self,
        account_id: Uuid,
        bank_id: Uuid,
    ) -> Result<(Account, BankAccountWrapper), ServiceError> {
        let account = self.store.get_account_by_id(account_id).await?;
        let mut bank = self.store.get_bank_by_id(bank_id).await?;
        bank.accrue_interest(self.now())?;

        let wrapper = find_or_create_bank_account_wrapper(
            self.service(),
            self.clock.clone(),
            &bank,
            &account,
        )
        .await?;
        Ok((account, wrapper))
    }

    // ---- user operations ----

    pub async fn deposit(
        &self,
        account_id: Uuid,
        bank_id: Uuid,
        amount: Decimal,
    ) -> Result<(), ServiceError> {
        let (_, mut wrapper) = self.load_wrapper_or_create(account_id, bank_id).await?;
        wrapper.deposit(amount)?;
        self.store.store_bank_account(&wrapper).await?;
        Ok(())
    }

    pub async fn repay(
        &self,
        account_id: Uuid,
        bank_id: Uuid,
        amount: Decimal,
    ) -> Result<(), ServiceError> {
        let (_, mut wrapper) = self.load_wrapper(account_id, bank_id).await?;
        wrapper.repay(amount)?;
        self.store.store_bank_account(&wrapper).await?;
        Ok(())
    }

    /// Clear the whole liability; returns the amount the user owes.
    pub async fn repay_all(&self, account_id: Uuid, bank_id: Uuid) -> Result<Decimal, ServiceError> {
        let (_, mut wrapper) = self.load_wrapper(account_id, bank_id).await?;
        let amount = wrapper.repay_all()?;
        self.store.store_bank_account(&wrapper).await?;
        Ok(amount)
    }

    pub async fn withdraw(
        &self,
        account_id: Uuid,
        bank_id: Uuid,
        amount: Decimal,
    ) -> Result<(), ServiceError> {
        let (account, mut wrapper) = self.load_wrapper(account_id, bank_id).await?;
        wrapper.withdraw(amount)?;

        RiskEngine::check_account_init_health(
            self.service(),
            &account,
            std::slice::from_ref(&wrapper),
            self.mgr(),
        )
        .await?;

        self.store.store_bank_account(&wrapper).await?;
        Ok(())
    }

    /// Close out the asset side; returns the transferable amount.
    pub async fn withdraw_all(
        &self,
        account_id: Uuid,
        bank_id: Uuid,
    ) -> Result<Decimal, ServiceError> {
        let (account, mut wrapper) = self.load_wrapper(account_id, bank_id).await?;
        let amount = wrapper.withdraw_all()?;

        RiskEngine::check_account_init_health(
            self.service(),
            &account,
            std::slice::from_ref(&wrapper),
            self.mgr(),
        )
        .await?;

        self.store.store_bank_account(&wrapper).await?;
        Ok(amount)
    }

    pub async fn borrow(
        &self,
        account_id: Uuid,
        bank_id: Uuid,
        amount: Decimal,
    ) -> Result<(), ServiceError> {
        let (account, mut wrapper) = self.load_wrapper_or_create(account_id, bank_id).await?;
        wrapper.borrow(amount)?;

        RiskEngine::check_account_init_health(
            self.service(),
            &account,
            std::slice::from_ref(&wrapper),
            self.mgr(),
        )
        .await?;

        self.store.store_bank_account(&wrapper).await?;
        Ok(())
    }

    /// Deposit into one bank and borrow from another in one operation. Each
    /// bank accrues before its own mutation; one account-wide health check
    /// covers the combined result.
    pub async fn loop_position(
        &self,
        account_id: Uuid,
        deposit_bank_id: Uuid,
        deposit_amount: Decimal,
        borrow_bank_id: Uuid,
        borrow_amount: Decimal,
    ) -> Result<(), ServiceError> {
        let (account, mut deposit_wrapper) = self
            .load_wrapper_or_create(account_id, deposit_bank_id)
            .await?;
        deposit_wrapper.deposit(deposit_amount)?;

        let (_, mut borrow_wrapper) = self
            .load_wrapper_or_create(account_id, borrow_bank_id)
            .await?;
        borrow_wrapper.borrow(borrow_amount)?;

        let changed = [deposit_wrapper.clone(), borrow_wrapper.clone()];
        RiskEngine::check_account_init_health(self.service(), &account, &changed, self.mgr())
            .await?;

        self.store.store_bank_account(&deposit_wrapper).await?;
        self.store.store_bank_account(&borrow_wrapper).await?;
        Ok(())
    }

    pub async fn close_balance(&self, account_id: Uuid, bank_id: Uuid) -> Result<(), ServiceError> {
        let (_, mut wrapper) = self.load_wrapper(account_id, bank_id).await?;
        wrapper.close_balance()?;
        self.store.store_bank_account(&wrapper).await?;
        Ok(())
    }

    /// Settle claimable emissions; returns the transferable amount.
    pub async fn settle_emissions(
        &self,
        account_id: Uuid,
        bank_id: Uuid,
    ) -> Result<Decimal, ServiceError> {
        let (_, mut wrapper) = self.load_wrapper(account_id, bank_id).await?;
        let amount = wrapper.settle_emissions_and_get_transfer_amount()?;
        self.store.store_bank_account(&wrapper).await?;
        Ok(amount)
    }

    // ---- liquidation & bankruptcy ----

    /// Seize `asset_amount` of the liquidatee's collateral in
    /// `asset_bank_id` and repay its liability in `liability_bank_id`. The
    /// discount between the legs is split between the liquidator and the
    /// insurance vault; the pre/post health gates bound the whole motion.
    pub async fn liquidate(
        &self,
        liquidator_account_id: Uuid,
        liquidatee_account_id: Uuid,
        asset_bank_id: Uuid,
        liability_bank_id: Uuid,
        asset_amount: Decimal,
    ) -> Result<LiquidateResult, ServiceError> {
        if asset_amount <= ZERO_AMOUNT_THRESHOLD {
            return Err(ServiceError::InvalidLiquidationAmount);
        }

        let liquidator = self.store.get_account_by_id(liquidator_account_id).await?;
        let liquidatee = self.store.get_account_by_id(liquidatee_account_id).await?;

        let mut asset_bank = self.store.get_bank_by_id(asset_bank_id).await?;
        asset_bank.accrue_interest(self.now())?;
        let mut liability_bank = self.store.get_bank_by_id(liability_bank_id).await?;
        liability_bank.accrue_interest(self.now())?;

        let asset_adapter = self.mgr().get_price_adapter(&asset_bank).await?;
        let liability_adapter = self.mgr().get_price_adapter(&liability_bank).await?;
        let maintenance_price_type = RequirementType::Maintenance.oracle_price_type();
        let asset_price_low =
            asset_adapter.price_of_type(maintenance_price_type, PriceBias::Low)?;
        let liability_price_high =
            liability_adapter.price_of_type(maintenance_price_type, PriceBias::High)?;

        let mut liquidatee_asset_wrapper = find_bank_account_wrapper(
            self.service(),
            self.clock.clone(),
            &asset_bank,
            &liquidatee,
        )
        .await?;
        let mut liquidatee_liability_wrapper = find_bank_account_wrapper(
            self.service(),
            self.clock.clone(),
            &liability_bank,
            &liquidatee,
        )
        .await?;

        let (liquidatee_asset_quantity, _) =
            liquidatee_asset_wrapper.balance.compute_quantity(&asset_bank);
        if asset_amount > liquidatee_asset_quantity {
            return Err(ServiceError::InvalidLiquidationAmount);
        }

        let pre_engine = RiskEngine::new(
            self.service(),
            &liquidatee,
            &[
                liquidatee_asset_wrapper.clone(),
                liquidatee_liability_wrapper.clone(),
            ],
            self.mgr(),
        )
        .await?;
        let pre_health =
            pre_engine.check_pre_liquidation_condition_and_get_account_health(liability_bank_id)?;

        let mut liquidator_asset_wrapper = find_or_create_bank_account_wrapper(
            self.service(),
            self.clock.clone(),
            &asset_bank,
            &liquidator,
        )
        .await?;
        let mut liquidator_liability_wrapper = find_or_create_bank_account_wrapper(
            self.service(),
            self.clock.clone(),
            &liability_bank,
            &liquidator,
        )
        .await?;

        let pre_balances = LiquidationBalances {
            liquidator_asset_balance: liquidator_asset_wrapper.balance.clone(),
            liquidator_liability_balance: liquidator_liability_wrapper.balance.clone(),
            liquidatee_asset_balance: liquidatee_asset_wrapper.balance.clone(),
            liquidatee_liability_balance: liquidatee_liability_wrapper.balance.clone(),
        };

        // The liquidator buys the collateral at a discount; the insurance
        // vault takes its own cut of the same discount.
        let asset_value = calc_value(asset_amount, asset_price_low, None);
        let liability_value_liquidator = asset_value * (ONE - LIQUIDATION_LIQUIDATOR_FEE);
        let liability_value_final =
            asset_value * (ONE - LIQUIDATION_LIQUIDATOR_FEE - LIQUIDATION_INSURANCE_FEE);
        let liability_quantity_liquidator =
            calc_amount(liability_value_liquidator, liability_price_high)
                .map_err(BankError::Math)?;
        let liability_quantity_final = calc_amount(liability_value_final, liability_price_high)
            .map_err(BankError::Math)?;
        let insurance_fee_quantity = liability_quantity_liquidator - liability_quantity_final;

        debug!(
            %asset_amount,
            %liability_quantity_liquidator,
            %liability_quantity_final,
            %insurance_fee_quantity,
            "liquidating"
        );

        // asset bank: seize from the liquidatee, hand to the liquidator
        liquidatee_asset_wrapper.decrease_balance_in_liquidation(asset_amount)?;
        liquidator_asset_wrapper.bank = liquidatee_asset_wrapper.bank.clone();
        liquidator_asset_wrapper.increase_balance_in_liquidation(asset_amount)?;

        // liability bank: the liquidator takes over the discounted debt and
        // the liquidatee is repaid
        liquidator_liability_wrapper
            .decrease_balance_in_liquidation(liability_quantity_liquidator)?;
        liquidatee_liability_wrapper.bank = liquidator_liability_wrapper.bank.clone();
        liquidatee_liability_wrapper
            .increase_balance_in_liquidation(liability_quantity_final)?;

        // the spread between the two legs funds the insurance vault
        let liability_bank_state = &mut liquidatee_liability_wrapper.bank;
        liability_bank_state.insurance_vault += insurance_fee_quantity;
        if liability_bank_state.liquidity_vault > Decimal::ZERO {
            liability_bank_state.liquidity_vault -= insurance_fee_quantity;
            liability_bank_state.normalize_liquidity_vault();
        }
        if liability_bank_state.liquidity_vault < Decimal::ZERO {
            return Err(ServiceError::Bank(BankError::BankLiquidityDeficit));
        }

        // bring the stale bank copies up to the final states
        let asset_bank_final = liquidator_asset_wrapper.bank.clone();
        let liability_bank_final = liquidatee_liability_wrapper.bank.clone();
        liquidatee_asset_wrapper.bank = asset_bank_final.clone();
        liquidator_liability_wrapper.bank = liability_bank_final.clone();

        let post_engine = RiskEngine::new(
            self.service(),
            &liquidatee,
            &[
                liquidatee_asset_wrapper.clone(),
                liquidatee_liability_wrapper.clone(),
            ],
            self.mgr(),
        )
        .await?;
        let post_health = post_engine
            .check_post_liquidation_condition_and_get_account_health(
                liability_bank_id,
                pre_health,
            )?;

        // the liquidator must remain healthy after taking on the debt
        RiskEngine::check_account_init_health(
            self.service(),
            &liquidator,
            &[
                liquidator_asset_wrapper.clone(),
                liquidator_liability_wrapper.clone(),
            ],
            self.mgr(),
        )
        .await?;

        let result = LiquidateResult {
            pre_balances,
            post_balances: LiquidationBalances {
                liquidator_asset_balance: liquidator_asset_wrapper.balance.clone(),
                liquidator_liability_balance: liquidator_liability_wrapper.balance.clone(),
                liquidatee_asset_balance: liquidatee_asset_wrapper.balance.clone(),
                liquidatee_liability_balance: liquidatee_liability_wrapper.balance.clone(),
            },
            liquidatee_pre_health: pre_health,
            liquidatee_post_health: post_health,
            asset_bank: asset_bank_final,
            liability_bank: liability_bank_final,
            liquidator_asset_wrapper,
            liquidator_liability_wrapper,
            liquidatee_asset_wrapper,
            liquidatee_liability_wrapper,
        };

        self.store.store_liquidation_result(&result).await?;
        Ok(result)
    }

    /// Bankruptcy gate for an account, on current store state.
    pub async fn check_account_bankrupt(&self, account_id: Uuid) -> Result<(), ServiceError> {
        let account = self.store.get_account_by_id(account_id).await?;
        let engine = RiskEngine::new(self.service(), &account, &[], self.mgr()).await?;
        engine.check_account_bankrupt()?;
        Ok(())
    }

    /// Write off a bankrupt account's liability in one bank: the insurance
    /// vault covers what it can, the rest is socialized across depositors.
    pub async fn settle_bad_debt(
        &self,
        account_id: Uuid,
        bank_id: Uuid,
    ) -> Result<Decimal, ServiceError> {
        let account = self.store.get_account_by_id(account_id).await?;
        let mut bank = self.store.get_bank_by_id(bank_id).await?;
        bank.accrue_interest(self.now())?;

        if !bank.get_flag(BankFlags::PERMISSIONLESS_BAD_DEBT_SETTLEMENT) {
            return Err(ServiceError::BadDebtSettlementNotPermitted);
        }

        let engine = RiskEngine::new(self.service(), &account, &[], self.mgr()).await?;
        engine.check_account_bankrupt()?;

        let mut wrapper =
            find_bank_account_wrapper(self.service(), self.clock.clone(), &bank, &account).await?;

        let liability_shares = wrapper.balance.liability_shares;
        let bad_debt = wrapper.bank.get_liability_amount(liability_shares);
        if bad_debt <= ZERO_AMOUNT_THRESHOLD {
            return Err(ServiceError::Bank(BankError::NoLiabilityFound));
        }

        let insurance_cover = wrapper.bank.insurance_vault.min(bad_debt);
        wrapper.bank.transfer_from_insurance_to_liquidity(insurance_cover);

        let socialized = bad_debt - insurance_cover;
        if socialized > Decimal::ZERO {
            wrapper.bank.socialize_loss(socialized);
        }

        wrapper.balance.change_liability_shares(-liability_shares)?;
        wrapper.bank.change_liability_shares(-liability_shares, true)?;
        wrapper.bank.check_utilization_ratio()?;

        self.store.store_bank_account(&wrapper).await?;
        Ok(socialized)
    }

    // ---- views ----

    pub async fn net_apy(&self, account_id: Uuid) -> Result<Decimal, ServiceError> {
        Ok(compute_net_apy(self.service(), self.mgr(), account_id).await?)
    }

    pub async fn liquidation_price(
        &self,
        account_id: Uuid,
        bank_id: Uuid,
        requirement_type: RequirementType,
    ) -> Result<Decimal, ServiceError> {
        let banks: HashMap<Uuid, Bank> = self
            .store
            .list_banks()
            .await?
            .into_iter()
            .map(|bank| (bank.id, bank))
            .collect();

        Ok(compute_liquidation_price_for_bank(
            self.service(),
            &banks,
            &[],
            self.mgr(),
            account_id,
            bank_id,
            requirement_type,
        )
        .await?)
    }
}
