//! BankAccountWrapper - the mutation protocol
//!
//! The wrapper owns working copies of one bank and one balance and is the
//! sole mutator of both for the duration of one operation. Every mutation
//! follows the same protocol: claim emissions, split the amount into its
//! debt-side and asset-side components, enforce the operation-type
//! restriction and the bank's operational mode, convert amounts to shares at
//! the current exchange rates, mutate balance then bank, and re-check the
//! utilization invariant.
//!
//! Callers persist the wrapper's bank and balance only after the whole
//! operation succeeds; a failed operation leaves nothing observable.

use poolfi_core::consts::{
    EMPTY_BALANCE_THRESHOLD, MIN_EMISSIONS_START_TIME, ZERO_AMOUNT_THRESHOLD,
};
use poolfi_core::math::calc_emissions;
use poolfi_core::{BalanceSide, Clock, SystemClock};
use rust_decimal::{Decimal, RoundingStrategy};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::account::Account;
use crate::balance::{Balance, BalanceDecreaseType, BalanceIncreaseType};
use crate::bank::Bank;
use crate::config::BankFlags;
use crate::error::BankError;
use crate::store::{BalanceStore, BankAccountService, BankStore, StoreError};

#[derive(Clone)]
pub struct BankAccountWrapper {
    pub bank: Bank,
    pub balance: Balance,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for BankAccountWrapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BankAccountWrapper")
            .field("bank", &self.bank)
            .field("balance", &self.balance)
            .finish()
    }
}

impl BankAccountWrapper {
    pub fn new(bank: Bank, balance: Balance) -> Self {
        Self::with_clock(bank, balance, Arc::new(SystemClock))
    }

    pub fn with_clock(bank: Bank, balance: Balance, clock: Arc<dyn Clock>) -> Self {
        Self { bank, balance, clock }
    }

    // ---- user-facing operations ----

    pub fn deposit(&mut self, amount: Decimal) -> Result<(), BankError> {
        self.increase_balance_internal(amount, BalanceIncreaseType::Any)
    }

    pub fn repay(&mut self, amount: Decimal) -> Result<(), BankError> {
        self.increase_balance_internal(amount, BalanceIncreaseType::RepayOnly)
    }

    pub fn withdraw(&mut self, amount: Decimal) -> Result<(), BankError> {
        self.decrease_balance_internal(amount, BalanceDecreaseType::WithdrawOnly)
    }

    pub fn borrow(&mut self, amount: Decimal) -> Result<(), BankError> {
        self.decrease_balance_internal(amount, BalanceDecreaseType::Any)
    }

    // ---- hybrid operations for seamless repay+deposit / withdraw+borrow ----

    pub fn increase_balance(&mut self, amount: Decimal) -> Result<(), BankError> {
        self.increase_balance_internal(amount, BalanceIncreaseType::Any)
    }

    pub fn increase_balance_in_liquidation(&mut self, amount: Decimal) -> Result<(), BankError> {
        self.increase_balance_internal(amount, BalanceIncreaseType::BypassDepositLimit)
    }

    pub fn decrease_balance_in_liquidation(&mut self, amount: Decimal) -> Result<(), BankError> {
        self.decrease_balance_internal(amount, BalanceDecreaseType::BypassBorrowLimit)
    }

    /// Close out the asset side entirely. Returns the transferable amount,
    /// truncated to 8 decimals; the rounding residue stays with the bank as
    /// insurance fees.
    pub fn withdraw_all(&mut self) -> Result<Decimal, BankError> {
        let current_timestamp = self.clock.now_unix();
        self.claim_emissions(current_timestamp)?;

        self.bank.assert_operational_mode(false)?;

        let total_asset_shares = self.balance.asset_shares;
        let total_liability_shares = self.balance.liability_shares;

        let current_liability_amount = self.bank.get_liability_amount(total_liability_shares);
        if current_liability_amount >= EMPTY_BALANCE_THRESHOLD {
            return Err(BankError::NoAssetFound);
        }

        let current_asset_amount = self.bank.get_asset_amount(total_asset_shares);
        debug!(%current_asset_amount, "withdrawing all");
        if current_asset_amount <= ZERO_AMOUNT_THRESHOLD {
            return Err(BankError::NoAssetFound);
        }

        self.balance.close(&*self.clock)?;
        self.bank.change_asset_shares(-total_asset_shares, false)?;
        self.bank.check_utilization_ratio()?;

        let withdraw_amount = current_asset_amount.trunc_with_scale(8);
        self.bank.collected_insurance_fees_outstanding +=
            current_asset_amount - withdraw_amount;

        Ok(withdraw_amount)
    }

    /// Close out the liability side entirely. Returns the amount the user
    /// owes, rounded up to 5 decimals; the surplus becomes insurance fees
    /// and is paid out of the liquidity vault.
    pub fn repay_all(&mut self) -> Result<Decimal, BankError> {
        let current_timestamp = self.clock.now_unix();
        self.claim_emissions(current_timestamp)?;

        self.bank.assert_operational_mode(false)?;

        let total_asset_shares = self.balance.asset_shares;
        let total_liability_shares = self.balance.liability_shares;

        let current_liability_amount = self.bank.get_liability_amount(total_liability_shares);
        if current_liability_amount <= ZERO_AMOUNT_THRESHOLD {
            return Err(BankError::NoLiabilityFound);
        }

        let current_asset_amount = self.bank.get_asset_amount(total_asset_shares);
        if current_asset_amount >= EMPTY_BALANCE_THRESHOLD {
            return Err(BankError::NoAssetFound);
        }

        self.balance.close(&*self.clock)?;
        self.bank
            .change_liability_shares(-total_liability_shares, false)?;

        let repay_amount = current_liability_amount
            .round_dp_with_strategy(5, RoundingStrategy::ToPositiveInfinity);
        let insurance_fee_increase = repay_amount - current_liability_amount;
        self.bank.collected_insurance_fees_outstanding += insurance_fee_increase;

        if self.bank.liquidity_vault > Decimal::ZERO {
            self.bank.liquidity_vault -= insurance_fee_increase;
            self.bank.normalize_liquidity_vault();
        }
        if self.bank.liquidity_vault < Decimal::ZERO {
            return Err(BankError::BankLiquidityDeficit);
        }

        Ok(repay_amount)
    }

    /// Close an empty balance; both sides must be below the dust threshold.
    pub fn close_balance(&mut self) -> Result<(), BankError> {
        let current_timestamp = self.clock.now_unix();
        self.claim_emissions(current_timestamp)?;

        let current_liability_amount =
            self.bank.get_liability_amount(self.balance.liability_shares);
        let current_asset_amount = self.bank.get_asset_amount(self.balance.asset_shares);

        if current_liability_amount >= EMPTY_BALANCE_THRESHOLD {
            return Err(BankError::IllegalBalanceState);
        }
        if current_asset_amount >= EMPTY_BALANCE_THRESHOLD {
            return Err(BankError::IllegalBalanceState);
        }

        self.balance.close(&*self.clock)
    }

    pub(crate) fn increase_balance_internal(
        &mut self,
        balance_delta: Decimal,
        operation_type: BalanceIncreaseType,
    ) -> Result<(), BankError> {
        let current_timestamp = self.clock.now_unix();
        self.claim_emissions(current_timestamp)?;

        let current_liability_shares = self.balance.liability_shares;
        let current_liability_amount = self.bank.get_liability_amount(current_liability_shares);

        let liability_amount_decrease = current_liability_amount.min(balance_delta);
        let asset_amount_increase =
            (balance_delta - current_liability_amount).max(Decimal::ZERO);

        match operation_type {
            BalanceIncreaseType::RepayOnly => {
                if !asset_amount_increase.is_zero() {
                    return Err(BankError::OperationRepayOnly);
                }
            }
            BalanceIncreaseType::DepositOnly => {
                if !liability_amount_decrease.is_zero() {
                    return Err(BankError::OperationDepositOnly);
                }
            }
            _ => {}
        }

        self.bank
            .assert_operational_mode(asset_amount_increase > ZERO_AMOUNT_THRESHOLD)?;

        let asset_shares_increase = self.bank.get_asset_shares(asset_amount_increase);
        self.balance.change_asset_shares(asset_shares_increase)?;
        self.bank.change_asset_shares(
            asset_shares_increase,
            operation_type == BalanceIncreaseType::BypassDepositLimit,
        )?;

        let liability_shares_decrease = self.bank.get_liability_shares(liability_amount_decrease);
        // a decrease can never violate the borrow limit
        self.balance
            .change_liability_shares(-liability_shares_decrease)?;
        self.bank
            .change_liability_shares(-liability_shares_decrease, true)?;

        self.bank.check_utilization_ratio()
    }

    pub(crate) fn decrease_balance_internal(
        &mut self,
        balance_delta: Decimal,
        operation_type: BalanceDecreaseType,
    ) -> Result<(), BankError> {
        debug!(%balance_delta, %operation_type, "balance decrease");
        let current_timestamp = self.clock.now_unix();
        self.claim_emissions(current_timestamp)?;

        let current_asset_shares = self.balance.asset_shares;
        let current_asset_amount = self.bank.get_asset_amount(current_asset_shares);

        let asset_amount_decrease = current_asset_amount.min(balance_delta);
        let liability_amount_increase =
            (balance_delta - current_asset_amount).max(Decimal::ZERO);

        match operation_type {
            BalanceDecreaseType::WithdrawOnly => {
                if !liability_amount_increase.is_zero() {
                    return Err(BankError::OperationWithdrawOnly);
                }
            }
            BalanceDecreaseType::BorrowOnly => {
                if !asset_amount_decrease.is_zero() {
                    return Err(BankError::OperationBorrowOnly);
                }
            }
            _ => {}
        }

        self.bank
            .assert_operational_mode(liability_amount_increase > ZERO_AMOUNT_THRESHOLD)?;

        let asset_shares_decrease = self.bank.get_asset_shares(asset_amount_decrease);
        self.balance.change_asset_shares(-asset_shares_decrease)?;
        self.bank.change_asset_shares(-asset_shares_decrease, false)?;

        let liability_shares_increase = self.bank.get_liability_shares(liability_amount_increase);
        self.balance
            .change_liability_shares(liability_shares_increase)?;
        self.bank.change_liability_shares(
            liability_shares_increase,
            operation_type == BalanceDecreaseType::BypassBorrowLimit,
        )?;

        self.bank.check_utilization_ratio()
    }

    /// Claim emissions accrued since the balance's last update and add them
    /// to the outstanding bucket, bounded by the bank's remaining budget.
    pub fn claim_emissions(&mut self, current_timestamp: i64) -> Result<(), BankError> {
        let side = self.balance.get_side()?;

        let balance_amount = if side == BalanceSide::Assets
            && self.bank.get_flag(BankFlags::LENDING_ACTIVE)
        {
            self.bank.get_asset_amount(self.balance.asset_shares)
        } else if side == BalanceSide::Liabilities && self.bank.get_flag(BankFlags::BORROW_ACTIVE)
        {
            self.bank.get_liability_amount(self.balance.liability_shares)
        } else {
            return Ok(());
        };

        let mut last_update = self.balance.last_update;
        if last_update < MIN_EMISSIONS_START_TIME {
            last_update = current_timestamp;
        }

        let period = current_timestamp - last_update;
        if period <= 0 {
            return Ok(());
        }

        let emissions_rate = self.bank.emissions_rate;

        self.balance.last_update = current_timestamp;

        let emissions = calc_emissions(period, balance_amount, emissions_rate)?;
        let emissions_real = emissions.min(self.bank.emissions_remaining);

        if emissions != emissions_real {
            warn!(%emissions_real, %emissions, period, "emissions capped");
        }

        self.balance.emissions_outstanding += emissions_real;
        self.bank.emissions_remaining -= emissions_real;

        Ok(())
    }

    /// Settle outstanding emissions and return the transferable amount
    /// truncated to 8 decimals. The residue returns to the bank's budget.
    pub fn settle_emissions_and_get_transfer_amount(&mut self) -> Result<Decimal, BankError> {
        let current_timestamp = self.clock.now_unix();
        self.claim_emissions(current_timestamp)?;

        let emissions_outstanding = self.balance.emissions_outstanding;
        let emissions_floored = emissions_outstanding.trunc_with_scale(8);

        self.balance.emissions_outstanding = emissions_outstanding - emissions_floored;

        if self.balance.emissions_outstanding > Decimal::ZERO {
            self.bank.emissions_remaining += self.balance.emissions_outstanding;
            self.balance.emissions_outstanding = Decimal::ZERO;
        }

        Ok(emissions_floored)
    }
}

/// Load a wrapper for an existing (bank, account) balance.
pub async fn find_bank_account_wrapper(
    service: &dyn BankAccountService,
    clock: Arc<dyn Clock>,
    bank: &Bank,
    account: &Account,
) -> Result<BankAccountWrapper, BankError> {
    service
        .get_bank_by_id(bank.id)
        .await
        .map_err(|_| BankError::BankAccountNotFound)?;

    let balance = service
        .find_balance(bank.id, account.id)
        .await
        .map_err(|_| BankError::LendingAccountBalanceNotFound)?;

    Ok(BankAccountWrapper::with_clock(bank.clone(), balance, clock))
}

/// Load a wrapper, creating an empty balance when none is persisted yet.
pub async fn find_or_create_bank_account_wrapper(
    service: &dyn BankAccountService,
    clock: Arc<dyn Clock>,
    bank: &Bank,
    account: &Account,
) -> Result<BankAccountWrapper, BankError> {
    service
        .get_bank_by_id(bank.id)
        .await
        .map_err(|_| BankError::BankAccountNotFound)?;

    let balance = find_or_create_balance(service, &*clock, bank, account).await?;

    Ok(BankAccountWrapper::with_clock(bank.clone(), balance, clock))
}

/// Fetch the balance for (bank, account); a missing record means "create",
/// any other store failure surfaces.
pub async fn find_or_create_balance(
    service: &dyn BankAccountService,
    clock: &dyn Clock,
    bank: &Bank,
    account: &Account,
) -> Result<Balance, BankError> {
    match service.find_balance(bank.id, account.id).await {
        Ok(balance) => Ok(balance),
        Err(StoreError::NotFound) => {
            let balance = Balance::new(clock, account.id, bank.id);
            service.upsert_balance(&balance).await?;
            Ok(balance)
        }
        Err(err) => Err(err.into()),
    }
}
