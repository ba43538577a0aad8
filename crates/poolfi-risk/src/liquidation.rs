//! Liquidation pricing and result shapes

use poolfi_bank::{
    AccountStore, Balance, BalanceStore, Bank, BankAccountService, BankAccountWrapper, BankError,
    StoreError,
};
use poolfi_core::{OraclePriceType, PriceBias, RequirementType};
use poolfi_oracle::PriceAdapterMgr;
use rust_decimal::Decimal;
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::RiskError;

/// The four balances a liquidation touches, captured before and after.
#[derive(Debug, Clone)]
pub struct LiquidationBalances {
    pub liquidator_asset_balance: Balance,
    pub liquidator_liability_balance: Balance,
    pub liquidatee_asset_balance: Balance,
    pub liquidatee_liability_balance: Balance,
}

/// Everything a committed liquidation produced.
#[derive(Debug, Clone)]
pub struct LiquidateResult {
    pub pre_balances: LiquidationBalances,
    pub post_balances: LiquidationBalances,
    pub liquidatee_pre_health: Decimal,
    pub liquidatee_post_health: Decimal,

    pub asset_bank: Bank,
    pub liability_bank: Bank,

    pub liquidator_asset_wrapper: BankAccountWrapper,
    pub liquidator_liability_wrapper: BankAccountWrapper,
    pub liquidatee_asset_wrapper: BankAccountWrapper,
    pub liquidatee_liability_wrapper: BankAccountWrapper,
}

/// Health components of an account with some banks excluded, at unbiased
/// time-weighted point prices, conservative bias applied per side.
pub async fn compute_health_components(
    service: &dyn BankAccountService,
    banks: &HashMap<Uuid, Bank>,
    price_feed_mgr: &dyn PriceAdapterMgr,
    account_id: Uuid,
    requirement_type: RequirementType,
    excluded_banks: &[Uuid],
) -> Result<(Decimal, Decimal), RiskError> {
    let account = service.get_account_by_id(account_id).await?;
    let balances = service.list_balances(account.id, None).await?;

    let mut total_assets = Decimal::ZERO;
    let mut total_liabilities = Decimal::ZERO;

    for balance in balances
        .iter()
        .filter(|b| !excluded_banks.contains(&b.bank_id))
    {
        let bank = banks
            .get(&balance.bank_id)
            .ok_or(RiskError::Bank(BankError::BankAccountNotFound))?;
        let price_adapter = price_feed_mgr.get_price_adapter(bank).await?;
        let price =
            price_adapter.price_of_type(OraclePriceType::TimeWeighted, PriceBias::Original)?;

        let (assets, liabilities) =
            balance.get_usd_value_with_price_bias(bank, price, requirement_type);
        total_assets += assets;
        total_liabilities += liabilities;
    }

    Ok((total_assets, total_liabilities))
}

/// The oracle price at which the account's position in `bank_id` crosses
/// the `requirement_type` boundary, projected from a snapshot with that bank
/// excluded. Zero means no meaningful liquidation price exists.
pub async fn compute_liquidation_price_for_bank(
    service: &dyn BankAccountService,
    banks: &HashMap<Uuid, Bank>,
    changed_bank_accounts: &[BankAccountWrapper],
    price_feed_mgr: &dyn PriceAdapterMgr,
    account_id: Uuid,
    bank_id: Uuid,
    requirement_type: RequirementType,
) -> Result<Decimal, RiskError> {
    let bank = banks
        .get(&bank_id)
        .ok_or(RiskError::Bank(BankError::BankAccountNotFound))?;

    let mut balance = match service.find_balance(bank_id, account_id).await {
        Ok(balance) => Some(balance),
        Err(StoreError::NotFound) => None,
        Err(err) => return Err(err.into()),
    };
    for wrapper in changed_bank_accounts {
        if wrapper.balance.account_id == account_id && wrapper.balance.bank_id == bank_id {
            balance = Some(wrapper.balance.clone());
            break;
        }
    }

    let balance = match balance {
        Some(balance) if balance.active => balance,
        _ => return Ok(Decimal::ZERO),
    };

    let is_lending = balance.liability_shares.is_zero();
    let (assets, liabilities) = compute_health_components(
        service,
        banks,
        price_feed_mgr,
        account_id,
        requirement_type,
        &[bank_id],
    )
    .await?;

    let price_adapter = price_feed_mgr.get_price_adapter(bank).await?;
    let price = price_adapter.price_of_type(OraclePriceType::TimeWeighted, PriceBias::Original)?;

    let (assets_quantity, liabilities_quantity) = balance.compute_quantity(bank);

    let liquidation_price = if is_lending {
        if liabilities.is_zero() || assets_quantity.is_zero() {
            return Ok(Decimal::ZERO);
        }

        let asset_weight = bank.get_asset_weight(requirement_type, price, false);
        let price_confidence = price - bank.get_price(price, PriceBias::Low);
        let denominator = assets_quantity * asset_weight;
        if denominator.is_zero() {
            return Ok(Decimal::ZERO);
        }

        liabilities - assets / denominator + price_confidence
    } else {
        if liabilities_quantity.is_zero() {
            return Ok(Decimal::ZERO);
        }

        let liability_weight = bank.get_liability_weight(requirement_type);
        let price_confidence = bank.get_price(price, PriceBias::High) - price;
        let denominator = liabilities_quantity * liability_weight;
        if denominator.is_zero() {
            return Ok(Decimal::ZERO);
        }

        (assets - liabilities) / denominator - price_confidence
    };

    if liquidation_price <= Decimal::ZERO {
        return Ok(Decimal::ZERO);
    }
    Ok(liquidation_price)
}
