//! Net APY over an account's active positions

use poolfi_bank::{AccountStore, BalanceStore, BankAccountService, BankStore};
use poolfi_core::consts::ONE;
use poolfi_core::math::apr_to_apy;
use poolfi_core::{OraclePriceType, PriceBias, RequirementType};
use poolfi_oracle::PriceAdapterMgr;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::engine::RiskEngine;
use crate::error::RiskError;

/// Aggregate the per-bank lending/borrowing APRs of every active position,
/// weighted by the position's share of the account's equity value, and
/// convert the sum to an APY.
pub async fn compute_net_apy(
    service: &dyn BankAccountService,
    price_feed_mgr: &dyn PriceAdapterMgr,
    account_id: Uuid,
) -> Result<Decimal, RiskError> {
    let account = service.get_account_by_id(account_id).await?;
    let balances = service.list_balances(account_id, None).await?;
    let active_balances: Vec<_> = balances.into_iter().filter(|b| b.active).collect();

    let risk_engine = RiskEngine::new(service, &account, &[], price_feed_mgr).await?;
    let (total_assets, total_liabilities) =
        risk_engine.get_account_health_components(RequirementType::Equity)?;

    let mut total_usd_value = total_assets - total_liabilities;
    if total_usd_value.is_zero() {
        total_usd_value = ONE;
    }

    let utilization_ratio = if total_assets.is_zero() {
        Decimal::ZERO
    } else {
        total_liabilities / total_assets
    };

    let mut weighted_apr = Decimal::ZERO;
    for balance in &active_balances {
        let bank = service.get_bank_by_id(balance.bank_id).await?;
        let price_adapter = price_feed_mgr.get_price_adapter(&bank).await?;
        let price =
            price_adapter.price_of_type(OraclePriceType::RealTime, PriceBias::Original)?;

        let rates = bank
            .config
            .interest_rate_config
            .calc_interest_rate(utilization_ratio)?;

        let asset_usd_value = balance.asset_shares * price;
        let asset_apr = rates.lending_apr * asset_usd_value / total_usd_value;

        let liability_usd_value = balance.liability_shares * price;
        let liability_apr = rates.borrowing_apr * liability_usd_value / total_usd_value;

        weighted_apr += asset_apr - liability_apr;
    }

    Ok(apr_to_apy(weighted_apr))
}
