//! Bank - one market of the pool
//!
//! A bank tracks the exchange rates between internal share units and
//! underlying amounts, the share totals, the three vaults and the two
//! outstanding-fee accumulators. Interest accrual moves the share values;
//! every mutation must leave `total_liabilities <= total_assets`.

use poolfi_core::consts::{EMPTY_BALANCE_THRESHOLD, ONE, SECONDS_PER_YEAR};
use poolfi_core::id::uuid_from_strings;
use poolfi_core::math::{
    accrued_interest_per_period, calc_value, confidence_interval, interest_payment_for_period,
};
use poolfi_core::{Clock, PriceBias, RequirementType};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::config::{BankConfig, BankFlags, BankOperationalState, InterestRateConfig};
use crate::error::BankError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bank {
    pub id: Uuid,
    pub group_id: Uuid,
    pub name: String,

    /// Identifier of the backing asset.
    pub asset_id: String,

    pub asset_share_value: Decimal,
    pub liability_share_value: Decimal,

    pub liquidity_vault: Decimal,
    pub insurance_vault: Decimal,
    pub fee_vault: Decimal,

    pub collected_insurance_fees_outstanding: Decimal,
    pub collected_group_fees_outstanding: Decimal,

    pub total_liability_shares: Decimal,
    pub total_asset_shares: Decimal,

    pub flags: BankFlags,

    pub config: BankConfig,

    pub emissions_asset_id: String,
    pub emissions_rate: Decimal,
    pub emissions_remaining: Decimal,

    pub created_at: i64,
    pub last_update: i64,
}

impl Bank {
    /// Create a bank whose id is derived from (group, name, backing asset).
    pub fn new(
        clock: &dyn Clock,
        group_id: Uuid,
        name: impl Into<String>,
        asset_id: impl Into<String>,
        config: BankConfig,
    ) -> Self {
        let name = name.into();
        let asset_id = asset_id.into();
        let now = clock.now_unix();
        Self {
            id: uuid_from_strings(&[&group_id.to_string(), &name, &asset_id]),
            group_id,
            name,
            asset_id,
            asset_share_value: ONE,
            liability_share_value: ONE,
            liquidity_vault: Decimal::ZERO,
            insurance_vault: Decimal::ZERO,
            fee_vault: Decimal::ZERO,
            collected_insurance_fees_outstanding: Decimal::ZERO,
            collected_group_fees_outstanding: Decimal::ZERO,
            total_liability_shares: Decimal::ZERO,
            total_asset_shares: Decimal::ZERO,
            flags: BankFlags::NONE,
            config,
            emissions_asset_id: String::new(),
            emissions_rate: Decimal::ZERO,
            emissions_remaining: Decimal::ZERO,
            created_at: now,
            last_update: now,
        }
    }

    pub fn get_flag(&self, flag: BankFlags) -> bool {
        self.flags.contains(flag)
    }

    pub fn update_flag(&mut self, value: bool, flag: BankFlags) {
        if value {
            self.flags.set(flag);
        } else {
            self.flags.unset(flag);
        }
    }

    pub fn override_emissions_flag(&mut self, flags: BankFlags) {
        self.flags = flags;
    }

    // ---- share / amount conversion ----

    pub fn get_asset_amount(&self, shares: Decimal) -> Decimal {
        shares * self.asset_share_value
    }

    pub fn get_liability_amount(&self, shares: Decimal) -> Decimal {
        shares * self.liability_share_value
    }

    pub fn get_asset_shares(&self, value: Decimal) -> Decimal {
        value / self.asset_share_value
    }

    pub fn get_liability_shares(&self, value: Decimal) -> Decimal {
        value / self.liability_share_value
    }

    pub fn get_total_asset_quantity(&self) -> Decimal {
        self.total_asset_shares * self.asset_share_value
    }

    pub fn get_total_liability_quantity(&self) -> Decimal {
        self.total_liability_shares * self.liability_share_value
    }

    // ---- totals mutation ----

    /// Move the asset-share total by `shares`, enforcing the deposit limit
    /// on increases unless bypassed.
    pub fn change_asset_shares(
        &mut self,
        shares: Decimal,
        bypass_deposit_limit: bool,
    ) -> Result<(), BankError> {
        let total_asset_shares = self.total_asset_shares + shares;
        self.total_asset_shares = total_asset_shares;

        if shares > Decimal::ZERO && self.config.is_deposit_limit_active() && !bypass_deposit_limit
        {
            let total_deposits_amount = self.get_asset_amount(total_asset_shares);
            if total_deposits_amount > self.config.deposit_limit {
                return Err(BankError::BankAssetCapacityExceeded);
            }
        }

        Ok(())
    }

    /// Move the liability-share total by `shares`, enforcing the borrow
    /// limit on increases unless bypassed.
    pub fn change_liability_shares(
        &mut self,
        shares: Decimal,
        bypass_borrow_limit: bool,
    ) -> Result<(), BankError> {
        self.total_liability_shares += shares;

        if !bypass_borrow_limit && shares > Decimal::ZERO && self.config.is_borrow_limit_active() {
            let total_liability_amount = self.get_liability_amount(self.total_liability_shares);
            if total_liability_amount >= self.config.liability_limit {
                return Err(BankError::BankLiabilityCapacityExceeded);
            }
        }

        Ok(())
    }

    pub fn check_utilization_ratio(&self) -> Result<(), BankError> {
        let total_assets = self.get_asset_amount(self.total_asset_shares);
        let total_liabilities = self.get_liability_amount(self.total_liability_shares);
        if total_assets < total_liabilities {
            return Err(BankError::IllegalUtilizationRatio);
        }
        Ok(())
    }

    pub fn assert_operational_mode(
        &self,
        is_asset_or_liability_amount_increasing: bool,
    ) -> Result<(), BankError> {
        match self.config.operational_state {
            BankOperationalState::Paused => Err(BankError::BankPaused),
            BankOperationalState::Operational | BankOperationalState::None => Ok(()),
            BankOperationalState::ReduceOnly => {
                if is_asset_or_liability_amount_increasing {
                    Err(BankError::BankReduceOnly)
                } else {
                    Ok(())
                }
            }
        }
    }

    // ---- interest accrual ----

    /// Accrue interest since `last_update`, growing both share values and
    /// collecting group/insurance fees. The liquidity vault absorbs the fee
    /// payments; a resulting deficit is fatal.
    pub fn accrue_interest(&mut self, current_timestamp: i64) -> Result<(), BankError> {
        let time_delta = current_timestamp - self.last_update;
        if time_delta <= 0 {
            return Ok(());
        }
        self.last_update = current_timestamp;

        let total_assets = self.get_asset_amount(self.total_asset_shares);
        let total_liabilities = self.get_liability_amount(self.total_liability_shares);
        if total_assets.is_zero() || total_liabilities.is_zero() {
            return Ok(());
        }

        let changes = accrual_state_changes(
            time_delta as u64,
            total_assets,
            total_liabilities,
            &self.config.interest_rate_config,
            self.asset_share_value,
            self.liability_share_value,
        )?;

        self.asset_share_value = changes.asset_share_value;
        self.liability_share_value = changes.liability_share_value;
        self.collected_group_fees_outstanding += changes.group_fee_payment;
        self.collected_insurance_fees_outstanding += changes.insurance_fee_payment;

        if self.liquidity_vault > Decimal::ZERO {
            self.liquidity_vault -= changes.insurance_fee_payment + changes.group_fee_payment;
            self.normalize_liquidity_vault();
        }

        if self.liquidity_vault < Decimal::ZERO {
            return Err(BankError::BankLiquidityDeficit);
        }

        Ok(())
    }

    /// Spread `loss_amount` across all depositors by lowering the asset
    /// share value. A loss covering the whole asset side is a no-op here;
    /// that case is bankruptcy handling.
    pub fn socialize_loss(&mut self, loss_amount: Decimal) {
        if self.total_asset_shares.is_zero()
            || loss_amount >= self.total_asset_shares * self.asset_share_value
        {
            return;
        }

        let total_asset_shares = self.total_asset_shares;
        let old_asset_share_value = self.asset_share_value;
        self.asset_share_value =
            (total_asset_shares * old_asset_share_value - loss_amount) / total_asset_shares;
    }

    pub fn transfer_from_insurance_to_liquidity(&mut self, amount: Decimal) {
        self.insurance_vault -= amount;
        self.liquidity_vault += amount;
    }

    pub fn normalize_liquidity_vault(&mut self) {
        if self.liquidity_vault < EMPTY_BALANCE_THRESHOLD {
            self.liquidity_vault = Decimal::ZERO;
        }
    }

    // ---- valuation ----

    pub fn compute_asset_usd_value(
        &self,
        oracle_price: Decimal,
        asset_shares: Decimal,
        requirement_type: RequirementType,
        price_bias: PriceBias,
    ) -> Decimal {
        let asset_quantity = self.get_asset_amount(asset_shares);
        let asset_weight = self.get_asset_weight(requirement_type, oracle_price, false);
        self.compute_usd_value(oracle_price, asset_quantity, price_bias, asset_weight)
    }

    pub fn compute_liability_usd_value(
        &self,
        oracle_price: Decimal,
        liability_shares: Decimal,
        requirement_type: RequirementType,
        price_bias: PriceBias,
    ) -> Decimal {
        let liability_quantity = self.get_liability_amount(liability_shares);
        let liability_weight = self.get_liability_weight(requirement_type);
        self.compute_usd_value(oracle_price, liability_quantity, price_bias, liability_weight)
    }

    pub fn compute_usd_value(
        &self,
        oracle_price: Decimal,
        quantity: Decimal,
        price_bias: PriceBias,
        weight: Decimal,
    ) -> Decimal {
        let price = self.get_price(oracle_price, price_bias);
        quantity * price * weight
    }

    /// Bias-adjust `oracle_price` by the confidence interval.
    pub fn get_price(&self, oracle_price: Decimal, price_bias: PriceBias) -> Decimal {
        let interval = confidence_interval(oracle_price);
        match price_bias {
            PriceBias::Low => oracle_price - interval,
            PriceBias::High => oracle_price + interval,
            PriceBias::Original => oracle_price,
        }
    }

    /// Asset weight under `requirement_type`; under Initial, a bank over its
    /// USD init cap has the weight scaled down by cap / collateral value.
    pub fn get_asset_weight(
        &self,
        requirement_type: RequirementType,
        oracle_price: Decimal,
        ignore_soft_limits: bool,
    ) -> Decimal {
        match requirement_type {
            RequirementType::Initial => {
                let soft_limit_disabled = self.config.total_asset_value_init_limit.is_zero();
                if ignore_soft_limits || soft_limit_disabled {
                    return self.config.asset_weight_init;
                }
                let total_bank_collateral_value = self.compute_asset_usd_value(
                    oracle_price,
                    self.total_asset_shares,
                    RequirementType::Equity,
                    PriceBias::Low,
                );
                if total_bank_collateral_value > self.config.total_asset_value_init_limit {
                    self.config.total_asset_value_init_limit / total_bank_collateral_value
                        * self.config.asset_weight_init
                } else {
                    self.config.asset_weight_init
                }
            }
            RequirementType::Maintenance => self.config.asset_weight_maint,
            RequirementType::Equity => ONE,
        }
    }

    pub fn get_liability_weight(&self, requirement_type: RequirementType) -> Decimal {
        match requirement_type {
            RequirementType::Initial => self.config.liability_weight_init,
            RequirementType::Maintenance => self.config.liability_weight_maint,
            RequirementType::Equity => ONE,
        }
    }

    /// Scale applied to the Initial asset weight when the bank is over its
    /// USD init cap; zero when inactive or under the cap.
    pub fn maybe_get_asset_weight_init_discount(&self, price: Decimal) -> Decimal {
        if !self.config.usd_init_limit_active() {
            return Decimal::ZERO;
        }

        let bank_total_assets_amount = self.get_asset_amount(self.total_asset_shares);
        let bank_total_assets_value = calc_value(bank_total_assets_amount, price, None);
        if bank_total_assets_value.is_zero() {
            return Decimal::ZERO;
        }

        if bank_total_assets_value >= self.config.total_asset_value_init_limit {
            self.config.total_asset_value_init_limit / bank_total_assets_value
        } else {
            Decimal::ZERO
        }
    }

    pub fn compute_tvl(&self, oracle_price: Decimal) -> Decimal {
        self.compute_asset_usd_value(
            oracle_price,
            self.total_asset_shares,
            RequirementType::Equity,
            PriceBias::Original,
        ) - self.compute_liability_usd_value(
            oracle_price,
            self.total_liability_shares,
            RequirementType::Equity,
            PriceBias::Original,
        )
    }

    // ---- utilization & capacity views ----

    pub fn compute_utilization_rate(&self) -> Decimal {
        let total_deposits = self.get_total_asset_quantity();
        if total_deposits.is_zero() {
            return Decimal::ZERO;
        }
        self.get_total_liability_quantity() / total_deposits
    }

    /// Remaining deposit and borrow capacity, net of the interest that has
    /// built up since the last accrual.
    pub fn compute_remaining_capacity(&self, now: i64) -> Result<(Decimal, Decimal), BankError> {
        let total_deposits = self.get_total_asset_quantity();
        let remaining_deposit_capacity =
            Decimal::ZERO.max(self.config.deposit_limit - total_deposits);

        let total_borrows = self.get_total_liability_quantity();
        let remaining_borrow_capacity =
            Decimal::ZERO.max(self.config.liability_limit - total_borrows);

        let duration_since_last_accrual = now - self.last_update;

        let rates = self
            .config
            .interest_rate_config
            .calc_interest_rate(self.compute_utilization_rate())?;

        let seconds_per_year = Decimal::from(SECONDS_PER_YEAR);
        let outstanding_lending_interest = rates.lending_apr
            * Decimal::from(duration_since_last_accrual)
            / seconds_per_year
            * total_deposits;
        let outstanding_borrow_interest = rates.borrowing_apr
            * Decimal::from(duration_since_last_accrual)
            / seconds_per_year
            * total_borrows;

        Ok((
            remaining_deposit_capacity - outstanding_lending_interest,
            remaining_borrow_capacity - outstanding_borrow_interest,
        ))
    }

    /// Apply the non-zero fields of a config patch and re-validate.
    pub fn configure(&mut self, config: &BankConfig) -> Result<(), BankError> {
        if !config.asset_weight_init.is_zero() {
            self.config.asset_weight_init = config.asset_weight_init;
        }
        if !config.asset_weight_maint.is_zero() {
            self.config.asset_weight_maint = config.asset_weight_maint;
        }
        if !config.liability_weight_init.is_zero() {
            self.config.liability_weight_init = config.liability_weight_init;
        }
        if !config.liability_weight_maint.is_zero() {
            self.config.liability_weight_maint = config.liability_weight_maint;
        }
        if !config.deposit_limit.is_zero() {
            self.config.deposit_limit = config.deposit_limit;
        }
        if !config.liability_limit.is_zero() {
            self.config.liability_limit = config.liability_limit;
        }
        if config.interest_rate_config != InterestRateConfig::default() {
            self.config.interest_rate_config = config.interest_rate_config;
        }
        if config.risk_tier == crate::config::RiskTier::Isolated {
            self.config.risk_tier = crate::config::RiskTier::Isolated;
        }
        if !config.total_asset_value_init_limit.is_zero() {
            self.config.total_asset_value_init_limit = config.total_asset_value_init_limit;
        }
        if config.oracle_max_age != 0 {
            self.config.oracle_max_age = config.oracle_max_age;
        }

        self.config.validate()
    }
}

/// Post-accrual share values and fee payments for one period.
#[derive(Debug, Clone, Copy)]
struct AccrualStateChanges {
    asset_share_value: Decimal,
    liability_share_value: Decimal,
    group_fee_payment: Decimal,
    insurance_fee_payment: Decimal,
}

fn accrual_state_changes(
    time_delta: u64,
    total_assets_amount: Decimal,
    total_liabilities_amount: Decimal,
    interest_rate_config: &InterestRateConfig,
    asset_share_value: Decimal,
    liability_share_value: Decimal,
) -> Result<AccrualStateChanges, BankError> {
    let utilization_rate = total_liabilities_amount / total_assets_amount;

    let rates = interest_rate_config.calc_interest_rate(utilization_rate)?;
    debug!(
        time_delta,
        %utilization_rate,
        lending_apr = %rates.lending_apr,
        borrowing_apr = %rates.borrowing_apr,
        group_fee_apr = %rates.group_fee_apr,
        insurance_fee_apr = %rates.insurance_fee_apr,
        "accruing interest"
    );

    Ok(AccrualStateChanges {
        asset_share_value: accrued_interest_per_period(
            rates.lending_apr,
            time_delta,
            asset_share_value,
        ),
        liability_share_value: accrued_interest_per_period(
            rates.borrowing_apr,
            time_delta,
            liability_share_value,
        ),
        group_fee_payment: interest_payment_for_period(
            rates.group_fee_apr,
            time_delta,
            total_liabilities_amount,
        ),
        insurance_fee_payment: interest_payment_for_period(
            rates.insurance_fee_apr,
            time_delta,
            total_liabilities_amount,
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RiskTier;
    use poolfi_core::ManualClock;
    use rust_decimal_macros::dec;

    fn test_config() -> BankConfig {
        BankConfig {
            asset_weight_init: dec!(0.8),
            asset_weight_maint: dec!(0.9),
            liability_weight_init: dec!(1.2),
            liability_weight_maint: dec!(1.1),
            interest_rate_config: InterestRateConfig {
                optimal_utilization_rate: dec!(0.8),
                plateau_interest_rate: dec!(0.1),
                max_interest_rate: dec!(1.0),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn test_bank() -> Bank {
        let clock = ManualClock::new(1_700_000_000);
        Bank::new(
            &clock,
            Uuid::nil(),
            "USDT",
            "asset-usdt",
            test_config(),
        )
    }

    #[test]
    fn bank_id_is_deterministic() {
        let a = test_bank();
        let b = test_bank();
        assert_eq!(a.id, b.id);
    }

    #[test]
    fn share_values_start_at_one() {
        let bank = test_bank();
        assert_eq!(bank.asset_share_value, ONE);
        assert_eq!(bank.liability_share_value, ONE);
        assert_eq!(bank.get_asset_amount(dec!(100)), dec!(100));
        assert_eq!(bank.get_asset_shares(dec!(100)), dec!(100));
    }

    #[test]
    fn deposit_limit_enforced_and_bypassable() {
        let mut bank = test_bank();
        bank.config.deposit_limit = dec!(100);

        assert_eq!(
            bank.change_asset_shares(dec!(150), false),
            Err(BankError::BankAssetCapacityExceeded)
        );

        let mut bank = test_bank();
        bank.config.deposit_limit = dec!(100);
        assert!(bank.change_asset_shares(dec!(150), true).is_ok());
        assert_eq!(bank.total_asset_shares, dec!(150));
    }

    #[test]
    fn deposit_limit_ignores_decreases() {
        let mut bank = test_bank();
        bank.config.deposit_limit = dec!(100);
        bank.change_asset_shares(dec!(150), true).unwrap();
        assert!(bank.change_asset_shares(dec!(-100), false).is_ok());
    }

    #[test]
    fn borrow_limit_is_strict() {
        let mut bank = test_bank();
        bank.config.liability_limit = dec!(100);
        bank.change_asset_shares(dec!(1000), true).unwrap();

        // exactly at the limit is already too much
        assert_eq!(
            bank.change_liability_shares(dec!(100), false),
            Err(BankError::BankLiabilityCapacityExceeded)
        );

        let mut bank = test_bank();
        bank.config.liability_limit = dec!(100);
        bank.change_asset_shares(dec!(1000), true).unwrap();
        assert!(bank.change_liability_shares(dec!(99), false).is_ok());
    }

    #[test]
    fn utilization_check_fails_when_liabilities_exceed_assets() {
        let mut bank = test_bank();
        bank.change_asset_shares(dec!(100), true).unwrap();
        bank.change_liability_shares(dec!(150), true).unwrap();
        assert_eq!(
            bank.check_utilization_ratio(),
            Err(BankError::IllegalUtilizationRatio)
        );
    }

    #[test]
    fn operational_mode_gating() {
        let mut bank = test_bank();
        assert!(bank.assert_operational_mode(true).is_ok());

        bank.config.operational_state = BankOperationalState::Paused;
        assert_eq!(bank.assert_operational_mode(false), Err(BankError::BankPaused));

        bank.config.operational_state = BankOperationalState::ReduceOnly;
        assert_eq!(
            bank.assert_operational_mode(true),
            Err(BankError::BankReduceOnly)
        );
        assert!(bank.assert_operational_mode(false).is_ok());
    }

    #[test]
    fn accrual_is_a_noop_without_time_or_totals() {
        let mut bank = test_bank();
        let before = bank.clone();
        bank.accrue_interest(bank.last_update).unwrap();
        assert_eq!(bank, before);

        // time passes but the bank is empty
        bank.accrue_interest(bank.last_update + 3600).unwrap();
        assert_eq!(bank.asset_share_value, ONE);
        assert_eq!(bank.liability_share_value, ONE);
    }

    #[test]
    fn accrual_grows_share_values_monotonically() {
        let mut bank = test_bank();
        bank.change_asset_shares(dec!(1000), true).unwrap();
        bank.change_liability_shares(dec!(500), true).unwrap();

        let asset_sv_0 = bank.asset_share_value;
        let liab_sv_0 = bank.liability_share_value;

        bank.accrue_interest(bank.last_update + 86_400).unwrap();
        assert!(bank.asset_share_value > asset_sv_0);
        assert!(bank.liability_share_value > liab_sv_0);

        let asset_sv_1 = bank.asset_share_value;
        let liab_sv_1 = bank.liability_share_value;

        bank.accrue_interest(bank.last_update + 86_400).unwrap();
        assert!(bank.asset_share_value > asset_sv_1);
        assert!(bank.liability_share_value > liab_sv_1);

        // borrowers pay at least what lenders earn
        assert!(bank.check_utilization_ratio().is_ok());
    }

    #[test]
    fn accrual_collects_fees_into_accumulators_and_vault() {
        let mut bank = test_bank();
        bank.config.interest_rate_config.protocol_fixed_fee_apr = dec!(0.01);
        bank.config.interest_rate_config.insurance_fee_fixed_apr = dec!(0.01);
        bank.change_asset_shares(dec!(1000), true).unwrap();
        bank.change_liability_shares(dec!(500), true).unwrap();
        bank.liquidity_vault = dec!(500);

        bank.accrue_interest(bank.last_update + SECONDS_PER_YEAR).unwrap();

        assert!(bank.collected_group_fees_outstanding > Decimal::ZERO);
        assert!(bank.collected_insurance_fees_outstanding > Decimal::ZERO);
        assert!(bank.liquidity_vault < dec!(500));
        assert!(bank.liquidity_vault >= Decimal::ZERO);
    }

    #[test]
    fn accrual_with_empty_vault_leaves_vault_untouched() {
        let mut bank = test_bank();
        bank.config.interest_rate_config.protocol_fixed_fee_apr = dec!(0.01);
        bank.change_asset_shares(dec!(1000), true).unwrap();
        bank.change_liability_shares(dec!(500), true).unwrap();

        bank.accrue_interest(bank.last_update + 86_400).unwrap();
        assert_eq!(bank.liquidity_vault, Decimal::ZERO);
    }

    #[test]
    fn socialize_loss_lowers_asset_share_value() {
        let mut bank = test_bank();
        bank.change_asset_shares(dec!(1000), true).unwrap();

        bank.socialize_loss(dec!(100));
        assert_eq!(bank.asset_share_value, dec!(0.9));
        assert_eq!(bank.get_total_asset_quantity(), dec!(900));
    }

    #[test]
    fn socialize_loss_covering_everything_is_a_noop() {
        let mut bank = test_bank();
        bank.change_asset_shares(dec!(100), true).unwrap();
        bank.socialize_loss(dec!(100));
        assert_eq!(bank.asset_share_value, ONE);
    }

    #[test]
    fn normalize_floors_dust_to_zero() {
        let mut bank = test_bank();
        bank.liquidity_vault = dec!(0.000000005);
        bank.normalize_liquidity_vault();
        assert_eq!(bank.liquidity_vault, Decimal::ZERO);

        bank.liquidity_vault = dec!(0.5);
        bank.normalize_liquidity_vault();
        assert_eq!(bank.liquidity_vault, dec!(0.5));
    }

    #[test]
    fn price_bias_spans_the_confidence_band() {
        let bank = test_bank();
        assert_eq!(bank.get_price(dec!(100), PriceBias::Original), dec!(100));
        assert_eq!(bank.get_price(dec!(100), PriceBias::Low), dec!(95));
        assert_eq!(bank.get_price(dec!(100), PriceBias::High), dec!(105));
    }

    #[test]
    fn init_weight_discount_when_over_usd_cap() {
        let mut bank = test_bank();
        bank.change_asset_shares(dec!(1000), true).unwrap();
        bank.config.total_asset_value_init_limit = dec!(500);

        // collateral value 1000 at price 1 -> discount 0.5
        assert_eq!(bank.maybe_get_asset_weight_init_discount(dec!(1)), dec!(0.5));
        // under the cap -> no discount
        assert_eq!(
            bank.maybe_get_asset_weight_init_discount(dec!(0.2)),
            Decimal::ZERO
        );

        bank.config.total_asset_value_init_limit = Decimal::MAX;
        assert_eq!(
            bank.maybe_get_asset_weight_init_discount(dec!(1)),
            Decimal::ZERO
        );
    }

    #[test]
    fn initial_asset_weight_scales_over_the_cap() {
        let mut bank = test_bank();
        bank.change_asset_shares(dec!(1000), true).unwrap();
        bank.config.total_asset_value_init_limit = dec!(475);

        // equity value with Low bias: 1000 * 0.95 = 950 -> scale 0.5
        let weight = bank.get_asset_weight(RequirementType::Initial, dec!(1), false);
        assert_eq!(weight, dec!(0.5) * dec!(0.8));

        // ignoring soft limits returns the configured weight
        let weight = bank.get_asset_weight(RequirementType::Initial, dec!(1), true);
        assert_eq!(weight, dec!(0.8));
    }

    #[test]
    fn utilization_rate_and_tvl() {
        let mut bank = test_bank();
        bank.change_asset_shares(dec!(1000), true).unwrap();
        bank.change_liability_shares(dec!(250), true).unwrap();

        assert_eq!(bank.compute_utilization_rate(), dec!(0.25));
        assert_eq!(bank.compute_tvl(dec!(2)), dec!(1500));
    }

    #[test]
    fn remaining_capacity_subtracts_outstanding_interest() {
        let mut bank = test_bank();
        bank.config.deposit_limit = dec!(2000);
        bank.config.liability_limit = dec!(1000);
        bank.change_asset_shares(dec!(1000), true).unwrap();
        bank.change_liability_shares(dec!(500), true).unwrap();

        let (deposit_cap, borrow_cap) =
            bank.compute_remaining_capacity(bank.last_update).unwrap();
        assert_eq!(deposit_cap, dec!(1000));
        assert_eq!(borrow_cap, dec!(500));

        let (deposit_cap_later, borrow_cap_later) = bank
            .compute_remaining_capacity(bank.last_update + SECONDS_PER_YEAR)
            .unwrap();
        assert!(deposit_cap_later < deposit_cap);
        assert!(borrow_cap_later < borrow_cap);
    }

    #[test]
    fn configure_patches_and_revalidates() {
        let mut bank = test_bank();
        let untouched = BankConfig {
            asset_weight_init: Decimal::ZERO,
            asset_weight_maint: Decimal::ZERO,
            liability_weight_init: Decimal::ZERO,
            liability_weight_maint: Decimal::ZERO,
            deposit_limit: Decimal::ZERO,
            liability_limit: Decimal::ZERO,
            total_asset_value_init_limit: Decimal::ZERO,
            oracle_max_age: 0,
            ..BankConfig::default()
        };
        let patch = BankConfig {
            asset_weight_init: dec!(0.5),
            deposit_limit: dec!(123),
            ..untouched
        };
        bank.configure(&patch).unwrap();
        assert_eq!(bank.config.asset_weight_init, dec!(0.5));
        assert_eq!(bank.config.deposit_limit, dec!(123));
        // untouched fields survive
        assert_eq!(bank.config.asset_weight_maint, dec!(0.9));

        let bad = BankConfig {
            asset_weight_init: dec!(2),
            ..patch
        };
        assert_eq!(bank.configure(&bad), Err(BankError::InvalidConfig));
    }

    #[test]
    fn isolated_bank_configuration_keeps_zero_weights() {
        let mut config = test_config();
        config.risk_tier = RiskTier::Isolated;
        config.asset_weight_init = Decimal::ZERO;
        config.asset_weight_maint = Decimal::ZERO;
        assert!(config.validate().is_ok());
    }
}
