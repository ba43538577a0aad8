//! Bank configuration: weights, limits, interest-rate curve, flags

use poolfi_core::consts::ONE;
use poolfi_core::{BalanceSide, RequirementType};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitAnd, BitOr};

use crate::error::BankError;

/// Operational state of a bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BankOperationalState {
    Paused,
    Operational,
    ReduceOnly,
    None,
}

impl fmt::Display for BankOperationalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BankOperationalState::Paused => write!(f, "Paused"),
            BankOperationalState::Operational => write!(f, "Operational"),
            BankOperationalState::ReduceOnly => write!(f, "Reduce Only"),
            BankOperationalState::None => write!(f, "None"),
        }
    }
}

/// Collateral contributes weighted value to health; Isolated contributes
/// nothing and is restricted to a single liability position per account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskTier {
    Collateral,
    Isolated,
}

/// Which oracle backend serves this bank's prices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OracleSetup {
    /// No oracle configured. Banks in this state fail config validation.
    None,
    /// Time-weighted and real-time feeds resolved by the adapter manager.
    MarketFeed,
}

/// Bit-set of bank capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BankFlags(u8);

impl BankFlags {
    pub const NONE: Self = Self(0);
    pub const BORROW_ACTIVE: Self = Self(1 << 0);
    pub const LENDING_ACTIVE: Self = Self(1 << 1);
    pub const PERMISSIONLESS_BAD_DEBT_SETTLEMENT: Self = Self(1 << 2);

    pub const EMISSIONS_ACTIVE: Self = Self(Self::BORROW_ACTIVE.0 | Self::LENDING_ACTIVE.0);
    pub const GROUP_ACTIVE: Self =
        Self(Self::PERMISSIONLESS_BAD_DEBT_SETTLEMENT.0 | Self::EMISSIONS_ACTIVE.0);

    pub fn contains(self, flag: BankFlags) -> bool {
        self.0 & flag.0 == flag.0
    }

    pub fn set(&mut self, flag: BankFlags) {
        self.0 |= flag.0;
    }

    pub fn unset(&mut self, flag: BankFlags) {
        self.0 &= !flag.0;
    }

    /// True when `flags` only names emissions-related capabilities.
    pub fn is_valid_emissions_update(flags: BankFlags) -> bool {
        flags.0 & Self::EMISSIONS_ACTIVE.0 == flags.0
    }

    /// True when `flags` only names group-updatable capabilities.
    pub fn is_valid_group_update(flags: BankFlags) -> bool {
        flags.0 & Self::GROUP_ACTIVE.0 == flags.0
    }

    pub fn bits(self) -> u8 {
        self.0
    }
}

impl BitOr for BankFlags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitAnd for BankFlags {
    type Output = Self;
    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

/// The per-period rates produced by the interest-rate curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterestRates {
    pub lending_apr: Decimal,
    pub borrowing_apr: Decimal,
    pub group_fee_apr: Decimal,
    pub insurance_fee_apr: Decimal,
}

/// Piecewise-linear interest-rate curve plus protocol/insurance fee knobs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterestRateConfig {
    pub optimal_utilization_rate: Decimal,
    pub plateau_interest_rate: Decimal,
    pub max_interest_rate: Decimal,

    pub insurance_fee_fixed_apr: Decimal,
    pub insurance_ir_fee: Decimal,
    pub protocol_fixed_fee_apr: Decimal,
    pub protocol_ir_fee: Decimal,
}

impl InterestRateConfig {
    /// Evaluate all four APRs at the given utilization.
    pub fn calc_interest_rate(&self, utilization_ratio: Decimal) -> Result<InterestRates, BankError> {
        let rate_fee = self.protocol_ir_fee + self.insurance_ir_fee;
        let total_fixed_fee_apr = self.protocol_fixed_fee_apr + self.insurance_fee_fixed_apr;

        let base_rate = self.interest_rate_curve(utilization_ratio);

        let lending_apr = base_rate * utilization_ratio;
        let borrowing_apr = base_rate * (ONE + rate_fee) + total_fixed_fee_apr;

        let group_fee_apr = self.calc_fee_rate(base_rate, self.protocol_ir_fee, self.protocol_fixed_fee_apr);
        let insurance_fee_apr =
            self.calc_fee_rate(base_rate, self.insurance_ir_fee, self.insurance_fee_fixed_apr);

        if lending_apr < Decimal::ZERO
            || borrowing_apr < Decimal::ZERO
            || group_fee_apr < Decimal::ZERO
            || insurance_fee_apr < Decimal::ZERO
        {
            return Err(BankError::NegativeInterestRate);
        }

        Ok(InterestRates {
            lending_apr,
            borrowing_apr,
            group_fee_apr,
            insurance_fee_apr,
        })
    }

    /// Base rate at `utilization_ratio`; continuous at the optimal point.
    pub fn interest_rate_curve(&self, utilization_ratio: Decimal) -> Decimal {
        let optimal_ur = self.optimal_utilization_rate;
        let plateau_ir = self.plateau_interest_rate;
        let max_ir = self.max_interest_rate;

        if utilization_ratio <= optimal_ur {
            // ur / optimal_ur * plateau_ir
            utilization_ratio * plateau_ir / optimal_ur
        } else {
            // (ur - optimal_ur) / (1 - optimal_ur) * (max_ir - plateau_ir) + plateau_ir
            (utilization_ratio - optimal_ur) / (ONE - optimal_ur) * (max_ir - plateau_ir)
                + plateau_ir
        }
    }

    fn calc_fee_rate(&self, base_rate: Decimal, ir_fee: Decimal, fixed_fee_apr: Decimal) -> Decimal {
        base_rate * ir_fee + fixed_fee_apr
    }

    pub fn validate(&self) -> Result<(), BankError> {
        let optimal_ur = self.optimal_utilization_rate;
        let plateau_ir = self.plateau_interest_rate;
        let max_ir = self.max_interest_rate;

        if optimal_ur <= Decimal::ZERO || optimal_ur >= ONE {
            return Err(BankError::InvalidOptimalUtilizationRate);
        }
        if plateau_ir <= Decimal::ZERO {
            return Err(BankError::InvalidPlateauInterestRate);
        }
        if max_ir <= Decimal::ZERO {
            return Err(BankError::InvalidMaxInterestRate);
        }
        if plateau_ir >= max_ir {
            return Err(BankError::PlateauGreaterThanMax);
        }

        Ok(())
    }

    /// Apply the non-zero fields of `patch`.
    pub fn update(&mut self, patch: &InterestRateConfig) {
        if !patch.optimal_utilization_rate.is_zero() {
            self.optimal_utilization_rate = patch.optimal_utilization_rate;
        }
        if !patch.plateau_interest_rate.is_zero() {
            self.plateau_interest_rate = patch.plateau_interest_rate;
        }
        if !patch.max_interest_rate.is_zero() {
            self.max_interest_rate = patch.max_interest_rate;
        }
        if !patch.insurance_fee_fixed_apr.is_zero() {
            self.insurance_fee_fixed_apr = patch.insurance_fee_fixed_apr;
        }
        if !patch.insurance_ir_fee.is_zero() {
            self.insurance_ir_fee = patch.insurance_ir_fee;
        }
        if !patch.protocol_fixed_fee_apr.is_zero() {
            self.protocol_fixed_fee_apr = patch.protocol_fixed_fee_apr;
        }
        if !patch.protocol_ir_fee.is_zero() {
            self.protocol_ir_fee = patch.protocol_ir_fee;
        }
    }
}

/// Full per-bank configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankConfig {
    pub asset_weight_init: Decimal,
    pub asset_weight_maint: Decimal,

    pub liability_weight_init: Decimal,
    pub liability_weight_maint: Decimal,

    /// Limits are active unless set to `Decimal::MAX`.
    pub deposit_limit: Decimal,
    pub liability_limit: Decimal,

    pub interest_rate_config: InterestRateConfig,

    pub operational_state: BankOperationalState,

    pub risk_tier: RiskTier,
    pub total_asset_value_init_limit: Decimal,

    pub oracle_setup: OracleSetup,
    pub oracle_max_age: i64,
}

impl Default for BankConfig {
    fn default() -> Self {
        Self {
            asset_weight_init: Decimal::ZERO,
            asset_weight_maint: Decimal::ZERO,
            liability_weight_init: ONE,
            liability_weight_maint: ONE,
            deposit_limit: Decimal::MAX,
            liability_limit: Decimal::MAX,
            interest_rate_config: InterestRateConfig::default(),
            operational_state: BankOperationalState::Operational,
            risk_tier: RiskTier::Collateral,
            total_asset_value_init_limit: Decimal::MAX,
            oracle_setup: OracleSetup::MarketFeed,
            oracle_max_age: 60,
        }
    }
}

impl BankConfig {
    pub fn get_weights(&self, requirement_type: RequirementType) -> (Decimal, Decimal) {
        match requirement_type {
            RequirementType::Initial => (self.asset_weight_init, self.liability_weight_init),
            RequirementType::Maintenance => (self.asset_weight_maint, self.liability_weight_maint),
            RequirementType::Equity => (ONE, ONE),
        }
    }

    pub fn get_weight(
        &self,
        requirement_type: RequirementType,
        balance_side: BalanceSide,
    ) -> Decimal {
        match (requirement_type, balance_side) {
            (RequirementType::Initial, BalanceSide::Assets) => self.asset_weight_init,
            (RequirementType::Initial, BalanceSide::Liabilities) => self.liability_weight_init,
            (RequirementType::Maintenance, BalanceSide::Assets) => self.asset_weight_maint,
            (RequirementType::Maintenance, BalanceSide::Liabilities) => self.liability_weight_maint,
            (RequirementType::Equity, _) => ONE,
            _ => Decimal::ZERO,
        }
    }

    /// Validate weight ordering, the rate curve, and tier constraints.
    pub fn validate(&self) -> Result<(), BankError> {
        let asset_init_w = self.asset_weight_init;
        let asset_maint_w = self.asset_weight_maint;

        if !(asset_init_w >= Decimal::ZERO && asset_init_w <= ONE) {
            return Err(BankError::InvalidConfig);
        }
        if asset_maint_w < asset_init_w {
            return Err(BankError::InvalidConfig);
        }

        let liab_init_w = self.liability_weight_init;
        let liab_maint_w = self.liability_weight_maint;
        if liab_init_w < ONE {
            return Err(BankError::InvalidConfig);
        }
        if liab_maint_w > liab_init_w || liab_maint_w < ONE {
            return Err(BankError::InvalidConfig);
        }

        self.interest_rate_config.validate()?;

        if self.risk_tier == RiskTier::Isolated {
            if !asset_init_w.is_zero() || !asset_maint_w.is_zero() {
                return Err(BankError::InvalidConfig);
            }
        }

        Ok(())
    }

    /// Validate the oracle wiring; the max age is capped at 90 seconds.
    pub fn validate_oracle_setup(&self) -> Result<(), BankError> {
        match self.oracle_setup {
            OracleSetup::MarketFeed => {
                if self.oracle_max_age > 90 {
                    return Err(BankError::OracleMaxAgeTooLong);
                }
                Ok(())
            }
            OracleSetup::None => Err(BankError::UnknownOracleSetup),
        }
    }

    pub fn is_deposit_limit_active(&self) -> bool {
        self.deposit_limit != Decimal::MAX
    }

    pub fn is_borrow_limit_active(&self) -> bool {
        self.liability_limit != Decimal::MAX
    }

    pub fn usd_init_limit_active(&self) -> bool {
        self.total_asset_value_init_limit != Decimal::MAX
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn ir_config() -> InterestRateConfig {
        InterestRateConfig {
            optimal_utilization_rate: dec!(0.8),
            plateau_interest_rate: dec!(0.1),
            max_interest_rate: dec!(1.0),
            ..Default::default()
        }
    }

    fn collateral_config() -> BankConfig {
        BankConfig {
            asset_weight_init: dec!(0.8),
            asset_weight_maint: dec!(0.9),
            liability_weight_init: dec!(1.2),
            liability_weight_maint: dec!(1.1),
            interest_rate_config: ir_config(),
            ..Default::default()
        }
    }

    #[test]
    fn curve_is_continuous_at_the_optimal_point() {
        let config = ir_config();
        assert_eq!(config.interest_rate_curve(dec!(0.8)), dec!(0.1));
    }

    #[test]
    fn curve_above_optimal() {
        let config = ir_config();
        // (0.9 - 0.8) / 0.2 * 0.9 + 0.1
        assert_eq!(config.interest_rate_curve(dec!(0.9)), dec!(0.55));
    }

    #[test]
    fn curve_below_optimal_is_linear() {
        let config = ir_config();
        assert_eq!(config.interest_rate_curve(dec!(0.4)), dec!(0.05));
    }

    #[test]
    fn calc_interest_rate_includes_fees() {
        let mut config = ir_config();
        config.protocol_ir_fee = dec!(0.1);
        config.insurance_ir_fee = dec!(0.05);
        config.protocol_fixed_fee_apr = dec!(0.01);
        config.insurance_fee_fixed_apr = dec!(0.02);

        let rates = config.calc_interest_rate(dec!(0.8)).unwrap();
        assert_eq!(rates.lending_apr, dec!(0.08));
        // base 0.1 * 1.15 + 0.03
        assert_eq!(rates.borrowing_apr, dec!(0.145));
        assert_eq!(rates.group_fee_apr, dec!(0.02));
        assert_eq!(rates.insurance_fee_apr, dec!(0.025));
    }

    #[test]
    fn ir_validation_rejects_bad_curves() {
        let mut config = ir_config();
        config.optimal_utilization_rate = dec!(1);
        assert_eq!(
            config.validate(),
            Err(BankError::InvalidOptimalUtilizationRate)
        );

        let mut config = ir_config();
        config.plateau_interest_rate = Decimal::ZERO;
        assert_eq!(config.validate(), Err(BankError::InvalidPlateauInterestRate));

        let mut config = ir_config();
        config.plateau_interest_rate = dec!(1.0);
        assert_eq!(config.validate(), Err(BankError::PlateauGreaterThanMax));
    }

    #[test]
    fn config_validation_accepts_sane_collateral_bank() {
        assert!(collateral_config().validate().is_ok());
    }

    #[test]
    fn config_validation_enforces_weight_ordering() {
        let mut config = collateral_config();
        config.asset_weight_maint = dec!(0.5);
        assert_eq!(config.validate(), Err(BankError::InvalidConfig));

        let mut config = collateral_config();
        config.liability_weight_maint = dec!(1.5);
        assert_eq!(config.validate(), Err(BankError::InvalidConfig));

        let mut config = collateral_config();
        config.liability_weight_maint = dec!(0.9);
        assert_eq!(config.validate(), Err(BankError::InvalidConfig));
    }

    #[test]
    fn isolated_tier_requires_zero_asset_weights() {
        let mut config = collateral_config();
        config.risk_tier = RiskTier::Isolated;
        assert_eq!(config.validate(), Err(BankError::InvalidConfig));

        config.asset_weight_init = Decimal::ZERO;
        config.asset_weight_maint = Decimal::ZERO;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn oracle_max_age_is_capped() {
        let mut config = collateral_config();
        config.oracle_max_age = 91;
        assert_eq!(
            config.validate_oracle_setup(),
            Err(BankError::OracleMaxAgeTooLong)
        );

        config.oracle_max_age = 90;
        assert!(config.validate_oracle_setup().is_ok());

        config.oracle_setup = OracleSetup::None;
        assert_eq!(
            config.validate_oracle_setup(),
            Err(BankError::UnknownOracleSetup)
        );
    }

    #[test]
    fn limits_inactive_at_sentinel() {
        let config = BankConfig::default();
        assert!(!config.is_deposit_limit_active());
        assert!(!config.is_borrow_limit_active());
        assert!(!config.usd_init_limit_active());
    }

    #[test]
    fn flags_compose() {
        let mut flags = BankFlags::NONE;
        flags.set(BankFlags::LENDING_ACTIVE);
        flags.set(BankFlags::BORROW_ACTIVE);
        assert!(flags.contains(BankFlags::EMISSIONS_ACTIVE));

        flags.unset(BankFlags::BORROW_ACTIVE);
        assert!(!flags.contains(BankFlags::EMISSIONS_ACTIVE));
        assert!(flags.contains(BankFlags::LENDING_ACTIVE));

        assert!(BankFlags::is_valid_emissions_update(
            BankFlags::LENDING_ACTIVE | BankFlags::BORROW_ACTIVE
        ));
        assert!(!BankFlags::is_valid_emissions_update(
            BankFlags::PERMISSIONLESS_BAD_DEBT_SETTLEMENT
        ));
        assert!(BankFlags::is_valid_group_update(BankFlags::GROUP_ACTIVE));
    }

    #[test]
    fn interest_rate_patch_applies_non_zero_fields() {
        let mut config = ir_config();
        let patch = InterestRateConfig {
            plateau_interest_rate: dec!(0.2),
            ..Default::default()
        };
        config.update(&patch);
        assert_eq!(config.plateau_interest_rate, dec!(0.2));
        assert_eq!(config.optimal_utilization_rate, dec!(0.8));
        assert_eq!(config.max_interest_rate, dec!(1.0));
    }
}
