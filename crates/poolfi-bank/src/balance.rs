//! Balance - one account's position in one bank
//!
//! A balance is either an asset side, a liability side, or empty; both sides
//! carrying value at once is an illegal state.

use poolfi_core::consts::{EMPTY_BALANCE_THRESHOLD, ZERO_AMOUNT_THRESHOLD};
use poolfi_core::{BalanceSide, Clock, PriceBias, RequirementType};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::bank::Bank;
use crate::error::BankError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Balance {
    pub account_id: Uuid,
    pub bank_id: Uuid,

    pub active: bool,
    pub asset_shares: Decimal,
    pub liability_shares: Decimal,
    pub emissions_outstanding: Decimal,
    pub last_update: i64,
}

impl Balance {
    pub fn new(clock: &dyn Clock, account_id: Uuid, bank_id: Uuid) -> Self {
        Self {
            account_id,
            bank_id,
            active: true,
            asset_shares: Decimal::ZERO,
            liability_shares: Decimal::ZERO,
            emissions_outstanding: Decimal::ZERO,
            last_update: clock.now_unix(),
        }
    }

    pub fn is_empty(&self, side: BalanceSide) -> bool {
        match side {
            BalanceSide::Assets => self.asset_shares < EMPTY_BALANCE_THRESHOLD,
            BalanceSide::Liabilities => self.liability_shares < EMPTY_BALANCE_THRESHOLD,
            BalanceSide::Empty => true,
        }
    }

    pub fn change_asset_shares(&mut self, delta: Decimal) -> Result<(), BankError> {
        let asset_shares = self.asset_shares + delta;
        if asset_shares < Decimal::ZERO {
            return Err(BankError::BankLiabilityCapacityExceeded);
        }
        self.asset_shares = asset_shares;
        Ok(())
    }

    pub fn change_liability_shares(&mut self, delta: Decimal) -> Result<(), BankError> {
        let liability_shares = self.liability_shares + delta;
        if liability_shares < Decimal::ZERO {
            return Err(BankError::BankLiabilityCapacityExceeded);
        }
        self.liability_shares = liability_shares;
        Ok(())
    }

    /// Close the position. Refused while emissions remain claimable.
    pub fn close(&mut self, clock: &dyn Clock) -> Result<(), BankError> {
        if self.emissions_outstanding >= EMPTY_BALANCE_THRESHOLD {
            return Err(BankError::CannotCloseOutstandingEmissions);
        }
        self.empty_deactivated(clock);
        Ok(())
    }

    /// Which side this balance is on. Fails if both sides carry value.
    pub fn get_side(&self) -> Result<BalanceSide, BankError> {
        if self.asset_shares > ZERO_AMOUNT_THRESHOLD
            && self.liability_shares > ZERO_AMOUNT_THRESHOLD
        {
            return Err(BankError::IllegalBalanceState);
        }

        if self.asset_shares >= EMPTY_BALANCE_THRESHOLD {
            return Ok(BalanceSide::Assets);
        }
        if self.liability_shares >= EMPTY_BALANCE_THRESHOLD {
            return Ok(BalanceSide::Liabilities);
        }

        Ok(BalanceSide::Empty)
    }

    pub fn empty_deactivated(&mut self, clock: &dyn Clock) {
        self.active = false;
        self.asset_shares = Decimal::ZERO;
        self.liability_shares = Decimal::ZERO;
        self.emissions_outstanding = Decimal::ZERO;
        self.last_update = clock.now_unix();
    }

    /// (asset value, liability value) at the unbiased point price.
    pub fn compute_usd_value(
        &self,
        bank: &Bank,
        oracle_price: Decimal,
        requirement_type: RequirementType,
    ) -> (Decimal, Decimal) {
        let assets_value = bank.compute_asset_usd_value(
            oracle_price,
            self.asset_shares,
            requirement_type,
            PriceBias::Original,
        );
        let liabilities_value = bank.compute_liability_usd_value(
            oracle_price,
            self.liability_shares,
            requirement_type,
            PriceBias::Original,
        );
        (assets_value, liabilities_value)
    }

    /// (asset value, liability value) with the conservative bias on each
    /// side: assets priced low, liabilities priced high.
    pub fn get_usd_value_with_price_bias(
        &self,
        bank: &Bank,
        oracle_price: Decimal,
        requirement_type: RequirementType,
    ) -> (Decimal, Decimal) {
        let assets_value = bank.compute_asset_usd_value(
            oracle_price,
            self.asset_shares,
            requirement_type,
            PriceBias::Low,
        );
        let liabilities_value = bank.compute_liability_usd_value(
            oracle_price,
            self.liability_shares,
            requirement_type,
            PriceBias::High,
        );
        (assets_value, liabilities_value)
    }

    /// (asset quantity, liability quantity) in underlying units.
    pub fn compute_quantity(&self, bank: &Bank) -> (Decimal, Decimal) {
        (
            bank.get_asset_amount(self.asset_shares),
            bank.get_liability_amount(self.liability_shares),
        )
    }
}

/// How an incoming amount may move a balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceIncreaseType {
    Any,
    RepayOnly,
    DepositOnly,
    BypassDepositLimit,
}

impl fmt::Display for BalanceIncreaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BalanceIncreaseType::Any => write!(f, "Any"),
            BalanceIncreaseType::RepayOnly => write!(f, "RepayOnly"),
            BalanceIncreaseType::DepositOnly => write!(f, "DepositOnly"),
            BalanceIncreaseType::BypassDepositLimit => write!(f, "BypassDepositLimit"),
        }
    }
}

/// How an outgoing amount may move a balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceDecreaseType {
    Any,
    WithdrawOnly,
    BorrowOnly,
    BypassBorrowLimit,
}

impl fmt::Display for BalanceDecreaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BalanceDecreaseType::Any => write!(f, "Any"),
            BalanceDecreaseType::WithdrawOnly => write!(f, "WithdrawOnly"),
            BalanceDecreaseType::BorrowOnly => write!(f, "BorrowOnly"),
            BalanceDecreaseType::BypassBorrowLimit => write!(f, "BypassBorrowLimit"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use poolfi_core::ManualClock;
    use rust_decimal_macros::dec;

    fn test_balance() -> Balance {
        let clock = ManualClock::new(1_700_000_000);
        Balance::new(&clock, Uuid::nil(), Uuid::nil())
    }

    #[test]
    fn new_balance_is_active_and_empty() {
        let balance = test_balance();
        assert!(balance.active);
        assert_eq!(balance.get_side().unwrap(), BalanceSide::Empty);
    }

    #[test]
    fn side_tracks_the_populated_leg() {
        let mut balance = test_balance();
        balance.change_asset_shares(dec!(10)).unwrap();
        assert_eq!(balance.get_side().unwrap(), BalanceSide::Assets);

        let mut balance = test_balance();
        balance.change_liability_shares(dec!(10)).unwrap();
        assert_eq!(balance.get_side().unwrap(), BalanceSide::Liabilities);
    }

    #[test]
    fn both_sides_populated_is_illegal() {
        let mut balance = test_balance();
        balance.change_asset_shares(dec!(10)).unwrap();
        balance.change_liability_shares(dec!(10)).unwrap();
        assert_eq!(balance.get_side(), Err(BankError::IllegalBalanceState));
    }

    #[test]
    fn dust_below_threshold_reads_as_empty() {
        let mut balance = test_balance();
        balance.change_asset_shares(dec!(0.000000001)).unwrap();
        assert_eq!(balance.get_side().unwrap(), BalanceSide::Empty);
        assert!(balance.is_empty(BalanceSide::Assets));
    }

    #[test]
    fn shares_cannot_go_negative() {
        let mut balance = test_balance();
        balance.change_asset_shares(dec!(10)).unwrap();
        assert_eq!(
            balance.change_asset_shares(dec!(-11)),
            Err(BankError::BankLiabilityCapacityExceeded)
        );
        assert_eq!(balance.asset_shares, dec!(10));

        assert_eq!(
            balance.change_liability_shares(dec!(-1)),
            Err(BankError::BankLiabilityCapacityExceeded)
        );
    }

    #[test]
    fn persisted_layout_round_trips_as_camel_case() {
        let mut balance = test_balance();
        balance.change_asset_shares(dec!(12.5)).unwrap();
        balance.emissions_outstanding = dec!(0.25);

        let json = serde_json::to_value(&balance).unwrap();
        assert!(json.get("assetShares").is_some());
        assert!(json.get("liabilityShares").is_some());
        assert!(json.get("emissionsOutstanding").is_some());
        assert!(json.get("lastUpdate").is_some());

        let decoded: Balance = serde_json::from_value(json).unwrap();
        assert_eq!(decoded, balance);
    }

    #[test]
    fn close_refuses_outstanding_emissions() {
        let clock = ManualClock::new(1_700_000_000);
        let mut balance = test_balance();
        balance.emissions_outstanding = dec!(0.5);
        assert_eq!(
            balance.close(&clock),
            Err(BankError::CannotCloseOutstandingEmissions)
        );

        balance.emissions_outstanding = dec!(0.000000001);
        clock.advance(60);
        balance.change_asset_shares(dec!(10)).unwrap();
        balance.close(&clock).unwrap();
        assert!(!balance.active);
        assert_eq!(balance.asset_shares, Decimal::ZERO);
        assert_eq!(balance.liability_shares, Decimal::ZERO);
        assert_eq!(balance.emissions_outstanding, Decimal::ZERO);
        assert_eq!(balance.last_update, 1_700_000_060);
    }
}
