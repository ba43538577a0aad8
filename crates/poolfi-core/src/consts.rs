//! Named constants and thresholds
//!
//! All thresholds are expressed as `Decimal` so comparisons never leave
//! exact arithmetic.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

pub const ONE: Decimal = Decimal::ONE;

pub const SECONDS_PER_YEAR: i64 = 31_536_000;

/// 365.25 * 24, the compounding frequency used for APR -> APY conversion.
pub const HOURS_PER_YEAR: u64 = 8766;

/// Balances stamped before this point predate the emissions program and
/// start accruing from "now" instead.
pub const MIN_EMISSIONS_START_TIME: i64 = 1_681_989_983;

pub const ZERO_AMOUNT_THRESHOLD: Decimal = Decimal::ZERO;

/// Amounts below this are treated as dust and floored to zero.
pub const EMPTY_BALANCE_THRESHOLD: Decimal = dec!(0.00000001);

pub const BANKRUPT_THRESHOLD: Decimal = dec!(0.00000001);

/// Half-width of the confidence band around an oracle point price.
pub const MAX_CONF_INTERVAL: Decimal = dec!(0.05);

pub const LIQUIDATION_LIQUIDATOR_FEE: Decimal = dec!(0.0025);
pub const LIQUIDATION_INSURANCE_FEE: Decimal = dec!(0.0025);
