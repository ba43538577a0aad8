//! Decimal math helpers
//!
//! Pure functions over `Decimal`; all stateful accrual lives on the bank.

use rust_decimal::{Decimal, MathematicalOps};

use crate::consts::{HOURS_PER_YEAR, MAX_CONF_INTERVAL, ONE, SECONDS_PER_YEAR};
use crate::error::MathError;

/// USD value of `amount` at `price`, optionally weighted.
pub fn calc_value(amount: Decimal, price: Decimal, weight: Option<Decimal>) -> Decimal {
    if amount.is_zero() {
        return Decimal::ZERO;
    }
    let weighted_amount = match weight {
        Some(w) => amount * w,
        None => amount,
    };
    weighted_amount * price
}

/// Quantity purchasable for `value` at `price`.
pub fn calc_amount(value: Decimal, price: Decimal) -> Result<Decimal, MathError> {
    if price.is_zero() {
        return Err(MathError::PriceIsZero);
    }
    Ok(value / price)
}

/// Deposit fee on the way in. Currently the identity.
pub fn pre_fee_deposit_amount(amount: Decimal) -> Decimal {
    amount
}

/// Deposit fee on the way out. Currently the identity.
pub fn post_fee_deposit_amount(amount: Decimal) -> Decimal {
    amount
}

/// Half-width of the confidence band around `price`.
pub fn confidence_interval(price: Decimal) -> Decimal {
    price * MAX_CONF_INTERVAL
}

/// Convert an APR to an APY compounded hourly, rounded to 8 decimals.
pub fn apr_to_apy(apr: Decimal) -> Decimal {
    let hours_per_year = Decimal::from(HOURS_PER_YEAR);
    ((ONE + apr / hours_per_year).powu(HOURS_PER_YEAR) - ONE).round_dp(8)
}

/// Share value after `time_delta` seconds of interest at `apr`.
pub fn accrued_interest_per_period(apr: Decimal, time_delta: u64, value: Decimal) -> Decimal {
    let ir_per_period = apr * Decimal::from(time_delta) / Decimal::from(SECONDS_PER_YEAR);
    value * (ONE + ir_per_period)
}

/// Fee payment generated by `value` over `time_delta` seconds at `apr`.
pub fn interest_payment_for_period(apr: Decimal, time_delta: u64, value: Decimal) -> Decimal {
    value * apr * Decimal::from(time_delta) / Decimal::from(SECONDS_PER_YEAR)
}

/// Emissions earned by `balance_amount` over `period` seconds.
///
/// A non-positive period earns nothing; a non-positive rate or amount is a
/// caller error.
pub fn calc_emissions(
    period: i64,
    balance_amount: Decimal,
    emissions_rate: Decimal,
) -> Result<Decimal, MathError> {
    if period <= 0 {
        return Ok(Decimal::ZERO);
    }
    if emissions_rate <= Decimal::ZERO {
        return Err(MathError::NonPositiveEmissionsRate);
    }
    if balance_amount <= Decimal::ZERO {
        return Err(MathError::NonPositiveBalanceAmount);
    }

    Ok(balance_amount * emissions_rate * Decimal::from(period) / Decimal::from(SECONDS_PER_YEAR))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn calc_value_weighted() {
        assert_eq!(
            calc_value(dec!(100), dec!(2), Some(dec!(0.5))),
            dec!(100)
        );
    }

    #[test]
    fn calc_value_zero_amount() {
        assert_eq!(calc_value(Decimal::ZERO, dec!(2), Some(dec!(0.5))), Decimal::ZERO);
    }

    #[test]
    fn calc_value_unweighted() {
        assert_eq!(calc_value(dec!(100), dec!(2), None), dec!(200));
    }

    #[test]
    fn calc_amount_normal() {
        assert_eq!(calc_amount(dec!(200), dec!(2)).unwrap(), dec!(100));
    }

    #[test]
    fn calc_amount_zero_price() {
        assert_eq!(
            calc_amount(dec!(200), Decimal::ZERO),
            Err(MathError::PriceIsZero)
        );
    }

    #[test]
    fn deposit_fees_are_identity() {
        assert_eq!(pre_fee_deposit_amount(dec!(100)), dec!(100));
        assert_eq!(post_fee_deposit_amount(dec!(100)), dec!(100));
    }

    #[test]
    fn apr_to_apy_zero() {
        assert_eq!(apr_to_apy(Decimal::ZERO), Decimal::ZERO);
    }

    #[test]
    fn apr_to_apy_monotone() {
        let a = apr_to_apy(dec!(0.01));
        let b = apr_to_apy(dec!(0.05));
        let c = apr_to_apy(dec!(0.10));
        assert!(a < b && b < c);
    }

    #[test]
    fn apr_to_apy_exceeds_apr_for_positive_rates() {
        assert!(apr_to_apy(dec!(0.10)) > dec!(0.10));
    }

    #[test]
    fn accrual_per_period_one_year_at_ten_percent() {
        let value = accrued_interest_per_period(dec!(0.1), SECONDS_PER_YEAR as u64, dec!(1));
        assert_eq!(value, dec!(1.1));
    }

    #[test]
    fn interest_payment_for_half_year() {
        let payment =
            interest_payment_for_period(dec!(0.1), (SECONDS_PER_YEAR / 2) as u64, dec!(1000));
        assert_eq!(payment, dec!(50));
    }

    #[test]
    fn emissions_basic() {
        // 1000 at rate 0.5 over a full year -> 500
        let e = calc_emissions(SECONDS_PER_YEAR, dec!(1000), dec!(0.5)).unwrap();
        assert_eq!(e, dec!(500));
    }

    #[test]
    fn emissions_zero_period() {
        assert_eq!(
            calc_emissions(0, dec!(1000), dec!(0.5)).unwrap(),
            Decimal::ZERO
        );
    }

    #[test]
    fn emissions_rejects_non_positive_inputs() {
        assert_eq!(
            calc_emissions(60, dec!(1000), Decimal::ZERO),
            Err(MathError::NonPositiveEmissionsRate)
        );
        assert_eq!(
            calc_emissions(60, Decimal::ZERO, dec!(0.5)),
            Err(MathError::NonPositiveBalanceAmount)
        );
    }
}
