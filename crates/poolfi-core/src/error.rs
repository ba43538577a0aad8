//! Math errors

use thiserror::Error;

/// Failures of the pure decimal math helpers.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MathError {
    #[error("price is zero")]
    PriceIsZero,

    #[error("emissions rate must be positive")]
    NonPositiveEmissionsRate,

    #[error("balance amount must be positive")]
    NonPositiveBalanceAmount,
}
