//! Risk engine errors

use poolfi_bank::{BankError, StoreError};
use poolfi_oracle::OracleError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RiskError {
    /// Weighted liabilities exceed weighted assets.
    #[error("risk engine rejected the account state")]
    RiskEngineInitRejected,

    #[error("account is in a flashloan")]
    AccountInFlashloan,

    #[error("account is not bankrupt")]
    AccountNotBankrupt,

    #[error("account is not unhealthy")]
    AccountNotUnhealthy,

    #[error("illegal liquidation")]
    IllegalLiquidation,

    #[error("isolated-tier account carries an illegal position mix")]
    IsolatedAccountIllegalState,

    #[error(transparent)]
    Bank(#[from] BankError),

    #[error(transparent)]
    Oracle(#[from] OracleError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
