//! Accounting engine errors

use poolfi_core::MathError;
use thiserror::Error;

use crate::store::StoreError;

/// Domain errors of the bank, balance and wrapper layer.
///
/// Every mutation aborts on the first error; no partial state is handed to
/// the persistence layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BankError {
    #[error("bank not found")]
    BankAccountNotFound,

    #[error("lending account balance not found")]
    LendingAccountBalanceNotFound,

    #[error("bank is paused")]
    BankPaused,

    #[error("bank is reduce-only")]
    BankReduceOnly,

    #[error("bank deposit capacity exceeded")]
    BankAssetCapacityExceeded,

    #[error("bank borrow capacity exceeded")]
    BankLiabilityCapacityExceeded,

    #[error("bank liquidity vault in deficit")]
    BankLiquidityDeficit,

    #[error("total liabilities exceed total assets")]
    IllegalUtilizationRatio,

    #[error("no asset found")]
    NoAssetFound,

    #[error("no liability found")]
    NoLiabilityFound,

    #[error("balance carries both assets and liabilities")]
    IllegalBalanceState,

    #[error("cannot close a balance with outstanding emissions")]
    CannotCloseOutstandingEmissions,

    #[error("operation is repay-only")]
    OperationRepayOnly,

    #[error("operation is deposit-only")]
    OperationDepositOnly,

    #[error("operation is withdraw-only")]
    OperationWithdrawOnly,

    #[error("operation is borrow-only")]
    OperationBorrowOnly,

    #[error("negative interest rate")]
    NegativeInterestRate,

    #[error("invalid bank config")]
    InvalidConfig,

    #[error("optimal utilization rate must lie in (0, 1)")]
    InvalidOptimalUtilizationRate,

    #[error("plateau interest rate must be positive")]
    InvalidPlateauInterestRate,

    #[error("max interest rate must be positive")]
    InvalidMaxInterestRate,

    #[error("plateau interest rate must be below max interest rate")]
    PlateauGreaterThanMax,

    #[error("oracle max age too long")]
    OracleMaxAgeTooLong,

    #[error("unknown oracle setup")]
    UnknownOracleSetup,

    #[error(transparent)]
    Math(#[from] MathError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
