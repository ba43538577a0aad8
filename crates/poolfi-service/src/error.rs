//! Service-level errors

use poolfi_bank::{BankError, StoreError};
use poolfi_oracle::OracleError;
use poolfi_risk::RiskError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// The bank does not permit permissionless bad-debt settlement.
    #[error("bad debt settlement not permitted")]
    BadDebtSettlementNotPermitted,

    /// Liquidation parameters that no gate covers (zero or oversized seize).
    #[error("invalid liquidation amount")]
    InvalidLiquidationAmount,

    #[error(transparent)]
    Bank(#[from] BankError),

    #[error(transparent)]
    Risk(#[from] RiskError),

    #[error(transparent)]
    Oracle(#[from] OracleError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
