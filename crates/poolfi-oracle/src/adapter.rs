//! Adapter contracts

use async_trait::async_trait;
use poolfi_bank::Bank;
use poolfi_core::{OraclePriceType, PriceBias};
use rust_decimal::Decimal;
use std::sync::Arc;

use crate::error::OracleError;

/// Read side of one asset's price feed.
///
/// Staleness enforcement is the adapter's responsibility; the core only
/// constrains the configured max age.
pub trait PriceAdapter: Send + Sync {
    /// Price of the given variant, bias-adjusted within the confidence band.
    fn price_of_type(
        &self,
        price_type: OraclePriceType,
        bias: PriceBias,
    ) -> Result<Decimal, OracleError>;

    /// (price, low, high) of the time-weighted variant in one read.
    fn all_price_types(&self) -> Result<(Decimal, Decimal, Decimal), OracleError>;
}

/// Resolves the adapter serving a bank. Resolution may suspend (registry
/// lookups, feed subscriptions); the returned adapter reads synchronously.
#[async_trait]
pub trait PriceAdapterMgr: Send + Sync {
    async fn get_price_adapter(&self, bank: &Bank) -> Result<Arc<dyn PriceAdapter>, OracleError>;
}
