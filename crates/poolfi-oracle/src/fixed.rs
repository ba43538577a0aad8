//! Fixed-price adapters
//!
//! Configurable in-memory feeds for tests and local runs. Prices are held
//! per backing asset and can be updated programmatically.

use async_trait::async_trait;
use poolfi_bank::{Bank, OracleSetup};
use poolfi_core::math::confidence_interval;
use poolfi_core::{OraclePriceType, PriceBias};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::adapter::{PriceAdapter, PriceAdapterMgr};
use crate::error::OracleError;

/// A feed with a fixed time-weighted and real-time price.
#[derive(Debug, Clone)]
pub struct FixedPriceAdapter {
    time_weighted: Decimal,
    real_time: Decimal,
}

impl FixedPriceAdapter {
    /// Same price for both variants.
    pub fn new(price: Decimal) -> Self {
        Self {
            time_weighted: price,
            real_time: price,
        }
    }

    pub fn with_prices(time_weighted: Decimal, real_time: Decimal) -> Self {
        Self {
            time_weighted,
            real_time,
        }
    }
}

impl PriceAdapter for FixedPriceAdapter {
    fn price_of_type(
        &self,
        price_type: OraclePriceType,
        bias: PriceBias,
    ) -> Result<Decimal, OracleError> {
        let price = match price_type {
            OraclePriceType::TimeWeighted => self.time_weighted,
            OraclePriceType::RealTime => self.real_time,
        };
        let interval = confidence_interval(price);
        Ok(match bias {
            PriceBias::Low => price - interval,
            PriceBias::High => price + interval,
            PriceBias::Original => price,
        })
    }

    fn all_price_types(&self) -> Result<(Decimal, Decimal, Decimal), OracleError> {
        let price = self.price_of_type(OraclePriceType::TimeWeighted, PriceBias::Original)?;
        let low = self.price_of_type(OraclePriceType::TimeWeighted, PriceBias::Low)?;
        let high = self.price_of_type(OraclePriceType::TimeWeighted, PriceBias::High)?;
        Ok((price, low, high))
    }
}

/// Adapter manager keyed by backing asset id.
#[derive(Default)]
pub struct FixedPriceAdapterMgr {
    adapters: RwLock<HashMap<String, Arc<FixedPriceAdapter>>>,
}

impl FixedPriceAdapterMgr {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set one price for both variants of an asset.
    pub fn set_price(&self, asset_id: impl Into<String>, price: Decimal) {
        self.set_prices(asset_id, price, price);
    }

    pub fn set_prices(
        &self,
        asset_id: impl Into<String>,
        time_weighted: Decimal,
        real_time: Decimal,
    ) {
        let adapter = Arc::new(FixedPriceAdapter::with_prices(time_weighted, real_time));
        self.adapters
            .write()
            .expect("price adapter lock poisoned")
            .insert(asset_id.into(), adapter);
    }

    pub fn remove_price(&self, asset_id: &str) {
        self.adapters
            .write()
            .expect("price adapter lock poisoned")
            .remove(asset_id);
    }
}

#[async_trait]
impl PriceAdapterMgr for FixedPriceAdapterMgr {
    async fn get_price_adapter(&self, bank: &Bank) -> Result<Arc<dyn PriceAdapter>, OracleError> {
        if bank.config.oracle_setup != OracleSetup::MarketFeed {
            return Err(OracleError::UnsupportedSetup);
        }

        let adapters = self.adapters.read().expect("price adapter lock poisoned");
        adapters
            .get(&bank.asset_id)
            .cloned()
            .map(|adapter| adapter as Arc<dyn PriceAdapter>)
            .ok_or_else(|| OracleError::AdapterNotFound {
                asset_id: bank.asset_id.clone(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use poolfi_bank::BankConfig;
    use poolfi_core::ManualClock;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    #[test]
    fn bias_spans_the_confidence_band() {
        let adapter = FixedPriceAdapter::new(dec!(100));
        assert_eq!(
            adapter
                .price_of_type(OraclePriceType::TimeWeighted, PriceBias::Original)
                .unwrap(),
            dec!(100)
        );
        assert_eq!(
            adapter
                .price_of_type(OraclePriceType::TimeWeighted, PriceBias::Low)
                .unwrap(),
            dec!(95)
        );
        assert_eq!(
            adapter
                .price_of_type(OraclePriceType::TimeWeighted, PriceBias::High)
                .unwrap(),
            dec!(105)
        );
    }

    #[test]
    fn variants_are_independent() {
        let adapter = FixedPriceAdapter::with_prices(dec!(100), dec!(102));
        assert_eq!(
            adapter
                .price_of_type(OraclePriceType::RealTime, PriceBias::Original)
                .unwrap(),
            dec!(102)
        );
        assert_eq!(
            adapter
                .price_of_type(OraclePriceType::TimeWeighted, PriceBias::Original)
                .unwrap(),
            dec!(100)
        );
    }

    #[test]
    fn all_price_types_returns_the_band() {
        let adapter = FixedPriceAdapter::new(dec!(10));
        let (price, low, high) = adapter.all_price_types().unwrap();
        assert_eq!(price, dec!(10));
        assert_eq!(low, dec!(9.5));
        assert_eq!(high, dec!(10.5));
    }

    #[tokio::test]
    async fn manager_resolves_by_backing_asset() {
        let clock = ManualClock::new(1_700_000_000);
        let bank = Bank::new(
            &clock,
            Uuid::nil(),
            "BTC",
            "asset-btc",
            BankConfig::default(),
        );

        let mgr = FixedPriceAdapterMgr::new();
        assert!(matches!(
            mgr.get_price_adapter(&bank).await,
            Err(OracleError::AdapterNotFound { .. })
        ));

        mgr.set_price("asset-btc", dec!(50000));
        let adapter = mgr.get_price_adapter(&bank).await.unwrap();
        assert_eq!(
            adapter
                .price_of_type(OraclePriceType::RealTime, PriceBias::Original)
                .unwrap(),
            dec!(50000)
        );
    }

    #[tokio::test]
    async fn manager_rejects_unsupported_setups() {
        let clock = ManualClock::new(1_700_000_000);
        let mut bank = Bank::new(
            &clock,
            Uuid::nil(),
            "BTC",
            "asset-btc",
            BankConfig::default(),
        );
        bank.config.oracle_setup = OracleSetup::None;

        let mgr = FixedPriceAdapterMgr::new();
        mgr.set_price("asset-btc", dec!(50000));
        assert!(matches!(
            mgr.get_price_adapter(&bank).await,
            Err(OracleError::UnsupportedSetup)
        ));
    }
}
