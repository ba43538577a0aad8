//! Poolfi Risk - the risk engine
//!
//! Loads a consistent snapshot of an account's positions together with
//! their price feeds, computes collateral-weighted assets and liabilities
//! under a requirement type, and enforces the health, tier, liquidation and
//! bankruptcy gates that every risky mutation must pass.

pub mod apy;
pub mod engine;
pub mod error;
pub mod liquidation;
pub mod store;

pub use apy::compute_net_apy;
pub use engine::{load_bank_accounts_with_price_feeds, BankAccountWithPriceFeed, RiskEngine};
pub use error::RiskError;
pub use liquidation::{
    compute_health_components, compute_liquidation_price_for_bank, LiquidateResult,
    LiquidationBalances,
};
pub use store::BankAccountWrapperStore;
