//! Poolfi Core - shared foundations
//!
//! This crate contains everything the domain crates agree on:
//! - decimal constants and thresholds
//! - the closed enumerations used across bank, oracle and risk code
//! - value/amount/interest/emissions math on `rust_decimal::Decimal`
//! - deterministic UUID derivation for entity identity
//! - the `Clock` capability injected everywhere time is read

pub mod clock;
pub mod consts;
pub mod error;
pub mod id;
pub mod math;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::MathError;
pub use types::{BalanceSide, OraclePriceType, PriceBias, RequirementType};
