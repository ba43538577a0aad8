//! Poolfi Oracle - price adapter contracts
//!
//! The risk engine reads prices through `PriceAdapter`: a point price per
//! variant (time-weighted or real-time) plus the low/high edges of its
//! confidence band. `PriceAdapterMgr` resolves the adapter serving a given
//! bank; resolution is the suspension point, reads are synchronous.

mod adapter;
mod error;
mod fixed;

pub use adapter::{PriceAdapter, PriceAdapterMgr};
pub use error::OracleError;
pub use fixed::{FixedPriceAdapter, FixedPriceAdapterMgr};
