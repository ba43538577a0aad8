//! Oracle error types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OracleError {
    /// No adapter is registered for the bank's backing asset.
    #[error("no price adapter for asset: {asset_id}")]
    AdapterNotFound { asset_id: String },

    /// The feed is older than the bank's configured max age.
    #[error("stale price for asset {asset_id}: age {age_secs}s exceeds {max_age_secs}s")]
    StalePrice {
        asset_id: String,
        age_secs: i64,
        max_age_secs: i64,
    },

    /// The bank's oracle setup is not supported by this manager.
    #[error("unsupported oracle setup")]
    UnsupportedSetup,
}
