//! Closed enumerations shared across the domain crates

use serde::{Deserialize, Serialize};
use std::fmt;

/// Weighting regime for health math.
///
/// Initial is the strict regime used when opening positions, Maintenance
/// gates solvency and liquidation, Equity is the raw unweighted view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequirementType {
    Initial,
    Maintenance,
    Equity,
}

impl RequirementType {
    /// Which oracle price variant this requirement reads.
    pub fn oracle_price_type(self) -> OraclePriceType {
        match self {
            RequirementType::Initial | RequirementType::Equity => OraclePriceType::TimeWeighted,
            RequirementType::Maintenance => OraclePriceType::RealTime,
        }
    }
}

/// Which side of a position is populated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BalanceSide {
    Assets,
    Liabilities,
    Empty,
}

impl fmt::Display for BalanceSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BalanceSide::Assets => write!(f, "Assets"),
            BalanceSide::Liabilities => write!(f, "Liabilities"),
            BalanceSide::Empty => write!(f, "Empty"),
        }
    }
}

/// Oracle price variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OraclePriceType {
    TimeWeighted,
    RealTime,
}

/// Selection within the confidence band around an oracle price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PriceBias {
    Low,
    High,
    Original,
}
