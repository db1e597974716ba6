use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Portfolio valuation after one bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: NaiveDateTime,
    pub cash: f64,
    pub positions_market_value: f64,
    pub total_equity: f64,
}

/// Total-equity column of an equity curve.
pub fn equity_values(curve: &[EquityPoint]) -> Vec<f64> {
    curve.iter().map(|p| p.total_equity).collect()
}
