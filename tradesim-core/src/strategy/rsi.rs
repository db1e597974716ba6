//! RSI threshold strategy.
//!
//! Enters long when RSI falls below the oversold level, exits when it rises
//! above the overbought level. Emits `rsi` as an auxiliary series.

use crate::domain::{PriceSeries, SignalSeries};
use crate::indicators::rsi;

use super::{long_only_actions, Strategy, StrategyError};

#[derive(Debug, Clone, PartialEq)]
pub struct RsiStrategy {
    pub period: usize,
    pub overbought: f64,
    pub oversold: f64,
}

impl RsiStrategy {
    pub fn new(period: usize, overbought: f64, oversold: f64) -> Result<Self, StrategyError> {
        if period == 0 {
            return Err(StrategyError::invalid("rsi", "period must be >= 1"));
        }
        if !(0.0..=100.0).contains(&oversold)
            || !(0.0..=100.0).contains(&overbought)
            || oversold >= overbought
        {
            return Err(StrategyError::invalid(
                "rsi",
                format!("need 0 <= oversold ({oversold}) < overbought ({overbought}) <= 100"),
            ));
        }
        Ok(Self {
            period,
            overbought,
            oversold,
        })
    }
}

impl Default for RsiStrategy {
    fn default() -> Self {
        Self {
            period: 14,
            overbought: 70.0,
            oversold: 30.0,
        }
    }
}

impl Strategy for RsiStrategy {
    fn name(&self) -> &str {
        "rsi"
    }

    fn warmup_bars(&self) -> usize {
        self.period
    }

    fn generate_signals(&self, series: &PriceSeries) -> SignalSeries {
        let closes = series.closes();
        let values = rsi(&closes, self.period);

        let actions = long_only_actions(closes.len(), |i| {
            values[i].map(|r| (r < self.oversold, r > self.overbought))
        });

        SignalSeries::from_actions(series, &actions).with_auxiliary("rsi", values)
    }
}
