//! Moving average crossover.
//!
//! Enters long while the short SMA is above the long SMA, exits once it drops
//! below. Emits `short_ma` and `long_ma` as auxiliary series.

use crate::domain::{PriceSeries, SignalSeries};
use crate::indicators::sma;

use super::{long_only_actions, Strategy, StrategyError};

#[derive(Debug, Clone, PartialEq)]
pub struct MaCrossover {
    pub short_window: usize,
    pub long_window: usize,
}

impl MaCrossover {
    pub fn new(short_window: usize, long_window: usize) -> Result<Self, StrategyError> {
        if short_window == 0 {
            return Err(StrategyError::invalid("ma_crossover", "short_window must be >= 1"));
        }
        if long_window <= short_window {
            return Err(StrategyError::invalid(
                "ma_crossover",
                format!("long_window ({long_window}) must be > short_window ({short_window})"),
            ));
        }
        Ok(Self {
            short_window,
            long_window,
        })
    }
}

impl Default for MaCrossover {
    fn default() -> Self {
        Self {
            short_window: 50,
            long_window: 200,
        }
    }
}

impl Strategy for MaCrossover {
    fn name(&self) -> &str {
        "ma_crossover"
    }

    fn warmup_bars(&self) -> usize {
        self.long_window - 1
    }

    fn generate_signals(&self, series: &PriceSeries) -> SignalSeries {
        let closes = series.closes();
        let short_ma = sma(&closes, self.short_window);
        let long_ma = sma(&closes, self.long_window);

        let actions = long_only_actions(closes.len(), |i| match (short_ma[i], long_ma[i]) {
            (Some(s), Some(l)) => Some((s > l, s < l)),
            _ => None,
        });

        SignalSeries::from_actions(series, &actions)
            .with_auxiliary("short_ma", short_ma)
            .with_auxiliary("long_ma", long_ma)
    }
}
