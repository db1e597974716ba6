//! Mean reversion on rolling bands.
//!
//! Bands are `mean ± num_std_dev * sample_std` over a trailing window that
//! includes the current close. Enters long below the lower band, exits above
//! the upper band. Emits `mean`, `upper` and `lower`.

use crate::domain::{PriceSeries, SignalSeries};
use crate::indicators::{rolling_std, sma};

use super::{long_only_actions, Strategy, StrategyError};

#[derive(Debug, Clone, PartialEq)]
pub struct MeanReversion {
    pub window: usize,
    pub num_std_dev: f64,
}

impl MeanReversion {
    pub fn new(window: usize, num_std_dev: f64) -> Result<Self, StrategyError> {
        if window < 2 {
            return Err(StrategyError::invalid("mean_reversion", "window must be >= 2"));
        }
        if !(num_std_dev.is_finite() && num_std_dev > 0.0) {
            return Err(StrategyError::invalid(
                "mean_reversion",
                format!("num_std_dev must be > 0, got {num_std_dev}"),
            ));
        }
        Ok(Self {
            window,
            num_std_dev,
        })
    }
}

impl Default for MeanReversion {
    fn default() -> Self {
        Self {
            window: 20,
            num_std_dev: 2.0,
        }
    }
}

impl Strategy for MeanReversion {
    fn name(&self) -> &str {
        "mean_reversion"
    }

    fn warmup_bars(&self) -> usize {
        self.window - 1
    }

    fn generate_signals(&self, series: &PriceSeries) -> SignalSeries {
        let closes = series.closes();
        let mean = sma(&closes, self.window);
        let std = rolling_std(&closes, self.window);

        let band = |offset: f64| -> Vec<Option<f64>> {
            mean.iter()
                .zip(&std)
                .map(|(m, s)| Some((*m)? + offset * (*s)?))
                .collect()
        };
        let upper = band(self.num_std_dev);
        let lower = band(-self.num_std_dev);

        let actions = long_only_actions(closes.len(), |i| match (lower[i], upper[i]) {
            (Some(lo), Some(hi)) => Some((closes[i] < lo, closes[i] > hi)),
            _ => None,
        });

        SignalSeries::from_actions(series, &actions)
            .with_auxiliary("mean", mean)
            .with_auxiliary("upper", upper)
            .with_auxiliary("lower", lower)
    }
}
