//! Strategies: pure signal generators.
//!
//! A strategy sees only the price history it is given, never portfolio state.
//! It tracks its own virtual "in position" flag so it emits one entry per
//! holding period and an exit only after an entry. The signal at bar t uses
//! only bars `0..=t`.

pub mod ma_crossover;
pub mod mean_reversion;
pub mod pairs;
pub mod rsi;

pub use ma_crossover::MaCrossover;
pub use mean_reversion::MeanReversion;
pub use pairs::{PairSignals, PairsTrading};
pub use rsi::RsiStrategy;

use thiserror::Error;

use crate::domain::{PriceSeries, SignalAction, SignalSeries};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StrategyError {
    #[error("invalid parameter for {strategy}: {reason}")]
    InvalidParameter { strategy: String, reason: String },

    #[error("pair series '{first}' and '{second}' are not aligned: {reason}")]
    MisalignedPair {
        first: String,
        second: String,
        reason: String,
    },
}

impl StrategyError {
    pub(crate) fn invalid(strategy: &str, reason: impl Into<String>) -> Self {
        StrategyError::InvalidParameter {
            strategy: strategy.to_string(),
            reason: reason.into(),
        }
    }
}

/// Single-instrument signal generator.
pub trait Strategy: Send + Sync {
    /// Human-readable name (e.g., "ma_crossover").
    fn name(&self) -> &str;

    /// Bars needed before the strategy can emit anything but HOLD.
    fn warmup_bars(&self) -> usize;

    /// One signal per bar of `series`, HOLD where nothing happens.
    fn generate_signals(&self, series: &PriceSeries) -> SignalSeries;
}

/// Two-instrument signal generator; legs are traded together.
pub trait PairStrategy: Send + Sync {
    fn name(&self) -> &str;

    fn warmup_bars(&self) -> usize;

    /// Signals for both legs. The two series must share their timestamps.
    fn generate_pair_signals(
        &self,
        first: &PriceSeries,
        second: &PriceSeries,
    ) -> Result<PairSignals, StrategyError>;
}

/// Long-only entry/exit state machine shared by the single-instrument
/// strategies. `enter(i)` and `exit(i)` are only consulted once the
/// strategy's inputs are defined at bar i; `None` means warmup.
pub(crate) fn long_only_actions<F>(n: usize, mut decide: F) -> Vec<SignalAction>
where
    F: FnMut(usize) -> Option<(bool, bool)>,
{
    let mut in_position = false;
    (0..n)
        .map(|i| match decide(i) {
            Some((enter, _)) if enter && !in_position => {
                in_position = true;
                SignalAction::EnterLong
            }
            Some((_, exit)) if exit && in_position => {
                in_position = false;
                SignalAction::Exit
            }
            _ => SignalAction::Hold,
        })
        .collect()
}

#[cfg(test)]
pub(crate) fn series_from_closes(instrument: &str, closes: &[f64]) -> PriceSeries {
    use crate::domain::Bar;
    let base = chrono::NaiveDate::from_ymd_opt(2024, 1, 2)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    let bars = closes
        .iter()
        .enumerate()
        .map(|(i, &close)| Bar {
            timestamp: base + chrono::Duration::days(i as i64),
            open: close,
            high: close + 1.0,
            low: (close - 1.0).max(0.01),
            close,
            volume: 1_000.0,
        })
        .collect();
    PriceSeries::new(instrument, bars).unwrap()
}
