//! Engine configuration, inputs, and run result types.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::domain::{
    Bar, EquityPoint, Position, PriceSeries, SignalAction, SignalSeries, Trade,
};
use crate::portfolio::CommissionModel;
use crate::sizers::SizingRule;

use super::loop_runner::EngineError;

/// Configuration for a single backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub initial_cash: f64,
    /// Stop distance as a fraction of entry price; 0 disables stops.
    pub stop_loss_pct: f64,
    pub sizing: SizingRule,
    pub commission: CommissionModel,
    /// Realize every open position on the final timestamp.
    pub close_at_end: bool,
    /// Log recovered errors and fills.
    pub verbose: bool,
    /// Instruments traded as linked pairs.
    pub pairs: Vec<PairLink>,
}

impl EngineConfig {
    pub fn new(initial_cash: f64) -> Self {
        Self {
            initial_cash,
            stop_loss_pct: 0.0,
            sizing: SizingRule::default(),
            commission: CommissionModel::None,
            close_at_end: true,
            verbose: false,
            pairs: Vec::new(),
        }
    }

    pub fn with_stop_loss(mut self, pct: f64) -> Self {
        self.stop_loss_pct = pct;
        self
    }

    pub fn with_sizing(mut self, sizing: SizingRule) -> Self {
        self.sizing = sizing;
        self
    }

    pub fn with_commission(mut self, commission: CommissionModel) -> Self {
        self.commission = commission;
        self
    }

    pub fn with_pair(mut self, first: impl Into<String>, second: impl Into<String>) -> Self {
        self.pairs.push(PairLink {
            first: first.into(),
            second: second.into(),
        });
        self
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if !(self.initial_cash.is_finite() && self.initial_cash > 0.0) {
            return Err(EngineError::InvalidConfig(format!(
                "initial_cash must be > 0, got {}",
                self.initial_cash
            )));
        }
        if !(self.stop_loss_pct.is_finite() && self.stop_loss_pct >= 0.0) {
            return Err(EngineError::InvalidConfig(format!(
                "stop_loss_pct must be >= 0, got {}",
                self.stop_loss_pct
            )));
        }
        self.sizing.validate().map_err(EngineError::InvalidConfig)
    }
}

/// Two instruments whose same-bar entries share one trade id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairLink {
    pub first: String,
    pub second: String,
}

/// One instrument's bars with the signals aligned to them.
///
/// Construction guarantees one signal per bar with matching timestamps.
#[derive(Debug, Clone)]
pub struct InstrumentFeed {
    series: PriceSeries,
    signals: SignalSeries,
}

impl InstrumentFeed {
    pub fn new(series: PriceSeries, signals: SignalSeries) -> Result<Self, EngineError> {
        let misaligned = |reason: String| EngineError::MisalignedSignals {
            instrument: series.instrument().to_string(),
            reason,
        };
        if series.len() != signals.len() {
            return Err(misaligned(format!(
                "{} bars but {} signals",
                series.len(),
                signals.len()
            )));
        }
        if let Some((i, (bar_ts, sig_ts))) = series
            .timestamps()
            .zip(signals.signals.iter().map(|s| s.timestamp))
            .enumerate()
            .find(|(_, (a, b))| a != b)
        {
            return Err(misaligned(format!(
                "signal {i} at {sig_ts} does not match bar at {bar_ts}"
            )));
        }
        Ok(Self { series, signals })
    }

    /// Build a feed straight from raw bars and one action per bar.
    pub fn from_bars(
        instrument: &str,
        bars: Vec<Bar>,
        actions: &[SignalAction],
    ) -> Result<Self, EngineError> {
        let series = PriceSeries::new(instrument, bars)?;
        if actions.len() != series.len() {
            return Err(EngineError::MisalignedSignals {
                instrument: instrument.to_string(),
                reason: format!("{} bars but {} actions", series.len(), actions.len()),
            });
        }
        let signals = SignalSeries::from_actions(&series, actions);
        Ok(Self { series, signals })
    }

    pub fn instrument(&self) -> &str {
        self.series.instrument()
    }

    pub fn series(&self) -> &PriceSeries {
        &self.series
    }

    pub fn signals(&self) -> &SignalSeries {
        &self.signals
    }
}

/// Cooperative cancellation shared across runs.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// A portfolio anomaly the engine skipped over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveredError {
    pub timestamp: NaiveDateTime,
    pub instrument: String,
    pub error: String,
}

/// Output of a single backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub initial_cash: f64,
    pub final_cash: f64,
    pub equity_curve: Vec<EquityPoint>,
    pub trades: Vec<Trade>,
    /// Positions left open when `close_at_end` is off.
    pub open_positions: Vec<Position>,
    pub total_commission: f64,
    pub recovered_errors: Vec<RecoveredError>,
    /// Number of distinct timestamps processed.
    pub bar_count: usize,
}

impl RunResult {
    pub fn final_equity(&self) -> f64 {
        self.equity_curve
            .last()
            .map(|p| p.total_equity)
            .unwrap_or(self.initial_cash)
    }

    pub fn realized_pnl(&self) -> f64 {
        self.trades.iter().map(|t| t.realized_pnl).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn bars(n: usize) -> Vec<Bar> {
        let base = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        (0..n)
            .map(|i| Bar {
                timestamp: base + chrono::Duration::days(i as i64),
                open: 10.0,
                high: 11.0,
                low: 9.0,
                close: 10.0,
                volume: 100.0,
            })
            .collect()
    }

    #[test]
    fn config_validation() {
        assert!(EngineConfig::new(100_000.0).validate().is_ok());
        assert!(EngineConfig::new(0.0).validate().is_err());
        assert!(EngineConfig::new(-5.0).validate().is_err());
        assert!(EngineConfig::new(1.0).with_stop_loss(-0.1).validate().is_err());
        assert!(EngineConfig::new(1.0)
            .with_sizing(SizingRule::FractionOfCash { fraction: 2.0 })
            .validate()
            .is_err());
    }

    #[test]
    fn feed_rejects_wrong_signal_count() {
        let series = PriceSeries::new("SPY", bars(3)).unwrap();
        let short = PriceSeries::new("SPY", bars(2)).unwrap();
        let err = InstrumentFeed::new(series, SignalSeries::hold(&short)).unwrap_err();
        assert!(matches!(err, EngineError::MisalignedSignals { .. }));

        let err = InstrumentFeed::from_bars("SPY", bars(3), &[SignalAction::Hold]).unwrap_err();
        assert!(matches!(err, EngineError::MisalignedSignals { .. }));
    }

    #[test]
    fn feed_rejects_shifted_timestamps() {
        let series = PriceSeries::new("SPY", bars(3)).unwrap();
        let mut signals = SignalSeries::hold(&series);
        signals.signals[1].timestamp += chrono::Duration::hours(1);
        assert!(InstrumentFeed::new(series, signals).is_err());
    }

    #[test]
    fn feed_rejects_bad_bars() {
        let mut raw = bars(3);
        raw[1].timestamp = raw[0].timestamp;
        let err = InstrumentFeed::from_bars("SPY", raw, &[SignalAction::Hold; 3]).unwrap_err();
        assert!(matches!(err, EngineError::InvalidPriceSeries(_)));
    }

    #[test]
    fn cancel_flag_is_shared() {
        let flag = CancelFlag::new();
        let clone = flag.clone();
        assert!(!flag.is_cancelled());
        clone.cancel();
        assert!(flag.is_cancelled());
    }
}
