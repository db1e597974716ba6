//! Backtest runner: wires together config, strategy, engine, and metrics.
//!
//! Two entry points:
//! - `run_backtest_from_data()`: pre-loaded price series, no I/O. Used by the CLI.
//! - `run_backtest_with_cancel()`: same, polling a shared `CancelFlag`. Used by batch runs.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use tradesim_core::domain::{EquityPoint, Position, PriceSeries, Trade};
use tradesim_core::engine::{
    run_backtest, CancelFlag, EngineError, InstrumentFeed, RecoveredError,
};
use tradesim_core::strategy::{PairStrategy, StrategyError};

use crate::config::{BacktestConfig, BuiltStrategy, ConfigError, RunId};
use crate::metrics::{MetricsError, PerformanceMetrics};

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("strategy error: {0}")]
    Strategy(#[from] StrategyError),
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
    #[error("metrics error: {0}")]
    Metrics(#[from] MetricsError),
    #[error("instrument '{0}' not found in loaded data")]
    InstrumentNotFound(String),
    #[error("data loaded under '{key}' belongs to instrument '{found}'")]
    InstrumentMismatch { key: String, found: String },
}

/// Current schema version for persisted artifacts.
pub const SCHEMA_VERSION: u32 = 1;

/// Per-instrument auxiliary series emitted by the strategy.
pub type Diagnostics = BTreeMap<String, BTreeMap<String, Vec<Option<f64>>>>;

/// Complete result of a single backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    /// Schema version for forward-compatible deserialization.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub run_id: RunId,
    pub strategy: String,
    pub instruments: Vec<String>,
    pub initial_cash: f64,
    pub final_cash: f64,
    pub total_commission: f64,
    pub equity_curve: Vec<EquityPoint>,
    pub trades: Vec<Trade>,
    /// Positions still open at the end (only with `close_at_end = false`).
    #[serde(default)]
    pub open_positions: Vec<Position>,
    pub metrics: PerformanceMetrics,
    pub metrics_table: BTreeMap<String, f64>,
    #[serde(default)]
    pub recovered_errors: Vec<RecoveredError>,
    #[serde(default)]
    pub diagnostics: Diagnostics,
    pub bar_count: usize,
}

/// Default schema version for serde deserialization of older JSON without the field.
fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl BacktestResult {
    pub fn final_equity(&self) -> f64 {
        self.metrics.final_equity
    }
}

/// Run a backtest with pre-loaded data: no I/O.
///
/// `data` may hold more instruments than the config trades; only the
/// configured ones are used, in configured order.
pub fn run_backtest_from_data(
    config: &BacktestConfig,
    data: &HashMap<String, PriceSeries>,
) -> Result<BacktestResult, RunError> {
    run_backtest_with_cancel(config, data, None)
}

/// Same as [`run_backtest_from_data`], aborting with
/// `RunError::Engine(EngineError::Cancelled)` once `cancel` is set.
pub fn run_backtest_with_cancel(
    config: &BacktestConfig,
    data: &HashMap<String, PriceSeries>,
    cancel: Option<&CancelFlag>,
) -> Result<BacktestResult, RunError> {
    config.validate()?;
    let run_id = config.run_id()?;
    let series = select_series(config, data)?;
    let strategy = config.strategy.build()?;

    info!(
        run_id = %short_id(&run_id),
        strategy = strategy.name(),
        instruments = ?config.backtest.instruments,
        "starting backtest"
    );

    let (feeds, diagnostics) = build_feeds(&strategy, &series)?;
    let result = run_backtest(&feeds, &config.engine_config(), cancel)?;
    let metrics = PerformanceMetrics::compute(&result.equity_curve, &result.trades, &config.metrics)?;

    info!(
        run_id = %short_id(&run_id),
        trades = result.trades.len(),
        final_equity = metrics.final_equity,
        sharpe = metrics.sharpe,
        "backtest complete"
    );
    if !result.recovered_errors.is_empty() {
        debug!(count = result.recovered_errors.len(), "engine recovered from portfolio errors");
    }

    Ok(BacktestResult {
        schema_version: SCHEMA_VERSION,
        run_id,
        strategy: strategy.name().to_string(),
        instruments: config.backtest.instruments.clone(),
        initial_cash: result.initial_cash,
        final_cash: result.final_cash,
        total_commission: result.total_commission,
        metrics_table: metrics.to_table(),
        metrics,
        equity_curve: result.equity_curve,
        trades: result.trades,
        open_positions: result.open_positions,
        recovered_errors: result.recovered_errors,
        diagnostics,
        bar_count: result.bar_count,
    })
}

/// Configured instruments' series, in configured order.
fn select_series<'a>(
    config: &BacktestConfig,
    data: &'a HashMap<String, PriceSeries>,
) -> Result<Vec<&'a PriceSeries>, RunError> {
    config
        .backtest
        .instruments
        .iter()
        .map(|instrument| {
            let series = data
                .get(instrument)
                .ok_or_else(|| RunError::InstrumentNotFound(instrument.clone()))?;
            if series.instrument() != instrument {
                return Err(RunError::InstrumentMismatch {
                    key: instrument.clone(),
                    found: series.instrument().to_string(),
                });
            }
            Ok(series)
        })
        .collect()
}

fn build_feeds(
    strategy: &BuiltStrategy,
    series: &[&PriceSeries],
) -> Result<(Vec<InstrumentFeed>, Diagnostics), RunError> {
    let mut feeds = Vec::with_capacity(series.len());
    let mut diagnostics = Diagnostics::new();

    match strategy {
        BuiltStrategy::Single(strategy) => {
            for s in series {
                warn_if_within_warmup(strategy.name(), strategy.warmup_bars(), s);
                let signals = strategy.generate_signals(s);
                diagnostics.insert(s.instrument().to_string(), signals.auxiliary.clone());
                feeds.push(InstrumentFeed::new((*s).clone(), signals)?);
            }
        }
        BuiltStrategy::Pair(pairs) => {
            // Config validation guarantees exactly two legs.
            let [first, second] = series else {
                return Err(RunError::Config(ConfigError::Invalid {
                    field: "backtest.instruments".into(),
                    reason: format!("pairs strategy needs exactly 2 instruments, got {}", series.len()),
                }));
            };
            for s in [first, second] {
                warn_if_within_warmup(pairs.name(), pairs.warmup_bars(), s);
            }
            let signals = pairs.generate_pair_signals(first, second)?;
            let pair_key = format!("{}/{}", first.instrument(), second.instrument());
            diagnostics.insert(pair_key, signals.auxiliary);
            feeds.push(InstrumentFeed::new((*first).clone(), signals.first)?);
            feeds.push(InstrumentFeed::new((*second).clone(), signals.second)?);
        }
    }
    Ok((feeds, diagnostics))
}

/// Warns when `series` ends before the strategy can emit anything but HOLD.
/// Returns whether it did.
fn warn_if_within_warmup(strategy: &str, warmup: usize, series: &PriceSeries) -> bool {
    let too_short = series.len() <= warmup;
    if too_short {
        warn!(
            strategy,
            instrument = series.instrument(),
            bars = series.len(),
            warmup,
            first = %series.first_timestamp(),
            last = %series.last_timestamp(),
            "series ends inside the strategy warmup, every signal will be HOLD"
        );
    }
    too_short
}

fn short_id(run_id: &str) -> &str {
    run_id.get(..12).unwrap_or(run_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};
    use tradesim_core::domain::Bar;

    fn series(instrument: &str, closes: &[f64]) -> PriceSeries {
        let base = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Bar {
                timestamp: base + Duration::days(i as i64),
                open: c,
                high: c,
                low: c,
                close: c,
                volume: 1_000.0,
            })
            .collect();
        PriceSeries::new(instrument, bars).unwrap()
    }

    fn config(instruments: &[&str], strategy: &str) -> BacktestConfig {
        let list = instruments
            .iter()
            .map(|s| format!("\"{s}\""))
            .collect::<Vec<_>>()
            .join(", ");
        BacktestConfig::from_toml(&format!(
            "[backtest]\ninitial_cash = 10000.0\ninstruments = [{list}]\n\n[strategy]\n{strategy}\n"
        ))
        .unwrap()
    }

    #[test]
    fn missing_instrument_is_reported() {
        let cfg = config(&["AAPL"], "type = \"ma_crossover\"\nshort_window = 2\nlong_window = 3");
        let data = HashMap::new();
        assert!(matches!(
            run_backtest_from_data(&cfg, &data),
            Err(RunError::InstrumentNotFound(s)) if s == "AAPL"
        ));
    }

    #[test]
    fn mismatched_key_is_rejected() {
        let cfg = config(&["AAPL"], "type = \"ma_crossover\"\nshort_window = 2\nlong_window = 3");
        let mut data = HashMap::new();
        data.insert("AAPL".to_string(), series("MSFT", &[1.0, 2.0, 3.0]));
        assert!(matches!(
            run_backtest_from_data(&cfg, &data),
            Err(RunError::InstrumentMismatch { .. })
        ));
    }

    #[test]
    fn flat_prices_produce_no_trades() {
        let cfg = config(&["X"], "type = \"ma_crossover\"\nshort_window = 2\nlong_window = 4");
        let mut data = HashMap::new();
        data.insert("X".to_string(), series("X", &[10.0; 20]));
        let result = run_backtest_from_data(&cfg, &data).unwrap();
        assert!(result.trades.is_empty());
        assert_eq!(result.bar_count, 20);
        assert_eq!(result.final_equity(), 10_000.0);
        assert_eq!(result.metrics.sharpe, 0.0);
        assert_eq!(result.strategy, "ma_crossover");
        assert!(result.diagnostics["X"].contains_key("short_ma"));
    }

    #[test]
    fn single_bar_fails_metrics() {
        let cfg = config(&["X"], "type = \"ma_crossover\"\nshort_window = 2\nlong_window = 4");
        let mut data = HashMap::new();
        data.insert("X".to_string(), series("X", &[10.0]));
        assert!(matches!(
            run_backtest_from_data(&cfg, &data),
            Err(RunError::Metrics(MetricsError::InsufficientData { points: 1 }))
        ));
    }

    #[test]
    fn warmup_check_flags_short_series() {
        let short = series("X", &[10.0; 3]);
        assert!(warn_if_within_warmup("ma_crossover", 3, &short));
        assert!(!warn_if_within_warmup("ma_crossover", 2, &short));

        // a run over a too-short series still completes, flat
        let cfg = config(&["X"], "type = \"ma_crossover\"\nshort_window = 2\nlong_window = 10");
        let mut data = HashMap::new();
        data.insert("X".to_string(), short);
        let result = run_backtest_from_data(&cfg, &data).unwrap();
        assert!(result.trades.is_empty());
    }

    #[test]
    fn cancelled_flag_aborts() {
        let cfg = config(&["X"], "type = \"rsi\"");
        let mut data = HashMap::new();
        data.insert("X".to_string(), series("X", &[10.0; 30]));
        let cancel = CancelFlag::new();
        cancel.cancel();
        assert!(matches!(
            run_backtest_with_cancel(&cfg, &data, Some(&cancel)),
            Err(RunError::Engine(EngineError::Cancelled))
        ));
    }

    #[test]
    fn pairs_diagnostics_keyed_by_pair() {
        let cfg = config(&["KO", "PEP"], "type = \"pairs\"\nwindow = 5");
        let mut data = HashMap::new();
        data.insert("KO".to_string(), series("KO", &[50.0; 12]));
        data.insert("PEP".to_string(), series("PEP", &[40.0; 12]));
        let result = run_backtest_from_data(&cfg, &data).unwrap();
        assert!(result.diagnostics["KO/PEP"].contains_key("zscore"));
        assert!(result.trades.is_empty());
    }

    #[test]
    fn metrics_table_matches_metrics() {
        let cfg = config(&["X"], "type = \"mean_reversion\"\nwindow = 5");
        let mut data = HashMap::new();
        let closes: Vec<f64> = (0..60)
            .map(|i| 100.0 + 10.0 * ((i as f64) * 0.5).sin())
            .collect();
        data.insert("X".to_string(), series("X", &closes));
        let result = run_backtest_from_data(&cfg, &data).unwrap();
        assert_eq!(result.metrics_table, result.metrics.to_table());
        assert_eq!(result.metrics_table["trade_count"], result.trades.len() as f64);
    }
}
