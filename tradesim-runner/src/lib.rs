//! TradeSim Runner: backtest orchestration, configuration, metrics, export.
//!
//! This crate builds on `tradesim-core` to provide:
//! - TOML configuration with strategy selection and run fingerprinting
//! - CSV bar loading
//! - Single-backtest runner producing a serializable `BacktestResult`
//! - Performance metrics (Sharpe, Sortino, drawdown, VaR, ...)
//! - Parallel batch runs with cooperative cancellation
//! - JSON / CSV / Markdown artifact export

pub mod batch;
pub mod config;
pub mod data_loader;
pub mod export;
pub mod metrics;
pub mod runner;

pub use batch::{rank_by_sharpe, run_batch, run_batch_sequential};
pub use config::{BacktestConfig, BuiltStrategy, ConfigError, RunId, StrategyConfig};
pub use data_loader::{load_all, load_csv, LoadError};
pub use metrics::{MetricsConfig, MetricsError, PerformanceMetrics};
pub use runner::{
    run_backtest_from_data, run_backtest_with_cancel, BacktestResult, RunError, SCHEMA_VERSION,
};
