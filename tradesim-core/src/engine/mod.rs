//! Backtesting engine: signal-driven, bar-by-bar simulation.
//!
//! The engine walks the union of all instrument timestamps in ascending order.
//! Per timestamp, each instrument with a bar (in declared order):
//!
//! 1. Stop-loss check against the bar's range
//! 2. Signal application (enter / reverse / exit / hold)
//!
//! then one mark-to-market for the whole portfolio. Fatal problems are
//! input problems; portfolio anomalies are recorded and skipped.

pub mod loop_runner;
pub mod state;

pub use loop_runner::{run_backtest, EngineError};
pub use state::{CancelFlag, EngineConfig, InstrumentFeed, PairLink, RecoveredError, RunResult};
