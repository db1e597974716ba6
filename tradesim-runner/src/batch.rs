//! Batch execution: many independent configs over shared, read-only data.
//!
//! Each config gets its own engine; runs share nothing mutable except the
//! optional `CancelFlag`. Results come back in input order.

use std::collections::HashMap;

use rayon::prelude::*;
use tracing::info;
use tradesim_core::domain::PriceSeries;
use tradesim_core::engine::CancelFlag;

use crate::config::BacktestConfig;
use crate::runner::{run_backtest_with_cancel, BacktestResult, RunError};

/// Run every config in parallel. One failed run does not affect the others.
pub fn run_batch(
    configs: &[BacktestConfig],
    data: &HashMap<String, PriceSeries>,
    cancel: Option<&CancelFlag>,
) -> Vec<Result<BacktestResult, RunError>> {
    info!(runs = configs.len(), "starting batch");
    let results: Vec<_> = configs
        .par_iter()
        .map(|config| run_backtest_with_cancel(config, data, cancel))
        .collect();
    let failed = results.iter().filter(|r| r.is_err()).count();
    info!(runs = configs.len(), failed, "batch complete");
    results
}

/// Sequential variant, handy for debugging and deterministic logs.
pub fn run_batch_sequential(
    configs: &[BacktestConfig],
    data: &HashMap<String, PriceSeries>,
    cancel: Option<&CancelFlag>,
) -> Vec<Result<BacktestResult, RunError>> {
    configs
        .iter()
        .map(|config| run_backtest_with_cancel(config, data, cancel))
        .collect()
}

/// Successful results ranked by Sharpe ratio, best first.
pub fn rank_by_sharpe(results: &[Result<BacktestResult, RunError>]) -> Vec<&BacktestResult> {
    let mut ok: Vec<&BacktestResult> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    ok.sort_by(|a, b| b.metrics.sharpe.total_cmp(&a.metrics.sharpe));
    ok
}
