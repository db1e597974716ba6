//! Performance metrics: pure functions that compute strategy statistics.
//!
//! Every metric is a pure function: equity curve and/or trade list in, scalar out.
//! Ratios with a zero denominator return the sentinel `0.0`, never NaN or inf.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tradesim_core::domain::{equity_values, EquityPoint, Trade};

/// Confidence level for historical Value at Risk.
pub const VAR_CONFIDENCE: f64 = 0.99;

/// Cap for profit factor when there are no losing trades.
const PROFIT_FACTOR_CAP: f64 = 100.0;

/// Cap for CAGR. Annualizing a short or high-frequency curve overflows
/// `powf`; 1e6 is a 100,000,000% annual rate.
pub const CAGR_CAP: f64 = 1e6;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MetricsError {
    #[error("need at least 2 equity points to compute returns, got {points}")]
    InsufficientData { points: usize },

    #[error("invalid metrics config: {0}")]
    InvalidConfig(String),
}

/// Annualization settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Bars per year (252 for daily bars).
    pub periods_per_year: f64,
    /// Annual risk-free rate as a fraction.
    pub risk_free_rate: f64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            periods_per_year: 252.0,
            risk_free_rate: 0.0,
        }
    }
}

impl MetricsConfig {
    pub fn validate(&self) -> Result<(), MetricsError> {
        if !(self.periods_per_year.is_finite() && self.periods_per_year > 0.0) {
            return Err(MetricsError::InvalidConfig(format!(
                "periods_per_year must be > 0, got {}",
                self.periods_per_year
            )));
        }
        if !self.risk_free_rate.is_finite() {
            return Err(MetricsError::InvalidConfig(format!(
                "risk_free_rate must be finite, got {}",
                self.risk_free_rate
            )));
        }
        Ok(())
    }
}

/// Aggregate performance metrics for a single backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub initial_equity: f64,
    pub final_equity: f64,
    pub total_return: f64,
    pub cagr: f64,
    pub volatility: f64,
    pub sharpe: f64,
    pub sortino: f64,
    pub calmar: f64,
    pub max_drawdown: f64,
    pub value_at_risk_99: f64,
    pub win_loss_ratio: f64,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub trade_count: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
}

impl PerformanceMetrics {
    /// Compute all metrics from an equity curve and trade list.
    ///
    /// Fails on fewer than 2 equity points; no partial metrics are returned.
    pub fn compute(
        equity_curve: &[EquityPoint],
        trades: &[Trade],
        config: &MetricsConfig,
    ) -> Result<Self, MetricsError> {
        config.validate()?;
        Self::from_values(&equity_values(equity_curve), trades, config)
    }

    /// Same as [`compute`](Self::compute) over a bare equity series.
    pub fn from_values(
        equity: &[f64],
        trades: &[Trade],
        config: &MetricsConfig,
    ) -> Result<Self, MetricsError> {
        if equity.len() < 2 {
            return Err(MetricsError::InsufficientData {
                points: equity.len(),
            });
        }
        let ppy = config.periods_per_year;
        let rets = returns(equity);
        let initial_equity = equity[0];
        let final_equity = equity[equity.len() - 1];

        Ok(Self {
            initial_equity,
            final_equity,
            total_return: total_return(equity),
            cagr: cagr(equity, ppy),
            volatility: volatility(&rets, ppy),
            sharpe: sharpe_ratio(&rets, config.risk_free_rate, ppy),
            sortino: sortino_ratio(&rets, config.risk_free_rate, ppy),
            calmar: calmar_ratio(equity, ppy),
            max_drawdown: max_drawdown(equity),
            value_at_risk_99: value_at_risk(&rets, VAR_CONFIDENCE),
            win_loss_ratio: win_loss_ratio(trades),
            win_rate: win_rate(trades),
            profit_factor: profit_factor(trades),
            trade_count: trades.len(),
            winning_trades: trades.iter().filter(|t| t.is_winner()).count(),
            losing_trades: trades.iter().filter(|t| t.is_loser()).count(),
        })
    }

    /// Flat `metric-name → value` view, ordered by name.
    pub fn to_table(&self) -> BTreeMap<String, f64> {
        [
            ("initial_equity", self.initial_equity),
            ("final_equity", self.final_equity),
            ("total_return", self.total_return),
            ("cagr", self.cagr),
            ("volatility", self.volatility),
            ("sharpe", self.sharpe),
            ("sortino", self.sortino),
            ("calmar", self.calmar),
            ("max_drawdown", self.max_drawdown),
            ("value_at_risk_99", self.value_at_risk_99),
            ("win_loss_ratio", self.win_loss_ratio),
            ("win_rate", self.win_rate),
            ("profit_factor", self.profit_factor),
            ("trade_count", self.trade_count as f64),
            ("winning_trades", self.winning_trades as f64),
            ("losing_trades", self.losing_trades as f64),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// Per-bar simple returns `e_i / e_{i-1} − 1`. A non-positive base yields 0.
pub fn returns(equity: &[f64]) -> Vec<f64> {
    equity
        .windows(2)
        .map(|w| if w[0] > 0.0 { w[1] / w[0] - 1.0 } else { 0.0 })
        .collect()
}

/// Total return as a fraction: final / initial − 1.
pub fn total_return(equity: &[f64]) -> f64 {
    match (equity.first(), equity.last()) {
        (Some(&initial), Some(&last)) if equity.len() >= 2 && initial > 0.0 => {
            last / initial - 1.0
        }
        _ => 0.0,
    }
}

/// Compound annual growth rate over `equity.len() − 1` periods.
///
/// Returns −1.0 when the final equity is wiped out and at most
/// [`CAGR_CAP`] when annualizing blows up.
pub fn cagr(equity: &[f64], periods_per_year: f64) -> f64 {
    let n = equity.len().saturating_sub(1);
    if n == 0 || equity[0] <= 0.0 {
        return 0.0;
    }
    let final_eq = equity[n];
    if final_eq <= 0.0 {
        return -1.0;
    }
    let growth = (final_eq / equity[0]).powf(periods_per_year / n as f64) - 1.0;
    if growth.is_finite() {
        growth.min(CAGR_CAP)
    } else {
        CAGR_CAP
    }
}

/// Annualized sample standard deviation of returns.
pub fn volatility(returns: &[f64], periods_per_year: f64) -> f64 {
    std_dev(returns) * periods_per_year.sqrt()
}

/// Annualized Sharpe ratio.
///
/// Sharpe = mean(r − rf / ppy) / std(r) * sqrt(ppy). 0.0 when std is zero or
/// there are fewer than 2 returns.
pub fn sharpe_ratio(returns: &[f64], risk_free_rate: f64, periods_per_year: f64) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let std = std_dev(returns);
    if std < 1e-15 {
        return 0.0;
    }
    mean_excess(returns, risk_free_rate, periods_per_year) / std * periods_per_year.sqrt()
}

/// Annualized Sortino ratio: Sharpe numerator over the sample std of the
/// negative returns. 0.0 with fewer than 2 negative returns or zero deviation.
pub fn sortino_ratio(returns: &[f64], risk_free_rate: f64, periods_per_year: f64) -> f64 {
    let downside: Vec<f64> = returns.iter().copied().filter(|r| *r < 0.0).collect();
    if downside.len() < 2 {
        return 0.0;
    }
    let downside_std = std_dev(&downside);
    if downside_std < 1e-15 {
        return 0.0;
    }
    mean_excess(returns, risk_free_rate, periods_per_year) / downside_std
        * periods_per_year.sqrt()
}

/// Maximum drawdown as a non-positive fraction (−0.15 = 15% drawdown).
pub fn max_drawdown(equity: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut max_dd = 0.0_f64;
    for &eq in equity {
        peak = peak.max(eq);
        if peak > 0.0 {
            max_dd = max_dd.min(eq / peak - 1.0);
        }
    }
    max_dd
}

/// Calmar ratio: CAGR / |max drawdown|. 0.0 without a drawdown.
pub fn calmar_ratio(equity: &[f64], periods_per_year: f64) -> f64 {
    let dd = max_drawdown(equity);
    if dd >= 0.0 {
        return 0.0;
    }
    cagr(equity, periods_per_year) / dd.abs()
}

/// Historical Value at Risk: absolute return at the `1 − confidence`
/// quantile of the ascending-sorted returns.
pub fn value_at_risk(returns: &[f64], confidence: f64) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    let mut sorted = returns.to_vec();
    sorted.sort_by(f64::total_cmp);
    let index = ((sorted.len() as f64 * (1.0 - confidence)).floor() as usize).min(sorted.len() - 1);
    sorted[index].abs()
}

/// Winning trades per losing trade, by gross PnL. 0.0 with no losers.
pub fn win_loss_ratio(trades: &[Trade]) -> f64 {
    let losers = trades.iter().filter(|t| t.is_loser()).count();
    if losers == 0 {
        return 0.0;
    }
    let winners = trades.iter().filter(|t| t.is_winner()).count();
    winners as f64 / losers as f64
}

/// Win rate: fraction of trades that were winners.
pub fn win_rate(trades: &[Trade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    let winners = trades.iter().filter(|t| t.is_winner()).count();
    winners as f64 / trades.len() as f64
}

/// Profit factor: gross net profits / gross net losses.
///
/// Capped at 100.0 for edge cases (all winners, zero losses).
pub fn profit_factor(trades: &[Trade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    let gross_profit: f64 = trades
        .iter()
        .filter(|t| t.net_pnl > 0.0)
        .map(|t| t.net_pnl)
        .sum();
    let gross_loss: f64 = trades
        .iter()
        .filter(|t| t.net_pnl < 0.0)
        .map(|t| t.net_pnl.abs())
        .sum();

    if gross_loss < 1e-10 {
        return if gross_profit > 0.0 { PROFIT_FACTOR_CAP } else { 0.0 };
    }
    (gross_profit / gross_loss).min(PROFIT_FACTOR_CAP)
}

// ─── Helpers ────────────────────────────────────────────────────────

fn mean_excess(returns: &[f64], risk_free_rate: f64, periods_per_year: f64) -> f64 {
    let rf = risk_free_rate / periods_per_year;
    mean_f64(returns) - rf
}

pub(crate) fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub(crate) fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(values);
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}
