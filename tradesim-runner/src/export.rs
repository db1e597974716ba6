//! Reporting and export: JSON, CSV, and Markdown artifact generation.
//!
//! - **JSON**: full round-trip serialization with schema versioning
//! - **CSV**: equity curve, trade log and metric table for external tools
//! - **Markdown**: human-readable single-run report
//!
//! All persisted artifacts include a `schema_version` field. Unknown versions
//! are rejected on load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tradesim_core::domain::{EquityPoint, ExitReason, Side, Trade};

use crate::runner::{BacktestResult, SCHEMA_VERSION};

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize a `BacktestResult` to pretty JSON.
pub fn export_json(result: &BacktestResult) -> Result<String> {
    serde_json::to_string_pretty(result).context("failed to serialize BacktestResult to JSON")
}

/// Deserialize a `BacktestResult` from JSON, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<BacktestResult> {
    let result: BacktestResult =
        serde_json::from_str(json).context("failed to deserialize BacktestResult from JSON")?;
    if result.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            result.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(result)
}

// ─── CSV export ─────────────────────────────────────────────────────

/// One row per closed trade.
///
/// Columns: trade_id, instrument, side, entry_timestamp, entry_price,
/// exit_timestamp, exit_price, exit_reason, quantity, realized_pnl,
/// commission, net_pnl, return_pct
pub fn export_trades_csv(trades: &[Trade]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "trade_id",
        "instrument",
        "side",
        "entry_timestamp",
        "entry_price",
        "exit_timestamp",
        "exit_price",
        "exit_reason",
        "quantity",
        "realized_pnl",
        "commission",
        "net_pnl",
        "return_pct",
    ])?;

    for t in trades {
        wtr.write_record([
            t.trade_id.0.to_string(),
            t.instrument.clone(),
            side_label(t.side).to_string(),
            t.entry_timestamp.to_string(),
            format!("{:.6}", t.entry_price),
            t.exit_timestamp.to_string(),
            format!("{:.6}", t.exit_price),
            exit_reason_label(t.exit_reason).to_string(),
            t.quantity.to_string(),
            format!("{:.2}", t.realized_pnl),
            format!("{:.2}", t.commission),
            format!("{:.2}", t.net_pnl),
            format!("{:.6}", t.return_pct()),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// One row per equity point.
pub fn export_equity_csv(equity_curve: &[EquityPoint]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["timestamp", "cash", "positions_market_value", "total_equity"])?;
    for p in equity_curve {
        wtr.write_record([
            p.timestamp.to_string(),
            format!("{:.2}", p.cash),
            format!("{:.2}", p.positions_market_value),
            format!("{:.2}", p.total_equity),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// One `metric,value` row per metric, ordered by name.
pub fn export_metrics_csv(result: &BacktestResult) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["metric", "value"])?;
    for (name, value) in &result.metrics_table {
        wtr.write_record([name.clone(), value.to_string()])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

fn side_label(side: Side) -> &'static str {
    match side {
        Side::Long => "LONG",
        Side::Short => "SHORT",
    }
}

fn exit_reason_label(reason: ExitReason) -> &'static str {
    match reason {
        ExitReason::Signal => "SIGNAL",
        ExitReason::StopLoss => "STOP_LOSS",
    }
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Save the full artifact set for a single backtest run.
///
/// Creates a directory named `{strategy}_{run_id prefix}/` under `output_dir`
/// containing:
/// - `manifest.json`: the full `BacktestResult`
/// - `trades.csv`: trade log
/// - `equity.csv`: bar-by-bar equity curve
/// - `metrics.csv`: metric table
/// - `report.md`: Markdown summary
///
/// Returns the path to the created directory.
pub fn save_artifacts(result: &BacktestResult, output_dir: &Path) -> Result<PathBuf> {
    let prefix = result.run_id.get(..12).unwrap_or(&result.run_id);
    let run_dir = output_dir.join(format!("{}_{}", result.strategy, prefix));
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    let files = [
        ("manifest.json", export_json(result)?),
        ("trades.csv", export_trades_csv(&result.trades)?),
        ("equity.csv", export_equity_csv(&result.equity_curve)?),
        ("metrics.csv", export_metrics_csv(result)?),
        ("report.md", generate_report(result)),
    ];
    for (name, contents) in files {
        let path = run_dir.join(name);
        std::fs::write(&path, contents)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }

    Ok(run_dir)
}

/// Load a `BacktestResult` from an artifact directory's manifest.json.
///
/// Rejects unknown schema versions.
pub fn load_artifacts(dir: &Path) -> Result<BacktestResult> {
    let manifest_path = dir.join("manifest.json");
    let json = std::fs::read_to_string(&manifest_path)
        .with_context(|| format!("failed to read {}", manifest_path.display()))?;
    import_json(&json)
}

// ─── Markdown reports ───────────────────────────────────────────────

/// Generate a Markdown report for a single backtest run.
pub fn generate_report(result: &BacktestResult) -> String {
    let mut md = String::with_capacity(2048);

    md.push_str("# Backtest Report\n\n");

    md.push_str("## Metadata\n\n");
    md.push_str("| Field | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Run ID | {} |\n", result.run_id));
    md.push_str(&format!("| Strategy | {} |\n", result.strategy));
    md.push_str(&format!("| Instruments | {} |\n", result.instruments.join(", ")));
    if let (Some(first), Some(last)) = (result.equity_curve.first(), result.equity_curve.last()) {
        md.push_str(&format!("| Period | {} to {} |\n", first.timestamp, last.timestamp));
    }
    md.push_str(&format!("| Initial Cash | ${:.2} |\n", result.initial_cash));
    md.push_str(&format!("| Bars | {} |\n", result.bar_count));
    md.push('\n');

    let m = &result.metrics;
    md.push_str("## Performance Summary\n\n");
    md.push_str("| Metric | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Final Equity | ${:.2} |\n", m.final_equity));
    md.push_str(&format!("| Total Return | {:.2}% |\n", m.total_return * 100.0));
    md.push_str(&format!("| CAGR | {:.2}% |\n", m.cagr * 100.0));
    md.push_str(&format!("| Volatility | {:.2}% |\n", m.volatility * 100.0));
    md.push_str(&format!("| Sharpe | {:.3} |\n", m.sharpe));
    md.push_str(&format!("| Sortino | {:.3} |\n", m.sortino));
    md.push_str(&format!("| Calmar | {:.3} |\n", m.calmar));
    md.push_str(&format!("| Max Drawdown | {:.2}% |\n", m.max_drawdown * 100.0));
    md.push_str(&format!("| VaR (99%) | {:.2}% |\n", m.value_at_risk_99 * 100.0));
    md.push_str(&format!("| Win Rate | {:.1}% |\n", m.win_rate * 100.0));
    md.push_str(&format!("| Win/Loss Ratio | {:.2} |\n", m.win_loss_ratio));
    md.push_str(&format!("| Profit Factor | {:.2} |\n", m.profit_factor));
    md.push_str(&format!(
        "| Trades | {} ({} won, {} lost) |\n",
        m.trade_count, m.winning_trades, m.losing_trades
    ));
    md.push_str(&format!("| Commission | ${:.2} |\n", result.total_commission));
    md.push('\n');

    if !result.open_positions.is_empty() {
        md.push_str("## Open Positions\n\n");
        for p in &result.open_positions {
            md.push_str(&format!(
                "- {} {} x{} @ {:.4}\n",
                p.instrument,
                side_label(p.side),
                p.quantity,
                p.entry_price
            ));
        }
        md.push('\n');
    }

    if !result.recovered_errors.is_empty() {
        md.push_str("## Recovered Errors\n\n");
        for e in &result.recovered_errors {
            md.push_str(&format!("- {} {}: {}\n", e.timestamp, e.instrument, e.error));
        }
        md.push('\n');
    }

    md
}
