//! TradeSim CLI: run single backtests or batches from TOML configs.
//!
//! Commands:
//! - `run`: execute one backtest and save its artifacts
//! - `batch`: execute several configs in parallel over the same data

mod obs;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tradesim_core::domain::PriceSeries;
use tradesim_runner::{
    load_all, rank_by_sharpe, run_backtest_from_data, run_batch, BacktestConfig, BacktestResult,
};
use tradesim_runner::export::{export_json, save_artifacts};

#[derive(Parser)]
#[command(name = "tradesim", about = "TradeSim CLI: signal-driven portfolio backtester")]
struct Cli {
    /// Default log level when TRADESIM_LOG is unset.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Log output format: text or json.
    #[arg(long, global = true, default_value = "text")]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a backtest from a TOML config file.
    Run {
        /// Path to a TOML config file.
        #[arg(long)]
        config: PathBuf,

        /// Price data as INSTRUMENT=path.csv (repeatable).
        #[arg(long = "data", required = true, value_parser = parse_data_arg)]
        data: Vec<(String, PathBuf)>,

        /// Output directory for artifacts.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,

        /// Log recovered portfolio errors and fills.
        #[arg(long, default_value_t = false)]
        verbose: bool,

        /// Print the full result as JSON instead of the summary.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Execute several configs in parallel over the same data.
    Batch {
        /// TOML config files (repeatable).
        #[arg(long = "config", required = true)]
        configs: Vec<PathBuf>,

        /// Price data as INSTRUMENT=path.csv (repeatable).
        #[arg(long = "data", required = true, value_parser = parse_data_arg)]
        data: Vec<(String, PathBuf)>,

        /// Output directory for artifacts.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    obs::init_tracing(&cli.log_level, &cli.log_format)?;

    match cli.command {
        Commands::Run {
            config,
            data,
            output_dir,
            verbose,
            json,
        } => run_cmd(&config, &data, &output_dir, verbose, json),
        Commands::Batch {
            configs,
            data,
            output_dir,
        } => batch_cmd(&configs, &data, &output_dir),
    }
}

fn run_cmd(
    config_path: &Path,
    data: &[(String, PathBuf)],
    output_dir: &Path,
    verbose: bool,
    json: bool,
) -> Result<()> {
    let mut config = BacktestConfig::from_file(config_path)?;
    if verbose {
        config.backtest.verbose = true;
    }
    let series = load_data(data)?;
    info!(config = %config_path.display(), instruments = series.len(), "data loaded");

    let result = run_backtest_from_data(&config, &series)?;

    if json {
        println!("{}", export_json(&result)?);
    } else {
        print_summary(&result);
    }

    let run_dir = save_artifacts(&result, output_dir)?;
    println!("Artifacts saved to: {}", run_dir.display());
    Ok(())
}

fn batch_cmd(config_paths: &[PathBuf], data: &[(String, PathBuf)], output_dir: &Path) -> Result<()> {
    let configs = config_paths
        .iter()
        .map(|path| {
            BacktestConfig::from_file(path).with_context(|| format!("loading {}", path.display()))
        })
        .collect::<Result<Vec<_>>>()?;
    let series = load_data(data)?;
    info!(runs = configs.len(), instruments = series.len(), "data loaded");

    let results = run_batch(&configs, &series, None);

    let mut failures = 0;
    for (path, result) in config_paths.iter().zip(&results) {
        match result {
            Ok(r) => {
                save_artifacts(r, output_dir)?;
            }
            Err(e) => {
                failures += 1;
                eprintln!("{}: {e}", path.display());
            }
        }
    }

    println!();
    println!("=== Batch Results (by Sharpe) ===");
    println!(
        "{:<16} {:<14} {:>10} {:>10} {:>10} {:>7}",
        "Run", "Strategy", "Return", "Sharpe", "MaxDD", "Trades"
    );
    for r in rank_by_sharpe(&results) {
        println!(
            "{:<16} {:<14} {:>9.2}% {:>10.3} {:>9.2}% {:>7}",
            r.run_id.get(..12).unwrap_or(&r.run_id),
            r.strategy,
            r.metrics.total_return * 100.0,
            r.metrics.sharpe,
            r.metrics.max_drawdown * 100.0,
            r.metrics.trade_count
        );
    }
    println!();
    println!("Artifacts saved under: {}", output_dir.display());

    if failures > 0 {
        bail!("{failures} of {} runs failed", results.len());
    }
    Ok(())
}

fn load_data(data: &[(String, PathBuf)]) -> Result<HashMap<String, PriceSeries>> {
    let series = load_all(data.iter().map(|(name, path)| (name.as_str(), path.as_path())))?;
    Ok(series)
}

/// Parse `INSTRUMENT=path`.
fn parse_data_arg(raw: &str) -> Result<(String, PathBuf), String> {
    let (name, path) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected INSTRUMENT=path, got '{raw}'"))?;
    let name = name.trim();
    if name.is_empty() || path.trim().is_empty() {
        return Err(format!("expected INSTRUMENT=path, got '{raw}'"));
    }
    Ok((name.to_string(), PathBuf::from(path.trim())))
}

fn print_summary(result: &BacktestResult) {
    let m = &result.metrics;
    println!();
    println!("=== Backtest Result ===");
    println!("Run ID:         {}", result.run_id);
    println!("Strategy:       {}", result.strategy);
    println!("Instruments:    {}", result.instruments.join(", "));
    println!("Bars:           {}", result.bar_count);
    println!("Trades:         {}", m.trade_count);
    println!();
    println!("--- Performance ---");
    println!("Final Equity:   {:.2}", m.final_equity);
    println!("Total Return:   {:.2}%", m.total_return * 100.0);
    println!("CAGR:           {:.2}%", m.cagr * 100.0);
    println!("Volatility:     {:.2}%", m.volatility * 100.0);
    println!("Sharpe:         {:.3}", m.sharpe);
    println!("Sortino:        {:.3}", m.sortino);
    println!("Calmar:         {:.3}", m.calmar);
    println!("Max Drawdown:   {:.2}%", m.max_drawdown * 100.0);
    println!("VaR (99%):      {:.2}%", m.value_at_risk_99 * 100.0);
    println!("Win Rate:       {:.1}%", m.win_rate * 100.0);
    println!("Win/Loss:       {:.2}", m.win_loss_ratio);
    println!("Profit Factor:  {:.2}", m.profit_factor);
    println!("Commission:     {:.2}", result.total_commission);
    if !result.recovered_errors.is_empty() {
        println!();
        println!("WARNING: {} recovered portfolio errors", result.recovered_errors.len());
    }
    if !result.open_positions.is_empty() {
        println!("NOTE: {} positions left open", result.open_positions.len());
    }
    println!();
}
