//! Serializable backtest configuration, loaded from TOML.
//!
//! ```toml
//! [backtest]
//! initial_cash = 100000.0
//! stop_loss_pct = 0.05
//! instruments = ["AAPL"]
//!
//! [strategy]
//! type = "ma_crossover"
//! short_window = 50
//! long_window = 200
//! ```
//!
//! `[metrics]`, `[sizing]` and `[commission]` are optional and fall back to
//! their defaults. Instrument order is cash priority when several
//! instruments enter on the same bar.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tradesim_core::engine::EngineConfig;
use tradesim_core::portfolio::CommissionModel;
use tradesim_core::sizers::SizingRule;
use tradesim_core::strategy::{
    MaCrossover, MeanReversion, PairsTrading, RsiStrategy, Strategy, StrategyError,
};

use crate::metrics::MetricsConfig;

/// Unique identifier for a backtest run (content-addressable hash).
pub type RunId = String;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config value for '{field}': {reason}")]
    Invalid { field: String, reason: String },

    #[error(transparent)]
    Strategy(#[from] StrategyError),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl ConfigError {
    fn invalid(field: &str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// Complete configuration for one backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfig {
    pub backtest: BacktestSection,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub sizing: SizingRule,
    #[serde(default)]
    pub commission: CommissionModel,
    pub strategy: StrategyConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestSection {
    pub initial_cash: f64,
    #[serde(default)]
    pub stop_loss_pct: f64,
    #[serde(default = "default_true")]
    pub close_at_end: bool,
    #[serde(default)]
    pub verbose: bool,
    /// Traded instruments, in cash-priority order.
    pub instruments: Vec<String>,
}

fn default_true() -> bool {
    true
}

/// Strategy selection and parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StrategyConfig {
    MaCrossover {
        #[serde(default = "defaults::short_window")]
        short_window: usize,
        #[serde(default = "defaults::long_window")]
        long_window: usize,
    },
    Rsi {
        #[serde(default = "defaults::rsi_period")]
        period: usize,
        #[serde(default = "defaults::overbought")]
        overbought: f64,
        #[serde(default = "defaults::oversold")]
        oversold: f64,
    },
    MeanReversion {
        #[serde(default = "defaults::band_window")]
        window: usize,
        #[serde(default = "defaults::num_std_dev")]
        num_std_dev: f64,
    },
    Pairs {
        #[serde(default = "defaults::pairs_window")]
        window: usize,
        #[serde(default = "defaults::entry_zscore")]
        entry_zscore: f64,
        #[serde(default = "defaults::exit_zscore")]
        exit_zscore: f64,
    },
}

mod defaults {
    pub fn short_window() -> usize {
        50
    }
    pub fn long_window() -> usize {
        200
    }
    pub fn rsi_period() -> usize {
        14
    }
    pub fn overbought() -> f64 {
        70.0
    }
    pub fn oversold() -> f64 {
        30.0
    }
    pub fn band_window() -> usize {
        20
    }
    pub fn num_std_dev() -> f64 {
        2.0
    }
    pub fn pairs_window() -> usize {
        60
    }
    pub fn entry_zscore() -> f64 {
        2.0
    }
    pub fn exit_zscore() -> f64 {
        0.5
    }
}

/// A strategy ready to generate signals.
pub enum BuiltStrategy {
    Single(Box<dyn Strategy>),
    Pair(PairsTrading),
}

impl BuiltStrategy {
    pub fn name(&self) -> &str {
        use tradesim_core::strategy::PairStrategy;
        match self {
            BuiltStrategy::Single(s) => s.name(),
            BuiltStrategy::Pair(p) => p.name(),
        }
    }
}

impl StrategyConfig {
    pub fn name(&self) -> &'static str {
        match self {
            StrategyConfig::MaCrossover { .. } => "ma_crossover",
            StrategyConfig::Rsi { .. } => "rsi",
            StrategyConfig::MeanReversion { .. } => "mean_reversion",
            StrategyConfig::Pairs { .. } => "pairs",
        }
    }

    pub fn is_pair(&self) -> bool {
        matches!(self, StrategyConfig::Pairs { .. })
    }

    /// Instantiate the configured strategy, validating its parameters.
    pub fn build(&self) -> Result<BuiltStrategy, StrategyError> {
        Ok(match *self {
            StrategyConfig::MaCrossover {
                short_window,
                long_window,
            } => BuiltStrategy::Single(Box::new(MaCrossover::new(short_window, long_window)?)),
            StrategyConfig::Rsi {
                period,
                overbought,
                oversold,
            } => BuiltStrategy::Single(Box::new(RsiStrategy::new(period, overbought, oversold)?)),
            StrategyConfig::MeanReversion {
                window,
                num_std_dev,
            } => BuiltStrategy::Single(Box::new(MeanReversion::new(window, num_std_dev)?)),
            StrategyConfig::Pairs {
                window,
                entry_zscore,
                exit_zscore,
            } => BuiltStrategy::Pair(PairsTrading::new(window, entry_zscore, exit_zscore)?),
        })
    }
}

impl BacktestConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: BacktestConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let bt = &self.backtest;
        if !(bt.initial_cash.is_finite() && bt.initial_cash > 0.0) {
            return Err(ConfigError::invalid(
                "backtest.initial_cash",
                format!("must be > 0, got {}", bt.initial_cash),
            ));
        }
        if !(0.0..1.0).contains(&bt.stop_loss_pct) {
            return Err(ConfigError::invalid(
                "backtest.stop_loss_pct",
                format!("must be in [0, 1), got {}", bt.stop_loss_pct),
            ));
        }
        if bt.instruments.is_empty() {
            return Err(ConfigError::invalid("backtest.instruments", "must not be empty"));
        }
        let mut seen = HashSet::new();
        for instrument in &bt.instruments {
            if instrument.trim().is_empty() {
                return Err(ConfigError::invalid("backtest.instruments", "empty instrument name"));
            }
            if !seen.insert(instrument.as_str()) {
                return Err(ConfigError::invalid(
                    "backtest.instruments",
                    format!("'{instrument}' listed twice"),
                ));
            }
        }
        if self.strategy.is_pair() && bt.instruments.len() != 2 {
            return Err(ConfigError::invalid(
                "backtest.instruments",
                format!(
                    "pairs strategy needs exactly 2 instruments, got {}",
                    bt.instruments.len()
                ),
            ));
        }

        self.metrics
            .validate()
            .map_err(|e| ConfigError::invalid("metrics", e.to_string()))?;
        self.sizing
            .validate()
            .map_err(|reason| ConfigError::invalid("sizing", reason))?;
        validate_commission(&self.commission)?;
        self.strategy.build()?;
        Ok(())
    }

    /// Engine settings derived from this config.
    pub fn engine_config(&self) -> EngineConfig {
        let bt = &self.backtest;
        let mut config = EngineConfig::new(bt.initial_cash)
            .with_stop_loss(bt.stop_loss_pct)
            .with_sizing(self.sizing)
            .with_commission(self.commission);
        config.close_at_end = bt.close_at_end;
        config.verbose = bt.verbose;
        if let [first, second] = bt.instruments.as_slice() {
            if self.strategy.is_pair() {
                config = config.with_pair(first.clone(), second.clone());
            }
        }
        config
    }

    /// Deterministic hash of the canonical JSON form of this config.
    ///
    /// Two runs with identical configs share a RunId.
    pub fn run_id(&self) -> Result<RunId, ConfigError> {
        let json = serde_json::to_string(self)?;
        Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
    }
}

fn validate_commission(model: &CommissionModel) -> Result<(), ConfigError> {
    let value = match *model {
        CommissionModel::None => return Ok(()),
        CommissionModel::PerTrade { amount } | CommissionModel::PerUnit { amount } => amount,
        CommissionModel::Percentage { rate } => rate,
    };
    if !(value.is_finite() && value >= 0.0) {
        return Err(ConfigError::invalid(
            "commission",
            format!("must be finite and >= 0, got {value}"),
        ));
    }
    Ok(())
}
