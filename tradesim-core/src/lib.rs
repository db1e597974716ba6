//! TradeSim Core: domain types, portfolio state machine, signal-driven engine.
//!
//! This crate contains the simulation itself:
//! - Domain types (bars, price series, signals, positions, trades, equity points)
//! - Portfolio manager with stop-loss enforcement and commission models
//! - Position sizing rules
//! - Bar-by-bar engine that turns signal series into portfolio mutations
//! - Indicators and the strategy capability (MA crossover, RSI, mean reversion, pairs)

pub mod domain;
pub mod engine;
pub mod indicators;
pub mod portfolio;
pub mod sizers;
pub mod strategy;

pub use domain::{
    Bar, EquityPoint, ExitReason, Position, PriceSeries, PriceSeriesError, Side, Signal,
    SignalAction, SignalSeries, Trade, TradeId,
};
pub use engine::{
    run_backtest, CancelFlag, EngineConfig, EngineError, InstrumentFeed, PairLink,
    RecoveredError, RunResult,
};
pub use portfolio::{CommissionModel, PortfolioError, PortfolioManager, PortfolioState};
pub use sizers::SizingRule;
pub use strategy::{PairSignals, PairStrategy, Strategy, StrategyError};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: everything a batch worker hands across threads is
    /// Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        // Domain types
        require_send::<Bar>();
        require_sync::<Bar>();
        require_send::<PriceSeries>();
        require_sync::<PriceSeries>();
        require_send::<SignalSeries>();
        require_sync::<SignalSeries>();
        require_send::<Position>();
        require_sync::<Position>();
        require_send::<Trade>();
        require_sync::<Trade>();

        // Engine types
        require_send::<EngineConfig>();
        require_sync::<EngineConfig>();
        require_send::<InstrumentFeed>();
        require_sync::<InstrumentFeed>();
        require_send::<CancelFlag>();
        require_sync::<CancelFlag>();
        require_send::<RunResult>();
        require_sync::<RunResult>();
        require_send::<PortfolioManager>();
        require_sync::<PortfolioManager>();

        // Strategies
        require_send::<strategy::MaCrossover>();
        require_sync::<strategy::MaCrossover>();
        require_send::<strategy::RsiStrategy>();
        require_sync::<strategy::RsiStrategy>();
        require_send::<strategy::MeanReversion>();
        require_sync::<strategy::MeanReversion>();
        require_send::<strategy::PairsTrading>();
        require_sync::<strategy::PairsTrading>();
    }

    /// Architecture contract: strategies never see portfolio state.
    ///
    /// `generate_signals` takes only a price series. If someone adds a
    /// portfolio parameter, the trait changes and this breaks.
    #[test]
    fn strategy_trait_has_no_portfolio_parameter() {
        fn _check_trait_object_builds(
            strategy: &dyn Strategy,
            series: &PriceSeries,
        ) -> SignalSeries {
            strategy.generate_signals(series)
        }
    }
}
