//! Domain types for tradesim

pub mod bar;
pub mod equity;
pub mod ids;
pub mod position;
pub mod signal;
pub mod trade;

pub use bar::{Bar, PriceSeries, PriceSeriesError};
pub use equity::{equity_values, EquityPoint};
pub use ids::{IdGen, TradeId};
pub use position::{stop_loss_price, Position, Side};
pub use signal::{Signal, SignalAction, SignalSeries};
pub use trade::{ExitReason, Trade};
