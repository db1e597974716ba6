//! Position: an open holding in one instrument.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::bar::Bar;
use super::ids::TradeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    pub fn opposite(self) -> Self {
        match self {
            Side::Long => Side::Short,
            Side::Short => Side::Long,
        }
    }

    /// +1 for long, -1 for short.
    pub fn sign(self) -> f64 {
        match self {
            Side::Long => 1.0,
            Side::Short => -1.0,
        }
    }
}

/// Open position. Quantity is always positive; direction lives in `side`.
///
/// Both sides tie up `quantity * entry_price` of cash as cost basis. For a
/// short this is collateral, so the market value is cost basis plus the
/// (inverted) unrealized PnL. A short can lose at most its collateral: its
/// value floors at zero, reached at [`Position::liquidation_price`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub trade_id: TradeId,
    pub instrument: String,
    pub side: Side,
    pub quantity: f64,
    pub entry_price: f64,
    pub entry_timestamp: NaiveDateTime,
    /// Commission paid on entry, carried into the closed trade.
    pub entry_commission: f64,
    /// `None` when stop-loss checking is disabled.
    pub stop_loss_price: Option<f64>,
}

impl Position {
    pub fn cost_basis(&self) -> f64 {
        self.quantity * self.entry_price
    }

    pub fn unrealized_pnl(&self, current_price: f64) -> f64 {
        self.side.sign() * (current_price - self.entry_price) * self.quantity
    }

    pub fn market_value(&self, current_price: f64) -> f64 {
        (self.cost_basis() + self.unrealized_pnl(current_price)).max(0.0)
    }

    /// Price at which a short has lost its whole collateral. Longs never
    /// need one.
    pub fn liquidation_price(&self) -> Option<f64> {
        match self.side {
            Side::Long => None,
            Side::Short => Some(2.0 * self.entry_price),
        }
    }

    /// Fill price of a forced exit on `bar`, if it traded through the stop
    /// or (for shorts) the liquidation price. The nearer level wins.
    pub fn forced_exit_price(&self, bar: &Bar) -> Option<f64> {
        match self.side {
            Side::Long => self.stop_loss_price.filter(|&stop| bar.low <= stop),
            Side::Short => {
                let level = match (self.stop_loss_price, self.liquidation_price()) {
                    (Some(stop), Some(liq)) => stop.min(liq),
                    (stop, liq) => stop.or(liq)?,
                };
                (bar.high >= level).then_some(level)
            }
        }
    }

    /// Whether `bar` forces this position out: low for longs, high for shorts.
    pub fn stop_breached(&self, bar: &Bar) -> bool {
        self.forced_exit_price(bar).is_some()
    }
}

/// Stop price for a position entered at `price`; `pct == 0` disables the stop.
pub fn stop_loss_price(side: Side, price: f64, pct: f64) -> Option<f64> {
    if pct <= 0.0 {
        return None;
    }
    Some(match side {
        Side::Long => price * (1.0 - pct),
        Side::Short => price * (1.0 + pct),
    })
}
