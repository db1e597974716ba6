//! Trade: a completed round trip: entry → exit.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::ids::TradeId;
use super::position::Side;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitReason {
    Signal,
    StopLoss,
}

/// Closed trade. Created only by the portfolio when a position closes, never
/// modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    // ── Identification ──
    pub trade_id: TradeId,
    pub instrument: String,
    pub side: Side,

    // ── Entry ──
    pub entry_timestamp: NaiveDateTime,
    pub entry_price: f64,

    // ── Exit ──
    pub exit_timestamp: NaiveDateTime,
    pub exit_price: f64,
    pub exit_reason: ExitReason,

    // ── Size ──
    pub quantity: f64,

    // ── PnL ──
    /// Gross PnL: `(exit - entry) * quantity`, negated for shorts.
    pub realized_pnl: f64,
    /// Entry plus exit commission.
    pub commission: f64,
    pub net_pnl: f64,
}

impl Trade {
    /// Net return as a fraction of entry notional.
    pub fn return_pct(&self) -> f64 {
        if self.entry_price == 0.0 || self.quantity == 0.0 {
            return 0.0;
        }
        self.net_pnl / (self.entry_price * self.quantity)
    }

    pub fn is_winner(&self) -> bool {
        self.realized_pnl > 0.0
    }

    pub fn is_loser(&self) -> bool {
        self.realized_pnl < 0.0
    }
}
