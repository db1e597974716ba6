use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier shared by a position and the trade it becomes when closed.
///
/// Linked positions (the two legs of a pair) carry the same id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TradeId(pub u64);

impl fmt::Display for TradeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

/// Monotonic id generator. Deterministic: the n-th id of a run is always `n`.
#[derive(Debug, Clone, Default)]
pub struct IdGen {
    next: u64,
}

impl IdGen {
    pub fn next_trade_id(&mut self) -> TradeId {
        self.next += 1;
        TradeId(self.next)
    }
}
