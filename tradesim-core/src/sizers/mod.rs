//! Position sizing: how many whole units an entry buys.
//!
//! Sizers translate cash budgets into quantities. They are portfolio-aware
//! (use available cash and the commission model) but signal-agnostic: long and
//! short entries are sized the same way.

use serde::{Deserialize, Serialize};

use crate::portfolio::PortfolioManager;

/// Sizing rule applied to every entry.
///
/// All variants floor to whole units and are capped by what available cash
/// can afford, commission included. A result of `0.0` means the entry is
/// skipped.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SizingRule {
    /// Spend a fraction of available cash (1.0 = all of it).
    FractionOfCash { fraction: f64 },

    /// Always trade N units.
    FixedQuantity { units: f64 },

    /// Always trade about $X worth.
    FixedNotional { amount: f64 },
}

impl Default for SizingRule {
    fn default() -> Self {
        SizingRule::FractionOfCash { fraction: 1.0 }
    }
}

impl SizingRule {
    pub fn validate(&self) -> Result<(), String> {
        match *self {
            SizingRule::FractionOfCash { fraction } => {
                if !(fraction > 0.0 && fraction <= 1.0) {
                    return Err(format!("sizing fraction must be in (0, 1], got {fraction}"));
                }
            }
            SizingRule::FixedQuantity { units } => {
                if !(units.is_finite() && units >= 1.0) {
                    return Err(format!("fixed quantity must be >= 1, got {units}"));
                }
            }
            SizingRule::FixedNotional { amount } => {
                if !(amount.is_finite() && amount > 0.0) {
                    return Err(format!("fixed notional must be > 0, got {amount}"));
                }
            }
        }
        Ok(())
    }

    /// Quantity to open at `price` given the portfolio's current cash.
    pub fn quantity(&self, portfolio: &PortfolioManager, price: f64) -> f64 {
        match *self {
            SizingRule::FractionOfCash { fraction } => {
                portfolio.affordable_quantity(price, portfolio.cash() * fraction)
            }
            SizingRule::FixedQuantity { units } => units
                .floor()
                .min(portfolio.affordable_quantity(price, f64::INFINITY)),
            SizingRule::FixedNotional { amount } => portfolio.affordable_quantity(price, amount),
        }
    }

    /// Per-leg cash budget when `legs` positions are entered together.
    ///
    /// Only the cash-proportional rule is split; fixed rules size every leg
    /// on its own and return `None`.
    pub fn split_budget(&self, portfolio: &PortfolioManager, legs: usize) -> Option<f64> {
        match *self {
            SizingRule::FractionOfCash { fraction } => {
                Some(portfolio.cash() * fraction / legs.max(1) as f64)
            }
            SizingRule::FixedQuantity { .. } | SizingRule::FixedNotional { .. } => None,
        }
    }

    /// Short name for logs and reports.
    pub fn name(&self) -> &'static str {
        match self {
            SizingRule::FractionOfCash { .. } => "fraction_of_cash",
            SizingRule::FixedQuantity { .. } => "fixed_quantity",
            SizingRule::FixedNotional { .. } => "fixed_notional",
        }
    }
}
