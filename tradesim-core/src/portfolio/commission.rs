//! Commission models.
//!
//! Commission is charged per side: once on entry, once on exit.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CommissionModel {
    /// Frictionless.
    #[default]
    None,

    /// Flat amount per fill.
    PerTrade { amount: f64 },

    /// Amount per unit traded.
    PerUnit { amount: f64 },

    /// Fraction of fill notional (0.001 = 10 bps).
    Percentage { rate: f64 },
}

impl CommissionModel {
    pub fn compute(&self, price: f64, quantity: f64) -> f64 {
        match *self {
            CommissionModel::None => 0.0,
            CommissionModel::PerTrade { amount } => amount,
            CommissionModel::PerUnit { amount } => amount * quantity,
            CommissionModel::Percentage { rate } => price * quantity * rate,
        }
    }

    /// Largest whole quantity whose notional plus commission fits in `budget`.
    pub fn max_affordable_quantity(&self, price: f64, budget: f64) -> f64 {
        if !(price > 0.0) || !(budget > 0.0) {
            return 0.0;
        }
        let estimate = match *self {
            CommissionModel::None => budget / price,
            CommissionModel::PerTrade { amount } => (budget - amount) / price,
            CommissionModel::PerUnit { amount } => budget / (price + amount),
            CommissionModel::Percentage { rate } => budget / (price * (1.0 + rate)),
        };
        let mut quantity = estimate.max(0.0).floor();

        // Float rounding in the estimate can overshoot by a unit.
        while quantity > 0.0 && quantity * price + self.compute(price, quantity) > budget {
            quantity -= 1.0;
        }
        quantity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_is_free() {
        let model = CommissionModel::None;
        assert_eq!(model.compute(100.0, 50.0), 0.0);
        assert_eq!(model.max_affordable_quantity(100.0, 100_000.0), 1_000.0);
    }

    #[test]
    fn per_trade_reduces_affordable_quantity() {
        let model = CommissionModel::PerTrade { amount: 5.0 };
        assert_eq!(model.compute(100.0, 50.0), 5.0);
        // (1000 - 5) / 100 = 9.95 -> 9
        assert_eq!(model.max_affordable_quantity(100.0, 1_000.0), 9.0);
    }

    #[test]
    fn per_unit_scales_with_quantity() {
        let model = CommissionModel::PerUnit { amount: 0.01 };
        assert!((model.compute(100.0, 200.0) - 2.0).abs() < 1e-12);
        // 10000 / 100.01 = 99.99 -> 99
        assert_eq!(model.max_affordable_quantity(100.0, 10_000.0), 99.0);
    }

    #[test]
    fn percentage_of_notional() {
        let model = CommissionModel::Percentage { rate: 0.001 };
        assert!((model.compute(100.0, 100.0) - 10.0).abs() < 1e-12);
        let qty = model.max_affordable_quantity(100.0, 10_000.0);
        assert_eq!(qty, 99.0);
        assert!(qty * 100.0 + model.compute(100.0, qty) <= 10_000.0);
    }

    #[test]
    fn nothing_affordable_with_no_budget() {
        let model = CommissionModel::PerTrade { amount: 10.0 };
        assert_eq!(model.max_affordable_quantity(100.0, 5.0), 0.0);
        assert_eq!(model.max_affordable_quantity(100.0, 0.0), 0.0);
        assert_eq!(model.max_affordable_quantity(0.0, 100.0), 0.0);
    }

    #[test]
    fn deserializes_tagged() {
        let model: CommissionModel =
            serde_json::from_str(r#"{"type":"per_trade","amount":1.5}"#).unwrap();
        assert_eq!(model, CommissionModel::PerTrade { amount: 1.5 });
    }
}
