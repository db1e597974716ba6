//! Portfolio manager: cash, open positions, closed trades, equity curve.
//!
//! Every mutation keeps the ledger identity
//! `cash + Σ open cost basis == initial_cash + Σ realized_pnl − Σ commission`,
//! so no capital is created or destroyed by bookkeeping. Total equity is
//! `cash + Σ position market values`.

pub mod commission;

pub use commission::CommissionModel;

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{
    stop_loss_price, Bar, EquityPoint, ExitReason, IdGen, Position, Side, Trade, TradeId,
};

/// Tolerance for float dust when comparing costs against cash.
const CASH_EPSILON: f64 = 1e-9;

/// Portfolio-level anomalies. The engine recovers from all of them.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PortfolioError {
    #[error("insufficient cash for '{instrument}': need {required:.2}, have {available:.2}")]
    InsufficientCash {
        instrument: String,
        required: f64,
        available: f64,
    },

    #[error("position already open for '{instrument}'")]
    DuplicatePosition { instrument: String },

    #[error("no open position for '{instrument}'")]
    NoOpenPosition { instrument: String },

    #[error("invalid quantity {quantity} for '{instrument}'")]
    InvalidQuantity { instrument: String, quantity: f64 },

    #[error("invalid price {price} for '{instrument}'")]
    InvalidPrice { instrument: String, price: f64 },
}

/// Snapshot of everything the portfolio owns, handed back at the end of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioState {
    pub initial_cash: f64,
    pub cash: f64,
    pub positions: BTreeMap<String, Position>,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
    pub total_commission: f64,
}

#[derive(Debug, Clone)]
pub struct PortfolioManager {
    initial_cash: f64,
    cash: f64,
    stop_loss_pct: f64,
    commission: CommissionModel,
    positions: BTreeMap<String, Position>,
    trades: Vec<Trade>,
    equity_curve: Vec<EquityPoint>,
    id_gen: IdGen,
    total_commission: f64,
}

impl PortfolioManager {
    pub fn new(initial_cash: f64, stop_loss_pct: f64, commission: CommissionModel) -> Self {
        Self {
            initial_cash,
            cash: initial_cash,
            stop_loss_pct: stop_loss_pct.max(0.0),
            commission,
            positions: BTreeMap::new(),
            trades: Vec::new(),
            equity_curve: Vec::new(),
            id_gen: IdGen::default(),
            total_commission: 0.0,
        }
    }

    /// Frictionless portfolio with stop-loss disabled.
    pub fn with_cash(initial_cash: f64) -> Self {
        Self::new(initial_cash, 0.0, CommissionModel::None)
    }

    // ── Queries ──

    pub fn initial_cash(&self) -> f64 {
        self.initial_cash
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn stop_loss_pct(&self) -> f64 {
        self.stop_loss_pct
    }

    pub fn commission_model(&self) -> CommissionModel {
        self.commission
    }

    pub fn position(&self, instrument: &str) -> Option<&Position> {
        self.positions.get(instrument)
    }

    pub fn has_position(&self, instrument: &str) -> bool {
        self.positions.contains_key(instrument)
    }

    /// Open positions in instrument order.
    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn equity_curve(&self) -> &[EquityPoint] {
        &self.equity_curve
    }

    pub fn total_commission(&self) -> f64 {
        self.total_commission
    }

    /// Sum of gross realized PnL over closed trades.
    pub fn realized_pnl(&self) -> f64 {
        self.trades.iter().map(|t| t.realized_pnl).sum()
    }

    /// Cash tied up in open positions at entry prices.
    pub fn open_cost_basis(&self) -> f64 {
        self.positions.values().map(Position::cost_basis).sum()
    }

    /// Market value of open positions. Instruments missing from `prices` are
    /// valued at their entry price.
    pub fn positions_market_value(&self, prices: &HashMap<String, f64>) -> f64 {
        self.positions
            .values()
            .map(|pos| {
                let price = prices
                    .get(&pos.instrument)
                    .copied()
                    .unwrap_or(pos.entry_price);
                pos.market_value(price)
            })
            .sum()
    }

    pub fn unrealized_pnl(&self, prices: &HashMap<String, f64>) -> f64 {
        self.positions
            .values()
            .map(|pos| {
                let price = prices
                    .get(&pos.instrument)
                    .copied()
                    .unwrap_or(pos.entry_price);
                pos.unrealized_pnl(price)
            })
            .sum()
    }

    /// Total equity = cash + sum of all position market values.
    pub fn equity(&self, prices: &HashMap<String, f64>) -> f64 {
        self.cash + self.positions_market_value(prices)
    }

    /// Deviation from the ledger identity; zero up to float error.
    pub fn ledger_imbalance(&self) -> f64 {
        (self.cash + self.open_cost_basis())
            - (self.initial_cash + self.realized_pnl() - self.total_commission)
    }

    /// Largest whole quantity purchasable at `price` with at most `budget`
    /// (capped at available cash), commission included.
    pub fn affordable_quantity(&self, price: f64, budget: f64) -> f64 {
        self.commission
            .max_affordable_quantity(price, budget.min(self.cash))
    }

    // ── Mutations ──

    /// Open a new position with a fresh trade id.
    pub fn open_position(
        &mut self,
        instrument: &str,
        side: Side,
        price: f64,
        timestamp: NaiveDateTime,
        quantity: f64,
    ) -> Result<TradeId, PortfolioError> {
        self.open_inner(instrument, side, price, timestamp, quantity, None)
    }

    /// Open a position that shares `trade_id` with an existing leg.
    pub fn open_linked_position(
        &mut self,
        instrument: &str,
        side: Side,
        price: f64,
        timestamp: NaiveDateTime,
        quantity: f64,
        trade_id: TradeId,
    ) -> Result<TradeId, PortfolioError> {
        self.open_inner(instrument, side, price, timestamp, quantity, Some(trade_id))
    }

    fn open_inner(
        &mut self,
        instrument: &str,
        side: Side,
        price: f64,
        timestamp: NaiveDateTime,
        quantity: f64,
        link: Option<TradeId>,
    ) -> Result<TradeId, PortfolioError> {
        if self.positions.contains_key(instrument) {
            return Err(PortfolioError::DuplicatePosition {
                instrument: instrument.to_string(),
            });
        }
        if !(quantity.is_finite() && quantity > 0.0) {
            return Err(PortfolioError::InvalidQuantity {
                instrument: instrument.to_string(),
                quantity,
            });
        }
        if !(price.is_finite() && price > 0.0) {
            return Err(PortfolioError::InvalidPrice {
                instrument: instrument.to_string(),
                price,
            });
        }

        let commission = self.commission.compute(price, quantity);
        let required = quantity * price + commission;
        if required > self.cash + CASH_EPSILON {
            return Err(PortfolioError::InsufficientCash {
                instrument: instrument.to_string(),
                required,
                available: self.cash,
            });
        }

        self.cash -= required;
        if self.cash < 0.0 {
            self.cash = 0.0;
        }
        self.total_commission += commission;

        let trade_id = link.unwrap_or_else(|| self.id_gen.next_trade_id());
        self.positions.insert(
            instrument.to_string(),
            Position {
                trade_id,
                instrument: instrument.to_string(),
                side,
                quantity,
                entry_price: price,
                entry_timestamp: timestamp,
                entry_commission: commission,
                stop_loss_price: stop_loss_price(side, price, self.stop_loss_pct),
            },
        );

        self.debug_check_ledger();
        Ok(trade_id)
    }

    /// Close the open position in `instrument` at `price`.
    ///
    /// Cash receives the position's cost basis plus its gross PnL, minus the
    /// exit commission. For a long this is `quantity * price − commission`.
    /// The loss is capped at the cost basis and the commission at the
    /// proceeds, so a close never takes cash below zero.
    pub fn close_position(
        &mut self,
        instrument: &str,
        price: f64,
        timestamp: NaiveDateTime,
        reason: ExitReason,
    ) -> Result<Trade, PortfolioError> {
        if !(price.is_finite() && price > 0.0) {
            return Err(PortfolioError::InvalidPrice {
                instrument: instrument.to_string(),
                price,
            });
        }
        let pos = self
            .positions
            .remove(instrument)
            .ok_or_else(|| PortfolioError::NoOpenPosition {
                instrument: instrument.to_string(),
            })?;

        let realized_pnl = pos.unrealized_pnl(price).max(-pos.cost_basis());
        let proceeds = pos.cost_basis() + realized_pnl;
        let exit_commission = self.commission.compute(price, pos.quantity).min(proceeds);
        self.cash += proceeds - exit_commission;
        if self.cash < 0.0 && self.cash > -CASH_EPSILON {
            self.cash = 0.0;
        }
        self.total_commission += exit_commission;

        let commission = pos.entry_commission + exit_commission;
        let trade = Trade {
            trade_id: pos.trade_id,
            instrument: pos.instrument,
            side: pos.side,
            entry_timestamp: pos.entry_timestamp,
            entry_price: pos.entry_price,
            exit_timestamp: timestamp,
            exit_price: price,
            exit_reason: reason,
            quantity: pos.quantity,
            realized_pnl,
            commission,
            net_pnl: realized_pnl - commission,
        };
        self.trades.push(trade.clone());

        self.debug_check_ledger();
        Ok(trade)
    }

    /// Close the position at its stop price if `bar` traded through it.
    /// Shorts are also closed at their liquidation price once the bar's
    /// high reaches it.
    ///
    /// Returns the resulting trade, or `None` when nothing is open or the bar
    /// stayed on the safe side of both levels.
    pub fn check_stop_loss(&mut self, instrument: &str, bar: &Bar) -> Option<Trade> {
        let stop = self.positions.get(instrument)?.forced_exit_price(bar)?;
        self.close_position(instrument, stop, bar.timestamp, ExitReason::StopLoss)
            .ok()
    }

    /// Append one equity point valued at `prices`.
    pub fn mark_to_market(
        &mut self,
        prices: &HashMap<String, f64>,
        timestamp: NaiveDateTime,
    ) -> EquityPoint {
        let positions_market_value = self.positions_market_value(prices);
        let point = EquityPoint {
            timestamp,
            cash: self.cash,
            positions_market_value,
            total_equity: self.cash + positions_market_value,
        };
        self.equity_curve.push(point);
        point
    }

    /// Force-close every open position, in instrument order, reason SIGNAL.
    ///
    /// Positions without a supplied price close at their entry price.
    pub fn close_all(
        &mut self,
        prices: &HashMap<String, f64>,
        timestamp: NaiveDateTime,
    ) -> Vec<Trade> {
        let open: Vec<(String, f64)> = self
            .positions
            .values()
            .map(|pos| {
                let price = prices
                    .get(&pos.instrument)
                    .copied()
                    .unwrap_or(pos.entry_price);
                (pos.instrument.clone(), price)
            })
            .collect();

        open.into_iter()
            .filter_map(|(instrument, price)| {
                self.close_position(&instrument, price, timestamp, ExitReason::Signal)
                    .ok()
            })
            .collect()
    }

    pub fn into_parts(self) -> PortfolioState {
        PortfolioState {
            initial_cash: self.initial_cash,
            cash: self.cash,
            positions: self.positions,
            trades: self.trades,
            equity_curve: self.equity_curve,
            total_commission: self.total_commission,
        }
    }

    fn debug_check_ledger(&self) {
        #[cfg(debug_assertions)]
        {
            let tolerance = 1e-6 * self.initial_cash.abs().max(1.0);
            let imbalance = self.ledger_imbalance();
            assert!(
                imbalance.abs() < tolerance,
                "ledger identity violated: imbalance={imbalance}, cash={}",
                self.cash
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn bar(day: u32, low: f64, high: f64, close: f64) -> Bar {
        Bar {
            timestamp: ts(day),
            open: close,
            high,
            low,
            close,
            volume: 1_000.0,
        }
    }

    fn prices(pairs: &[(&str, f64)]) -> HashMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn open_debits_cash_and_creates_position() {
        let mut pm = PortfolioManager::with_cash(100_000.0);
        let id = pm
            .open_position("SPY", Side::Long, 100.0, ts(2), 1_000.0)
            .unwrap();
        assert_eq!(id, TradeId(1));
        assert_eq!(pm.cash(), 0.0);
        let pos = pm.position("SPY").unwrap();
        assert_eq!(pos.quantity, 1_000.0);
        assert_eq!(pos.stop_loss_price, None);
    }

    #[test]
    fn open_rejects_insufficient_cash() {
        let mut pm = PortfolioManager::with_cash(1_000.0);
        let err = pm
            .open_position("SPY", Side::Long, 100.0, ts(2), 11.0)
            .unwrap_err();
        assert!(matches!(err, PortfolioError::InsufficientCash { .. }));
        assert_eq!(pm.cash(), 1_000.0);
        assert!(!pm.has_position("SPY"));
    }

    #[test]
    fn commission_counts_toward_required_cash() {
        let mut pm = PortfolioManager::new(1_000.0, 0.0, CommissionModel::PerTrade { amount: 1.0 });
        let err = pm
            .open_position("SPY", Side::Long, 100.0, ts(2), 10.0)
            .unwrap_err();
        match err {
            PortfolioError::InsufficientCash { required, .. } => assert_eq!(required, 1_001.0),
            other => panic!("unexpected {other}"),
        }
    }

    #[test]
    fn open_rejects_duplicate() {
        let mut pm = PortfolioManager::with_cash(100_000.0);
        pm.open_position("SPY", Side::Long, 100.0, ts(2), 10.0)
            .unwrap();
        let err = pm
            .open_position("SPY", Side::Short, 100.0, ts(3), 10.0)
            .unwrap_err();
        assert_eq!(
            err,
            PortfolioError::DuplicatePosition {
                instrument: "SPY".into()
            }
        );
    }

    #[test]
    fn open_rejects_zero_quantity() {
        let mut pm = PortfolioManager::with_cash(100_000.0);
        let err = pm
            .open_position("SPY", Side::Long, 100.0, ts(2), 0.0)
            .unwrap_err();
        assert!(matches!(err, PortfolioError::InvalidQuantity { .. }));
    }

    #[test]
    fn stop_price_recorded_from_pct() {
        let mut pm = PortfolioManager::new(100_000.0, 0.1, CommissionModel::None);
        pm.open_position("SPY", Side::Long, 100.0, ts(2), 10.0)
            .unwrap();
        pm.open_position("QQQ", Side::Short, 200.0, ts(2), 10.0)
            .unwrap();
        assert_eq!(pm.position("SPY").unwrap().stop_loss_price, Some(90.0));
        let short_stop = pm.position("QQQ").unwrap().stop_loss_price.unwrap();
        assert!((short_stop - 220.0).abs() < 1e-9);
    }

    #[test]
    fn close_long_realizes_pnl() {
        let mut pm = PortfolioManager::with_cash(100_000.0);
        pm.open_position("SPY", Side::Long, 100.0, ts(2), 1_000.0)
            .unwrap();
        let trade = pm
            .close_position("SPY", 90.0, ts(4), ExitReason::Signal)
            .unwrap();
        assert_eq!(trade.realized_pnl, -10_000.0);
        assert_eq!(trade.exit_reason, ExitReason::Signal);
        assert_eq!(pm.cash(), 90_000.0);
        assert!(!pm.has_position("SPY"));
        assert_eq!(pm.trades().len(), 1);
    }

    #[test]
    fn close_short_realizes_negated_pnl() {
        let mut pm = PortfolioManager::with_cash(10_000.0);
        pm.open_position("SPY", Side::Short, 100.0, ts(2), 50.0)
            .unwrap();
        assert_eq!(pm.cash(), 5_000.0);
        let trade = pm
            .close_position("SPY", 90.0, ts(3), ExitReason::Signal)
            .unwrap();
        assert_eq!(trade.realized_pnl, 500.0);
        // collateral 5000 returned plus 500 gain
        assert_eq!(pm.cash(), 10_500.0);
    }

    #[test]
    fn short_loss_is_capped_at_collateral() {
        let mut pm = PortfolioManager::with_cash(100_000.0);
        pm.open_position("SPY", Side::Short, 100.0, ts(2), 1_000.0)
            .unwrap();
        let trade = pm
            .close_position("SPY", 250.0, ts(3), ExitReason::Signal)
            .unwrap();
        assert_eq!(trade.realized_pnl, -100_000.0);
        assert_eq!(pm.cash(), 0.0);
        assert!(pm.ledger_imbalance().abs() < 1e-6);
    }

    #[test]
    fn exit_fee_is_capped_at_proceeds() {
        let mut pm = PortfolioManager::new(100.0, 0.0, CommissionModel::PerTrade { amount: 5.0 });
        pm.open_position("PENNY", Side::Long, 1.0, ts(2), 95.0).unwrap();
        assert_eq!(pm.cash(), 0.0);
        let trade = pm
            .close_position("PENNY", 0.02, ts(3), ExitReason::Signal)
            .unwrap();
        // 95 * 0.02 = 1.90 of proceeds, all of it taken by the fee
        assert!((trade.commission - 6.9).abs() < 1e-9);
        assert!(pm.cash() >= 0.0);
        assert!(pm.ledger_imbalance().abs() < 1e-6);
    }

    #[test]
    fn short_liquidated_when_collateral_is_gone() {
        let mut pm = PortfolioManager::with_cash(10_000.0);
        pm.open_position("SPY", Side::Short, 100.0, ts(2), 100.0)
            .unwrap();
        assert!(pm.check_stop_loss("SPY", &bar(3, 140.0, 190.0, 150.0)).is_none());
        let trade = pm.check_stop_loss("SPY", &bar(4, 240.0, 260.0, 250.0)).unwrap();
        assert_eq!(trade.exit_reason, ExitReason::StopLoss);
        assert_eq!(trade.exit_price, 200.0);
        assert_eq!(trade.realized_pnl, -10_000.0);
        assert_eq!(pm.cash(), 0.0);
    }

    #[test]
    fn close_without_position_fails() {
        let mut pm = PortfolioManager::with_cash(100_000.0);
        let err = pm
            .close_position("SPY", 100.0, ts(2), ExitReason::Signal)
            .unwrap_err();
        assert!(matches!(err, PortfolioError::NoOpenPosition { .. }));
    }

    #[test]
    fn commissions_flow_into_trade() {
        let mut pm = PortfolioManager::new(10_000.0, 0.0, CommissionModel::PerTrade { amount: 2.0 });
        pm.open_position("SPY", Side::Long, 100.0, ts(2), 10.0)
            .unwrap();
        assert_eq!(pm.cash(), 10_000.0 - 1_002.0);
        let trade = pm
            .close_position("SPY", 110.0, ts(3), ExitReason::Signal)
            .unwrap();
        assert_eq!(trade.realized_pnl, 100.0);
        assert_eq!(trade.commission, 4.0);
        assert_eq!(trade.net_pnl, 96.0);
        assert!((pm.cash() - 10_096.0).abs() < 1e-9);
        assert_eq!(pm.total_commission(), 4.0);
    }

    #[test]
    fn stop_loss_closes_at_stop_price() {
        let mut pm = PortfolioManager::new(100_000.0, 0.1, CommissionModel::None);
        pm.open_position("SPY", Side::Long, 100.0, ts(2), 1_000.0)
            .unwrap();
        let trade = pm.check_stop_loss("SPY", &bar(3, 85.0, 112.0, 110.0)).unwrap();
        assert_eq!(trade.exit_reason, ExitReason::StopLoss);
        assert_eq!(trade.exit_price, 90.0);
        assert_eq!(trade.realized_pnl, -10_000.0);
        assert_eq!(pm.cash(), 90_000.0);
    }

    #[test]
    fn stop_loss_short_uses_high() {
        let mut pm = PortfolioManager::new(100_000.0, 0.05, CommissionModel::None);
        pm.open_position("SPY", Side::Short, 100.0, ts(2), 100.0)
            .unwrap();
        assert!(pm.check_stop_loss("SPY", &bar(3, 95.0, 104.0, 100.0)).is_none());
        let trade = pm.check_stop_loss("SPY", &bar(4, 99.0, 106.0, 101.0)).unwrap();
        assert!((trade.exit_price - 105.0).abs() < 1e-9);
        assert!((trade.realized_pnl + 500.0).abs() < 1e-9);
    }

    #[test]
    fn stop_loss_noop_without_position_or_breach() {
        let mut pm = PortfolioManager::new(100_000.0, 0.1, CommissionModel::None);
        assert!(pm.check_stop_loss("SPY", &bar(2, 1.0, 200.0, 100.0)).is_none());
        pm.open_position("SPY", Side::Long, 100.0, ts(2), 10.0)
            .unwrap();
        assert!(pm.check_stop_loss("SPY", &bar(3, 90.5, 101.0, 100.0)).is_none());
        assert!(pm.has_position("SPY"));
    }

    #[test]
    fn mark_to_market_appends_point() {
        let mut pm = PortfolioManager::with_cash(100_000.0);
        pm.open_position("SPY", Side::Long, 100.0, ts(2), 1_000.0)
            .unwrap();
        let point = pm.mark_to_market(&prices(&[("SPY", 110.0)]), ts(3));
        assert_eq!(point.cash, 0.0);
        assert_eq!(point.positions_market_value, 110_000.0);
        assert_eq!(point.total_equity, 110_000.0);

        let again = pm.mark_to_market(&prices(&[("SPY", 110.0)]), ts(3));
        assert_eq!(point, again);
        assert_eq!(pm.equity_curve().len(), 2);
    }

    #[test]
    fn missing_price_values_at_entry() {
        let mut pm = PortfolioManager::with_cash(100_000.0);
        pm.open_position("SPY", Side::Long, 100.0, ts(2), 100.0)
            .unwrap();
        assert_eq!(pm.equity(&HashMap::new()), 100_000.0);
    }

    #[test]
    fn close_all_realizes_everything_in_order() {
        let mut pm = PortfolioManager::with_cash(100_000.0);
        pm.open_position("QQQ", Side::Long, 50.0, ts(2), 100.0)
            .unwrap();
        pm.open_position("AAPL", Side::Short, 20.0, ts(2), 100.0)
            .unwrap();
        let trades = pm.close_all(&prices(&[("QQQ", 55.0), ("AAPL", 18.0)]), ts(5));
        let names: Vec<_> = trades.iter().map(|t| t.instrument.as_str()).collect();
        assert_eq!(names, vec!["AAPL", "QQQ"]);
        assert!(pm.positions().next().is_none());
        // +500 on QQQ, +200 on AAPL short
        assert!((pm.cash() - 100_700.0).abs() < 1e-9);
    }

    #[test]
    fn linked_positions_share_trade_id() {
        let mut pm = PortfolioManager::with_cash(100_000.0);
        let id = pm
            .open_position("KO", Side::Short, 50.0, ts(2), 100.0)
            .unwrap();
        let linked = pm
            .open_linked_position("PEP", Side::Long, 150.0, ts(2), 100.0, id)
            .unwrap();
        assert_eq!(id, linked);
        let next = pm
            .open_position("SPY", Side::Long, 10.0, ts(2), 1.0)
            .unwrap();
        assert_eq!(next, TradeId(2));
    }

    #[test]
    fn ledger_identity_holds_after_round_trips() {
        let mut pm = PortfolioManager::new(50_000.0, 0.0, CommissionModel::Percentage { rate: 0.001 });
        pm.open_position("A", Side::Long, 10.0, ts(2), 1_000.0).unwrap();
        pm.open_position("B", Side::Short, 20.0, ts(2), 500.0).unwrap();
        pm.close_position("A", 12.0, ts(3), ExitReason::Signal).unwrap();
        assert!(pm.ledger_imbalance().abs() < 1e-6);

        let prices = prices(&[("B", 18.0)]);
        let expected = pm.initial_cash() + pm.realized_pnl() + pm.unrealized_pnl(&prices)
            - pm.total_commission();
        assert!((pm.equity(&prices) - expected).abs() < 1e-6);
    }

    #[test]
    fn affordable_quantity_respects_cash() {
        let pm = PortfolioManager::with_cash(1_050.0);
        assert_eq!(pm.affordable_quantity(100.0, f64::INFINITY), 10.0);
        assert_eq!(pm.affordable_quantity(100.0, 500.0), 5.0);
    }
}
