//! Bar-by-bar event loop: the heart of the backtesting engine.

use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::NaiveDateTime;
use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::{Bar, ExitReason, PriceSeriesError, Side, SignalAction, TradeId};
use crate::portfolio::{PortfolioError, PortfolioManager};

use super::state::{CancelFlag, EngineConfig, InstrumentFeed, RecoveredError, RunResult};

/// Fatal engine errors. The run produces no result.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("invalid engine config: {0}")]
    InvalidConfig(String),

    #[error("invalid price series: {0}")]
    InvalidPriceSeries(#[from] PriceSeriesError),

    #[error("signals for '{instrument}' are not aligned with its bars: {reason}")]
    MisalignedSignals { instrument: String, reason: String },

    #[error("instrument '{0}' appears more than once")]
    DuplicateInstrument(String),

    #[error("no instrument feeds supplied")]
    NoFeeds,

    #[error("pair references unknown or repeated instrument '{0}'")]
    UnknownPairInstrument(String),

    #[error("backtest cancelled")]
    Cancelled,
}

/// Run a backtest over `feeds` in their declared order.
///
/// Earlier feeds get first claim on cash when several instruments enter on
/// the same timestamp. `cancel` is polled before each timestamp.
pub fn run_backtest(
    feeds: &[InstrumentFeed],
    config: &EngineConfig,
    cancel: Option<&CancelFlag>,
) -> Result<RunResult, EngineError> {
    config.validate()?;
    let partners = validate_feeds(feeds, config)?;

    let timeline: Vec<NaiveDateTime> = feeds
        .iter()
        .flat_map(|f| f.series().timestamps())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let mut pm = PortfolioManager::new(config.initial_cash, config.stop_loss_pct, config.commission);
    let mut cursors = vec![0usize; feeds.len()];
    let mut last_close: HashMap<String, f64> = HashMap::new();
    let mut recovered: Vec<RecoveredError> = Vec::new();
    let mut opened_now: HashMap<&str, TradeId> = HashMap::new();
    // Cash set aside for a pair leg whose partner entered earlier this bar.
    let mut reserved: HashMap<&str, f64> = HashMap::new();

    for (k, &t) in timeline.iter().enumerate() {
        if cancel.is_some_and(CancelFlag::is_cancelled) {
            if config.verbose {
                debug!(timestamp = %t, "backtest cancelled");
            }
            return Err(EngineError::Cancelled);
        }
        opened_now.clear();
        reserved.clear();
        let entering = entering_at(feeds, &cursors, t);
        let mut processed: HashSet<&str> = HashSet::new();

        for (feed, cursor) in feeds.iter().zip(cursors.iter_mut()) {
            let bars = feed.series().bars();
            let Some(bar) = bars.get(*cursor).filter(|b| b.timestamp == t) else {
                continue;
            };
            let action = feed.signals().signals[*cursor].action;
            *cursor += 1;

            let instrument = feed.instrument();
            processed.insert(instrument);
            last_close.insert(instrument.to_string(), bar.close);

            // ── Stop-loss takes precedence over the bar's signal ──
            if let Some(trade) = pm.check_stop_loss(instrument, bar) {
                if config.verbose {
                    debug!(
                        instrument,
                        timestamp = %t,
                        price = trade.exit_price,
                        pnl = trade.realized_pnl,
                        "stop-loss hit"
                    );
                }
                continue;
            }

            let mut step = BarStep {
                pm: &mut pm,
                config,
                instrument,
                bar,
                recovered: &mut recovered,
            };
            match action {
                SignalAction::Hold => {}
                SignalAction::Exit => step.exit(),
                SignalAction::EnterLong | SignalAction::EnterShort => {
                    let side = if action == SignalAction::EnterLong {
                        Side::Long
                    } else {
                        Side::Short
                    };
                    let partner = partners
                        .get(instrument)
                        .copied()
                        .filter(|p| entering.contains(p));
                    let leg = match partner {
                        None => LegSizing::Single,
                        Some(p) => match opened_now.get(p) {
                            Some(&id) => LegSizing::Trailing {
                                link: id,
                                budget: reserved.remove(instrument),
                            },
                            // Leading leg failed to open; stay flat to stay hedged.
                            None if processed.contains(p) && !step.pm.has_position(p) => {
                                if config.verbose {
                                    debug!(
                                        instrument,
                                        partner = p,
                                        timestamp = %t,
                                        "skipped pair leg without partner"
                                    );
                                }
                                continue;
                            }
                            None => LegSizing::Leading { legs: 2 },
                        },
                    };
                    match step.enter(side, leg) {
                        Some((id, budget)) => {
                            opened_now.insert(instrument, id);
                            if let (Some(p), Some(b)) = (partner, budget) {
                                reserved.insert(p, b);
                            }
                        }
                        None => {
                            let trailing = matches!(leg, LegSizing::Trailing { .. });
                            if let Some(p) = partner.filter(|_| trailing) {
                                if !step.pm.has_position(instrument) {
                                    step.unwind(p, &last_close);
                                    opened_now.remove(p);
                                }
                            }
                        }
                    }
                }
            }
        }

        // ── End of window ──
        if k + 1 == timeline.len() && config.close_at_end {
            for trade in pm.close_all(&last_close, t) {
                if config.verbose {
                    debug!(
                        instrument = %trade.instrument,
                        timestamp = %t,
                        pnl = trade.realized_pnl,
                        "closed at end of window"
                    );
                }
            }
        }

        pm.mark_to_market(&last_close, t);
    }

    let bar_count = timeline.len();
    let state = pm.into_parts();
    Ok(RunResult {
        initial_cash: state.initial_cash,
        final_cash: state.cash,
        equity_curve: state.equity_curve,
        trades: state.trades,
        open_positions: state.positions.into_values().collect(),
        total_commission: state.total_commission,
        recovered_errors: recovered,
        bar_count,
    })
}

/// Checks the feed set and returns the pair partner of each linked instrument.
fn validate_feeds<'a>(
    feeds: &'a [InstrumentFeed],
    config: &'a EngineConfig,
) -> Result<HashMap<&'a str, &'a str>, EngineError> {
    if feeds.is_empty() {
        return Err(EngineError::NoFeeds);
    }
    let mut seen = HashSet::new();
    for feed in feeds {
        if !seen.insert(feed.instrument()) {
            return Err(EngineError::DuplicateInstrument(feed.instrument().to_string()));
        }
    }

    let mut partners = HashMap::new();
    for link in &config.pairs {
        for leg in [&link.first, &link.second] {
            if !seen.contains(leg.as_str()) || partners.contains_key(leg.as_str()) {
                return Err(EngineError::UnknownPairInstrument(leg.clone()));
            }
        }
        if link.first == link.second {
            return Err(EngineError::UnknownPairInstrument(link.first.clone()));
        }
        partners.insert(link.first.as_str(), link.second.as_str());
        partners.insert(link.second.as_str(), link.first.as_str());
    }
    Ok(partners)
}

/// Instruments with an entry signal on a bar at `t`.
fn entering_at<'a>(
    feeds: &'a [InstrumentFeed],
    cursors: &[usize],
    t: NaiveDateTime,
) -> HashSet<&'a str> {
    feeds
        .iter()
        .zip(cursors.iter().copied())
        .filter_map(|(feed, cursor)| {
            let bar = feed.series().bars().get(cursor)?;
            let entry = bar.timestamp == t && feed.signals().signals[cursor].action.is_entry();
            entry.then(|| feed.instrument())
        })
        .collect()
}

/// How an entry is sized.
#[derive(Debug, Clone, Copy)]
enum LegSizing {
    /// Ordinary entry: the sizing rule applies as configured.
    Single,
    /// First leg of a pair entered together; the sizing budget is split.
    Leading { legs: usize },
    /// Second leg: joins the partner's trade id and spends the reserved share.
    Trailing { link: TradeId, budget: Option<f64> },
}

/// Signal handling for one instrument on one bar.
struct BarStep<'a> {
    pm: &'a mut PortfolioManager,
    config: &'a EngineConfig,
    instrument: &'a str,
    bar: &'a Bar,
    recovered: &'a mut Vec<RecoveredError>,
}

impl BarStep<'_> {
    fn exit(&mut self) {
        if !self.pm.has_position(self.instrument) {
            return;
        }
        self.close();
    }

    /// Open (or reverse into) `side`. Returns the trade id of a new position
    /// and, for a leading pair leg, the budget reserved for its partner.
    fn enter(&mut self, side: Side, leg: LegSizing) -> Option<(TradeId, Option<f64>)> {
        match self.pm.position(self.instrument).map(|p| p.side) {
            Some(current) if current == side => return None,
            Some(_) => self.close(),
            None => {}
        }

        let price = self.bar.close;
        let sizing = self.config.sizing;
        let (quantity, reserve, link) = match leg {
            LegSizing::Single => (sizing.quantity(self.pm, price), None, None),
            LegSizing::Leading { legs } => match sizing.split_budget(self.pm, legs) {
                Some(budget) => (self.pm.affordable_quantity(price, budget), Some(budget), None),
                None => (sizing.quantity(self.pm, price), None, None),
            },
            LegSizing::Trailing { link, budget } => {
                let quantity = match budget {
                    Some(budget) => self.pm.affordable_quantity(price, budget),
                    None => sizing.quantity(self.pm, price),
                };
                (quantity, None, Some(link))
            }
        };
        if quantity <= 0.0 {
            let required = price + self.config.commission.compute(price, 1.0);
            let err = PortfolioError::InsufficientCash {
                instrument: self.instrument.to_string(),
                required,
                available: self.pm.cash(),
            };
            self.record(&err);
            return None;
        }

        let opened = match link {
            Some(id) => self.pm.open_linked_position(
                self.instrument,
                side,
                price,
                self.bar.timestamp,
                quantity,
                id,
            ),
            None => self
                .pm
                .open_position(self.instrument, side, price, self.bar.timestamp, quantity),
        };
        match opened {
            Ok(id) => {
                if self.config.verbose {
                    debug!(
                        instrument = self.instrument,
                        timestamp = %self.bar.timestamp,
                        side = ?side,
                        quantity,
                        price,
                        trade_id = %id,
                        "opened position"
                    );
                }
                Some((id, reserve))
            }
            Err(err) => {
                self.record(&err);
                None
            }
        }
    }

    /// Close the leg `partner` opened earlier on this bar, at its own close.
    fn unwind(&mut self, partner: &str, last_close: &HashMap<String, f64>) {
        let Some(&price) = last_close.get(partner) else {
            return;
        };
        match self
            .pm
            .close_position(partner, price, self.bar.timestamp, ExitReason::Signal)
        {
            Ok(trade) => {
                if self.config.verbose {
                    debug!(
                        instrument = partner,
                        timestamp = %self.bar.timestamp,
                        pnl = trade.realized_pnl,
                        "unwound pair leg"
                    );
                }
            }
            Err(err) => self.record(&err),
        }
    }

    fn close(&mut self) {
        match self.pm.close_position(
            self.instrument,
            self.bar.close,
            self.bar.timestamp,
            ExitReason::Signal,
        ) {
            Ok(trade) => {
                if self.config.verbose {
                    debug!(
                        instrument = self.instrument,
                        timestamp = %self.bar.timestamp,
                        price = trade.exit_price,
                        pnl = trade.realized_pnl,
                        "closed position"
                    );
                }
            }
            Err(err) => self.record(&err),
        }
    }

    fn record(&mut self, err: &PortfolioError) {
        if self.config.verbose {
            warn!(
                instrument = self.instrument,
                timestamp = %self.bar.timestamp,
                error = %err,
                "recovered from portfolio error"
            );
        }
        self.recovered.push(RecoveredError {
            timestamp: self.bar.timestamp,
            instrument: self.instrument.to_string(),
            error: err.to_string(),
        });
    }
}
