//! Signals: the per-bar actions a strategy recommends.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::bar::PriceSeries;

/// Discrete action for a single bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalAction {
    EnterLong,
    EnterShort,
    Exit,
    Hold,
}

impl SignalAction {
    pub fn is_entry(self) -> bool {
        matches!(self, SignalAction::EnterLong | SignalAction::EnterShort)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub timestamp: NaiveDateTime,
    pub action: SignalAction,
}

/// One signal per bar plus optional diagnostic series.
///
/// Auxiliary series (moving averages, z-scores, ...) have the same length as
/// `signals`; `None` marks warmup bars where the value is undefined.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalSeries {
    pub signals: Vec<Signal>,
    pub auxiliary: BTreeMap<String, Vec<Option<f64>>>,
}

impl SignalSeries {
    /// All-HOLD series aligned to `series`.
    pub fn hold(series: &PriceSeries) -> Self {
        Self {
            signals: series
                .timestamps()
                .map(|timestamp| Signal {
                    timestamp,
                    action: SignalAction::Hold,
                })
                .collect(),
            auxiliary: BTreeMap::new(),
        }
    }

    /// Build a series from one action per bar of `series`.
    ///
    /// Missing trailing actions are filled with HOLD; extra actions are ignored.
    pub fn from_actions(series: &PriceSeries, actions: &[SignalAction]) -> Self {
        Self {
            signals: series
                .timestamps()
                .enumerate()
                .map(|(i, timestamp)| Signal {
                    timestamp,
                    action: actions.get(i).copied().unwrap_or(SignalAction::Hold),
                })
                .collect(),
            auxiliary: BTreeMap::new(),
        }
    }

    pub fn with_auxiliary(mut self, name: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        self.auxiliary.insert(name.into(), values);
        self
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    pub fn actions(&self) -> impl Iterator<Item = SignalAction> + '_ {
        self.signals.iter().map(|s| s.action)
    }

    /// Number of non-HOLD signals.
    pub fn active_count(&self) -> usize {
        self.actions().filter(|a| *a != SignalAction::Hold).count()
    }
}
