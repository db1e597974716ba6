//! Bar and PriceSeries: the market data units the engine replays.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// OHLCV bar for a single instrument at a single timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// Returns true if any OHLC field is NaN (void bar).
    pub fn is_void(&self) -> bool {
        self.open.is_nan() || self.high.is_nan() || self.low.is_nan() || self.close.is_nan()
    }

    /// Basic OHLC sanity check: finite positive prices and `high >= low`.
    ///
    /// Open and close outside the high/low range are tolerated; some vendors
    /// report adjusted closes that drift outside the raw range.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        [self.open, self.high, self.low, self.close]
            .iter()
            .all(|p| p.is_finite() && *p > 0.0)
            && self.high >= self.low
            && self.volume.is_finite()
            && self.volume >= 0.0
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PriceSeriesError {
    #[error("price series for '{instrument}' is empty")]
    Empty { instrument: String },

    #[error("invalid price series for '{instrument}' at bar {index} ({timestamp}): {reason}")]
    Invalid {
        instrument: String,
        index: usize,
        timestamp: NaiveDateTime,
        reason: String,
    },
}

/// Ordered, validated bar sequence for one instrument.
///
/// Construction is the only way to obtain a `PriceSeries`, so every series the
/// engine sees has strictly increasing timestamps and sane bars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    instrument: String,
    bars: Vec<Bar>,
}

impl PriceSeries {
    pub fn new(instrument: impl Into<String>, bars: Vec<Bar>) -> Result<Self, PriceSeriesError> {
        let instrument = instrument.into();
        if bars.is_empty() {
            return Err(PriceSeriesError::Empty { instrument });
        }

        for (index, bar) in bars.iter().enumerate() {
            if !bar.is_sane() {
                return Err(PriceSeriesError::Invalid {
                    instrument,
                    index,
                    timestamp: bar.timestamp,
                    reason: format!(
                        "malformed bar (open={}, high={}, low={}, close={}, volume={})",
                        bar.open, bar.high, bar.low, bar.close, bar.volume
                    ),
                });
            }
            if index > 0 && bar.timestamp <= bars[index - 1].timestamp {
                return Err(PriceSeriesError::Invalid {
                    instrument,
                    index,
                    timestamp: bar.timestamp,
                    reason: format!(
                        "timestamp not after previous bar ({})",
                        bars[index - 1].timestamp
                    ),
                });
            }
        }

        Ok(Self { instrument, bars })
    }

    pub fn instrument(&self) -> &str {
        &self.instrument
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn timestamps(&self) -> impl Iterator<Item = NaiveDateTime> + '_ {
        self.bars.iter().map(|b| b.timestamp)
    }

    pub fn first_timestamp(&self) -> NaiveDateTime {
        self.bars[0].timestamp
    }

    pub fn last_timestamp(&self) -> NaiveDateTime {
        self.bars[self.bars.len() - 1].timestamp
    }
}
