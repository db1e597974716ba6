//! Pairs trading on the z-score of the price spread.
//!
//! Spread is `first − second`. The z-score of the current spread is taken
//! against the mean and sample std of the trailing window (current bar
//! included). A wide spread shorts the first leg and buys the second; a
//! narrow one does the opposite. Both legs exit together once |z| falls
//! under the exit threshold.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::{PriceSeries, SignalAction, SignalSeries};

use super::{PairStrategy, StrategyError};

/// Signals for both legs of a pair plus the shared diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairSignals {
    pub first: SignalSeries,
    pub second: SignalSeries,
    pub auxiliary: BTreeMap<String, Vec<Option<f64>>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PairsTrading {
    pub window: usize,
    pub entry_zscore: f64,
    pub exit_zscore: f64,
}

impl PairsTrading {
    pub fn new(window: usize, entry_zscore: f64, exit_zscore: f64) -> Result<Self, StrategyError> {
        if window < 2 {
            return Err(StrategyError::invalid("pairs", "window must be >= 2"));
        }
        if !(entry_zscore > 0.0) || !(exit_zscore >= 0.0) || exit_zscore >= entry_zscore {
            return Err(StrategyError::invalid(
                "pairs",
                format!("need 0 <= exit_zscore ({exit_zscore}) < entry_zscore ({entry_zscore})"),
            ));
        }
        Ok(Self {
            window,
            entry_zscore,
            exit_zscore,
        })
    }

    fn zscores(&self, spread: &[f64]) -> Vec<Option<f64>> {
        let n = spread.len();
        let mut result = vec![None; n];
        if n < self.window {
            return result;
        }
        for i in (self.window - 1)..n {
            let window = &spread[i + 1 - self.window..=i];
            let mean = window.iter().sum::<f64>() / self.window as f64;
            let var = window.iter().map(|s| (s - mean).powi(2)).sum::<f64>()
                / (self.window - 1) as f64;
            let std = var.sqrt();
            if std > 0.0 {
                result[i] = Some((spread[i] - mean) / std);
            }
        }
        result
    }
}

impl Default for PairsTrading {
    fn default() -> Self {
        Self {
            window: 60,
            entry_zscore: 2.0,
            exit_zscore: 0.5,
        }
    }
}

fn check_aligned(first: &PriceSeries, second: &PriceSeries) -> Result<(), StrategyError> {
    let misaligned = |reason: String| StrategyError::MisalignedPair {
        first: first.instrument().to_string(),
        second: second.instrument().to_string(),
        reason,
    };
    if first.len() != second.len() {
        return Err(misaligned(format!(
            "{} bars vs {} bars",
            first.len(),
            second.len()
        )));
    }
    if let Some((a, b)) = first
        .timestamps()
        .zip(second.timestamps())
        .find(|(a, b)| a != b)
    {
        return Err(misaligned(format!("timestamp {a} vs {b}")));
    }
    Ok(())
}

impl PairStrategy for PairsTrading {
    fn name(&self) -> &str {
        "pairs"
    }

    fn warmup_bars(&self) -> usize {
        self.window - 1
    }

    fn generate_pair_signals(
        &self,
        first: &PriceSeries,
        second: &PriceSeries,
    ) -> Result<PairSignals, StrategyError> {
        check_aligned(first, second)?;

        let spread: Vec<f64> = first
            .bars()
            .iter()
            .zip(second.bars())
            .map(|(a, b)| a.close - b.close)
            .collect();
        let zscores = self.zscores(&spread);

        let mut in_position = false;
        let (first_actions, second_actions): (Vec<_>, Vec<_>) = zscores
            .iter()
            .map(|z| {
                let Some(z) = *z else {
                    return (SignalAction::Hold, SignalAction::Hold);
                };
                if !in_position {
                    if z > self.entry_zscore {
                        in_position = true;
                        return (SignalAction::EnterShort, SignalAction::EnterLong);
                    }
                    if z < -self.entry_zscore {
                        in_position = true;
                        return (SignalAction::EnterLong, SignalAction::EnterShort);
                    }
                } else if z.abs() < self.exit_zscore {
                    in_position = false;
                    return (SignalAction::Exit, SignalAction::Exit);
                }
                (SignalAction::Hold, SignalAction::Hold)
            })
            .unzip();

        let mut auxiliary = BTreeMap::new();
        auxiliary.insert("spread".to_string(), spread.into_iter().map(Some).collect());
        auxiliary.insert("zscore".to_string(), zscores);

        Ok(PairSignals {
            first: SignalSeries::from_actions(first, &first_actions),
            second: SignalSeries::from_actions(second, &second_actions),
            auxiliary,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::series_from_closes;

    fn actions(series: &SignalSeries) -> Vec<SignalAction> {
        series.actions().collect()
    }

    #[test]
    fn wide_spread_shorts_first_leg_then_exits() {
        let first = series_from_closes("KO", &[100.0, 100.0, 101.0, 100.0, 104.0, 100.0, 100.5]);
        let second = series_from_closes("PEP", &[50.0; 7]);
        let signals = PairsTrading::new(3, 1.0, 0.5)
            .unwrap()
            .generate_pair_signals(&first, &second)
            .unwrap();

        let a = actions(&signals.first);
        let b = actions(&signals.second);
        // bar 2: z ≈ 1.15
        assert_eq!((a[2], b[2]), (SignalAction::EnterShort, SignalAction::EnterLong));
        // bars 3-5: |z| >= 0.5, still in position
        for i in 3..6 {
            assert_eq!((a[i], b[i]), (SignalAction::Hold, SignalAction::Hold));
        }
        // bar 6: z ≈ -0.46
        assert_eq!((a[6], b[6]), (SignalAction::Exit, SignalAction::Exit));
        assert_eq!(signals.auxiliary["spread"][0], Some(50.0));
        assert_eq!(signals.auxiliary["zscore"][1], None);
    }

    #[test]
    fn narrow_spread_buys_first_leg() {
        let first = series_from_closes("KO", &[100.0, 100.0, 99.0]);
        let second = series_from_closes("PEP", &[50.0; 3]);
        let signals = PairsTrading::new(3, 1.0, 0.5)
            .unwrap()
            .generate_pair_signals(&first, &second)
            .unwrap();
        assert_eq!(actions(&signals.first)[2], SignalAction::EnterLong);
        assert_eq!(actions(&signals.second)[2], SignalAction::EnterShort);
    }

    #[test]
    fn constant_spread_has_no_zscore() {
        let first = series_from_closes("KO", &[60.0; 5]);
        let second = series_from_closes("PEP", &[50.0; 5]);
        let signals = PairsTrading::new(3, 1.0, 0.5)
            .unwrap()
            .generate_pair_signals(&first, &second)
            .unwrap();
        assert!(signals.auxiliary["zscore"].iter().all(Option::is_none));
        assert_eq!(signals.first.active_count(), 0);
    }

    #[test]
    fn rejects_misaligned_series() {
        let first = series_from_closes("KO", &[60.0; 5]);
        let second = series_from_closes("PEP", &[50.0; 4]);
        let err = PairsTrading::default()
            .generate_pair_signals(&first, &second)
            .unwrap_err();
        assert!(matches!(err, StrategyError::MisalignedPair { .. }));
    }

    #[test]
    fn rejects_exit_above_entry() {
        assert!(PairsTrading::new(10, 1.0, 1.5).is_err());
        assert!(PairsTrading::new(1, 2.0, 0.5).is_err());
    }
}
