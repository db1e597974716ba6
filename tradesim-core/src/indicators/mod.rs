//! Indicators over close-price slices.
//!
//! Every indicator is a pure function: closes in, one value per bar out.
//! `None` marks warmup bars. The value at index t depends only on
//! `closes[..=t]`, so strategies built on them never look ahead.

pub mod rolling_std;
pub mod rsi;
pub mod sma;

pub use rolling_std::rolling_std;
pub use rsi::rsi;
pub use sma::sma;

#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
