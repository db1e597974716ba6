//! Simple Moving Average (SMA).
//!
//! Rolling mean of closes over a window. First value at index `period - 1`.

pub fn sma(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let n = closes.len();
    let mut result = vec![None; n];
    if period == 0 || n < period {
        return result;
    }

    let mut sum: f64 = closes[..period].iter().sum();
    result[period - 1] = Some(sum / period as f64);

    for i in period..n {
        sum += closes[i] - closes[i - period];
        result[i] = Some(sum / period as f64);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, DEFAULT_EPSILON};

    #[test]
    fn sma_5_basic() {
        let result = sma(&[10.0, 11.0, 12.0, 13.0, 14.0, 15.0, 16.0], 5);
        assert_eq!(result.len(), 7);
        assert!(result[..4].iter().all(Option::is_none));
        // mean(10..=14) = 12
        assert_approx(result[4].unwrap(), 12.0, DEFAULT_EPSILON);
        assert_approx(result[5].unwrap(), 13.0, DEFAULT_EPSILON);
        assert_approx(result[6].unwrap(), 14.0, DEFAULT_EPSILON);
    }

    #[test]
    fn sma_1_is_close() {
        let result = sma(&[100.0, 200.0, 300.0], 1);
        assert_eq!(result, vec![Some(100.0), Some(200.0), Some(300.0)]);
    }

    #[test]
    fn sma_too_few_bars() {
        assert!(sma(&[10.0, 11.0], 5).iter().all(Option::is_none));
        assert!(sma(&[10.0, 11.0], 0).iter().all(Option::is_none));
    }
}
