//! Rolling sample standard deviation (divide by N - 1).
//!
//! First value at index `period - 1`; `period < 2` yields no values.

pub fn rolling_std(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let n = closes.len();
    let mut result = vec![None; n];
    if period < 2 || n < period {
        return result;
    }

    for i in (period - 1)..n {
        let window = &closes[i + 1 - period..=i];
        let mean = window.iter().sum::<f64>() / period as f64;
        let variance = window.iter().map(|c| (c - mean).powi(2)).sum::<f64>()
            / (period - 1) as f64;
        result[i] = Some(variance.sqrt());
    }

    result
}
