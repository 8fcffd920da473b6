//! Crossing-based buy flags
//!
//! Each function marks the rows where a boolean condition switches from false
//! to true. The first row never fires.

/// RSI level the series must climb back through
pub const RSI_BUY_THRESHOLD: f64 = 30.0;

fn rising_edges(condition: impl Iterator<Item = bool>) -> Vec<i64> {
    let mut previous = None;
    condition
        .map(|current| {
            let fired = matches!(previous, Some(false)) && current;
            previous = Some(current);
            fired as i64
        })
        .collect()
}

/// 1 where RSI moves from below `threshold` to at or above it; NaN counts as above
pub fn rsi_buy_signal(rsi: &[f64], threshold: f64) -> Vec<i64> {
    rising_edges(rsi.iter().map(|&v| v.is_nan() || v >= threshold))
}

/// 1 where close drops below the lower band; a NaN band counts as -1
pub fn bbands_buy_signal(lower: &[f64], close: &[f64]) -> Vec<i64> {
    rising_edges(lower.iter().zip(close).map(|(&band, &price)| {
        let band = if band.is_nan() { -1.0 } else { band };
        price < band
    }))
}

/// 1 where the MACD line crosses above its signal line
pub fn macd_buy_signal(macd: &[f64], signal: &[f64]) -> Vec<i64> {
    rising_edges(macd.iter().zip(signal).map(|(&m, &s)| m > s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rsi_buy_signal() {
        let rsi = [f64::NAN, 40.01, 20.02, 20.03, 40.04, 35.05, 20.06, 10.07, 100.08];
        assert_eq!(
            rsi_buy_signal(&rsi, RSI_BUY_THRESHOLD),
            vec![0, 0, 0, 0, 1, 0, 0, 0, 1]
        );
    }

    #[test]
    fn test_rsi_threshold_is_inclusive() {
        assert_eq!(rsi_buy_signal(&[29.9, 30.0], 30.0), vec![0, 1]);
    }

    #[test]
    fn test_bbands_buy_signal() {
        let lower = [f64::NAN, 10.0, 10.0, 10.0, 10.0];
        let close = [5.0, 11.0, 9.0, 8.0, 12.0];
        assert_eq!(bbands_buy_signal(&lower, &close), vec![0, 0, 1, 0, 0]);
    }

    #[test]
    fn test_macd_buy_signal() {
        let macd = [0.5, -1.0, 0.2, 0.3, -0.1, 0.4];
        let signal = [0.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        assert_eq!(macd_buy_signal(&macd, &signal), vec![0, 0, 1, 0, 0, 1]);
    }

    #[test]
    fn test_empty_series() {
        assert!(rsi_buy_signal(&[], RSI_BUY_THRESHOLD).is_empty());
    }
}
