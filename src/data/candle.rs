//! OHLC candle view over frame rows

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// One open/high/low/close bar
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub time: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl Candle {
    /// Create a new candle
    pub fn new(time: NaiveDateTime, open: f64, high: f64, low: f64, close: f64) -> Self {
        Self {
            time,
            open,
            high,
            low,
            close,
        }
    }

    /// Check if candle is bullish (close >= open)
    pub fn is_bullish(&self) -> bool {
        self.close >= self.open
    }

    /// Top of the body
    pub fn body_high(&self) -> f64 {
        self.open.max(self.close)
    }

    /// Bottom of the body
    pub fn body_low(&self) -> f64 {
        self.open.min(self.close)
    }

    /// All four prices are finite
    pub fn is_complete(&self) -> bool {
        [self.open, self.high, self.low, self.close]
            .iter()
            .all(|p| p.is_finite())
    }
}

/// Lowest low and highest high across finite candles
pub fn price_range(candles: &[Candle]) -> Option<(f64, f64)> {
    let finite: Vec<&Candle> = candles.iter().filter(|c| c.is_complete()).collect();
    if finite.is_empty() {
        return None;
    }
    let min = finite.iter().map(|c| c.low).fold(f64::MAX, f64::min);
    let max = finite.iter().map(|c| c.high).fold(f64::MIN, f64::max);
    Some((min, max))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn t() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2021, 3, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_candle_bullish() {
        let candle = Candle::new(t(), 100.0, 110.0, 95.0, 105.0);
        assert!(candle.is_bullish());
        assert_eq!(candle.body_high(), 105.0);
        assert_eq!(candle.body_low(), 100.0);
    }

    #[test]
    fn test_price_range_skips_nan() {
        let candles = vec![
            Candle::new(t(), 100.0, 110.0, 95.0, 105.0),
            Candle::new(t(), f64::NAN, 500.0, 1.0, 2.0),
            Candle::new(t(), 101.0, 120.0, 99.0, 100.0),
        ];
        assert_eq!(price_range(&candles), Some((95.0, 120.0)));
        assert_eq!(price_range(&candles[1..2]), None);
    }
}
