//! Technical indicators and derived buy signals
//!
//! Indicator values come from the `ta` crate; this module only applies them
//! per firm and turns them into 0/1 buy columns.

mod signals;

pub use signals::{bbands_buy_signal, macd_buy_signal, rsi_buy_signal, RSI_BUY_THRESHOLD};

use serde::{Deserialize, Serialize};
use ta::indicators::{BollingerBands, MovingAverageConvergenceDivergence, RelativeStrengthIndex};
use ta::Next;
use tracing::debug;

use crate::data::{Column, Frame};
use crate::error::{Error, Result};

/// Supported indicators with their parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Indicator {
    Macd {
        fast: usize,
        slow: usize,
        signal: usize,
    },
    Rsi {
        period: usize,
    },
    #[serde(rename = "bbands")]
    BollingerBands {
        period: usize,
        multiplier: f64,
    },
}

impl Default for Indicator {
    fn default() -> Self {
        Indicator::Rsi { period: 14 }
    }
}

impl Indicator {
    /// Short name used in file names
    pub fn name(&self) -> &'static str {
        match self {
            Indicator::Macd { .. } => "macd",
            Indicator::Rsi { .. } => "rsi",
            Indicator::BollingerBands { .. } => "bbands",
        }
    }

    /// Columns appended by [`Indicator::append_to`]
    pub fn columns(&self) -> Vec<String> {
        let names: &[&str] = match self {
            Indicator::Macd { .. } => &["macd", "macd_signal", "macd_hist"],
            Indicator::Rsi { .. } => &["rsi"],
            Indicator::BollingerBands { .. } => &["bb_lower", "bb_mid", "bb_upper"],
        };
        names.iter().map(|s| s.to_string()).collect()
    }

    /// Leading rows of each firm left as NaN while the indicator warms up
    pub fn warmup(&self) -> usize {
        match *self {
            Indicator::Macd { slow, signal, .. } => (slow + signal).saturating_sub(1),
            Indicator::Rsi { period } => period,
            Indicator::BollingerBands { period, .. } => period.saturating_sub(1),
        }
    }

    /// Indicator series over `close`, one vector per entry of [`Indicator::columns`]
    pub fn compute(&self, close: &[f64]) -> Result<Vec<Vec<f64>>> {
        let mut out = vec![vec![f64::NAN; close.len()]; self.columns().len()];
        let warmup = self.warmup();

        match *self {
            Indicator::Macd { fast, slow, signal } => {
                let mut macd = MovingAverageConvergenceDivergence::new(fast, slow, signal)
                    .map_err(|e| Error::Indicator(format!("macd: {:?}", e)))?;
                for (i, &price) in close.iter().enumerate() {
                    let value = macd.next(price);
                    if i >= warmup {
                        out[0][i] = value.macd;
                        out[1][i] = value.signal;
                        out[2][i] = value.histogram;
                    }
                }
            }
            Indicator::Rsi { period } => {
                let mut rsi = RelativeStrengthIndex::new(period)
                    .map_err(|e| Error::Indicator(format!("rsi: {:?}", e)))?;
                for (i, &price) in close.iter().enumerate() {
                    let value = rsi.next(price);
                    if i >= warmup {
                        out[0][i] = value;
                    }
                }
            }
            Indicator::BollingerBands { period, multiplier } => {
                let mut bands = BollingerBands::new(period, multiplier)
                    .map_err(|e| Error::Indicator(format!("bbands: {:?}", e)))?;
                for (i, &price) in close.iter().enumerate() {
                    let value = bands.next(price);
                    if i >= warmup {
                        out[0][i] = value.lower;
                        out[1][i] = value.average;
                        out[2][i] = value.upper;
                    }
                }
            }
        }

        Ok(out)
    }

    /// Append indicator columns, computed independently per firm
    pub fn append_to(&self, frame: &mut Frame, firm_column: &str, close_column: &str) -> Result<()> {
        let close = frame.floats(close_column)?.to_vec();
        let mut columns = vec![vec![f64::NAN; frame.height()]; self.columns().len()];

        for group in frame.group_indices(firm_column)? {
            let series: Vec<f64> = group.rows.iter().map(|&r| close[r]).collect();
            let computed = self.compute(&series)?;
            for (target, values) in columns.iter_mut().zip(computed) {
                for (&row, value) in group.rows.iter().zip(values) {
                    target[row] = value;
                }
            }
            debug!(firm = %group.key, rows = group.rows.len(), indicator = self.name(), "indicator computed");
        }

        for (name, values) in self.columns().into_iter().zip(columns) {
            frame.set_column(name, Column::Float(values))?;
        }
        Ok(())
    }

    /// 0/1 buy column from this indicator's columns (see [`Indicator::append_to`]),
    /// computed per firm so no signal fires across a firm boundary
    pub fn buy_signal(&self, frame: &Frame, firm_column: &str, close_column: &str) -> Result<Vec<i64>> {
        let mut signal = vec![0; frame.height()];
        let pick = |values: &[f64], rows: &[usize]| rows.iter().map(|&r| values[r]).collect::<Vec<f64>>();

        for group in frame.group_indices(firm_column)? {
            let per_firm = match self {
                Indicator::Macd { .. } => macd_buy_signal(
                    &pick(frame.floats("macd")?, &group.rows),
                    &pick(frame.floats("macd_signal")?, &group.rows),
                ),
                Indicator::Rsi { .. } => {
                    rsi_buy_signal(&pick(frame.floats("rsi")?, &group.rows), RSI_BUY_THRESHOLD)
                }
                Indicator::BollingerBands { .. } => bbands_buy_signal(
                    &pick(frame.floats("bb_lower")?, &group.rows),
                    &pick(frame.floats(close_column)?, &group.rows),
                ),
            };
            for (&row, value) in group.rows.iter().zip(per_firm) {
                signal[row] = value;
            }
        }

        Ok(signal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn closes(n: usize) -> Vec<f64> {
        (0..n).map(|i| 100.0 + (i as f64 * 0.7).sin() * 5.0).collect()
    }

    #[test]
    fn test_rsi_warmup_is_nan() {
        let out = Indicator::Rsi { period: 5 }.compute(&closes(20)).unwrap();
        assert_eq!(out.len(), 1);
        assert!(out[0][..5].iter().all(|v| v.is_nan()));
        assert!(out[0][5..].iter().all(|v| (0.0..=100.0).contains(v)));
    }

    #[test]
    fn test_bbands_order() {
        let out = Indicator::BollingerBands {
            period: 4,
            multiplier: 2.0,
        }
        .compute(&closes(12))
        .unwrap();
        for i in 3..12 {
            assert!(out[0][i] <= out[1][i] && out[1][i] <= out[2][i]);
        }
    }

    #[test]
    fn test_invalid_period_is_error() {
        let err = Indicator::Rsi { period: 0 }.compute(&closes(3)).unwrap_err();
        assert!(matches!(err, Error::Indicator(_)));
    }

    #[test]
    fn test_append_per_firm() {
        let mut firms = vec!["A".to_string(); 10];
        firms.extend(vec!["B".to_string(); 10]);
        let mut close = closes(10);
        close.extend(closes(10));
        let mut frame = Frame::from_columns(vec![
            ("firm", Column::Text(firms)),
            ("close", Column::Float(close)),
        ])
        .unwrap();

        let indicator = Indicator::Rsi { period: 3 };
        indicator.append_to(&mut frame, "firm", "close").unwrap();
        let rsi = frame.floats("rsi").unwrap();

        assert!(rsi[10..13].iter().all(|v| v.is_nan()));
        approx::assert_abs_diff_eq!(rsi[5], rsi[15], epsilon = 1e-12);

        let buy = indicator.buy_signal(&frame, "firm", "close").unwrap();
        assert_eq!(buy.len(), 20);
        assert_eq!(buy[10], 0);
    }

    #[test]
    fn test_serde_tagged() {
        let parsed: Indicator = toml::from_str("kind = \"bbands\"\nperiod = 20\nmultiplier = 2.0").unwrap();
        assert_eq!(
            parsed,
            Indicator::BollingerBands {
                period: 20,
                multiplier: 2.0
            }
        );
        assert_eq!(parsed.name(), "bbands");
    }
}
