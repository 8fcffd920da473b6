//! Data structures for price series
//!
//! A [`Frame`] holds named typed columns; a price series is a frame with firm,
//! time and OHLC columns plus any indicator columns.

mod candle;
mod frame;
mod signal;

pub use candle::{price_range, Candle};
pub use frame::{Column, Frame, Group, Value};
pub use signal::Signal;

/// Default firm column name
pub const FIRM: &str = "firm";
/// Default time column name
pub const TIME: &str = "time";
/// OHLC column names required for candlestick plots
pub const OHLC: [&str; 4] = ["open", "high", "low", "close"];
