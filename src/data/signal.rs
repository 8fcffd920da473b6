//! Class labels for sampled windows

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::Value;
use crate::error::Error;

/// Binary class of a sampled window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Signal {
    #[serde(rename = "buy")]
    Buy,
    #[serde(rename = "nobuy")]
    NoBuy,
}

impl Signal {
    /// Both classes, buy first
    pub const ALL: [Signal; 2] = [Signal::Buy, Signal::NoBuy];

    /// Integer label written to datasets
    pub fn label(&self) -> i64 {
        match self {
            Signal::Buy => 1,
            Signal::NoBuy => 0,
        }
    }

    /// Value of the buy-signal column that selects this class
    pub fn target_value(&self) -> Value {
        Value::Int(self.label())
    }

    /// Token used in file names
    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::Buy => "buy",
            Signal::NoBuy => "nobuy",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Signal {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "buy" | "1" => Ok(Signal::Buy),
            "nobuy" | "no-buy" | "0" => Ok(Signal::NoBuy),
            other => Err(Error::InvalidParameter(format!("unknown signal '{}'", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels() {
        assert_eq!(Signal::Buy.label(), 1);
        assert_eq!(Signal::NoBuy.label(), 0);
        assert_eq!(Signal::NoBuy.to_string(), "nobuy");
    }

    #[test]
    fn test_parse() {
        assert_eq!("BUY".parse::<Signal>().unwrap(), Signal::Buy);
        assert_eq!("nobuy".parse::<Signal>().unwrap(), Signal::NoBuy);
        assert!("sell".parse::<Signal>().is_err());
    }
}
