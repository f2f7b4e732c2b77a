//! Trade side: Buy or Sell

use std::fmt;

use serde::{Deserialize, Serialize};

/// Direction of a candidate trade.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl TradeSide {
    #[inline]
    pub fn is_buy(self) -> bool {
        self == TradeSide::Buy
    }

    #[inline]
    pub fn is_sell(self) -> bool {
        self == TradeSide::Sell
    }

    /// Sign of the cash flow this side produces: sells add cash, buys spend it.
    #[inline]
    pub fn cash_sign(self) -> f64 {
        match self {
            TradeSide::Buy => -1.0,
            TradeSide::Sell => 1.0,
        }
    }
}

impl fmt::Display for TradeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeSide::Buy => write!(f, "BUY"),
            TradeSide::Sell => write!(f, "SELL"),
        }
    }
}
