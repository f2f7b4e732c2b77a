//! Candidate actions and the sequences built from them.

use std::fmt;

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::side::TradeSide;

/// A single candidate trade, produced by a calculator or derived by a
/// sequence generator. Never mutated once built; derivatives are new values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionCandidate {
    pub side: TradeSide,
    pub symbol: String,
    pub name: String,
    pub quantity: u64,
    pub price: f64,
    /// Trade value in the reporting currency (EUR).
    pub value_eur: f64,
    pub currency: String,
    pub priority: f64,
    pub reason: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl ActionCandidate {
    /// Create a candidate with value `quantity * price`, EUR currency,
    /// zero priority and no tags.
    pub fn new(side: TradeSide, symbol: &str, name: &str, quantity: u64, price: f64) -> Self {
        Self {
            side,
            symbol: symbol.to_string(),
            name: name.to_string(),
            quantity,
            price,
            value_eur: quantity as f64 * price,
            currency: "EUR".to_string(),
            priority: 0.0,
            reason: String::new(),
            tags: Vec::new(),
        }
    }

    pub fn with_value(mut self, value_eur: f64) -> Self {
        self.value_eur = value_eur;
        self
    }

    pub fn with_priority(mut self, priority: f64) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    pub fn with_currency(mut self, currency: &str) -> Self {
        self.currency = currency.to_string();
        self
    }

    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    #[inline]
    pub fn is_buy(&self) -> bool {
        self.side.is_buy()
    }

    #[inline]
    pub fn is_sell(&self) -> bool {
        self.side.is_sell()
    }
}

impl fmt::Display for ActionCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} @ {:.2} = €{:.0}",
            self.side, self.quantity, self.symbol, self.price, self.value_eur
        )
    }
}

/// Ordered list of actions. Order matters: evaluation replays cash flow
/// action by action.
pub type ActionSequence = Vec<ActionCandidate>;

/// Mean priority of a sequence (0.0 for an empty one).
pub fn mean_priority(sequence: &[ActionCandidate]) -> f64 {
    if sequence.is_empty() {
        return 0.0;
    }
    sequence.iter().map(|a| a.priority).sum::<f64>() / sequence.len() as f64
}

/// True if any symbol appears more than once.
pub fn has_duplicate_symbols(sequence: &[ActionCandidate]) -> bool {
    let mut seen = FxHashSet::default();
    sequence.iter().any(|a| !seen.insert(a.symbol.as_str()))
}

/// Total value of the buys in a sequence.
pub fn buy_value(sequence: &[ActionCandidate]) -> f64 {
    sequence.iter().filter(|a| a.is_buy()).map(|a| a.value_eur).sum()
}

/// Total value of the sells in a sequence.
pub fn sell_value(sequence: &[ActionCandidate]) -> f64 {
    sequence.iter().filter(|a| a.is_sell()).map(|a| a.value_eur).sum()
}
