//! Transaction cost modeling.

use serde::{Deserialize, Serialize};

use crate::candidate::ActionCandidate;

/// Fixed-plus-percentage transaction costs, in EUR.
///
/// ```
/// use holistic_planner::portfolio::TransactionCosts;
///
/// let costs = TransactionCosts { fixed: 2.0, percent: 0.002 };
/// // 2.00 + 0.2% of 1000 = 4.00
/// assert!((costs.trade_cost(1000.0) - 4.0).abs() < 1e-9);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransactionCosts {
    /// Fixed fee per trade
    pub fixed: f64,
    /// Variable fee as a fraction of trade value
    pub percent: f64,
}

impl TransactionCosts {
    /// A zero-cost model (no fees).
    pub fn zero() -> Self {
        Self {
            fixed: 0.0,
            percent: 0.0,
        }
    }

    /// Cost of a single trade of the given value. Sign of `value` is ignored.
    pub fn trade_cost(&self, value: f64) -> f64 {
        self.fixed + value.abs() * self.percent
    }

    /// Total cost of every action in a sequence.
    pub fn sequence_cost(&self, sequence: &[ActionCandidate]) -> f64 {
        sequence.iter().map(|a| self.trade_cost(a.value_eur)).sum()
    }

    /// A trade is worth making when its value covers at least twice its cost.
    pub fn is_worthwhile(&self, value: f64) -> bool {
        value.abs() >= self.trade_cost(value) * 2.0
    }

    /// Smallest trade whose cost ratio stays at or below `max_cost_ratio`.
    ///
    /// Solves `(fixed + t * percent) / t = max_cost_ratio` for `t`. If the
    /// variable fee alone exceeds the ratio, returns a high floor of 1000.
    pub fn min_trade_amount(&self, max_cost_ratio: f64) -> f64 {
        let denominator = max_cost_ratio - self.percent;
        if denominator <= 0.0 {
            return 1000.0;
        }
        self.fixed / denominator
    }
}

impl Default for TransactionCosts {
    fn default() -> Self {
        Self::zero()
    }
}
