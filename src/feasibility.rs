//! Fast, synchronous elimination of sequences that cannot or should not
//! be executed.

use std::fmt;

use log::info;
use rustc_hash::FxHashSet;

use crate::candidate::{ActionCandidate, ActionSequence, mean_priority};

/// Why a sequence was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Empty,
    DuplicateSymbol,
    LowPriority,
    InsufficientCash,
}

/// Rejection counts from one feasibility pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeasibilityStats {
    pub kept: usize,
    pub empty: usize,
    pub duplicate_symbol: usize,
    pub low_priority: usize,
    pub insufficient_cash: usize,
}

impl FeasibilityStats {
    fn record(&mut self, rejection: Rejection) {
        match rejection {
            Rejection::Empty => self.empty += 1,
            Rejection::DuplicateSymbol => self.duplicate_symbol += 1,
            Rejection::LowPriority => self.low_priority += 1,
            Rejection::InsufficientCash => self.insufficient_cash += 1,
        }
    }

    pub fn rejected(&self) -> usize {
        self.empty + self.duplicate_symbol + self.low_priority + self.insufficient_cash
    }
}

impl fmt::Display for FeasibilityStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "kept {}, rejected {} (empty {}, duplicate {}, low priority {}, cash {})",
            self.kept,
            self.rejected(),
            self.empty,
            self.duplicate_symbol,
            self.low_priority,
            self.insufficient_cash
        )
    }
}

/// Replay the sequence's cash flow in order. Fails as soon as a buy would
/// take cash below zero.
pub fn is_cash_feasible(sequence: &[ActionCandidate], available_cash: f64) -> bool {
    let mut cash = available_cash;
    for action in sequence {
        cash += action.side.cash_sign() * action.value_eur;
        if cash < -1e-9 {
            return false;
        }
    }
    true
}

/// First reason the sequence fails, if any.
pub fn check(sequence: &ActionSequence, priority_threshold: f64, available_cash: f64) -> Option<Rejection> {
    if sequence.is_empty() {
        return Some(Rejection::Empty);
    }
    let mut seen = FxHashSet::default();
    if sequence.iter().any(|a| !seen.insert(a.symbol.as_str())) {
        return Some(Rejection::DuplicateSymbol);
    }
    if mean_priority(sequence) < priority_threshold {
        return Some(Rejection::LowPriority);
    }
    if !is_cash_feasible(sequence, available_cash) {
        return Some(Rejection::InsufficientCash);
    }
    None
}

/// Keep only feasible sequences, in their original order.
pub fn filter_feasible(
    sequences: Vec<ActionSequence>,
    priority_threshold: f64,
    available_cash: f64,
) -> (Vec<ActionSequence>, FeasibilityStats) {
    let mut stats = FeasibilityStats::default();
    let kept: Vec<ActionSequence> = sequences
        .into_iter()
        .filter(|seq| match check(seq, priority_threshold, available_cash) {
            Some(reason) => {
                stats.record(reason);
                false
            }
            None => true,
        })
        .collect();
    stats.kept = kept.len();
    info!("feasibility: {stats}");
    (kept, stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::side::TradeSide;

    fn action(side: TradeSide, symbol: &str, value: f64, priority: f64) -> ActionCandidate {
        ActionCandidate::new(side, symbol, symbol, 1, value).with_priority(priority)
    }

    #[test]
    fn cash_flow_in_order() {
        let sell_then_buy = vec![
            action(TradeSide::Sell, "A", 500.0, 0.5),
            action(TradeSide::Buy, "B", 600.0, 0.5),
        ];
        assert!(is_cash_feasible(&sell_then_buy, 100.0));
        let buy_then_sell: Vec<_> = sell_then_buy.iter().rev().cloned().collect();
        assert!(!is_cash_feasible(&buy_then_sell, 100.0));
    }

    #[test]
    fn rejection_reasons() {
        let seqs = vec![
            vec![],
            vec![action(TradeSide::Buy, "A", 10.0, 0.9), action(TradeSide::Sell, "A", 10.0, 0.9)],
            vec![action(TradeSide::Buy, "B", 10.0, 0.1)],
            vec![action(TradeSide::Buy, "C", 1000.0, 0.9)],
            vec![action(TradeSide::Buy, "D", 50.0, 0.5)],
        ];
        let (kept, stats) = filter_feasible(seqs, 0.3, 100.0);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0][0].symbol, "D");
        assert_eq!(
            stats,
            FeasibilityStats {
                kept: 1,
                empty: 1,
                duplicate_symbol: 1,
                low_priority: 1,
                insufficient_cash: 1,
            }
        );
        assert_eq!(stats.rejected(), 4);
    }

    #[test]
    fn threshold_is_inclusive() {
        let seq = vec![action(TradeSide::Buy, "A", 1.0, 0.3)];
        assert_eq!(check(&seq, 0.3, 10.0), None);
    }
}
