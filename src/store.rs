//! Persistence for incremental planning: candidate sequences, their
//! evaluations, and the best result so far, keyed by portfolio state.

use std::hash::{Hash, Hasher};
use std::sync::{Mutex, MutexGuard};

use rustc_hash::{FxHashMap, FxHasher};

use crate::candidate::{ActionCandidate, ActionSequence, mean_priority};
use crate::error::{Error, Result};
use crate::evaluation::SequenceEvaluation;

/// Stable identity of a sequence: side, symbol, quantity and priority of
/// each action, in order.
pub fn sequence_hash(sequence: &[ActionCandidate]) -> u64 {
    let mut hasher = FxHasher::default();
    for action in sequence {
        action.side.hash(&mut hasher);
        action.symbol.hash(&mut hasher);
        action.quantity.hash(&mut hasher);
        action.priority.to_bits().hash(&mut hasher);
    }
    hasher.finish()
}

/// Storage backing `Planner::create_plan_incremental`.
///
/// Everything is scoped by a portfolio hash; a different hash means the
/// portfolio changed and earlier work no longer applies.
pub trait SequenceStore: Send + Sync {
    /// Drop everything not stored under `portfolio_hash`. Returns the
    /// number of sequences removed.
    fn purge_except(&self, portfolio_hash: u64) -> Result<usize>;

    /// Number of sequences stored under `portfolio_hash`.
    fn count(&self, portfolio_hash: u64) -> Result<usize>;

    /// Whether candidates were ever inserted for `portfolio_hash`, even an
    /// empty set.
    fn is_seeded(&self, portfolio_hash: u64) -> Result<bool>;

    /// Store sequences, skipping any already present, and mark the portfolio
    /// seeded. Returns how many were added.
    fn insert(&self, portfolio_hash: u64, sequences: Vec<ActionSequence>) -> Result<usize>;

    /// Up to `limit` sequences without an evaluation, highest mean priority
    /// first. Equal priorities keep insertion order.
    fn next_unevaluated(&self, portfolio_hash: u64, limit: usize) -> Result<Vec<(u64, ActionSequence)>>;

    fn record_evaluation(
        &self,
        portfolio_hash: u64,
        sequence_hash: u64,
        evaluation: SequenceEvaluation,
    ) -> Result<()>;

    /// Number of sequences still waiting for evaluation.
    fn pending(&self, portfolio_hash: u64) -> Result<usize>;

    fn best(&self, portfolio_hash: u64) -> Result<Option<SequenceEvaluation>>;

    fn set_best(&self, portfolio_hash: u64, evaluation: SequenceEvaluation) -> Result<()>;
}

struct Entry {
    hash: u64,
    sequence: ActionSequence,
    evaluation: Option<SequenceEvaluation>,
}

#[derive(Default)]
struct Bucket {
    entries: Vec<Entry>,
    index: FxHashMap<u64, usize>,
    best: Option<SequenceEvaluation>,
    seeded: bool,
}

/// Process-local [`SequenceStore`].
#[derive(Default)]
pub struct InMemorySequenceStore {
    buckets: Mutex<FxHashMap<u64, Bucket>>,
}

impl InMemorySequenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, FxHashMap<u64, Bucket>>> {
        self.buckets
            .lock()
            .map_err(|_| Error::Store("sequence store lock poisoned".into()))
    }
}

impl SequenceStore for InMemorySequenceStore {
    fn purge_except(&self, portfolio_hash: u64) -> Result<usize> {
        let mut buckets = self.lock()?;
        let mut removed = 0;
        buckets.retain(|hash, bucket| {
            let keep = *hash == portfolio_hash;
            if !keep {
                removed += bucket.entries.len();
            }
            keep
        });
        Ok(removed)
    }

    fn count(&self, portfolio_hash: u64) -> Result<usize> {
        Ok(self
            .lock()?
            .get(&portfolio_hash)
            .map_or(0, |b| b.entries.len()))
    }

    fn is_seeded(&self, portfolio_hash: u64) -> Result<bool> {
        Ok(self.lock()?.get(&portfolio_hash).is_some_and(|b| b.seeded))
    }

    fn insert(&self, portfolio_hash: u64, sequences: Vec<ActionSequence>) -> Result<usize> {
        let mut buckets = self.lock()?;
        let bucket = buckets.entry(portfolio_hash).or_default();
        bucket.seeded = true;
        let mut added = 0;
        for sequence in sequences {
            let hash = sequence_hash(&sequence);
            if bucket.index.contains_key(&hash) {
                continue;
            }
            bucket.index.insert(hash, bucket.entries.len());
            bucket.entries.push(Entry {
                hash,
                sequence,
                evaluation: None,
            });
            added += 1;
        }
        Ok(added)
    }

    fn next_unevaluated(&self, portfolio_hash: u64, limit: usize) -> Result<Vec<(u64, ActionSequence)>> {
        let buckets = self.lock()?;
        Ok(buckets
            .get(&portfolio_hash)
            .map(|b| {
                let mut pending: Vec<&Entry> =
                    b.entries.iter().filter(|e| e.evaluation.is_none()).collect();
                pending.sort_by(|x, y| mean_priority(&y.sequence).total_cmp(&mean_priority(&x.sequence)));
                pending
                    .into_iter()
                    .take(limit)
                    .map(|e| (e.hash, e.sequence.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    fn record_evaluation(
        &self,
        portfolio_hash: u64,
        sequence_hash: u64,
        evaluation: SequenceEvaluation,
    ) -> Result<()> {
        let mut buckets = self.lock()?;
        let bucket = buckets
            .get_mut(&portfolio_hash)
            .ok_or_else(|| Error::Store(format!("no sequences stored for portfolio {portfolio_hash:x}")))?;
        let idx = *bucket
            .index
            .get(&sequence_hash)
            .ok_or_else(|| Error::Store(format!("unknown sequence {sequence_hash:x}")))?;
        bucket.entries[idx].evaluation = Some(evaluation);
        Ok(())
    }

    fn pending(&self, portfolio_hash: u64) -> Result<usize> {
        Ok(self.lock()?.get(&portfolio_hash).map_or(0, |b| {
            b.entries.iter().filter(|e| e.evaluation.is_none()).count()
        }))
    }

    fn best(&self, portfolio_hash: u64) -> Result<Option<SequenceEvaluation>> {
        Ok(self
            .lock()?
            .get(&portfolio_hash)
            .and_then(|b| b.best.clone()))
    }

    fn set_best(&self, portfolio_hash: u64, evaluation: SequenceEvaluation) -> Result<()> {
        self.lock()?.entry(portfolio_hash).or_default().best = Some(evaluation);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::ScoreBreakdown;
    use crate::side::TradeSide;

    fn seq(symbol: &str, qty: u64) -> ActionSequence {
        vec![ActionCandidate::new(TradeSide::Buy, symbol, symbol, qty, 10.0)]
    }

    fn eval(sequence: ActionSequence, score: f64) -> SequenceEvaluation {
        SequenceEvaluation {
            sequence,
            score,
            feasible: true,
            end_cash_eur: 0.0,
            transaction_costs: 0.0,
            breakdown: ScoreBreakdown::new(),
        }
    }

    #[test]
    fn hash_depends_on_quantity_and_order() {
        assert_ne!(sequence_hash(&seq("A", 1)), sequence_hash(&seq("A", 2)));
        let ab = [seq("A", 1), seq("B", 1)].concat();
        let ba = [seq("B", 1), seq("A", 1)].concat();
        assert_ne!(sequence_hash(&ab), sequence_hash(&ba));
    }

    #[test]
    fn hash_separates_equal_quantities_with_different_priorities() {
        let low = seq("A", 1);
        let mut high = seq("A", 1);
        high[0].priority = 0.8;
        assert_ne!(sequence_hash(&low), sequence_hash(&high));

        let store = InMemorySequenceStore::new();
        assert_eq!(store.insert(1, vec![low, high]).unwrap(), 2);
    }

    #[test]
    fn empty_insert_still_seeds_portfolio() {
        let store = InMemorySequenceStore::new();
        assert!(!store.is_seeded(4).unwrap());
        assert_eq!(store.insert(4, Vec::new()).unwrap(), 0);
        assert!(store.is_seeded(4).unwrap());
        assert_eq!(store.count(4).unwrap(), 0);
        assert!(!store.is_seeded(5).unwrap());
    }

    #[test]
    fn insert_skips_duplicates() {
        let store = InMemorySequenceStore::new();
        assert_eq!(store.insert(1, vec![seq("A", 1), seq("A", 1), seq("B", 1)]).unwrap(), 2);
        assert_eq!(store.insert(1, vec![seq("B", 1)]).unwrap(), 0);
        assert_eq!(store.count(1).unwrap(), 2);
    }

    #[test]
    fn batches_walk_unevaluated_in_order() {
        let store = InMemorySequenceStore::new();
        store.insert(7, vec![seq("A", 1), seq("B", 1), seq("C", 1)]).unwrap();
        let batch = store.next_unevaluated(7, 2).unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].1[0].symbol, "A");
        for (hash, s) in batch {
            store.record_evaluation(7, hash, eval(s, 0.5)).unwrap();
        }
        assert_eq!(store.pending(7).unwrap(), 1);
        assert_eq!(store.next_unevaluated(7, 2).unwrap()[0].1[0].symbol, "C");
    }

    #[test]
    fn higher_priority_comes_first() {
        let store = InMemorySequenceStore::new();
        let low = seq("L", 1);
        let mut high = seq("H", 1);
        high[0].priority = 0.9;
        store.insert(3, vec![low, high]).unwrap();
        assert_eq!(store.next_unevaluated(3, 1).unwrap()[0].1[0].symbol, "H");
    }

    #[test]
    fn purge_drops_other_portfolios() {
        let store = InMemorySequenceStore::new();
        store.insert(1, vec![seq("A", 1)]).unwrap();
        store.insert(2, vec![seq("B", 1), seq("C", 1)]).unwrap();
        store.set_best(2, eval(seq("B", 1), 0.4)).unwrap();
        assert_eq!(store.purge_except(1).unwrap(), 2);
        assert_eq!(store.count(2).unwrap(), 0);
        assert!(store.best(2).unwrap().is_none());
        assert_eq!(store.count(1).unwrap(), 1);
    }

    #[test]
    fn recording_unknown_sequence_fails() {
        let store = InMemorySequenceStore::new();
        store.insert(1, vec![seq("A", 1)]).unwrap();
        assert!(matches!(
            store.record_evaluation(1, 12345, eval(seq("Z", 1), 0.1)),
            Err(Error::Store(_))
        ));
    }
}
