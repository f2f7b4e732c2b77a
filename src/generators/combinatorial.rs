//! Combinatorial expansion of the opportunity pool: exhaustive for small
//! pools, priority-weighted sampling for larger ones.

use log::debug;
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rustc_hash::FxHashSet;

use crate::calculators::sort_by_priority;
use crate::candidate::{ActionCandidate, ActionSequence, has_duplicate_symbols};
use crate::context::OpportunityContext;
use crate::error::{Error, Result};
use crate::params::{Params, param_f64, param_u64, param_usize, params};
use crate::patterns::DEFAULT_MAX_DEPTH;

use super::SequenceGenerator;

/// Candidates at or above `threshold`, highest priority first, at most
/// `limit` of them.
fn top_candidates(opportunities: &[ActionCandidate], threshold: f64, limit: usize) -> Vec<ActionCandidate> {
    let mut pool: Vec<ActionCandidate> = opportunities
        .iter()
        .filter(|a| a.priority >= threshold)
        .cloned()
        .collect();
    sort_by_priority(&mut pool);
    pool.truncate(limit);
    pool
}

/// Index combinations of `k` out of `n`, in lexicographic order.
struct Combinations {
    n: usize,
    indices: Vec<usize>,
    done: bool,
}

impl Combinations {
    fn new(n: usize, k: usize) -> Self {
        Self {
            n,
            indices: (0..k).collect(),
            done: k > n,
        }
    }
}

impl Iterator for Combinations {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Vec<usize>> {
        if self.done {
            return None;
        }
        let current = self.indices.clone();
        let k = self.indices.len();
        // Advance the rightmost index that still has room
        let mut i = k;
        loop {
            if i == 0 {
                self.done = true;
                break;
            }
            i -= 1;
            if self.indices[i] < self.n - k + i {
                self.indices[i] += 1;
                for j in i + 1..k {
                    self.indices[j] = self.indices[j - 1] + 1;
                }
                break;
            }
        }
        Some(current)
    }
}

/// Every sells-then-buys combination within the size limits, shortest
/// first, until `max_combinations` sequences exist.
pub struct CombinatorialGenerator;

impl SequenceGenerator for CombinatorialGenerator {
    fn name(&self) -> &'static str {
        "combinatorial"
    }

    fn default_params(&self) -> Params {
        let mut p = params([
            ("max_candidates", 12i64),
            ("max_sells", 3),
            ("max_buys", 3),
            ("max_depth", DEFAULT_MAX_DEPTH as i64),
            ("max_combinations", 50),
        ]);
        p.insert("priority_threshold".into(), toml::Value::Float(0.3));
        p
    }

    fn generate(
        &self,
        opportunities: &[ActionCandidate],
        _ctx: &OpportunityContext,
        p: &Params,
    ) -> Result<Vec<ActionSequence>> {
        let pool = top_candidates(
            opportunities,
            param_f64(p, "priority_threshold", 0.3),
            param_usize(p, "max_candidates", 12),
        );
        let max_sells = param_usize(p, "max_sells", 3);
        let max_buys = param_usize(p, "max_buys", 3);
        let depth = param_usize(p, "max_depth", DEFAULT_MAX_DEPTH);
        let limit = param_usize(p, "max_combinations", 50);

        let (sells, buys): (Vec<&ActionCandidate>, Vec<&ActionCandidate>) =
            pool.iter().partition(|a| a.is_sell());

        let mut out = Vec::new();
        'outer: for len in 1..=depth {
            for n_sells in 0..=len.min(max_sells) {
                let n_buys = len - n_sells;
                if n_buys > max_buys || n_sells > sells.len() || n_buys > buys.len() {
                    continue;
                }
                for s_idx in Combinations::new(sells.len(), n_sells) {
                    for b_idx in Combinations::new(buys.len(), n_buys) {
                        if out.len() >= limit {
                            break 'outer;
                        }
                        let seq: ActionSequence = s_idx
                            .iter()
                            .map(|&i| sells[i].clone())
                            .chain(b_idx.iter().map(|&i| buys[i].clone()))
                            .collect();
                        if !has_duplicate_symbols(&seq) {
                            out.push(seq);
                        }
                    }
                }
            }
        }
        debug!("combinatorial: {} sequences from {} candidates", out.len(), pool.len());
        Ok(out)
    }
}

/// Samples sequences with probability skewed toward high priority, and
/// rejects samples too similar to ones already accepted.
pub struct EnhancedCombinatorialGenerator;

impl EnhancedCombinatorialGenerator {
    /// Share of the smaller symbol set that the two sets have in common.
    fn overlap(a: &FxHashSet<&str>, b: &FxHashSet<&str>) -> f64 {
        let smaller = a.len().min(b.len());
        if smaller == 0 {
            return 0.0;
        }
        a.intersection(b).count() as f64 / smaller as f64
    }
}

impl SequenceGenerator for EnhancedCombinatorialGenerator {
    fn name(&self) -> &'static str {
        "enhanced_combinatorial"
    }

    fn default_params(&self) -> Params {
        let mut p = params([
            ("max_candidates", 12i64),
            ("max_depth", DEFAULT_MAX_DEPTH as i64),
            ("max_combinations", 50),
            ("seed", 42),
        ]);
        p.insert("priority_threshold".into(), toml::Value::Float(0.3));
        p.insert("max_overlap".into(), toml::Value::Float(0.5));
        p
    }

    fn generate(
        &self,
        opportunities: &[ActionCandidate],
        _ctx: &OpportunityContext,
        p: &Params,
    ) -> Result<Vec<ActionSequence>> {
        let pool = top_candidates(
            opportunities,
            param_f64(p, "priority_threshold", 0.3),
            param_usize(p, "max_candidates", 12),
        );
        if pool.is_empty() {
            return Ok(Vec::new());
        }
        let depth = param_usize(p, "max_depth", DEFAULT_MAX_DEPTH).min(pool.len());
        let limit = param_usize(p, "max_combinations", 50);
        let max_overlap = param_f64(p, "max_overlap", 0.5);
        if depth == 0 {
            return Ok(Vec::new());
        }
        let mut rng = StdRng::seed_from_u64(param_u64(p, "seed", 42));

        let (lo, hi) = pool.iter().fold((f64::MAX, f64::MIN), |(lo, hi), a| {
            (lo.min(a.priority), hi.max(a.priority))
        });
        let span = hi - lo;
        let weights: Vec<f64> = pool
            .iter()
            .map(|a| {
                let norm = if span > 0.0 { (a.priority - lo) / span } else { 0.0 };
                norm * norm + 0.1
            })
            .collect();

        let mut accepted: Vec<ActionSequence> = Vec::new();
        let mut accepted_sets: Vec<FxHashSet<&str>> = Vec::new();

        for _ in 0..limit * 3 {
            if accepted.len() >= limit {
                break;
            }
            let len = rng.gen_range(1..=depth);

            // Weighted draw without replacement
            let mut remaining = weights.clone();
            let mut picked = Vec::with_capacity(len);
            for _ in 0..len {
                let dist = WeightedIndex::new(&remaining)
                    .map_err(|e| Error::module("enhanced_combinatorial", e.to_string()))?;
                let i = dist.sample(&mut rng);
                remaining[i] = 0.0;
                picked.push(i);
                if remaining.iter().all(|w| *w <= 0.0) {
                    break;
                }
            }
            picked.sort_unstable();

            let seq: ActionSequence = picked
                .iter()
                .filter(|&&i| pool[i].is_sell())
                .chain(picked.iter().filter(|&&i| pool[i].is_buy()))
                .map(|&i| pool[i].clone())
                .collect();
            if has_duplicate_symbols(&seq) {
                continue;
            }
            let symbols: FxHashSet<&str> = picked.iter().map(|&i| pool[i].symbol.as_str()).collect();
            if accepted_sets
                .iter()
                .any(|s| Self::overlap(s, &symbols) > max_overlap)
            {
                continue;
            }
            accepted_sets.push(symbols);
            accepted.push(seq);
        }
        debug!("enhanced_combinatorial: accepted {} sequences", accepted.len());
        Ok(accepted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculators::test_support::context;
    use crate::side::TradeSide;

    fn pool() -> Vec<ActionCandidate> {
        let mut out = Vec::new();
        for (i, p) in [0.9, 0.8, 0.7].iter().enumerate() {
            out.push(ActionCandidate::new(TradeSide::Sell, &format!("S{i}"), "s", 1, 100.0).with_priority(*p));
        }
        for (i, p) in [0.95, 0.6, 0.5, 0.1].iter().enumerate() {
            out.push(ActionCandidate::new(TradeSide::Buy, &format!("B{i}"), "b", 1, 100.0).with_priority(*p));
        }
        out
    }

    #[test]
    fn combinations_lexicographic() {
        let all: Vec<Vec<usize>> = Combinations::new(4, 2).collect();
        assert_eq!(all, vec![vec![0, 1], vec![0, 2], vec![0, 3], vec![1, 2], vec![1, 3], vec![2, 3]]);
        assert_eq!(Combinations::new(3, 0).count(), 1);
        assert_eq!(Combinations::new(2, 3).count(), 0);
    }

    #[test]
    fn combinatorial_shortest_first_sells_lead() {
        let ctx = context(vec![], vec![], 0.0, &[]);
        let generator = CombinatorialGenerator;
        let out = generator.generate(&pool(), &ctx, &generator.default_params()).unwrap();
        assert_eq!(out.len(), 50);
        assert_eq!(out[0].len(), 1);
        // Low-priority B3 is filtered out
        assert!(out.iter().flatten().all(|a| a.symbol != "B3"));
        for seq in &out {
            let first_buy = seq.iter().position(|a| a.is_buy()).unwrap_or(seq.len());
            assert!(seq[first_buy..].iter().all(|a| a.is_buy()));
            assert!(seq.len() <= 5);
        }
    }

    #[test]
    fn combinatorial_respects_side_limits() {
        let ctx = context(vec![], vec![], 0.0, &[]);
        let generator = CombinatorialGenerator;
        let p = crate::params::merge(
            &generator.default_params(),
            &params([("max_sells", 1i64), ("max_buys", 1), ("max_combinations", 1000)]),
        );
        let out = generator.generate(&pool(), &ctx, &p).unwrap();
        // 3 + 3 singletons, 3 * 3 pairs
        assert_eq!(out.len(), 15);
    }

    #[test]
    fn enhanced_is_seeded() {
        let ctx = context(vec![], vec![], 0.0, &[]);
        let generator = EnhancedCombinatorialGenerator;
        let p = generator.default_params();
        let a = generator.generate(&pool(), &ctx, &p).unwrap();
        let b = generator.generate(&pool(), &ctx, &p).unwrap();
        assert_eq!(a, b);
        assert!(!a.is_empty());
        assert!(a.len() <= 50);
    }

    #[test]
    fn enhanced_rejects_overlapping_samples() {
        let ctx = context(vec![], vec![], 0.0, &[]);
        let generator = EnhancedCombinatorialGenerator;
        let out = generator.generate(&pool(), &ctx, &generator.default_params()).unwrap();
        let sets: Vec<FxHashSet<&str>> = out
            .iter()
            .map(|s| s.iter().map(|a| a.symbol.as_str()).collect())
            .collect();
        for (i, a) in sets.iter().enumerate() {
            for b in &sets[i + 1..] {
                assert!(EnhancedCombinatorialGenerator::overlap(a, b) <= 0.5);
            }
        }
    }
}
