use std::sync::{Arc, Mutex};

use log::{debug, info};
use rustc_hash::FxHashMap;
use serde_json::json;

use crate::candidate::ActionSequence;
use crate::context::EvaluationContext;
use crate::error::{Error, Result};
use crate::feasibility::is_cash_feasible;
use crate::portfolio::PortfolioContext;
use crate::ports::{PortfolioScore, PortfolioScorer};

use super::scoring::{evaluate_end_state, multi_timeframe_score};
use super::simulate::simulate_sequence;
use super::{ScoreBreakdown, SequenceEvaluation, SequenceEvaluator};

const PROGRESS_EVERY: usize = 100;

/// Sequential in-process evaluator.
///
/// Portfolio scores are memoized by end-state hash. Every `reclaim_every`
/// sequences the memo is cleared and its memory released once it holds
/// more than `max_cached_scores` entries.
pub struct LocalEvaluator {
    scorer: Arc<dyn PortfolioScorer>,
    multi_timeframe: bool,
    reclaim_every: usize,
    max_cached_scores: usize,
    cache: Mutex<FxHashMap<u64, PortfolioScore>>,
}

impl LocalEvaluator {
    pub fn new(scorer: Arc<dyn PortfolioScorer>) -> Self {
        Self {
            scorer,
            multi_timeframe: false,
            reclaim_every: 50,
            max_cached_scores: 256,
            cache: Mutex::new(FxHashMap::default()),
        }
    }

    /// Blend scores across look-back horizons.
    pub fn with_multi_timeframe(mut self, enabled: bool) -> Self {
        self.multi_timeframe = enabled;
        self
    }

    pub fn with_reclamation(mut self, every: usize, max_cached_scores: usize) -> Self {
        self.reclaim_every = every.max(1);
        self.max_cached_scores = max_cached_scores;
        self
    }

    fn portfolio_score(&self, end: &PortfolioContext) -> Result<PortfolioScore> {
        let key = end.state_hash();
        let mut cache = self
            .cache
            .lock()
            .map_err(|_| Error::module("local_evaluator", "score cache poisoned"))?;
        if let Some(score) = cache.get(&key) {
            return Ok(*score);
        }
        let score = self.scorer.score(end)?;
        cache.insert(key, score);
        Ok(score)
    }

    fn reclaim(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            if cache.len() > self.max_cached_scores {
                debug!("reclaiming score cache ({} entries)", cache.len());
                cache.clear();
                cache.shrink_to_fit();
            }
        }
    }

    /// Number of memoized portfolio scores.
    pub fn cached_scores(&self) -> usize {
        self.cache.lock().map(|c| c.len()).unwrap_or(0)
    }

    /// Evaluate a single sequence. Infeasible sequences score zero.
    pub fn evaluate_one(
        &self,
        sequence: &ActionSequence,
        ctx: &EvaluationContext,
    ) -> Result<SequenceEvaluation> {
        let transaction_costs = ctx.costs.sequence_cost(sequence);
        if !is_cash_feasible(sequence, ctx.available_cash) {
            let mut breakdown = ScoreBreakdown::new();
            breakdown.insert("final".into(), json!(0.0));
            return Ok(SequenceEvaluation {
                sequence: sequence.clone(),
                score: 0.0,
                feasible: false,
                end_cash_eur: ctx.available_cash,
                transaction_costs,
                breakdown,
            });
        }

        let sim = simulate_sequence(sequence, &ctx.portfolio, ctx.available_cash, &ctx.securities);
        let (mut score, mut breakdown) = evaluate_end_state(
            &sim.end,
            sequence,
            &ctx.costs,
            ctx.cost_penalty_factor,
            &Memoized(self),
        )?;
        if self.multi_timeframe {
            score = multi_timeframe_score(score, &mut breakdown);
        }

        Ok(SequenceEvaluation {
            sequence: sequence.clone(),
            score,
            feasible: true,
            end_cash_eur: sim.end_cash,
            transaction_costs,
            breakdown,
        })
    }
}

/// Scorer view over the evaluator's memo.
struct Memoized<'a>(&'a LocalEvaluator);

impl PortfolioScorer for Memoized<'_> {
    fn score(&self, ctx: &PortfolioContext) -> Result<PortfolioScore> {
        self.0.portfolio_score(ctx)
    }
}

impl SequenceEvaluator for LocalEvaluator {
    fn name(&self) -> &'static str {
        "local"
    }

    fn evaluate_batch(
        &self,
        sequences: &[ActionSequence],
        ctx: &EvaluationContext,
    ) -> Result<Vec<SequenceEvaluation>> {
        let mut out = Vec::with_capacity(sequences.len());
        for (i, seq) in sequences.iter().enumerate() {
            out.push(self.evaluate_one(seq, ctx)?);
            let done = i + 1;
            if done % self.reclaim_every == 0 {
                self.reclaim();
            }
            if done % PROGRESS_EVERY == 0 {
                info!("local evaluation: {done}/{} sequences", sequences.len());
            }
        }
        Ok(out)
    }
}
