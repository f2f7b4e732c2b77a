use std::sync::Arc;

use log::{info, warn};
use serde_json::json;

use crate::candidate::ActionSequence;
use crate::context::EvaluationContext;
use crate::error::{Error, Result};

use super::{LocalEvaluator, SequenceEvaluation, SequenceEvaluator};

/// Remote-first evaluation with a whole-batch local fallback.
pub struct EvaluationEngine {
    local: LocalEvaluator,
    remote: Option<Arc<dyn SequenceEvaluator>>,
}

impl EvaluationEngine {
    pub fn new(local: LocalEvaluator, remote: Option<Arc<dyn SequenceEvaluator>>) -> Self {
        Self { local, remote }
    }

    pub fn local(&self) -> &LocalEvaluator {
        &self.local
    }

    /// Evaluate every sequence, in input order.
    ///
    /// An unavailable remote backend switches the entire batch to local
    /// evaluation; no batch is ever split between the two.
    pub fn evaluate(
        &self,
        sequences: &[ActionSequence],
        ctx: &EvaluationContext,
    ) -> Result<Vec<SequenceEvaluation>> {
        if sequences.is_empty() {
            return Ok(Vec::new());
        }
        let (evaluator, mut results) = match &self.remote {
            Some(remote) => match remote.evaluate_batch(sequences, ctx) {
                Ok(results) => (remote.name(), results),
                Err(Error::RemoteUnavailable(reason)) => {
                    warn!(
                        "remote evaluation unavailable ({reason}), evaluating {} sequences locally",
                        sequences.len()
                    );
                    (self.local.name(), self.local.evaluate_batch(sequences, ctx)?)
                }
                Err(e) => return Err(e),
            },
            None => (self.local.name(), self.local.evaluate_batch(sequences, ctx)?),
        };

        for r in &mut results {
            r.breakdown.insert("evaluator".into(), json!(evaluator));
            r.breakdown.insert("end_cash_eur".into(), json!(r.end_cash_eur));
            r.breakdown.insert("transaction_costs".into(), json!(r.transaction_costs));
            r.breakdown.insert("feasible".into(), json!(r.feasible));
        }
        info!("evaluated {} sequences ({evaluator})", results.len());
        Ok(results)
    }

    /// Evaluate and keep the best feasible result.
    pub fn evaluate_best(
        &self,
        sequences: &[ActionSequence],
        ctx: &EvaluationContext,
    ) -> Result<Option<SequenceEvaluation>> {
        let results = self.evaluate(sequences, ctx)?;
        Ok(select_best(&results).cloned())
    }
}

/// Best feasible result by score. Only a strictly greater score replaces
/// the running best, so the earliest of equal scores wins; results scoring
/// zero are never selected.
pub fn select_best(results: &[SequenceEvaluation]) -> Option<&SequenceEvaluation> {
    let mut best: Option<&SequenceEvaluation> = None;
    let mut best_score = 0.0;
    for r in results.iter().filter(|r| r.feasible) {
        if r.score > best_score {
            best_score = r.score;
            best = Some(r);
        }
    }
    best
}
