//! Simulate-and-score evaluation of candidate sequences.
//!
//! Two evaluators sit behind [`SequenceEvaluator`]: [`LocalEvaluator`]
//! scores in-process, and `RemoteEvaluator` (feature `remote`) submits the
//! whole batch to an HTTP backend. [`EvaluationEngine`] tries remote first
//! and falls back to local for the entire batch when the backend is
//! unavailable.

mod engine;
mod local;
#[cfg(feature = "remote")]
mod remote;
mod scoring;
mod simulate;

pub use engine::{EvaluationEngine, select_best};
pub use local::LocalEvaluator;
#[cfg(feature = "remote")]
pub use remote::RemoteEvaluator;
pub use scoring::{DefaultPortfolioScorer, evaluate_end_state, multi_timeframe_score};
pub use simulate::{Simulation, simulate_sequence};

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::candidate::ActionSequence;
use crate::context::EvaluationContext;
use crate::error::Result;

/// Named score components, e.g. `diversification`, `cost_penalty`, `final`.
pub type ScoreBreakdown = BTreeMap<String, serde_json::Value>;

/// Outcome of evaluating one sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceEvaluation {
    pub sequence: ActionSequence,
    /// End-state score in [0, 1]
    pub score: f64,
    pub feasible: bool,
    pub end_cash_eur: f64,
    pub transaction_costs: f64,
    #[serde(default)]
    pub breakdown: ScoreBreakdown,
}

/// Scores a batch of sequences against a shared context. Results come back
/// in input order, one per sequence.
pub trait SequenceEvaluator: Send + Sync {
    fn name(&self) -> &'static str;
    fn evaluate_batch(
        &self,
        sequences: &[ActionSequence],
        ctx: &EvaluationContext,
    ) -> Result<Vec<SequenceEvaluation>>;
}
