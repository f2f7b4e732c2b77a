//! Variants that stretch the cash budget or enlarge buys of held names.

use log::info;

use crate::calculators::sort_by_priority;
use crate::candidate::{ActionCandidate, ActionSequence};
use crate::context::OpportunityContext;
use crate::error::Result;
use crate::params::{Params, param_f64_list, param_usize, params};
use crate::patterns::DEFAULT_MAX_DEPTH;

use super::SequenceGenerator;

const DEFAULT_FACTORS: [f64; 3] = [1.1, 1.2, 1.3];
const HELD_SCALE: f64 = 1.5;

/// For each relaxation factor, greedily takes the top buys (one at a time,
/// by priority) while their total stays within `cash * factor`. Buys of
/// symbols already held also get a singleton variant scaled by 1.5.
///
/// Factors that select the same buys yield one sequence, not copies.
pub struct ConstraintRelaxationGenerator;

impl ConstraintRelaxationGenerator {
    fn enlarged(action: &ActionCandidate) -> ActionCandidate {
        let mut out = action.clone();
        out.quantity = (action.quantity as f64 * HELD_SCALE).floor() as u64;
        out.value_eur = action.value_eur * HELD_SCALE;
        out.reason = format!("{} (relaxed)", action.reason);
        out
    }
}

impl SequenceGenerator for ConstraintRelaxationGenerator {
    fn name(&self) -> &'static str {
        "constraint_relaxation"
    }

    fn default_params(&self) -> Params {
        let mut p = params([("max_candidates", 5i64), ("max_depth", DEFAULT_MAX_DEPTH as i64)]);
        p.insert(
            "relaxation_factors".into(),
            toml::Value::Array(DEFAULT_FACTORS.iter().map(|f| toml::Value::Float(*f)).collect()),
        );
        p
    }

    fn generate(
        &self,
        opportunities: &[ActionCandidate],
        ctx: &OpportunityContext,
        p: &Params,
    ) -> Result<Vec<ActionSequence>> {
        let factors = param_f64_list(p, "relaxation_factors", &DEFAULT_FACTORS);
        let max_candidates = param_usize(p, "max_candidates", 5);
        let depth = param_usize(p, "max_depth", DEFAULT_MAX_DEPTH);

        let mut buys: Vec<ActionCandidate> =
            opportunities.iter().filter(|a| a.is_buy()).cloned().collect();
        sort_by_priority(&mut buys);
        buys.truncate(max_candidates);
        if buys.is_empty() {
            return Ok(Vec::new());
        }

        let mut out: Vec<ActionSequence> = Vec::new();
        for factor in factors {
            let budget = ctx.available_cash * factor;
            let mut spent = 0.0;
            let mut seq = ActionSequence::new();
            for b in &buys {
                if seq.len() >= depth {
                    break;
                }
                if seq.iter().any(|a| a.symbol == b.symbol) || spent + b.value_eur > budget {
                    continue;
                }
                spent += b.value_eur;
                seq.push(b.clone());
            }
            if !seq.is_empty() && !out.contains(&seq) {
                out.push(seq);
            }
        }

        for b in buys.iter().filter(|b| ctx.is_held(&b.symbol)) {
            out.push(vec![Self::enlarged(b)]);
        }

        info!("constraint_relaxation: generated {} relaxed sequences", out.len());
        Ok(out)
    }
}
