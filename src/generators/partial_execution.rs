//! Partial-fill variants of each opportunity.

use crate::candidate::{ActionCandidate, ActionSequence};
use crate::context::OpportunityContext;
use crate::error::Result;
use crate::params::{Params, param_f64_list, param_u64};

use super::SequenceGenerator;

const DEFAULT_FILLS: [f64; 3] = [0.5, 0.75, 1.0];

/// One singleton sequence per opportunity and fill percentage.
///
/// A full fill is the original candidate untouched. A partial fill floors
/// the quantity, scales the value, and is dropped when fewer than
/// `min_shares` remain.
pub struct PartialExecutionGenerator;

impl PartialExecutionGenerator {
    fn partial(action: &ActionCandidate, pct: f64, min_shares: u64) -> Option<ActionCandidate> {
        if (pct - 1.0).abs() < f64::EPSILON {
            return Some(action.clone());
        }
        let qty = (action.quantity as f64 * pct).floor() as u64;
        if qty < min_shares {
            return None;
        }
        let mut out = action.clone();
        out.quantity = qty;
        out.value_eur = action.value_eur * pct;
        out.reason = format!("{} (partial fill {:.0}%)", action.reason, pct * 100.0);
        Some(out)
    }
}

impl SequenceGenerator for PartialExecutionGenerator {
    fn name(&self) -> &'static str {
        "partial_execution"
    }

    fn default_params(&self) -> Params {
        let mut p = Params::new();
        p.insert(
            "fill_percentages".into(),
            toml::Value::Array(DEFAULT_FILLS.iter().map(|f| toml::Value::Float(*f)).collect()),
        );
        p.insert("min_shares".into(), toml::Value::Integer(1));
        p
    }

    fn generate(
        &self,
        opportunities: &[ActionCandidate],
        _ctx: &OpportunityContext,
        p: &Params,
    ) -> Result<Vec<ActionSequence>> {
        let fills = param_f64_list(p, "fill_percentages", &DEFAULT_FILLS);
        let min_shares = param_u64(p, "min_shares", 1);

        let out = opportunities
            .iter()
            .flat_map(|action| {
                fills
                    .iter()
                    .filter_map(move |&pct| Self::partial(action, pct, min_shares))
            })
            .map(|action| vec![action])
            .collect();
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculators::test_support::context;
    use crate::params::params;
    use crate::side::TradeSide;

    fn candidate(qty: u64) -> ActionCandidate {
        ActionCandidate::new(TradeSide::Buy, "SAP", "SAP", qty, 10.0).with_reason("Underweight")
    }

    fn run(opps: &[ActionCandidate], p: &Params) -> Vec<ActionSequence> {
        let ctx = context(vec![], vec![], 0.0, &[]);
        PartialExecutionGenerator.generate(opps, &ctx, p).unwrap()
    }

    #[test]
    fn full_fill_is_unchanged() {
        let original = candidate(10);
        let out = run(&[original.clone()], &params([("fill_percentages", toml::Value::Array(vec![toml::Value::Float(1.0)]))]));
        assert_eq!(out, vec![vec![original]]);
    }

    #[test]
    fn partial_fills_floor_quantity() {
        let out = run(&[candidate(10)], &PartialExecutionGenerator.default_params());
        assert_eq!(out.len(), 3);
        assert_eq!(out[0][0].quantity, 5);
        assert!((out[0][0].value_eur - 50.0).abs() < 1e-9);
        assert_eq!(out[0][0].reason, "Underweight (partial fill 50%)");
        assert_eq!(out[1][0].quantity, 7);
        assert!((out[1][0].value_eur - 75.0).abs() < 1e-9);
        assert_eq!(out[2][0].quantity, 10);
    }

    #[test]
    fn below_min_shares_is_omitted() {
        // floor(1 * 0.5) = 0 and floor(1 * 0.75) = 0
        let out = run(&[candidate(1)], &PartialExecutionGenerator.default_params());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0][0].quantity, 1);

        let strict = params([("min_shares", 8i64)]);
        let out = run(&[candidate(10)], &strict);
        // 5 and 7 are below 8; the full fill is always kept
        assert_eq!(out.len(), 1);
    }
}
