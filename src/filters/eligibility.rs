use crate::candidate::{ActionCandidate, ActionSequence};
use crate::context::OpportunityContext;
use crate::error::Result;
use crate::params::Params;

use super::SequenceFilter;

/// Drops sequences containing an action the account may not take: a sell
/// of an ineligible symbol, a trade against a security's allow flags, or a
/// trade direction disabled globally.
pub struct EligibilityFilter;

fn allowed(action: &ActionCandidate, ctx: &OpportunityContext) -> bool {
    let security = ctx.security(&action.symbol);
    if action.is_sell() {
        ctx.allow_sell
            && !ctx.ineligible_symbols.contains(&action.symbol)
            && security.is_none_or(|s| s.allow_sell)
    } else {
        ctx.allow_buy && security.is_none_or(|s| s.allow_buy)
    }
}

impl SequenceFilter for EligibilityFilter {
    fn name(&self) -> &'static str {
        "eligibility"
    }

    fn default_params(&self) -> Params {
        Params::new()
    }

    fn filter(
        &self,
        sequences: &[ActionSequence],
        ctx: &OpportunityContext,
        _params: &Params,
    ) -> Result<Vec<ActionSequence>> {
        Ok(sequences
            .iter()
            .filter(|seq| seq.iter().all(|a| allowed(a, ctx)))
            .cloned()
            .collect())
    }
}
