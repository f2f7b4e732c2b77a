use crate::candidate::ActionSequence;
use crate::context::OpportunityContext;
use crate::error::Result;
use crate::params::Params;

use super::SequenceFilter;

/// Drops sequences that buy back a recently sold symbol or sell a recently
/// bought one.
pub struct RecentlyTradedFilter;

impl SequenceFilter for RecentlyTradedFilter {
    fn name(&self) -> &'static str {
        "recently_traded"
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
            .filter(|seq| {
                !seq.iter().any(|a| {
                    (a.is_buy() && ctx.recently_sold.contains(&a.symbol))
                        || (a.is_sell() && ctx.recently_bought.contains(&a.symbol))
                })
            })
            .cloned()
            .collect())
    }
}
