//! Sequence filters: policy-level pruning applied in configured order.
//!
//! Filters take the sequence set by reference so a failing filter leaves
//! its input intact for the next one.

mod correlation;
mod diversity;
mod eligibility;
mod recently_traded;

pub use correlation::CorrelationAwareFilter;
pub use diversity::DiversityFilter;
pub use eligibility::EligibilityFilter;
pub use recently_traded::RecentlyTradedFilter;

use std::sync::Arc;

use log::{debug, warn};

use crate::candidate::ActionSequence;
use crate::context::OpportunityContext;
use crate::error::Result;
use crate::params::Params;
use crate::ports::CorrelationSource;

pub trait SequenceFilter: Send + Sync {
    fn name(&self) -> &'static str;
    fn default_params(&self) -> Params;
    fn filter(
        &self,
        sequences: &[ActionSequence],
        ctx: &OpportunityContext,
        params: &Params,
    ) -> Result<Vec<ActionSequence>>;
}

/// Built-in filters in canonical order.
pub fn builtin(correlations: Option<Arc<dyn CorrelationSource>>) -> Vec<Arc<dyn SequenceFilter>> {
    vec![
        Arc::new(CorrelationAwareFilter::new(correlations)),
        Arc::new(DiversityFilter),
        Arc::new(EligibilityFilter),
        Arc::new(RecentlyTradedFilter),
    ]
}

/// Run filters in order, each on the previous one's output. A filter that
/// fails is logged and skipped.
pub fn apply_filters(
    filters: &[(Arc<dyn SequenceFilter>, Params)],
    sequences: Vec<ActionSequence>,
    ctx: &OpportunityContext,
) -> Vec<ActionSequence> {
    filters
        .iter()
        .fold(sequences, |current, (filter, params)| {
            match filter.filter(&current, ctx, params) {
                Ok(kept) => {
                    debug!("filter {}: {} -> {} sequences", filter.name(), current.len(), kept.len());
                    kept
                }
                Err(e) => {
                    warn!("filter {} failed, passing sequences through: {e}", filter.name());
                    current
                }
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculators::test_support::context;
    use crate::candidate::ActionCandidate;
    use crate::error::Error;
    use crate::side::TradeSide;

    struct Failing;

    impl SequenceFilter for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }
        fn default_params(&self) -> Params {
            Params::new()
        }
        fn filter(&self, _: &[ActionSequence], _: &OpportunityContext, _: &Params) -> Result<Vec<ActionSequence>> {
            Err(Error::module("failing", "no data"))
        }
    }

    struct DropAll;

    impl SequenceFilter for DropAll {
        fn name(&self) -> &'static str {
            "drop_all"
        }
        fn default_params(&self) -> Params {
            Params::new()
        }
        fn filter(&self, _: &[ActionSequence], _: &OpportunityContext, _: &Params) -> Result<Vec<ActionSequence>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn failing_filter_passes_input_through() {
        let ctx = context(vec![], vec![], 0.0, &[]);
        let seqs = vec![vec![ActionCandidate::new(TradeSide::Buy, "A", "A", 1, 1.0)]];
        let chain: Vec<(Arc<dyn SequenceFilter>, Params)> = vec![(Arc::new(Failing), Params::new())];
        assert_eq!(apply_filters(&chain, seqs.clone(), &ctx), seqs);

        let chain: Vec<(Arc<dyn SequenceFilter>, Params)> = vec![
            (Arc::new(Failing), Params::new()),
            (Arc::new(DropAll), Params::new()),
        ];
        assert!(apply_filters(&chain, seqs, &ctx).is_empty());
    }

    #[test]
    fn builtin_order() {
        let names: Vec<&str> = builtin(None).iter().map(|f| f.name()).collect();
        assert_eq!(names, vec!["correlation_aware", "diversity", "eligibility", "recently_traded"]);
    }
}
