//! Patterns that mix sells and buys from several categories.

use std::cmp::Ordering;

use crate::calculators::Opportunities;
use crate::candidate::{ActionCandidate, ActionSequence};
use crate::context::OpportunityContext;
use crate::error::Result;
use crate::params::Params;

use super::{PatternGenerator, SequenceBuilder, all_buys, all_sells, max_depth};

fn half_depth(depth: usize) -> usize {
    (depth / 2).max(1)
}

/// A few sells followed by buys.
pub struct MixedStrategyPattern;

impl PatternGenerator for MixedStrategyPattern {
    fn name(&self) -> &'static str {
        "mixed_strategy"
    }

    fn generate(
        &self,
        opps: &Opportunities,
        available_cash: f64,
        _ctx: &OpportunityContext,
        p: &Params,
    ) -> Result<Vec<ActionSequence>> {
        let depth = max_depth(p);
        let mut seq = SequenceBuilder::new(available_cash, depth);
        let sold = seq.sells_up_to(all_sells(opps), half_depth(depth));
        let bought = seq.buys(all_buys(opps));
        if sold == 0 || bought == 0 {
            return Ok(Vec::new());
        }
        Ok(seq.finish())
    }
}

/// Lead with opportunity buys, then averaging down and rebalance.
pub struct OpportunityFirstPattern;

impl PatternGenerator for OpportunityFirstPattern {
    fn name(&self) -> &'static str {
        "opportunity_first"
    }

    fn generate(
        &self,
        opps: &Opportunities,
        available_cash: f64,
        _ctx: &OpportunityContext,
        p: &Params,
    ) -> Result<Vec<ActionSequence>> {
        let mut buys = opps.opportunity_buys();
        if buys.is_empty() {
            return Ok(Vec::new());
        }
        buys.extend(opps.averaging_down());
        buys.extend(opps.rebalance_buys());
        let mut seq = SequenceBuilder::new(available_cash, max_depth(p));
        seq.buys(buys);
        Ok(seq.finish())
    }
}

/// Rebalance that commits up to half the depth to sells.
pub struct DeepRebalancePattern;

impl PatternGenerator for DeepRebalancePattern {
    fn name(&self) -> &'static str {
        "deep_rebalance"
    }

    fn generate(
        &self,
        opps: &Opportunities,
        available_cash: f64,
        _ctx: &OpportunityContext,
        p: &Params,
    ) -> Result<Vec<ActionSequence>> {
        let sells = opps.rebalance_sells();
        let buys = opps.rebalance_buys();
        if sells.is_empty() || buys.is_empty() {
            return Ok(Vec::new());
        }
        let depth = max_depth(p);
        let mut seq = SequenceBuilder::new(available_cash, depth);
        seq.sells_up_to(sells, half_depth(depth));
        seq.buys(buys);
        Ok(seq.finish())
    }
}

/// Raise cash first, then deploy it starting with opportunities.
pub struct CashGenerationPattern;

impl PatternGenerator for CashGenerationPattern {
    fn name(&self) -> &'static str {
        "cash_generation"
    }

    fn generate(
        &self,
        opps: &Opportunities,
        available_cash: f64,
        _ctx: &OpportunityContext,
        p: &Params,
    ) -> Result<Vec<ActionSequence>> {
        let sells = all_sells(opps);
        if sells.is_empty() {
            return Ok(Vec::new());
        }
        let depth = max_depth(p);
        let mut seq = SequenceBuilder::new(available_cash, depth);
        seq.sells_up_to(sells, depth);
        let mut buys = opps.opportunity_buys();
        buys.extend(opps.averaging_down());
        buys.extend(opps.rebalance_buys());
        seq.buys(buys);
        Ok(seq.finish())
    }
}

/// Every sell first, then only the highest-priority buys that fit, so the
/// sequence trades as little as possible.
pub struct CostOptimizedPattern;

impl PatternGenerator for CostOptimizedPattern {
    fn name(&self) -> &'static str {
        "cost_optimized"
    }

    fn generate(
        &self,
        opps: &Opportunities,
        available_cash: f64,
        _ctx: &OpportunityContext,
        p: &Params,
    ) -> Result<Vec<ActionSequence>> {
        let depth = max_depth(p);
        let mut seq = SequenceBuilder::new(available_cash, depth);
        seq.sells_up_to(all_sells(opps), depth);

        let mut buys: Vec<&ActionCandidate> = all_buys(opps);
        buys.sort_by(|a, b| b.priority.partial_cmp(&a.priority).unwrap_or(Ordering::Equal));
        seq.buys(buys);
        Ok(seq.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculators::test_support::context;
    use crate::params::params;
    use crate::patterns::test_support::*;

    fn run(pattern: &dyn PatternGenerator, opps: &Opportunities, cash: f64, depth: i64) -> Vec<ActionSequence> {
        let ctx = context(vec![], vec![], cash, &[]);
        pattern
            .generate(opps, cash, &ctx, &params([("max_depth", depth)]))
            .unwrap()
    }

    fn mixed_opps() -> Opportunities {
        opportunities(vec![
            (PT, vec![sell("P1", 200.0, 0.7), sell("P2", 200.0, 0.6)]),
            (RS, vec![sell("R1", 100.0, 0.5)]),
            (AD, vec![buy("A1", 150.0, 0.4)]),
            (RB, vec![buy("B1", 100.0, 0.3)]),
            (OB, vec![buy("O1", 120.0, 0.9)]),
        ])
    }

    #[test]
    fn mixed_uses_half_depth_for_sells() {
        let out = run(&MixedStrategyPattern, &mixed_opps(), 0.0, 4);
        assert_eq!(symbols(&out[0]), vec!["P1", "P2", "A1", "B1"]);
    }

    #[test]
    fn mixed_needs_both_sides() {
        let opps = opportunities(vec![(PT, vec![sell("P1", 200.0, 0.7)])]);
        assert!(run(&MixedStrategyPattern, &opps, 0.0, 4).is_empty());
    }

    #[test]
    fn opportunity_first_ordering() {
        let out = run(&OpportunityFirstPattern, &mixed_opps(), 1000.0, 5);
        assert_eq!(symbols(&out[0]), vec!["O1", "A1", "B1"]);
    }

    #[test]
    fn deep_rebalance_requires_both_rebalance_sides() {
        let out = run(&DeepRebalancePattern, &mixed_opps(), 0.0, 5);
        assert_eq!(symbols(&out[0]), vec!["R1", "B1"]);
        let sells_only = opportunities(vec![(RS, vec![sell("R1", 100.0, 0.5)])]);
        assert!(run(&DeepRebalancePattern, &sells_only, 0.0, 5).is_empty());
    }

    #[test]
    fn cash_generation_sells_then_opportunities() {
        let out = run(&CashGenerationPattern, &mixed_opps(), 0.0, 5);
        assert_eq!(symbols(&out[0]), vec!["P1", "P2", "R1", "O1", "A1"]);
    }

    #[test]
    fn cost_optimized_buys_by_priority() {
        let out = run(&CostOptimizedPattern, &mixed_opps(), 0.0, 5);
        assert_eq!(symbols(&out[0]), vec!["P1", "P2", "R1", "O1", "A1"]);
        let out = run(&CostOptimizedPattern, &mixed_opps(), 0.0, 4);
        assert_eq!(symbols(&out[0]), vec!["P1", "P2", "R1", "O1"]);
    }
}
