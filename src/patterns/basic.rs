//! Single-theme patterns.

use std::cmp::Ordering;

use crate::calculators::Opportunities;
use crate::candidate::{ActionCandidate, ActionSequence};
use crate::context::OpportunityContext;
use crate::error::Result;
use crate::params::Params;

use super::{PatternGenerator, SequenceBuilder, all_buys, all_sells, max_depth};

/// Spend available cash on buys: averaging down first, then rebalance,
/// then opportunities.
pub struct DirectBuyPattern;

impl PatternGenerator for DirectBuyPattern {
    fn name(&self) -> &'static str {
        "direct_buy"
    }

    fn generate(
        &self,
        opps: &Opportunities,
        available_cash: f64,
        _ctx: &OpportunityContext,
        p: &Params,
    ) -> Result<Vec<ActionSequence>> {
        if available_cash <= 0.0 {
            return Ok(Vec::new());
        }
        let mut seq = SequenceBuilder::new(available_cash, max_depth(p));
        seq.buys(all_buys(opps));
        Ok(seq.finish())
    }
}

/// Take profits, then reinvest in averaging-down and rebalance buys.
pub struct ProfitTakingPattern;

impl PatternGenerator for ProfitTakingPattern {
    fn name(&self) -> &'static str {
        "profit_taking"
    }

    fn generate(
        &self,
        opps: &Opportunities,
        available_cash: f64,
        _ctx: &OpportunityContext,
        p: &Params,
    ) -> Result<Vec<ActionSequence>> {
        let sells = opps.profit_taking();
        if sells.is_empty() {
            return Ok(Vec::new());
        }
        let depth = max_depth(p);
        let mut seq = SequenceBuilder::new(available_cash, depth);
        seq.sells_up_to(sells, depth);
        let mut buys = opps.averaging_down();
        buys.extend(opps.rebalance_buys());
        seq.buys(buys);
        Ok(seq.finish())
    }
}

/// Trim overweight holdings, then fill underweight areas.
pub struct RebalancePattern;

impl PatternGenerator for RebalancePattern {
    fn name(&self) -> &'static str {
        "rebalance"
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
        seq.sells_up_to(opps.rebalance_sells(), depth);
        seq.buys(opps.rebalance_buys());
        Ok(seq.finish())
    }
}

/// Buy more of quality positions that are down, funding the first buy with
/// the top profit-taking sell when cash is short.
pub struct AveragingDownPattern;

impl PatternGenerator for AveragingDownPattern {
    fn name(&self) -> &'static str {
        "averaging_down"
    }

    fn generate(
        &self,
        opps: &Opportunities,
        available_cash: f64,
        _ctx: &OpportunityContext,
        p: &Params,
    ) -> Result<Vec<ActionSequence>> {
        let buys = opps.averaging_down();
        let Some(first) = buys.first() else {
            return Ok(Vec::new());
        };
        let mut seq = SequenceBuilder::new(available_cash, max_depth(p));
        if available_cash < first.value_eur {
            if let Some(funding) = opps.profit_taking().first() {
                seq.sell(funding);
            }
        }
        seq.buys(buys);
        Ok(seq.finish())
    }
}

/// The single highest-priority opportunity across all categories.
pub struct SingleBestPattern;

impl PatternGenerator for SingleBestPattern {
    fn name(&self) -> &'static str {
        "single_best"
    }

    fn generate(
        &self,
        opps: &Opportunities,
        available_cash: f64,
        _ctx: &OpportunityContext,
        p: &Params,
    ) -> Result<Vec<ActionSequence>> {
        let all = opps.flatten();
        // First candidate wins ties
        let best = all.iter().fold(None, |best: Option<&ActionCandidate>, c| match best {
            Some(b) if c.priority.partial_cmp(&b.priority) != Some(Ordering::Greater) => Some(b),
            _ => Some(c),
        });
        let Some(best) = best else {
            return Ok(Vec::new());
        };
        let mut seq = SequenceBuilder::new(available_cash, max_depth(p));
        if best.is_sell() {
            seq.sell(best);
        } else {
            seq.buy(best);
        }
        Ok(seq.finish())
    }
}

/// Several sells, with the proceeds reinvested in whatever buys fit.
pub struct MultiSellPattern;

impl PatternGenerator for MultiSellPattern {
    fn name(&self) -> &'static str {
        "multi_sell"
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
        seq.buys(all_buys(opps));
        Ok(seq.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculators::test_support::context;
    use crate::params::params;
    use crate::patterns::test_support::*;

    fn depth(n: i64) -> Params {
        params([("max_depth", n)])
    }

    fn run(
        pattern: &dyn PatternGenerator,
        opps: &Opportunities,
        cash: f64,
        p: &Params,
    ) -> Vec<ActionSequence> {
        let ctx = context(vec![], vec![], cash, &[]);
        pattern.generate(opps, cash, &ctx, p).unwrap()
    }

    #[test]
    fn averaging_down_with_enough_cash_needs_no_sell() {
        let opps = opportunities(vec![
            (AD, vec![buy("X", 400.0, 0.8)]),
            (PT, vec![sell("Y", 300.0, 0.5)]),
        ]);
        let out = run(&AveragingDownPattern, &opps, 1000.0, &depth(5));
        assert_eq!(out.len(), 1);
        assert_eq!(symbols(&out[0]), vec!["X"]);
    }

    #[test]
    fn averaging_down_funds_first_buy_with_profit_taking() {
        let opps = opportunities(vec![
            (AD, vec![buy("X", 400.0, 0.8)]),
            (PT, vec![sell("Y", 300.0, 0.5)]),
        ]);
        let out = run(&AveragingDownPattern, &opps, 200.0, &depth(5));
        assert_eq!(symbols(&out[0]), vec!["Y", "X"]);
    }

    #[test]
    fn averaging_down_without_candidates_is_empty() {
        let opps = opportunities(vec![(PT, vec![sell("Y", 300.0, 0.5)])]);
        assert!(run(&AveragingDownPattern, &opps, 1000.0, &depth(5)).is_empty());
    }

    #[test]
    fn multi_sell_concatenates_sells_up_to_depth() {
        let opps = opportunities(vec![
            (PT, vec![sell("A", 500.0, 0.6)]),
            (RS, vec![sell("B", 300.0, 0.4), sell("C", 100.0, 0.3)]),
        ]);
        let out = run(&MultiSellPattern, &opps, 0.0, &depth(2));
        assert_eq!(symbols(&out[0]), vec!["A", "B"]);
        let proceeds: f64 = out[0].iter().map(|a| a.value_eur).sum();
        assert_eq!(proceeds, 800.0);
    }

    #[test]
    fn multi_sell_reinvests_affordable_buys() {
        let opps = opportunities(vec![
            (PT, vec![sell("A", 500.0, 0.6)]),
            (AD, vec![buy("BIG", 900.0, 0.9)]),
            (OB, vec![buy("SMALL", 400.0, 0.7)]),
        ]);
        let out = run(&MultiSellPattern, &opps, 0.0, &depth(5));
        assert_eq!(symbols(&out[0]), vec!["A", "SMALL"]);
    }

    #[test]
    fn direct_buy_needs_cash() {
        let opps = opportunities(vec![(OB, vec![buy("A", 100.0, 0.7)])]);
        assert!(run(&DirectBuyPattern, &opps, 0.0, &depth(5)).is_empty());
        let out = run(&DirectBuyPattern, &opps, 100.0, &depth(5));
        assert_eq!(symbols(&out[0]), vec!["A"]);
    }

    #[test]
    fn profit_taking_reinvests_in_averaging_and_rebalance() {
        let opps = opportunities(vec![
            (PT, vec![sell("P", 300.0, 0.6)]),
            (RB, vec![buy("R", 250.0, 0.5)]),
            (OB, vec![buy("O", 10.0, 0.9)]),
        ]);
        let out = run(&ProfitTakingPattern, &opps, 0.0, &depth(5));
        assert_eq!(symbols(&out[0]), vec!["P", "R"]);
    }

    #[test]
    fn rebalance_sells_then_buys() {
        let opps = opportunities(vec![
            (RS, vec![sell("S", 300.0, 0.6)]),
            (RB, vec![buy("B", 250.0, 0.5)]),
        ]);
        let out = run(&RebalancePattern, &opps, 0.0, &depth(5));
        assert_eq!(symbols(&out[0]), vec!["S", "B"]);
    }

    #[test]
    fn single_best_prefers_first_on_ties_and_checks_cash() {
        let opps = opportunities(vec![
            (PT, vec![sell("S", 100.0, 0.9)]),
            (OB, vec![buy("B", 100.0, 0.9)]),
        ]);
        let out = run(&SingleBestPattern, &opps, 0.0, &depth(5));
        assert_eq!(symbols(&out[0]), vec!["S"]);

        let buy_only = opportunities(vec![(OB, vec![buy("B", 100.0, 0.9)])]);
        assert!(run(&SingleBestPattern, &buy_only, 50.0, &depth(5)).is_empty());
    }

    #[test]
    fn single_best_picks_highest_priority_across_categories() {
        let opps = opportunities(vec![
            (PT, vec![sell("S", 100.0, 0.4)]),
            (AD, vec![buy("A", 100.0, 0.6)]),
            (OB, vec![buy("B", 100.0, 0.95), buy("C", 100.0, 0.5)]),
        ]);
        let out = run(&SingleBestPattern, &opps, 500.0, &depth(5));
        assert_eq!(out.len(), 1);
        assert_eq!(symbols(&out[0]), vec!["B"]);
    }
}
