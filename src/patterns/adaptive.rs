//! Patterns that react to the portfolio's allocation gaps or to the
//! market regime.

use std::cmp::Ordering;

use log::warn;
use rustc_hash::FxHashMap;

use crate::calculators::Opportunities;
use crate::candidate::{ActionCandidate, ActionSequence};
use crate::context::{MarketRegime, OpportunityContext};
use crate::error::Result;
use crate::params::{Params, param_f64, param_str, param_usize, params};

use super::{DEFAULT_MAX_DEPTH, PatternGenerator, SequenceBuilder, all_sells, max_depth};

/// Underweight keys (target minus current above `threshold`), largest gap
/// first, at most `limit`.
fn underweight(
    targets: &FxHashMap<String, f64>,
    current: &FxHashMap<String, f64>,
    threshold: f64,
    limit: usize,
) -> Vec<String> {
    let mut gaps: Vec<(&String, f64)> = targets
        .iter()
        .map(|(k, t)| (k, t - current.get(k).copied().unwrap_or(0.0)))
        .filter(|(_, gap)| *gap > threshold)
        .collect();
    gaps.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.0.cmp(b.0))
    });
    gaps.into_iter().take(limit).map(|(k, _)| k.clone()).collect()
}

/// Buys in order until one no longer fits.
fn fill_until_short<'a>(
    cash: f64,
    depth: usize,
    buys: impl IntoIterator<Item = &'a ActionCandidate>,
) -> Vec<ActionSequence> {
    let mut seq = SequenceBuilder::new(cash, depth);
    for b in buys {
        if seq.is_full() || seq.cash() < b.value_eur {
            break;
        }
        seq.buy(b);
    }
    seq.finish()
}

/// Targets the largest country and industry allocation gaps, producing one
/// sequence for each dimension.
pub struct AdaptivePattern;

impl PatternGenerator for AdaptivePattern {
    fn name(&self) -> &'static str {
        "adaptive"
    }

    fn default_params(&self) -> Params {
        let mut p = params([
            ("country_gap_threshold", 0.02),
            ("industry_gap_threshold", 0.01),
        ]);
        p.insert("max_depth".into(), toml::Value::Integer(DEFAULT_MAX_DEPTH as i64));
        p.insert("max_gaps".into(), toml::Value::Integer(3));
        p
    }

    fn generate(
        &self,
        opps: &Opportunities,
        available_cash: f64,
        ctx: &OpportunityContext,
        p: &Params,
    ) -> Result<Vec<ActionSequence>> {
        let depth = max_depth(p);
        let limit = param_usize(p, "max_gaps", 3);
        let portfolio = &ctx.portfolio;

        let countries = underweight(
            &portfolio.country_weights,
            &portfolio.country_allocations(),
            param_f64(p, "country_gap_threshold", 0.02),
            limit,
        );
        let industries = underweight(
            &portfolio.industry_weights,
            &portfolio.industry_allocations(),
            param_f64(p, "industry_gap_threshold", 0.01),
            limit,
        );

        let mut buys = opps.rebalance_buys();
        buys.extend(opps.opportunity_buys());

        let mut out = Vec::new();
        if !countries.is_empty() {
            let in_country = buys.iter().copied().filter(|b| {
                ctx.security(&b.symbol)
                    .and_then(|s| s.country.as_ref())
                    .is_some_and(|c| countries.contains(c))
            });
            out.extend(fill_until_short(available_cash, depth, in_country));
        }
        if !industries.is_empty() {
            let in_industry = buys.iter().copied().filter(|b| {
                ctx.security(&b.symbol).is_some_and(|s| {
                    s.industries()
                        .iter()
                        .any(|i| industries.iter().any(|u| u.as_str() == *i))
                })
            });
            out.extend(fill_until_short(available_cash, depth, in_industry));
        }
        Ok(out)
    }
}

/// Strategy chosen by market regime: take profits in a bull market, average
/// down in a bear market, rebalance sideways.
pub struct MarketRegimePattern;

impl PatternGenerator for MarketRegimePattern {
    fn name(&self) -> &'static str {
        "market_regime"
    }

    fn generate(
        &self,
        opps: &Opportunities,
        available_cash: f64,
        ctx: &OpportunityContext,
        p: &Params,
    ) -> Result<Vec<ActionSequence>> {
        let regime = match param_str(p, "regime") {
            Some(raw) => raw.parse().unwrap_or_else(|e| {
                warn!("market_regime: {e}, using {}", ctx.market_regime);
                ctx.market_regime
            }),
            None => ctx.market_regime,
        };

        let depth = max_depth(p);
        let mut seq = SequenceBuilder::new(available_cash, depth);
        match regime {
            MarketRegime::Bull => {
                seq.sells_up_to(opps.profit_taking(), 2);
                let mut buys = opps.opportunity_buys();
                buys.extend(opps.rebalance_buys());
                seq.buys(buys);
            }
            MarketRegime::Bear => {
                seq.sells_up_to(all_sells(opps), depth / 2);
                seq.buys(opps.averaging_down());
            }
            MarketRegime::Sideways => {
                seq.sells_up_to(opps.rebalance_sells(), 2);
                let mut buys = opps.rebalance_buys();
                buys.extend(opps.opportunity_buys());
                seq.buys(buys);
            }
        }
        Ok(seq.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculators::test_support::context;
    use crate::patterns::test_support::*;
    use crate::portfolio::{Position, Security};

    fn adaptive_ctx() -> OpportunityContext {
        let securities = vec![
            Security::new("US1", "US1").with_country("US").with_industry("Tech"),
            Security::new("DE1", "DE1").with_country("DE").with_industry("Autos"),
            Security::new("JP1", "JP1").with_country("JP").with_industry("Tech"),
        ];
        let mut ctx = context(
            vec![Position::new("US1", 10.0, 100.0)],
            securities,
            1000.0,
            &[("DE1", 100.0), ("JP1", 100.0)],
        );
        ctx.portfolio.country_weights.insert("US".into(), 0.4);
        ctx.portfolio.country_weights.insert("DE".into(), 0.6);
        ctx.portfolio.industry_weights.insert("Autos".into(), 0.3);
        ctx
    }

    #[test]
    fn adaptive_builds_country_and_industry_sequences() {
        let ctx = adaptive_ctx();
        let opps = opportunities(vec![
            (RB, vec![buy("DE1", 300.0, 0.5)]),
            (OB, vec![buy("JP1", 200.0, 0.9)]),
        ]);
        let p = AdaptivePattern.default_params();
        let out = AdaptivePattern.generate(&opps, 1000.0, &ctx, &p).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(symbols(&out[0]), vec!["DE1"]);
        assert_eq!(symbols(&out[1]), vec!["DE1"]);
    }

    #[test]
    fn adaptive_stops_at_first_unaffordable() {
        let ctx = adaptive_ctx();
        let opps = opportunities(vec![(
            RB,
            vec![buy("DE1", 2000.0, 0.5), buy("DE2", 10.0, 0.4)],
        )]);
        let p = AdaptivePattern.default_params();
        assert!(AdaptivePattern.generate(&opps, 1000.0, &ctx, &p).unwrap().is_empty());
    }

    fn regime_opps() -> Opportunities {
        opportunities(vec![
            (PT, vec![sell("P1", 100.0, 0.9), sell("P2", 100.0, 0.8), sell("P3", 100.0, 0.7)]),
            (RS, vec![sell("R1", 100.0, 0.6)]),
            (AD, vec![buy("A1", 150.0, 0.5)]),
            (RB, vec![buy("B1", 100.0, 0.4)]),
            (OB, vec![buy("O1", 100.0, 0.3)]),
        ])
    }

    fn regime_run(regime: &str) -> Vec<ActionSequence> {
        let ctx = context(vec![], vec![], 0.0, &[]);
        let mut p = MarketRegimePattern.default_params();
        p.insert("regime".into(), toml::Value::String(regime.into()));
        MarketRegimePattern.generate(&regime_opps(), 0.0, &ctx, &p).unwrap()
    }

    #[test]
    fn bull_takes_two_profits() {
        assert_eq!(symbols(&regime_run("bull")[0]), vec!["P1", "P2", "O1", "B1"]);
    }

    #[test]
    fn bear_averages_down() {
        assert_eq!(symbols(&regime_run("bear")[0]), vec!["P1", "P2", "A1"]);
    }

    #[test]
    fn sideways_rebalances() {
        assert_eq!(symbols(&regime_run("sideways")[0]), vec!["R1", "B1"]);
    }

    #[test]
    fn regime_defaults_to_context() {
        let mut ctx = context(vec![], vec![], 0.0, &[]);
        ctx.market_regime = MarketRegime::Bull;
        let out = MarketRegimePattern
            .generate(&regime_opps(), 0.0, &ctx, &MarketRegimePattern.default_params())
            .unwrap();
        assert_eq!(symbols(&out[0])[0], "P1");
    }
}
