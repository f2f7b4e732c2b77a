//! Country-allocation rebalancing: trim overweight countries and add to
//! underweight ones.

use crate::candidate::ActionCandidate;
use crate::context::OpportunityContext;
use crate::error::Result;
use crate::params::{Params, param_f64, param_usize, params};
use crate::side::TradeSide;

use super::{
    OpportunityCalculator, buyable_securities, category, lots_for_value, position_value_eur,
    sellable_positions, sort_by_priority,
};

/// Allocation minus target for every country that has a target.
fn country_gaps(ctx: &OpportunityContext) -> Vec<(String, f64)> {
    let current = ctx.portfolio.country_allocations();
    let mut gaps: Vec<(String, f64)> = ctx
        .portfolio
        .country_weights
        .iter()
        .map(|(country, target)| {
            let now = current.get(country).copied().unwrap_or(0.0);
            (country.clone(), now - target)
        })
        .collect();
    gaps.sort_by(|a, b| a.0.cmp(&b.0));
    gaps
}

fn country_of<'a>(ctx: &'a OpportunityContext, symbol: &str) -> Option<&'a str> {
    ctx.security(symbol).and_then(|s| s.country.as_deref())
}

pub struct RebalanceSellsCalculator;

impl OpportunityCalculator for RebalanceSellsCalculator {
    fn name(&self) -> &'static str {
        category::REBALANCE_SELLS
    }

    fn default_params(&self) -> Params {
        params([("overweight_threshold", 0.05), ("max_sell_percentage", 0.3)])
    }

    fn calculate(&self, ctx: &OpportunityContext, p: &Params) -> Result<Vec<ActionCandidate>> {
        if !ctx.allow_sell || ctx.total_value <= 0.0 {
            return Ok(Vec::new());
        }
        let threshold = param_f64(p, "overweight_threshold", 0.05);
        let max_sell_pct = param_f64(p, "max_sell_percentage", 0.3);

        let overweight: Vec<(String, f64)> = country_gaps(ctx)
            .into_iter()
            .filter(|(_, excess)| *excess > threshold)
            .collect();
        if overweight.is_empty() {
            return Ok(Vec::new());
        }

        let mut out = Vec::new();
        for (pos, sec) in sellable_positions(ctx) {
            let Some(country) = country_of(ctx, &pos.symbol) else {
                continue;
            };
            let Some((_, excess)) = overweight.iter().find(|(c, _)| c == country) else {
                continue;
            };
            let price_eur = ctx.to_eur(pos.price(), &pos.currency);
            if price_eur <= 0.0 {
                continue;
            }
            let position_value = position_value_eur(ctx, pos);
            let value = (excess * ctx.total_value).min(position_value * max_sell_pct);

            let lot = sec.min_lot.max(1);
            let mut qty = ((value / price_eur).floor() as u64).min(pos.quantity.floor() as u64);
            qty -= qty % lot;
            if qty == 0 {
                continue;
            }

            let tag = format!("overweight_{}", country.to_lowercase());
            out.push(
                ActionCandidate::new(TradeSide::Sell, &pos.symbol, &sec.name, qty, pos.price())
                    .with_value(qty as f64 * price_eur)
                    .with_currency(&pos.currency)
                    .with_priority((excess * 2.0).min(1.0))
                    .with_reason(format!(
                        "{country} is {:.1}% above its target allocation",
                        excess * 100.0
                    ))
                    .with_tags(&["rebalance", tag.as_str()]),
            );
        }
        Ok(out)
    }
}

pub struct RebalanceBuysCalculator;

impl OpportunityCalculator for RebalanceBuysCalculator {
    fn name(&self) -> &'static str {
        category::REBALANCE_BUYS
    }

    fn default_params(&self) -> Params {
        let mut p = params([
            ("min_underweight_threshold", 0.05),
            ("min_score", 0.65),
            ("max_value_per_position", 500.0),
        ]);
        p.insert("max_positions".into(), toml::Value::Integer(5));
        p
    }

    fn calculate(&self, ctx: &OpportunityContext, p: &Params) -> Result<Vec<ActionCandidate>> {
        if !ctx.allow_buy || ctx.total_value <= 0.0 {
            return Ok(Vec::new());
        }
        let threshold = param_f64(p, "min_underweight_threshold", 0.05);
        let min_score = param_f64(p, "min_score", 0.65);
        let max_value = param_f64(p, "max_value_per_position", 500.0);
        let max_positions = param_usize(p, "max_positions", 5);

        let underweight: Vec<(String, f64)> = country_gaps(ctx)
            .into_iter()
            .filter(|(_, gap)| -gap >= threshold)
            .map(|(c, gap)| (c, -gap))
            .collect();
        if underweight.is_empty() {
            return Ok(Vec::new());
        }

        let mut out = Vec::new();
        for (sec, price) in buyable_securities(ctx) {
            let Some(country) = sec.country.as_deref() else {
                continue;
            };
            let Some((_, gap)) = underweight.iter().find(|(c, _)| c == country) else {
                continue;
            };
            let quality = sec.quality();
            if quality < min_score {
                continue;
            }
            let price_eur = ctx.to_eur(price, &sec.currency);
            let target = (gap * ctx.total_value).min(max_value);
            let qty = lots_for_value(target, price_eur, sec.min_lot);
            if qty == 0 {
                continue;
            }

            let priority = (gap * 2.0 * quality + 0.2 * quality).min(1.0);
            let tag = format!("underweight_{}", country.to_lowercase());
            out.push(
                ActionCandidate::new(TradeSide::Buy, &sec.symbol, &sec.name, qty, price)
                    .with_value(qty as f64 * price_eur)
                    .with_currency(&sec.currency)
                    .with_priority(priority)
                    .with_reason(format!(
                        "{country} is {:.1}% below its target allocation",
                        gap * 100.0
                    ))
                    .with_tags(&["rebalance", tag.as_str()]),
            );
        }

        sort_by_priority(&mut out);
        if max_positions > 0 {
            out.truncate(max_positions);
        }
        Ok(out)
    }
}
