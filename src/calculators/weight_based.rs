//! Trades toward externally optimized target weights.

use std::cmp::Ordering;

use crate::candidate::ActionCandidate;
use crate::context::OpportunityContext;
use crate::error::Result;
use crate::params::{Params, param_f64, param_usize, params};
use crate::side::TradeSide;

use super::{
    OpportunityCalculator, buyable_securities, category, lots_for_value, position_value_eur,
    sellable_positions,
};

pub struct WeightBasedCalculator;

impl WeightBasedCalculator {
    /// Target minus current weight for every targeted or held symbol whose
    /// gap exceeds `min_diff`, largest gap first.
    fn gaps(ctx: &OpportunityContext, min_diff: f64) -> Vec<(String, f64)> {
        let Some(targets) = &ctx.target_weights else {
            return Vec::new();
        };
        let mut symbols: Vec<&String> = targets.keys().collect();
        for pos in &ctx.positions {
            if !targets.contains_key(&pos.symbol) {
                symbols.push(&pos.symbol);
            }
        }
        let mut gaps: Vec<(String, f64)> = symbols
            .into_iter()
            .map(|s| {
                let target = targets.get(s).copied().unwrap_or(0.0);
                (s.clone(), target - ctx.portfolio.weight(s))
            })
            .filter(|(_, gap)| gap.abs() > min_diff)
            .collect();
        gaps.sort_by(|a, b| {
            b.1.abs()
                .partial_cmp(&a.1.abs())
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        gaps
    }
}

impl OpportunityCalculator for WeightBasedCalculator {
    fn name(&self) -> &'static str {
        category::WEIGHT_BASED
    }

    fn default_params(&self) -> Params {
        let mut p = params([
            ("min_weight_diff", 0.02),
            ("max_value_per_trade", 500.0),
            ("max_sell_percentage", 1.0),
        ]);
        p.insert("max_buy_positions".into(), toml::Value::Integer(5));
        p.insert("max_sell_positions".into(), toml::Value::Integer(5));
        p
    }

    fn calculate(&self, ctx: &OpportunityContext, p: &Params) -> Result<Vec<ActionCandidate>> {
        if ctx.total_value <= 0.0 {
            return Ok(Vec::new());
        }
        let min_diff = param_f64(p, "min_weight_diff", 0.02);
        let max_value = param_f64(p, "max_value_per_trade", 500.0);
        let max_sell_pct = param_f64(p, "max_sell_percentage", 1.0);
        let max_buys = param_usize(p, "max_buy_positions", 5);
        let max_sells = param_usize(p, "max_sell_positions", 5);

        let gaps = Self::gaps(ctx, min_diff);
        let mut buys = Vec::new();
        let mut sells = Vec::new();

        for (symbol, gap) in &gaps {
            let value = (gap.abs() * ctx.total_value).min(max_value);
            if !ctx.costs.is_worthwhile(value) {
                continue;
            }
            let base = gap.abs() * 0.8;

            if *gap > 0.0 {
                if !ctx.allow_buy || buys.len() >= max_buys {
                    continue;
                }
                let Some((sec, price)) = buyable_securities(ctx).find(|(s, _)| &s.symbol == symbol)
                else {
                    continue;
                };
                let price_eur = ctx.to_eur(price, &sec.currency);
                let qty = lots_for_value(value, price_eur, sec.min_lot);
                if qty == 0 {
                    continue;
                }
                let below_cost = ctx.position(symbol).is_some_and(|pos| price < pos.avg_price);
                let kind = if below_cost { "averaging_down" } else { "rebalance" };
                let priority = (base * sec.priority_multiplier + 0.2).min(1.0);
                buys.push(
                    ActionCandidate::new(TradeSide::Buy, symbol, &sec.name, qty, price)
                        .with_value(qty as f64 * price_eur)
                        .with_currency(&sec.currency)
                        .with_priority(priority)
                        .with_reason(format!(
                            "Optimizer target {:+.1}% above current weight",
                            gap * 100.0
                        ))
                        .with_tags(&["optimizer_target", kind]),
                );
            } else {
                if !ctx.allow_sell || sells.len() >= max_sells {
                    continue;
                }
                let Some((pos, sec)) = sellable_positions(ctx).find(|(pos, _)| &pos.symbol == symbol)
                else {
                    continue;
                };
                let price_eur = ctx.to_eur(pos.price(), &pos.currency);
                if price_eur <= 0.0 {
                    continue;
                }
                let cap = position_value_eur(ctx, pos) * max_sell_pct;
                let lot = sec.min_lot.max(1);
                let mut qty = ((value.min(cap) / price_eur).floor() as u64)
                    .min(pos.quantity.floor() as u64);
                qty -= qty % lot;
                if qty == 0 {
                    continue;
                }
                let multiplier = if sec.priority_multiplier > 0.0 {
                    sec.priority_multiplier
                } else {
                    1.0
                };
                let priority = (base / multiplier + 0.2).min(1.0);
                sells.push(
                    ActionCandidate::new(TradeSide::Sell, symbol, &sec.name, qty, pos.price())
                        .with_value(qty as f64 * price_eur)
                        .with_currency(&pos.currency)
                        .with_priority(priority)
                        .with_reason(format!(
                            "Optimizer target {:.1}% below current weight",
                            -gap * 100.0
                        ))
                        .with_tags(&["optimizer_target", "rebalance"]),
                );
            }
        }

        buys.extend(sells);
        Ok(buys)
    }
}
