//! Add to quality positions that are temporarily down.

use crate::candidate::ActionCandidate;
use crate::context::OpportunityContext;
use crate::error::Result;
use crate::params::{Params, param_f64, param_usize, params};
use crate::side::TradeSide;

use super::{OpportunityCalculator, category, lots_for_value, position_value_eur, sort_by_priority};

pub struct AveragingDownCalculator;

impl OpportunityCalculator for AveragingDownCalculator {
    fn name(&self) -> &'static str {
        category::AVERAGING_DOWN
    }

    fn default_params(&self) -> Params {
        let mut p = params([
            ("max_loss_percent", -0.20),
            ("min_loss_percent", -0.05),
            ("min_score", 0.6),
            ("averaging_down_percent", 0.10),
            ("max_value_per_position", 500.0),
            ("max_cost_ratio", 0.01),
        ]);
        p.insert("max_positions".into(), toml::Value::Integer(3));
        p
    }

    fn calculate(&self, ctx: &OpportunityContext, p: &Params) -> Result<Vec<ActionCandidate>> {
        if !ctx.allow_buy {
            return Ok(Vec::new());
        }
        let max_loss = param_f64(p, "max_loss_percent", -0.20);
        let min_loss = param_f64(p, "min_loss_percent", -0.05);
        let min_score = param_f64(p, "min_score", 0.6);
        let top_up_pct = param_f64(p, "averaging_down_percent", 0.10);
        let max_value = param_f64(p, "max_value_per_position", 500.0);
        let max_cost_ratio = param_f64(p, "max_cost_ratio", 0.01);
        let max_positions = param_usize(p, "max_positions", 3);

        let min_trade = ctx.costs.min_trade_amount(max_cost_ratio);

        let mut out = Vec::new();
        for pos in &ctx.positions {
            if ctx.recently_bought.contains(&pos.symbol) {
                continue;
            }
            let Some(sec) = ctx.security(&pos.symbol).filter(|s| s.allow_buy) else {
                continue;
            };
            let loss = pos.profit_pct();
            if loss < max_loss || loss > min_loss {
                continue;
            }
            let quality = sec.quality();
            if quality < min_score {
                continue;
            }
            let Some(price) = ctx.price(&pos.symbol) else {
                continue;
            };
            let price_eur = ctx.to_eur(price, &sec.currency);

            let target = (position_value_eur(ctx, pos) * top_up_pct)
                .max(min_trade)
                .min(max_value);
            let qty = lots_for_value(target, price_eur, sec.min_lot);
            if qty == 0 {
                continue;
            }

            let priority = (-loss * 2.0 + quality * 0.5).min(1.0);
            out.push(
                ActionCandidate::new(TradeSide::Buy, &sec.symbol, &sec.name, qty, price)
                    .with_value(qty as f64 * price_eur)
                    .with_currency(&sec.currency)
                    .with_priority(priority)
                    .with_reason(format!(
                        "Down {:.1}% with quality score {:.2}",
                        -loss * 100.0,
                        quality
                    ))
                    .with_tags(&["averaging_down", "value_opportunity"]),
            );
        }

        sort_by_priority(&mut out);
        out.truncate(max_positions);
        Ok(out)
    }
}
