//! Sell part of positions that have gained enough.

use crate::candidate::ActionCandidate;
use crate::context::OpportunityContext;
use crate::error::Result;
use crate::params::{Params, param_f64, params};
use crate::side::TradeSide;

use super::{OpportunityCalculator, category, sellable_positions};

pub struct ProfitTakingCalculator;

impl OpportunityCalculator for ProfitTakingCalculator {
    fn name(&self) -> &'static str {
        category::PROFIT_TAKING
    }

    fn default_params(&self) -> Params {
        params([
            ("min_gain_threshold", 0.15),
            ("windfall_threshold", 0.30),
            ("sell_percentage", 0.25),
            ("windfall_sell_percentage", 0.5),
        ])
    }

    fn calculate(&self, ctx: &OpportunityContext, p: &Params) -> Result<Vec<ActionCandidate>> {
        if !ctx.allow_sell {
            return Ok(Vec::new());
        }
        let min_gain = param_f64(p, "min_gain_threshold", 0.15);
        let windfall = param_f64(p, "windfall_threshold", 0.30);
        let sell_pct = param_f64(p, "sell_percentage", 0.25);
        let windfall_pct = param_f64(p, "windfall_sell_percentage", 0.5);

        let mut out = Vec::new();
        for (pos, sec) in sellable_positions(ctx) {
            let gain = pos.profit_pct();
            if gain < min_gain {
                continue;
            }
            let is_windfall = gain >= windfall;
            let pct = if is_windfall { windfall_pct } else { sell_pct };

            let lot = sec.min_lot.max(1);
            let mut qty = (pos.quantity * pct).floor() as u64;
            qty -= qty % lot;
            if qty == 0 {
                continue;
            }
            let price = pos.price();
            let value = ctx.to_eur(qty as f64 * price, &pos.currency);

            let mut priority = gain.min(1.0);
            let mut tags = vec!["profit_taking"];
            let reason = if is_windfall {
                priority += 0.3;
                tags.push("windfall");
                format!("Windfall gain of {:.1}%", gain * 100.0)
            } else {
                format!("Gain of {:.1}% above {:.0}% threshold", gain * 100.0, min_gain * 100.0)
            };

            out.push(
                ActionCandidate::new(TradeSide::Sell, &pos.symbol, &sec.name, qty, price)
                    .with_value(value)
                    .with_currency(&pos.currency)
                    .with_priority(priority.min(1.0))
                    .with_reason(reason)
                    .with_tags(&tags),
            );
        }
        Ok(out)
    }
}
