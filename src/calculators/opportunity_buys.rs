//! Buy high-quality securities from the universe.

use crate::candidate::ActionCandidate;
use crate::context::OpportunityContext;
use crate::error::Result;
use crate::params::{Params, param_bool, param_f64, param_usize, params};
use crate::side::TradeSide;

use super::{OpportunityCalculator, buyable_securities, category, lots_for_value, sort_by_priority};

pub struct OpportunityBuysCalculator;

impl OpportunityCalculator for OpportunityBuysCalculator {
    fn name(&self) -> &'static str {
        category::OPPORTUNITY_BUYS
    }

    fn default_params(&self) -> Params {
        let mut p = params([("min_score", 0.7), ("max_value_per_position", 500.0)]);
        p.insert("max_positions".into(), toml::Value::Integer(5));
        p.insert("exclude_existing".into(), toml::Value::Boolean(false));
        p
    }

    fn calculate(&self, ctx: &OpportunityContext, p: &Params) -> Result<Vec<ActionCandidate>> {
        if !ctx.allow_buy {
            return Ok(Vec::new());
        }
        let min_score = param_f64(p, "min_score", 0.7);
        let max_value = param_f64(p, "max_value_per_position", 500.0);
        let max_positions = param_usize(p, "max_positions", 5);
        let exclude_existing = param_bool(p, "exclude_existing", false);

        // With no cash on hand the buy is sized for funding by earlier sells.
        let target = if ctx.available_cash > 0.0 {
            max_value.min(ctx.available_cash)
        } else {
            max_value
        };

        let mut out = Vec::new();
        for (sec, price) in buyable_securities(ctx) {
            if exclude_existing && ctx.is_held(&sec.symbol) {
                continue;
            }
            let quality = sec.quality();
            if quality < min_score {
                continue;
            }
            let price_eur = ctx.to_eur(price, &sec.currency);
            let qty = lots_for_value(target, price_eur, sec.min_lot);
            if qty == 0 {
                continue;
            }
            out.push(
                ActionCandidate::new(TradeSide::Buy, &sec.symbol, &sec.name, qty, price)
                    .with_value(qty as f64 * price_eur)
                    .with_currency(&sec.currency)
                    .with_priority(quality.min(1.0))
                    .with_reason(format!("High quality score ({:.2})", quality))
                    .with_tags(&["opportunity", "quality"]),
            );
        }

        sort_by_priority(&mut out);
        out.truncate(max_positions);
        Ok(out)
    }
}
