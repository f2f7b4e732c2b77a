use serde_json::json;

use crate::candidate::ActionCandidate;
use crate::error::Result;
use crate::portfolio::{PortfolioContext, TransactionCosts};
use crate::ports::{PortfolioScore, PortfolioScorer};

use super::ScoreBreakdown;

/// Score an end state: the portfolio score (scaled to [0, 1]) minus a
/// penalty proportional to the sequence's transaction costs.
pub fn evaluate_end_state(
    end: &PortfolioContext,
    sequence: &[ActionCandidate],
    costs: &TransactionCosts,
    cost_penalty_factor: f64,
    scorer: &dyn PortfolioScorer,
) -> Result<(f64, ScoreBreakdown)> {
    let portfolio = scorer.score(end)?;
    Ok(combine(&portfolio, end.total_value, sequence, costs, cost_penalty_factor))
}

pub(crate) fn combine(
    portfolio: &PortfolioScore,
    total_value: f64,
    sequence: &[ActionCandidate],
    costs: &TransactionCosts,
    cost_penalty_factor: f64,
) -> (f64, ScoreBreakdown) {
    let diversification = portfolio.total / 100.0;
    let cost = costs.sequence_cost(sequence);
    let penalty = if total_value > 0.0 {
        cost / total_value * cost_penalty_factor
    } else {
        0.0
    };
    let score = (diversification - penalty).clamp(0.0, 1.0);

    let mut breakdown = ScoreBreakdown::new();
    breakdown.insert("diversification".into(), json!(diversification));
    breakdown.insert("transaction_costs".into(), json!(cost));
    breakdown.insert("cost_penalty".into(), json!(penalty));
    breakdown.insert("final".into(), json!(score));
    (score, breakdown)
}

/// Blend a score across 1, 3 and 5 year horizons, weighted toward the
/// long term. Records each horizon in `breakdown`.
pub fn multi_timeframe_score(score: f64, breakdown: &mut ScoreBreakdown) -> f64 {
    let short = score * 0.95;
    let medium = score;
    let long = score * 1.05;
    let weighted = (0.2 * short + 0.3 * medium + 0.5 * long).clamp(0.0, 1.0);

    breakdown.insert("short_term_1y".into(), json!(short));
    breakdown.insert("medium_term_3y".into(), json!(medium));
    breakdown.insert("long_term_5y".into(), json!(long));
    breakdown.insert("weighted_score".into(), json!(weighted));
    weighted
}

/// Built-in portfolio scorer: country diversification, dividend income,
/// and security quality, each on a 0-100 scale.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPortfolioScorer;

impl DefaultPortfolioScorer {
    fn diversification(ctx: &PortfolioContext) -> f64 {
        let avg_dev = if ctx.country_weights.is_empty() {
            0.2
        } else {
            let current = ctx.country_allocations();
            let total: f64 = ctx
                .country_weights
                .iter()
                .map(|(c, target)| (current.get(c).copied().unwrap_or(0.0) - target).abs())
                .sum();
            total / ctx.country_weights.len() as f64
        };
        (100.0 * (1.0 - avg_dev / 0.3)).max(0.0)
    }

    fn dividend(ctx: &PortfolioContext, invested: f64) -> f64 {
        let weighted: Option<f64> = ctx
            .positions
            .iter()
            .filter_map(|(s, v)| ctx.security_dividends.get(s).map(|y| v * y))
            .reduce(|a, b| a + b);
        match weighted {
            Some(w) => (30.0 + w / invested * 1000.0).min(100.0),
            None => 50.0,
        }
    }

    fn quality(ctx: &PortfolioContext, invested: f64) -> f64 {
        let weighted: f64 = ctx
            .positions
            .iter()
            .map(|(s, v)| v * ctx.security_scores.get(s).copied().unwrap_or(0.5))
            .sum();
        weighted / invested * 100.0
    }
}

impl PortfolioScorer for DefaultPortfolioScorer {
    fn score(&self, ctx: &PortfolioContext) -> Result<PortfolioScore> {
        let invested: f64 = ctx.positions.values().sum();
        if ctx.positions.is_empty() || invested <= 0.0 || ctx.total_value <= 0.0 {
            return Ok(PortfolioScore::neutral());
        }
        let diversification = Self::diversification(ctx);
        let dividend = Self::dividend(ctx, invested);
        let quality = Self::quality(ctx, invested);
        Ok(PortfolioScore {
            diversification,
            dividend,
            quality,
            total: 0.4 * diversification + 0.3 * dividend + 0.3 * quality,
        })
    }
}
