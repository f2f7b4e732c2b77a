//! Human-readable explanations for plan steps and whole plans.

use crate::calculators::Opportunities;
use crate::candidate::ActionCandidate;
use crate::context::OpportunityContext;
use crate::plan::HolisticStep;

/// Dividend yields above this get a mention in buy narratives.
const DIVIDEND_NOTE_YIELD: f64 = 0.03;

/// Explain one action in the context of the current portfolio.
pub fn step_narrative(
    action: &ActionCandidate,
    ctx: &OpportunityContext,
    opportunities: &Opportunities,
) -> String {
    if action.is_sell() {
        let position_value = ctx.position_value(&action.symbol);
        let sell_pct = (position_value > 0.0 && action.value_eur > 0.0)
            .then(|| action.value_eur / position_value * 100.0);
        sell_narrative(action, sell_pct, opportunities)
    } else {
        buy_narrative(action, ctx)
    }
}

/// Region from an `overweight_xx` / `underweight_xx` tag, uppercased.
fn tagged_region(action: &ActionCandidate, prefix: &str) -> Option<String> {
    action
        .tags
        .iter()
        .find_map(|t| t.strip_prefix(prefix))
        .map(str::to_uppercase)
}

fn sell_narrative(
    action: &ActionCandidate,
    sell_pct: Option<f64>,
    opportunities: &Opportunities,
) -> String {
    let mut parts = vec![match sell_pct {
        Some(pct) => format!(
            "Sell {pct:.0}% / €{:.0} of {} ({})",
            action.value_eur, action.name, action.symbol
        ),
        None => format!("Sell €{:.0} of {} ({})", action.value_eur, action.name, action.symbol),
    }];

    if action.has_tag("windfall") {
        parts.push(format!(
            "This position has experienced windfall gains beyond normal growth. {}.",
            action.reason
        ));
        parts.push("Taking profits locks in gains and frees capital for better opportunities.".into());
    } else if action.has_tag("profit_taking") {
        parts.push(format!("Reason: {}.", action.reason));
        parts.push("This reduces risk by converting paper gains to realized profits.".into());
    } else if action.has_tag("rebalance") {
        match tagged_region(action, "overweight_") {
            Some(region) => {
                parts.push(format!("The portfolio is overweight in {region} region."));
                parts.push("Trimming this position improves country diversification.".into());
            }
            None => parts.push(format!("Reason: {}.", action.reason)),
        }
    } else {
        parts.push(format!("Reason: {}.", action.reason));
    }

    let top_buy = opportunities
        .averaging_down()
        .into_iter()
        .chain(opportunities.rebalance_buys())
        .chain(opportunities.opportunity_buys())
        .next();
    if let Some(buy) = top_buy {
        parts.push(format!(
            "This frees capital to invest in {}, which offers better risk-adjusted returns.",
            buy.name
        ));
    }

    parts.join(" ")
}

fn buy_narrative(action: &ActionCandidate, ctx: &OpportunityContext) -> String {
    let mut parts = vec![format!(
        "Buy €{:.0} of {} ({})",
        action.value_eur, action.name, action.symbol
    )];

    if action.has_tag("averaging_down") {
        parts.push(
            "This quality stock is temporarily down, presenting an opportunity to lower the average cost basis."
                .into(),
        );
        parts.push(format!("{}.", action.reason));
        parts.push("Averaging down on quality dips is a proven long-term strategy.".into());
    } else if action.has_tag("rebalance") {
        match tagged_region(action, "underweight_") {
            Some(region) => {
                parts.push(format!("The portfolio is underweight in {region} region."));
                parts.push(
                    "This purchase improves country diversification and reduces concentration risk."
                        .into(),
                );
            }
            None => parts.push(format!("Reason: {}.", action.reason)),
        }
    } else if action.has_tag("quality") || action.has_tag("opportunity") {
        parts.push(format!("{}.", action.reason));
        parts.push(
            "High-quality stocks with good fundamentals tend to outperform over the long term."
                .into(),
        );
    } else {
        parts.push(format!("Reason: {}.", action.reason));
    }

    let dividend = ctx
        .portfolio
        .security_dividends
        .get(&action.symbol)
        .copied()
        .unwrap_or(0.0);
    if dividend > DIVIDEND_NOTE_YIELD {
        parts.push(format!(
            "This stock also provides a {:.1}% dividend yield for income.",
            dividend * 100.0
        ));
    }

    parts.join(" ")
}

/// Summarize the whole plan: strategy, steps, and expected outcome.
pub fn plan_narrative(steps: &[HolisticStep], current_score: f64, end_score: f64) -> String {
    if steps.is_empty() {
        return "No actions recommended. The portfolio is well-positioned.".into();
    }

    let sells: Vec<&HolisticStep> = steps.iter().filter(|s| s.side.is_sell()).collect();
    let buys: Vec<&HolisticStep> = steps.iter().filter(|s| s.side.is_buy()).collect();
    let windfall = sells.iter().any(|s| s.is_windfall);
    let averaging = buys.iter().any(|s| s.is_averaging_down);

    let mut parts: Vec<String> = Vec::new();

    let strategy = if windfall && averaging {
        Some("This plan takes profits from windfall gains and reinvests in quality stocks that are temporarily down.")
    } else if windfall {
        Some("This plan captures windfall profits from positions that have exceeded their historical growth rates.")
    } else if averaging {
        Some("This plan focuses on averaging down on quality positions that are temporarily undervalued.")
    } else if !sells.is_empty() && !buys.is_empty() {
        Some("This plan rebalances the portfolio by trimming overweight positions and adding to underweight areas.")
    } else if !buys.is_empty() {
        Some("This plan deploys available cash into high-quality opportunities.")
    } else if !sells.is_empty() {
        Some("This plan reduces risk by taking profits from selected positions.")
    } else {
        None
    };
    parts.extend(strategy.map(String::from));

    parts.push(format!("The plan consists of {} action(s):", steps.len()));
    if !sells.is_empty() {
        parts.push(side_summary("Sell", "from", &sells));
    }
    if !buys.is_empty() {
        parts.push(side_summary("Buy", "in", &buys));
    }

    let improvement = end_score - current_score;
    if improvement > 0.0 {
        parts.push(format!(
            "Expected portfolio improvement: +{improvement:.1} points (from {current_score:.1} to {end_score:.1})."
        ));
    } else if improvement < 0.0 {
        parts.push(format!(
            "Note: Short-term score may decrease by {:.1} points, but this positions the portfolio for better long-term growth.",
            improvement.abs()
        ));
    } else {
        parts.push(format!(
            "This maintains the current portfolio score of {current_score:.1} while improving diversification."
        ));
    }

    parts.join(" ")
}

fn side_summary(verb: &str, preposition: &str, steps: &[&HolisticStep]) -> String {
    let total: f64 = steps.iter().map(|s| s.estimated_value).sum();
    let symbols: Vec<&str> = steps.iter().map(|s| s.symbol.as_str()).collect();
    format!("• {verb} €{total:.0} {preposition} {}", symbols.join(", "))
}

/// Explain an action that hurts on its own but helps the sequence.
///
/// Returns an empty string when there is no trade-off to explain.
pub fn tradeoff_explanation(
    action: &ActionCandidate,
    individual_impact: f64,
    sequence_impact: f64,
) -> String {
    if individual_impact >= 0.0 || sequence_impact <= individual_impact {
        return String::new();
    }
    let verb = if action.is_sell() { "Selling" } else { "Buying" };
    format!(
        "{verb} {} in isolation would reduce the portfolio score by {:.1} points. \
         However, as part of this sequence, it enables an overall improvement of {sequence_impact:.1} points. \
         The short-term sacrifice creates a better long-term outcome.",
        action.name,
        individual_impact.abs()
    )
}

/// One-line summary, e.g. `SELL 10 AAPL @ €170.00 = €1700`.
pub fn format_action_summary(action: &ActionCandidate) -> String {
    format!(
        "{} {} {} @ €{:.2} = €{:.0}",
        action.side, action.quantity, action.symbol, action.price, action.value_eur
    )
}
