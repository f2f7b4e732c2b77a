//! Opportunity calculators: turn the current portfolio state into
//! categorized single-action candidates.
//!
//! Each calculator's name doubles as the category its output is filed
//! under. After all calculators have run, every category is sorted by
//! priority (highest first) and truncated.

mod averaging_down;
mod opportunity_buys;
mod profit_taking;
mod rebalance;
mod weight_based;

pub use averaging_down::AveragingDownCalculator;
pub use opportunity_buys::OpportunityBuysCalculator;
pub use profit_taking::ProfitTakingCalculator;
pub use rebalance::{RebalanceBuysCalculator, RebalanceSellsCalculator};
pub use weight_based::WeightBasedCalculator;

use std::cmp::Ordering;
use std::sync::Arc;

use log::{info, warn};

use crate::candidate::ActionCandidate;
use crate::context::OpportunityContext;
use crate::error::Result;
use crate::params::Params;
use crate::portfolio::{Position, Security};

/// Category keys, equal to the producing calculator's name.
pub mod category {
    pub const PROFIT_TAKING: &str = "profit_taking";
    pub const AVERAGING_DOWN: &str = "averaging_down";
    pub const OPPORTUNITY_BUYS: &str = "opportunity_buys";
    pub const REBALANCE_SELLS: &str = "rebalance_sells";
    pub const REBALANCE_BUYS: &str = "rebalance_buys";
    pub const WEIGHT_BASED: &str = "weight_based";
}

/// Identifies candidate single actions from the portfolio state.
pub trait OpportunityCalculator: Send + Sync {
    fn name(&self) -> &'static str;
    fn default_params(&self) -> Params;
    fn calculate(&self, ctx: &OpportunityContext, params: &Params) -> Result<Vec<ActionCandidate>>;
}

/// Built-in calculators in canonical order.
pub fn builtin() -> Vec<Arc<dyn OpportunityCalculator>> {
    vec![
        Arc::new(ProfitTakingCalculator),
        Arc::new(AveragingDownCalculator),
        Arc::new(OpportunityBuysCalculator),
        Arc::new(RebalanceSellsCalculator),
        Arc::new(RebalanceBuysCalculator),
        Arc::new(WeightBasedCalculator),
    ]
}

/// Candidates grouped by category, in calculator order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Opportunities {
    categories: Vec<(String, Vec<ActionCandidate>)>,
}

impl Opportunities {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a category.
    pub fn insert(&mut self, category: &str, candidates: Vec<ActionCandidate>) {
        match self.categories.iter_mut().find(|(c, _)| c == category) {
            Some((_, list)) => *list = candidates,
            None => self.categories.push((category.to_string(), candidates)),
        }
    }

    /// Candidates of a category; empty when the category is absent.
    pub fn get(&self, category: &str) -> &[ActionCandidate] {
        self.categories
            .iter()
            .find(|(c, _)| c == category)
            .map(|(_, list)| list.as_slice())
            .unwrap_or(&[])
    }

    pub fn categories(&self) -> impl Iterator<Item = (&str, &[ActionCandidate])> {
        self.categories
            .iter()
            .map(|(c, list)| (c.as_str(), list.as_slice()))
    }

    /// Every candidate, category by category.
    pub fn flatten(&self) -> Vec<ActionCandidate> {
        self.categories
            .iter()
            .flat_map(|(_, list)| list.iter().cloned())
            .collect()
    }

    pub fn total(&self) -> usize {
        self.categories.iter().map(|(_, list)| list.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    pub fn profit_taking(&self) -> Vec<&ActionCandidate> {
        self.get(category::PROFIT_TAKING).iter().collect()
    }

    pub fn averaging_down(&self) -> Vec<&ActionCandidate> {
        self.get(category::AVERAGING_DOWN).iter().collect()
    }

    pub fn opportunity_buys(&self) -> Vec<&ActionCandidate> {
        self.get(category::OPPORTUNITY_BUYS).iter().collect()
    }

    /// Rebalance sells followed by optimizer-driven sells.
    pub fn rebalance_sells(&self) -> Vec<&ActionCandidate> {
        self.get(category::REBALANCE_SELLS)
            .iter()
            .chain(self.get(category::WEIGHT_BASED).iter().filter(|a| a.is_sell()))
            .collect()
    }

    /// Rebalance buys followed by optimizer-driven buys.
    pub fn rebalance_buys(&self) -> Vec<&ActionCandidate> {
        self.get(category::REBALANCE_BUYS)
            .iter()
            .chain(self.get(category::WEIGHT_BASED).iter().filter(|a| a.is_buy()))
            .collect()
    }
}

/// Highest priority first; ties broken by symbol so the order is stable
/// across runs.
pub fn sort_by_priority(candidates: &mut [ActionCandidate]) {
    candidates.sort_by(|a, b| {
        b.priority
            .partial_cmp(&a.priority)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.symbol.cmp(&b.symbol))
    });
}

/// Held positions that may be sold right now, paired with their security.
pub(crate) fn sellable_positions(
    ctx: &OpportunityContext,
) -> impl Iterator<Item = (&Position, &Security)> {
    ctx.positions.iter().filter_map(move |pos| {
        if pos.quantity <= 0.0
            || ctx.ineligible_symbols.contains(&pos.symbol)
            || ctx.recently_sold.contains(&pos.symbol)
        {
            return None;
        }
        ctx.security(&pos.symbol)
            .filter(|sec| sec.allow_sell)
            .map(|sec| (pos, sec))
    })
}

/// Securities that may be bought and have a usable price.
pub(crate) fn buyable_securities(
    ctx: &OpportunityContext,
) -> impl Iterator<Item = (&Security, f64)> {
    ctx.securities.iter().filter_map(move |sec| {
        if !sec.allow_buy || ctx.recently_sold.contains(&sec.symbol) {
            return None;
        }
        ctx.price(&sec.symbol).map(|price| (sec, price))
    })
}

/// EUR value of a held position: the snapshot value, else quantity times
/// price converted from the position's currency.
pub(crate) fn position_value_eur(ctx: &OpportunityContext, pos: &Position) -> f64 {
    if let Some(v) = pos.market_value_eur {
        return v;
    }
    let snapshot = ctx.position_value(&pos.symbol);
    if snapshot > 0.0 {
        return snapshot;
    }
    ctx.to_eur(pos.market_value(), &pos.currency)
}

/// Whole-lot quantity for a target EUR value, at least one lot.
/// Returns 0 when the price is unusable.
pub(crate) fn lots_for_value(value_eur: f64, price_eur: f64, min_lot: u64) -> u64 {
    if price_eur <= 0.0 || !value_eur.is_finite() {
        return 0;
    }
    let lot = min_lot.max(1);
    let qty = (value_eur / price_eur).floor() as u64;
    (qty - qty % lot).max(lot)
}

/// Run every calculator and group its output by calculator name.
///
/// A calculator that fails is logged and left out; the others still
/// contribute. Each category is sorted by priority and cut to
/// `max_per_category`.
pub fn identify_opportunities(
    calculators: &[(Arc<dyn OpportunityCalculator>, Params)],
    ctx: &OpportunityContext,
    max_per_category: usize,
) -> Opportunities {
    let results = run_all(calculators, ctx);

    let mut opportunities = Opportunities::new();
    for ((calc, _), result) in calculators.iter().zip(results) {
        match result {
            Ok(mut candidates) => {
                sort_by_priority(&mut candidates);
                candidates.truncate(max_per_category);
                opportunities.insert(calc.name(), candidates);
            }
            Err(e) => warn!("calculator {} failed, skipping: {e}", calc.name()),
        }
    }

    let counts: Vec<String> = opportunities
        .categories()
        .map(|(c, list)| format!("{c}={}", list.len()))
        .collect();
    info!("identified opportunities: {}", counts.join(", "));
    opportunities
}

#[cfg(feature = "parallel")]
fn run_all(
    calculators: &[(Arc<dyn OpportunityCalculator>, Params)],
    ctx: &OpportunityContext,
) -> Vec<Result<Vec<ActionCandidate>>> {
    use rayon::prelude::*;

    // Ordered collect keeps results aligned with `calculators`.
    calculators
        .par_iter()
        .map(|(calc, params)| calc.calculate(ctx, params))
        .collect()
}

#[cfg(not(feature = "parallel"))]
fn run_all(
    calculators: &[(Arc<dyn OpportunityCalculator>, Params)],
    ctx: &OpportunityContext,
) -> Vec<Result<Vec<ActionCandidate>>> {
    calculators
        .iter()
        .map(|(calc, params)| calc.calculate(ctx, params))
        .collect()
}
