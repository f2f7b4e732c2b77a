//! Pattern generators: named strategies that compose categorized
//! opportunities into complete ordered sequences.
//!
//! Patterns draw buys from averaging-down, rebalance, and opportunity
//! candidates and sells from profit-taking and rebalance candidates. Every
//! pattern emits at most one sequence per strategy and never exceeds
//! `max_depth` actions.

mod adaptive;
mod basic;
mod composite;

pub use adaptive::{AdaptivePattern, MarketRegimePattern};
pub use basic::{
    AveragingDownPattern, DirectBuyPattern, MultiSellPattern, ProfitTakingPattern,
    RebalancePattern, SingleBestPattern,
};
pub use composite::{
    CashGenerationPattern, CostOptimizedPattern, DeepRebalancePattern, MixedStrategyPattern,
    OpportunityFirstPattern,
};

use std::sync::Arc;

use rustc_hash::FxHashSet;

use crate::calculators::Opportunities;
use crate::candidate::{ActionCandidate, ActionSequence};
use crate::context::OpportunityContext;
use crate::error::Result;
use crate::params::{Params, param_usize, params};

/// Composes opportunities into whole sequences.
pub trait PatternGenerator: Send + Sync {
    fn name(&self) -> &'static str;

    fn default_params(&self) -> Params {
        depth_params()
    }

    fn generate(
        &self,
        opportunities: &Opportunities,
        available_cash: f64,
        ctx: &OpportunityContext,
        params: &Params,
    ) -> Result<Vec<ActionSequence>>;
}

/// Built-in patterns in canonical order.
pub fn builtin() -> Vec<Arc<dyn PatternGenerator>> {
    vec![
        Arc::new(DirectBuyPattern),
        Arc::new(ProfitTakingPattern),
        Arc::new(RebalancePattern),
        Arc::new(AveragingDownPattern),
        Arc::new(SingleBestPattern),
        Arc::new(MultiSellPattern),
        Arc::new(MixedStrategyPattern),
        Arc::new(OpportunityFirstPattern),
        Arc::new(DeepRebalancePattern),
        Arc::new(CashGenerationPattern),
        Arc::new(CostOptimizedPattern),
        Arc::new(AdaptivePattern),
        Arc::new(MarketRegimePattern),
    ]
}

pub(crate) const DEFAULT_MAX_DEPTH: usize = 5;

pub(crate) fn depth_params() -> Params {
    params([("max_depth", DEFAULT_MAX_DEPTH as i64)])
}

pub(crate) fn max_depth(p: &Params) -> usize {
    param_usize(p, "max_depth", DEFAULT_MAX_DEPTH)
}

/// Every buy source, in draw order.
pub(crate) fn all_buys(opps: &Opportunities) -> Vec<&ActionCandidate> {
    let mut out = opps.averaging_down();
    out.extend(opps.rebalance_buys());
    out.extend(opps.opportunity_buys());
    out
}

/// Every sell source, in draw order.
pub(crate) fn all_sells(opps: &Opportunities) -> Vec<&ActionCandidate> {
    let mut out = opps.profit_taking();
    out.extend(opps.rebalance_sells());
    out
}

/// Accumulates one sequence while tracking cash and depth.
///
/// A symbol is used at most once; later candidates for it are ignored.
pub(crate) struct SequenceBuilder {
    actions: ActionSequence,
    symbols: FxHashSet<String>,
    cash: f64,
    max_depth: usize,
}

impl SequenceBuilder {
    pub fn new(cash: f64, max_depth: usize) -> Self {
        Self {
            actions: Vec::new(),
            symbols: FxHashSet::default(),
            cash,
            max_depth,
        }
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_full(&self) -> bool {
        self.actions.len() >= self.max_depth
    }

    /// Add a sell and credit its proceeds.
    pub fn sell(&mut self, action: &ActionCandidate) -> bool {
        if self.is_full() || self.symbols.contains(&action.symbol) {
            return false;
        }
        self.cash += action.value_eur;
        self.push(action);
        true
    }

    /// Add a buy if it is affordable with the cash accumulated so far.
    pub fn buy(&mut self, action: &ActionCandidate) -> bool {
        if self.is_full() || self.symbols.contains(&action.symbol) || action.value_eur > self.cash
        {
            return false;
        }
        self.cash -= action.value_eur;
        self.push(action);
        true
    }

    /// Add sells in order until `limit` actions are in the sequence.
    pub fn sells_up_to<'a>(
        &mut self,
        sells: impl IntoIterator<Item = &'a ActionCandidate>,
        limit: usize,
    ) -> usize {
        let mut added = 0;
        for s in sells {
            if self.len() >= limit.min(self.max_depth) {
                break;
            }
            if self.sell(s) {
                added += 1;
            }
        }
        added
    }

    /// Greedily add every affordable buy, skipping those that do not fit.
    pub fn buys<'a>(&mut self, buys: impl IntoIterator<Item = &'a ActionCandidate>) -> usize {
        let mut added = 0;
        for b in buys {
            if self.is_full() {
                break;
            }
            if self.buy(b) {
                added += 1;
            }
        }
        added
    }

    fn push(&mut self, action: &ActionCandidate) {
        self.symbols.insert(action.symbol.clone());
        self.actions.push(action.clone());
    }

    /// Zero or one sequence.
    pub fn finish(self) -> Vec<ActionSequence> {
        if self.actions.is_empty() {
            Vec::new()
        } else {
            vec![self.actions]
        }
    }
}
