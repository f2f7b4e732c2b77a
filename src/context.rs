//! Read-only inputs shared by every stage of a planning call.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use log::warn;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::portfolio::{PortfolioContext, Position, Security, TransactionCosts};
use crate::ports::ExchangeRateService;

/// Broad market condition, used by the regime-aware pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketRegime {
    Bull,
    Bear,
    #[default]
    Sideways,
}

impl FromStr for MarketRegime {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bull" => Ok(MarketRegime::Bull),
            "bear" => Ok(MarketRegime::Bear),
            "sideways" => Ok(MarketRegime::Sideways),
            other => Err(format!("unknown market regime '{other}'")),
        }
    }
}

impl fmt::Display for MarketRegime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarketRegime::Bull => write!(f, "bull"),
            MarketRegime::Bear => write!(f, "bear"),
            MarketRegime::Sideways => write!(f, "sideways"),
        }
    }
}

/// Snapshot consumed by calculators, patterns, generators, and filters.
///
/// Built fresh for each planning call and only ever handed out by shared
/// reference.
pub struct OpportunityContext {
    pub portfolio: PortfolioContext,
    pub positions: Vec<Position>,
    pub securities: Vec<Security>,
    pub available_cash: f64,
    pub total_value: f64,
    pub current_prices: FxHashMap<String, f64>,
    /// Optimizer target weights per symbol, if supplied
    pub target_weights: Option<FxHashMap<String, f64>>,
    /// Symbols that may not be sold right now
    pub ineligible_symbols: FxHashSet<String>,
    pub recently_sold: FxHashSet<String>,
    pub recently_bought: FxHashSet<String>,
    pub costs: TransactionCosts,
    pub allow_buy: bool,
    pub allow_sell: bool,
    pub market_regime: MarketRegime,
    pub exchange_rates: Option<Arc<dyn ExchangeRateService>>,
    securities_by_symbol: FxHashMap<String, usize>,
    positions_by_symbol: FxHashMap<String, usize>,
}

impl OpportunityContext {
    /// Create a context with no eligibility restrictions, zero costs, and
    /// both trade directions allowed.
    pub fn new(
        portfolio: PortfolioContext,
        positions: Vec<Position>,
        securities: Vec<Security>,
        available_cash: f64,
        current_prices: FxHashMap<String, f64>,
    ) -> Self {
        let securities_by_symbol = securities
            .iter()
            .enumerate()
            .map(|(i, s)| (s.symbol.clone(), i))
            .collect();
        let positions_by_symbol = positions
            .iter()
            .enumerate()
            .map(|(i, p)| (p.symbol.clone(), i))
            .collect();
        let total_value = portfolio.total_value;
        Self {
            portfolio,
            positions,
            securities,
            available_cash,
            total_value,
            current_prices,
            target_weights: None,
            ineligible_symbols: FxHashSet::default(),
            recently_sold: FxHashSet::default(),
            recently_bought: FxHashSet::default(),
            costs: TransactionCosts::zero(),
            allow_buy: true,
            allow_sell: true,
            market_regime: MarketRegime::default(),
            exchange_rates: None,
            securities_by_symbol,
            positions_by_symbol,
        }
    }

    pub fn security(&self, symbol: &str) -> Option<&Security> {
        self.securities_by_symbol
            .get(symbol)
            .map(|&i| &self.securities[i])
    }

    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.positions_by_symbol
            .get(symbol)
            .map(|&i| &self.positions[i])
    }

    pub fn is_held(&self, symbol: &str) -> bool {
        self.positions_by_symbol.contains_key(symbol)
    }

    /// Best known price: the quote map first, then the position's own price.
    pub fn price(&self, symbol: &str) -> Option<f64> {
        self.current_prices
            .get(symbol)
            .copied()
            .or_else(|| self.position(symbol).map(Position::price))
            .filter(|p| *p > 0.0)
    }

    /// Position value in EUR from the portfolio snapshot.
    pub fn position_value(&self, symbol: &str) -> f64 {
        self.portfolio.value_of(symbol)
    }

    /// Convert an amount into EUR. Without a rate service, or when a rate
    /// is missing, the amount is taken as already in EUR.
    pub fn to_eur(&self, amount: f64, currency: &str) -> f64 {
        match &self.exchange_rates {
            Some(fx) if currency != "EUR" => fx.to_eur(amount, currency).unwrap_or_else(|e| {
                warn!("currency conversion failed for {currency}: {e}");
                amount
            }),
            _ => amount,
        }
    }

    /// Narrow this snapshot down to what simulation and scoring need.
    pub fn evaluation_context(&self, cost_penalty_factor: f64) -> EvaluationContext {
        EvaluationContext {
            portfolio: self.portfolio.clone(),
            securities: self.securities.clone(),
            available_cash: self.available_cash,
            current_prices: self.current_prices.clone(),
            costs: self.costs,
            cost_penalty_factor,
            exchange_rates: self.exchange_rates.clone(),
        }
    }
}

/// What simulate-and-score needs. Also the shared payload sent to a remote
/// evaluation backend.
#[derive(Clone, Serialize)]
pub struct EvaluationContext {
    pub portfolio: PortfolioContext,
    pub securities: Vec<Security>,
    pub available_cash: f64,
    pub current_prices: FxHashMap<String, f64>,
    pub costs: TransactionCosts,
    pub cost_penalty_factor: f64,
    #[serde(skip_serializing)]
    pub exchange_rates: Option<Arc<dyn ExchangeRateService>>,
}

impl EvaluationContext {
    pub fn security(&self, symbol: &str) -> Option<&Security> {
        self.securities.iter().find(|s| s.symbol == symbol)
    }
}
