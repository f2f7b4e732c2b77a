//! Interfaces to the collaborators the planner reads from.
//!
//! Persistence, market data, and scoring live outside this crate. The
//! planner only depends on these traits; [`memory`] holds simple
//! in-process implementations for tests and offline runs.

use chrono::{DateTime, Utc};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::portfolio::PortfolioContext;
use crate::side::TradeSide;

/// Numeric planner settings (cooldowns, feature toggles).
pub trait SettingsRepository: Send + Sync {
    fn get_f64(&self, key: &str) -> Result<Option<f64>>;
}

/// Read a setting, falling back to `default` when unset.
pub fn setting_or(repo: &dyn SettingsRepository, key: &str, default: f64) -> Result<f64> {
    Ok(repo.get_f64(key)?.unwrap_or(default))
}

/// An executed trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub symbol: String,
    pub side: TradeSide,
    pub executed_at: DateTime<Utc>,
}

/// Trade history used for eligibility and cooldown checks.
pub trait TradeRepository: Send + Sync {
    /// Symbols sold at or after `since`.
    fn recently_sold_symbols(&self, since: DateTime<Utc>) -> Result<FxHashSet<String>>;
    /// Symbols bought at or after `since`.
    fn recently_bought_symbols(&self, since: DateTime<Utc>) -> Result<FxHashSet<String>>;
    /// Most recent trade in `symbol`, if any.
    fn last_transaction(&self, symbol: &str) -> Result<Option<TradeRecord>>;
}

/// Currency conversion into the reporting currency.
pub trait ExchangeRateService: Send + Sync {
    fn to_eur(&self, amount: f64, currency: &str) -> Result<f64>;
}

/// Portfolio health score, each component on a 0-100 scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PortfolioScore {
    pub diversification: f64,
    pub dividend: f64,
    pub quality: f64,
    pub total: f64,
}

impl PortfolioScore {
    /// Neutral score used for empty portfolios.
    pub fn neutral() -> Self {
        Self {
            diversification: 50.0,
            dividend: 50.0,
            quality: 50.0,
            total: 50.0,
        }
    }
}

/// Scores a portfolio state.
pub trait PortfolioScorer: Send + Sync {
    fn score(&self, ctx: &PortfolioContext) -> Result<PortfolioScore>;
}

/// Pairwise return correlations.
#[derive(Debug, Clone, Default)]
pub struct CorrelationMatrix {
    pairs: FxHashMap<(String, String), f64>,
}

impl CorrelationMatrix {
    pub fn insert(&mut self, a: &str, b: &str, corr: f64) {
        self.pairs.insert((a.to_string(), b.to_string()), corr);
        self.pairs.insert((b.to_string(), a.to_string()), corr);
    }

    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        self.pairs.get(&(a.to_string(), b.to_string())).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Supplies correlations for a set of symbols.
pub trait CorrelationSource: Send + Sync {
    fn correlations(&self, symbols: &[String]) -> Result<CorrelationMatrix>;
}

pub mod memory {
    //! In-memory collaborators.

    use super::*;

    /// Settings held in a map.
    #[derive(Debug, Clone, Default)]
    pub struct MemorySettings {
        values: FxHashMap<String, f64>,
    }

    impl MemorySettings {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with(mut self, key: &str, value: f64) -> Self {
            self.values.insert(key.to_string(), value);
            self
        }
    }

    impl FromIterator<(String, f64)> for MemorySettings {
        fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
            Self {
                values: iter.into_iter().collect(),
            }
        }
    }

    impl SettingsRepository for MemorySettings {
        fn get_f64(&self, key: &str) -> Result<Option<f64>> {
            Ok(self.values.get(key).copied())
        }
    }

    /// Trade history held in a vector.
    #[derive(Debug, Clone, Default)]
    pub struct MemoryTradeHistory {
        trades: Vec<TradeRecord>,
    }

    impl MemoryTradeHistory {
        pub fn new(trades: Vec<TradeRecord>) -> Self {
            Self { trades }
        }

        fn symbols_since(&self, side: TradeSide, since: DateTime<Utc>) -> FxHashSet<String> {
            self.trades
                .iter()
                .filter(|t| t.side == side && t.executed_at >= since)
                .map(|t| t.symbol.clone())
                .collect()
        }
    }

    impl TradeRepository for MemoryTradeHistory {
        fn recently_sold_symbols(&self, since: DateTime<Utc>) -> Result<FxHashSet<String>> {
            Ok(self.symbols_since(TradeSide::Sell, since))
        }

        fn recently_bought_symbols(&self, since: DateTime<Utc>) -> Result<FxHashSet<String>> {
            Ok(self.symbols_since(TradeSide::Buy, since))
        }

        fn last_transaction(&self, symbol: &str) -> Result<Option<TradeRecord>> {
            Ok(self
                .trades
                .iter()
                .filter(|t| t.symbol == symbol)
                .max_by_key(|t| t.executed_at)
                .cloned())
        }
    }

    /// Fixed conversion rates: one unit of currency = `rate` EUR.
    #[derive(Debug, Clone, Default)]
    pub struct StaticRates {
        rates: FxHashMap<String, f64>,
    }

    impl StaticRates {
        pub fn new(rates: FxHashMap<String, f64>) -> Self {
            Self { rates }
        }
    }

    impl ExchangeRateService for StaticRates {
        fn to_eur(&self, amount: f64, currency: &str) -> Result<f64> {
            if currency == "EUR" {
                return Ok(amount);
            }
            self.rates
                .get(currency)
                .map(|rate| amount * rate)
                .ok_or_else(|| crate::Error::Repository(format!("no EUR rate for {currency}")))
        }
    }

    /// A fixed correlation matrix.
    #[derive(Debug, Clone, Default)]
    pub struct StaticCorrelations {
        matrix: CorrelationMatrix,
    }

    impl StaticCorrelations {
        pub fn new(matrix: CorrelationMatrix) -> Self {
            Self { matrix }
        }
    }

    impl CorrelationSource for StaticCorrelations {
        fn correlations(&self, _symbols: &[String]) -> Result<CorrelationMatrix> {
            Ok(self.matrix.clone())
        }
    }
}
