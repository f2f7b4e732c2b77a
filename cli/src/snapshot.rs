//! Portfolio snapshot (snapshot.json) loading and validation.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Deserialize;

use holistic_planner::evaluation::DefaultPortfolioScorer;
use holistic_planner::{MarketRegime, PlanRequest, Repositories};
use holistic_planner::portfolio::{PortfolioContext, Position, Security};
use holistic_planner::ports::TradeRecord;
use holistic_planner::ports::memory::{MemorySettings, MemoryTradeHistory};

use crate::error::{Error, Result};

/// Everything the planner needs about one account at one point in time.
#[derive(Debug, Clone, Deserialize)]
pub struct Snapshot {
    /// Reference time for cooldowns; now when absent
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    pub available_cash: f64,
    #[serde(default)]
    pub positions: Vec<Position>,
    pub securities: Vec<Security>,
    #[serde(default)]
    pub prices: FxHashMap<String, f64>,
    #[serde(default)]
    pub target_weights: Option<FxHashMap<String, f64>>,
    #[serde(default)]
    pub country_weights: FxHashMap<String, f64>,
    #[serde(default)]
    pub industry_weights: FxHashMap<String, f64>,
    #[serde(default)]
    pub market_regime: MarketRegime,
    #[serde(default)]
    pub trades: Vec<TradeRecord>,
    /// Planner settings (cooldowns, multi-timeframe toggle)
    #[serde(default)]
    pub settings: FxHashMap<String, f64>,
}

impl Snapshot {
    /// Load and validate a snapshot file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::SnapshotRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_json(&contents)
    }

    /// Parse from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: Snapshot = serde_json::from_str(json)?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    fn validate(&self) -> Result<()> {
        if !self.available_cash.is_finite() || self.available_cash < 0.0 {
            return Err(Error::Snapshot(format!(
                "available_cash must be a non-negative number, got {}",
                self.available_cash
            )));
        }

        let mut seen = FxHashSet::default();
        for s in &self.securities {
            if s.symbol.is_empty() {
                return Err(Error::Snapshot("empty security symbol".into()));
            }
            if !seen.insert(s.symbol.as_str()) {
                return Err(Error::Snapshot(format!("duplicate security: {}", s.symbol)));
            }
        }

        let mut held = FxHashSet::default();
        for p in &self.positions {
            if !held.insert(p.symbol.as_str()) {
                return Err(Error::Snapshot(format!("duplicate position: {}", p.symbol)));
            }
            if p.quantity < 0.0 {
                return Err(Error::Snapshot(format!(
                    "position {} has negative quantity {}",
                    p.symbol, p.quantity
                )));
            }
        }

        for (symbol, price) in &self.prices {
            if *price <= 0.0 {
                return Err(Error::Snapshot(format!("price for {symbol} must be > 0")));
            }
        }
        Ok(())
    }

    /// Position values already known in EUR. The planner converts the rest.
    fn position_values(&self) -> Vec<(String, f64)> {
        self.positions
            .iter()
            .filter_map(|p| p.market_value_eur.map(|v| (p.symbol.clone(), v)))
            .collect()
    }

    /// Build the planner request.
    pub fn to_request(&self) -> PlanRequest {
        let mut portfolio =
            PortfolioContext::from_values(self.position_values(), &self.securities, self.available_cash);
        portfolio.country_weights = self.country_weights.clone();
        portfolio.industry_weights = self.industry_weights.clone();

        let mut request = PlanRequest::new(
            portfolio,
            self.positions.clone(),
            self.securities.clone(),
            self.available_cash,
            self.prices.clone(),
        )
        .with_market_regime(self.market_regime);
        if let Some(weights) = &self.target_weights {
            request = request.with_target_weights(weights.clone());
        }
        if let Some(ts) = self.timestamp {
            request = request.as_of(ts);
        }
        request
    }

    /// Settings and trade history from the snapshot, scored by the built-in scorer.
    pub fn repositories(&self) -> Repositories {
        let settings: MemorySettings = self
            .settings
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        Repositories {
            settings: Arc::new(settings),
            trades: Arc::new(MemoryTradeHistory::new(self.trades.clone())),
            scorer: Arc::new(DefaultPortfolioScorer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_json() -> &'static str {
        r#"{
            "timestamp": "2026-03-02T09:00:00Z",
            "available_cash": 1500.0,
            "positions": [
                { "symbol": "SAP", "quantity": 10, "avg_price": 120.0, "current_price": 150.0,
                  "market_value_eur": 1500.0 },
                { "symbol": "ASML", "quantity": 1, "avg_price": 500.0, "current_price": 600.0 }
            ],
            "securities": [
                { "symbol": "SAP", "name": "SAP SE", "country": "DE", "quality_score": 0.8 },
                { "symbol": "ASML", "name": "ASML", "country": "NL" }
            ],
            "prices": { "SAP": 150.0, "ASML": 600.0 },
            "country_weights": { "DE": 0.5, "NL": 0.5 },
            "market_regime": "bull",
            "settings": { "sell_cooldown_days": 30 }
        }"#
    }

    #[test]
    fn parse_valid() {
        let snap = Snapshot::from_json(valid_json()).unwrap();
        assert_eq!(snap.available_cash, 1500.0);
        assert_eq!(snap.positions.len(), 2);
        assert_eq!(snap.market_regime, MarketRegime::Bull);
        assert!(snap.trades.is_empty());
    }

    #[test]
    fn request_carries_portfolio() {
        let snap = Snapshot::from_json(valid_json()).unwrap();
        let req = snap.to_request();
        assert_eq!(req.portfolio.value_of("SAP"), 1500.0);
        // ASML has no EUR value yet; the planner fills it in.
        assert_eq!(req.portfolio.value_of("ASML"), 0.0);
        assert_eq!(req.portfolio.total_value, 3000.0);
        assert_eq!(req.positions.len(), 2);
        assert_eq!(req.portfolio.country_weights["NL"], 0.5);
        assert_eq!(req.as_of, snap.timestamp.unwrap());
    }

    #[test]
    fn trades_feed_cooldowns() {
        let json = valid_json().replace(
            r#""settings""#,
            r#""trades": [{ "symbol": "SAP", "side": "BUY", "executed_at": "2026-02-20T10:00:00Z" }],
            "settings""#,
        );
        let snap = Snapshot::from_json(&json).unwrap();
        let repos = snap.repositories();
        let since = "2026-02-01T00:00:00Z".parse().unwrap();
        assert!(repos.trades.recently_bought_symbols(since).unwrap().contains("SAP"));
        assert_eq!(repos.settings.get_f64("sell_cooldown_days").unwrap(), Some(30.0));
    }

    #[test]
    fn rejects_negative_cash() {
        let json = valid_json().replace("1500.0", "-1.0");
        assert!(matches!(Snapshot::from_json(&json), Err(Error::Snapshot(_))));
    }

    #[test]
    fn rejects_duplicate_security() {
        let json = valid_json().replace(r#""symbol": "ASML", "name": "ASML""#, r#""symbol": "SAP", "name": "dup""#);
        let err = Snapshot::from_json(&json).unwrap_err();
        assert!(err.to_string().contains("duplicate security: SAP"));
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(matches!(
            Snapshot::from_json("{ not json"),
            Err(Error::SnapshotParse(_))
        ));
    }
}
