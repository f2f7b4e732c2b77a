//! Portfolio state as seen by scoring: position values, allocation targets,
//! and per-security metadata.
//!
//! [`PortfolioContext`] is the unit the evaluation engine simulates on. It is
//! cheap to clone and never shared mutably: every simulation works on its
//! own copy.

pub mod cost_model;
pub mod position;

pub use cost_model::TransactionCosts;
pub use position::{Position, Security};

use std::hash::{Hash, Hasher};

use rustc_hash::{FxHashMap, FxHasher};
use serde::{Deserialize, Serialize};

use position::split_industries;

/// Portfolio snapshot used for scoring.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortfolioContext {
    /// Position values in EUR, keyed by symbol
    #[serde(default)]
    pub positions: FxHashMap<String, f64>,
    /// Total portfolio value (positions plus cash), EUR
    pub total_value: f64,
    /// Target allocation per country, fractions summing to ~1
    #[serde(default)]
    pub country_weights: FxHashMap<String, f64>,
    /// Target allocation per industry
    #[serde(default)]
    pub industry_weights: FxHashMap<String, f64>,
    #[serde(default)]
    pub security_countries: FxHashMap<String, String>,
    /// Comma-separated industries per symbol
    #[serde(default)]
    pub security_industries: FxHashMap<String, String>,
    #[serde(default)]
    pub security_scores: FxHashMap<String, f64>,
    #[serde(default)]
    pub security_dividends: FxHashMap<String, f64>,
}

impl PortfolioContext {
    /// Build a context from EUR position values and the security universe.
    ///
    /// Metadata is recorded for every security, held or not, so that
    /// simulated buys of new names can be attributed to a country.
    pub fn from_values(
        values: impl IntoIterator<Item = (String, f64)>,
        securities: &[Security],
        cash: f64,
    ) -> Self {
        let positions: FxHashMap<String, f64> = values.into_iter().collect();
        let invested: f64 = positions.values().sum();
        let mut ctx = Self {
            positions,
            total_value: invested + cash,
            ..Self::default()
        };
        for sec in securities {
            ctx.record_security(sec);
        }
        ctx
    }

    /// Copy a security's country, industry, quality, and dividend data in.
    pub fn record_security(&mut self, sec: &Security) {
        if let Some(country) = &sec.country {
            self.security_countries
                .insert(sec.symbol.clone(), country.clone());
        }
        if let Some(industry) = &sec.industry {
            self.security_industries
                .insert(sec.symbol.clone(), industry.clone());
        }
        if let Some(q) = sec.quality_score {
            self.security_scores.insert(sec.symbol.clone(), q);
        }
        if let Some(d) = sec.dividend_yield {
            self.security_dividends.insert(sec.symbol.clone(), d);
        }
    }

    pub fn value_of(&self, symbol: &str) -> f64 {
        self.positions.get(symbol).copied().unwrap_or(0.0)
    }

    /// Weight of a symbol in the total portfolio.
    pub fn weight(&self, symbol: &str) -> f64 {
        if self.total_value <= 0.0 {
            return 0.0;
        }
        self.value_of(symbol) / self.total_value
    }

    /// Current allocation per country. Unknown countries count as "OTHER".
    pub fn country_allocations(&self) -> FxHashMap<String, f64> {
        let mut out = FxHashMap::default();
        if self.total_value <= 0.0 {
            return out;
        }
        for (symbol, value) in &self.positions {
            let country = self
                .security_countries
                .get(symbol)
                .map(String::as_str)
                .unwrap_or("OTHER");
            *out.entry(country.to_string()).or_insert(0.0) += value / self.total_value;
        }
        out
    }

    /// Current allocation per industry. A multi-industry security splits its
    /// value equally across its industries.
    pub fn industry_allocations(&self) -> FxHashMap<String, f64> {
        let mut out = FxHashMap::default();
        if self.total_value <= 0.0 {
            return out;
        }
        for (symbol, value) in &self.positions {
            let raw = self
                .security_industries
                .get(symbol)
                .map(String::as_str)
                .unwrap_or("OTHER");
            let mut industries = split_industries(raw);
            if industries.is_empty() {
                industries.push("OTHER");
            }
            let share = value / self.total_value / industries.len() as f64;
            for ind in industries {
                *out.entry(ind.to_string()).or_insert(0.0) += share;
            }
        }
        out
    }

    /// Order-independent hash of the held positions (values rounded to cents).
    pub fn state_hash(&self) -> u64 {
        let mut entries: Vec<(&String, i64)> = self
            .positions
            .iter()
            .map(|(s, v)| (s, (v * 100.0).round() as i64))
            .collect();
        entries.sort();
        let mut hasher = FxHasher::default();
        entries.hash(&mut hasher);
        ((self.total_value * 100.0).round() as i64).hash(&mut hasher);
        hasher.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> PortfolioContext {
        let securities = vec![
            Security::new("SAP", "SAP")
                .with_country("DE")
                .with_industry("Software, Cloud"),
            Security::new("AAPL", "Apple").with_country("US"),
        ];
        PortfolioContext::from_values(
            vec![("SAP".to_string(), 600.0), ("AAPL".to_string(), 200.0)],
            &securities,
            200.0,
        )
    }

    #[test]
    fn total_includes_cash() {
        let c = ctx();
        assert_eq!(c.total_value, 1000.0);
        assert!((c.weight("SAP") - 0.6).abs() < 1e-12);
        assert_eq!(c.weight("MSFT"), 0.0);
    }

    #[test]
    fn country_allocations() {
        let alloc = ctx().country_allocations();
        assert!((alloc["DE"] - 0.6).abs() < 1e-12);
        assert!((alloc["US"] - 0.2).abs() < 1e-12);
    }

    #[test]
    fn industry_split_equally() {
        let alloc = ctx().industry_allocations();
        assert!((alloc["Software"] - 0.3).abs() < 1e-12);
        assert!((alloc["Cloud"] - 0.3).abs() < 1e-12);
        assert!((alloc["OTHER"] - 0.2).abs() < 1e-12);
    }

    #[test]
    fn state_hash_ignores_insertion_order() {
        let a = ctx();
        let mut b = PortfolioContext {
            total_value: 1000.0,
            ..PortfolioContext::default()
        };
        b.positions.insert("AAPL".into(), 200.0);
        b.positions.insert("SAP".into(), 600.0);
        assert_eq!(a.state_hash(), b.state_hash());

        b.positions.insert("AAPL".into(), 250.0);
        assert_ne!(a.state_hash(), b.state_hash());
    }
}
