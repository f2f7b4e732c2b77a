//! Held positions and the investable security universe.

use serde::{Deserialize, Serialize};

/// A holding in a single security.
///
/// Quantities may be fractional; prices are in the security's own currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub quantity: f64,
    /// Average acquisition price
    pub avg_price: f64,
    /// Latest known price, if any
    #[serde(default)]
    pub current_price: Option<f64>,
    #[serde(default = "default_currency")]
    pub currency: String,
    /// Market value already converted to EUR, if the caller has it
    #[serde(default)]
    pub market_value_eur: Option<f64>,
}

impl Position {
    pub fn new(symbol: &str, quantity: f64, avg_price: f64) -> Self {
        Self {
            symbol: symbol.to_string(),
            quantity,
            avg_price,
            current_price: None,
            currency: default_currency(),
            market_value_eur: None,
        }
    }

    pub fn with_price(mut self, price: f64) -> Self {
        self.current_price = Some(price);
        self
    }

    pub fn with_currency(mut self, currency: &str) -> Self {
        self.currency = currency.to_string();
        self
    }

    /// Current price, falling back to the average price.
    pub fn price(&self) -> f64 {
        match self.current_price {
            Some(p) if p > 0.0 => p,
            _ => self.avg_price,
        }
    }

    /// Unrealized return as a fraction of the average price.
    pub fn profit_pct(&self) -> f64 {
        if self.avg_price <= 0.0 {
            return 0.0;
        }
        (self.price() - self.avg_price) / self.avg_price
    }

    /// Market value in the position's own currency.
    pub fn market_value(&self) -> f64 {
        self.quantity * self.price()
    }
}

/// A tradable security and its planning metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Security {
    pub symbol: String,
    pub name: String,
    #[serde(default)]
    pub country: Option<String>,
    /// Comma-separated industry list
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_true")]
    pub allow_buy: bool,
    #[serde(default = "default_true")]
    pub allow_sell: bool,
    #[serde(default = "default_min_lot")]
    pub min_lot: u64,
    /// Quality score in [0, 1]
    #[serde(default)]
    pub quality_score: Option<f64>,
    /// Dividend yield as a fraction
    #[serde(default)]
    pub dividend_yield: Option<f64>,
    /// Scales buy priority up (and sell priority down)
    #[serde(default = "default_multiplier")]
    pub priority_multiplier: f64,
}

fn default_currency() -> String {
    "EUR".into()
}
fn default_true() -> bool {
    true
}
fn default_min_lot() -> u64 {
    1
}
fn default_multiplier() -> f64 {
    1.0
}

impl Security {
    pub fn new(symbol: &str, name: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            name: name.to_string(),
            country: None,
            industry: None,
            currency: default_currency(),
            allow_buy: true,
            allow_sell: true,
            min_lot: 1,
            quality_score: None,
            dividend_yield: None,
            priority_multiplier: 1.0,
        }
    }

    pub fn with_country(mut self, country: &str) -> Self {
        self.country = Some(country.to_string());
        self
    }

    pub fn with_industry(mut self, industry: &str) -> Self {
        self.industry = Some(industry.to_string());
        self
    }

    pub fn with_quality(mut self, score: f64) -> Self {
        self.quality_score = Some(score);
        self
    }

    /// Individual industries, trimmed, empty entries dropped.
    pub fn industries(&self) -> Vec<&str> {
        split_industries(self.industry.as_deref().unwrap_or(""))
    }

    pub fn quality(&self) -> f64 {
        self.quality_score.unwrap_or(0.5)
    }
}

pub(crate) fn split_industries(raw: &str) -> Vec<&str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_falls_back_to_average() {
        let p = Position::new("AAPL", 10.0, 150.0);
        assert_eq!(p.price(), 150.0);
        assert_eq!(p.with_price(165.0).price(), 165.0);
    }

    #[test]
    fn profit_pct() {
        let p = Position::new("AAPL", 10.0, 100.0).with_price(120.0);
        assert!((p.profit_pct() - 0.20).abs() < 1e-12);
        let flat = Position::new("X", 1.0, 0.0);
        assert_eq!(flat.profit_pct(), 0.0);
    }

    #[test]
    fn industries_split_and_trim() {
        let s = Security::new("SAP", "SAP").with_industry("Software, Cloud ,");
        assert_eq!(s.industries(), vec!["Software", "Cloud"]);
        assert!(Security::new("X", "X").industries().is_empty());
    }

    #[test]
    fn security_defaults_from_json() {
        let s: Security = serde_json::from_str(r#"{"symbol":"ASML","name":"ASML"}"#).unwrap();
        assert!(s.allow_buy && s.allow_sell);
        assert_eq!(s.min_lot, 1);
        assert_eq!(s.priority_multiplier, 1.0);
        assert_eq!(s.quality(), 0.5);
    }
}
