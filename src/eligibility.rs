//! Sell eligibility rules driven by trade history and settings.

use std::fmt;

use chrono::{DateTime, Duration, Utc};

use crate::error::Result;
use crate::ports::{SettingsRepository, TradeRecord, setting_or};
use crate::side::TradeSide;

/// Holding-period and cooldown limits, in days.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EligibilityRules {
    pub min_hold_days: i64,
    pub sell_cooldown_days: i64,
    pub buy_cooldown_days: i64,
    /// Positions losing more than this (a negative fraction) are not sold
    pub max_loss_threshold: f64,
}

impl Default for EligibilityRules {
    fn default() -> Self {
        Self {
            min_hold_days: 90,
            sell_cooldown_days: 180,
            buy_cooldown_days: 30,
            max_loss_threshold: -0.20,
        }
    }
}

impl EligibilityRules {
    /// Read the rules from settings, keeping defaults for unset keys.
    pub fn from_settings(settings: &dyn SettingsRepository) -> Result<Self> {
        let d = Self::default();
        Ok(Self {
            min_hold_days: setting_or(settings, "min_hold_days", d.min_hold_days as f64)? as i64,
            sell_cooldown_days: setting_or(settings, "sell_cooldown_days", d.sell_cooldown_days as f64)?
                as i64,
            buy_cooldown_days: setting_or(settings, "buy_cooldown_days", d.buy_cooldown_days as f64)?
                as i64,
            max_loss_threshold: setting_or(settings, "max_loss_threshold", d.max_loss_threshold)?,
        })
    }
}

/// Why a position may not be sold.
#[derive(Debug, Clone, PartialEq)]
pub enum SellBlock {
    NotAllowed,
    LossTooLarge { profit_pct: f64 },
    HeldTooShort { days: i64 },
    Cooldown { days: i64 },
}

impl fmt::Display for SellBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SellBlock::NotAllowed => write!(f, "selling not allowed"),
            SellBlock::LossTooLarge { profit_pct } => {
                write!(f, "loss of {:.1}% exceeds threshold", -profit_pct * 100.0)
            }
            SellBlock::HeldTooShort { days } => write!(f, "bought {days} days ago"),
            SellBlock::Cooldown { days } => write!(f, "sold {days} days ago"),
        }
    }
}

/// Check whether a position may be sold at `now`.
pub fn check_sell_eligibility(
    allow_sell: bool,
    profit_pct: f64,
    last_trade: Option<&TradeRecord>,
    rules: &EligibilityRules,
    now: DateTime<Utc>,
) -> std::result::Result<(), SellBlock> {
    if !allow_sell {
        return Err(SellBlock::NotAllowed);
    }
    if profit_pct < rules.max_loss_threshold {
        return Err(SellBlock::LossTooLarge { profit_pct });
    }
    if let Some(trade) = last_trade {
        let age = now - trade.executed_at;
        let days = age.num_days();
        match trade.side {
            TradeSide::Buy if age < Duration::days(rules.min_hold_days) => {
                return Err(SellBlock::HeldTooShort { days });
            }
            TradeSide::Sell if age < Duration::days(rules.sell_cooldown_days) => {
                return Err(SellBlock::Cooldown { days });
            }
            _ => {}
        }
    }
    Ok(())
}
