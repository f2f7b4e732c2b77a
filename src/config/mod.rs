//! Declarative planner configuration: global parameters plus, per module
//! category, which modules are enabled and with what parameters.
//!
//! ```toml
//! [planner]
//! name = "core"
//! max_depth = 5
//! priority_threshold = 0.3
//!
//! [opportunity_calculators.profit_taking]
//! enabled = true
//! params = { windfall_threshold = 0.4 }
//!
//! [pattern_generators.multi_sell]
//! enabled = true
//! ```

mod factory;
mod validator;

pub use factory::{PlannerCache, PlannerFactory};
pub use validator::{Severity, ValidationIssue, ValidationReport, load_validated, validate};

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::params::Params;
use crate::registry::ModuleCategory;
use crate::{calculators, filters, generators, patterns};

/// Whole planner configuration for one bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannerConfiguration {
    #[serde(default)]
    pub planner: GlobalParams,
    #[serde(default)]
    pub opportunity_calculators: BTreeMap<String, ModuleConfig>,
    #[serde(default)]
    pub pattern_generators: BTreeMap<String, ModuleConfig>,
    #[serde(default)]
    pub sequence_generators: BTreeMap<String, ModuleConfig>,
    #[serde(default)]
    pub filters: BTreeMap<String, ModuleConfig>,
}

/// Parameters shared by the whole pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalParams {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Longest sequence a pattern or generator may build
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    #[serde(default = "default_max_per_category")]
    pub max_opportunities_per_category: usize,
    /// Minimum mean priority a sequence needs to be evaluated
    #[serde(default = "default_priority_threshold")]
    pub priority_threshold: f64,
    #[serde(default = "default_diversity_weight")]
    pub diversity_weight: f64,
    /// Fixed fee per trade, EUR
    #[serde(default = "default_cost_fixed")]
    pub transaction_cost_fixed: f64,
    /// Variable fee as a fraction of trade value
    #[serde(default = "default_cost_percent")]
    pub transaction_cost_percent: f64,
    #[serde(default = "default_cost_penalty")]
    pub cost_penalty_factor: f64,
    #[serde(default = "default_true")]
    pub allow_buy: bool,
    #[serde(default = "default_true")]
    pub allow_sell: bool,
}

fn default_name() -> String {
    "default".into()
}
fn default_max_depth() -> usize {
    5
}
fn default_max_per_category() -> usize {
    5
}
fn default_priority_threshold() -> f64 {
    0.3
}
fn default_diversity_weight() -> f64 {
    0.3
}
fn default_cost_fixed() -> f64 {
    5.0
}
fn default_cost_percent() -> f64 {
    0.001
}
fn default_cost_penalty() -> f64 {
    0.1
}
fn default_true() -> bool {
    true
}

impl Default for GlobalParams {
    fn default() -> Self {
        Self {
            name: default_name(),
            description: String::new(),
            max_depth: default_max_depth(),
            max_opportunities_per_category: default_max_per_category(),
            priority_threshold: default_priority_threshold(),
            diversity_weight: default_diversity_weight(),
            transaction_cost_fixed: default_cost_fixed(),
            transaction_cost_percent: default_cost_percent(),
            cost_penalty_factor: default_cost_penalty(),
            allow_buy: true,
            allow_sell: true,
        }
    }
}

/// One module's entry in a category table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub params: Params,
}

impl ModuleConfig {
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            params: Params::new(),
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            params: Params::new(),
        }
    }

    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self::enabled()
    }
}

fn all_enabled<I: IntoIterator<Item = &'static str>>(names: I) -> BTreeMap<String, ModuleConfig> {
    names
        .into_iter()
        .map(|n| (n.to_string(), ModuleConfig::enabled()))
        .collect()
}

impl Default for PlannerConfiguration {
    /// Every built-in module enabled with its default parameters.
    fn default() -> Self {
        Self {
            planner: GlobalParams::default(),
            opportunity_calculators: all_enabled(calculators::builtin().iter().map(|c| c.name())),
            pattern_generators: all_enabled(patterns::builtin().iter().map(|p| p.name())),
            sequence_generators: all_enabled(generators::builtin().iter().map(|g| g.name())),
            filters: all_enabled(filters::builtin(None).iter().map(|f| f.name())),
        }
    }
}

impl PlannerConfiguration {
    /// Load a configuration from a TOML file. Not validated; see
    /// [`load_validated`].
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::ConfigRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string(self)?)
    }

    /// The table for one category.
    pub fn modules(&self, category: ModuleCategory) -> &BTreeMap<String, ModuleConfig> {
        match category {
            ModuleCategory::Calculator => &self.opportunity_calculators,
            ModuleCategory::Pattern => &self.pattern_generators,
            ModuleCategory::Generator => &self.sequence_generators,
            ModuleCategory::Filter => &self.filters,
        }
    }

    pub fn modules_mut(&mut self, category: ModuleCategory) -> &mut BTreeMap<String, ModuleConfig> {
        match category {
            ModuleCategory::Calculator => &mut self.opportunity_calculators,
            ModuleCategory::Pattern => &mut self.pattern_generators,
            ModuleCategory::Generator => &mut self.sequence_generators,
            ModuleCategory::Filter => &mut self.filters,
        }
    }

    /// Names of the enabled modules in a category, in key order.
    pub fn enabled(&self, category: ModuleCategory) -> Vec<&str> {
        self.modules(category)
            .iter()
            .filter(|(_, m)| m.enabled)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn is_enabled(&self, category: ModuleCategory, name: &str) -> bool {
        self.modules(category).get(name).is_some_and(|m| m.enabled)
    }
}
