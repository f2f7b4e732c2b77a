//! Configuration checks, split into blocking errors and advisory warnings.

use std::fmt;
use std::path::Path;

use log::warn;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::params::{Params, param_usize};
use crate::registry::{ModuleCategory, ModuleRegistry};

use super::PlannerConfiguration;

/// Above this depth a large pattern set gets expensive.
const HIGH_MAX_DEPTH: usize = 10;
const MANY_PATTERNS: usize = 10;
const LARGE_COMBINATORIAL_CANDIDATES: usize = 20;
const LARGE_COMBINATIONS: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Warning => write!(f, "WARN"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationIssue {
    pub severity: Severity,
    pub check: &'static str,
    pub detail: String,
}

/// Everything the validator found.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    fn error(&mut self, check: &'static str, detail: impl Into<String>) {
        self.issues.push(ValidationIssue {
            severity: Severity::Error,
            check,
            detail: detail.into(),
        });
    }

    fn warning(&mut self, check: &'static str, detail: impl Into<String>) {
        self.issues.push(ValidationIssue {
            severity: Severity::Warning,
            check,
            detail: detail.into(),
        });
    }

    pub fn has_errors(&self) -> bool {
        self.issues.iter().any(|i| i.severity == Severity::Error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Warning)
    }

    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.issues.is_empty() {
            return writeln!(f, "configuration OK");
        }
        for issue in &self.issues {
            writeln!(f, "  [{}] {}: {}", issue.severity, issue.check, issue.detail)?;
        }
        Ok(())
    }
}

/// Calculators whose output a pattern draws on. The pattern is useless when
/// none of them is enabled.
fn pattern_sources(pattern: &str) -> &'static [&'static str] {
    match pattern {
        "direct_buy" | "opportunity_first" => &["opportunity_buys"],
        "profit_taking" => &["profit_taking"],
        "averaging_down" => &["averaging_down"],
        "rebalance" | "deep_rebalance" => &["rebalance_sells", "rebalance_buys", "weight_based"],
        "multi_sell" | "cash_generation" => &["profit_taking", "rebalance_sells", "weight_based"],
        _ => &[],
    }
}

/// Check a configuration against the registry.
pub fn validate(config: &PlannerConfiguration, registry: &ModuleRegistry) -> ValidationReport {
    let mut report = ValidationReport::default();
    let g = &config.planner;

    for category in ModuleCategory::ALL {
        for name in config.modules(category).keys() {
            if !registry.contains(category, name) {
                report.error("unknown_module", format!("unknown {category} module '{name}'"));
            }
        }
    }

    if g.max_depth < 1 {
        report.error("max_depth", "max_depth must be >= 1");
    }
    if !(0.0..=1.0).contains(&g.priority_threshold) {
        report.error(
            "priority_threshold",
            format!("priority_threshold must be in [0, 1], got {}", g.priority_threshold),
        );
    }
    if !(0.0..=1.0).contains(&g.transaction_cost_percent) {
        report.error(
            "transaction_cost_percent",
            format!(
                "transaction_cost_percent must be in [0, 1], got {}",
                g.transaction_cost_percent
            ),
        );
    }
    if g.transaction_cost_fixed < 0.0 {
        report.error("transaction_cost_fixed", "transaction_cost_fixed must be >= 0");
    }
    if !g.allow_buy && !g.allow_sell {
        report.error("allow_trading", "allow_buy and allow_sell cannot both be false");
    }

    if !(0.0..=1.0).contains(&g.diversity_weight) {
        report.warning(
            "diversity_weight",
            format!("diversity_weight {} is outside [0, 1] and will be clamped", g.diversity_weight),
        );
    }
    if g.max_opportunities_per_category == 0 {
        report.warning(
            "max_opportunities_per_category",
            "max_opportunities_per_category is 0, no opportunities will be kept",
        );
    }

    let calculators = config.enabled(ModuleCategory::Calculator);
    let patterns = config.enabled(ModuleCategory::Pattern);
    if calculators.is_empty() {
        report.warning("no_calculators", "no opportunity calculators enabled");
    }
    if patterns.is_empty() {
        report.warning("no_patterns", "no pattern generators enabled");
    }
    for pattern in &patterns {
        let sources = pattern_sources(pattern);
        if !sources.is_empty() && !sources.iter().any(|s| calculators.contains(s)) {
            report.warning(
                "pattern_without_calculator",
                format!("pattern '{pattern}' enabled but none of {} is", sources.join(", ")),
            );
        }
    }
    if g.max_depth > HIGH_MAX_DEPTH && patterns.len() >= MANY_PATTERNS {
        report.warning(
            "search_size",
            format!(
                "max_depth {} with {} patterns enabled may be slow",
                g.max_depth,
                patterns.len()
            ),
        );
    }

    for name in ["combinatorial", "enhanced_combinatorial"] {
        if let Some(module) = config.sequence_generators.get(name).filter(|m| m.enabled) {
            check_combinatorial_bounds(&mut report, name, &module.params);
        }
    }

    if config.is_enabled(ModuleCategory::Filter, "correlation_aware") {
        report.warning(
            "correlation_source",
            "correlation_aware passes sequences through unless a correlation source is supplied",
        );
    }

    report
}

fn check_combinatorial_bounds(report: &mut ValidationReport, name: &str, params: &Params) {
    let candidates = param_usize(params, "max_candidates", 0);
    let combinations = param_usize(params, "max_combinations", 0);
    if candidates > LARGE_COMBINATORIAL_CANDIDATES || combinations > LARGE_COMBINATIONS {
        report.warning(
            "combinatorial_bounds",
            format!("{name}: max_candidates {candidates}, max_combinations {combinations} is a large search"),
        );
    }
}

/// Load, validate, and log warnings. Fails only on errors.
pub fn load_validated(path: &Path, registry: &ModuleRegistry) -> Result<PlannerConfiguration> {
    let config = PlannerConfiguration::load(path)?;
    let report = validate(&config, registry);
    for issue in report.warnings() {
        warn!("config {}: {}: {}", path.display(), issue.check, issue.detail);
    }
    if report.has_errors() {
        return Err(Error::Validation(report));
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModuleConfig;
    use crate::params::params;

    fn registry() -> ModuleRegistry {
        ModuleRegistry::builtin(None).unwrap()
    }

    fn checks(report: &ValidationReport, severity: Severity) -> Vec<&'static str> {
        report
            .issues
            .iter()
            .filter(|i| i.severity == severity)
            .map(|i| i.check)
            .collect()
    }

    #[test]
    fn defaults_have_no_errors() {
        let report = validate(&PlannerConfiguration::default(), &registry());
        assert!(!report.has_errors(), "{report}");
    }

    #[test]
    fn zero_depth_is_an_error() {
        let mut config = PlannerConfiguration::default();
        config.planner.max_depth = 0;
        let report = validate(&config, &registry());
        assert!(report.has_errors());
        assert!(report.errors().any(|i| i.detail == "max_depth must be >= 1"));
    }

    #[test]
    fn deep_search_with_many_patterns_only_warns() {
        let mut config = PlannerConfiguration::default();
        config.planner.max_depth = 12;
        let report = validate(&config, &registry());
        assert!(!report.has_errors());
        assert!(checks(&report, Severity::Warning).contains(&"search_size"));
    }

    #[test]
    fn unknown_module_is_an_error() {
        let mut config = PlannerConfiguration::default();
        config.filters.insert("no_such_filter".into(), ModuleConfig::disabled());
        let report = validate(&config, &registry());
        assert_eq!(checks(&report, Severity::Error), vec!["unknown_module"]);
        assert!(report.to_string().contains("unknown filters module 'no_such_filter'"));
    }

    #[test]
    fn range_errors() {
        let mut config = PlannerConfiguration::default();
        config.planner.priority_threshold = 1.5;
        config.planner.transaction_cost_percent = -0.1;
        config.planner.allow_buy = false;
        config.planner.allow_sell = false;
        let errors = checks(&validate(&config, &registry()), Severity::Error);
        assert!(errors.contains(&"priority_threshold"));
        assert!(errors.contains(&"transaction_cost_percent"));
        assert!(errors.contains(&"allow_trading"));
    }

    #[test]
    fn pattern_without_its_calculator_warns() {
        let mut config = PlannerConfiguration::default();
        config.opportunity_calculators.clear();
        config
            .opportunity_calculators
            .insert("opportunity_buys".into(), ModuleConfig::enabled());
        let report = validate(&config, &registry());
        assert!(!report.has_errors());
        let details: Vec<&str> = report
            .warnings()
            .filter(|i| i.check == "pattern_without_calculator")
            .map(|i| i.detail.as_str())
            .collect();
        assert!(details.iter().any(|d| d.starts_with("pattern 'averaging_down'")));
        assert!(!details.iter().any(|d| d.starts_with("pattern 'direct_buy'")));
    }

    #[test]
    fn empty_categories_warn() {
        let config = PlannerConfiguration::from_toml_str("").unwrap();
        let warnings = checks(&validate(&config, &registry()), Severity::Warning);
        assert!(warnings.contains(&"no_calculators"));
        assert!(warnings.contains(&"no_patterns"));
    }

    #[test]
    fn large_combinatorial_bounds_warn() {
        let mut config = PlannerConfiguration::default();
        config.sequence_generators.insert(
            "combinatorial".into(),
            ModuleConfig::enabled().with_params(params([("max_combinations", 5000i64)])),
        );
        let warnings = checks(&validate(&config, &registry()), Severity::Warning);
        assert!(warnings.contains(&"combinatorial_bounds"));
    }

    #[test]
    fn load_validated_rejects_errors() {
        let dir = std::env::temp_dir().join(format!("planner-validate-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bad.toml");
        std::fs::write(&path, "[planner]\nmax_depth = 0\n").unwrap();
        let err = load_validated(&path, &registry()).unwrap_err();
        assert!(matches!(err, Error::Validation(ref r) if r.has_errors()));
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
