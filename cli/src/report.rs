//! Plain-text rendering for terminal output.

use std::fmt::Write;

use holistic_planner::params::Params;
use holistic_planner::{HolisticPlan, ModuleCategory, ModuleRegistry, PlannerConfiguration};

/// The plan, its narrative, and the score breakdown.
pub fn format_plan(bucket: &str, plan: &HolisticPlan) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== Plan for bucket '{bucket}' ===");
    let _ = write!(out, "{plan}");
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", plan.narrative_summary);
    if !plan.score_breakdown.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Score breakdown:");
        for (key, value) in &plan.score_breakdown {
            let _ = writeln!(out, "  {key:<24} {value}");
        }
    }
    out
}

fn format_params(params: &Params) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Every registered module with its default parameters, per category.
pub fn format_modules(registry: &ModuleRegistry) -> String {
    let mut out = String::new();
    for category in ModuleCategory::ALL {
        let entries: Vec<(String, Params)> = match category {
            ModuleCategory::Calculator => registry
                .calculators
                .get_all()
                .into_iter()
                .map(|(n, m)| (n, m.default_params()))
                .collect(),
            ModuleCategory::Pattern => registry
                .patterns
                .get_all()
                .into_iter()
                .map(|(n, m)| (n, m.default_params()))
                .collect(),
            ModuleCategory::Generator => registry
                .generators
                .get_all()
                .into_iter()
                .map(|(n, m)| (n, m.default_params()))
                .collect(),
            ModuleCategory::Filter => registry
                .filters
                .get_all()
                .into_iter()
                .map(|(n, m)| (n, m.default_params()))
                .collect(),
        };
        let _ = writeln!(out, "[{category}] ({})", entries.len());
        for (name, params) in entries {
            if params.is_empty() {
                let _ = writeln!(out, "  {name}");
            } else {
                let _ = writeln!(out, "  {name:<24} {}", format_params(&params));
            }
        }
    }
    out
}

/// Enabled modules of a configuration, one line per category.
pub fn format_enabled(config: &PlannerConfiguration) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "planner '{}': max_depth {}, {} per category",
        config.planner.name, config.planner.max_depth, config.planner.max_opportunities_per_category
    );
    for category in ModuleCategory::ALL {
        let _ = writeln!(out, "  {category}: {}", config.enabled(category).join(", "));
    }
    out
}
