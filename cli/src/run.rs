//! Subcommand implementations.

use std::path::Path;
use std::sync::Arc;

use log::{debug, info, warn};

use holistic_planner::config::{load_validated, validate as validate_config};
use holistic_planner::evaluation::RemoteEvaluator;
use holistic_planner::{
    HolisticPlan, InMemorySequenceStore, ModuleRegistry, PlanRequest, Planner, PlannerCache,
    PlannerConfiguration, PlannerFactory, SequenceStore, ValidationReport,
};

use crate::audit::{self, AuditLog};
use crate::config::Config;
use crate::error::Result;
use crate::report;
use crate::snapshot::Snapshot;

/// Options for the `plan` subcommand.
#[derive(Debug, Clone, Default)]
pub struct PlanOptions {
    /// Overrides the bucket from the CLI config
    pub bucket: Option<String>,
    /// Evaluate in batches through a sequence store
    pub incremental: bool,
}

fn build_factory(config: &Config, snapshot: &Snapshot) -> Result<PlannerFactory> {
    let registry = Arc::new(ModuleRegistry::builtin(None)?);
    let mut factory = PlannerFactory::new(registry, snapshot.repositories());
    if let Some(url) = &config.evaluation.remote_url {
        let remote = RemoteEvaluator::new(url, config.timeout())?;
        match remote.health() {
            Ok(()) => info!("remote evaluator at {url} is healthy"),
            Err(e) => warn!("remote evaluator at {url} unhealthy, local fallback likely: {e}"),
        }
        factory = factory.with_remote(Arc::new(remote));
    }
    Ok(factory)
}

/// Produce a plan for a snapshot and print it.
pub fn plan(config: &Config, snapshot_path: &Path, opts: &PlanOptions) -> Result<HolisticPlan> {
    let bucket = opts.bucket.as_deref().unwrap_or(&config.planner.bucket);
    let snapshot = Snapshot::load(snapshot_path)?;

    let mut audit_log = AuditLog::open(&config.audit_path())?;
    audit::log_plan_started(&mut audit_log, &snapshot_path.display().to_string(), bucket)?;

    let factory = build_factory(config, &snapshot)?;
    let planner_config = load_validated(&config.planner.config, factory.registry())?;
    let cache = PlannerCache::new(factory);
    let planner = cache.load(bucket, planner_config)?;

    let request = snapshot.to_request();
    let opportunities = planner.opportunities(&request)?;
    info!("{} opportunities identified", opportunities.total());
    audit::log_opportunities(&mut audit_log, &opportunities)?;

    let plan = if opts.incremental {
        plan_incremental(&planner, &request, config.evaluation.batch_size)?
    } else {
        planner.create_plan(&request)?
    };
    audit::log_plan_created(&mut audit_log, &plan)?;

    println!("{}", report::format_plan(bucket, &plan));
    Ok(plan)
}

/// Drain a fresh store batch by batch until every sequence is evaluated.
fn plan_incremental(planner: &Planner, request: &PlanRequest, batch_size: usize) -> Result<HolisticPlan> {
    let store = InMemorySequenceStore::new();
    let hash = request.portfolio_hash();
    let mut batches = 0usize;
    let best = loop {
        let best = planner.create_plan_incremental(request, batch_size, &store)?;
        batches += 1;
        let pending = store.pending(hash)?;
        debug!("batch {batches}: {pending} sequences pending");
        if pending == 0 {
            break best;
        }
    };
    info!("incremental evaluation finished after {batches} batch(es)");

    match best {
        Some(plan) => Ok(plan),
        // Nothing beat the empty plan; the full run reports the current score.
        None => Ok(planner.create_plan(request)?),
    }
}

/// Validate the planner configuration named by the CLI config.
pub fn validate(config: &Config) -> Result<ValidationReport> {
    let registry = ModuleRegistry::builtin(None)?;
    let planner_config = PlannerConfiguration::load(&config.planner.config)?;
    let report = validate_config(&planner_config, &registry);

    println!("{}", config.planner.config.display());
    print!("{report}");
    if !report.has_errors() {
        print!("{}", report::format_enabled(&planner_config));
    }
    Ok(report)
}

/// Print the default configuration as TOML.
pub fn defaults() -> Result<()> {
    let text = PlannerConfiguration::default().to_toml_string()?;
    print!("{text}");
    Ok(())
}

/// List every built-in module.
pub fn modules() -> Result<()> {
    let registry = ModuleRegistry::builtin(None)?;
    print!("{}", report::format_modules(&registry));
    Ok(())
}
