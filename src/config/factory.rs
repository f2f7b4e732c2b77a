//! Builds planners from configurations and caches them per bucket.

use std::path::Path;
use std::sync::{Arc, RwLock};

use log::{info, warn};
use rustc_hash::FxHashMap;

use crate::error::{Error, Result};
use crate::evaluation::SequenceEvaluator;
use crate::params::{Params, merge};
use crate::planner::{ModuleSet, Planner, Repositories};
use crate::registry::{ModuleCategory, ModuleRegistry, Registry};

use super::{ModuleConfig, PlannerConfiguration, validate};

/// Instantiates the enabled modules of a configuration.
#[derive(Clone)]
pub struct PlannerFactory {
    registry: Arc<ModuleRegistry>,
    repositories: Repositories,
    remote: Option<Arc<dyn SequenceEvaluator>>,
}

impl PlannerFactory {
    pub fn new(registry: Arc<ModuleRegistry>, repositories: Repositories) -> Self {
        Self {
            registry,
            repositories,
            remote: None,
        }
    }

    /// Planners built from here try this backend before local evaluation.
    pub fn with_remote(mut self, remote: Arc<dyn SequenceEvaluator>) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    /// Build a planner.
    ///
    /// Unknown module names fail with [`Error::UnknownModule`]; any other
    /// validation error fails with [`Error::Validation`]. Warnings are
    /// logged.
    pub fn build(&self, config: &PlannerConfiguration) -> Result<Planner> {
        for category in ModuleCategory::ALL {
            if let Some(name) = config
                .modules(category)
                .keys()
                .find(|name| !self.registry.contains(category, name))
            {
                return Err(Error::UnknownModule {
                    category,
                    name: name.clone(),
                });
            }
        }

        let report = validate(config, &self.registry);
        for issue in report.warnings() {
            warn!("planner '{}': {}: {}", config.planner.name, issue.check, issue.detail);
        }
        if report.has_errors() {
            return Err(Error::Validation(report));
        }

        let globals = global_overrides(config);
        let modules = ModuleSet {
            calculators: instantiate(&self.registry.calculators, config, &globals, |c| c.default_params()),
            patterns: instantiate(&self.registry.patterns, config, &globals, |p| p.default_params()),
            generators: instantiate(&self.registry.generators, config, &globals, |g| g.default_params()),
            filters: instantiate(&self.registry.filters, config, &globals, |f| f.default_params()),
        };
        info!(
            "built planner '{}': {} calculators, {} patterns, {} generators, {} filters",
            config.planner.name,
            modules.calculators.len(),
            modules.patterns.len(),
            modules.generators.len(),
            modules.filters.len()
        );

        let planner = Planner::new(config.clone(), modules, self.repositories.clone());
        Ok(match &self.remote {
            Some(remote) => planner.with_remote(remote.clone()),
            None => planner,
        })
    }
}

/// Global values pushed into every module that declares the same key.
fn global_overrides(config: &PlannerConfiguration) -> Params {
    let mut out = Params::new();
    out.insert(
        "max_depth".into(),
        toml::Value::Integer(config.planner.max_depth as i64),
    );
    out.insert(
        "diversity_weight".into(),
        toml::Value::Float(config.planner.diversity_weight),
    );
    out
}

/// Enabled modules in registration order, each with defaults, then
/// matching globals, then the user's params layered on top.
fn instantiate<T: ?Sized>(
    registry: &Registry<T>,
    config: &PlannerConfiguration,
    globals: &Params,
    defaults: impl Fn(&T) -> Params,
) -> Vec<(Arc<T>, Params)> {
    let table = config.modules(registry.category());
    registry
        .get_all()
        .into_iter()
        .filter_map(|(name, module)| {
            let entry: &ModuleConfig = table.get(&name).filter(|m| m.enabled)?;
            let mut base = defaults(module.as_ref());
            for (key, value) in globals {
                if base.contains_key(key) {
                    base.insert(key.clone(), value.clone());
                }
            }
            Some((module, merge(&base, &entry.params)))
        })
        .collect()
}

struct CachedPlanner {
    config: PlannerConfiguration,
    planner: Arc<Planner>,
}

/// Built planners keyed by bucket id.
///
/// Loading builds the new planner before taking the write lock, so readers
/// see either the old planner or the new one.
pub struct PlannerCache {
    factory: PlannerFactory,
    planners: RwLock<FxHashMap<String, CachedPlanner>>,
}

impl PlannerCache {
    pub fn new(factory: PlannerFactory) -> Self {
        Self {
            factory,
            planners: RwLock::new(FxHashMap::default()),
        }
    }

    pub fn get(&self, bucket: &str) -> Option<Arc<Planner>> {
        self.planners
            .read()
            .ok()?
            .get(bucket)
            .map(|c| c.planner.clone())
    }

    /// Configuration the bucket's planner was built from.
    pub fn config(&self, bucket: &str) -> Option<PlannerConfiguration> {
        self.planners
            .read()
            .ok()?
            .get(bucket)
            .map(|c| c.config.clone())
    }

    /// Build a planner for `bucket` and swap it in. On failure the previous
    /// planner stays in place.
    pub fn load(&self, bucket: &str, config: PlannerConfiguration) -> Result<Arc<Planner>> {
        let planner = Arc::new(self.factory.build(&config)?);
        let mut planners = self
            .planners
            .write()
            .map_err(|_| Error::Config("planner cache lock poisoned".into()))?;
        planners.insert(
            bucket.to_string(),
            CachedPlanner {
                config,
                planner: planner.clone(),
            },
        );
        info!("loaded planner for bucket '{bucket}'");
        Ok(planner)
    }

    /// Re-read a bucket's configuration file and rebuild its planner.
    pub fn reload_from_file(&self, bucket: &str, path: &Path) -> Result<Arc<Planner>> {
        let config = PlannerConfiguration::load(path)?;
        self.load(bucket, config)
    }

    /// Drop a bucket's planner. Returns whether one was cached.
    pub fn invalidate(&self, bucket: &str) -> bool {
        match self.planners.write() {
            Ok(mut planners) => planners.remove(bucket).is_some(),
            Err(_) => false,
        }
    }

    /// Cached bucket ids, sorted.
    pub fn buckets(&self) -> Vec<String> {
        let mut out: Vec<String> = self
            .planners
            .read()
            .map(|p| p.keys().cloned().collect())
            .unwrap_or_default();
        out.sort();
        out
    }
}
