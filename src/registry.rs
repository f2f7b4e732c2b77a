//! Name-to-module registries for each pluggable category.
//!
//! Registries are plain values: built once at startup (see
//! [`ModuleRegistry::builtin`]) and handed to the factory by reference.
//! Nothing here is global.

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::calculators::{self, OpportunityCalculator};
use crate::error::{Error, Result};
use crate::filters::{self, SequenceFilter};
use crate::generators::{self, SequenceGenerator};
use crate::patterns::{self, PatternGenerator};
use crate::ports::CorrelationSource;

/// The four pluggable module categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModuleCategory {
    Calculator,
    Pattern,
    Generator,
    Filter,
}

impl ModuleCategory {
    pub const ALL: [ModuleCategory; 4] = [
        ModuleCategory::Calculator,
        ModuleCategory::Pattern,
        ModuleCategory::Generator,
        ModuleCategory::Filter,
    ];

    /// Name of the configuration table holding this category.
    pub fn table(self) -> &'static str {
        match self {
            ModuleCategory::Calculator => "opportunity_calculators",
            ModuleCategory::Pattern => "pattern_generators",
            ModuleCategory::Generator => "sequence_generators",
            ModuleCategory::Filter => "filters",
        }
    }
}

impl fmt::Display for ModuleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

/// Name → module map. Remembers registration order.
pub struct Registry<T: ?Sized> {
    category: ModuleCategory,
    entries: FxHashMap<String, Arc<T>>,
    order: Vec<String>,
}

impl<T: ?Sized> Registry<T> {
    pub fn new(category: ModuleCategory) -> Self {
        Self {
            category,
            entries: FxHashMap::default(),
            order: Vec::new(),
        }
    }

    pub fn category(&self) -> ModuleCategory {
        self.category
    }

    /// Register a module. A name can only be registered once.
    pub fn register(&mut self, name: &str, module: Arc<T>) -> Result<()> {
        if self.entries.contains_key(name) {
            return Err(Error::DuplicateModule {
                category: self.category,
                name: name.to_string(),
            });
        }
        self.entries.insert(name.to_string(), module);
        self.order.push(name.to_string());
        Ok(())
    }

    /// Look up a module; `None` when the name is unknown.
    pub fn get(&self, name: &str) -> Option<Arc<T>> {
        self.entries.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Names in registration order.
    pub fn list_names(&self) -> Vec<String> {
        self.order.clone()
    }

    /// Snapshot of every entry, in registration order. Changes to the
    /// returned vector do not affect the registry.
    pub fn get_all(&self) -> Vec<(String, Arc<T>)> {
        self.order
            .iter()
            .filter_map(|name| self.entries.get(name).map(|m| (name.clone(), m.clone())))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// One registry per category.
pub struct ModuleRegistry {
    pub calculators: Registry<dyn OpportunityCalculator>,
    pub patterns: Registry<dyn PatternGenerator>,
    pub generators: Registry<dyn SequenceGenerator>,
    pub filters: Registry<dyn SequenceFilter>,
}

impl ModuleRegistry {
    /// Empty registries.
    pub fn new() -> Self {
        Self {
            calculators: Registry::new(ModuleCategory::Calculator),
            patterns: Registry::new(ModuleCategory::Pattern),
            generators: Registry::new(ModuleCategory::Generator),
            filters: Registry::new(ModuleCategory::Filter),
        }
    }

    /// Registries holding every built-in module.
    ///
    /// `correlations` feeds the correlation-aware filter; without it that
    /// filter passes sequences through unchanged.
    pub fn builtin(correlations: Option<Arc<dyn CorrelationSource>>) -> Result<Self> {
        let mut reg = Self::new();
        for calc in calculators::builtin() {
            reg.calculators.register(calc.name(), calc)?;
        }
        for pattern in patterns::builtin() {
            reg.patterns.register(pattern.name(), pattern)?;
        }
        for generator in generators::builtin() {
            reg.generators.register(generator.name(), generator)?;
        }
        for filter in filters::builtin(correlations) {
            reg.filters.register(filter.name(), filter)?;
        }
        Ok(reg)
    }

    pub fn contains(&self, category: ModuleCategory, name: &str) -> bool {
        match category {
            ModuleCategory::Calculator => self.calculators.contains(name),
            ModuleCategory::Pattern => self.patterns.contains(name),
            ModuleCategory::Generator => self.generators.contains(name),
            ModuleCategory::Filter => self.filters.contains(name),
        }
    }

    pub fn names(&self, category: ModuleCategory) -> Vec<String> {
        match category {
            ModuleCategory::Calculator => self.calculators.list_names(),
            ModuleCategory::Pattern => self.patterns.list_names(),
            ModuleCategory::Generator => self.generators.list_names(),
            ModuleCategory::Filter => self.filters.list_names(),
        }
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}
