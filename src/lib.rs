//! # holistic-planner
//!
//! A configuration-driven planner that turns a portfolio snapshot into an
//! ordered, explained list of buy and sell actions.
//!
//! ## Pipeline
//!
//! 1. **Context**: a read-only [`OpportunityContext`] built from the request,
//!    settings, and trade history (cooldowns, sell eligibility)
//! 2. **Calculators** find single-action opportunities, grouped by category
//! 3. **Patterns** compose opportunities into named strategies
//! 4. **Generators** add combinatorial and partial-fill variants
//! 5. **Filters** prune by correlation, diversity, eligibility, recent trades
//! 6. **Feasibility** drops empty, duplicate-symbol, low-priority, and
//!    unaffordable sequences
//! 7. **Evaluation** simulates each survivor and scores the end state,
//!    remotely when a backend is configured, locally otherwise
//! 8. The best sequence becomes a [`HolisticPlan`] with narratives
//!
//! ## Quick Start
//!
//! ```
//! use std::sync::Arc;
//!
//! use holistic_planner::portfolio::{PortfolioContext, Position, Security};
//! use holistic_planner::{
//!     ModuleRegistry, PlanRequest, PlannerConfiguration, PlannerFactory, Repositories,
//! };
//! use rustc_hash::FxHashMap;
//!
//! let registry = Arc::new(ModuleRegistry::builtin(None).unwrap());
//! let factory = PlannerFactory::new(registry, Repositories::in_memory());
//! let planner = factory.build(&PlannerConfiguration::default()).unwrap();
//!
//! let securities = vec![Security::new("SAP", "SAP").with_quality(0.9)];
//! let positions = vec![Position::new("SAP", 10.0, 100.0).with_price(140.0)];
//! let portfolio =
//!     PortfolioContext::from_values(vec![("SAP".to_string(), 1400.0)], &securities, 500.0);
//! let mut prices = FxHashMap::default();
//! prices.insert("SAP".to_string(), 140.0);
//!
//! let request = PlanRequest::new(portfolio, positions, securities, 500.0, prices);
//! let plan = planner.create_plan(&request).unwrap();
//! assert!(plan.feasible);
//! ```
//!
//! ## Configuration
//!
//! Planners are described by a TOML document; see [`config`]. Every
//! built-in module is registered in [`ModuleRegistry::builtin`] and enabled
//! by name.
//!
//! ## Features
//!
//! - `parallel` (default): run opportunity calculators on the rayon pool
//! - `remote` (default): [`evaluation::RemoteEvaluator`], an HTTP batch
//!   evaluation backend

pub mod calculators;
pub mod candidate;
pub mod config;
pub mod context;
pub mod eligibility;
pub mod error;
pub mod evaluation;
pub mod feasibility;
pub mod filters;
pub mod generators;
pub mod narrative;
pub mod params;
pub mod patterns;
pub mod plan;
pub mod planner;
pub mod portfolio;
pub mod ports;
pub mod registry;
pub mod side;
pub mod store;

pub use candidate::{ActionCandidate, ActionSequence};
pub use config::{PlannerCache, PlannerConfiguration, PlannerFactory, ValidationReport};
pub use context::{EvaluationContext, MarketRegime, OpportunityContext};
pub use error::{Error, Result};
pub use evaluation::SequenceEvaluation;
pub use plan::{HolisticPlan, HolisticStep};
pub use planner::{ModuleSet, PlanRequest, Planner, Repositories};
pub use registry::{ModuleCategory, ModuleRegistry, Registry};
pub use side::TradeSide;
pub use store::{InMemorySequenceStore, SequenceStore};
