//! Sequence generators: extra sequence variants built from the flat
//! opportunity pool.

mod combinatorial;
mod constraint_relaxation;
mod partial_execution;

pub use combinatorial::{CombinatorialGenerator, EnhancedCombinatorialGenerator};
pub use constraint_relaxation::ConstraintRelaxationGenerator;
pub use partial_execution::PartialExecutionGenerator;

use std::sync::Arc;

use crate::candidate::{ActionCandidate, ActionSequence};
use crate::context::OpportunityContext;
use crate::error::Result;
use crate::params::Params;

/// Produces sequences from every opportunity, regardless of category.
pub trait SequenceGenerator: Send + Sync {
    fn name(&self) -> &'static str;
    fn default_params(&self) -> Params;
    fn generate(
        &self,
        opportunities: &[ActionCandidate],
        ctx: &OpportunityContext,
        params: &Params,
    ) -> Result<Vec<ActionSequence>>;
}

/// Built-in generators in canonical order.
pub fn builtin() -> Vec<Arc<dyn SequenceGenerator>> {
    vec![
        Arc::new(CombinatorialGenerator),
        Arc::new(EnhancedCombinatorialGenerator),
        Arc::new(PartialExecutionGenerator),
        Arc::new(ConstraintRelaxationGenerator),
    ]
}
