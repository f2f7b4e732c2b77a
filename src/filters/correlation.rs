use std::sync::Arc;

use log::warn;

use crate::candidate::ActionSequence;
use crate::context::OpportunityContext;
use crate::error::Result;
use crate::params::{Params, param_f64, params};
use crate::ports::{CorrelationMatrix, CorrelationSource};

use super::SequenceFilter;

/// Drops sequences that buy two highly correlated securities.
pub struct CorrelationAwareFilter {
    source: Option<Arc<dyn CorrelationSource>>,
}

impl CorrelationAwareFilter {
    pub fn new(source: Option<Arc<dyn CorrelationSource>>) -> Self {
        Self { source }
    }

    fn too_correlated(seq: &ActionSequence, matrix: &CorrelationMatrix, threshold: f64) -> bool {
        let buys: Vec<&str> = seq.iter().filter(|a| a.is_buy()).map(|a| a.symbol.as_str()).collect();
        buys.iter().enumerate().any(|(i, a)| {
            buys[i + 1..]
                .iter()
                .any(|b| matrix.get(a, b).is_some_and(|c| c.abs() > threshold))
        })
    }
}

impl SequenceFilter for CorrelationAwareFilter {
    fn name(&self) -> &'static str {
        "correlation_aware"
    }

    fn default_params(&self) -> Params {
        params([("threshold", 0.7)])
    }

    fn filter(
        &self,
        sequences: &[ActionSequence],
        _ctx: &OpportunityContext,
        p: &Params,
    ) -> Result<Vec<ActionSequence>> {
        let Some(source) = &self.source else {
            warn!("correlation_aware: no correlation source, passing sequences through");
            return Ok(sequences.to_vec());
        };
        let threshold = param_f64(p, "threshold", 0.7);

        let mut symbols: Vec<String> = sequences
            .iter()
            .flatten()
            .filter(|a| a.is_buy())
            .map(|a| a.symbol.clone())
            .collect();
        symbols.sort();
        symbols.dedup();
        if symbols.len() < 2 {
            return Ok(sequences.to_vec());
        }

        let matrix = match source.correlations(&symbols) {
            Ok(m) => m,
            Err(e) => {
                warn!("correlation_aware: correlations unavailable, passing sequences through: {e}");
                return Ok(sequences.to_vec());
            }
        };

        Ok(sequences
            .iter()
            .filter(|seq| !Self::too_correlated(seq, &matrix, threshold))
            .cloned()
            .collect())
    }
}
