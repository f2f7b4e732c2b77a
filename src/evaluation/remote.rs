//! HTTP client for a remote batch-evaluation backend.

use std::time::Duration;

use log::debug;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use crate::candidate::ActionSequence;
use crate::context::EvaluationContext;
use crate::error::{Error, Result};

use super::{ScoreBreakdown, SequenceEvaluation, SequenceEvaluator};

#[derive(Serialize)]
struct BatchRequest<'a> {
    sequences: &'a [ActionSequence],
    evaluation_context: &'a EvaluationContext,
}

#[derive(Deserialize)]
struct RemoteResult {
    sequence: ActionSequence,
    score: f64,
    feasible: bool,
    end_cash_eur: f64,
    transaction_costs: f64,
}

#[derive(Deserialize)]
struct BatchResponse {
    results: Vec<RemoteResult>,
    #[serde(default)]
    errors: Vec<String>,
}

/// Blocking client for `POST {base_url}/api/v1/evaluate/batch`.
///
/// Every failure (transport, timeout, non-2xx status, undecodable body,
/// or a result count that does not match the request) is reported as
/// [`Error::RemoteUnavailable`].
pub struct RemoteEvaluator {
    client: Client,
    base_url: String,
}

impl RemoteEvaluator {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::RemoteUnavailable(format!("failed to build client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check the backend's health endpoint (GET /health).
    pub fn health(&self) -> Result<()> {
        let url = format!("{}/health", self.base_url);
        let resp = self
            .client
            .get(&url)
            .send()
            .map_err(|e| Error::RemoteUnavailable(format!("health check failed: {e}")))?;
        if !resp.status().is_success() {
            return Err(Error::RemoteUnavailable(format!(
                "health check returned {}",
                resp.status()
            )));
        }
        Ok(())
    }
}

impl SequenceEvaluator for RemoteEvaluator {
    fn name(&self) -> &'static str {
        "remote"
    }

    fn evaluate_batch(
        &self,
        sequences: &[ActionSequence],
        ctx: &EvaluationContext,
    ) -> Result<Vec<SequenceEvaluation>> {
        let url = format!("{}/api/v1/evaluate/batch", self.base_url);
        debug!("submitting {} sequences to {url}", sequences.len());

        let resp = self
            .client
            .post(&url)
            .json(&BatchRequest {
                sequences,
                evaluation_context: ctx,
            })
            .send()
            .map_err(|e| Error::RemoteUnavailable(format!("batch request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().unwrap_or_default();
            return Err(Error::RemoteUnavailable(format!(
                "batch returned {status}: {body}"
            )));
        }

        let batch = resp
            .json::<BatchResponse>()
            .map_err(|e| Error::RemoteUnavailable(format!("failed to parse batch response: {e}")))?;

        if !batch.errors.is_empty() {
            debug!("remote reported {} errors: {:?}", batch.errors.len(), batch.errors);
        }
        if batch.results.len() != sequences.len() {
            return Err(Error::RemoteUnavailable(format!(
                "expected {} results, got {}",
                sequences.len(),
                batch.results.len()
            )));
        }

        Ok(batch
            .results
            .into_iter()
            .map(|r| SequenceEvaluation {
                sequence: r.sequence,
                score: r.score,
                feasible: r.feasible,
                end_cash_eur: r.end_cash_eur,
                transaction_costs: r.transaction_costs,
                breakdown: ScoreBreakdown::new(),
            })
            .collect())
    }
}
