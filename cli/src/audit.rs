//! JSONL audit trail logging.
//!
//! Each planning run appends events to an audit.jsonl file,
//! one JSON object per line.

use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;

use holistic_planner::HolisticPlan;
use holistic_planner::calculators::Opportunities;

use crate::error::Result;

/// An audit event written to the JSONL trail.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub event: &'static str,
    pub ts: DateTime<Utc>,
    #[serde(flatten)]
    pub data: serde_json::Value,
}

/// Append-only audit logger.
pub struct AuditLog {
    writer: BufWriter<std::fs::File>,
}

impl AuditLog {
    /// Open (or create) the audit log file for appending.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            writer: BufWriter::new(file),
        })
    }

    /// Log an event with arbitrary JSON data.
    pub fn log(&mut self, event: &'static str, data: serde_json::Value) -> Result<()> {
        let entry = AuditEvent {
            event,
            ts: Utc::now(),
            data,
        };
        let json = serde_json::to_string(&entry)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        writeln!(self.writer, "{json}")?;
        self.writer.flush()?;
        Ok(())
    }

    /// Log a simple event with no additional data.
    pub fn log_simple(&mut self, event: &'static str) -> Result<()> {
        self.log(event, serde_json::json!({}))
    }
}

/// Convenience: log a planning run start.
pub fn log_plan_started(audit: &mut AuditLog, snapshot: &str, bucket: &str) -> Result<()> {
    audit.log(
        "plan_started",
        serde_json::json!({
            "snapshot": snapshot,
            "bucket": bucket,
        }),
    )
}

/// Convenience: log opportunity counts per category.
pub fn log_opportunities(audit: &mut AuditLog, opportunities: &Opportunities) -> Result<()> {
    let counts: serde_json::Map<String, serde_json::Value> = opportunities
        .categories()
        .map(|(category, candidates)| (category.to_string(), candidates.len().into()))
        .collect();

    audit.log(
        "opportunities_identified",
        serde_json::json!({
            "total": opportunities.total(),
            "categories": counts,
        }),
    )
}

/// Convenience: log the chosen plan.
pub fn log_plan_created(audit: &mut AuditLog, plan: &HolisticPlan) -> Result<()> {
    let steps: Vec<_> = plan
        .steps
        .iter()
        .map(|s| {
            serde_json::json!({
                "step": s.step_number,
                "side": s.side.to_string(),
                "symbol": s.symbol.as_str(),
                "quantity": s.quantity,
                "value_eur": s.estimated_value,
            })
        })
        .collect();

    audit.log(
        "plan_created",
        serde_json::json!({
            "steps": steps,
            "current_score": plan.current_score,
            "end_state_score": plan.end_state_score,
            "improvement": plan.improvement,
            "feasible": plan.feasible,
        }),
    )
}
