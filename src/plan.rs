//! The planner's output: an ordered, explained list of trades.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::calculators::Opportunities;
use crate::candidate::ActionCandidate;
use crate::context::OpportunityContext;
use crate::evaluation::{ScoreBreakdown, SequenceEvaluation};
use crate::narrative::{format_action_summary, plan_narrative, step_narrative};
use crate::side::TradeSide;

/// One trade in a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HolisticStep {
    /// 1-based position in the plan
    pub step_number: usize,
    pub side: TradeSide,
    pub symbol: String,
    pub name: String,
    pub quantity: u64,
    pub estimated_price: f64,
    pub estimated_value: f64,
    pub currency: String,
    pub reason: String,
    pub narrative: String,
    pub is_windfall: bool,
    pub is_averaging_down: bool,
    /// Goals this step serves (the candidate's tags)
    #[serde(default)]
    pub contributes_to: Vec<String>,
}

impl HolisticStep {
    fn from_action(step_number: usize, action: &ActionCandidate, narrative: String) -> Self {
        Self {
            step_number,
            side: action.side,
            symbol: action.symbol.clone(),
            name: action.name.clone(),
            quantity: action.quantity,
            estimated_price: action.price,
            estimated_value: action.value_eur,
            currency: action.currency.clone(),
            reason: action.reason.clone(),
            narrative,
            is_windfall: action.has_tag("windfall"),
            is_averaging_down: action.has_tag("averaging_down"),
            contributes_to: action.tags.clone(),
        }
    }
}

/// A complete recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HolisticPlan {
    pub steps: Vec<HolisticStep>,
    /// Score of the portfolio as it is now, in [0, 1]
    pub current_score: f64,
    /// Score after every step is executed
    pub end_state_score: f64,
    pub improvement: f64,
    pub narrative_summary: String,
    #[serde(default)]
    pub score_breakdown: ScoreBreakdown,
    pub cash_required: f64,
    pub cash_generated: f64,
    pub feasible: bool,
}

impl HolisticPlan {
    /// The no-op plan returned when nothing is worth doing.
    pub fn empty(current_score: f64) -> Self {
        Self {
            steps: Vec::new(),
            current_score,
            end_state_score: current_score,
            improvement: 0.0,
            narrative_summary: "No actionable opportunities found. Portfolio is well-balanced."
                .into(),
            score_breakdown: ScoreBreakdown::new(),
            cash_required: 0.0,
            cash_generated: 0.0,
            feasible: true,
        }
    }

    /// Build the plan for the winning sequence.
    pub fn assemble(
        best: &SequenceEvaluation,
        current_score: f64,
        ctx: &OpportunityContext,
        opportunities: &Opportunities,
    ) -> Self {
        let steps: Vec<HolisticStep> = best
            .sequence
            .iter()
            .enumerate()
            .map(|(i, action)| {
                HolisticStep::from_action(i + 1, action, step_narrative(action, ctx, opportunities))
            })
            .collect();

        let cash_required: f64 = steps
            .iter()
            .filter(|s| s.side.is_buy())
            .map(|s| s.estimated_value)
            .sum();
        let cash_generated: f64 = steps
            .iter()
            .filter(|s| s.side.is_sell())
            .map(|s| s.estimated_value)
            .sum();

        // Narratives talk in points on a 0-100 scale.
        let narrative_summary =
            plan_narrative(&steps, current_score * 100.0, best.score * 100.0);

        Self {
            steps,
            current_score,
            end_state_score: best.score,
            improvement: best.score - current_score,
            narrative_summary,
            score_breakdown: best.breakdown.clone(),
            cash_required,
            cash_generated,
            feasible: cash_required <= ctx.available_cash + cash_generated,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl fmt::Display for HolisticPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Plan: {} step(s), score {:.3} -> {:.3} ({:+.3}){}",
            self.steps.len(),
            self.current_score,
            self.end_state_score,
            self.improvement,
            if self.feasible { "" } else { " [INFEASIBLE]" }
        )?;
        for step in &self.steps {
            let action = ActionCandidate::new(
                step.side,
                &step.symbol,
                &step.name,
                step.quantity,
                step.estimated_price,
            )
            .with_value(step.estimated_value);
            writeln!(f, "  {}. {}", step.step_number, format_action_summary(&action))?;
            writeln!(f, "     {}", step.narrative)?;
        }
        writeln!(
            f,
            "Cash required €{:.2}, generated €{:.2}",
            self.cash_required, self.cash_generated
        )?;
        write!(f, "{}", self.narrative_summary)
    }
}
