use tracing::{info, warn};

use super::agent_state::{CategorySlice, FlagKind};
use super::category::CategoryStatus;
use crate::config::AnalysisDepth;
use crate::evaluation::EvaluationVerdict;

/// What the graph does after a category has been evaluated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevisionDecision {
    /// Threshold met; move to the next node.
    Advance,
    /// Re-run the whole category; `attempt` is the revision index of the next pass.
    Retry { attempt: u32 },
    /// Budget exhausted below threshold; move on with a warning.
    EscalateWithWarning,
}

impl RevisionDecision {
    pub fn advances(&self) -> bool {
        !matches!(self, RevisionDecision::Retry { .. })
    }
}

/// Bounded revision loop for one category.
#[derive(Debug, Clone, Copy)]
pub struct RevisionController {
    budget: u32,
}

impl RevisionController {
    pub fn new(depth: AnalysisDepth) -> Self {
        Self {
            budget: depth.revision_budget(),
        }
    }

    pub fn with_budget(budget: u32) -> Self {
        Self { budget }
    }

    pub fn budget(&self) -> u32 {
        self.budget
    }

    /// Record `verdict` on the category and decide the next step.
    ///
    /// Feedback is appended only when a retry follows, so a category that
    /// passes first time never accumulates any.
    pub fn decide(&self, slice: &mut CategorySlice<'_>, verdict: EvaluationVerdict) -> RevisionDecision {
        let category = slice.category();
        let passed = verdict.passed;
        let score = verdict.overall_score;
        let threshold = verdict.threshold;
        let feedback = verdict.feedback.clone();
        slice.record_verdict(verdict);

        if passed {
            slice.set_status(CategoryStatus::Passed);
            info!(%category, score, threshold, "category passed");
            return RevisionDecision::Advance;
        }

        if slice.attempts_used() < self.budget {
            let attempt = slice.increment_attempts();
            slice.append_feedback(feedback);
            info!(%category, score, threshold, attempt, budget = self.budget, "revising category");
            return RevisionDecision::Retry { attempt };
        }

        slice.set_status(CategoryStatus::PassedWithWarning);
        slice.flag(FlagKind::RevisionBudgetExhausted { score, threshold });
        warn!(%category, score, threshold, budget = self.budget, "revision budget exhausted");
        RevisionDecision::EscalateWithWarning
    }
}
