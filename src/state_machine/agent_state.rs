use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::category::{Category, CategoryState, CategoryStatus};
use crate::context::RunContext;
use crate::error::StateError;
use crate::evaluation::EvaluationVerdict;
use crate::stages::{CategoryOutput, Stage};

/// Marker attached to the run output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FlagKind {
    /// The category exhausted its revision budget below threshold.
    RevisionBudgetExhausted { score: f64, threshold: f64 },
    CharLimitExceeded {
        question_index: usize,
        count: usize,
        limit: u32,
    },
    /// Evidence was retrieved in a weaker mode than configured.
    RetrievalDegraded { reason: String },
    StageFailed { stage: Stage, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputFlag {
    pub category: Category,
    #[serde(flatten)]
    pub kind: FlagKind,
}

impl OutputFlag {
    pub fn is_warning(&self) -> bool {
        matches!(self.kind, FlagKind::RevisionBudgetExhausted { .. })
    }
}

/// Shared context accumulated across categories during one run.
///
/// Only the active category can be written, through a [`CategorySlice`].
/// Once a category is finished its state, output and feedback are frozen.
#[derive(Debug, Clone, Serialize)]
pub struct AgentState {
    context: RunContext,
    categories: BTreeMap<Category, CategoryState>,
    outputs: BTreeMap<Category, CategoryOutput>,
    feedback: BTreeMap<Category, Vec<String>>,
    quality_score: Option<f64>,
    output_flags: Vec<OutputFlag>,
    #[serde(skip)]
    active: Option<Category>,
}

impl AgentState {
    pub fn new(context: RunContext) -> Self {
        Self {
            context,
            categories: BTreeMap::new(),
            outputs: BTreeMap::new(),
            feedback: BTreeMap::new(),
            quality_score: None,
            output_flags: Vec::new(),
            active: None,
        }
    }

    pub fn context(&self) -> &RunContext {
        &self.context
    }

    pub fn category(&self, category: Category) -> Option<&CategoryState> {
        self.categories.get(&category)
    }

    pub fn categories(&self) -> impl Iterator<Item = &CategoryState> {
        self.categories.values()
    }

    pub fn output(&self, category: Category) -> Option<&CategoryOutput> {
        self.outputs.get(&category)
    }

    pub fn feedback(&self, category: Category) -> &[String] {
        self.feedback.get(&category).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Mean of the final overall scores of finished categories.
    pub fn quality_score(&self) -> Option<f64> {
        self.quality_score
    }

    pub fn output_flags(&self) -> &[OutputFlag] {
        &self.output_flags
    }

    pub fn has_warning(&self) -> bool {
        self.output_flags.iter().any(OutputFlag::is_warning)
    }

    pub fn active(&self) -> Option<Category> {
        self.active
    }

    /// Open `category` for writing. Fails if it was seen before or another is active.
    pub fn begin_category(&mut self, category: Category) -> Result<CategorySlice<'_>, StateError> {
        if let Some(existing) = self.categories.get(&category) {
            return Err(if existing.status.is_finished() {
                StateError::Sealed(category.to_string())
            } else {
                StateError::AlreadyStarted(category.to_string())
            });
        }
        if let Some(active) = self.active {
            return Err(StateError::NotActive {
                requested: category.to_string(),
                active: active.to_string(),
            });
        }
        self.categories.insert(category, CategoryState::new(category));
        self.active = Some(category);
        Ok(CategorySlice {
            state: self,
            category,
        })
    }

    /// Writer handle for the active category.
    pub fn slice_mut(&mut self, category: Category) -> Result<CategorySlice<'_>, StateError> {
        if self.active == Some(category) {
            return Ok(CategorySlice {
                state: self,
                category,
            });
        }
        if self
            .categories
            .get(&category)
            .is_some_and(|c| c.status.is_finished())
        {
            return Err(StateError::Sealed(category.to_string()));
        }
        Err(StateError::NotActive {
            requested: category.to_string(),
            active: self
                .active
                .map(|c| c.to_string())
                .unwrap_or_else(|| "none".into()),
        })
    }

    fn recompute_quality(&mut self) {
        let scores: Vec<f64> = self
            .categories
            .values()
            .filter(|c| c.status.is_finished())
            .filter_map(|c| c.last_verdict.as_ref().map(|v| v.overall_score))
            .collect();
        self.quality_score = if scores.is_empty() {
            None
        } else {
            Some(scores.iter().sum::<f64>() / scores.len() as f64)
        };
    }
}

/// Exclusive writer for one category's slice of [`AgentState`].
pub struct CategorySlice<'a> {
    state: &'a mut AgentState,
    category: Category,
}

impl CategorySlice<'_> {
    pub fn category(&self) -> Category {
        self.category
    }

    fn entry(&mut self) -> &mut CategoryState {
        let category = self.category;
        self.state
            .categories
            .entry(category)
            .or_insert_with(|| CategoryState::new(category))
    }

    pub fn attempts_used(&self) -> u32 {
        self.state
            .categories
            .get(&self.category)
            .map(|c| c.attempts_used)
            .unwrap_or(0)
    }

    pub fn start_attempt(&mut self) {
        self.entry().status = CategoryStatus::Running;
    }

    /// Replace this category's output with the latest pass.
    pub fn record_output(&mut self, output: CategoryOutput) {
        self.state.outputs.insert(self.category, output);
    }

    pub fn record_verdict(&mut self, verdict: EvaluationVerdict) {
        let entry = self.entry();
        entry.score_history.push(verdict.overall_score);
        entry.last_verdict = Some(verdict);
    }

    pub fn append_feedback(&mut self, text: impl Into<String>) {
        self.state
            .feedback
            .entry(self.category)
            .or_default()
            .push(text.into());
    }

    pub fn increment_attempts(&mut self) -> u32 {
        let entry = self.entry();
        entry.attempts_used += 1;
        entry.attempts_used
    }

    pub fn set_status(&mut self, status: CategoryStatus) {
        self.entry().status = status;
    }

    pub fn flag(&mut self, kind: FlagKind) {
        self.state.output_flags.push(OutputFlag {
            category: self.category,
            kind,
        });
    }

    /// Close the slice. A status that is not yet final becomes `Failed`.
    pub fn finish(mut self) {
        let entry = self.entry();
        if !entry.status.is_finished() {
            entry.status = CategoryStatus::Failed;
        }
        self.state.active = None;
        self.state.recompute_quality();
    }
}
