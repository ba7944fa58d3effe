use serde::{Deserialize, Serialize};

use super::Stage;
use crate::error::FailureKind;
use crate::retrieval::{RecordCategory, SearchMode};
use crate::state_machine::Category;

/// One experience record retrieved as evidence for a question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperienceMatch {
    pub record_id: String,
    pub record_category: RecordCategory,
    pub text: String,
    pub score: f64,
    /// Mode that actually produced the score.
    pub mode: SearchMode,
}

/// Per-question product of a stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionArtifact {
    pub question_index: usize,
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub matches: Vec<ExperienceMatch>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageOutput {
    pub summary: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub per_question: Vec<QuestionArtifact>,
    /// Set when evidence came from a weaker retrieval mode than configured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retrieval_degraded: Option<String>,
}

impl StageOutput {
    pub fn summary(text: impl Into<String>) -> Self {
        Self {
            summary: text.into(),
            ..Self::default()
        }
    }

    pub fn question(&self, index: usize) -> Option<&QuestionArtifact> {
        self.per_question.iter().find(|a| a.question_index == index)
    }
}

/// A completed stage keeps its output; a failed one keeps only the reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StageResult {
    Completed(StageOutput),
    Failed { reason: FailureKind },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageReport {
    pub stage: Stage,
    pub result: StageResult,
}

/// Everything one pass over a category produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryOutput {
    pub category: Category,
    /// Revision index of the pass that produced this output.
    pub attempt: u32,
    pub stages: Vec<StageReport>,
}

impl CategoryOutput {
    pub fn new(category: Category, attempt: u32) -> Self {
        Self {
            category,
            attempt,
            stages: Vec::new(),
        }
    }

    pub fn push(&mut self, stage: Stage, result: StageResult) {
        self.stages.push(StageReport { stage, result });
    }

    pub fn stage(&self, stage: Stage) -> Option<&StageOutput> {
        self.stages.iter().find_map(|r| match &r.result {
            StageResult::Completed(out) if r.stage == stage => Some(out),
            _ => None,
        })
    }

    pub fn failed_stages(&self) -> Vec<(Stage, &FailureKind)> {
        self.stages
            .iter()
            .filter_map(|r| match &r.result {
                StageResult::Failed { reason } => Some((r.stage, reason)),
                StageResult::Completed(_) => None,
            })
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.failed_stages().is_empty()
    }

    pub fn completed(&self) -> impl Iterator<Item = (Stage, &StageOutput)> {
        self.stages.iter().filter_map(|r| match &r.result {
            StageResult::Completed(out) => Some((r.stage, out)),
            StageResult::Failed { .. } => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_stages_are_reported_without_output() {
        let mut out = CategoryOutput::new(Category::Analysis, 0);
        out.push(
            Stage::CompanyAnalyst,
            StageResult::Completed(StageOutput::summary("company facts")),
        );
        out.push(
            Stage::JdAnalyst,
            StageResult::Failed {
                reason: FailureKind::System("request timed out".into()),
            },
        );

        assert!(!out.is_complete());
        assert_eq!(out.failed_stages().len(), 1);
        assert_eq!(out.failed_stages()[0].0, Stage::JdAnalyst);
        assert!(out.stage(Stage::JdAnalyst).is_none());
        assert_eq!(
            out.stage(Stage::CompanyAnalyst).map(|o| o.summary.as_str()),
            Some("company facts")
        );
        assert_eq!(out.completed().count(), 1);
    }
}
