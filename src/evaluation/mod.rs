//! Category-level evaluation.
//!
//! [`CategoryEvaluator::evaluate`] is a pure function: criterion scores come
//! from a [`CriterionScorer`], the overall score is the weighted sum, and
//! `passed` compares it with the category threshold. Criteria that depend on
//! a failed stage score 0 without consulting the scorer.

mod judge;

pub use judge::{CategoryJudge, LlmJudge, ScoreSheet};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::stages::{CategoryOutput, Stage};
use crate::state_machine::CriteriaGroup;

const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriterionWeight {
    pub name: String,
    /// In (0, 1]; a category's weights sum to 1.0.
    pub weight: f64,
    /// Stages whose failure zeroes this criterion. Empty means every stage.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<Stage>,
}

impl CriterionWeight {
    pub fn new(name: &str, weight: f64) -> Self {
        Self {
            name: name.to_string(),
            weight,
            depends_on: Vec::new(),
        }
    }

    fn affected_by(&self, failed: &[Stage]) -> bool {
        if failed.is_empty() {
            return false;
        }
        self.depends_on.is_empty() || self.depends_on.iter().any(|s| failed.contains(s))
    }
}

/// Criteria and pass threshold for one criteria group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryCriteria {
    /// Pass mark on the 0–100 scale.
    pub threshold: f64,
    pub criteria: Vec<CriterionWeight>,
}

impl CategoryCriteria {
    pub fn new(threshold: f64, criteria: &[(&str, f64)]) -> Self {
        Self {
            threshold,
            criteria: criteria
                .iter()
                .map(|(name, weight)| CriterionWeight::new(name, *weight))
                .collect(),
        }
    }

    pub fn validate(&self, group: CriteriaGroup) -> Result<(), ConfigError> {
        if self.criteria.is_empty() {
            return Err(ConfigError::MissingCriteria(group.to_string()));
        }
        if !(0.0..=100.0).contains(&self.threshold) {
            return Err(ConfigError::InvalidThreshold {
                group: group.to_string(),
                threshold: self.threshold,
            });
        }
        for c in &self.criteria {
            if !(c.weight > 0.0 && c.weight <= 1.0) {
                return Err(ConfigError::InvalidWeight {
                    group: group.to_string(),
                    criterion: c.name.clone(),
                    weight: c.weight,
                });
            }
        }
        let sum: f64 = self.criteria.iter().map(|c| c.weight).sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(ConfigError::WeightSum {
                group: group.to_string(),
                sum,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriterionScore {
    pub name: String,
    pub weight: f64,
    /// In [0, 100].
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationVerdict {
    pub scores: Vec<CriterionScore>,
    pub overall_score: f64,
    pub threshold: f64,
    pub passed: bool,
    pub feedback: String,
    /// 0 for the first pass, n for the n-th revision.
    pub revision_index: u32,
}

/// Scores one criterion against a category's outputs. Must be pure.
pub trait CriterionScorer {
    fn score(&self, criterion: &CriterionWeight, outputs: &CategoryOutput) -> f64;

    /// Free-text improvement suggestions to fold into the verdict feedback.
    fn suggestions(&self) -> Vec<String> {
        Vec::new()
    }
}

impl<F> CriterionScorer for F
where
    F: Fn(&CriterionWeight, &CategoryOutput) -> f64,
{
    fn score(&self, criterion: &CriterionWeight, outputs: &CategoryOutput) -> f64 {
        self(criterion, outputs)
    }
}

pub struct CategoryEvaluator;

impl CategoryEvaluator {
    pub fn evaluate(
        outputs: &CategoryOutput,
        criteria: &[CriterionWeight],
        threshold: f64,
        scorer: &impl CriterionScorer,
    ) -> EvaluationVerdict {
        let failures = outputs.failed_stages();
        let failed: Vec<Stage> = failures.iter().map(|(s, _)| *s).collect();

        let scores: Vec<CriterionScore> = criteria
            .iter()
            .map(|c| {
                let score = if c.affected_by(&failed) {
                    0.0
                } else {
                    clamp_score(scorer.score(c, outputs))
                };
                CriterionScore {
                    name: c.name.clone(),
                    weight: c.weight,
                    score,
                }
            })
            .collect();

        let weighted: f64 = scores.iter().map(|s| s.weight * s.score).sum();
        // Rounded so an exact threshold hit is not lost to float error.
        let overall_score = (weighted * 1e6).round() / 1e6;
        let passed = overall_score >= threshold;

        let mut lines: Vec<String> = failures
            .iter()
            .map(|(stage, reason)| format!("{stage} failed: {reason}"))
            .collect();
        lines.extend(
            scores
                .iter()
                .filter(|s| s.score < threshold)
                .map(|s| format!("{} scored {:.1} (threshold {:.1})", s.name, s.score, threshold)),
        );
        lines.extend(scorer.suggestions());
        if lines.is_empty() && !passed {
            lines.push(format!(
                "Overall quality improvement needed for {}.",
                outputs.category
            ));
        }

        EvaluationVerdict {
            scores,
            overall_score,
            threshold,
            passed,
            feedback: lines.join("\n"),
            revision_index: outputs.attempt,
        }
    }
}

fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;
    use crate::stages::{StageOutput, StageResult};
    use crate::state_machine::Category;

    fn analysis_criteria() -> CategoryCriteria {
        CategoryCriteria::new(
            72.0,
            &[
                ("information_accuracy", 0.25),
                ("coverage_completeness", 0.25),
                ("strategic_relevance", 0.25),
                ("insight_depth", 0.25),
            ],
        )
    }

    fn complete_output(attempt: u32) -> CategoryOutput {
        let mut out = CategoryOutput::new(Category::Analysis, attempt);
        for stage in Category::Analysis.stages() {
            out.push(*stage, StageResult::Completed(StageOutput::summary("ok")));
        }
        out
    }

    #[test]
    fn weighted_sum_and_pass() {
        let criteria = analysis_criteria();
        let scorer = |c: &CriterionWeight, _: &CategoryOutput| match c.name.as_str() {
            "information_accuracy" => 80.0,
            "coverage_completeness" => 70.0,
            "strategic_relevance" => 90.0,
            _ => 60.0,
        };
        let v = CategoryEvaluator::evaluate(&complete_output(0), &criteria.criteria, 72.0, &scorer);
        assert!((v.overall_score - 75.0).abs() < 1e-9);
        assert!(v.passed);
        assert_eq!(v.revision_index, 0);
        assert!(v.feedback.contains("insight_depth scored 60.0"));
    }

    #[test]
    fn exact_threshold_passes() {
        let criteria = CategoryCriteria::new(
            80.0,
            &[("a", 0.3), ("b", 0.25), ("c", 0.25), ("d", 0.2)],
        );
        let scorer = |_: &CriterionWeight, _: &CategoryOutput| 80.0;
        let v = CategoryEvaluator::evaluate(&complete_output(0), &criteria.criteria, 80.0, &scorer);
        assert!(v.passed);
        assert!(v.feedback.is_empty());
    }

    #[test]
    fn failed_stage_zeroes_affected_criteria() {
        let mut criteria = analysis_criteria();
        criteria.criteria[0].depends_on = vec![Stage::CompanyAnalyst];
        criteria.criteria[1].depends_on = vec![Stage::JdAnalyst];

        let mut out = CategoryOutput::new(Category::Analysis, 1);
        out.push(Stage::CompanyAnalyst, StageResult::Completed(StageOutput::summary("ok")));
        out.push(
            Stage::JdAnalyst,
            StageResult::Failed {
                reason: FailureKind::System("request timed out".into()),
            },
        );
        out.push(Stage::MarketAnalyst, StageResult::Completed(StageOutput::summary("ok")));

        let scorer = |_: &CriterionWeight, _: &CategoryOutput| 100.0;
        let v = CategoryEvaluator::evaluate(&out, &criteria.criteria, 72.0, &scorer);

        // information_accuracy only depends on the company analyst and survives;
        // the rest either depend on the failed stage or on every stage.
        assert_eq!(v.scores[0].score, 100.0);
        assert_eq!(v.scores[1].score, 0.0);
        assert_eq!(v.scores[2].score, 0.0);
        assert_eq!(v.scores[3].score, 0.0);
        assert!((v.overall_score - 25.0).abs() < 1e-9);
        assert!(!v.passed);
        assert_eq!(v.revision_index, 1);
        assert!(v.feedback.starts_with("jd_analyst failed"));
    }

    #[test]
    fn scores_are_clamped() {
        let criteria = analysis_criteria();
        let scorer = |c: &CriterionWeight, _: &CategoryOutput| {
            if c.name == "insight_depth" { 250.0 } else { -10.0 }
        };
        let v = CategoryEvaluator::evaluate(&complete_output(0), &criteria.criteria, 72.0, &scorer);
        assert_eq!(v.scores[3].score, 100.0);
        assert_eq!(v.scores[0].score, 0.0);
        assert!((v.overall_score - 25.0).abs() < 1e-9);
    }

    #[test]
    fn evaluation_is_deterministic() {
        let criteria = analysis_criteria();
        let scorer = |_: &CriterionWeight, _: &CategoryOutput| 65.0;
        let a = CategoryEvaluator::evaluate(&complete_output(0), &criteria.criteria, 72.0, &scorer);
        let b = CategoryEvaluator::evaluate(&complete_output(0), &criteria.criteria, 72.0, &scorer);
        assert_eq!(a, b);
        assert!(!a.passed);
    }

    #[test]
    fn validate_rejects_bad_weights() {
        let bad_sum = CategoryCriteria::new(80.0, &[("a", 0.5), ("b", 0.4)]);
        assert!(matches!(
            bad_sum.validate(CriteriaGroup::Matching),
            Err(ConfigError::WeightSum { .. })
        ));

        let zero = CategoryCriteria::new(80.0, &[("a", 0.0), ("b", 1.0)]);
        assert!(matches!(
            zero.validate(CriteriaGroup::Matching),
            Err(ConfigError::InvalidWeight { .. })
        ));

        let threshold = CategoryCriteria::new(120.0, &[("a", 1.0)]);
        assert!(matches!(
            threshold.validate(CriteriaGroup::Guide),
            Err(ConfigError::InvalidThreshold { .. })
        ));

        let empty = CategoryCriteria::new(80.0, &[]);
        assert!(matches!(
            empty.validate(CriteriaGroup::Guide),
            Err(ConfigError::MissingCriteria(_))
        ));

        assert!(analysis_criteria().validate(CriteriaGroup::Analysis).is_ok());
    }
}
