use std::fmt;

use serde::{Deserialize, Serialize};

use crate::evaluation::EvaluationVerdict;
use crate::stages::Stage;

/// A group of analyst stages executed and evaluated as one unit.
///
/// The three production categories share the `production` criteria group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Analysis,
    Matching,
    Strategy,
    Guide,
    ResumeWriting,
    CoverLetterWriting,
    QualityCheck,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Analysis => write!(f, "ANALYSIS"),
            Category::Matching => write!(f, "MATCHING"),
            Category::Strategy => write!(f, "STRATEGY"),
            Category::Guide => write!(f, "GUIDE"),
            Category::ResumeWriting => write!(f, "RESUME_WRITING"),
            Category::CoverLetterWriting => write!(f, "COVER_LETTER_WRITING"),
            Category::QualityCheck => write!(f, "QUALITY_CHECK"),
        }
    }
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Analysis,
        Category::Matching,
        Category::Strategy,
        Category::Guide,
        Category::ResumeWriting,
        Category::CoverLetterWriting,
        Category::QualityCheck,
    ];

    pub fn criteria_group(self) -> CriteriaGroup {
        match self {
            Category::Analysis => CriteriaGroup::Analysis,
            Category::Matching => CriteriaGroup::Matching,
            Category::Strategy => CriteriaGroup::Strategy,
            Category::Guide => CriteriaGroup::Guide,
            Category::ResumeWriting | Category::CoverLetterWriting | Category::QualityCheck => {
                CriteriaGroup::Production
            }
        }
    }

    /// The analyst stages of this category, in report order.
    pub fn stages(self) -> &'static [Stage] {
        match self {
            Category::Analysis => &[Stage::CompanyAnalyst, Stage::JdAnalyst, Stage::MarketAnalyst],
            Category::Matching => &[
                Stage::CandidateAnalyst,
                Stage::CultureAnalyst,
                Stage::TrendAnalyst,
            ],
            Category::Strategy => &[Stage::StrengthResearcher, Stage::WeaknessResearcher],
            Category::Guide => &[
                Stage::QuestionGuide,
                Stage::ExperienceGuide,
                Stage::WritingGuide,
            ],
            Category::ResumeWriting => &[Stage::ResumeWriter],
            Category::CoverLetterWriting => &[Stage::CoverLetterWriter],
            Category::QualityCheck => &[Stage::QualityManager],
        }
    }
}

/// Key into the per-group criteria configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CriteriaGroup {
    Analysis,
    Matching,
    Strategy,
    Guide,
    Production,
}

impl fmt::Display for CriteriaGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CriteriaGroup::Analysis => "analysis",
            CriteriaGroup::Matching => "matching",
            CriteriaGroup::Strategy => "strategy",
            CriteriaGroup::Guide => "guide",
            CriteriaGroup::Production => "production",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CategoryStatus {
    Pending,
    Running,
    Passed,
    /// Revision budget exhausted below threshold; the run advanced anyway.
    PassedWithWarning,
    /// Interrupted (cancellation); never produced by evaluation.
    Failed,
}

impl CategoryStatus {
    pub fn is_finished(self) -> bool {
        matches!(
            self,
            CategoryStatus::Passed | CategoryStatus::PassedWithWarning | CategoryStatus::Failed
        )
    }
}

/// Per-category bookkeeping held inside [`AgentState`](super::AgentState).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryState {
    pub name: Category,
    pub status: CategoryStatus,
    /// Revisions performed so far (0 = only the first pass ran).
    pub attempts_used: u32,
    pub last_verdict: Option<EvaluationVerdict>,
    /// Overall score of every evaluated attempt, in order.
    pub score_history: Vec<f64>,
}

impl CategoryState {
    pub fn new(name: Category) -> Self {
        Self {
            name,
            status: CategoryStatus::Pending,
            attempts_used: 0,
            last_verdict: None,
            score_history: Vec::new(),
        }
    }
}
