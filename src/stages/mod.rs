//! The closed set of analyst stages.
//!
//! Every stage runs through [`Stage::run`]; which category a stage belongs
//! to, how it is prompted and whether it answers per question are all
//! decided by matching on the variant.

mod output;
pub mod prompt;
mod runner;

pub use output::{
    CategoryOutput, ExperienceMatch, QuestionArtifact, StageOutput, StageReport, StageResult,
};
pub use runner::{Cancelled, StageContext, StageError, StageRunner};

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::llm::LlmClient;
use crate::retrieval::RecordCategory;
use crate::state_machine::Category;

/// Record categories the experience guide draws evidence from.
const EXPERIENCE_EVIDENCE: &[RecordCategory] = &[RecordCategory::WorkExperience, RecordCategory::Project];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    CompanyAnalyst,
    JdAnalyst,
    MarketAnalyst,
    CandidateAnalyst,
    CultureAnalyst,
    TrendAnalyst,
    StrengthResearcher,
    WeaknessResearcher,
    QuestionGuide,
    ExperienceGuide,
    WritingGuide,
    ResumeWriter,
    CoverLetterWriter,
    QualityManager,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Stage {
    pub fn category(self) -> Category {
        match self {
            Stage::CompanyAnalyst | Stage::JdAnalyst | Stage::MarketAnalyst => Category::Analysis,
            Stage::CandidateAnalyst | Stage::CultureAnalyst | Stage::TrendAnalyst => {
                Category::Matching
            }
            Stage::StrengthResearcher | Stage::WeaknessResearcher => Category::Strategy,
            Stage::QuestionGuide | Stage::ExperienceGuide | Stage::WritingGuide => Category::Guide,
            Stage::ResumeWriter => Category::ResumeWriting,
            Stage::CoverLetterWriter => Category::CoverLetterWriting,
            Stage::QualityManager => Category::QualityCheck,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Stage::CompanyAnalyst => "company_analyst",
            Stage::JdAnalyst => "jd_analyst",
            Stage::MarketAnalyst => "market_analyst",
            Stage::CandidateAnalyst => "candidate_analyst",
            Stage::CultureAnalyst => "culture_analyst",
            Stage::TrendAnalyst => "trend_analyst",
            Stage::StrengthResearcher => "strength_researcher",
            Stage::WeaknessResearcher => "weakness_researcher",
            Stage::QuestionGuide => "question_guide",
            Stage::ExperienceGuide => "experience_guide",
            Stage::WritingGuide => "writing_guide",
            Stage::ResumeWriter => "resume_writer",
            Stage::CoverLetterWriter => "cover_letter_writer",
            Stage::QualityManager => "quality_manager",
        }
    }

    /// Human-readable role name used in prompts and headings.
    pub fn title(self) -> &'static str {
        match self {
            Stage::CompanyAnalyst => "Company Analyst",
            Stage::JdAnalyst => "Job Description Analyst",
            Stage::MarketAnalyst => "Market Analyst",
            Stage::CandidateAnalyst => "Candidate Analyst",
            Stage::CultureAnalyst => "Culture Analyst",
            Stage::TrendAnalyst => "Trend Analyst",
            Stage::StrengthResearcher => "Strength Researcher",
            Stage::WeaknessResearcher => "Weakness Researcher",
            Stage::QuestionGuide => "Question Guide",
            Stage::ExperienceGuide => "Experience Guide",
            Stage::WritingGuide => "Writing Guide",
            Stage::ResumeWriter => "Resume Writer",
            Stage::CoverLetterWriter => "Cover Letter Writer",
            Stage::QualityManager => "Quality Manager",
        }
    }

    fn task(self) -> &'static str {
        match self {
            Stage::CompanyAnalyst => {
                "Analyse the company: business model, products, recent direction and what it values in hires."
            }
            Stage::JdAnalyst => {
                "Break the job description into required and preferred qualifications, core duties and hidden expectations."
            }
            Stage::MarketAnalyst => {
                "Describe the industry and hiring market for this role and how the company is positioned in it."
            }
            Stage::CandidateAnalyst => {
                "Map the candidate's experience and skills onto the role and identify the strongest points of fit."
            }
            Stage::CultureAnalyst => {
                "Assess how the candidate's working style and values fit the company culture."
            }
            Stage::TrendAnalyst => {
                "Relate current industry and technology trends to the candidate's profile and this role."
            }
            Stage::StrengthResearcher => {
                "Identify the candidate's differentiating strengths with concrete evidence for each."
            }
            Stage::WeaknessResearcher => {
                "Identify gaps and risks in the candidate's profile and how to address each honestly."
            }
            Stage::QuestionGuide => {
                "For the given question, explain what the reader is really asking and the answer strategy to use."
            }
            Stage::ExperienceGuide => {
                "For the given question, choose the candidate experiences that answer it best and explain how to frame them."
            }
            Stage::WritingGuide => {
                "Set the tone, structure and key messages the final documents should follow."
            }
            Stage::ResumeWriter => {
                "Write the candidate's answer to the given question, following the guides and the length limit."
            }
            Stage::CoverLetterWriter => {
                "Write a cover letter for this application that integrates the strategy and the written answers."
            }
            Stage::QualityManager => {
                "Review the produced documents for accuracy, consistency, persuasiveness and length compliance, and list concrete fixes."
            }
        }
    }

    /// Record categories this stage draws evidence from; `None` means all.
    pub fn evidence_categories(self) -> Option<&'static [RecordCategory]> {
        match self {
            Stage::ExperienceGuide => Some(EXPERIENCE_EVIDENCE),
            _ => None,
        }
    }

    /// Whether this stage makes one call per application question.
    ///
    /// The cover letter writer takes over the per-question answers when the
    /// route has no resume-writing category.
    pub fn per_question(self, writes_answers: bool) -> bool {
        match self {
            Stage::QuestionGuide | Stage::ExperienceGuide | Stage::ResumeWriter => true,
            Stage::CoverLetterWriter => writes_answers,
            _ => false,
        }
    }

    /// Produce this stage's output for the current attempt.
    ///
    /// Any LLM failure discards what the stage produced so far.
    pub async fn run<C: LlmClient>(self, ctx: &StageContext<'_, C>) -> Result<StageOutput, StageError> {
        if ctx.is_cancelled() {
            return Err(StageError::Cancelled);
        }
        let questions = &ctx.state.context().questions;
        if !self.per_question(ctx.writes_answers) || questions.is_empty() {
            let text = ctx.invoke(self, String::new()).await?;
            return Ok(StageOutput::summary(text));
        }

        let mut out = StageOutput::default();
        for (index, question) in questions.iter().enumerate() {
            let matches = if self == Stage::ExperienceGuide {
                ctx.evidence_for(question, self.evidence_categories(), &mut out.retrieval_degraded)
            } else {
                Vec::new()
            };
            let extra = format!(
                "{}{}",
                prompt::render_question(index, question),
                prompt::render_matches(&matches)
            );
            let text = ctx.invoke(self, extra).await?;
            out.per_question.push(QuestionArtifact {
                question_index: index,
                text,
                matches,
            });
        }
        // The letter itself stays in the summary; answers live per question.
        if self == Stage::CoverLetterWriter {
            out.summary = ctx.invoke(self, String::new()).await?;
        }
        Ok(out)
    }
}
