//! Read-only views over a finished run, shaped for an output writer.

use std::fmt::Write as _;

use serde::Serialize;

use crate::question::{Question, QuestionType, char_count};
use crate::stages::{ExperienceMatch, Stage, StageOutput};
use crate::state_machine::{AgentState, Category, CategoryStatus, Node};

#[derive(Debug, Clone, Serialize)]
pub struct StageFinding {
    pub stage: Stage,
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryFindings {
    pub category: Category,
    pub status: CategoryStatus,
    pub score: Option<f64>,
    pub findings: Vec<StageFinding>,
}

/// The overall analysis result.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    pub company_name: String,
    pub job_title: String,
    pub quality_score: Option<f64>,
    pub terminal: Node,
    pub categories: Vec<CategoryFindings>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestionGuide {
    pub question_index: usize,
    pub question: String,
    pub question_type: QuestionType,
    pub char_limit: Option<u32>,
    pub strategy: Option<String>,
    pub experience: Option<String>,
    pub writing: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestionMatches {
    pub question_index: usize,
    pub question: String,
    pub matches: Vec<ExperienceMatch>,
}

/// A produced answer for one question.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentFragment {
    pub question_index: usize,
    pub question: String,
    pub text: String,
    pub char_count: usize,
    pub char_limit: Option<u32>,
    pub within_limit: bool,
}

/// Snapshot of [`AgentState`] once the graph reached a terminal node.
#[derive(Debug, Clone, Serialize)]
pub struct FinalState {
    state: AgentState,
    terminal: Node,
}

impl FinalState {
    pub fn new(state: AgentState, terminal: Node) -> Self {
        Self { state, terminal }
    }

    pub fn state(&self) -> &AgentState {
        &self.state
    }

    pub fn terminal(&self) -> Node {
        self.terminal
    }

    fn stage(&self, stage: Stage) -> Option<&StageOutput> {
        self.state
            .output(stage.category())
            .and_then(|o| o.stage(stage))
    }

    fn questions(&self) -> &[Question] {
        &self.state.context().questions
    }

    pub fn analysis_result(&self) -> AnalysisResult {
        let ctx = self.state.context();
        let categories = self
            .state
            .categories()
            .map(|c| CategoryFindings {
                category: c.name,
                status: c.status,
                score: c.last_verdict.as_ref().map(|v| v.overall_score),
                findings: self
                    .state
                    .output(c.name)
                    .map(|o| {
                        o.completed()
                            .filter(|(_, out)| !out.summary.is_empty())
                            .map(|(stage, out)| StageFinding {
                                stage,
                                text: out.summary.clone(),
                            })
                            .collect()
                    })
                    .unwrap_or_default(),
            })
            .collect();

        AnalysisResult {
            company_name: ctx.company_name.clone(),
            job_title: ctx.job_title.clone(),
            quality_score: self.state.quality_score(),
            terminal: self.terminal,
            categories,
        }
    }

    /// One guide per question; empty when the guide category did not run.
    pub fn question_guides(&self) -> Vec<QuestionGuide> {
        if self.state.output(Category::Guide).is_none() {
            return Vec::new();
        }
        let answer = |stage: Stage, index: usize| {
            self.stage(stage)
                .and_then(|o| o.question(index))
                .map(|a| a.text.clone())
        };
        let writing = self
            .stage(Stage::WritingGuide)
            .map(|o| o.summary.clone())
            .filter(|s| !s.is_empty());

        self.questions()
            .iter()
            .enumerate()
            .map(|(i, q)| QuestionGuide {
                question_index: i,
                question: q.text().to_string(),
                question_type: q.question_type(),
                char_limit: q.char_limit(),
                strategy: answer(Stage::QuestionGuide, i),
                experience: answer(Stage::ExperienceGuide, i),
                writing: writing.clone(),
            })
            .collect()
    }

    pub fn experience_matches(&self) -> Vec<QuestionMatches> {
        let Some(guide) = self.stage(Stage::ExperienceGuide) else {
            return Vec::new();
        };
        guide
            .per_question
            .iter()
            .filter_map(|a| {
                let q = self.questions().get(a.question_index)?;
                Some(QuestionMatches {
                    question_index: a.question_index,
                    question: q.text().to_string(),
                    matches: a.matches.clone(),
                })
            })
            .collect()
    }

    /// Per-question answers from the first writer that produced them.
    pub fn document_fragments(&self) -> Vec<DocumentFragment> {
        let writer = [Stage::ResumeWriter, Stage::CoverLetterWriter]
            .into_iter()
            .filter_map(|s| self.stage(s))
            .find(|o| !o.per_question.is_empty());
        let Some(writer) = writer else {
            return Vec::new();
        };

        writer
            .per_question
            .iter()
            .filter_map(|a| {
                let q = self.questions().get(a.question_index)?;
                Some(DocumentFragment {
                    question_index: a.question_index,
                    question: q.text().to_string(),
                    text: a.text.clone(),
                    char_count: char_count(&a.text),
                    char_limit: q.char_limit(),
                    within_limit: q.exceeds_limit(&a.text).is_none(),
                })
            })
            .collect()
    }

    /// Answers followed by the cover letter, as markdown. `None` without production output.
    pub fn combined_document(&self) -> Option<String> {
        let fragments = self.document_fragments();
        let letter = self
            .stage(Stage::CoverLetterWriter)
            .map(|o| o.summary.as_str())
            .filter(|s| !s.is_empty());
        if fragments.is_empty() && letter.is_none() {
            return None;
        }

        let ctx = self.state.context();
        let mut doc = format!("# {}", ctx.company_name);
        if !ctx.job_title.is_empty() {
            let _ = write!(doc, " - {}", ctx.job_title);
        }
        doc.push_str("\n\n");
        for f in &fragments {
            let _ = write!(
                doc,
                "## {}. {}\n\n{}\n\n",
                f.question_index + 1,
                f.question,
                f.text.trim()
            );
        }
        if let Some(letter) = letter {
            let _ = write!(doc, "## Cover letter\n\n{}\n", letter.trim());
        }
        Some(doc)
    }
}
