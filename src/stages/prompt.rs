//! Prompt assembly for analyst stages and the judge.
//!
//! Prompts are plain text built from the run context, the outputs of
//! earlier categories and reviewer feedback for the current one.

use std::fmt::Write as _;

use super::output::{CategoryOutput, ExperienceMatch, StageOutput};
use super::Stage;
use crate::question::Question;
use crate::state_machine::{AgentState, Category};

const PRIOR_SUMMARY_CHARS: usize = 1500;
const DRAFT_CHARS: usize = 2000;

/// Cut `text` to at most `max` characters, marking the cut.
pub fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max).collect();
    out.push_str(" …");
    out
}

pub fn system_prompt(stage: Stage) -> String {
    format!(
        "You are the {} on a job-application team. {}\n\
         Ground every claim in the material provided. Do not invent facts about the candidate.",
        stage.title(),
        stage.task()
    )
}

/// Summary followed by any per-question answers, each cut to `max` characters.
pub fn render_stage_output(output: &StageOutput, max: usize) -> String {
    let mut out = String::new();
    if !output.summary.is_empty() {
        let _ = writeln!(out, "{}", truncate_chars(&output.summary, max));
    }
    for artifact in &output.per_question {
        let _ = writeln!(
            out,
            "Q{}: {}",
            artifact.question_index + 1,
            truncate_chars(&artifact.text, max)
        );
    }
    out
}

/// Company, job and candidate context shared by every stage.
pub fn render_context(state: &AgentState) -> String {
    let ctx = state.context();
    let candidate = serde_json::to_string_pretty(&ctx.candidate_info)
        .unwrap_or_else(|_| ctx.candidate_info.to_string());
    let mut out = String::new();
    let _ = writeln!(out, "## Company\n{}", ctx.company_name);
    if !ctx.job_title.is_empty() {
        let _ = writeln!(out, "\n## Position\n{}", ctx.job_title);
    }
    let _ = writeln!(out, "\n## Job description\n{}", ctx.job_description);
    let _ = writeln!(out, "\n## Candidate\n{candidate}");
    if !ctx.questions.is_empty() {
        let _ = writeln!(out, "\n## Application questions");
        for (i, q) in ctx.questions.iter().enumerate() {
            let _ = writeln!(out, "{}. [{}] {}", i + 1, q.question_type(), q.text());
        }
    }
    out
}

/// Completed stage summaries of every category before `current`.
pub fn render_prior(state: &AgentState, current: Category) -> String {
    let mut out = String::new();
    for category in Category::ALL.into_iter().filter(|c| *c < current) {
        let Some(output) = state.output(category) else {
            continue;
        };
        let _ = writeln!(out, "\n## {category} findings");
        for (stage, stage_output) in output.completed() {
            let _ = write!(
                out,
                "### {}\n{}",
                stage.title(),
                render_stage_output(stage_output, PRIOR_SUMMARY_CHARS)
            );
        }
    }
    out
}

/// Reviewer feedback and the previous draft, present only on revisions.
pub fn render_revision(state: &AgentState, stage: Stage) -> String {
    let category = stage.category();
    let feedback = state.feedback(category);
    if feedback.is_empty() {
        return String::new();
    }
    let mut out = String::from("\n## Reviewer feedback on earlier attempts\n");
    for line in feedback.iter().flat_map(|f| f.lines()) {
        let _ = writeln!(out, "- {line}");
    }
    if let Some(previous) = state.output(category).and_then(|o| o.stage(stage)) {
        let _ = write!(
            out,
            "\n## Your previous draft\n{}",
            render_stage_output(previous, DRAFT_CHARS)
        );
    }
    out
}

pub fn render_question(index: usize, question: &Question) -> String {
    let mut out = format!(
        "\n## Question {} ({})\n{}\n",
        index + 1,
        question.question_type(),
        question.text()
    );
    if let Some(limit) = question.char_limit() {
        let _ = writeln!(
            out,
            "Length: {} ({}). {}",
            question.char_limit_note(),
            limit,
            question.length_band().guidance()
        );
    } else {
        let _ = writeln!(out, "Length: {}", question.length_band().guidance());
    }
    out
}

pub fn render_matches(matches: &[ExperienceMatch]) -> String {
    if matches.is_empty() {
        return String::new();
    }
    let mut out = String::from("\n## Relevant experience records\n");
    for m in matches {
        let _ = writeln!(
            out,
            "- [{} | {} | {:.2}] {}",
            m.record_id, m.record_category, m.score, m.text
        );
    }
    out
}

/// Stage outputs of one category, as shown to the judge.
pub fn render_outputs(output: &CategoryOutput, max_chars: usize) -> String {
    let mut out = String::new();
    for (stage, stage_output) in output.completed() {
        let _ = writeln!(
            out,
            "### {}\n{}",
            stage.title(),
            render_stage_output(stage_output, max_chars)
        );
    }
    for (stage, reason) in output.failed_stages() {
        let _ = writeln!(out, "### {}\n(no output: {reason})\n", stage.title());
    }
    out
}
