use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{CategoryCriteria, CriterionScorer, CriterionWeight};
use crate::config::{ModelTier, RunConfig};
use crate::llm::{LlmClient, LlmError, LlmRequest, invoke_with_retry};
use crate::retrieval::normalize_field;
use crate::stages::{CategoryOutput, Cancelled, prompt};
use crate::state_machine::AgentState;

const OUTPUT_CHARS: usize = 3000;
const JUDGE_TEMPERATURE: f32 = 0.0;

/// Produces the criterion scores for one pass over a category.
#[allow(async_fn_in_trait)]
pub trait CategoryJudge {
    async fn assess(
        &self,
        state: &AgentState,
        outputs: &CategoryOutput,
        criteria: &CategoryCriteria,
    ) -> Result<ScoreSheet, Cancelled>;
}

/// Criterion scores and suggestions returned by a judge.
///
/// Scoring is a lookup, so evaluating the same sheet twice gives the
/// same verdict. Criteria the sheet has no score for score 0.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreSheet {
    scores: BTreeMap<String, f64>,
    suggestions: Vec<String>,
}

impl ScoreSheet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_score(mut self, criterion: &str, score: f64) -> Self {
        self.scores.insert(criterion.to_string(), score);
        self
    }

    pub fn with_suggestion(mut self, text: impl Into<String>) -> Self {
        self.suggestions.push(text.into());
        self
    }

    /// No scores at all; the reason becomes the only suggestion.
    pub fn unavailable(reason: &str) -> Self {
        Self::new().with_suggestion(format!("Evaluation unavailable: {reason}"))
    }

    pub fn score_for(&self, criterion: &str) -> Option<f64> {
        self.scores.get(criterion).copied()
    }

    /// Parse a judge reply: the JSON object between the first `{` and the
    /// last `}`, with `<criterion>_score` keys and optional
    /// `improvement_suggestions` / `specific_feedback`.
    pub fn parse(text: &str, criteria: &[CriterionWeight]) -> Result<Self, String> {
        let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) else {
            return Err("reply contains no JSON object".into());
        };
        if end < start {
            return Err("reply contains no JSON object".into());
        }
        let value: Value = serde_json::from_str(&text[start..=end])
            .map_err(|e| format!("failed to parse judge reply: {e}"))?;

        let mut sheet = Self::new();
        for criterion in criteria {
            let key = format!("{}_score", criterion.name);
            if let Some(score) = value.get(&key).and_then(as_score) {
                sheet.scores.insert(criterion.name.clone(), score);
            }
        }
        if sheet.scores.is_empty() {
            return Err("reply has no criterion scores".into());
        }
        for key in ["improvement_suggestions", "specific_feedback"] {
            if let Some(field) = value.get(key) {
                sheet.suggestions.extend(normalize_field(field));
            }
        }
        Ok(sheet)
    }
}

fn as_score(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

impl CriterionScorer for ScoreSheet {
    fn score(&self, criterion: &CriterionWeight, _outputs: &CategoryOutput) -> f64 {
        self.score_for(&criterion.name).unwrap_or(0.0)
    }

    fn suggestions(&self) -> Vec<String> {
        self.suggestions.clone()
    }
}

/// Judge backed by the deep-tier model.
pub struct LlmJudge<'a, C> {
    llm: &'a C,
    config: &'a RunConfig,
    cancel: &'a CancellationToken,
}

impl<'a, C: LlmClient> LlmJudge<'a, C> {
    pub fn new(llm: &'a C, config: &'a RunConfig, cancel: &'a CancellationToken) -> Self {
        Self {
            llm,
            config,
            cancel,
        }
    }

    fn request(&self, state: &AgentState, outputs: &CategoryOutput, criteria: &CategoryCriteria) -> LlmRequest {
        let system = "You are a strict reviewer of job-application material. \
                      Score each criterion from 0 to 100 and reply with ONLY valid JSON, no other text.";

        let mut user = prompt::render_context(state);
        let _ = write!(
            user,
            "\n## {} output to review\n{}",
            outputs.category,
            prompt::render_outputs(outputs, OUTPUT_CHARS)
        );
        let _ = writeln!(user, "\n## Criteria (pass mark {:.0})", criteria.threshold);
        for c in &criteria.criteria {
            let _ = writeln!(user, "- {} (weight {:.2})", c.name, c.weight);
        }
        let keys: Vec<String> = criteria
            .criteria
            .iter()
            .map(|c| format!("\"{}_score\": <0-100>", c.name))
            .collect();
        let _ = write!(
            user,
            "\nFormat: {{{}, \"improvement_suggestions\": [\"<concrete fix>\"], \"specific_feedback\": \"<text>\"}}",
            keys.join(", ")
        );

        LlmRequest::prompt(self.config.model_for(ModelTier::Deep), system, user).with_options(
            self.config.max_tokens,
            JUDGE_TEMPERATURE,
            self.config.request_timeout(),
        )
    }
}

impl<C: LlmClient> CategoryJudge for LlmJudge<'_, C> {
    async fn assess(
        &self,
        state: &AgentState,
        outputs: &CategoryOutput,
        criteria: &CategoryCriteria,
    ) -> Result<ScoreSheet, Cancelled> {
        let request = self.request(state, outputs, criteria);
        match invoke_with_retry(self.llm, &request, &self.config.retry, self.cancel).await {
            Ok(text) => match ScoreSheet::parse(&text, &criteria.criteria) {
                Ok(sheet) => {
                    debug!(category = %outputs.category, ?sheet, "judge scores");
                    Ok(sheet)
                }
                Err(reason) => {
                    warn!(category = %outputs.category, %reason, "unusable judge reply");
                    Ok(ScoreSheet::unavailable(&reason))
                }
            },
            Err(LlmError::Cancelled) => Err(Cancelled),
            Err(e) => {
                warn!(category = %outputs.category, error = %e, "judge call failed");
                Ok(ScoreSheet::unavailable(&e.to_string()))
            }
        }
    }
}
