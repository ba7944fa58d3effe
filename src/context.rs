//! Run input and the immutable context every stage reads.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::InputError;
use crate::question::{Question, QuestionInput};

/// Company, job and candidate context for one run. Never modified after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunContext {
    pub company_name: String,
    pub job_title: String,
    pub job_description: String,
    /// Free-form candidate data; opaque to the orchestration core.
    pub candidate_info: Value,
    pub questions: Vec<Question>,
}

impl RunContext {
    /// Required inputs: a job description, a company name and a non-empty candidate context.
    pub fn validate(&self) -> Result<(), InputError> {
        if self.job_description.trim().is_empty() {
            return Err(InputError::MissingJobDescription);
        }
        if self.company_name.trim().is_empty() {
            return Err(InputError::MissingCompanyName);
        }
        if is_empty_value(&self.candidate_info) {
            return Err(InputError::EmptyCandidateContext);
        }
        Ok(())
    }
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.iter().all(is_empty_value),
        Value::Object(map) => map.values().all(is_empty_value),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

/// Run input as read from a JSON file.
#[derive(Debug, Clone, Deserialize)]
pub struct RunInput {
    #[serde(default)]
    pub company_name: String,
    #[serde(default)]
    pub job_title: String,
    #[serde(default)]
    pub job_description: String,
    #[serde(default)]
    pub candidate_info: Value,
    #[serde(default)]
    pub questions: Vec<QuestionInput>,
    /// Stored profile to retrieve experience evidence from.
    #[serde(default)]
    pub profile: Option<String>,
}

impl RunInput {
    pub fn into_context(self) -> RunContext {
        RunContext {
            company_name: self.company_name,
            job_title: self.job_title,
            job_description: self.job_description,
            candidate_info: self.candidate_info,
            questions: self.questions.into_iter().map(Question::from).collect(),
        }
    }
}

#[cfg(test)]
pub(crate) fn sample_context() -> RunContext {
    RunContext {
        company_name: "Acme Data".into(),
        job_title: "Data Engineer".into(),
        job_description: "Build and operate Python data pipelines on Spark.".into(),
        candidate_info: serde_json::json!({
            "name": "Jordan",
            "skills": ["Python", "Spark", "SQL"]
        }),
        questions: vec![
            Question::new("Why do you want to join Acme?", None, Some(800)),
            Question::new("Describe a difficult problem you solved.", None, None),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::question::QuestionType;

    #[test]
    fn valid_context_passes() {
        assert_eq!(sample_context().validate(), Ok(()));
    }

    #[test]
    fn missing_job_description_is_rejected_first() {
        let mut ctx = sample_context();
        ctx.job_description = "   ".into();
        ctx.company_name.clear();
        assert_eq!(ctx.validate(), Err(InputError::MissingJobDescription));
    }

    #[test]
    fn empty_candidate_context_is_rejected() {
        for empty in [
            Value::Null,
            serde_json::json!({}),
            serde_json::json!({"skills": [], "name": ""}),
        ] {
            let mut ctx = sample_context();
            ctx.candidate_info = empty;
            assert_eq!(ctx.validate(), Err(InputError::EmptyCandidateContext));
        }
    }

    #[test]
    fn run_input_builds_questions() {
        let input: RunInput = serde_json::from_str(
            r#"{
                "company_name": "Acme",
                "job_title": "Engineer",
                "job_description": "Rust services",
                "candidate_info": {"name": "Sam"},
                "questions": [{"question": "Why us?", "type": "motivation", "char_limit": 500}],
                "profile": "sam"
            }"#,
        )
        .unwrap();
        assert_eq!(input.profile.as_deref(), Some("sam"));
        let ctx = input.into_context();
        assert_eq!(ctx.questions.len(), 1);
        assert_eq!(ctx.questions[0].question_type(), QuestionType::Motivation);
        assert_eq!(ctx.questions[0].char_limit(), Some(500));
    }
}
