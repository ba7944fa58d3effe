use futures_util::future::join_all;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info_span, warn};

use super::output::{CategoryOutput, ExperienceMatch, StageResult};
use super::{Stage, prompt};
use crate::config::RunConfig;
use crate::error::FailureKind;
use crate::llm::{LlmClient, LlmError, LlmRequest, invoke_with_retry};
use crate::question::Question;
use crate::retrieval::{Evidence, RecordCategory};
use crate::state_machine::{AgentState, Category};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StageError {
    #[error("cancelled")]
    Cancelled,
    #[error("{0}")]
    Failed(FailureKind),
}

impl From<LlmError> for StageError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Cancelled => StageError::Cancelled,
            other => StageError::Failed(FailureKind::from(&other)),
        }
    }
}

/// The run was cancelled while a category was executing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("run cancelled")]
pub struct Cancelled;

/// Everything a stage may read during one attempt.
pub struct StageContext<'a, C> {
    pub llm: &'a C,
    pub config: &'a RunConfig,
    /// Read-only view; stages never write to it.
    pub state: &'a AgentState,
    pub category: Category,
    pub attempt: u32,
    pub evidence: Option<&'a Evidence<'a>>,
    pub cancel: &'a CancellationToken,
    /// The cover letter writer also answers each question.
    pub writes_answers: bool,
}

impl<C: LlmClient> StageContext<'_, C> {
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// One LLM call for `stage`; `extra` is appended to the shared prompt.
    pub(crate) async fn invoke(&self, stage: Stage, extra: String) -> Result<String, StageError> {
        let user = format!(
            "{}{}{}{}",
            prompt::render_context(self.state),
            prompt::render_prior(self.state, self.category),
            prompt::render_revision(self.state, stage),
            extra
        );
        let request = LlmRequest::prompt(
            self.config.model_for_category(self.category),
            prompt::system_prompt(stage),
            user,
        )
        .with_options(
            self.config.max_tokens,
            self.config.temperature,
            self.config.request_timeout(),
        );
        let text = invoke_with_retry(self.llm, &request, &self.config.retry, self.cancel).await?;
        if text.trim().is_empty() {
            return Err(StageError::Failed(FailureKind::Business(
                "empty stage output".into(),
            )));
        }
        Ok(text)
    }

    /// Evidence records for `question`; notes any retrieval degradation.
    pub(crate) fn evidence_for(
        &self,
        question: &Question,
        categories: Option<&[RecordCategory]>,
        degraded: &mut Option<String>,
    ) -> Vec<ExperienceMatch> {
        let Some(evidence) = self.evidence else {
            return Vec::new();
        };
        let outcome = evidence.lookup_in(&question.retrieval_query(), categories);
        if let Some(reason) = outcome.degraded
            && degraded.is_none()
        {
            *degraded = Some(reason);
        }
        outcome
            .hits
            .into_iter()
            .map(|hit| ExperienceMatch {
                record_id: hit.record.id,
                record_category: hit.record.category,
                text: hit.record.text,
                score: hit.score,
                mode: outcome.used,
            })
            .collect()
    }
}

/// Runs the stages of one category concurrently against a read-only state.
pub struct StageRunner<'a, C> {
    llm: &'a C,
    config: &'a RunConfig,
    evidence: Option<&'a Evidence<'a>>,
    cancel: &'a CancellationToken,
}

impl<'a, C: LlmClient> StageRunner<'a, C> {
    pub fn new(
        llm: &'a C,
        config: &'a RunConfig,
        evidence: Option<&'a Evidence<'a>>,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            llm,
            config,
            evidence,
            cancel,
        }
    }

    /// Execute every stage of `category` for revision `attempt`.
    ///
    /// Stages only read `state`; their results are collected into a
    /// [`CategoryOutput`] that the caller writes back as a single unit.
    /// A failed stage is reported with its reason and no output.
    pub async fn run_category(
        &self,
        state: &AgentState,
        category: Category,
        attempt: u32,
    ) -> Result<CategoryOutput, Cancelled> {
        if self.cancel.is_cancelled() {
            return Err(Cancelled);
        }
        let writes_answers = !self.config.route().includes(Category::ResumeWriting);

        let runs = category.stages().iter().map(|&stage| {
            let ctx = StageContext {
                llm: self.llm,
                config: self.config,
                state,
                category,
                attempt,
                evidence: self.evidence,
                cancel: self.cancel,
                writes_answers,
            };
            async move { (stage, stage.run(&ctx).await) }
                .instrument(info_span!("stage", stage = %stage, attempt))
        });
        let results = join_all(runs).await;

        let mut output = CategoryOutput::new(category, attempt);
        for (stage, result) in results {
            match result {
                Ok(stage_output) => {
                    debug!(%stage, "stage completed");
                    output.push(stage, StageResult::Completed(stage_output));
                }
                Err(StageError::Cancelled) => return Err(Cancelled),
                Err(StageError::Failed(reason)) => {
                    warn!(%stage, %reason, "stage failed");
                    output.push(stage, StageResult::Failed { reason });
                }
            }
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::sample_context;
    use crate::llm::RetryConfig;
    use crate::llm::testing::ScriptedClient;
    use crate::retrieval::{ExperienceIndex, ExperienceRecord, RecordCategory, RetrievalEngine, SearchMode};

    fn config() -> RunConfig {
        RunConfig {
            retry: RetryConfig {
                max_retries: 0,
                base_delay_ms: 1,
            },
            ..RunConfig::default()
        }
    }

    #[tokio::test]
    async fn runs_every_stage_of_the_category() {
        let llm = ScriptedClient::always("analysis text");
        let config = config();
        let cancel = CancellationToken::new();
        let state = AgentState::new(sample_context());
        let runner = StageRunner::new(&llm, &config, None, &cancel);

        let out = runner.run_category(&state, Category::Analysis, 0).await.unwrap();
        assert!(out.is_complete());
        assert_eq!(out.stages.len(), 3);
        assert_eq!(llm.calls(), 3);
        assert_eq!(
            out.stage(Stage::JdAnalyst).map(|o| o.summary.as_str()),
            Some("analysis text")
        );
    }

    #[tokio::test]
    async fn llm_failure_becomes_a_failed_stage() {
        let llm = ScriptedClient::new(vec![
            Ok("company".into()),
            Err(LlmError::AuthError {
                status: 401,
                message: "bad key".into(),
            }),
            Ok("market".into()),
        ]);
        let config = config();
        let cancel = CancellationToken::new();
        let state = AgentState::new(sample_context());
        let runner = StageRunner::new(&llm, &config, None, &cancel);

        let out = runner.run_category(&state, Category::Analysis, 0).await.unwrap();
        let failed = out.failed_stages();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].0, Stage::JdAnalyst);
        assert!(matches!(failed[0].1, FailureKind::System(_)));
        assert!(out.stage(Stage::JdAnalyst).is_none());
    }

    #[tokio::test]
    async fn empty_completion_is_a_business_failure() {
        let llm = ScriptedClient::always("   ");
        let config = config();
        let cancel = CancellationToken::new();
        let state = AgentState::new(sample_context());
        let runner = StageRunner::new(&llm, &config, None, &cancel);

        let out = runner.run_category(&state, Category::Strategy, 0).await.unwrap();
        assert_eq!(out.failed_stages().len(), 2);
        assert!(matches!(out.failed_stages()[0].1, FailureKind::Business(_)));
    }

    #[tokio::test]
    async fn cancelled_before_start() {
        let llm = ScriptedClient::always("x");
        let config = config();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let state = AgentState::new(sample_context());
        let runner = StageRunner::new(&llm, &config, None, &cancel);

        assert_eq!(
            runner.run_category(&state, Category::Analysis, 0).await,
            Err(Cancelled)
        );
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn guide_answers_per_question_with_evidence() {
        let index = ExperienceIndex::new();
        index
            .rebuild(
                vec![
                    ExperienceRecord::new(
                        "work-0",
                        RecordCategory::WorkExperience,
                        "Solved a difficult Spark memory problem in production",
                    ),
                    ExperienceRecord::new("skill-0", RecordCategory::Skill, "Python, SQL"),
                ],
                None,
            )
            .unwrap();
        let evidence = Evidence::new(&index, RetrievalEngine::new(0.5), SearchMode::Hybrid, 3);

        let llm = ScriptedClient::always("guide text");
        let config = config();
        let cancel = CancellationToken::new();
        let state = AgentState::new(sample_context());
        let runner = StageRunner::new(&llm, &config, Some(&evidence), &cancel);

        let out = runner.run_category(&state, Category::Guide, 0).await.unwrap();
        // Two per-question stages with two questions each, plus the writing guide.
        assert_eq!(llm.calls(), 5);

        let experience = out.stage(Stage::ExperienceGuide).unwrap();
        assert_eq!(experience.per_question.len(), 2);
        let problem = experience.question(1).unwrap();
        assert_eq!(problem.matches[0].record_id, "work-0");
        assert_eq!(problem.matches[0].mode, SearchMode::Keyword);
        assert!(experience.retrieval_degraded.is_some());

        let prompts = llm.prompts();
        assert!(prompts.iter().any(|p| p.contains("Relevant experience records")));
    }

    #[tokio::test]
    async fn experience_evidence_skips_skill_records() {
        let index = ExperienceIndex::new();
        index
            .rebuild(
                vec![
                    ExperienceRecord::new(
                        "skill-0",
                        RecordCategory::Skill,
                        "Problem solving, difficult problem analysis, problem triage",
                    ),
                    ExperienceRecord::new(
                        "project-0",
                        RecordCategory::Project,
                        "Fixed a difficult Kafka lag problem",
                    ),
                ],
                None,
            )
            .unwrap();
        let evidence = Evidence::new(&index, RetrievalEngine::new(0.5), SearchMode::Keyword, 3);

        let unfiltered = evidence.lookup("Describe a difficult problem you solved.");
        assert_eq!(unfiltered.hits[0].record.id, "skill-0");

        let llm = ScriptedClient::always("guide text");
        let config = config();
        let cancel = CancellationToken::new();
        let state = AgentState::new(sample_context());
        let runner = StageRunner::new(&llm, &config, Some(&evidence), &cancel);

        let out = runner.run_category(&state, Category::Guide, 0).await.unwrap();
        let experience = out.stage(Stage::ExperienceGuide).unwrap();
        let problem = experience.question(1).unwrap();
        assert_eq!(problem.matches.len(), 1);
        assert_eq!(problem.matches[0].record_id, "project-0");
        assert_eq!(problem.matches[0].record_category, RecordCategory::Project);
        assert!(experience.retrieval_degraded.is_none());
    }
}
