use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info, info_span, warn};

use crate::config::RunConfig;
use crate::context::RunContext;
use crate::error::StateError;
use crate::evaluation::{CategoryEvaluator, CategoryJudge, EvaluationVerdict};
use crate::llm::LlmClient;
use crate::output::FinalState;
use crate::retrieval::Evidence;
use crate::stages::{CategoryOutput, Cancelled, Stage, StageRunner};
use crate::state_machine::{
    AgentState, Category, FlagKind, Node, RevisionController, RevisionDecision, RunReport,
};

/// Progress hooks for a run. Every method defaults to doing nothing.
pub trait RunObserver {
    fn run_started(&self, _plan: &[Category]) {}

    fn category_started(&self, _category: Category, _attempt: u32) {}

    fn category_evaluated(
        &self,
        _category: Category,
        _verdict: &EvaluationVerdict,
        _decision: &RevisionDecision,
    ) {
    }

    fn run_finished(&self, _report: &RunReport) {}
}

pub struct NoopObserver;

impl RunObserver for NoopObserver {}

/// What a run hands back: the report and the read-only final state.
pub struct RunResult {
    pub report: RunReport,
    pub final_state: FinalState,
}

/// Why a category loop stopped early.
enum Halt {
    Cancelled,
    State(StateError),
}

impl From<Cancelled> for Halt {
    fn from(_: Cancelled) -> Self {
        Halt::Cancelled
    }
}

impl From<StateError> for Halt {
    fn from(err: StateError) -> Self {
        Halt::State(err)
    }
}

/// Drives one run through the category graph.
///
/// One category executes at a time. Each is evaluated after every pass and
/// re-run whole while the [`RevisionController`] asks for a retry.
pub struct OrchestrationGraph<'a, C, J> {
    llm: &'a C,
    judge: J,
    config: &'a RunConfig,
    evidence: Option<&'a Evidence<'a>>,
    cancel: CancellationToken,
    observer: &'a dyn RunObserver,
}

impl<'a, C: LlmClient, J: CategoryJudge> OrchestrationGraph<'a, C, J> {
    pub fn new(llm: &'a C, judge: J, config: &'a RunConfig, cancel: CancellationToken) -> Self {
        Self {
            llm,
            judge,
            config,
            evidence: None,
            cancel,
            observer: &NoopObserver,
        }
    }

    /// Retrieve experience evidence for the guide stages.
    pub fn with_evidence(mut self, evidence: &'a Evidence<'a>) -> Self {
        self.evidence = Some(evidence);
        self
    }

    pub fn with_observer(mut self, observer: &'a dyn RunObserver) -> Self {
        self.observer = observer;
        self
    }

    /// Run `context` to a terminal node.
    ///
    /// Invalid input aborts before any category starts. Cancellation is
    /// honoured between categories and at every LLM call; a category
    /// interrupted mid-way is closed as failed.
    pub async fn run(&self, context: RunContext) -> RunResult {
        let run_id = RunReport::new_run_id();
        let span = info_span!("run", %run_id, company = %context.company_name);
        self.run_inner(run_id, context).instrument(span).await
    }

    async fn run_inner(&self, run_id: String, context: RunContext) -> RunResult {
        let started_at = Utc::now();
        let mut state = AgentState::new(context);
        let mut history = Vec::new();

        let terminal = if let Err(e) = state.context().validate() {
            error!(error = %e, "invalid run input, aborting");
            Node::Aborted
        } else {
            self.walk(&mut state, &mut history).await
        };
        history.push(terminal);

        let report = RunReport::from_state(run_id, &state, &history, started_at);
        info!(
            terminal = %terminal,
            quality_score = ?report.quality_score,
            warnings = report.warnings().count(),
            "run finished"
        );
        self.observer.run_finished(&report);
        RunResult {
            report,
            final_state: FinalState::new(state, terminal),
        }
    }

    async fn walk(&self, state: &mut AgentState, history: &mut Vec<Node>) -> Node {
        let route = self.config.route();
        self.observer.run_started(&route.plan());
        let revision = RevisionController::new(self.config.analysis_depth);
        let runner = StageRunner::new(self.llm, self.config, self.evidence, &self.cancel);

        let mut node = route.start();
        while let Node::Category(category) = node {
            if self.cancel.is_cancelled() {
                warn!(next = %category, "run cancelled");
                return Node::Cancelled;
            }
            history.push(node);
            let span = info_span!("category", %category);
            match self
                .run_category(state, &runner, &revision, category)
                .instrument(span)
                .await
            {
                Ok(()) => node = route.next(category),
                Err(Halt::Cancelled) => {
                    warn!(%category, "run cancelled");
                    close_interrupted(state, category);
                    return Node::Cancelled;
                }
                Err(Halt::State(e)) => {
                    error!(%category, error = %e, "state discipline violated");
                    close_interrupted(state, category);
                    return Node::Aborted;
                }
            }
        }
        node
    }

    async fn run_category(
        &self,
        state: &mut AgentState,
        runner: &StageRunner<'_, C>,
        revision: &RevisionController,
        category: Category,
    ) -> Result<(), Halt> {
        let criteria = self.config.criteria.for_category(category);
        state.begin_category(category)?;
        let mut attempt = 0;

        loop {
            self.observer.category_started(category, attempt);
            state.slice_mut(category)?.start_attempt();

            let output = runner.run_category(state, category, attempt).await?;
            let sheet = self.judge.assess(state, &output, criteria).await?;
            let verdict =
                CategoryEvaluator::evaluate(&output, &criteria.criteria, criteria.threshold, &sheet);
            let flags = output_flags(state, &output);

            let mut slice = state.slice_mut(category)?;
            slice.record_output(output);
            let decision = revision.decide(&mut slice, verdict.clone());
            self.observer.category_evaluated(category, &verdict, &decision);

            if let RevisionDecision::Retry { attempt: next } = decision {
                attempt = next;
                continue;
            }
            for flag in flags {
                slice.flag(flag);
            }
            slice.finish();
            return Ok(());
        }
    }
}

fn close_interrupted(state: &mut AgentState, category: Category) {
    if let Ok(slice) = state.slice_mut(category) {
        slice.finish();
    }
}

/// Markers for the final pass of a category: failed stages, degraded
/// retrieval and answers over their character limit.
fn output_flags(state: &AgentState, output: &CategoryOutput) -> Vec<FlagKind> {
    let mut flags: Vec<FlagKind> = output
        .failed_stages()
        .into_iter()
        .map(|(stage, reason)| FlagKind::StageFailed {
            stage,
            reason: reason.to_string(),
        })
        .collect();

    if let Some(reason) = output
        .completed()
        .find_map(|(_, out)| out.retrieval_degraded.clone())
    {
        flags.push(FlagKind::RetrievalDegraded { reason });
    }

    let questions = &state.context().questions;
    for (stage, out) in output.completed() {
        if !matches!(stage, Stage::ResumeWriter | Stage::CoverLetterWriter) {
            continue;
        }
        for artifact in &out.per_question {
            let Some(question) = questions.get(artifact.question_index) else {
                continue;
            };
            if let (Some(count), Some(limit)) =
                (question.exceeds_limit(&artifact.text), question.char_limit())
            {
                flags.push(FlagKind::CharLimitExceeded {
                    question_index: artifact.question_index,
                    count,
                    limit,
                });
            }
        }
    }
    flags
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;
    use crate::config::{AnalysisDepth, DocumentType, OutputOption};
    use crate::context::sample_context;
    use crate::evaluation::{CategoryCriteria, ScoreSheet};
    use crate::llm::RetryConfig;
    use crate::llm::testing::ScriptedClient;
    use crate::state_machine::CategoryStatus;

    /// Gives every criterion the same score; replays `script` per call, then `default`.
    struct FixedJudge {
        script: Mutex<VecDeque<f64>>,
        default: f64,
        calls: Mutex<Vec<Category>>,
    }

    impl FixedJudge {
        fn new(script: &[f64], default: f64) -> Self {
            Self {
                script: Mutex::new(script.iter().copied().collect()),
                default,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls_for(&self, category: Category) -> usize {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|c| **c == category)
                .count()
        }
    }

    impl CategoryJudge for &FixedJudge {
        async fn assess(
            &self,
            _state: &AgentState,
            outputs: &CategoryOutput,
            criteria: &CategoryCriteria,
        ) -> Result<ScoreSheet, Cancelled> {
            self.calls.lock().unwrap().push(outputs.category);
            let score = self.script.lock().unwrap().pop_front().unwrap_or(self.default);
            Ok(criteria
                .criteria
                .iter()
                .fold(ScoreSheet::new(), |sheet, c| sheet.with_score(&c.name, score)))
        }
    }

    fn config(depth: AnalysisDepth, output_option: OutputOption) -> RunConfig {
        RunConfig {
            analysis_depth: depth,
            output_option,
            retry: RetryConfig {
                max_retries: 0,
                base_delay_ms: 1,
            },
            ..RunConfig::default()
        }
    }

    struct CancelAfter {
        category: Category,
        cancel: CancellationToken,
    }

    impl RunObserver for CancelAfter {
        fn category_evaluated(&self, category: Category, _: &EvaluationVerdict, _: &RevisionDecision) {
            if category == self.category {
                self.cancel.cancel();
            }
        }
    }

    #[tokio::test]
    async fn low_depth_escalates_after_one_revision() {
        let llm = ScriptedClient::always("draft");
        let judge = FixedJudge::new(&[65.0, 65.0], 90.0);
        let config = config(AnalysisDepth::Low, OutputOption::GuideOnly);
        let graph = OrchestrationGraph::new(&llm, &judge, &config, CancellationToken::new());

        let result = graph.run(sample_context()).await;
        let state = result.final_state.state();
        let analysis = state.category(Category::Analysis).unwrap();

        assert_eq!(analysis.status, CategoryStatus::PassedWithWarning);
        assert_eq!(analysis.attempts_used, 1);
        assert_eq!(analysis.score_history, vec![65.0, 65.0]);
        assert_eq!(judge.calls_for(Category::Analysis), 2);
        assert_eq!(state.feedback(Category::Analysis).len(), 1);
        assert!(state.has_warning());
        assert_eq!(result.report.terminal, Node::End);
        assert_eq!(result.report.warnings().count(), 1);

        // The revision pass saw the reviewer feedback.
        assert!(llm.prompts().iter().any(|p| p.contains("Reviewer feedback")));
    }

    #[tokio::test]
    async fn high_depth_first_pass_success_never_revises() {
        let llm = ScriptedClient::always("draft");
        let judge = FixedJudge::new(&[], 90.0);
        let config = config(AnalysisDepth::High, OutputOption::GuideOnly);
        let graph = OrchestrationGraph::new(&llm, &judge, &config, CancellationToken::new());

        let result = graph.run(sample_context()).await;
        let state = result.final_state.state();
        for category in [Category::Analysis, Category::Matching, Category::Strategy, Category::Guide] {
            let c = state.category(category).unwrap();
            assert_eq!(c.status, CategoryStatus::Passed);
            assert_eq!(c.attempts_used, 0);
            assert!(state.feedback(category).is_empty());
            assert_eq!(judge.calls_for(category), 1);
        }
        assert!(!state.has_warning());
        assert_eq!(state.quality_score(), Some(90.0));
        assert_eq!(
            result.report.node_history,
            vec![
                Node::Category(Category::Analysis),
                Node::Category(Category::Matching),
                Node::Category(Category::Strategy),
                Node::Category(Category::Guide),
                Node::End,
            ]
        );
    }

    #[tokio::test]
    async fn missing_job_description_aborts_before_any_category() {
        let llm = ScriptedClient::always("draft");
        let judge = FixedJudge::new(&[], 90.0);
        let config = config(AnalysisDepth::Medium, OutputOption::Both);
        let graph = OrchestrationGraph::new(&llm, &judge, &config, CancellationToken::new());

        let mut context = sample_context();
        context.job_description.clear();
        let result = graph.run(context).await;

        assert_eq!(result.report.terminal, Node::Aborted);
        assert_eq!(result.report.node_history, vec![Node::Aborted]);
        assert_eq!(result.final_state.state().categories().count(), 0);
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn attempts_stay_within_budget_for_every_depth() {
        for depth in [AnalysisDepth::Low, AnalysisDepth::Medium, AnalysisDepth::High] {
            let llm = ScriptedClient::always("draft");
            let judge = FixedJudge::new(&[], 10.0);
            let config = config(depth, OutputOption::GuideOnly);
            let graph = OrchestrationGraph::new(&llm, &judge, &config, CancellationToken::new());

            let result = graph.run(sample_context()).await;
            for c in result.final_state.state().categories() {
                assert_eq!(c.attempts_used, depth.revision_budget());
                assert_eq!(c.status, CategoryStatus::PassedWithWarning);
            }
            assert_eq!(result.report.terminal, Node::End);
        }
    }

    #[tokio::test]
    async fn finished_categories_are_never_rewritten() {
        let llm = ScriptedClient::always("draft");
        // Analysis passes, Matching needs both revisions.
        let judge = FixedJudge::new(&[90.0, 50.0, 50.0, 50.0], 90.0);
        let config = config(AnalysisDepth::Medium, OutputOption::GuideOnly);
        let graph = OrchestrationGraph::new(&llm, &judge, &config, CancellationToken::new());

        let result = graph.run(sample_context()).await;
        let state = result.final_state.state();
        let analysis = state.output(Category::Analysis).unwrap();
        assert_eq!(analysis.attempt, 0);
        assert_eq!(state.category(Category::Analysis).unwrap().score_history, vec![90.0]);
        assert_eq!(state.output(Category::Matching).unwrap().attempt, 2);
        assert!(state.feedback(Category::Analysis).is_empty());
    }

    #[tokio::test]
    async fn cancellation_stops_at_the_next_category_boundary() {
        let llm = ScriptedClient::always("draft");
        let judge = FixedJudge::new(&[], 90.0);
        let config = config(AnalysisDepth::Medium, OutputOption::Both);
        let cancel = CancellationToken::new();
        let observer = CancelAfter {
            category: Category::Analysis,
            cancel: cancel.clone(),
        };
        let graph = OrchestrationGraph::new(&llm, &judge, &config, cancel).with_observer(&observer);

        let result = graph.run(sample_context()).await;
        assert_eq!(result.report.terminal, Node::Cancelled);
        assert_eq!(
            result.report.node_history,
            vec![Node::Category(Category::Analysis), Node::Cancelled]
        );
        let state = result.final_state.state();
        assert_eq!(
            state.category(Category::Analysis).map(|c| c.status),
            Some(CategoryStatus::Passed)
        );
        assert!(state.category(Category::Matching).is_none());
    }

    #[tokio::test]
    async fn failed_stage_zeroes_scores_and_is_flagged() {
        let llm = ScriptedClient::failing(crate::llm::LlmError::Timeout);
        let judge = FixedJudge::new(&[], 90.0);
        let config = config(AnalysisDepth::Low, OutputOption::GuideOnly);
        let graph = OrchestrationGraph::new(&llm, &judge, &config, CancellationToken::new());

        let result = graph.run(sample_context()).await;
        let state = result.final_state.state();
        let analysis = state.category(Category::Analysis).unwrap();
        assert_eq!(analysis.score_history, vec![0.0, 0.0]);
        assert_eq!(analysis.status, CategoryStatus::PassedWithWarning);
        assert!(state.output_flags().iter().any(|f| matches!(
            f.kind,
            FlagKind::StageFailed {
                stage: Stage::CompanyAnalyst,
                ..
            }
        )));
        assert_eq!(result.report.terminal, Node::End);
    }

    #[tokio::test]
    async fn cover_letter_route_flags_long_answers() {
        let llm = ScriptedClient::always(&"x".repeat(900));
        let judge = FixedJudge::new(&[], 90.0);
        let mut config = config(AnalysisDepth::Low, OutputOption::Both);
        config.document_type = DocumentType::CoverLetter;
        let graph = OrchestrationGraph::new(&llm, &judge, &config, CancellationToken::new());

        let result = graph.run(sample_context()).await;
        let state = result.final_state.state();
        assert!(state.category(Category::ResumeWriting).is_none());
        assert_eq!(
            state.category(Category::QualityCheck).map(|c| c.status),
            Some(CategoryStatus::Passed)
        );

        let flags: Vec<_> = state
            .output_flags()
            .iter()
            .filter(|f| matches!(f.kind, FlagKind::CharLimitExceeded { .. }))
            .collect();
        assert_eq!(flags.len(), 1);
        assert_eq!(flags[0].category, Category::CoverLetterWriting);
        assert_eq!(
            flags[0].kind,
            FlagKind::CharLimitExceeded {
                question_index: 0,
                count: 900,
                limit: 800,
            }
        );
        assert!(result.final_state.combined_document().is_some());
        assert_eq!(result.final_state.document_fragments().len(), 2);
    }
}
