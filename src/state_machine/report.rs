use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::agent_state::{AgentState, OutputFlag};
use super::category::{Category, CategoryStatus};
use super::graph::Node;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySummary {
    pub category: Category,
    pub status: CategoryStatus,
    pub attempts_used: u32,
    /// Overall score of the last evaluated pass.
    pub score: Option<f64>,
    pub threshold: Option<f64>,
    pub score_history: Vec<f64>,
}

/// Structured record produced when a run reaches a terminal node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub company_name: String,
    pub job_title: String,
    pub terminal: Node,
    pub node_history: Vec<Node>,
    pub categories: Vec<CategorySummary>,
    pub flags: Vec<OutputFlag>,
    pub quality_score: Option<f64>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: i64,
}

impl RunReport {
    pub fn new_run_id() -> String {
        Uuid::new_v4().to_string()
    }

    /// Summarise a finished run. `history` ends with the terminal node.
    pub fn from_state(
        run_id: String,
        state: &AgentState,
        history: &[Node],
        started_at: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        let terminal = history.last().copied().unwrap_or(Node::Aborted);
        let categories = state
            .categories()
            .map(|c| CategorySummary {
                category: c.name,
                status: c.status,
                attempts_used: c.attempts_used,
                score: c.last_verdict.as_ref().map(|v| v.overall_score),
                threshold: c.last_verdict.as_ref().map(|v| v.threshold),
                score_history: c.score_history.clone(),
            })
            .collect();

        Self {
            run_id,
            company_name: state.context().company_name.clone(),
            job_title: state.context().job_title.clone(),
            terminal,
            node_history: history.to_vec(),
            categories,
            flags: state.output_flags().to_vec(),
            quality_score: state.quality_score(),
            started_at,
            completed_at: now,
            duration_ms: (now - started_at).num_milliseconds(),
        }
    }

    pub fn warnings(&self) -> impl Iterator<Item = &OutputFlag> {
        self.flags.iter().filter(|f| f.is_warning())
    }

    pub fn is_success(&self) -> bool {
        self.terminal == Node::End
    }
}
