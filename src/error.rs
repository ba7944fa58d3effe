//! Error taxonomy for a run.
//!
//! Each concern owns a `thiserror` enum; [`AppError`] aggregates them for
//! callers that only need to report. Which errors are fatal is decided by
//! where they surface, not by their type: input and config errors abort,
//! LLM errors become criterion failures, retrieval errors degrade the mode.

use thiserror::Error;

pub use crate::llm::LlmError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("input error: {0}")]
    Input(#[from] InputError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    #[error("profile error: {0}")]
    Profile(#[from] ProfileError),

    #[error("state error: {0}")]
    State(#[from] StateError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Missing required run context. Always fatal, raised before any category runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("job description is missing")]
    MissingJobDescription,

    #[error("company name is missing")]
    MissingCompanyName,

    #[error("candidate context is empty")]
    EmptyCandidateContext,
}

/// Malformed configuration. Only ever raised while loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("criterion `{criterion}` in `{group}` has weight {weight}, expected (0, 1]")]
    InvalidWeight {
        group: String,
        criterion: String,
        weight: f64,
    },

    #[error("weights for `{group}` sum to {sum}, expected 1.0")]
    WeightSum { group: String, sum: f64 },

    #[error("threshold {threshold} for `{group}` is outside [0, 100]")]
    InvalidThreshold { group: String, threshold: f64 },

    #[error("no criteria configured for `{0}`")]
    MissingCriteria(String),

    #[error("hybrid alpha {0} is outside [0, 1]")]
    InvalidAlpha(f64),

    #[error("top_k must be at least 1")]
    InvalidTopK,

    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RetrievalError {
    /// Semantic scoring was requested but the index has no vectors.
    #[error("semantic search unavailable: {0}")]
    SemanticUnavailable(String),

    #[error("embedding failed: {0}")]
    Embedding(String),
}

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("profile not found: {0}")]
    NotFound(String),

    #[error("invalid profile name: {0}")]
    InvalidName(String),

    #[error("duplicate record id `{0}`")]
    DuplicateId(String),

    #[error("record `{0}` has empty text")]
    EmptyText(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Violations of the accumulation discipline on [`AgentState`](crate::state_machine::AgentState).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("category {0} is already finished and cannot be modified")]
    Sealed(String),

    #[error("category {requested} is not active (active: {active})")]
    NotActive { requested: String, active: String },

    #[error("category {0} was already started")]
    AlreadyStarted(String),
}

/// Classifies a stage failure for evaluation and retry decisions.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum FailureKind {
    /// The stage produced nothing usable (empty or malformed output).
    Business(String),
    /// Infrastructure failure (timeout, rate limit, auth, network).
    System(String),
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::Business(msg) => write!(f, "Business failure: {msg}"),
            FailureKind::System(msg) => write!(f, "System failure: {msg}"),
        }
    }
}

impl From<&LlmError> for FailureKind {
    fn from(err: &LlmError) -> Self {
        match err {
            LlmError::InvalidResponse(msg) => FailureKind::Business(msg.clone()),
            other => FailureKind::System(other.to_string()),
        }
    }
}
