//! Category-evaluated analyst orchestration for job applications, with
//! hybrid retrieval over a candidate's experience records.

pub mod cli;
pub mod config;
pub mod context;
pub mod error;
pub mod evaluation;
pub mod llm;
pub mod orchestrator;
pub mod output;
pub mod question;
pub mod retrieval;
pub mod stages;
pub mod state_machine;
pub mod ui;
