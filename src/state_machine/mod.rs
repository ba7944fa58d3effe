mod agent_state;
mod category;
mod graph;
mod report;
mod revision;

pub use agent_state::{AgentState, CategorySlice, FlagKind, OutputFlag};
pub use category::{Category, CategoryState, CategoryStatus, CriteriaGroup};
pub use graph::{Node, Route};
pub use report::{CategorySummary, RunReport};
pub use revision::{RevisionController, RevisionDecision};
