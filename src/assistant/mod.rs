//! The multi-agent assistant: planning, agent dispatch and the conversational workflow

use thiserror::Error;

pub mod agent_executor;
pub mod agents;
pub mod context;
pub mod dispatcher;
pub mod resources;
pub mod router;
pub mod workflow;

pub use context::AssistantContext;
pub use dispatcher::{AnswerReport, Dispatcher};
pub use router::{AgentCall, AgentPlan, Router};

/// Failures of the assistant that callers may want to tell apart.
#[derive(Debug, Error)]
pub enum AssistantError {
    #[error("the planner returned no usable plan: {0}")]
    NoPlan(String),

    #[error("unknown visualization type `{choice}`, expected one of: {available}")]
    UnknownVisualization { choice: String, available: String },

    #[error("{tag} returned output that could not be parsed: {reason}")]
    UnparsableOutput { tag: String, reason: String },

    #[error("required resource is missing: {0}")]
    MissingResource(String),
}
