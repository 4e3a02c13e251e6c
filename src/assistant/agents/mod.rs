//! Specialised agents the planner can call

pub mod analysis;
pub mod chart;
pub mod clarification;
pub mod follow_up;
pub mod knowledge;
pub mod sql;
pub mod sql_debugger;
pub mod summary;

pub use analysis::AnalysisAgent;
pub use chart::ChartAgent;
pub use clarification::{ClarificationAgent, StdinChannel, UserChannel};
pub use follow_up::FollowUpAgent;
pub use knowledge::KnowledgeAgent;
pub use sql::SqlAgent;
pub use sql_debugger::{DebugAttempt, DebugOutcome, SqlDebugger, SqlFix};
pub use summary::SummaryAgent;
