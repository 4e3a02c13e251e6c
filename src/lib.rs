pub mod assistant;
pub mod cache;
pub mod cli;
pub mod config;
pub mod knowledge;
pub mod llm;
pub mod logging;
pub mod warehouse;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use assistant::workflow::launch;
pub use assistant::{AnswerReport, AssistantContext, Router};
pub use config::Config;
