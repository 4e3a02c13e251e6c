//! Language model access: the `ChatModel` seam, the rig-backed client and structured output

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

pub mod client;
pub mod structured;

pub use client::LLMClient;
use structured::StructuredTarget;

/// One system + user prompt exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    /// Role of the calling agent, e.g. `sql_agent` or `sql_debugger.fix`
    pub tag: String,
    pub system_prompt: String,
    pub user_prompt: String,
}

impl ChatRequest {
    pub fn new(
        tag: impl Into<String>,
        system_prompt: impl Into<String>,
        user_prompt: impl Into<String>,
    ) -> Self {
        Self {
            tag: tag.into(),
            system_prompt: system_prompt.into(),
            user_prompt: user_prompt.into(),
        }
    }

    /// Prompt text used for cache keys and size estimation.
    pub fn full_prompt(&self) -> String {
        format!("{}\n\n{}", self.system_prompt, self.user_prompt)
    }
}

/// A hosted language model answering single-turn prompts.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, request: &ChatRequest) -> Result<String>;

    /// Answers with JSON shaped like `target`.
    ///
    /// Models without native structured output fall back to prompting with the
    /// schema and parsing the text answer.
    async fn extract(
        &self,
        request: &ChatRequest,
        target: &dyn StructuredTarget,
    ) -> Result<Value> {
        structured::extract_from_text(self, request, target).await
    }
}
