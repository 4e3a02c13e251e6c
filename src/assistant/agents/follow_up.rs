use anyhow::Result;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::assistant::agent_executor::{AgentExecuteParams, extract};
use crate::assistant::context::AssistantContext;

pub const TAG: &str = "follow_up_agent";

const SYSTEM_PROMPT: &str = "You are a business intelligence assistant. Given a user's question and what \
the other agents found, recommend follow-up questions the user could ask next. Each question must be \
answerable from the same warehouse or knowledge base, and must not repeat the original question.";

/// Suggested next questions
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct FollowUpQuestions {
    /// Between one and five follow-up questions, most useful first
    pub questions: Vec<String>,
}

#[derive(Default)]
pub struct FollowUpAgent;

impl FollowUpAgent {
    pub async fn suggest(
        &self,
        context: &AssistantContext,
        question: &str,
        transcript: &[String],
    ) -> Result<Vec<String>> {
        let user_prompt = format!(
            "Original question: {}\n\nConversation so far:\n{}\n\nSuggest follow-up questions.",
            question,
            transcript.join("\n")
        );
        let suggestions: FollowUpQuestions =
            extract(context, AgentExecuteParams::new(TAG, SYSTEM_PROMPT, user_prompt)).await?;

        let original = question.trim().to_lowercase();
        Ok(suggestions
            .questions
            .into_iter()
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty() && q.to_lowercase() != original)
            .collect())
    }
}
