use tracing::error;

use crate::assistant::agent_executor::{AgentExecuteParams, prompt};
use crate::assistant::context::AssistantContext;

pub const TAG: &str = "summary_agent";

const SYSTEM_PROMPT: &str = "You are an analytics summarization agent in a chatbot for business analysts. \
You are given the conversation produced by the other agents. Summarize it clearly and concisely, focusing on \
insights and results relevant to a business audience. Do not mention analytical processes, data sources or \
technical details. Check that the summary matches the conversation and answers the original question.";

/// Summarizes the conversation so far.
#[derive(Default)]
pub struct SummaryAgent;

impl SummaryAgent {
    /// Summary of the transcript so far, `None` when the model fails or answers nothing.
    pub async fn generate_summary(
        &self,
        context: &AssistantContext,
        transcript: &[String],
    ) -> Option<String> {
        let user_prompt = format!(
            "Below is the information shared by the other agents. Summarize the key insights in 3 sentences or fewer, \
             focusing only on the results and findings.\n\nConversation:\n{}",
            transcript.join("\n")
        );
        match prompt(context, AgentExecuteParams::new(TAG, SYSTEM_PROMPT, user_prompt)).await {
            Ok(summary) if !summary.trim().is_empty() => Some(summary.trim().to_string()),
            Ok(_) => {
                error!("summary generation returned an empty result");
                None
            }
            Err(e) => {
                error!("summary generation failed: {}", e);
                None
            }
        }
    }
}
