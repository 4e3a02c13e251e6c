//! Clarification Agent: detects ambiguous questions and asks the user to resolve them

use anyhow::Result;
use async_trait::async_trait;
use std::io::Write;
use tracing::{error, info, warn};

use crate::assistant::agent_executor::{AgentExecuteParams, prompt};
use crate::assistant::context::AssistantContext;

pub const DETECT_TAG: &str = "clarification_agent.detect";
pub const CLARIFY_TAG: &str = "clarification_agent.clarify";

const DETECT_SYSTEM_PROMPT: &str = r#"You are an expert in identifying ambiguous queries.
Your task is to decide whether the user's query needs clarification.

Look for vague terms such as:
1. "Last week" (fiscal week or calendar week?)
2. "Top shows/genres" (top by views, ratings or another metric?)
3. "Trend" (over which timeframe, measured how?)
4. References to "DMA" or "region" (which one?)
5. "Broadcast survey period" (fiscal month or calendar month?)

If such terms are present, answer "True". Otherwise answer "False"."#;

const CLARIFY_SYSTEM_PROMPT: &str = r#"You are a Clarification Agent for ambiguous analytics questions.
Identify the unclear part of the user's query and ask one specific question about it, for example:
- Timeframes: "Do you mean fiscal week or calendar week?"
- "Top": "Should 'top' be defined by total views, ratings, or another metric?"
- Trends: "What timeframe should the trend cover?"
- Regions: "Which specific DMA or region are you referring to?"
- Devices: "Which device category should the query focus on?"
- Rate of change: "How should the rate of change be calculated?"

Ask one question at a time and be concise."#;

/// Where clarifying questions go and answers come from.
#[async_trait]
pub trait UserChannel: Send + Sync {
    /// Asks `question`; `None` means the user gave no answer.
    async fn ask(&self, question: &str) -> Result<Option<String>>;
}

/// One line from stdin, `None` at end of input.
pub async fn read_stdin_line() -> Result<Option<String>> {
    let read = tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        std::io::stdin().read_line(&mut line).map(|n| (n, line))
    })
    .await??;
    Ok((read.0 > 0).then_some(read.1))
}

/// Asks on stdout and reads one line from stdin.
#[derive(Default)]
pub struct StdinChannel;

#[async_trait]
impl UserChannel for StdinChannel {
    async fn ask(&self, question: &str) -> Result<Option<String>> {
        println!("\n❓ {}", question);
        print!("Please provide your clarification: ");
        std::io::stdout().flush()?;

        let Some(line) = read_stdin_line().await? else {
            return Ok(None);
        };
        let answer = line.trim();
        Ok((!answer.is_empty()).then(|| answer.to_string()))
    }
}

#[derive(Default)]
pub struct ClarificationAgent;

impl ClarificationAgent {
    /// True when the model says the question is ambiguous; any other answer or an error means it is not.
    pub async fn detect_ambiguity(&self, context: &AssistantContext, question: &str) -> bool {
        let user_prompt = format!(
            "User Query: {}\n\nDoes this query require clarification?",
            question
        );
        match prompt(
            context,
            AgentExecuteParams::new(DETECT_TAG, DETECT_SYSTEM_PROMPT, user_prompt),
        )
        .await
        {
            Ok(answer) if answer.contains("True") => {
                info!("ambiguity detected");
                true
            }
            Ok(answer) if answer.contains("False") => false,
            Ok(answer) => {
                warn!(answer = %answer, "unexpected ambiguity answer, treating the question as clear");
                false
            }
            Err(e) => {
                error!("ambiguity detection failed: {}", e);
                false
            }
        }
    }

    /// A clarifying question, or `None` when none could be produced.
    pub async fn clarify_query(&self, context: &AssistantContext, question: &str) -> Option<String> {
        let user_prompt = format!("User Query: {}\n\nProvide a clarification question.", question);
        match prompt(
            context,
            AgentExecuteParams::new(CLARIFY_TAG, CLARIFY_SYSTEM_PROMPT, user_prompt),
        )
        .await
        {
            Ok(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
            Ok(_) => None,
            Err(e) => {
                error!("clarification generation failed: {}", e);
                None
            }
        }
    }

    /// Clarification rounds for a question already found ambiguous.
    ///
    /// Each round asks one clarifying question and appends the answer to the question.
    /// Rounds stop when the question is no longer ambiguous, when no question or no
    /// answer comes back, or after `max_clarification_rounds`.
    pub async fn clarify_question(
        &self,
        context: &AssistantContext,
        channel: &dyn UserChannel,
        question: &str,
    ) -> String {
        let max_rounds = context.config.assistant.max_clarification_rounds;
        let mut clarified = question.to_string();

        for round in 1..=max_rounds {
            if round > 1 && !self.detect_ambiguity(context, &clarified).await {
                info!(round, "question is clear now");
                return clarified;
            }

            let Some(clarifying_question) = self.clarify_query(context, &clarified).await else {
                warn!("no clarifying question was generated, proceeding with the best guess");
                return clarified;
            };

            let answer = match channel.ask(&clarifying_question).await {
                Ok(Some(answer)) if !answer.trim().is_empty() => answer,
                Ok(_) => {
                    warn!("the user gave no clarification, proceeding with the best guess");
                    return clarified;
                }
                Err(e) => {
                    error!("failed to read the clarification: {}", e);
                    return clarified;
                }
            };

            clarified = format!("{}\nUser clarified: {}", clarified, answer.trim());
        }

        warn!("maximum clarification rounds reached, proceeding with the best guess");
        clarified
    }
}
