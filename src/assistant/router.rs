//! Planner/Router: clarifies the question, then asks the model for an ordered plan of agent calls

use anyhow::Result;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use tracing::{info, warn};

use crate::assistant::AssistantError;
use crate::assistant::agent_executor::{AgentExecuteParams, extract};
use crate::assistant::agents::clarification::{ClarificationAgent, UserChannel};
use crate::assistant::context::AssistantContext;
use crate::assistant::dispatcher::{AnswerReport, Dispatcher};

pub const TAG: &str = "router";

/// Agents the planner can call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgentKind {
    Sql,
    Chart,
    Knowledge,
    Analysis,
    FollowUp,
    Summary,
}

impl AgentKind {
    pub const ALL: [AgentKind; 6] = [
        AgentKind::Sql,
        AgentKind::Chart,
        AgentKind::Knowledge,
        AgentKind::Analysis,
        AgentKind::FollowUp,
        AgentKind::Summary,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            AgentKind::Sql => "sql_agent",
            AgentKind::Chart => "chart_agent",
            AgentKind::Knowledge => "knowledge_agent",
            AgentKind::Analysis => "analysis_agent",
            AgentKind::FollowUp => "follow_up_agent",
            AgentKind::Summary => "summary_agent",
        }
    }
}

impl Display for AgentKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for AgentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        AgentKind::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| format!("unknown agent: {}", s))
    }
}

/// Arguments of one agent call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AgentArgs {
    /// What the agent should do: the term to look up, the data question to query, or an instruction
    #[serde(default)]
    pub prompt: Option<String>,
}

/// One step of the plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AgentCall {
    /// One of sql_agent, chart_agent, knowledge_agent, analysis_agent, follow_up_agent, summary_agent
    #[serde(alias = "Agent")]
    pub agent: String,
    #[serde(default)]
    pub args: AgentArgs,
}

impl AgentCall {
    pub fn new(agent: &str, prompt: Option<&str>) -> Self {
        Self {
            agent: agent.to_string(),
            args: AgentArgs {
                prompt: prompt.map(str::to_string),
            },
        }
    }

    /// The called agent, `None` for names the dispatcher does not know.
    pub fn kind(&self) -> Option<AgentKind> {
        self.agent.parse().ok()
    }

    /// The prompt argument when it holds more than whitespace.
    pub fn prompt(&self) -> Option<&str> {
        self.args
            .prompt
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
    }
}

/// Ordered agent calls answering one question
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AgentPlan {
    /// Agent calls in execution order
    #[serde(rename = "agent_calls", alias = "calls")]
    pub calls: Vec<AgentCall>,
}

const SYSTEM_PROMPT: &str = r#"Act as a Business Intelligence Manager with more than 15 years of experience.
Understand the user's question as well as you can and create a plan that has the other agents work as a group to serve the user.

The agents available to you are:
1. SQL Agent (sql_agent) - writes SQL queries and retrieves data from the warehouse
2. Chart Agent (chart_agent) - takes the retrieved data, picks the best chart and assembles a chart spec
3. Knowledge Agent (knowledge_agent) - searches the knowledge base and assembles an answer
4. Analysis Agent (analysis_agent) - turns the gathered information into a narrative with recommendations
5. Follow-up Agent (follow_up_agent) - recommends follow-up questions the user could ask next
6. Summary Agent (summary_agent) - summarizes the whole conversation; call it last when more than one agent was used

Rules:
1. When calling knowledge_agent, pass only the term to look up as the prompt when possible.
2. When sql_agent is called, always call chart_agent after it to visualize the data.
3. List the calls in the order they must run.

Example:
User: "What is the definition of churn?" ->
{"agent_calls": [
  {"agent": "knowledge_agent", "args": {"prompt": "churn"}},
  {"agent": "summary_agent", "args": {"prompt": "Provide a final summary of the conversation."}}
]}"#;

#[derive(Default)]
pub struct Router {
    clarification: ClarificationAgent,
    dispatcher: Dispatcher,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs the clarification rounds when enabled and the question is ambiguous.
    pub async fn clarify(
        &self,
        context: &AssistantContext,
        channel: Option<&dyn UserChannel>,
        question: &str,
    ) -> String {
        let Some(channel) = channel else {
            return question.to_string();
        };
        if !context.config.assistant.clarification_enabled {
            return question.to_string();
        }
        if !self.clarification.detect_ambiguity(context, question).await {
            info!("no ambiguity detected, proceeding with the original question");
            return question.to_string();
        }

        let clarified = self
            .clarification
            .clarify_question(context, channel, question)
            .await;
        info!(question = %clarified, "clarified question");
        clarified
    }

    /// Asks the model for the plan; no plan at all is `AssistantError::NoPlan`.
    pub async fn plan(&self, context: &AssistantContext, question: &str) -> Result<AgentPlan> {
        let user_prompt = format!(
            "Come up with a plan for the following question: {}\n\
             Only explain what you are about to do if you were asked to; otherwise keep the answer minimal.",
            question
        );
        let plan: AgentPlan = extract(context, AgentExecuteParams::new(TAG, SYSTEM_PROMPT, user_prompt))
            .await
            .map_err(|e| AssistantError::NoPlan(e.to_string()))?;

        if plan.calls.is_empty() {
            return Err(AssistantError::NoPlan(String::from("the plan holds no agent calls")).into());
        }
        for call in plan.calls.iter().filter(|c| c.kind().is_none()) {
            warn!(agent = %call.agent, "plan names an unknown agent, it will be skipped");
        }
        info!(
            agents = %plan.calls.iter().map(|c| c.agent.as_str()).collect::<Vec<_>>().join(","),
            "plan ready"
        );
        Ok(plan)
    }

    /// Clarifies, plans and dispatches one question.
    pub async fn route_question(
        &self,
        context: &AssistantContext,
        channel: Option<&dyn UserChannel>,
        question: &str,
    ) -> Result<AnswerReport> {
        info!(question, "received question");
        let question = self.clarify(context, channel, question).await;
        let plan = self.plan(context, &question).await?;
        Ok(self.dispatcher.execute_agent_calls(context, &plan, &question).await)
    }
}

#[cfg(test)]
mod tests;
