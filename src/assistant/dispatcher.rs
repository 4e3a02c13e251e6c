//! Executes a plan agent by agent and merges the results into one report

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, warn};

use crate::assistant::agents::analysis::AnalysisInputs;
use crate::assistant::agents::chart::Chart;
use crate::assistant::agents::{
    AnalysisAgent, ChartAgent, DebugAttempt, FollowUpAgent, KnowledgeAgent, SqlAgent, SqlDebugger,
    SummaryAgent,
};
use crate::assistant::context::AssistantContext;
use crate::assistant::router::{AgentCall, AgentKind, AgentPlan};
use crate::warehouse::QueryResult;

/// Rows of a query result written into the transcript.
const TRANSCRIPT_ROWS: usize = 50;

/// Extra instruction handed to the chart agent.
const CHART_PROMPT: &str = "no additional prompt";

/// The merged answer to one question
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnswerReport {
    pub question: String,
    /// Vega-Lite spec with the data injected
    #[serde(rename = "Chart")]
    pub chart: Option<Value>,
    /// Rows of the final query as records
    #[serde(rename = "Query_Result")]
    pub query_result: Option<Vec<Value>>,
    #[serde(rename = "SQL_Query")]
    pub sql_query: Option<String>,
    #[serde(rename = "Summary")]
    pub summary: Option<String>,
    pub visualization: Option<String>,
    /// What the query returned, e.g. "12 rows returned" or the warehouse error
    pub query_status: Option<String>,
    pub knowledge: Option<String>,
    pub analysis: Option<String>,
    #[serde(default)]
    pub follow_up_questions: Vec<String>,
    pub debug_description: Option<String>,
    #[serde(default)]
    pub debug_attempts: Vec<DebugAttempt>,
    #[serde(default)]
    pub transcript: Vec<String>,
}

/// Working state while a plan runs
#[derive(Default)]
struct PlanState {
    report: AnswerReport,
    /// Rows of the latest SQL call that returned any
    result: Option<QueryResult>,
    chart: Option<Chart>,
}

#[derive(Default)]
pub struct Dispatcher {
    sql_agent: SqlAgent,
    sql_debugger: SqlDebugger,
    knowledge_agent: KnowledgeAgent,
    chart_agent: ChartAgent,
    summary_agent: SummaryAgent,
    analysis_agent: AnalysisAgent,
    follow_up_agent: FollowUpAgent,
}

impl Dispatcher {
    /// Runs every call of `plan` in order.
    ///
    /// A failing agent is logged and skipped; later calls still run.
    pub async fn execute_agent_calls(
        &self,
        context: &AssistantContext,
        plan: &AgentPlan,
        question: &str,
    ) -> AnswerReport {
        let mut state = PlanState::default();
        state.report.question = question.to_string();
        state.report.transcript.push(format!("User: {}", question));
        println!("🙋 User Question: {}", question);

        for call in &plan.calls {
            let Some(kind) = call.kind() else {
                warn!(agent = %call.agent, "unknown agent, skipping");
                continue;
            };
            println!("🤖 {}...", kind);

            match kind {
                AgentKind::Knowledge => self.run_knowledge(context, call, &mut state).await,
                AgentKind::Sql => self.run_sql(context, call, question, &mut state).await,
                AgentKind::Chart => self.run_chart(context, &mut state).await,
                AgentKind::Analysis => self.run_analysis(context, question, &mut state).await,
                AgentKind::FollowUp => self.run_follow_up(context, question, &mut state).await,
                AgentKind::Summary => self.run_summary(context, &mut state).await,
            }
        }

        state.report
    }

    async fn run_knowledge(&self, context: &AssistantContext, call: &AgentCall, state: &mut PlanState) {
        let Some(prompt) = call.prompt() else {
            warn!("knowledge_agent call without a prompt, skipping");
            return;
        };
        match self
            .knowledge_agent
            .ask(context, prompt, context.config.knowledge.top_k)
            .await
        {
            Ok(answer) => {
                state.report.transcript.push(format!("Knowledge Agent: {}", answer));
                state.report.knowledge = Some(answer);
            }
            Err(e) => error!("knowledge_agent failed: {}", e),
        }
    }

    async fn run_sql(
        &self,
        context: &AssistantContext,
        call: &AgentCall,
        question: &str,
        state: &mut PlanState,
    ) {
        let Some(prompt) = call.prompt() else {
            warn!("sql_agent call without a prompt, skipping");
            return;
        };

        let sql = match self.sql_agent.generate_query(context, prompt).await {
            Ok(sql) => sql,
            Err(e) => {
                error!("sql_agent failed to generate a query: {}", e);
                return;
            }
        };
        let outcome = context.warehouse.execute(&sql).await;
        info!(outcome = %outcome.describe(), "pre-validation query outcome");

        let debugged = self
            .sql_debugger
            .validate_and_fix(context, &sql, question, outcome)
            .await;

        let report = &mut state.report;
        report.transcript.push(format!(
            "SQL Query Results: {}",
            debugged.outcome.render(TRANSCRIPT_ROWS)
        ));
        report.transcript.push(format!("SQL Query: {}", debugged.sql_query));
        report.sql_query = Some(debugged.sql_query);
        report.query_status = Some(debugged.outcome.describe());
        report.debug_description = Some(debugged.description);
        report.debug_attempts.extend(debugged.attempts);

        match debugged.outcome.rows() {
            Some(rows) => {
                report.query_result = Some(rows.to_records());
                state.result = Some(rows.clone());
            }
            None => {
                report.query_result = None;
                state.result = None;
            }
        }
    }

    async fn run_chart(&self, context: &AssistantContext, state: &mut PlanState) {
        let Some(result) = state.result.as_ref() else {
            error!("chart_agent ran but no SQL results have been produced");
            return;
        };
        match self.chart_agent.get_chart(context, result, CHART_PROMPT).await {
            Ok(chart) => {
                state.report.transcript.push(format!(
                    "Chart Agent: built a {} chart",
                    chart.visualization
                ));
                state.report.chart = Some(chart.spec.clone());
                state.report.visualization = Some(chart.visualization.clone());
                state.chart = Some(chart);
            }
            Err(e) => error!("chart_agent failed: {}", e),
        }
    }

    async fn run_analysis(&self, context: &AssistantContext, question: &str, state: &mut PlanState) {
        let inputs = AnalysisInputs {
            sql_query: state.report.sql_query.as_deref(),
            result: state.result.as_ref(),
            knowledge_answer: state.report.knowledge.as_deref(),
            chart: state.chart.as_ref(),
        };
        match self.analysis_agent.analyze(context, question, inputs).await {
            Ok(analysis) => {
                state.report.transcript.push(format!("Analysis Agent: {}", analysis));
                state.report.analysis = Some(analysis);
            }
            Err(e) => error!("analysis_agent failed: {}", e),
        }
    }

    async fn run_follow_up(&self, context: &AssistantContext, question: &str, state: &mut PlanState) {
        match self
            .follow_up_agent
            .suggest(context, question, &state.report.transcript)
            .await
        {
            Ok(questions) => {
                state
                    .report
                    .transcript
                    .push(format!("Follow-up Agent: {}", questions.join(" | ")));
                state.report.follow_up_questions = questions;
            }
            Err(e) => error!("follow_up_agent failed: {}", e),
        }
    }

    async fn run_summary(&self, context: &AssistantContext, state: &mut PlanState) {
        let summary = self
            .summary_agent
            .generate_summary(context, &state.report.transcript)
            .await;
        if let Some(text) = &summary {
            state.report.transcript.push(format!("Summary Agent: {}", text));
        }
        state.report.summary = summary;
    }
}

#[cfg(test)]
mod tests;
