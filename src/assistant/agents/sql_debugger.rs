//! Self-correcting SQL loop.
//!
//! A query that fails or returns nothing is repaired in rounds. Each round queries the
//! distinct values of the column in the strict equality clause, asks the model for a
//! fixed query given those values, and runs the fix. The loop never runs the same
//! query twice and gives up after `max_debug_attempts` rounds.

use anyhow::Result;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::assistant::agent_executor::{AgentExecuteParams, extract, prompt};
use crate::assistant::agents::sql::clean_sql;
use crate::assistant::context::AssistantContext;
use crate::warehouse::QueryOutcome;

pub const VALUES_TAG: &str = "sql_debugger.values";
pub const FIX_TAG: &str = "sql_debugger.fix";

pub const NOT_RUN_DESCRIPTION: &str = "Debug agent was not run";

/// Rows of the distinct values result shown to the model.
const VALUES_ROWS_IN_PROMPT: usize = 200;

/// A repaired query as returned by the model
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct SqlFix {
    /// The corrected SQL query, empty when no fix is possible
    #[serde(default)]
    pub sql_query: String,
    /// How the query was fixed
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebugAttempt {
    pub values_query: String,
    pub failing_query: String,
    pub fixed_query: String,
    pub description: String,
    /// `describe()` of the fixed query's outcome
    pub outcome: String,
}

#[derive(Debug, Clone)]
pub struct DebugOutcome {
    pub sql_query: String,
    pub outcome: QueryOutcome,
    pub description: String,
    pub attempts: Vec<DebugAttempt>,
}

fn normalize(sql: &str) -> String {
    sql.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_end_matches(';')
        .trim()
        .to_lowercase()
}

fn failure_reason(outcome: &QueryOutcome) -> String {
    match outcome {
        QueryOutcome::Failed(message) => format!("The warehouse rejected the query: {}", message),
        _ => String::from("The query ran but returned no records."),
    }
}

#[derive(Default)]
pub struct SqlDebugger;

impl SqlDebugger {
    /// Repairs `sql` while its outcome is empty or failed.
    pub async fn validate_and_fix(
        &self,
        context: &AssistantContext,
        sql: &str,
        question: &str,
        outcome: QueryOutcome,
    ) -> DebugOutcome {
        let max_attempts = context.config.assistant.max_debug_attempts;
        let mut current_sql = sql.to_string();
        let mut current_outcome = outcome;
        let mut description = NOT_RUN_DESCRIPTION.to_string();
        let mut attempts: Vec<DebugAttempt> = Vec::new();
        let mut tried = vec![current_sql.clone()];

        while current_outcome.needs_repair() && attempts.len() < max_attempts {
            info!(
                round = attempts.len() + 1,
                reason = %current_outcome.describe(),
                "repairing query"
            );

            let values_query = match self.values_query(context, &current_sql, question).await {
                Ok(query) => query,
                Err(e) => {
                    error!("distinct values query generation failed: {}", e);
                    break;
                }
            };
            let values_outcome = context.warehouse.execute(&values_query).await;
            let column_values = values_outcome.render(VALUES_ROWS_IN_PROMPT);

            let fix = match self
                .fix_query(
                    context,
                    &current_sql,
                    question,
                    &column_values,
                    &failure_reason(&current_outcome),
                    &tried,
                )
                .await
            {
                Ok(fix) => fix,
                Err(e) => {
                    error!("query fix generation failed: {}", e);
                    break;
                }
            };

            let fixed_query = clean_sql(&fix.sql_query);
            if fixed_query.is_empty() {
                warn!("the model returned no fixed query, keeping the last one");
                break;
            }
            if tried.iter().any(|t| normalize(t) == normalize(&fixed_query)) {
                warn!(sql = %fixed_query, "the model repeated a query that was already tried");
                break;
            }

            current_outcome = context.warehouse.execute(&fixed_query).await;
            info!(sql = %fixed_query, outcome = %current_outcome.describe(), "ran repaired query");

            attempts.push(DebugAttempt {
                values_query,
                failing_query: current_sql.clone(),
                fixed_query: fixed_query.clone(),
                description: fix.description.clone(),
                outcome: current_outcome.describe(),
            });
            tried.push(fixed_query.clone());
            current_sql = fixed_query;
            description = fix.description;
        }

        DebugOutcome {
            sql_query: current_sql,
            outcome: current_outcome,
            description,
            attempts,
        }
    }

    async fn values_query(
        &self,
        context: &AssistantContext,
        sql: &str,
        question: &str,
    ) -> Result<String> {
        let system_prompt = format!(
            "{}\n\nThe original user question: {}\n\nTable structure:\n{}",
            include_str!("prompts/sql_values_sys.tpl"),
            question,
            context.resources.sql_schema
        );
        let user_prompt = format!("Determine a query to debug this query: {}", sql);
        let raw = prompt(
            context,
            AgentExecuteParams::new(VALUES_TAG, system_prompt, user_prompt),
        )
        .await?;
        Ok(clean_sql(&raw))
    }

    async fn fix_query(
        &self,
        context: &AssistantContext,
        sql: &str,
        question: &str,
        column_values: &str,
        reason: &str,
        tried: &[String],
    ) -> Result<SqlFix> {
        let mut user_prompt = format!(
            "This SQL query is not working: {}\n\
             The user originally asked: {}\n\
             Reason: {}\n\n\
             We think the problem is a strict equality clause. All values of the compared column are listed here:\n{}\n\n\
             Check these values for one that matches what the user may have been trying to spell.\n",
            sql, question, reason, column_values
        );
        if !context.resources.error_fewshot.trim().is_empty() {
            user_prompt.push_str(&format!(
                "\nKnown errors and their fixes:\n{}\n",
                context.resources.error_fewshot
            ));
        }
        user_prompt.push_str("\nQueries already tried:\n");
        for query in tried {
            user_prompt.push_str(&format!("- {}\n", query));
        }

        extract(
            context,
            AgentExecuteParams::new(FIX_TAG, include_str!("prompts/sql_fix_sys.tpl"), user_prompt),
        )
        .await
    }
}
