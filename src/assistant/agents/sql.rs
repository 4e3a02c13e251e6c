use anyhow::{Result, anyhow};
use regex::Regex;
use std::sync::LazyLock;
use tracing::info;

use crate::assistant::agent_executor::{AgentExecuteParams, prompt_checked};
use crate::assistant::context::AssistantContext;
use crate::llm::structured::strip_code_fences;

pub const TAG: &str = "sql_agent";

static LANGUAGE_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^sql[ \t]*\r?\n").unwrap());
static TRAILING_SEMICOLONS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[;\s]+$").unwrap());

/// Turns a model answer into bare SQL: no fences, no leading `sql` tag, no trailing semicolon.
pub fn clean_sql(raw: &str) -> String {
    let unfenced = strip_code_fences(raw);
    let sql = LANGUAGE_TAG.replace(unfenced.trim(), "");
    TRAILING_SEMICOLONS.replace(sql.trim(), "").to_string()
}

/// Writes a query for a business question.
#[derive(Default)]
pub struct SqlAgent;

impl SqlAgent {
    fn build_user_prompt(&self, context: &AssistantContext, question: &str) -> String {
        let sample_queries = serde_json::to_string_pretty(&context.resources.sample_queries)
            .unwrap_or_default();
        format!(
            "Here is the table structure and some sample queries for reference.\n\n\
             Table Structure:\n{}\n\n\
             Sample Queries:\n{}\n\n\
             Business question: {}\n\n\
             Generate the SQL query that answers the business question.",
            context.resources.sql_schema, sample_queries, question
        )
    }

    /// Generates a query for `question`; an empty generation is an error.
    pub async fn generate_query(&self, context: &AssistantContext, question: &str) -> Result<String> {
        let params = AgentExecuteParams::new(
            TAG,
            include_str!("prompts/sql_sys.tpl"),
            self.build_user_prompt(context, question),
        );
        let sql = prompt_checked(context, params, |raw| {
            let sql = clean_sql(raw);
            if sql.is_empty() {
                return Err(anyhow!("SQL generation returned an empty result"));
            }
            Ok(sql)
        })
        .await??;
        info!(sql = %sql, "generated query");
        Ok(sql)
    }
}
