use anyhow::Result;

use crate::assistant::agent_executor::{AgentExecuteParams, prompt};
use crate::assistant::agents::chart::Chart;
use crate::assistant::context::AssistantContext;
use crate::warehouse::QueryResult;

pub const TAG: &str = "analysis_agent";

const SYSTEM_PROMPT: &str = "You are a data analyst who writes concise business insights from query results. \
You validate knowledge-based answers and fold in what a chart shows where it applies. Use whatever SQL, \
chart or knowledge material is provided.";

/// Rows of the query result quoted in the prompt.
const RESULT_ROWS_IN_PROMPT: usize = 100;

/// Everything the analysis can draw on; absent parts are left out of the prompt.
#[derive(Debug, Default, Clone, Copy)]
pub struct AnalysisInputs<'a> {
    pub sql_query: Option<&'a str>,
    pub result: Option<&'a QueryResult>,
    pub knowledge_answer: Option<&'a str>,
    pub chart: Option<&'a Chart>,
}

#[derive(Default)]
pub struct AnalysisAgent;

impl AnalysisAgent {
    pub fn build_user_prompt(&self, question: &str, inputs: AnalysisInputs<'_>) -> String {
        let mut sections = vec![format!("Business Question:\n{}", question)];

        if let (Some(sql), Some(result)) = (inputs.sql_query, inputs.result) {
            sections.push(format!(
                "SQL Query Used:\n{}\n\nQuery Result:\n{}",
                sql,
                result.render(RESULT_ROWS_IN_PROMPT)
            ));
        }
        if let Some(answer) = inputs.knowledge_answer {
            sections.push(format!("Knowledge Answer:\n{}", answer));
        }
        if let Some(chart) = inputs.chart {
            sections.push(format!(
                "Selected Visualization Type:\n{}\n\nFinal Visualization JSON:\n{}",
                chart.visualization,
                serde_json::to_string_pretty(&chart.spec).unwrap_or_default()
            ));
        }

        sections.push(
            "Provide a concise summary of the top findings in 4-5 sentences. Validate and clarify any \
             knowledge answer, and use the visualization where relevant. Avoid unnecessary detail."
                .to_string(),
        );
        sections.join("\n\n")
    }

    pub async fn analyze(
        &self,
        context: &AssistantContext,
        question: &str,
        inputs: AnalysisInputs<'_>,
    ) -> Result<String> {
        let user_prompt = self.build_user_prompt(question, inputs);
        prompt(context, AgentExecuteParams::new(TAG, SYSTEM_PROMPT, user_prompt)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_prompt_only_holds_available_sections() {
        let prompt = AnalysisAgent.build_user_prompt(
            "What is churn?",
            AnalysisInputs {
                knowledge_answer: Some("Churn is the cancellation rate."),
                ..Default::default()
            },
        );

        assert!(prompt.contains("Business Question:\nWhat is churn?"));
        assert!(prompt.contains("Knowledge Answer:\nChurn is the cancellation rate."));
        assert!(!prompt.contains("SQL Query Used"));
        assert!(!prompt.contains("Selected Visualization Type"));
    }

    #[test]
    fn test_prompt_with_query_and_chart() {
        let result = QueryResult::new(vec!["genre".to_string()], vec![vec![json!("Drama")]]);
        let chart = Chart {
            visualization: "bar_chart".to_string(),
            spec: json!({"mark": "bar"}),
        };

        let prompt = AnalysisAgent.build_user_prompt(
            "Top genre?",
            AnalysisInputs {
                sql_query: Some("SELECT genre FROM shows"),
                result: Some(&result),
                knowledge_answer: None,
                chart: Some(&chart),
            },
        );

        assert!(prompt.contains("SELECT genre FROM shows"));
        assert!(prompt.contains("Drama"));
        assert!(prompt.contains("bar_chart"));
        assert!(prompt.contains("\"mark\": \"bar\""));
    }
}
