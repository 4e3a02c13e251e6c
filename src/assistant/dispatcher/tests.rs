use super::*;
use crate::assistant::agents::analysis::TAG as ANALYSIS_TAG;
use crate::assistant::agents::chart::{CHOOSE_TAG, SPEC_TAG};
use crate::assistant::agents::follow_up::TAG as FOLLOW_UP_TAG;
use crate::assistant::agents::knowledge::TAG as KNOWLEDGE_TAG;
use crate::assistant::agents::sql::TAG as SQL_TAG;
use crate::assistant::agents::sql_debugger::{FIX_TAG, NOT_RUN_DESCRIPTION, VALUES_TAG};
use crate::assistant::agents::summary::TAG as SUMMARY_TAG;
use crate::testing::{ScriptedModel, ScriptedWarehouse, rows, test_context};
use serde_json::json;
use std::sync::Arc;

const GENRE_SQL: &str = "SELECT genre, SUM(views) AS views FROM shows GROUP BY genre";

fn genre_warehouse() -> ScriptedWarehouse {
    ScriptedWarehouse::new().with(
        GENRE_SQL,
        rows(
            &["genre", "views"],
            vec![
                vec![json!("Drama"), json!(120)],
                vec![json!("Comedy"), json!(80)],
                vec![json!("Reality"), json!(45)],
            ],
        ),
    )
}

fn plan(calls: &[(&str, Option<&str>)]) -> AgentPlan {
    AgentPlan {
        calls: calls
            .iter()
            .map(|(agent, prompt)| AgentCall::new(agent, *prompt))
            .collect(),
    }
}

#[tokio::test]
async fn test_full_plan_fills_the_report() {
    let model = Arc::new(
        ScriptedModel::new()
            .with(SQL_TAG, [GENRE_SQL])
            .with(CHOOSE_TAG, ["bar_chart"])
            .with(SPEC_TAG, [r#"{"mark": "bar", "data": {"values": []}}"#])
            .with(ANALYSIS_TAG, ["Drama leads, reality trails."])
            .with(FOLLOW_UP_TAG, [r#"{"questions": ["How did drama trend by month?"]}"#])
            .with(SUMMARY_TAG, ["Drama has the most views."]),
    );
    let context = test_context(model.clone(), Arc::new(genre_warehouse()));
    let plan = plan(&[
        ("sql_agent", Some("total views per genre")),
        ("chart_agent", None),
        ("analysis_agent", None),
        ("follow_up_agent", None),
        ("summary_agent", Some("Provide a final summary of the conversation.")),
    ]);

    let report = Dispatcher::default()
        .execute_agent_calls(&context, &plan, "Which genre has the most views?")
        .await;

    assert_eq!(report.sql_query.as_deref(), Some(GENRE_SQL));
    assert_eq!(report.query_result.as_ref().unwrap().len(), 3);
    assert_eq!(report.query_status.as_deref(), Some("3 rows returned"));
    assert_eq!(report.debug_description.as_deref(), Some(NOT_RUN_DESCRIPTION));
    assert_eq!(report.visualization.as_deref(), Some("bar_chart"));
    assert_eq!(report.chart.as_ref().unwrap()["data"]["values"][0]["genre"], json!("Drama"));
    assert_eq!(report.analysis.as_deref(), Some("Drama leads, reality trails."));
    assert_eq!(report.follow_up_questions, vec!["How did drama trend by month?"]);
    assert_eq!(report.summary.as_deref(), Some("Drama has the most views."));
    assert_eq!(report.transcript[0], "User: Which genre has the most views?");

    // the sql agent gets the planner's prompt, the analysis sees the rows
    assert!(model.requests_for(SQL_TAG)[0].user_prompt.contains("total views per genre"));
    assert!(model.requests_for(ANALYSIS_TAG)[0].user_prompt.contains("Reality | 45"));
    let summary_prompt = &model.requests_for(SUMMARY_TAG)[0].user_prompt;
    assert!(summary_prompt.contains("SQL Query: SELECT genre"));
    assert!(summary_prompt.contains("Analysis Agent: Drama leads"));
}

#[test]
fn test_report_uses_original_keys() {
    let report = AnswerReport {
        sql_query: Some("SELECT 1".to_string()),
        ..Default::default()
    };

    let value = serde_json::to_value(&report).unwrap();

    assert_eq!(value["SQL_Query"], json!("SELECT 1"));
    assert!(value.get("Chart").is_some());
    assert!(value.get("Query_Result").is_some());
    assert!(value.get("Summary").is_some());
}

#[tokio::test]
async fn test_debug_loop_gets_the_original_question() {
    let broken = "SELECT genre, SUM(views) AS views FROM shows WHERE genre = 'Dramma' GROUP BY genre";
    let warehouse = genre_warehouse().with(broken, rows(&["genre", "views"], vec![]));
    let model = Arc::new(
        ScriptedModel::new()
            .with(SQL_TAG, [broken])
            .with(VALUES_TAG, ["SELECT DISTINCT genre FROM shows ORDER BY genre"])
            .with(
                FIX_TAG,
                [format!(r#"{{"sql_query": "{}", "description": "fixed genre"}}"#, GENRE_SQL)],
            ),
    );
    let context = test_context(model.clone(), Arc::new(warehouse));

    let report = Dispatcher::default()
        .execute_agent_calls(
            &context,
            &plan(&[("sql_agent", Some("views of dramma"))]),
            "How many views did Dramma get?",
        )
        .await;

    assert_eq!(report.sql_query.as_deref(), Some(GENRE_SQL));
    assert_eq!(report.debug_description.as_deref(), Some("fixed genre"));
    assert_eq!(report.debug_attempts.len(), 1);
    assert!(report.query_result.is_some());
    assert!(model.requests_for(FIX_TAG)[0]
        .user_prompt
        .contains("How many views did Dramma get?"));
}

#[tokio::test]
async fn test_chart_without_rows_is_skipped() {
    let model = Arc::new(ScriptedModel::new().with(SUMMARY_TAG, ["Nothing to chart."]));
    let context = test_context(model.clone(), Arc::new(ScriptedWarehouse::new()));

    let report = Dispatcher::default()
        .execute_agent_calls(
            &context,
            &plan(&[("chart_agent", None), ("summary_agent", None)]),
            "chart it",
        )
        .await;

    assert!(report.chart.is_none());
    assert_eq!(report.summary.as_deref(), Some("Nothing to chart."));
    assert_eq!(model.calls_for(CHOOSE_TAG), 0);
}

#[tokio::test]
async fn test_calls_without_prompt_and_unknown_agents_are_skipped() {
    let model = Arc::new(ScriptedModel::new().with(SUMMARY_TAG, ["done"]));
    let context = test_context(model.clone(), Arc::new(ScriptedWarehouse::new()));

    let report = Dispatcher::default()
        .execute_agent_calls(
            &context,
            &plan(&[
                ("sql_agent", None),
                ("knowledge_agent", Some("  ")),
                ("weather_agent", Some("rain")),
                ("summary_agent", None),
            ]),
            "q",
        )
        .await;

    assert_eq!(model.tags(), vec![SUMMARY_TAG]);
    assert!(report.sql_query.is_none());
    assert!(report.knowledge.is_none());
    assert_eq!(report.summary.as_deref(), Some("done"));
}

#[tokio::test]
async fn test_failing_agent_does_not_abort_the_plan() {
    let model = Arc::new(
        ScriptedModel::new()
            .failing(KNOWLEDGE_TAG, "model overloaded")
            .with(SUMMARY_TAG, ["Summary despite the failure."]),
    );
    let context = test_context(model, Arc::new(ScriptedWarehouse::new()));

    let report = Dispatcher::default()
        .execute_agent_calls(
            &context,
            &plan(&[("knowledge_agent", Some("churn")), ("summary_agent", None)]),
            "What is churn?",
        )
        .await;

    assert!(report.knowledge.is_none());
    assert_eq!(report.summary.as_deref(), Some("Summary despite the failure."));
    assert_eq!(report.transcript, vec!["User: What is churn?", "Summary Agent: Summary despite the failure."]);
}

#[tokio::test]
async fn test_unrepaired_query_leaves_no_rows_for_the_chart() {
    let model = Arc::new(
        ScriptedModel::new()
            .with(SQL_TAG, ["SELECT * FROM missing"])
            .with(VALUES_TAG, ["SELECT DISTINCT x FROM missing"])
            .with(FIX_TAG, [r#"{"sql_query": "", "description": "cannot fix"}"#]),
    );
    let context = test_context(model.clone(), Arc::new(ScriptedWarehouse::new()));

    let report = Dispatcher::default()
        .execute_agent_calls(
            &context,
            &plan(&[("sql_agent", Some("everything")), ("chart_agent", None)]),
            "show everything",
        )
        .await;

    assert_eq!(report.sql_query.as_deref(), Some("SELECT * FROM missing"));
    assert!(report.query_result.is_none());
    assert!(report.query_status.unwrap().starts_with("General Error"));
    assert!(report.chart.is_none());
    assert_eq!(model.calls_for(CHOOSE_TAG), 0);
}
