use super::*;
use crate::assistant::agents::clarification::{CLARIFY_TAG, DETECT_TAG};
use crate::assistant::agents::knowledge::TAG as KNOWLEDGE_TAG;
use crate::assistant::agents::summary::TAG as SUMMARY_TAG;
use crate::testing::{ScriptedChannel, ScriptedModel, ScriptedWarehouse, test_context};
use std::sync::Arc;

const CHURN_PLAN: &str = r#"{"agent_calls": [
    {"Agent": "knowledge_agent", "args": {"prompt": "churn"}},
    {"agent": "summary_agent", "args": {"prompt": "Provide a final summary of the conversation."}}
]}"#;

#[test]
fn test_agent_kind_names() {
    assert_eq!("sql_agent".parse::<AgentKind>().unwrap(), AgentKind::Sql);
    assert_eq!(" Follow_Up_Agent ".parse::<AgentKind>().unwrap(), AgentKind::FollowUp);
    assert!("weather_agent".parse::<AgentKind>().is_err());
    for kind in AgentKind::ALL {
        assert_eq!(kind.to_string().parse::<AgentKind>().unwrap(), kind);
    }
}

#[test]
fn test_plan_accepts_both_key_spellings() {
    let plan: AgentPlan = serde_json::from_str(CHURN_PLAN).unwrap();

    assert_eq!(plan.calls.len(), 2);
    assert_eq!(plan.calls[0].kind(), Some(AgentKind::Knowledge));
    assert_eq!(plan.calls[0].prompt(), Some("churn"));
    assert_eq!(plan.calls[1].kind(), Some(AgentKind::Summary));
}

#[test]
fn test_call_without_args_has_no_prompt() {
    let call: AgentCall = serde_json::from_str(r#"{"agent": "chart_agent"}"#).unwrap();
    assert_eq!(call.prompt(), None);

    let call = AgentCall::new("sql_agent", Some("   "));
    assert_eq!(call.prompt(), None);
}

#[tokio::test]
async fn test_plan_keeps_unknown_agents() {
    let model = Arc::new(ScriptedModel::new().with(
        TAG,
        [r#"{"agent_calls": [{"agent": "weather_agent", "args": {"prompt": "rain"}}, {"agent": "summary_agent"}]}"#],
    ));
    let context = test_context(model, Arc::new(ScriptedWarehouse::new()));

    let plan = Router::new().plan(&context, "will it rain?").await.unwrap();

    assert_eq!(plan.calls.len(), 2);
    assert_eq!(plan.calls[0].kind(), None);
}

#[tokio::test]
async fn test_missing_plan_is_no_plan_error() {
    let model = Arc::new(ScriptedModel::new().with(TAG, ["I would ask the SQL agent."]));
    let context = test_context(model, Arc::new(ScriptedWarehouse::new()));

    let err = Router::new().plan(&context, "q").await.unwrap_err();

    assert!(matches!(
        err.downcast_ref::<AssistantError>(),
        Some(AssistantError::NoPlan(_))
    ));
}

#[tokio::test]
async fn test_empty_plan_is_no_plan_error() {
    let model = Arc::new(ScriptedModel::new().with(TAG, [r#"{"agent_calls": []}"#]));
    let context = test_context(model, Arc::new(ScriptedWarehouse::new()));

    let err = Router::new().plan(&context, "q").await.unwrap_err();

    assert!(matches!(
        err.downcast_ref::<AssistantError>(),
        Some(AssistantError::NoPlan(_))
    ));
}

#[tokio::test]
async fn test_route_question_clarifies_before_planning() {
    let model = Arc::new(
        ScriptedModel::new()
            .with(DETECT_TAG, ["True", "False"])
            .with(CLARIFY_TAG, ["Which definition of churn?"])
            .with(TAG, [CHURN_PLAN])
            .with(KNOWLEDGE_TAG, ["Churn is the cancellation rate."])
            .with(SUMMARY_TAG, ["Churn measures cancellations."]),
    );
    let context = test_context(model.clone(), Arc::new(ScriptedWarehouse::new()));
    let channel = ScriptedChannel::new(["monthly subscriber churn"]);

    let report = Router::new()
        .route_question(&context, Some(&channel), "What is churn?")
        .await
        .unwrap();

    let clarified = "What is churn?\nUser clarified: monthly subscriber churn";
    assert_eq!(report.question, clarified);
    assert_eq!(report.knowledge.as_deref(), Some("Churn is the cancellation rate."));
    assert_eq!(report.summary.as_deref(), Some("Churn measures cancellations."));
    assert!(model.requests_for(TAG)[0].user_prompt.contains("User clarified: monthly subscriber churn"));
    assert_eq!(
        model.tags(),
        vec![DETECT_TAG, CLARIFY_TAG, DETECT_TAG, TAG, KNOWLEDGE_TAG, SUMMARY_TAG]
    );
}

#[tokio::test]
async fn test_clarification_skipped_without_channel_or_when_disabled() {
    let model = Arc::new(ScriptedModel::new().with(DETECT_TAG, ["True"]));
    let mut context = test_context(model.clone(), Arc::new(ScriptedWarehouse::new()));
    let router = Router::new();

    assert_eq!(router.clarify(&context, None, "top shows").await, "top shows");

    context.config.assistant.clarification_enabled = false;
    let channel = ScriptedChannel::new(["views"]);
    assert_eq!(router.clarify(&context, Some(&channel), "top shows").await, "top shows");
    assert!(model.tags().is_empty());
    assert!(channel.asked().is_empty());
}
