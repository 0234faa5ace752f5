//! Tests for interlude-tools: registry contract, closure tools, human assistance

use interlude_core::{Arguments, Error, ToolCall};
use interlude_tools::*;
use serde_json::{json, Value};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn args(v: Value) -> Arguments {
    match v {
        Value::Object(map) => map,
        _ => Arguments::new(),
    }
}

fn echo_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry
        .register_fn("echo", json!({"type": "object"}), |a| async move {
            ToolResult::text(a.get("msg").and_then(Value::as_str).unwrap_or("").to_string())
        })
        .unwrap();
    registry
}

// ===========================================================================
// Registry
// ===========================================================================

#[test]
fn default_registry_has_search_and_human() {
    let registry = create_default_registry(AssistanceMode::Review).unwrap();
    assert_eq!(registry.list(), vec!["human_assistance", "web_search"]);
    assert!(registry.suspends(HUMAN_ASSISTANCE));
    assert!(!registry.suspends("web_search"));
    assert!(!registry.suspends("missing"));
}

#[test]
fn duplicate_registration_is_rejected() {
    let mut registry = echo_registry();
    let err = registry
        .register_fn("echo", json!({}), |_| async { ToolResult::text("again") })
        .unwrap_err();
    assert!(matches!(err, Error::DuplicateTool(ref n) if n == "echo"));
    assert_eq!(registry.len(), 1);
}

#[test]
fn remove_frees_the_name() {
    let mut registry = echo_registry();
    assert!(registry.remove("echo"));
    assert!(!registry.remove("echo"));
    assert!(registry.is_empty());
    assert!(registry
        .register_fn("echo", json!({}), |_| async { ToolResult::text("") })
        .is_ok());
}

#[test]
fn definitions_follow_registration() {
    let registry = create_default_registry(AssistanceMode::Query).unwrap();
    let defs = registry.get_definitions();
    assert_eq!(defs.len(), 2);
    let human = defs.iter().find(|d| d.name == HUMAN_ASSISTANCE).unwrap();
    assert_eq!(human.input_schema["required"], json!(["query"]));
}

#[tokio::test]
async fn invoke_returns_output() {
    let registry = echo_registry();
    let out = registry
        .invoke("echo", args(json!({"msg": "hi"})), CancellationToken::new())
        .await
        .unwrap();
    assert!(matches!(out, ToolOutcome::Output(ref s) if s == "hi"));
}

#[tokio::test]
async fn invoke_unknown_tool() {
    let registry = echo_registry();
    let err = registry
        .invoke("nope", Arguments::new(), CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UnknownTool(_)));
    assert!(err.is_recoverable());
}

#[tokio::test]
async fn executor_error_becomes_tool_execution() {
    let mut registry = ToolRegistry::new();
    registry
        .register_fn("broken", json!({}), |_| async { ToolResult::error("bad input") })
        .unwrap();
    let err = registry
        .invoke("broken", Arguments::new(), CancellationToken::new())
        .await
        .unwrap_err();
    match err {
        Error::ToolExecution { name, message } => {
            assert_eq!(name, "broken");
            assert_eq!(message, "bad input");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn json_result_is_pretty_printed() {
    let mut registry = ToolRegistry::new();
    registry
        .register_fn("data", json!({}), |_| async { ToolResult::Json(json!({"a": 1})) })
        .unwrap();
    let out = registry
        .invoke("data", Arguments::new(), CancellationToken::new())
        .await
        .unwrap();
    match out {
        ToolOutcome::Output(s) => assert_eq!(s, "{\n  \"a\": 1\n}"),
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[tokio::test]
async fn cancelled_invoke_reports_cancelled() {
    let mut registry = ToolRegistry::new();
    registry
        .register_fn("slow", json!({}), |_| async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            ToolResult::text("late")
        })
        .unwrap();
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        trigger.cancel();
    });
    let err = registry
        .invoke("slow", Arguments::new(), cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Cancelled));
    assert!(!err.is_recoverable());
}

// ===========================================================================
// Human assistance
// ===========================================================================

#[tokio::test]
async fn review_mode_suspends_with_question() {
    let registry = create_default_registry(AssistanceMode::Review).unwrap();
    let out = registry
        .invoke(
            HUMAN_ASSISTANCE,
            args(json!({"name": "Grace Hopper", "birthday": "1906-12-09"})),
            CancellationToken::new(),
        )
        .await
        .unwrap();
    match out {
        ToolOutcome::Suspend(signal) => assert_eq!(
            signal.payload,
            json!({"question": "Is this correct?", "name": "Grace Hopper", "birthday": "1906-12-09"})
        ),
        other => panic!("expected suspension, got {other:?}"),
    }
}

#[tokio::test]
async fn query_mode_requires_query() {
    let registry = create_default_registry(AssistanceMode::Query).unwrap();
    let err = registry
        .invoke(HUMAN_ASSISTANCE, Arguments::new(), CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ToolExecution { .. }));

    let out = registry
        .invoke(
            HUMAN_ASSISTANCE,
            args(json!({"query": "Proceed?"})),
            CancellationToken::new(),
        )
        .await
        .unwrap();
    assert!(matches!(out, ToolOutcome::Suspend(ref s) if s.payload == json!({"query": "Proceed?"})));
}

fn review_call() -> ToolCall {
    ToolCall::from_value(
        "call_1",
        HUMAN_ASSISTANCE,
        json!({"name": "Grace Hopper", "birthday": "1906-12-09"}),
    )
}

#[test]
fn review_confirmation_keeps_original_values() {
    let registry = create_default_registry(AssistanceMode::Review).unwrap();
    for answer in ["y", "Yes", "YEP"] {
        let res = registry.resolve(&review_call(), &json!({"correct": answer})).unwrap();
        assert_eq!(res.content, "Correct");
        assert_eq!(res.updates["name"], json!("Grace Hopper"));
        assert_eq!(res.updates["birthday"], json!("1906-12-09"));
    }
}

#[test]
fn review_correction_overrides_given_fields() {
    let registry = create_default_registry(AssistanceMode::Review).unwrap();
    let resume = json!({"correct": "n", "name": "Grace B. Hopper"});
    let res = registry.resolve(&review_call(), &resume).unwrap();
    assert_eq!(res.content, format!("Made a correction: {}", resume));
    assert_eq!(res.updates["name"], json!("Grace B. Hopper"));
    assert_eq!(res.updates["birthday"], json!("1906-12-09"));

    // no `correct` key at all also counts as a correction
    let res = registry.resolve(&review_call(), &json!({})).unwrap();
    assert!(res.content.starts_with("Made a correction"));
}

#[test]
fn query_resolution_prefers_data_field() {
    let registry = create_default_registry(AssistanceMode::Query).unwrap();
    let call = ToolCall::from_value("c", HUMAN_ASSISTANCE, json!({"query": "Colour?"}));
    assert_eq!(registry.resolve(&call, &json!({"data": "green"})).unwrap().content, "green");
    assert_eq!(registry.resolve(&call, &json!("teal")).unwrap().content, "teal");
    assert_eq!(
        registry.resolve(&call, &json!({"other": 1})).unwrap().content,
        "{\"other\":1}"
    );
    assert!(registry.resolve(&call, &json!({"data": "x"})).unwrap().updates.is_empty());
}

#[test]
fn non_suspending_tool_rejects_resolution() {
    let registry = echo_registry();
    let call = ToolCall::from_value("c", "echo", json!({}));
    let err = registry.resolve(&call, &json!({"data": "x"})).unwrap_err();
    assert!(matches!(err, Error::ToolExecution { .. }));

    let missing = ToolCall::from_value("c", "gone", json!({}));
    assert!(matches!(
        registry.resolve(&missing, &json!({})).unwrap_err(),
        Error::UnknownTool(_)
    ));
}

#[test]
fn assistance_mode_parses() {
    assert_eq!(AssistanceMode::parse("query"), Some(AssistanceMode::Query));
    assert_eq!(AssistanceMode::parse("review"), Some(AssistanceMode::Review));
    assert_eq!(AssistanceMode::parse("other"), None);
    assert_eq!(AssistanceMode::default(), AssistanceMode::Review);
}
