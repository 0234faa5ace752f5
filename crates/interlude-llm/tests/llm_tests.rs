//! Tests for interlude-llm: Anthropic message encoding, SSE decoding, scripted provider

use futures::StreamExt;
use interlude_core::{Turn, ToolCall};
use interlude_llm::anthropic::{encode_messages, parse_sse_stream, AnthropicContent, ContentBlock};
use interlude_llm::*;
use serde_json::json;
use std::time::Duration;

fn sse(events: &[(&str, serde_json::Value)]) -> Vec<Result<bytes::Bytes, std::io::Error>> {
    events
        .iter()
        .map(|(name, data)| Ok(bytes::Bytes::from(format!("event: {}\ndata: {}\n\n", name, data))))
        .collect()
}

async fn collect(stream: LlmStream) -> Vec<LlmResult<StreamDelta>> {
    stream.collect().await
}

// ===========================================================================
// Message encoding
// ===========================================================================

#[test]
fn encodes_plain_turns_as_text() {
    let msgs = encode_messages(&[Turn::user("hi"), Turn::agent("hello")]);
    assert_eq!(msgs.len(), 2);
    assert_eq!(msgs[0].role, "user");
    assert_eq!(msgs[1].role, "assistant");
    assert!(matches!(&msgs[1].content, AnthropicContent::Text(t) if t == "hello"));
}

#[test]
fn encodes_tool_use_and_result_blocks() {
    let call = ToolCall::from_value("toolu_1", "lookup", json!({"q": "rust"}));
    let msgs = encode_messages(&[
        Turn::user("find rust"),
        Turn::agent_with_calls("Looking.", vec![call]),
        Turn::tool_result("toolu_1", "found it"),
    ]);
    assert_eq!(msgs.len(), 3);

    let v = serde_json::to_value(&msgs[1]).unwrap();
    assert_eq!(v["content"][0], json!({"type": "text", "text": "Looking."}));
    assert_eq!(
        v["content"][1],
        json!({"type": "tool_use", "id": "toolu_1", "name": "lookup", "input": {"q": "rust"}})
    );

    let v = serde_json::to_value(&msgs[2]).unwrap();
    assert_eq!(v["role"], json!("user"));
    assert_eq!(
        v["content"][0],
        json!({"type": "tool_result", "tool_use_id": "toolu_1", "content": "found it"})
    );
}

#[test]
fn empty_agent_text_is_omitted_from_tool_use_turn() {
    let call = ToolCall::from_value("c", "lookup", json!({}));
    let msgs = encode_messages(&[Turn::agent_with_calls("", vec![call])]);
    match &msgs[0].content {
        AnthropicContent::Blocks(blocks) => {
            assert_eq!(blocks.len(), 1);
            assert!(matches!(blocks[0], ContentBlock::ToolUse { .. }));
        }
        other => panic!("expected blocks, got {other:?}"),
    }
}

// ===========================================================================
// SSE decoding
// ===========================================================================

#[tokio::test]
async fn parses_text_and_tool_use_stream() {
    let chunks = sse(&[
        ("message_start", json!({"type": "message_start"})),
        (
            "content_block_delta",
            json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": "Hi"}}),
        ),
        (
            "content_block_start",
            json!({"type": "content_block_start", "index": 1, "content_block": {"type": "tool_use", "id": "toolu_9", "name": "lookup"}}),
        ),
        (
            "content_block_delta",
            json!({"type": "content_block_delta", "index": 1, "delta": {"type": "input_json_delta", "partial_json": "{\"q\":"}}),
        ),
        (
            "content_block_delta",
            json!({"type": "content_block_delta", "index": 1, "delta": {"type": "input_json_delta", "partial_json": "\"x\"}"}}),
        ),
        ("content_block_stop", json!({"type": "content_block_stop", "index": 1})),
        (
            "message_delta",
            json!({"type": "message_delta", "delta": {"stop_reason": "tool_use"}, "usage": {"output_tokens": 12}}),
        ),
        ("message_stop", json!({"type": "message_stop"})),
    ]);
    let stream: LlmStream = Box::pin(parse_sse_stream(futures::stream::iter(chunks)));
    let deltas: Vec<StreamDelta> = collect(stream).await.into_iter().map(|d| d.unwrap()).collect();

    assert_eq!(
        deltas,
        vec![
            StreamDelta::Text("Hi".into()),
            StreamDelta::ToolCallStart {
                id: "toolu_9".into(),
                name: "lookup".into()
            },
            StreamDelta::ToolCallDelta {
                id: "toolu_9".into(),
                arguments: "{\"q\":".into()
            },
            StreamDelta::ToolCallDelta {
                id: "toolu_9".into(),
                arguments: "\"x\"}".into()
            },
            StreamDelta::ToolCallEnd { id: "toolu_9".into() },
            StreamDelta::Done {
                stop_reason: Some("tool_use".into()),
                usage: Some(Usage {
                    input_tokens: 0,
                    output_tokens: 12
                }),
            },
        ]
    );
}

#[tokio::test]
async fn error_event_becomes_stream_error() {
    let chunks = sse(&[(
        "error",
        json!({"type": "error", "error": {"type": "overloaded_error", "message": "Overloaded"}}),
    )]);
    let stream: LlmStream = Box::pin(parse_sse_stream(futures::stream::iter(chunks)));
    let items = collect(stream).await;
    assert_eq!(items.len(), 1);
    assert!(matches!(&items[0], Err(LlmError::StreamError(m)) if m == "Overloaded"));
}

#[test]
fn accumulated_arguments_parse() {
    let tc = AccumulatedToolCall {
        id: "c".into(),
        name: "lookup".into(),
        arguments: String::new(),
    };
    assert_eq!(tc.parse_arguments().unwrap(), json!({}));

    let broken = AccumulatedToolCall {
        arguments: "{not json".into(),
        ..tc
    };
    assert!(broken.parse_arguments().is_err());
    assert!(broken.into_tool_call().arguments.is_empty());
}

// ===========================================================================
// ScriptedProvider
// ===========================================================================

#[tokio::test]
async fn scripted_sequence_then_fallback() {
    let provider = ScriptedProvider::sequence(vec![Script::text("one")]);
    let first = collect(provider.complete_stream(LlmRequest::default(), None).await.unwrap()).await;
    assert!(matches!(&first[0], Ok(StreamDelta::Text(t)) if t == "one"));

    let second = collect(provider.complete_stream(LlmRequest::default(), None).await.unwrap()).await;
    let text: String = second
        .into_iter()
        .filter_map(|d| match d {
            Ok(StreamDelta::Text(t)) => Some(t),
            _ => None,
        })
        .collect();
    assert_eq!(text, "(scripted: sequence exhausted)");
    assert_eq!(provider.call_count(), 2);
    assert_eq!(provider.requests().len(), 2);
}

#[tokio::test]
async fn scripted_tool_call_shape() {
    let provider = ScriptedProvider::constant(Script::tool("lookup", json!({"q": 1})));
    let deltas = collect(provider.complete_stream(LlmRequest::default(), None).await.unwrap()).await;
    assert_eq!(deltas.len(), 4);
    match (&deltas[0], &deltas[1]) {
        (Ok(StreamDelta::ToolCallStart { id, name }), Ok(StreamDelta::ToolCallDelta { arguments, .. })) => {
            assert!(id.starts_with("call_"));
            assert_eq!(name, "lookup");
            assert_eq!(arguments, "{\"q\":1}");
        }
        other => panic!("unexpected deltas: {other:?}"),
    }
    assert!(matches!(deltas[3], Ok(StreamDelta::Done { .. })));
}

#[tokio::test]
async fn scripted_fail_rejects_request() {
    let provider = ScriptedProvider::constant(Script::Fail("nope".into()));
    let err = match provider.complete_stream(LlmRequest::default(), None).await {
        Ok(_) => panic!("expected failure"),
        Err(e) => e,
    };
    assert!(matches!(err.into_core("scripted"), interlude_core::Error::Reasoner { .. }));
}

#[tokio::test]
async fn hang_ends_on_cancel() {
    let provider = ScriptedProvider::constant(Script::Hang);
    let cancel = CancellationToken::new();
    let stream = provider
        .complete_stream(LlmRequest::default(), Some(cancel.clone()))
        .await
        .unwrap();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        trigger.cancel();
    });
    let items = collect(stream).await;
    assert_eq!(items.len(), 1);
    assert!(matches!(items[0], Err(LlmError::Cancelled)));
    assert!(matches!(
        LlmError::Cancelled.into_core("scripted"),
        interlude_core::Error::Cancelled
    ));
}

#[tokio::test]
async fn echo_repeats_last_turn() {
    let provider = ScriptedProvider::echo();
    let request = LlmRequest {
        messages: vec![Turn::user("ping")],
        ..Default::default()
    };
    let text: String = collect(provider.complete_stream(request, None).await.unwrap())
        .await
        .into_iter()
        .filter_map(|d| match d {
            Ok(StreamDelta::Text(t)) => Some(t),
            _ => None,
        })
        .collect();
    assert_eq!(text, "You said: ping");
}
