use std::time::Instant;

use bytes::Bytes;
use futures_util::StreamExt;
use serde_json::{json, Value};
use streamgate_rs::error::GatewayError;
use streamgate_rs::eventstream::encode_json_event;
use streamgate_rs::protocol::anthropic::AnthropicContentBlock;
use streamgate_rs::stream::{
    claude_sse_stream, collect_claude_response, collect_openai_response, openai_sse_stream,
};

fn wire(events: &[(&str, Value)]) -> Vec<u8> {
    let mut out = Vec::new();
    for (event_type, payload) in events {
        out.extend(encode_json_event(event_type, payload).expect("encode"));
    }
    out
}

/// Split into uneven chunks so frames straddle reads.
fn chunked(bytes: &[u8]) -> impl futures_util::Stream<Item = Result<Bytes, GatewayError>> + Send + 'static {
    let chunks: Vec<Result<Bytes, GatewayError>> = bytes
        .chunks(13)
        .map(|c| Ok(Bytes::copy_from_slice(c)))
        .collect();
    futures_util::stream::iter(chunks)
}

/// `(event name, data json)` pairs from a Claude SSE body.
fn parse_claude_sse(body: &str) -> Vec<(String, Value)> {
    body.split("\n\n")
        .filter(|frame| !frame.is_empty())
        .map(|frame| {
            let mut name = String::new();
            let mut data = Value::Null;
            for line in frame.lines() {
                if let Some(rest) = line.strip_prefix("event: ") {
                    name = rest.to_string();
                } else if let Some(rest) = line.strip_prefix("data: ") {
                    data = serde_json::from_str(rest).expect("data json");
                }
            }
            (name, data)
        })
        .collect()
}

async fn collect_body<S: futures_util::Stream<Item = Bytes>>(stream: S) -> String {
    let chunks: Vec<Bytes> = stream.collect().await;
    chunks
        .iter()
        .map(|c| std::str::from_utf8(c).expect("utf8"))
        .collect()
}

#[tokio::test]
async fn test_claude_text_reply() {
    let bytes = wire(&[
        ("initial-response", json!({"conversationId": "c1"})),
        ("assistantResponseEvent", json!({"content": "Hello"})),
        ("assistantResponseEnd", json!({})),
    ]);
    let body = collect_body(claude_sse_stream(chunked(&bytes), "claude-sonnet-4-5", 12, "c1", Instant::now())).await;
    let events = parse_claude_sse(&body);
    let names: Vec<&str> = events.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(
        names,
        [
            "message_start",
            "ping",
            "content_block_start",
            "content_block_delta",
            "content_block_stop",
            "message_delta",
            "message_stop"
        ]
    );
    assert_eq!(events[0].1["message"]["id"], "msg_c1");
    assert_eq!(events[0].1["message"]["usage"]["input_tokens"], 12);
    assert_eq!(events[2].1["content_block"]["type"], "text");
    assert_eq!(events[3].1["delta"]["text"], "Hello");
    assert_eq!(events[5].1["delta"]["stop_reason"], "end_turn");
}

#[tokio::test]
async fn test_claude_tool_call() {
    let bytes = wire(&[
        ("toolUseEvent", json!({"toolUseId": "t1", "name": "search", "input": "{\"q\":"})),
        ("toolUseEvent", json!({"toolUseId": "t1", "name": "search", "input": "\"rust\"}", "stop": true})),
    ]);
    let body = collect_body(claude_sse_stream(chunked(&bytes), "m", 0, "c2", Instant::now())).await;
    let events = parse_claude_sse(&body);
    let starts: Vec<&Value> = events
        .iter()
        .filter(|(n, _)| n == "content_block_start")
        .map(|(_, d)| d)
        .collect();
    assert_eq!(starts.len(), 1);
    assert_eq!(starts[0]["content_block"]["type"], "tool_use");
    assert_eq!(starts[0]["content_block"]["id"], "t1");
    assert_eq!(starts[0]["content_block"]["name"], "search");
    let partial: String = events
        .iter()
        .filter(|(n, d)| n == "content_block_delta" && d["delta"]["type"] == "input_json_delta")
        .map(|(_, d)| d["delta"]["partial_json"].as_str().expect("partial").to_string())
        .collect();
    assert_eq!(partial, r#"{"q":"rust"}"#);
    let delta = events.iter().find(|(n, _)| n == "message_delta").expect("delta");
    assert_eq!(delta.1["delta"]["stop_reason"], "tool_use");
}

#[tokio::test]
async fn test_claude_mid_stream_failure_emits_error_frame() {
    let bytes = wire(&[("assistantResponseEvent", json!({"content": "partial"}))]);
    let items: Vec<Result<Bytes, GatewayError>> = vec![
        Ok(Bytes::from(bytes)),
        Err(GatewayError::Transport("connection reset".into())),
    ];
    let body = collect_body(claude_sse_stream(
        futures_util::stream::iter(items),
        "m",
        0,
        "c3",
        Instant::now(),
    ))
    .await;
    let events = parse_claude_sse(&body);
    let (last_name, last_data) = events.last().expect("events");
    assert_eq!(last_name, "error");
    assert_eq!(last_data["error"]["type"], "api_error");
    assert!(events.iter().all(|(n, _)| n != "message_stop"));
}

#[tokio::test]
async fn test_collect_claude_response_mixed_content() {
    let bytes = wire(&[
        ("assistantResponseEvent", json!({"content": "Let me check."})),
        ("toolUseEvent", json!({"toolUseId": "t1", "name": "lookup", "input": "{\"id\":7}", "stop": true})),
    ]);
    let message = collect_claude_response(chunked(&bytes), "m", 3, "c4", Instant::now())
        .await
        .expect("collect");
    assert_eq!(message.id, "msg_c4");
    assert_eq!(message.stop_reason.as_deref(), Some("tool_use"));
    assert_eq!(
        message.content,
        vec![
            AnthropicContentBlock::Text {
                text: "Let me check.".into()
            },
            AnthropicContentBlock::ToolUse {
                id: "t1".into(),
                name: "lookup".into(),
                input: json!({"id": 7}),
            },
        ]
    );
    assert_eq!(message.usage.input_tokens, 3);
}

#[tokio::test]
async fn test_collect_claude_response_propagates_failure() {
    let items: Vec<Result<Bytes, GatewayError>> = vec![Err(GatewayError::Transport("boom".into()))];
    let err = collect_claude_response(futures_util::stream::iter(items), "m", 0, "c5", Instant::now())
        .await
        .expect_err("should fail");
    assert!(matches!(err, GatewayError::Transport(_)));
}

#[tokio::test]
async fn test_openai_stream_ends_with_done() {
    let bytes = wire(&[
        ("initial-response", json!({"conversationId": "c6"})),
        ("assistantResponseEvent", json!({"content": "Hi"})),
        ("assistantResponseEvent", json!({"content": "!"})),
    ]);
    let body = collect_body(openai_sse_stream(chunked(&bytes), "gpt-4o", 1, "c6", Instant::now())).await;
    let frames: Vec<&str> = body.split("\n\n").filter(|f| !f.is_empty()).collect();
    assert_eq!(frames.last().copied(), Some("data: [DONE]"));

    let chunks: Vec<Value> = frames[..frames.len() - 1]
        .iter()
        .map(|f| serde_json::from_str(f.trim_start_matches("data: ")).expect("chunk json"))
        .collect();
    assert_eq!(chunks[0]["choices"][0]["delta"]["role"], "assistant");
    let text: String = chunks
        .iter()
        .filter_map(|c| c["choices"][0]["delta"]["content"].as_str())
        .collect();
    assert_eq!(text, "Hi!");
    let id = &chunks[0]["id"];
    assert!(chunks.iter().all(|c| &c["id"] == id));
    assert_eq!(chunks.last().expect("chunk")["choices"][0]["finish_reason"], "stop");
}

#[tokio::test]
async fn test_openai_mid_stream_failure_has_no_done() {
    let items: Vec<Result<Bytes, GatewayError>> = vec![
        Ok(Bytes::from(wire(&[("assistantResponseEvent", json!({"content": "x"}))]))),
        Err(GatewayError::Frame("bad length".into())),
    ];
    let body = collect_body(openai_sse_stream(
        futures_util::stream::iter(items),
        "gpt-4o",
        0,
        "c7",
        Instant::now(),
    ))
    .await;
    assert!(!body.contains("[DONE]"));
    let last = body.split("\n\n").filter(|f| !f.is_empty()).last().expect("frame");
    let value: Value = serde_json::from_str(last.trim_start_matches("data: ")).expect("json");
    assert_eq!(value["error"]["type"], "server_error");
}

#[tokio::test]
async fn test_collect_openai_response() {
    let bytes = wire(&[
        ("assistantResponseEvent", json!({"assistantResponseEvent": {"content": "Hello"}})),
        ("assistantResponseEvent", json!({"content": " world"})),
    ]);
    let completion = collect_openai_response(chunked(&bytes), "gpt-4o", 4, Instant::now())
        .await
        .expect("collect");
    assert_eq!(completion.object, "chat.completion");
    assert_eq!(completion.choices[0].message.content, "Hello world");
    assert_eq!(completion.usage.prompt_tokens, 4);
}
