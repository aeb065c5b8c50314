//! Outbound SSE frame rendering.
//!
//! Every function here is stateless; ordering is the state machines' job.
//! JSON bodies are written by hand so the hot path never builds a `Value`.

use crate::util::{push_decimal, push_json_string_escaped};

const DONE_FRAME: &str = "data: [DONE]\n\n";

// ---------------------------------------------------------------------------
// Envelopes
// ---------------------------------------------------------------------------

/// Append `event: {name}\ndata: {json}\n\n`.
#[inline]
pub fn push_named_frame(out: &mut String, event_type: &str, json: &str) {
    out.reserve(18 + event_type.len() + json.len());
    out.push_str("event: ");
    out.push_str(event_type);
    out.push_str("\ndata: ");
    out.push_str(json);
    out.push_str("\n\n");
}

/// Format an Anthropic-style SSE frame (with named event type).
#[must_use]
pub fn anthropic_sse_frame(event_type: &str, json: &str) -> String {
    let mut out = String::new();
    push_named_frame(&mut out, event_type, json);
    out
}

/// Format an OpenAI-style SSE frame (no event type, just data).
#[must_use]
pub fn openai_sse_frame(json: &str) -> String {
    let mut out = String::with_capacity(8 + json.len());
    out.push_str("data: ");
    out.push_str(json);
    out.push_str("\n\n");
    out
}

/// Format a `[DONE]` frame as SSE text.
#[must_use]
pub fn done_frame() -> String {
    DONE_FRAME.to_owned()
}

// ---------------------------------------------------------------------------
// Claude message stream
// ---------------------------------------------------------------------------

#[must_use]
pub fn message_start_frame(message_id: &str, model: &str, input_tokens: u64) -> String {
    let mut json = String::with_capacity(224 + message_id.len() + model.len());
    json.push_str(r#"{"type":"message_start","message":{"id":"#);
    push_json_string_escaped(&mut json, message_id);
    json.push_str(r#","type":"message","role":"assistant","content":[],"model":"#);
    push_json_string_escaped(&mut json, model);
    json.push_str(r#","stop_reason":null,"stop_sequence":null,"usage":{"input_tokens":"#);
    push_decimal(&mut json, input_tokens);
    json.push_str(r#","output_tokens":0}}}"#);
    anthropic_sse_frame("message_start", &json)
}

#[must_use]
pub fn ping_frame() -> String {
    anthropic_sse_frame("ping", r#"{"type":"ping"}"#)
}

#[must_use]
pub fn text_block_start_frame(index: usize) -> String {
    let mut json = String::with_capacity(96);
    json.push_str(r#"{"type":"content_block_start","index":"#);
    push_decimal(&mut json, index as u64);
    json.push_str(r#","content_block":{"type":"text","text":""}}"#);
    anthropic_sse_frame("content_block_start", &json)
}

#[must_use]
pub fn tool_use_start_frame(index: usize, tool_use_id: &str, name: &str) -> String {
    let mut json = String::with_capacity(112 + tool_use_id.len() + name.len());
    json.push_str(r#"{"type":"content_block_start","index":"#);
    push_decimal(&mut json, index as u64);
    json.push_str(r#","content_block":{"type":"tool_use","id":"#);
    push_json_string_escaped(&mut json, tool_use_id);
    json.push_str(r#","name":"#);
    push_json_string_escaped(&mut json, name);
    json.push_str(r#","input":{}}}"#);
    anthropic_sse_frame("content_block_start", &json)
}

#[must_use]
pub fn text_delta_frame(index: usize, text: &str) -> String {
    let mut json = String::with_capacity(80 + text.len());
    json.push_str(r#"{"type":"content_block_delta","index":"#);
    push_decimal(&mut json, index as u64);
    json.push_str(r#","delta":{"type":"text_delta","text":"#);
    push_json_string_escaped(&mut json, text);
    json.push_str("}}");
    anthropic_sse_frame("content_block_delta", &json)
}

#[must_use]
pub fn input_json_delta_frame(index: usize, partial_json: &str) -> String {
    let mut json = String::with_capacity(96 + partial_json.len());
    json.push_str(r#"{"type":"content_block_delta","index":"#);
    push_decimal(&mut json, index as u64);
    json.push_str(r#","delta":{"type":"input_json_delta","partial_json":"#);
    push_json_string_escaped(&mut json, partial_json);
    json.push_str("}}");
    anthropic_sse_frame("content_block_delta", &json)
}

#[must_use]
pub fn content_block_stop_frame(index: usize) -> String {
    let mut json = String::with_capacity(48);
    json.push_str(r#"{"type":"content_block_stop","index":"#);
    push_decimal(&mut json, index as u64);
    json.push('}');
    anthropic_sse_frame("content_block_stop", &json)
}

#[must_use]
pub fn message_delta_frame(stop_reason: &str, output_tokens: u64) -> String {
    let mut json = String::with_capacity(112);
    json.push_str(r#"{"type":"message_delta","delta":{"stop_reason":"#);
    push_json_string_escaped(&mut json, stop_reason);
    json.push_str(r#","stop_sequence":null},"usage":{"output_tokens":"#);
    push_decimal(&mut json, output_tokens);
    json.push_str("}}");
    anthropic_sse_frame("message_delta", &json)
}

#[must_use]
pub fn message_stop_frame() -> String {
    anthropic_sse_frame("message_stop", r#"{"type":"message_stop"}"#)
}

/// Terminal `event: error` frame.
#[must_use]
pub fn anthropic_error_frame(error_type: &str, message: &str) -> String {
    let mut json = String::with_capacity(48 + error_type.len() + message.len());
    json.push_str(r#"{"type":"error","error":{"type":"#);
    push_json_string_escaped(&mut json, error_type);
    json.push_str(r#","message":"#);
    push_json_string_escaped(&mut json, message);
    json.push_str("}}");
    anthropic_sse_frame("error", &json)
}

// ---------------------------------------------------------------------------
// OpenAI chunk stream
// ---------------------------------------------------------------------------

/// Delta carried by one `chat.completion.chunk`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkDelta<'a> {
    Role,
    Content(&'a str),
    Empty,
}

#[must_use]
pub fn openai_chunk_frame(
    completion_id: &str,
    created: u64,
    model: &str,
    delta: ChunkDelta<'_>,
    finish_reason: Option<&str>,
) -> String {
    let mut json = String::with_capacity(160 + completion_id.len() + model.len());
    json.push_str(r#"{"id":"#);
    push_json_string_escaped(&mut json, completion_id);
    json.push_str(r#","object":"chat.completion.chunk","created":"#);
    push_decimal(&mut json, created);
    json.push_str(r#","model":"#);
    push_json_string_escaped(&mut json, model);
    json.push_str(r#","choices":[{"index":0,"delta":"#);
    match delta {
        ChunkDelta::Role => json.push_str(r#"{"role":"assistant"}"#),
        ChunkDelta::Content(text) => {
            json.push_str(r#"{"content":"#);
            push_json_string_escaped(&mut json, text);
            json.push('}');
        }
        ChunkDelta::Empty => json.push_str("{}"),
    }
    json.push_str(r#","finish_reason":"#);
    match finish_reason {
        Some(reason) => push_json_string_escaped(&mut json, reason),
        None => json.push_str("null"),
    }
    json.push_str("}]}");
    openai_sse_frame(&json)
}

/// Terminal `data: {"error":...}` chunk.
#[must_use]
pub fn openai_error_frame(error_type: &str, message: &str) -> String {
    let mut json = String::with_capacity(48 + error_type.len() + message.len());
    json.push_str(r#"{"error":{"message":"#);
    push_json_string_escaped(&mut json, message);
    json.push_str(r#","type":"#);
    push_json_string_escaped(&mut json, error_type);
    json.push_str(r#","code":null,"param":null}}"#);
    openai_sse_frame(&json)
}
