//! Upstream events to the Claude Messages streaming protocol.
//!
//! [`ClaudeStreamState`] is a strictly sequential state machine: one
//! instance per request, fed one [`UpstreamEvent`] at a time. It guarantees
//! that `message_start` precedes every content event, that at most one content
//! block is open, and that block indices grow by one from 0.

use rustc_hash::FxHashSet;
use serde_json::Value;

use super::sse;
use crate::eventstream::UpstreamEvent;
use crate::observability::token_counter::count_tokens;
use crate::protocol::anthropic::{AnthropicContentBlock, AnthropicResponse, AnthropicUsage};
use crate::util::new_message_id;

pub const STOP_REASON_END_TURN: &str = "end_turn";
pub const STOP_REASON_TOOL_USE: &str = "tool_use";

pub const EVENT_INITIAL_RESPONSE: &str = "initial-response";
pub const EVENT_ASSISTANT_RESPONSE: &str = "assistantResponseEvent";
pub const EVENT_TOOL_USE: &str = "toolUseEvent";
pub const EVENT_ASSISTANT_RESPONSE_END: &str = "assistantResponseEnd";

/// One outbound Claude stream event, before rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaudeEvent {
    MessageStart {
        message_id: String,
        model: String,
        input_tokens: u64,
    },
    Ping,
    TextBlockStart {
        index: usize,
    },
    ToolUseStart {
        index: usize,
        id: String,
        name: String,
    },
    TextDelta {
        index: usize,
        text: String,
    },
    InputJsonDelta {
        index: usize,
        partial_json: String,
    },
    ContentBlockStop {
        index: usize,
    },
    MessageDelta {
        stop_reason: &'static str,
        output_tokens: u64,
    },
    MessageStop,
}

impl ClaudeEvent {
    /// SSE event name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            ClaudeEvent::MessageStart { .. } => "message_start",
            ClaudeEvent::Ping => "ping",
            ClaudeEvent::TextBlockStart { .. } | ClaudeEvent::ToolUseStart { .. } => {
                "content_block_start"
            }
            ClaudeEvent::TextDelta { .. } | ClaudeEvent::InputJsonDelta { .. } => {
                "content_block_delta"
            }
            ClaudeEvent::ContentBlockStop { .. } => "content_block_stop",
            ClaudeEvent::MessageDelta { .. } => "message_delta",
            ClaudeEvent::MessageStop => "message_stop",
        }
    }

    /// Render as `event: ...\ndata: ...\n\n`.
    #[must_use]
    pub fn render(&self) -> String {
        match self {
            ClaudeEvent::MessageStart {
                message_id,
                model,
                input_tokens,
            } => sse::message_start_frame(message_id, model, *input_tokens),
            ClaudeEvent::Ping => sse::ping_frame(),
            ClaudeEvent::TextBlockStart { index } => sse::text_block_start_frame(*index),
            ClaudeEvent::ToolUseStart { index, id, name } => {
                sse::tool_use_start_frame(*index, id, name)
            }
            ClaudeEvent::TextDelta { index, text } => sse::text_delta_frame(*index, text),
            ClaudeEvent::InputJsonDelta {
                index,
                partial_json,
            } => sse::input_json_delta_frame(*index, partial_json),
            ClaudeEvent::ContentBlockStop { index } => sse::content_block_stop_frame(*index),
            ClaudeEvent::MessageDelta {
                stop_reason,
                output_tokens,
            } => sse::message_delta_frame(stop_reason, *output_tokens),
            ClaudeEvent::MessageStop => sse::message_stop_frame(),
        }
    }
}

#[derive(Debug)]
enum BlockKind {
    Text,
    ToolUse {
        id: String,
        fragments: Vec<String>,
    },
}

#[derive(Debug)]
struct OpenBlock {
    index: usize,
    kind: BlockKind,
}

/// Per-request Claude stream state.
#[derive(Debug)]
pub struct ClaudeStreamState {
    model: String,
    input_tokens: u64,
    conversation_id: Option<String>,
    message_start_sent: bool,
    next_block_index: usize,
    open_block: Option<OpenBlock>,
    processed_tool_use_ids: FxHashSet<String>,
    finalized_tool_inputs: Vec<String>,
    response_text: String,
    output_tokens: u64,
    finished: bool,
}

impl ClaudeStreamState {
    #[must_use]
    pub fn new(model: impl Into<String>, input_tokens: u64) -> Self {
        Self {
            model: model.into(),
            input_tokens,
            conversation_id: None,
            message_start_sent: false,
            next_block_index: 0,
            open_block: None,
            processed_tool_use_ids: FxHashSet::default(),
            finalized_tool_inputs: Vec::new(),
            response_text: String::new(),
            output_tokens: 0,
            finished: false,
        }
    }

    /// Feed one upstream event, appending the resulting outbound events in order.
    pub fn handle_into(&mut self, event: &UpstreamEvent, out: &mut Vec<ClaudeEvent>) {
        if self.finished {
            return;
        }
        let payload = event.json_payload().unwrap_or(&Value::Null);
        match event.event_type.as_str() {
            EVENT_INITIAL_RESPONSE => self.on_initial_response(payload, out),
            EVENT_ASSISTANT_RESPONSE => self.on_text(payload, out),
            EVENT_TOOL_USE => self.on_tool_use(payload, out),
            EVENT_ASSISTANT_RESPONSE_END => self.close_open_block(out),
            _ => {}
        }
    }

    /// Convenience wrapper around [`Self::handle_into`].
    pub fn handle(&mut self, event: &UpstreamEvent) -> Vec<ClaudeEvent> {
        let mut out = Vec::new();
        self.handle_into(event, &mut out);
        out
    }

    /// Close any open block and emit `message_delta` + `message_stop`.
    ///
    /// Runs once; later calls emit nothing.
    pub fn finish_into(&mut self, out: &mut Vec<ClaudeEvent>) {
        if self.finished {
            return;
        }
        self.ensure_message_start(None, out);
        self.close_open_block(out);

        self.output_tokens = count_tokens(&self.response_text)
            + count_tokens(&self.finalized_tool_inputs.concat());
        out.push(ClaudeEvent::MessageDelta {
            stop_reason: self.stop_reason(),
            output_tokens: self.output_tokens,
        });
        out.push(ClaudeEvent::MessageStop);
        self.finished = true;
    }

    pub fn finish(&mut self) -> Vec<ClaudeEvent> {
        let mut out = Vec::new();
        self.finish_into(&mut out);
        out
    }

    #[must_use]
    pub fn stop_reason(&self) -> &'static str {
        if self.processed_tool_use_ids.is_empty() {
            STOP_REASON_END_TURN
        } else {
            STOP_REASON_TOOL_USE
        }
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    #[must_use]
    pub fn input_tokens(&self) -> u64 {
        self.input_tokens
    }

    /// Output tokens computed by [`Self::finish_into`]; 0 before that.
    #[must_use]
    pub fn output_tokens(&self) -> u64 {
        self.output_tokens
    }

    fn on_initial_response(&mut self, payload: &Value, out: &mut Vec<ClaudeEvent>) {
        let conversation_id = payload
            .get("conversationId")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty());
        self.ensure_message_start(conversation_id, out);
    }

    fn ensure_message_start(&mut self, conversation_id: Option<&str>, out: &mut Vec<ClaudeEvent>) {
        if self.message_start_sent {
            return;
        }
        if let Some(id) = conversation_id {
            self.conversation_id = Some(id.to_string());
        }
        let message_id = match self.conversation_id.as_deref() {
            Some(id) => format!("msg_{id}"),
            None => new_message_id(),
        };
        self.message_start_sent = true;
        out.push(ClaudeEvent::MessageStart {
            message_id,
            model: self.model.clone(),
            input_tokens: self.input_tokens,
        });
        out.push(ClaudeEvent::Ping);
    }

    fn on_text(&mut self, payload: &Value, out: &mut Vec<ClaudeEvent>) {
        self.ensure_message_start(None, out);

        if matches!(
            self.open_block,
            Some(OpenBlock {
                kind: BlockKind::ToolUse { .. },
                ..
            })
        ) {
            self.close_open_block(out);
        }

        let index = match &self.open_block {
            Some(block) => block.index,
            None => {
                let index = self.start_block(BlockKind::Text);
                out.push(ClaudeEvent::TextBlockStart { index });
                index
            }
        };

        let text = payload
            .get("content")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if !text.is_empty() {
            self.response_text.push_str(text);
            out.push(ClaudeEvent::TextDelta {
                index,
                text: text.to_string(),
            });
        }
    }

    fn on_tool_use(&mut self, payload: &Value, out: &mut Vec<ClaudeEvent>) {
        self.ensure_message_start(None, out);

        let tool_use_id = payload
            .get("toolUseId")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let name = payload
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let stop = payload
            .get("stop")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let fragment = match payload.get("input") {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        };

        // A fragment without an id belongs to whichever tool-use is open.
        let continues_open_tool = match &self.open_block {
            Some(OpenBlock {
                kind: BlockKind::ToolUse { id, .. },
                ..
            }) => tool_use_id.is_empty() || id == tool_use_id,
            _ => false,
        };

        if !continues_open_tool {
            if tool_use_id.is_empty() || self.processed_tool_use_ids.contains(tool_use_id) {
                return;
            }
            self.close_open_block(out);
            self.processed_tool_use_ids.insert(tool_use_id.to_string());
            let index = self.start_block(BlockKind::ToolUse {
                id: tool_use_id.to_string(),
                fragments: Vec::new(),
            });
            out.push(ClaudeEvent::ToolUseStart {
                index,
                id: tool_use_id.to_string(),
                name: name.to_string(),
            });
        }

        if let Some(OpenBlock {
            index,
            kind: BlockKind::ToolUse { fragments, .. },
        }) = &mut self.open_block
        {
            if !fragment.is_empty() {
                out.push(ClaudeEvent::InputJsonDelta {
                    index: *index,
                    partial_json: fragment.clone(),
                });
                fragments.push(fragment);
            }
        }

        if stop {
            self.close_open_block(out);
        }
    }

    /// Open a block at the next index and return that index.
    fn start_block(&mut self, kind: BlockKind) -> usize {
        let index = self.next_block_index;
        self.next_block_index += 1;
        self.open_block = Some(OpenBlock { index, kind });
        index
    }

    fn close_open_block(&mut self, out: &mut Vec<ClaudeEvent>) {
        let Some(block) = self.open_block.take() else {
            return;
        };
        if let BlockKind::ToolUse { fragments, .. } = block.kind {
            self.finalized_tool_inputs.push(fragments.concat());
        }
        out.push(ClaudeEvent::ContentBlockStop { index: block.index });
    }
}

/// Folds a [`ClaudeEvent`] sequence into one non-streaming Messages response.
#[derive(Debug, Default)]
pub struct ClaudeResponseBuilder {
    message_id: String,
    model: String,
    input_tokens: u64,
    output_tokens: u64,
    stop_reason: Option<String>,
    blocks: Vec<PendingBlock>,
}

#[derive(Debug)]
enum PendingBlock {
    Text(String),
    ToolUse {
        id: String,
        name: String,
        partial_json: String,
    },
}

impl ClaudeResponseBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: &ClaudeEvent) {
        match event {
            ClaudeEvent::MessageStart {
                message_id,
                model,
                input_tokens,
            } => {
                self.message_id.clone_from(message_id);
                self.model.clone_from(model);
                self.input_tokens = *input_tokens;
            }
            ClaudeEvent::TextBlockStart { .. } => self.blocks.push(PendingBlock::Text(String::new())),
            ClaudeEvent::ToolUseStart { id, name, .. } => self.blocks.push(PendingBlock::ToolUse {
                id: id.clone(),
                name: name.clone(),
                partial_json: String::new(),
            }),
            ClaudeEvent::TextDelta { text, .. } => {
                if let Some(PendingBlock::Text(buffer)) = self.blocks.last_mut() {
                    buffer.push_str(text);
                }
            }
            ClaudeEvent::InputJsonDelta { partial_json, .. } => {
                if let Some(PendingBlock::ToolUse {
                    partial_json: buffer,
                    ..
                }) = self.blocks.last_mut()
                {
                    buffer.push_str(partial_json);
                }
            }
            ClaudeEvent::MessageDelta {
                stop_reason,
                output_tokens,
            } => {
                self.stop_reason = Some((*stop_reason).to_string());
                self.output_tokens = *output_tokens;
            }
            ClaudeEvent::Ping | ClaudeEvent::ContentBlockStop { .. } | ClaudeEvent::MessageStop => {}
        }
    }

    /// Build the response. Tool inputs that are not valid JSON objects become `{}`.
    #[must_use]
    pub fn build(self) -> AnthropicResponse {
        let content = self
            .blocks
            .into_iter()
            .map(|block| match block {
                PendingBlock::Text(text) => AnthropicContentBlock::Text { text },
                PendingBlock::ToolUse {
                    id,
                    name,
                    partial_json,
                } => AnthropicContentBlock::ToolUse {
                    id,
                    name,
                    input: serde_json::from_str::<Value>(&partial_json)
                        .ok()
                        .filter(Value::is_object)
                        .unwrap_or_else(|| Value::Object(serde_json::Map::new())),
                },
            })
            .collect();

        AnthropicResponse {
            id: self.message_id,
            type_: "message".to_string(),
            role: "assistant".to_string(),
            model: self.model,
            content,
            stop_reason: Some(
                self.stop_reason
                    .unwrap_or_else(|| STOP_REASON_END_TURN.to_string()),
            ),
            stop_sequence: None,
            usage: AnthropicUsage {
                input_tokens: self.input_tokens,
                output_tokens: self.output_tokens,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(event_type: &str, payload: Value) -> UpstreamEvent {
        UpstreamEvent::json(event_type, payload)
    }

    fn run(events: &[UpstreamEvent]) -> Vec<ClaudeEvent> {
        let mut state = ClaudeStreamState::new("claude-sonnet-4-5", 10);
        let mut out = Vec::new();
        for e in events {
            state.handle_into(e, &mut out);
        }
        state.finish_into(&mut out);
        out
    }

    fn names(events: &[ClaudeEvent]) -> Vec<&'static str> {
        events.iter().map(ClaudeEvent::name).collect()
    }

    /// Checks message_start comes first, at most one block is open, and indices grow from 0.
    fn assert_block_lifecycle(events: &[ClaudeEvent]) {
        assert!(matches!(events.first(), Some(ClaudeEvent::MessageStart { .. })));
        let mut open: Option<usize> = None;
        let mut next = 0usize;
        for e in events {
            match e {
                ClaudeEvent::TextBlockStart { index } | ClaudeEvent::ToolUseStart { index, .. } => {
                    assert!(open.is_none(), "block opened while {open:?} is open");
                    assert_eq!(*index, next);
                    open = Some(*index);
                    next += 1;
                }
                ClaudeEvent::TextDelta { index, .. } | ClaudeEvent::InputJsonDelta { index, .. } => {
                    assert_eq!(open, Some(*index));
                }
                ClaudeEvent::ContentBlockStop { index } => {
                    assert_eq!(open, Some(*index));
                    open = None;
                }
                _ => {}
            }
        }
        assert!(open.is_none());
    }

    #[test]
    fn test_simple_text_reply() {
        let out = run(&[
            event("initial-response", json!({"conversationId": "c1"})),
            event("assistantResponseEvent", json!({"content": "Hi"})),
            event("assistantResponseEnd", json!({})),
        ]);
        assert_eq!(
            names(&out),
            vec![
                "message_start",
                "ping",
                "content_block_start",
                "content_block_delta",
                "content_block_stop",
                "message_delta",
                "message_stop",
            ]
        );
        assert!(matches!(&out[0], ClaudeEvent::MessageStart { message_id, .. } if message_id == "msg_c1"));
        assert_eq!(out[2], ClaudeEvent::TextBlockStart { index: 0 });
        assert_eq!(
            out[3],
            ClaudeEvent::TextDelta {
                index: 0,
                text: "Hi".into()
            }
        );
        assert_eq!(out[4], ClaudeEvent::ContentBlockStop { index: 0 });
        assert!(matches!(
            out[5],
            ClaudeEvent::MessageDelta {
                stop_reason: STOP_REASON_END_TURN,
                ..
            }
        ));
    }

    #[test]
    fn test_tool_call() {
        let out = run(&[
            event("initial-response", json!({"conversationId": "c1"})),
            event(
                "toolUseEvent",
                json!({"toolUseId": "t1", "name": "search", "input": "{\"q\":1}", "stop": false}),
            ),
            event("toolUseEvent", json!({"toolUseId": "t1", "stop": true})),
        ]);
        assert_eq!(
            &out[2..5],
            &[
                ClaudeEvent::ToolUseStart {
                    index: 0,
                    id: "t1".into(),
                    name: "search".into()
                },
                ClaudeEvent::InputJsonDelta {
                    index: 0,
                    partial_json: "{\"q\":1}".into()
                },
                ClaudeEvent::ContentBlockStop { index: 0 },
            ]
        );
        assert!(matches!(
            out[5],
            ClaudeEvent::MessageDelta {
                stop_reason: STOP_REASON_TOOL_USE,
                ..
            }
        ));
        assert_block_lifecycle(&out);
    }

    #[test]
    fn test_repeated_tool_use_id_never_reopens() {
        let out = run(&[
            event("toolUseEvent", json!({"toolUseId": "t1", "name": "a", "input": "{}", "stop": true})),
            event("toolUseEvent", json!({"toolUseId": "t1", "name": "a", "input": "{}", "stop": true})),
        ]);
        let starts = out
            .iter()
            .filter(|e| matches!(e, ClaudeEvent::ToolUseStart { .. }))
            .count();
        assert_eq!(starts, 1);
        assert_block_lifecycle(&out);
    }

    #[test]
    fn test_tool_event_without_id_is_ignored_when_nothing_open() {
        let out = run(&[event("toolUseEvent", json!({"input": "{}", "stop": true}))]);
        assert_eq!(names(&out), vec!["message_start", "ping", "message_delta", "message_stop"]);
        assert!(matches!(
            out[2],
            ClaudeEvent::MessageDelta {
                stop_reason: STOP_REASON_END_TURN,
                ..
            }
        ));
    }

    #[test]
    fn test_tool_event_without_id_continues_open_tool() {
        let out = run(&[
            event("toolUseEvent", json!({"toolUseId": "t1", "name": "a", "input": "{\"q\":"})),
            event("toolUseEvent", json!({"input": "1}", "stop": true})),
        ]);
        assert_block_lifecycle(&out);
        assert_eq!(
            &out[2..6],
            &[
                ClaudeEvent::ToolUseStart {
                    index: 0,
                    id: "t1".into(),
                    name: "a".into()
                },
                ClaudeEvent::InputJsonDelta {
                    index: 0,
                    partial_json: "{\"q\":".into()
                },
                ClaudeEvent::InputJsonDelta {
                    index: 0,
                    partial_json: "1}".into()
                },
                ClaudeEvent::ContentBlockStop { index: 0 },
            ]
        );
    }

    #[test]
    fn test_object_input_is_stringified() {
        let out = run(&[event(
            "toolUseEvent",
            json!({"toolUseId": "t1", "name": "a", "input": {"k": "v"}, "stop": true}),
        )]);
        assert!(out.contains(&ClaudeEvent::InputJsonDelta {
            index: 0,
            partial_json: r#"{"k":"v"}"#.into()
        }));
    }

    #[test]
    fn test_text_after_tool_closes_tool_block() {
        let out = run(&[
            event("toolUseEvent", json!({"toolUseId": "t1", "name": "a", "input": "{\"x\":"})),
            event("assistantResponseEvent", json!({"content": "done"})),
        ]);
        assert_block_lifecycle(&out);
        let stop_pos = out
            .iter()
            .position(|e| *e == ClaudeEvent::ContentBlockStop { index: 0 })
            .unwrap();
        let text_pos = out
            .iter()
            .position(|e| *e == ClaudeEvent::TextBlockStart { index: 1 })
            .unwrap();
        assert!(stop_pos < text_pos);
    }

    #[test]
    fn test_new_tool_id_while_open_switches_blocks() {
        let out = run(&[
            event("toolUseEvent", json!({"toolUseId": "t1", "name": "a", "input": "{}"})),
            event("toolUseEvent", json!({"toolUseId": "t2", "name": "b", "input": "{}"})),
            event("toolUseEvent", json!({"toolUseId": "t2", "stop": true})),
        ]);
        assert_block_lifecycle(&out);
        assert!(out.contains(&ClaudeEvent::ToolUseStart {
            index: 1,
            id: "t2".into(),
            name: "b".into()
        }));
    }

    #[test]
    fn test_mixed_sequence_keeps_lifecycle() {
        let out = run(&[
            event("initial-response", json!({})),
            event("assistantResponseEvent", json!({"content": "Let me look."})),
            event("assistantResponseEvent", json!({"content": " One sec."})),
            event("toolUseEvent", json!({"toolUseId": "t1", "name": "a", "input": "{\"q\""})),
            event("toolUseEvent", json!({"toolUseId": "t1", "input": ":2}", "stop": true})),
            event("unknownEvent", json!({"content": "ignored"})),
            event("assistantResponseEvent", json!({"content": "Found it."})),
            event("assistantResponseEnd", json!({})),
            event("assistantResponseEnd", json!({})),
        ]);
        assert_block_lifecycle(&out);
        let stops = out
            .iter()
            .filter(|e| matches!(e, ClaudeEvent::ContentBlockStop { .. }))
            .count();
        assert_eq!(stops, 3);
    }

    #[test]
    fn test_every_short_sequence_keeps_lifecycle() {
        let alphabet = [
            event("initial-response", json!({"conversationId": "c1"})),
            event("assistantResponseEvent", json!({"content": "a"})),
            event("assistantResponseEvent", json!({"content": ""})),
            event("toolUseEvent", json!({"toolUseId": "t1", "name": "a", "input": "{"})),
            event("toolUseEvent", json!({"toolUseId": "t1", "input": "}", "stop": true})),
            event("toolUseEvent", json!({"toolUseId": "t2", "name": "b", "input": {"k": 1}})),
            event("toolUseEvent", json!({"input": "x"})),
            event("assistantResponseEnd", json!({})),
        ];
        let base = alphabet.len();
        for len in 0..=4u32 {
            for mut n in 0..base.pow(len) {
                let mut sequence = Vec::with_capacity(len as usize);
                for _ in 0..len {
                    sequence.push(alphabet[n % base].clone());
                    n /= base;
                }
                let out = run(&sequence);
                assert_block_lifecycle(&out);
                assert!(
                    out.iter().all(|e| !matches!(
                        e,
                        ClaudeEvent::ToolUseStart { id, .. } if id.is_empty()
                    )),
                    "nameless tool block for {sequence:?}"
                );
                assert_eq!(out.last(), Some(&ClaudeEvent::MessageStop));
            }
        }
    }

    #[test]
    fn test_finish_is_idempotent() {
        let mut state = ClaudeStreamState::new("m", 0);
        state.handle(&event("initial-response", json!({"conversationId": "c1"})));
        state.handle(&event("assistantResponseEvent", json!({"content": "Hi"})));
        state.handle(&event("assistantResponseEnd", json!({})));
        let first = state.finish();
        assert!(!first
            .iter()
            .any(|e| matches!(e, ClaudeEvent::ContentBlockStop { .. })));
        assert_eq!(names(&first), vec!["message_delta", "message_stop"]);
        assert!(state.finish().is_empty());
        assert!(state
            .handle(&event("assistantResponseEvent", json!({"content": "late"})))
            .is_empty());
    }

    #[test]
    fn test_content_before_initial_response_still_starts_message() {
        let mut state = ClaudeStreamState::new("m", 3);
        let out = state.handle(&event("assistantResponseEvent", json!({"content": "x"})));
        assert_eq!(names(&out)[..2], ["message_start", "ping"]);
        assert!(state
            .handle(&event("initial-response", json!({"conversationId": "late"})))
            .is_empty());
    }

    #[test]
    fn test_output_tokens_counted_on_finish() {
        let mut state = ClaudeStreamState::new("m", 0);
        state.handle(&event("assistantResponseEvent", json!({"content": "Hello there, how are you?"})));
        state.finish();
        assert!(state.output_tokens() > 0);
    }

    #[test]
    fn test_response_builder_folds_blocks() {
        let events = run(&[
            event("initial-response", json!({"conversationId": "c9"})),
            event("assistantResponseEvent", json!({"content": "Checking"})),
            event("toolUseEvent", json!({"toolUseId": "t1", "name": "search", "input": "{\"q\":"})),
            event("toolUseEvent", json!({"toolUseId": "t1", "input": "\"rust\"}", "stop": true})),
            event("toolUseEvent", json!({"toolUseId": "t2", "name": "broken", "input": "{not json", "stop": true})),
        ]);
        let mut builder = ClaudeResponseBuilder::new();
        for e in &events {
            builder.push(e);
        }
        let response = builder.build();
        assert_eq!(response.id, "msg_c9");
        assert_eq!(response.stop_reason.as_deref(), Some("tool_use"));
        assert_eq!(response.usage.input_tokens, 10);
        assert_eq!(
            response.content,
            vec![
                AnthropicContentBlock::Text {
                    text: "Checking".into()
                },
                AnthropicContentBlock::ToolUse {
                    id: "t1".into(),
                    name: "search".into(),
                    input: json!({"q": "rust"}),
                },
                AnthropicContentBlock::ToolUse {
                    id: "t2".into(),
                    name: "broken".into(),
                    input: json!({}),
                },
            ]
        );
    }
}
