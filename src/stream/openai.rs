//! Upstream events to `OpenAI` chat completion chunks.
//!
//! No block lifecycle here: each event goes through an ordered list of text
//! extraction rules and the first non-empty result becomes a content chunk.

use serde_json::Value;

use super::sse::{self, ChunkDelta};
use crate::eventstream::UpstreamEvent;
use crate::observability::token_counter::count_tokens;
use crate::protocol::openai_chat::{
    OpenAiChatResponse, OpenAiChoice, OpenAiResponseMessage, OpenAiUsage,
};
use crate::util::{new_completion_id, unix_now_secs};

pub const FINISH_REASON_STOP: &str = "stop";

type ExtractionRule = fn(&Value) -> Option<String>;

/// Tried in order; first match wins.
const EXTRACTION_RULES: &[ExtractionRule] = &[
    nested_content,
    top_level_content,
    list_content,
    flat_text_field,
];

const NESTED_KEYS: &[&str] = &[
    "assistantResponseEvent",
    "assistantResponseMessage",
    "codeEvent",
    "message",
    "delta",
];
const LIST_KEYS: &[&str] = &["content", "messages", "chunks", "items"];
const FLAT_KEYS: &[&str] = &["text", "delta", "payload"];

fn non_empty(text: &str) -> Option<String> {
    (!text.is_empty()).then(|| text.to_string())
}

fn nested_content(payload: &Value) -> Option<String> {
    NESTED_KEYS.iter().find_map(|key| {
        payload
            .get(key)?
            .get("content")?
            .as_str()
            .and_then(non_empty)
    })
}

fn top_level_content(payload: &Value) -> Option<String> {
    payload.get("content")?.as_str().and_then(non_empty)
}

fn list_content(payload: &Value) -> Option<String> {
    LIST_KEYS.iter().find_map(|key| {
        let items = payload.get(key)?.as_array()?;
        let mut joined = String::new();
        for item in items {
            let piece = match item {
                Value::String(text) => Some(text.as_str()),
                other => other
                    .get("content")
                    .and_then(Value::as_str)
                    .or_else(|| other.get("text").and_then(Value::as_str)),
            };
            if let Some(piece) = piece {
                joined.push_str(piece);
            }
        }
        non_empty(&joined)
    })
}

fn flat_text_field(payload: &Value) -> Option<String> {
    FLAT_KEYS
        .iter()
        .find_map(|key| payload.get(key)?.as_str().and_then(non_empty))
}

/// Best-effort text of one upstream payload.
#[must_use]
pub fn extract_text(payload: &Value) -> Option<String> {
    EXTRACTION_RULES.iter().find_map(|rule| rule(payload))
}

/// Per-request `OpenAI` chunk state.
#[derive(Debug)]
pub struct OpenAiStreamState {
    completion_id: String,
    created: u64,
    model: String,
    role_sent: bool,
    text: String,
    finished: bool,
}

impl OpenAiStreamState {
    #[must_use]
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            completion_id: new_completion_id(),
            created: unix_now_secs(),
            model: model.into(),
            role_sent: false,
            text: String::new(),
            finished: false,
        }
    }

    /// Feed one upstream event, appending rendered `data:` frames to `out`.
    pub fn handle_into(&mut self, event: &UpstreamEvent, out: &mut Vec<String>) {
        if self.finished {
            return;
        }
        let Some(text) = event.json_payload().and_then(extract_text) else {
            return;
        };
        self.ensure_role(out);
        out.push(sse::openai_chunk_frame(
            &self.completion_id,
            self.created,
            &self.model,
            ChunkDelta::Content(&text),
            None,
        ));
        self.text.push_str(&text);
    }

    /// Emit the `finish_reason` chunk and `[DONE]`. Runs once.
    pub fn finish_into(&mut self, out: &mut Vec<String>) {
        if self.finished {
            return;
        }
        self.ensure_role(out);
        out.push(sse::openai_chunk_frame(
            &self.completion_id,
            self.created,
            &self.model,
            ChunkDelta::Empty,
            Some(FINISH_REASON_STOP),
        ));
        out.push(sse::done_frame());
        self.finished = true;
    }

    fn ensure_role(&mut self, out: &mut Vec<String>) {
        if self.role_sent {
            return;
        }
        self.role_sent = true;
        out.push(sse::openai_chunk_frame(
            &self.completion_id,
            self.created,
            &self.model,
            ChunkDelta::Role,
            None,
        ));
    }

    /// Text extracted so far.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    #[must_use]
    pub fn completion_id(&self) -> &str {
        &self.completion_id
    }

    /// Build the non-streaming `chat.completion` object from the text seen so far.
    #[must_use]
    pub fn into_response(self, prompt_tokens: u64) -> OpenAiChatResponse {
        let completion_tokens = count_tokens(&self.text);
        OpenAiChatResponse {
            id: self.completion_id,
            object: "chat.completion".to_string(),
            created: self.created,
            model: self.model,
            choices: vec![OpenAiChoice {
                index: 0,
                message: OpenAiResponseMessage {
                    role: "assistant".to_string(),
                    content: self.text,
                },
                finish_reason: Some(FINISH_REASON_STOP.to_string()),
            }],
            usage: OpenAiUsage {
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens + completion_tokens,
            },
        }
    }
}
