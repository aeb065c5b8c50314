//! Protocol-neutral conversation handed to the upstream converter.

use serde_json::Value;

/// Author of one client turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientRole {
    User,
    Assistant,
}

/// Base64 image carried inline by a client turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSource {
    pub media_type: String,
    pub data: String,
}

/// Result of one tool invocation, as sent back by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolResultBlock {
    pub tool_use_id: String,
    /// Text pieces in order; non-text pieces are rendered as JSON text.
    pub content: Vec<String>,
    /// Explicit status, if the client sent one (`success` / `error`).
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClientBlock {
    Text(String),
    Image(ImageSource),
    ToolUse { id: String, name: String, input: Value },
    ToolResult(ToolResultBlock),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClientMessage {
    pub role: ClientRole,
    pub content: Vec<ClientBlock>,
}

impl ClientMessage {
    #[must_use]
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: ClientRole::User,
            content: vec![ClientBlock::Text(text.into())],
        }
    }

    #[must_use]
    pub fn assistant_text(text: impl Into<String>) -> Self {
        Self {
            role: ClientRole::Assistant,
            content: vec![ClientBlock::Text(text.into())],
        }
    }

    /// Text blocks joined with a newline, in order.
    #[must_use]
    pub fn joined_text(&self) -> String {
        let mut out = String::new();
        for block in &self.content {
            if let ClientBlock::Text(text) = block {
                if !out.is_empty() {
                    out.push('\n');
                }
                out.push_str(text);
            }
        }
        out
    }
}

/// A tool the client offers the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// Everything the converter needs from one client request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversionContext {
    pub model: String,
    pub system: Option<String>,
    pub messages: Vec<ClientMessage>,
    pub tools: Vec<ToolSpec>,
    pub conversation_id: Option<String>,
    pub stream: bool,
}

/// Flatten a tool-result `content` value (string, block array, or anything else) into text pieces.
#[must_use]
pub fn tool_result_texts(content: &Value) -> Vec<String> {
    match content {
        Value::Null => Vec::new(),
        Value::String(text) => vec![text.clone()],
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(text) => Some(text.clone()),
                Value::Object(map) => {
                    if let Some(text) = map.get("text").and_then(Value::as_str) {
                        Some(text.to_string())
                    } else if map.get("type").and_then(Value::as_str) == Some("image") {
                        None
                    } else {
                        Some(item.to_string())
                    }
                }
                Value::Null => None,
                other => Some(other.to_string()),
            })
            .collect(),
        other => vec![other.to_string()],
    }
}

/// Split a `data:<media>;base64,<data>` URL into an image source.
#[must_use]
pub fn parse_data_url(url: &str) -> Option<ImageSource> {
    let rest = url.strip_prefix("data:")?;
    let (header, data) = rest.split_once(',')?;
    let mut parts = header.split(';');
    let media_type = parts.next().unwrap_or_default();
    if !parts.any(|p| p.eq_ignore_ascii_case("base64")) {
        return None;
    }
    Some(ImageSource {
        media_type: if media_type.is_empty() {
            "image/png".to_string()
        } else {
            media_type.to_string()
        },
        data: data.to_string(),
    })
}
