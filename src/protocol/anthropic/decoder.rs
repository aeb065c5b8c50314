use serde_json::Value;

use crate::protocol::anthropic::{AnthropicRequest, AnthropicTool};
use crate::protocol::context::{
    tool_result_texts, ClientBlock, ClientMessage, ClientRole, ConversionContext, ImageSource,
    ToolResultBlock, ToolSpec,
};

/// Turn an Anthropic Messages request into a [`ConversionContext`].
///
/// Never fails on shape: unknown blocks are skipped and missing fields default.
#[must_use]
pub fn decode_anthropic_request(
    request: AnthropicRequest,
    conversation_id: Option<String>,
) -> ConversionContext {
    let AnthropicRequest {
        model,
        system,
        messages: wire_messages,
        tools,
        stream,
        ..
    } = request;

    let messages = wire_messages
        .into_iter()
        .map(|msg| ClientMessage {
            role: if msg.role == "assistant" {
                ClientRole::Assistant
            } else {
                ClientRole::User
            },
            content: decode_content_value(&msg.content),
        })
        .collect();

    ConversionContext {
        model,
        system: decode_system_prompt(system.as_ref()),
        messages,
        tools: tools.map(decode_anthropic_tools).unwrap_or_default(),
        conversation_id,
        stream: stream.unwrap_or(false),
    }
}

/// `system` may be a plain string or an array of text blocks.
fn decode_system_prompt(system: Option<&Value>) -> Option<String> {
    match system? {
        Value::String(text) => Some(text.clone()),
        Value::Array(blocks) => {
            let texts: Vec<&str> = blocks
                .iter()
                .filter_map(|block| match block {
                    Value::String(text) => Some(text.as_str()),
                    other => other.get("text").and_then(Value::as_str),
                })
                .collect();
            if texts.is_empty() {
                None
            } else {
                Some(texts.join("\n"))
            }
        }
        _ => None,
    }
}

fn decode_anthropic_tools(tools: Vec<AnthropicTool>) -> Vec<ToolSpec> {
    tools
        .into_iter()
        .filter(|tool| !tool.name.is_empty())
        .map(|tool| ToolSpec {
            name: tool.name,
            description: tool.description.unwrap_or_default(),
            input_schema: if tool.input_schema.is_null() {
                serde_json::json!({"type": "object", "properties": {}})
            } else {
                tool.input_schema
            },
        })
        .collect()
}

fn str_field<'a>(value: &'a Value, key: &str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or_default()
}

/// Decode a content value (string or array of blocks) into client blocks.
fn decode_content_value(content: &Value) -> Vec<ClientBlock> {
    match content {
        Value::String(text) => vec![ClientBlock::Text(text.clone())],
        Value::Array(blocks) => blocks.iter().filter_map(decode_content_block).collect(),
        _ => Vec::new(),
    }
}

fn decode_content_block(block: &Value) -> Option<ClientBlock> {
    match block.get("type").and_then(Value::as_str).unwrap_or("text") {
        "text" => Some(ClientBlock::Text(str_field(block, "text").to_string())),
        "image" => {
            let source = block.get("source")?;
            if source.get("type").and_then(Value::as_str) != Some("base64") {
                return None;
            }
            Some(ClientBlock::Image(ImageSource {
                media_type: str_field(source, "media_type").to_string(),
                data: str_field(source, "data").to_string(),
            }))
        }
        "tool_use" => Some(ClientBlock::ToolUse {
            id: str_field(block, "id").to_string(),
            name: str_field(block, "name").to_string(),
            input: block
                .get("input")
                .cloned()
                .unwrap_or_else(|| Value::Object(serde_json::Map::new())),
        }),
        "tool_result" => {
            let is_error = block
                .get("is_error")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            let status = block
                .get("status")
                .and_then(Value::as_str)
                .map(str::to_string)
                .or_else(|| is_error.then(|| "error".to_string()));
            Some(ClientBlock::ToolResult(ToolResultBlock {
                tool_use_id: str_field(block, "tool_use_id").to_string(),
                content: block.get("content").map(tool_result_texts).unwrap_or_default(),
                status,
            }))
        }
        _ => None,
    }
}
