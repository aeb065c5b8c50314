use serde_json::Value;

use crate::protocol::context::{
    parse_data_url, tool_result_texts, ClientBlock, ClientMessage, ClientRole, ConversionContext,
    ToolResultBlock, ToolSpec,
};
use crate::protocol::openai_chat::{OpenAiChatRequest, OpenAiMessage, OpenAiTool, OpenAiToolCall};

/// Turn an `OpenAI` Chat Completions request into a [`ConversionContext`].
///
/// `system`/`developer` messages become the system prompt; consecutive `tool`
/// messages collapse into one user turn carrying every tool result.
#[must_use]
pub fn decode_openai_chat_request(
    request: OpenAiChatRequest,
    conversation_id: Option<String>,
) -> ConversionContext {
    let OpenAiChatRequest {
        model,
        messages: wire_messages,
        tools,
        stream,
        ..
    } = request;

    let mut system_parts: Vec<String> = Vec::new();
    let mut messages: Vec<ClientMessage> = Vec::with_capacity(wire_messages.len());
    let mut last_was_tool = false;

    for msg in wire_messages {
        match msg.role.as_str() {
            "system" | "developer" => {
                let text = content_text(msg.content.as_ref());
                if !text.is_empty() {
                    system_parts.push(text);
                }
                last_was_tool = false;
            }
            "assistant" => {
                messages.push(decode_assistant_message(msg));
                last_was_tool = false;
            }
            "tool" => {
                let block = ClientBlock::ToolResult(ToolResultBlock {
                    tool_use_id: msg.tool_call_id.unwrap_or_default(),
                    content: msg.content.as_ref().map(tool_result_texts).unwrap_or_default(),
                    status: None,
                });
                match messages.last_mut() {
                    Some(prev) if last_was_tool => prev.content.push(block),
                    _ => messages.push(ClientMessage {
                        role: ClientRole::User,
                        content: vec![block],
                    }),
                }
                last_was_tool = true;
            }
            _ => {
                messages.push(ClientMessage {
                    role: ClientRole::User,
                    content: decode_user_content(msg.content.as_ref()),
                });
                last_was_tool = false;
            }
        }
    }

    ConversionContext {
        model,
        system: if system_parts.is_empty() {
            None
        } else {
            Some(system_parts.join("\n\n"))
        },
        messages,
        tools: tools.map(decode_openai_tools).unwrap_or_default(),
        conversation_id,
        stream: stream.unwrap_or(false),
    }
}

/// Plain text of a content value: a string, or the `text` parts of an array joined by newlines.
fn content_text(content: Option<&Value>) -> String {
    match content {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Array(parts)) => parts
            .iter()
            .filter_map(|part| match part {
                Value::String(text) => Some(text.as_str()),
                other => other.get("text").and_then(Value::as_str),
            })
            .collect::<Vec<_>>()
            .join("\n"),
        _ => String::new(),
    }
}

fn decode_user_content(content: Option<&Value>) -> Vec<ClientBlock> {
    match content {
        Some(Value::String(text)) => vec![ClientBlock::Text(text.clone())],
        Some(Value::Array(parts)) => parts
            .iter()
            .filter_map(|part| match part.get("type").and_then(Value::as_str) {
                Some("text") => part
                    .get("text")
                    .and_then(Value::as_str)
                    .map(|text| ClientBlock::Text(text.to_string())),
                Some("image_url") => part
                    .get("image_url")
                    .and_then(|image| image.get("url"))
                    .and_then(Value::as_str)
                    .and_then(parse_data_url)
                    .map(ClientBlock::Image),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn decode_assistant_message(msg: OpenAiMessage) -> ClientMessage {
    let mut content = Vec::new();
    let text = content_text(msg.content.as_ref());
    if !text.is_empty() {
        content.push(ClientBlock::Text(text));
    }
    for call in msg.tool_calls.unwrap_or_default() {
        content.push(decode_tool_call(call));
    }
    ClientMessage {
        role: ClientRole::Assistant,
        content,
    }
}

fn decode_tool_call(call: OpenAiToolCall) -> ClientBlock {
    let arguments = call.function.arguments;
    let input = if arguments.trim().is_empty() {
        Value::Object(serde_json::Map::new())
    } else {
        serde_json::from_str(&arguments).unwrap_or(Value::String(arguments))
    };
    ClientBlock::ToolUse {
        id: call.id,
        name: call.function.name,
        input,
    }
}

fn decode_openai_tools(tools: Vec<OpenAiTool>) -> Vec<ToolSpec> {
    tools
        .into_iter()
        .filter(|tool| !tool.function.name.is_empty())
        .map(|tool| ToolSpec {
            name: tool.function.name,
            description: tool.function.description.unwrap_or_default(),
            input_schema: tool
                .function
                .parameters
                .unwrap_or_else(|| serde_json::json!({"type": "object", "properties": {}})),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode(body: Value) -> ConversionContext {
        let request: OpenAiChatRequest = serde_json::from_value(body).unwrap();
        decode_openai_chat_request(request, Some("conv-9".to_string()))
    }

    #[test]
    fn test_system_and_developer_join_with_blank_line() {
        let ctx = decode(json!({
            "model": "gpt-4o",
            "messages": [
                {"role": "system", "content": "rule one"},
                {"role": "developer", "content": [{"type": "text", "text": "rule two"}]},
                {"role": "user", "content": "hi"}
            ]
        }));
        assert_eq!(ctx.system.as_deref(), Some("rule one\n\nrule two"));
        assert_eq!(ctx.messages, vec![ClientMessage::user_text("hi")]);
        assert_eq!(ctx.conversation_id.as_deref(), Some("conv-9"));
    }

    #[test]
    fn test_tool_calls_and_tool_messages() {
        let ctx = decode(json!({
            "model": "gpt-4o",
            "messages": [
                {"role": "user", "content": "weather in two cities"},
                {"role": "assistant", "content": null, "tool_calls": [
                    {"id": "c1", "type": "function", "function": {"name": "weather", "arguments": "{\"city\":\"Oslo\"}"}},
                    {"id": "c2", "type": "function", "function": {"name": "weather", "arguments": "not json"}}
                ]},
                {"role": "tool", "tool_call_id": "c1", "content": "rain"},
                {"role": "tool", "tool_call_id": "c2", "content": "sun"}
            ]
        }));

        assert_eq!(ctx.messages.len(), 3);
        let assistant = &ctx.messages[1];
        assert_eq!(
            assistant.content[0],
            ClientBlock::ToolUse {
                id: "c1".into(),
                name: "weather".into(),
                input: json!({"city": "Oslo"}),
            }
        );
        assert!(matches!(
            &assistant.content[1],
            ClientBlock::ToolUse { input: Value::String(raw), .. } if raw == "not json"
        ));

        let results = &ctx.messages[2];
        assert_eq!(results.role, ClientRole::User);
        assert_eq!(results.content.len(), 2);
    }

    #[test]
    fn test_image_url_parts() {
        let ctx = decode(json!({
            "messages": [{"role": "user", "content": [
                {"type": "text", "text": "what is this"},
                {"type": "image_url", "image_url": {"url": "data:image/webp;base64,UklG"}},
                {"type": "image_url", "image_url": {"url": "https://example.com/x.png"}}
            ]}]
        }));
        let content = &ctx.messages[0].content;
        assert_eq!(content.len(), 2);
        assert!(matches!(&content[1], ClientBlock::Image(img) if img.media_type == "image/webp"));
    }

    #[test]
    fn test_tools_from_functions() {
        let ctx = decode(json!({
            "messages": [],
            "tools": [{"type": "function", "function": {"name": "lookup", "description": "find", "parameters": {"type": "object"}}}]
        }));
        assert_eq!(ctx.tools[0].name, "lookup");
        assert_eq!(ctx.tools[0].input_schema, json!({"type": "object"}));
    }
}
