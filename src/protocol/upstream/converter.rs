use std::time::SystemTime;

use rustc_hash::{FxHashMap, FxHashSet};

use super::{
    image_format, AssistantResponseMessage, ConversationState, CurrentMessage, HistoryEntry,
    ImageBytes, InputSchema, ToolResultContent, ToolSpecification, UpstreamImage, UpstreamRequest,
    UpstreamTool, UpstreamToolResult, UpstreamToolUse, UserInputMessage, UserInputMessageContext,
    CHAT_TRIGGER_TYPE,
};
use crate::config::UpstreamConfig;
use crate::protocol::context::{ClientBlock, ClientMessage, ClientRole, ConversionContext, ToolSpec};
use crate::protocol::model_map::upstream_model_id;

/// Descriptions longer than this (in chars) are moved into the documentation block.
pub const LONG_DESCRIPTION_THRESHOLD: usize = 10240;
/// Chars of a long description kept inline in the tool spec.
pub const INLINE_DESCRIPTION_CHARS: usize = 10100;
pub const LONG_DESCRIPTION_POINTER: &str =
    "\n\n...(full description in the TOOL DOCUMENTATION section of the user message)";
pub const TOOL_CANCELLED_NOTICE: &str = "Tool use was cancelled by the user";

const STATUS_SUCCESS: &str = "success";
const STATUS_ERROR: &str = "error";

struct ConvertedTools {
    specs: Vec<UpstreamTool>,
    /// (name, untruncated description) for every offloaded tool.
    long_descriptions: Vec<(String, String)>,
}

/// Build the upstream request for `ctx`, stamping the current time into the body.
#[must_use]
pub fn convert_request(ctx: &ConversionContext, upstream: &UpstreamConfig) -> UpstreamRequest {
    convert_request_at(ctx, upstream, SystemTime::now())
}

/// Same as [`convert_request`] with an explicit clock.
#[must_use]
pub fn convert_request_at(
    ctx: &ConversionContext,
    upstream: &UpstreamConfig,
    now: SystemTime,
) -> UpstreamRequest {
    let model_id = upstream_model_id(&ctx.model, upstream);
    let origin = upstream.origin.as_str();
    let tools = convert_tools(&ctx.tools);

    let (earlier, current) = match ctx.messages.split_last() {
        Some((last, rest)) if last.role == ClientRole::User => (rest, Some(last)),
        _ => (ctx.messages.as_slice(), None),
    };

    let mut seen_tool_use_ids = FxHashSet::default();
    let history = convert_history(earlier, model_id, origin, &mut seen_tool_use_ids);

    let mut body = String::new();
    let mut images = Vec::new();
    let mut tool_results = Vec::new();
    if let Some(message) = current {
        let text = message.joined_text();
        images = collect_images(message);
        tool_results = merge_tool_results(message);
        let tool_result_only = !tool_results.is_empty() && text.trim().is_empty();
        if !tool_result_only {
            body = wrap_user_message(&text, now);
        }
    }

    if !tools.long_descriptions.is_empty() {
        body = prepend_section(render_tool_documentation(&tools.long_descriptions), body);
    }
    if let Some(system) = ctx.system.as_deref().filter(|s| !s.trim().is_empty()) {
        if !body.is_empty() {
            body = prepend_section(render_system_prompt(system), body);
        }
    }

    let context = UserInputMessageContext {
        tools: tools.specs,
        tool_results,
    };

    UpstreamRequest {
        conversation_state: ConversationState {
            chat_trigger_type: CHAT_TRIGGER_TYPE.to_string(),
            conversation_id: ctx
                .conversation_id
                .clone()
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            history,
            current_message: CurrentMessage {
                user_input_message: UserInputMessage {
                    content: body,
                    model_id: model_id.to_string(),
                    origin: origin.to_string(),
                    images,
                    user_input_message_context: (!context.is_empty()).then_some(context),
                },
            },
        },
        profile_arn: upstream.profile_arn.clone().filter(|arn| !arn.is_empty()),
    }
}

fn convert_tools(tools: &[ToolSpec]) -> ConvertedTools {
    let mut specs = Vec::with_capacity(tools.len());
    let mut long_descriptions = Vec::new();

    for tool in tools {
        let description = if tool.description.chars().count() > LONG_DESCRIPTION_THRESHOLD {
            long_descriptions.push((tool.name.clone(), tool.description.clone()));
            let mut inline: String = tool.description.chars().take(INLINE_DESCRIPTION_CHARS).collect();
            inline.push_str(LONG_DESCRIPTION_POINTER);
            inline
        } else {
            tool.description.clone()
        };
        specs.push(UpstreamTool {
            tool_specification: ToolSpecification {
                name: tool.name.clone(),
                description,
                input_schema: InputSchema {
                    json: tool.input_schema.clone(),
                },
            },
        });
    }

    ConvertedTools {
        specs,
        long_descriptions,
    }
}

fn convert_history(
    messages: &[ClientMessage],
    model_id: &str,
    origin: &str,
    seen_tool_use_ids: &mut FxHashSet<String>,
) -> Vec<HistoryEntry> {
    let mut history: Vec<HistoryEntry> = Vec::with_capacity(messages.len());

    for message in messages {
        match message.role {
            ClientRole::User => {
                let tool_results = merge_tool_results(message);
                let entry = UserInputMessage {
                    content: message.joined_text(),
                    model_id: model_id.to_string(),
                    origin: origin.to_string(),
                    images: collect_images(message),
                    user_input_message_context: (!tool_results.is_empty()).then(|| {
                        UserInputMessageContext {
                            tools: Vec::new(),
                            tool_results,
                        }
                    }),
                };
                match history.last_mut() {
                    Some(HistoryEntry::UserInputMessage(previous)) => {
                        merge_user_entries(previous, entry);
                    }
                    _ => history.push(HistoryEntry::UserInputMessage(entry)),
                }
            }
            ClientRole::Assistant => {
                let tool_uses = message
                    .content
                    .iter()
                    .filter_map(|block| match block {
                        ClientBlock::ToolUse { id, name, input } => {
                            seen_tool_use_ids.insert(id.clone()).then(|| UpstreamToolUse {
                                tool_use_id: id.clone(),
                                name: name.clone(),
                                input: input.clone(),
                            })
                        }
                        _ => None,
                    })
                    .collect();
                history.push(HistoryEntry::AssistantResponseMessage(
                    AssistantResponseMessage {
                        content: message.joined_text(),
                        tool_uses,
                    },
                ));
            }
        }
    }

    history
}

/// Fold `next` into `target`: texts joined by a blank line, first non-empty fields win.
fn merge_user_entries(target: &mut UserInputMessage, next: UserInputMessage) {
    if target.content.is_empty() {
        target.content = next.content;
    } else if !next.content.is_empty() {
        target.content.push_str("\n\n");
        target.content.push_str(&next.content);
    }
    if target.model_id.is_empty() {
        target.model_id = next.model_id;
    }
    if target.origin.is_empty() {
        target.origin = next.origin;
    }
    let target_has_context = target
        .user_input_message_context
        .as_ref()
        .is_some_and(|ctx| !ctx.is_empty());
    if !target_has_context {
        target.user_input_message_context = next.user_input_message_context;
    }
    target.images.extend(next.images);
}

fn collect_images(message: &ClientMessage) -> Vec<UpstreamImage> {
    message
        .content
        .iter()
        .filter_map(|block| match block {
            ClientBlock::Image(image) => Some(UpstreamImage {
                format: image_format(&image.media_type),
                source: ImageBytes {
                    bytes: image.data.clone(),
                },
            }),
            _ => None,
        })
        .collect()
}

/// Tool results sharing an id become one result, content concatenated in encounter order.
fn merge_tool_results(message: &ClientMessage) -> Vec<UpstreamToolResult> {
    let mut merged: Vec<UpstreamToolResult> = Vec::new();
    let mut index_by_id: FxHashMap<&str, usize> = FxHashMap::default();

    for block in &message.content {
        let ClientBlock::ToolResult(result) = block else {
            continue;
        };
        let content = result
            .content
            .iter()
            .map(|text| ToolResultContent { text: text.clone() });
        let status = result.status.as_deref().unwrap_or(STATUS_SUCCESS);

        if let Some(&index) = index_by_id.get(result.tool_use_id.as_str()) {
            let existing = &mut merged[index];
            existing.content.extend(content);
            if status == STATUS_ERROR {
                existing.status = STATUS_ERROR.to_string();
            }
        } else {
            index_by_id.insert(result.tool_use_id.as_str(), merged.len());
            merged.push(UpstreamToolResult {
                tool_use_id: result.tool_use_id.clone(),
                content: content.collect(),
                status: status.to_string(),
            });
        }
    }

    for result in &mut merged {
        if result.content.iter().all(|c| c.text.trim().is_empty()) {
            result.content = vec![ToolResultContent {
                text: TOOL_CANCELLED_NOTICE.to_string(),
            }];
        }
    }

    merged
}

fn wrap_user_message(text: &str, now: SystemTime) -> String {
    format!(
        "--- CONTEXT ENTRY BEGIN ---\nCurrent time: {}\n--- CONTEXT ENTRY END ---\n\n--- USER MESSAGE BEGIN ---\n{text}\n--- USER MESSAGE END ---",
        httpdate::fmt_http_date(now)
    )
}

fn render_tool_documentation(long_descriptions: &[(String, String)]) -> String {
    let mut out = String::from("--- TOOL DOCUMENTATION BEGIN ---\n");
    for (i, (name, description)) in long_descriptions.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        out.push_str("## Tool: ");
        out.push_str(name);
        out.push('\n');
        out.push_str(description);
        out.push('\n');
    }
    out.push_str("--- TOOL DOCUMENTATION END ---");
    out
}

fn render_system_prompt(system: &str) -> String {
    format!("--- SYSTEM PROMPT BEGIN ---\n{system}\n--- SYSTEM PROMPT END ---")
}

fn prepend_section(section: String, body: String) -> String {
    if body.is_empty() {
        section
    } else {
        let mut out = section;
        out.push_str("\n\n");
        out.push_str(&body);
        out
    }
}
