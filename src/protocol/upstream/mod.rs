//! Request body of the upstream `generateAssistantResponse` call.

pub mod converter;

use serde::{Deserialize, Serialize};

pub use converter::{convert_request, convert_request_at};

pub const CHAT_TRIGGER_TYPE: &str = "MANUAL";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamRequest {
    pub conversation_state: ConversationState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_arn: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationState {
    pub chat_trigger_type: String,
    pub conversation_id: String,
    pub history: Vec<HistoryEntry>,
    pub current_message: CurrentMessage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentMessage {
    pub user_input_message: UserInputMessage,
}

/// One prior turn; serialised as `{"userInputMessage": ...}` or `{"assistantResponseMessage": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HistoryEntry {
    UserInputMessage(UserInputMessage),
    AssistantResponseMessage(AssistantResponseMessage),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInputMessage {
    pub content: String,
    pub model_id: String,
    pub origin: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<UpstreamImage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_input_message_context: Option<UserInputMessageContext>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInputMessageContext {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<UpstreamTool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_results: Vec<UpstreamToolResult>,
}

impl UserInputMessageContext {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty() && self.tool_results.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantResponseMessage {
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_uses: Vec<UpstreamToolUse>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamToolUse {
    pub tool_use_id: String,
    pub name: String,
    pub input: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamTool {
    pub tool_specification: ToolSpecification,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolSpecification {
    pub name: String,
    pub description: String,
    pub input_schema: InputSchema,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputSchema {
    pub json: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamToolResult {
    pub tool_use_id: String,
    pub content: Vec<ToolResultContent>,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResultContent {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamImage {
    pub format: String,
    pub source: ImageBytes,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageBytes {
    pub bytes: String,
}

/// Map a media type such as `image/jpeg` to the upstream format token.
#[must_use]
pub fn image_format(media_type: &str) -> String {
    let lower = media_type.trim().to_ascii_lowercase();
    match lower.as_str() {
        "image/jpeg" | "image/jpg" => "jpeg".to_string(),
        "image/png" => "png".to_string(),
        "image/gif" => "gif".to_string(),
        "image/webp" => "webp".to_string(),
        other => other.rsplit('/').next().unwrap_or(other).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_history_entry_serializes_externally_tagged() {
        let entry = HistoryEntry::AssistantResponseMessage(AssistantResponseMessage {
            content: "ok".into(),
            tool_uses: vec![UpstreamToolUse {
                tool_use_id: "t1".into(),
                name: "search".into(),
                input: json!({"q": 1}),
            }],
        });
        assert_eq!(
            serde_json::to_value(&entry).unwrap(),
            json!({"assistantResponseMessage": {
                "content": "ok",
                "toolUses": [{"toolUseId": "t1", "name": "search", "input": {"q": 1}}]
            }})
        );
    }

    #[test]
    fn test_user_message_skips_empty_optional_parts() {
        let message = UserInputMessage {
            content: "hi".into(),
            model_id: "M".into(),
            origin: "AI_EDITOR".into(),
            images: Vec::new(),
            user_input_message_context: None,
        };
        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            json!({"content": "hi", "modelId": "M", "origin": "AI_EDITOR"})
        );
    }

    #[test]
    fn test_image_format_mapping() {
        assert_eq!(image_format("image/jpeg"), "jpeg");
        assert_eq!(image_format("image/jpg"), "jpeg");
        assert_eq!(image_format("IMAGE/PNG"), "png");
        assert_eq!(image_format("image/heic"), "heic");
    }
}
