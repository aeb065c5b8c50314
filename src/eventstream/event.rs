use super::frame::{FramePayload, WireFrame};

/// Semantic event lifted out of one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamEvent {
    pub event_type: String,
    pub content_type: Option<String>,
    pub message_type: Option<String>,
    pub payload: FramePayload,
}

impl UpstreamEvent {
    /// Build a JSON event directly, e.g. the synthetic `initial-response`.
    #[must_use]
    pub fn json(event_type: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            event_type: event_type.into(),
            content_type: Some("application/json".to_string()),
            message_type: Some("event".to_string()),
            payload: FramePayload::Json(payload),
        }
    }

    #[must_use]
    pub fn json_payload(&self) -> Option<&serde_json::Value> {
        self.payload.as_json()
    }
}

/// Pair a frame's `event-type` header with its payload.
///
/// Returns `None` when the frame has no event type or no payload.
#[must_use]
pub fn extract_event(frame: &WireFrame) -> Option<UpstreamEvent> {
    let event_type = frame.header_str("event-type")?;
    if frame.payload.is_absent() {
        return None;
    }
    Some(UpstreamEvent {
        event_type: event_type.to_string(),
        content_type: frame.header_str("content-type").map(str::to_string),
        message_type: frame.header_str("message-type").map(str::to_string),
        payload: frame.payload.clone(),
    })
}
