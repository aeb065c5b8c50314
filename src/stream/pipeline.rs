//! Upstream bytes to client output.
//!
//! `bytes -> frame_stream -> extract_event -> state machine -> rendered frames`,
//! pulled lazily by the response body.

use std::collections::VecDeque;
use std::time::Instant;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use serde_json::json;
use tracing::warn;

use super::claude::{ClaudeEvent, ClaudeResponseBuilder, ClaudeStreamState, EVENT_INITIAL_RESPONSE};
use super::openai::OpenAiStreamState;
use super::sse;
use crate::error::GatewayError;
use crate::eventstream::{extract_event, frame_stream, UpstreamEvent};
use crate::observability::log_request_complete;
use crate::observability::token_counter::count_tokens;
use crate::protocol::anthropic::AnthropicResponse;
use crate::protocol::error_shapes::error_names;
use crate::protocol::openai_chat::OpenAiChatResponse;

/// Synthetic first event so `message_start` carries the request's conversation id.
fn initial_response_event(conversation_id: &str) -> UpstreamEvent {
    UpstreamEvent::json(
        EVENT_INITIAL_RESPONSE,
        json!({ "conversationId": conversation_id }),
    )
}

/// Turns upstream events into protocol-specific output frames.
pub trait StreamRenderer: Send + 'static {
    fn render_event(&mut self, event: &UpstreamEvent, out: &mut VecDeque<Bytes>);
    fn render_finish(&mut self, out: &mut VecDeque<Bytes>);
    /// Emit the terminal error frame. No end marker follows.
    fn render_error(&mut self, err: &GatewayError, out: &mut VecDeque<Bytes>);
    fn model(&self) -> &str;
    /// `(input_tokens, output_tokens)` for the completion log line.
    fn usage(&self) -> (u64, u64);
}

// ---------------------------------------------------------------------------
// Claude
// ---------------------------------------------------------------------------

pub struct ClaudeRenderer {
    state: ClaudeStreamState,
    scratch: Vec<ClaudeEvent>,
}

impl ClaudeRenderer {
    #[must_use]
    pub fn new(model: impl Into<String>, input_tokens: u64) -> Self {
        Self {
            state: ClaudeStreamState::new(model, input_tokens),
            scratch: Vec::with_capacity(8),
        }
    }

    fn flush(&mut self, out: &mut VecDeque<Bytes>) {
        out.extend(self.scratch.drain(..).map(|event| Bytes::from(event.render())));
    }
}

impl StreamRenderer for ClaudeRenderer {
    fn render_event(&mut self, event: &UpstreamEvent, out: &mut VecDeque<Bytes>) {
        self.state.handle_into(event, &mut self.scratch);
        self.flush(out);
    }

    fn render_finish(&mut self, out: &mut VecDeque<Bytes>) {
        self.state.finish_into(&mut self.scratch);
        self.flush(out);
    }

    fn render_error(&mut self, err: &GatewayError, out: &mut VecDeque<Bytes>) {
        out.push_back(Bytes::from(sse::anthropic_error_frame(
            error_names(err.category()).anthropic_type,
            &err.to_string(),
        )));
    }

    fn model(&self) -> &str {
        self.state.model()
    }

    fn usage(&self) -> (u64, u64) {
        (self.state.input_tokens(), self.state.output_tokens())
    }
}

// ---------------------------------------------------------------------------
// OpenAI
// ---------------------------------------------------------------------------

pub struct OpenAiRenderer {
    state: OpenAiStreamState,
    prompt_tokens: u64,
    scratch: Vec<String>,
}

impl OpenAiRenderer {
    #[must_use]
    pub fn new(model: impl Into<String>, prompt_tokens: u64) -> Self {
        Self {
            state: OpenAiStreamState::new(model),
            prompt_tokens,
            scratch: Vec::with_capacity(4),
        }
    }

    fn flush(&mut self, out: &mut VecDeque<Bytes>) {
        out.extend(self.scratch.drain(..).map(Bytes::from));
    }
}

impl StreamRenderer for OpenAiRenderer {
    fn render_event(&mut self, event: &UpstreamEvent, out: &mut VecDeque<Bytes>) {
        self.state.handle_into(event, &mut self.scratch);
        self.flush(out);
    }

    fn render_finish(&mut self, out: &mut VecDeque<Bytes>) {
        self.state.finish_into(&mut self.scratch);
        self.flush(out);
    }

    fn render_error(&mut self, err: &GatewayError, out: &mut VecDeque<Bytes>) {
        out.push_back(Bytes::from(sse::openai_error_frame(
            error_names(err.category()).openai_type,
            &err.to_string(),
        )));
    }

    fn model(&self) -> &str {
        self.state.model()
    }

    fn usage(&self) -> (u64, u64) {
        (self.prompt_tokens, count_tokens(self.state.text()))
    }
}

// ---------------------------------------------------------------------------
// Streaming
// ---------------------------------------------------------------------------

fn log_completion<R: StreamRenderer>(renderer: &R, started: Instant) {
    let (input_tokens, output_tokens) = renderer.usage();
    log_request_complete(renderer.model(), input_tokens, output_tokens, started);
}

/// Render an upstream byte stream as client SSE frames.
///
/// A mid-stream failure yields one error frame and ends the stream without
/// the normal end-of-message frames.
pub fn render_sse_stream<S, R>(
    byte_stream: S,
    mut renderer: R,
    conversation_id: &str,
    started: Instant,
) -> impl Stream<Item = Bytes> + Send
where
    S: Stream<Item = Result<Bytes, GatewayError>> + Send + 'static,
    R: StreamRenderer,
{
    let mut pending = VecDeque::with_capacity(8);
    renderer.render_event(&initial_response_event(conversation_id), &mut pending);

    futures_util::stream::unfold(
        (Box::pin(frame_stream(byte_stream)), renderer, pending, false),
        move |(mut frames, mut renderer, mut pending, mut done)| async move {
            loop {
                if let Some(chunk) = pending.pop_front() {
                    return Some((chunk, (frames, renderer, pending, done)));
                }
                if done {
                    return None;
                }
                match frames.next().await {
                    Some(Ok(frame)) => {
                        if let Some(event) = extract_event(&frame) {
                            renderer.render_event(&event, &mut pending);
                        }
                    }
                    Some(Err(err)) => {
                        warn!(error = %err, model = renderer.model(), "upstream stream aborted");
                        renderer.render_error(&err, &mut pending);
                        log_completion(&renderer, started);
                        done = true;
                    }
                    None => {
                        renderer.render_finish(&mut pending);
                        log_completion(&renderer, started);
                        done = true;
                    }
                }
            }
        },
    )
}

/// Claude Messages SSE stream.
pub fn claude_sse_stream<S>(
    byte_stream: S,
    model: &str,
    input_tokens: u64,
    conversation_id: &str,
    started: Instant,
) -> impl Stream<Item = Bytes> + Send
where
    S: Stream<Item = Result<Bytes, GatewayError>> + Send + 'static,
{
    render_sse_stream(
        byte_stream,
        ClaudeRenderer::new(model, input_tokens),
        conversation_id,
        started,
    )
}

/// `OpenAI` chat completion chunk stream.
pub fn openai_sse_stream<S>(
    byte_stream: S,
    model: &str,
    prompt_tokens: u64,
    conversation_id: &str,
    started: Instant,
) -> impl Stream<Item = Bytes> + Send
where
    S: Stream<Item = Result<Bytes, GatewayError>> + Send + 'static,
{
    render_sse_stream(
        byte_stream,
        OpenAiRenderer::new(model, prompt_tokens),
        conversation_id,
        started,
    )
}

// ---------------------------------------------------------------------------
// Non-streaming
// ---------------------------------------------------------------------------

/// Drain the upstream and fold it into one Messages response.
///
/// # Errors
///
/// Returns the first transport or framing error.
pub async fn collect_claude_response<S>(
    byte_stream: S,
    model: &str,
    input_tokens: u64,
    conversation_id: &str,
    started: Instant,
) -> Result<AnthropicResponse, GatewayError>
where
    S: Stream<Item = Result<Bytes, GatewayError>> + Send + 'static,
{
    let mut state = ClaudeStreamState::new(model, input_tokens);
    let mut builder = ClaudeResponseBuilder::new();
    let mut scratch = Vec::with_capacity(8);
    state.handle_into(&initial_response_event(conversation_id), &mut scratch);

    let mut frames = Box::pin(frame_stream(byte_stream));
    while let Some(frame) = frames.next().await {
        if let Some(event) = extract_event(&frame?) {
            state.handle_into(&event, &mut scratch);
        }
        for event in scratch.drain(..) {
            builder.push(&event);
        }
    }
    state.finish_into(&mut scratch);
    for event in scratch.drain(..) {
        builder.push(&event);
    }

    log_request_complete(model, state.input_tokens(), state.output_tokens(), started);
    Ok(builder.build())
}

/// Drain the upstream and build one `chat.completion` object.
///
/// # Errors
///
/// Returns the first transport or framing error.
pub async fn collect_openai_response<S>(
    byte_stream: S,
    model: &str,
    prompt_tokens: u64,
    started: Instant,
) -> Result<OpenAiChatResponse, GatewayError>
where
    S: Stream<Item = Result<Bytes, GatewayError>> + Send + 'static,
{
    let mut state = OpenAiStreamState::new(model);
    let mut sink = Vec::new();

    let mut frames = Box::pin(frame_stream(byte_stream));
    while let Some(frame) = frames.next().await {
        if let Some(event) = extract_event(&frame?) {
            state.handle_into(&event, &mut sink);
            sink.clear();
        }
    }

    let response = state.into_response(prompt_tokens);
    log_request_complete(
        model,
        prompt_tokens,
        response.usage.completion_tokens,
        started,
    );
    Ok(response)
}
