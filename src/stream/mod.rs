pub mod claude;
pub mod openai;
pub mod pipeline;
pub mod sse;

pub use claude::{ClaudeEvent, ClaudeResponseBuilder, ClaudeStreamState};
pub use openai::{extract_text, OpenAiStreamState};
pub use pipeline::{
    claude_sse_stream, collect_claude_response, collect_openai_response, openai_sse_stream,
    render_sse_stream, ClaudeRenderer, OpenAiRenderer, StreamRenderer,
};
