use std::sync::LazyLock;
use std::time::Duration;

use tiktoken_rs::CoreBPE;
use tracing::{info, warn};

use crate::protocol::context::{ClientBlock, ConversionContext};

static CL100K: LazyLock<Option<CoreBPE>> = LazyLock::new(|| match tiktoken_rs::cl100k_base() {
    Ok(bpe) => Some(bpe),
    Err(err) => {
        warn!(error = %err, "tokenizer unavailable, token counts will be 0");
        None
    }
});

/// Count cl100k tokens in `text`. Returns 0 when the tokenizer cannot be built.
#[must_use]
pub fn count_tokens(text: &str) -> u64 {
    if text.is_empty() {
        return 0;
    }
    CL100K
        .as_ref()
        .map_or(0, |bpe| bpe.encode_with_special_tokens(text).len() as u64)
}

/// Estimate input tokens for a conversion context.
///
/// Sums the system prompt, message text, tool results, tool-use inputs and
/// tool definitions. Images are not counted.
#[must_use]
pub fn estimate_context_tokens(ctx: &ConversionContext) -> u64 {
    let mut total: u64 = 0;

    if let Some(ref system) = ctx.system {
        total += count_tokens(system);
    }

    for message in &ctx.messages {
        for block in &message.content {
            match block {
                ClientBlock::Text(text) => total += count_tokens(text),
                ClientBlock::ToolResult(result) => {
                    for text in &result.content {
                        total += count_tokens(text);
                    }
                }
                ClientBlock::ToolUse { name, input, .. } => {
                    total += count_tokens(name);
                    total += count_tokens(&input.to_string());
                }
                ClientBlock::Image(_) => {}
            }
        }
    }

    for tool in &ctx.tools {
        total += count_tokens(&tool.name);
        total += count_tokens(&tool.description);
        if let Ok(schema) = serde_json::to_string(&tool.input_schema) {
            total += count_tokens(&schema);
        }
    }

    total
}

/// Log token usage for a completed request at INFO level.
pub fn log_request_usage(model: &str, input_tokens: u64, output_tokens: u64, duration: Duration) {
    info!(
        model = model,
        input_tokens,
        output_tokens,
        total_tokens = input_tokens + output_tokens,
        duration_seconds = duration.as_secs_f64(),
        "request completed"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::context::{ClientMessage, ToolSpec};

    #[test]
    fn test_count_tokens_empty_is_zero() {
        assert_eq!(count_tokens(""), 0);
    }

    #[test]
    fn test_count_tokens_grows_with_text() {
        let short = count_tokens("Hello");
        let long = count_tokens("Hello, world! This sentence has quite a few more tokens in it.");
        assert!(long >= short);
    }

    #[test]
    fn test_estimate_context_includes_every_part() {
        let base = ConversionContext {
            messages: vec![ClientMessage::user_text("hi there")],
            ..Default::default()
        };
        let mut richer = base.clone();
        richer.system = Some("You are terse.".into());
        richer.tools.push(ToolSpec {
            name: "search".into(),
            description: "Search the web".into(),
            input_schema: serde_json::json!({"type": "object"}),
        });
        assert!(estimate_context_tokens(&richer) >= estimate_context_tokens(&base));
    }
}
