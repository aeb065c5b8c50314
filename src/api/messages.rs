use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Json, Response};

use super::common::{conversation_id_header, encode_json_body, parse_json_body, sse_ok_response};
use crate::error::{into_axum_response, GatewayError, IngressApi};
use crate::observability::token_counter::estimate_context_tokens;
use crate::protocol::anthropic::decoder::decode_anthropic_request;
use crate::protocol::anthropic::AnthropicRequest;
use crate::protocol::upstream::convert_request;
use crate::state::AppState;
use crate::stream::{claude_sse_stream, collect_claude_response};

const INGRESS: IngressApi = IngressApi::Anthropic;

/// `POST /v1/messages`
pub async fn handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: bytes::Bytes,
) -> Response {
    match handler_inner(state, headers, body).await {
        Ok(response) => response,
        Err(err) => {
            tracing::warn!(error = %err, "messages request failed");
            into_axum_response(&err, INGRESS)
        }
    }
}

async fn handler_inner(
    state: Arc<AppState>,
    headers: HeaderMap,
    body: bytes::Bytes,
) -> Result<Response, GatewayError> {
    let started = Instant::now();
    state.authenticate(INGRESS, &headers)?;

    let request: AnthropicRequest = parse_json_body(&body)?;
    let ctx = decode_anthropic_request(request, conversation_id_header(&headers));
    let input_tokens = estimate_context_tokens(&ctx);
    let upstream_request = convert_request(&ctx, &state.config.upstream);
    let conversation_id = upstream_request
        .conversation_state
        .conversation_id
        .clone();
    let upstream_body = encode_json_body(&upstream_request)?;

    let credential = state.acquire_credential()?;
    tracing::debug!(
        model = %ctx.model,
        account = %credential.account_name,
        conversation_id = %conversation_id,
        stream = ctx.stream,
        "forwarding messages request"
    );
    let byte_stream = state
        .transport
        .send_stream(upstream_body, &credential.access_token)
        .await?;

    if ctx.stream {
        let frames = claude_sse_stream(
            byte_stream,
            &ctx.model,
            input_tokens,
            &conversation_id,
            started,
        );
        return Ok(sse_ok_response(frames));
    }

    let message = collect_claude_response(
        byte_stream,
        &ctx.model,
        input_tokens,
        &conversation_id,
        started,
    )
    .await?;
    Ok(Json(message).into_response())
}
