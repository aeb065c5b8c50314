use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Json, Response};

use super::common::{conversation_id_header, encode_json_body, parse_json_body, sse_ok_response};
use crate::error::{into_axum_response, GatewayError, IngressApi};
use crate::observability::token_counter::estimate_context_tokens;
use crate::protocol::openai_chat::decoder::decode_openai_chat_request;
use crate::protocol::openai_chat::OpenAiChatRequest;
use crate::protocol::upstream::convert_request;
use crate::state::AppState;
use crate::stream::{collect_openai_response, openai_sse_stream};

const INGRESS: IngressApi = IngressApi::OpenAiChat;

/// `POST /v1/chat/completions`
pub async fn handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: bytes::Bytes,
) -> Response {
    match handler_inner(state, headers, body).await {
        Ok(response) => response,
        Err(err) => {
            tracing::warn!(error = %err, "chat completion request failed");
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

    let request: OpenAiChatRequest = parse_json_body(&body)?;
    let ctx = decode_openai_chat_request(request, conversation_id_header(&headers));
    let prompt_tokens = estimate_context_tokens(&ctx);
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
        "forwarding chat completion request"
    );
    let byte_stream = state
        .transport
        .send_stream(upstream_body, &credential.access_token)
        .await?;

    if ctx.stream {
        let frames = openai_sse_stream(
            byte_stream,
            &ctx.model,
            prompt_tokens,
            &conversation_id,
            started,
        );
        return Ok(sse_ok_response(frames));
    }

    let completion = collect_openai_response(byte_stream, &ctx.model, prompt_tokens, started).await?;
    Ok(Json(completion).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;

    #[tokio::test]
    async fn test_x_api_key_is_not_enough_for_openai() {
        let config = parse_config(
            r"
client_authentication:
  allowed_keys: [client-key]
",
        )
        .unwrap();
        let state = Arc::new(AppState::from_config(config).unwrap());
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", "client-key".parse().unwrap());
        let response = handler(State(state), headers, bytes::Bytes::from_static(b"{}")).await;
        assert_eq!(response.status().as_u16(), 401);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["error"]["type"], "authentication_error");
        assert_eq!(body["error"]["code"], "invalid_api_key");
    }
}
