use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::{body::Body, http::StatusCode};

use crate::error::{into_axum_response, IngressApi};
use crate::state::AppState;

/// List the advertised client model names in `OpenAI` format.
///
/// Accepts either client key convention.
pub fn handler(State(state): State<Arc<AppState>>, headers: &HeaderMap) -> Response {
    let ingress = if headers.contains_key(http::header::AUTHORIZATION) {
        IngressApi::OpenAiChat
    } else {
        IngressApi::Anthropic
    };
    if let Err(err) = state.authenticate(ingress, headers) {
        return into_axum_response(&err, ingress);
    }

    (
        StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            axum::http::HeaderValue::from_static("application/json"),
        )],
        Body::from(state.models_response_body()),
    )
        .into_response()
}
