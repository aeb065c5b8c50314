use std::convert::Infallible;
use std::sync::Arc;

use axum::body::{self, Body};
use axum::extract::State;
use axum::http::{Method, Request, StatusCode};
use axum::response::{IntoResponse, Json, Response};

use crate::api::{chat, health, messages, models};
use crate::error::{format_error, GatewayError, IngressApi};
use crate::state::AppState;

pub const DEFAULT_BODY_LIMIT_BYTES: usize = 2 * 1024 * 1024;

#[derive(Debug, PartialEq, Eq)]
enum RouteMatch {
    Health,
    Models,
    Messages,
    ChatCompletions,
    MethodNotAllowed,
    NotFound,
}

/// Route one request and run its handler. Every outcome is a response.
///
/// # Errors
///
/// Never returns `Err`; the signature matches hyper's `service_fn`.
pub async fn dispatch_request(
    state: Arc<AppState>,
    base_path: Arc<str>,
    request: Request<Body>,
) -> Result<Response, Infallible> {
    let (parts, body) = request.into_parts();
    let route = match_route(&parts.method, parts.uri.path(), &base_path);

    let ingress = match route {
        RouteMatch::Health => return Ok(health::health_handler(State(state)).into_response()),
        RouteMatch::Models => return Ok(models::handler(State(state), &parts.headers)),
        RouteMatch::MethodNotAllowed => return Ok(StatusCode::METHOD_NOT_ALLOWED.into_response()),
        RouteMatch::NotFound => return Ok(StatusCode::NOT_FOUND.into_response()),
        RouteMatch::Messages => IngressApi::Anthropic,
        RouteMatch::ChatCompletions => IngressApi::OpenAiChat,
    };

    let Ok(body) = body::to_bytes(body, DEFAULT_BODY_LIMIT_BYTES).await else {
        return Ok(body_too_large(ingress));
    };
    let response = match ingress {
        IngressApi::Anthropic => messages::handler(State(state), parts.headers, body).await,
        IngressApi::OpenAiChat => chat::handler(State(state), parts.headers, body).await,
    };
    Ok(response)
}

fn body_too_large(ingress: IngressApi) -> Response {
    let err = GatewayError::InvalidRequest("request body exceeds 2 MiB".to_string());
    let (_, body) = format_error(&err, ingress);
    (StatusCode::PAYLOAD_TOO_LARGE, Json(body)).into_response()
}

/// `"gw/"` and `" /gw "` both become `"/gw"`; blank or `"/"` means no prefix.
#[must_use]
pub fn normalize_base_path(base_path: &str) -> String {
    match base_path.trim().trim_matches('/') {
        "" => String::new(),
        trimmed => format!("/{trimmed}"),
    }
}

fn match_route(method: &Method, path: &str, base_path: &str) -> RouteMatch {
    let Some(path) = strip_base_path(path, base_path) else {
        return RouteMatch::NotFound;
    };

    let (route, expected) = match path {
        "/" => (RouteMatch::Health, Method::GET),
        "/v1/models" => (RouteMatch::Models, Method::GET),
        "/v1/messages" => (RouteMatch::Messages, Method::POST),
        "/v1/chat/completions" => (RouteMatch::ChatCompletions, Method::POST),
        _ => return RouteMatch::NotFound,
    };
    if *method == expected {
        route
    } else {
        RouteMatch::MethodNotAllowed
    }
}

fn strip_base_path<'a>(path: &'a str, base_path: &str) -> Option<&'a str> {
    match path.strip_prefix(base_path)? {
        "" => Some("/"),
        rest if base_path.is_empty() || rest.starts_with('/') => Some(rest),
        _ => None,
    }
}
