use crate::protocol::error_shapes::error_body;

/// Which client protocol a request arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IngressApi {
    Anthropic,
    OpenAiChat,
}

/// Gateway-wide error type.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Config error: {0}")]
    Config(String),
    #[error("Auth error: {0}")]
    Auth(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Account error: {0}")]
    Account(String),
    #[error("Upstream error: status={status}, message={message}")]
    Upstream { status: u16, message: String },
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Frame error: {0}")]
    Frame(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Broad error category for status code selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    InvalidRequest,
    Authentication,
    Permission,
    RateLimit,
    Unavailable,
    ServerError,
    Unknown,
}

/// Map an upstream HTTP status code to an error category.
#[must_use]
pub fn category_from_upstream_status(status: u16) -> ErrorCategory {
    match status {
        400 => ErrorCategory::InvalidRequest,
        401 => ErrorCategory::Authentication,
        403 => ErrorCategory::Permission,
        429 => ErrorCategory::RateLimit,
        500..=599 => ErrorCategory::ServerError,
        _ => ErrorCategory::Unknown,
    }
}

impl GatewayError {
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            GatewayError::InvalidRequest(_) => ErrorCategory::InvalidRequest,
            GatewayError::Auth(_) => ErrorCategory::Authentication,
            GatewayError::Account(_) => ErrorCategory::Unavailable,
            GatewayError::Config(_)
            | GatewayError::Transport(_)
            | GatewayError::Frame(_)
            | GatewayError::Internal(_) => ErrorCategory::ServerError,
            GatewayError::Upstream { status, .. } => category_from_upstream_status(*status),
        }
    }
}

fn http_status_for_category(cat: ErrorCategory) -> http::StatusCode {
    match cat {
        ErrorCategory::InvalidRequest => http::StatusCode::BAD_REQUEST,
        ErrorCategory::Authentication => http::StatusCode::UNAUTHORIZED,
        ErrorCategory::Permission => http::StatusCode::FORBIDDEN,
        ErrorCategory::RateLimit => http::StatusCode::TOO_MANY_REQUESTS,
        ErrorCategory::Unavailable => http::StatusCode::SERVICE_UNAVAILABLE,
        ErrorCategory::ServerError | ErrorCategory::Unknown => {
            http::StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Format an error for a given ingress API, returning (`status_code`, JSON body).
#[must_use]
pub fn format_error(err: &GatewayError, ingress: IngressApi) -> (http::StatusCode, serde_json::Value) {
    let cat = err.category();
    let status = match err {
        // Upstream 5xx are reported as a bad gateway, not our own failure.
        GatewayError::Upstream { status, .. } if *status >= 500 => http::StatusCode::BAD_GATEWAY,
        _ => http_status_for_category(cat),
    };
    (status, error_body(ingress, cat, &err.to_string()))
}

/// Convert a `GatewayError` into an axum response for a specific ingress.
#[must_use]
pub fn into_axum_response(err: &GatewayError, ingress: IngressApi) -> axum::response::Response {
    use axum::response::IntoResponse;
    let (status, body) = format_error(err, ingress);
    (status, axum::Json(body)).into_response()
}

/// Default `IntoResponse` implementation renders the Anthropic error shape.
/// Handlers should call [`into_axum_response`] with their own ingress instead.
impl axum::response::IntoResponse for GatewayError {
    fn into_response(self) -> axum::response::Response {
        into_axum_response(&self, IngressApi::Anthropic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_status_category() {
        assert_eq!(
            category_from_upstream_status(429),
            ErrorCategory::RateLimit
        );
        assert_eq!(
            category_from_upstream_status(503),
            ErrorCategory::ServerError
        );
        assert_eq!(category_from_upstream_status(418), ErrorCategory::Unknown);
    }

    #[test]
    fn test_format_error_anthropic_shape() {
        let err = GatewayError::Auth("Missing API key".to_string());
        let (status, body) = format_error(&err, IngressApi::Anthropic);
        assert_eq!(status, http::StatusCode::UNAUTHORIZED);
        assert_eq!(body["type"], "error");
        assert_eq!(body["error"]["type"], "authentication_error");
    }

    #[test]
    fn test_format_error_openai_shape() {
        let err = GatewayError::Account("no account available".to_string());
        let (status, body) = format_error(&err, IngressApi::OpenAiChat);
        assert_eq!(status, http::StatusCode::SERVICE_UNAVAILABLE);
        assert!(body["error"]["message"]
            .as_str()
            .unwrap()
            .contains("no account available"));
    }

    #[test]
    fn test_upstream_server_error_maps_to_bad_gateway() {
        let err = GatewayError::Upstream {
            status: 502,
            message: "boom".to_string(),
        };
        let (status, _) = format_error(&err, IngressApi::Anthropic);
        assert_eq!(status, http::StatusCode::BAD_GATEWAY);
    }
}
