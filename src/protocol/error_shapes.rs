use serde::Serialize;

use crate::error::{ErrorCategory, IngressApi};

/// Client-facing names for one error category, per client protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ErrorNames {
    pub anthropic_type: &'static str,
    pub openai_type: &'static str,
    pub openai_code: &'static str,
}

pub(crate) const fn error_names(cat: ErrorCategory) -> ErrorNames {
    let (anthropic_type, openai_type, openai_code) = match cat {
        ErrorCategory::InvalidRequest => (
            "invalid_request_error",
            "invalid_request_error",
            "invalid_request",
        ),
        ErrorCategory::Authentication => (
            "authentication_error",
            "authentication_error",
            "invalid_api_key",
        ),
        ErrorCategory::Permission => (
            "authentication_error",
            "permission_error",
            "permission_denied",
        ),
        ErrorCategory::RateLimit => (
            "rate_limit_error",
            "rate_limit_error",
            "rate_limit_exceeded",
        ),
        ErrorCategory::Unavailable => (
            "overloaded_error",
            "service_unavailable",
            "no_account_available",
        ),
        ErrorCategory::ServerError | ErrorCategory::Unknown => {
            ("api_error", "server_error", "server_error")
        }
    };
    ErrorNames {
        anthropic_type,
        openai_type,
        openai_code,
    }
}

#[derive(Serialize)]
struct AnthropicErrorBody<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    error: AnthropicErrorDetail<'a>,
}

#[derive(Serialize)]
struct AnthropicErrorDetail<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    message: &'a str,
}

#[derive(Serialize)]
struct OpenAiErrorBody<'a> {
    error: OpenAiErrorDetail<'a>,
}

#[derive(Serialize)]
struct OpenAiErrorDetail<'a> {
    message: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    code: &'static str,
    param: Option<&'a str>,
}

/// Error body in the shape the given client protocol expects.
#[must_use]
pub(crate) fn error_body(ingress: IngressApi, cat: ErrorCategory, message: &str) -> serde_json::Value {
    let names = error_names(cat);
    let encoded = match ingress {
        IngressApi::Anthropic => serde_json::to_value(AnthropicErrorBody {
            kind: "error",
            error: AnthropicErrorDetail {
                kind: names.anthropic_type,
                message,
            },
        }),
        IngressApi::OpenAiChat => serde_json::to_value(OpenAiErrorBody {
            error: OpenAiErrorDetail {
                message,
                kind: names.openai_type,
                code: names.openai_code,
                param: None,
            },
        }),
    };
    encoded.unwrap_or(serde_json::Value::Null)
}
