use crate::config::UpstreamConfig;

/// Client model names that select the 4.5 upstream model.
const SONNET_4_5_FAMILY: &[&str] = &["claude-sonnet-4-5", "claude-sonnet-4.5"];

/// Model names listed by `GET /v1/models`.
pub const ADVERTISED_MODELS: &[&str] = &[
    "claude-sonnet-4-5",
    "claude-sonnet-4-5-20250929",
    "claude-sonnet-4-20250514",
];

/// `true` when `model` equals or starts with a 4.5 family token, ignoring case.
#[must_use]
pub fn is_sonnet_4_5(model: &str) -> bool {
    let model = model.trim().to_ascii_lowercase();
    SONNET_4_5_FAMILY
        .iter()
        .any(|token| model.starts_with(token))
}

/// Resolve a client model name to the upstream model id.
#[must_use]
pub fn upstream_model_id<'a>(model: &str, upstream: &'a UpstreamConfig) -> &'a str {
    if is_sonnet_4_5(model) {
        &upstream.sonnet_4_5_model_id
    } else {
        &upstream.default_model_id
    }
}
