use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use http::{HeaderMap, HeaderValue};

use crate::config::{ServerConfig, UpstreamConfig};
use crate::error::GatewayError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const UPSTREAM_USER_AGENT: &str = "aws-sdk-js/1.0.27 ua/2.1 os/linux lang/js md/nodejs#22.21.1 api/codewhispererstreaming#1.0.27 m/E KiroIDE";
const UPSTREAM_AMZ_USER_AGENT: &str = "aws-sdk-js/1.0.27 KiroIDE";
/// Upstream error bodies longer than this are cut before they reach the client.
const MAX_ERROR_BODY_CHARS: usize = 2048;

/// Upstream response body as it arrives.
pub type UpstreamByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, GatewayError>> + Send>>;

fn build_reqwest_client(
    server: &ServerConfig,
    proxy_url: Option<&str>,
) -> Result<reqwest::Client, GatewayError> {
    let pool_idle_timeout = if server.http_pool_idle_timeout_secs == 0 {
        None
    } else {
        Some(Duration::from_secs(server.http_pool_idle_timeout_secs))
    };

    let mut builder = reqwest::Client::builder()
        .pool_max_idle_per_host(server.http_pool_max_idle_per_host.max(1))
        .pool_idle_timeout(pool_idle_timeout)
        .tcp_nodelay(true)
        .connect_timeout(CONNECT_TIMEOUT)
        .redirect(reqwest::redirect::Policy::none())
        .timeout(Duration::from_secs(server.timeout));

    if let Some(proxy_url) = proxy_url {
        let proxy = reqwest::Proxy::all(proxy_url)
            .map_err(|err| GatewayError::Transport(format!("Invalid proxy URL: {err}")))?;
        builder = builder.no_proxy().proxy(proxy);
    } else if !server.http_use_env_proxy {
        builder = builder.no_proxy();
    }

    builder
        .build()
        .map_err(|err| GatewayError::Transport(format!("Failed to build HTTP client: {err}")))
}

/// Headers for one upstream call authorised by `access_token`.
///
/// # Errors
///
/// Returns [`GatewayError::Account`] when the token cannot be carried in a header.
pub fn build_upstream_headers(access_token: &str) -> Result<HeaderMap, GatewayError> {
    let mut headers = HeaderMap::with_capacity(8);
    let bearer = HeaderValue::from_str(&format!("Bearer {access_token}"))
        .map_err(|_| GatewayError::Account("access token is not a valid header value".to_string()))?;
    headers.insert(http::header::AUTHORIZATION, bearer);
    headers.insert(
        http::header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    headers.insert(
        http::header::USER_AGENT,
        HeaderValue::from_static(UPSTREAM_USER_AGENT),
    );
    headers.insert(
        "x-amz-user-agent",
        HeaderValue::from_static(UPSTREAM_AMZ_USER_AGENT),
    );
    headers.insert(
        "x-amzn-codewhisperer-optout",
        HeaderValue::from_static("true"),
    );
    if let Ok(invocation_id) = HeaderValue::from_str(&uuid::Uuid::new_v4().to_string()) {
        headers.insert("amz-sdk-invocation-id", invocation_id);
    }
    headers.insert(
        "amz-sdk-request",
        HeaderValue::from_static("attempt=1; max=1"),
    );
    Ok(headers)
}

fn truncate_error_body(body: &str) -> String {
    let trimmed = body.trim();
    match trimmed.char_indices().nth(MAX_ERROR_BODY_CHARS) {
        Some((cut, _)) => format!("{}...", &trimmed[..cut]),
        None => trimmed.to_string(),
    }
}

/// HTTP client for the conversational upstream.
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: url::Url,
}

impl HttpTransport {
    /// Build the pooled client from server and upstream config.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Config`] for a bad endpoint and
    /// [`GatewayError::Transport`] when the client cannot be built.
    pub fn new(server: &ServerConfig, upstream: &UpstreamConfig) -> Result<Self, GatewayError> {
        let endpoint = url::Url::parse(&upstream.endpoint)
            .map_err(|err| GatewayError::Config(format!("upstream.endpoint: {err}")))?;
        let client = build_reqwest_client(server, upstream.proxy.as_deref())?;
        Ok(Self { client, endpoint })
    }

    #[must_use]
    pub fn endpoint(&self) -> &url::Url {
        &self.endpoint
    }

    /// POST `body` upstream and hand back the response body as a byte stream.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Transport`] when the request cannot be sent and
    /// [`GatewayError::Upstream`] for a non-2xx status.
    pub async fn send_stream(
        &self,
        body: Bytes,
        access_token: &str,
    ) -> Result<UpstreamByteStream, GatewayError> {
        let headers = build_upstream_headers(access_token)?;
        let response = self
            .client
            .post(self.endpoint.clone())
            .headers(headers)
            .body(body)
            .send()
            .await
            .map_err(|err| GatewayError::Transport(format!("Upstream request failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "upstream rejected request");
            return Err(GatewayError::Upstream {
                status: status.as_u16(),
                message: truncate_error_body(&text),
            });
        }

        let byte_stream = response.bytes_stream().map(|chunk| {
            chunk.map_err(|err| GatewayError::Transport(format!("Upstream stream read failed: {err}")))
        });
        Ok(Box::pin(byte_stream))
    }
}
