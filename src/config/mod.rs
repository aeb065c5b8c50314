pub mod validation;

use serde::{Deserialize, Serialize};

use self::validation::validate_config;

/// Why a config file could not be turned into an [`AppConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Validation(String),
}

/// Listener, runtime and outbound HTTP pool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Upstream request timeout in seconds, covering the whole streamed body.
    pub timeout: u64,
    /// Path prefix every route is mounted under; empty for none.
    pub base_path: String,
    pub http_pool_max_idle_per_host: usize,
    /// `0` keeps idle upstream connections forever.
    pub http_pool_idle_timeout_secs: u64,
    pub http_use_env_proxy: bool,
    /// `Some(1)` selects the current-thread runtime.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime_worker_threads: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime_max_blocking_threads: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            timeout: 300,
            base_path: String::new(),
            http_pool_max_idle_per_host: 16,
            http_pool_idle_timeout_secs: 15,
            http_use_env_proxy: false,
            runtime_worker_threads: None,
            runtime_max_blocking_threads: None,
        }
    }
}

/// The conversational backend every request is translated for.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub endpoint: String,
    /// Sent as `profileArn` in the request body when set.
    pub profile_arn: Option<String>,
    pub proxy: Option<String>,
    pub default_model_id: String,
    pub sonnet_4_5_model_id: String,
    pub origin: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://codewhisperer.us-east-1.amazonaws.com/generateAssistantResponse"
                .to_string(),
            profile_arn: None,
            proxy: None,
            default_model_id: "CLAUDE_SONNET_4_20250514_V1_0".to_string(),
            sonnet_4_5_model_id: "CLAUDE_SONNET_4_5_20250929_V1_0".to_string(),
            origin: "AI_EDITOR".to_string(),
        }
    }
}

/// One upstream account whose bearer token is attached to upstream calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountConfig {
    pub name: String,
    #[serde(default)]
    pub access_token: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

const fn enabled_by_default() -> bool {
    true
}

/// Keys clients must present to use the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientAuthConfig {
    pub allowed_keys: Vec<String>,
}

/// Log line rendering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeaturesConfig {
    /// `DEBUG`, `INFO`, `WARNING`, `ERROR`, `CRITICAL` or `DISABLED`.
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            log_level: "INFO".to_string(),
            log_format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub accounts: Vec<AccountConfig>,
    pub client_authentication: ClientAuthConfig,
    #[serde(default)]
    pub features: FeaturesConfig,
}

/// Read `path` and hand it to [`parse_config`].
///
/// # Errors
///
/// Returns [`ConfigError::Io`] when the file cannot be read, otherwise whatever
/// [`parse_config`] reports.
pub fn load_config(path: impl AsRef<std::path::Path>) -> Result<AppConfig, ConfigError> {
    parse_config(&std::fs::read_to_string(path)?)
}

/// Parse and validate configuration from YAML text.
///
/// # Errors
///
/// Returns [`ConfigError::Yaml`] when parsing fails or
/// [`ConfigError::Validation`] when semantic validation fails.
pub fn parse_config(contents: &str) -> Result<AppConfig, ConfigError> {
    let config: AppConfig = serde_yaml::from_str(contents)?;
    validate_config(&config)?;
    Ok(config)
}
