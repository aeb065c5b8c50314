use rustc_hash::FxHashSet;

use super::{AppConfig, ConfigError};

/// Validate the full application config, returning an error if any rule is violated.
///
/// # Errors
///
/// Returns [`ConfigError::Validation`] when any configuration invariant is violated.
pub fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    validate_server_config(config)?;
    validate_allowed_keys(config)?;
    validate_upstream(config)?;
    validate_accounts(config)?;
    validate_log_level(config)?;
    Ok(())
}

fn validation_err(msg: impl Into<String>) -> ConfigError {
    ConfigError::Validation(msg.into())
}

fn validate_server_config(config: &AppConfig) -> Result<(), ConfigError> {
    let server = &config.server;
    if server.http_pool_max_idle_per_host == 0 {
        return Err(validation_err(
            "server.http_pool_max_idle_per_host must be greater than 0",
        ));
    }
    if server.timeout == 0 {
        return Err(validation_err("server.timeout must be greater than 0"));
    }
    if let Some(worker_threads) = server.runtime_worker_threads {
        if worker_threads == 0 {
            return Err(validation_err(
                "server.runtime_worker_threads must be greater than 0 when set",
            ));
        }
    }
    if let Some(max_blocking_threads) = server.runtime_max_blocking_threads {
        if max_blocking_threads == 0 {
            return Err(validation_err(
                "server.runtime_max_blocking_threads must be greater than 0 when set",
            ));
        }
    }
    Ok(())
}

fn validate_allowed_keys(config: &AppConfig) -> Result<(), ConfigError> {
    if config.client_authentication.allowed_keys.is_empty() {
        return Err(validation_err("allowed_keys cannot be empty"));
    }
    for key in &config.client_authentication.allowed_keys {
        if key.trim().is_empty() {
            return Err(validation_err("allowed_keys contains an empty key"));
        }
    }
    Ok(())
}

fn validate_upstream(config: &AppConfig) -> Result<(), ConfigError> {
    let upstream = &config.upstream;
    validate_http_url("upstream.endpoint", &upstream.endpoint)?;
    if let Some(proxy) = upstream.proxy.as_deref() {
        validate_proxy_url(proxy)?;
    }
    if upstream.default_model_id.trim().is_empty() {
        return Err(validation_err("upstream.default_model_id cannot be empty"));
    }
    if upstream.sonnet_4_5_model_id.trim().is_empty() {
        return Err(validation_err(
            "upstream.sonnet_4_5_model_id cannot be empty",
        ));
    }
    if upstream.origin.trim().is_empty() {
        return Err(validation_err("upstream.origin cannot be empty"));
    }
    Ok(())
}

fn validate_http_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let parsed = url::Url::parse(value)
        .map_err(|err| validation_err(format!("{field} is not a valid URL: {err}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(validation_err(format!(
            "{field} must use http:// or https:// (got '{other}')"
        ))),
    }
}

fn validate_proxy_url(proxy: &str) -> Result<(), ConfigError> {
    let parsed = url::Url::parse(proxy)
        .map_err(|err| validation_err(format!("upstream.proxy is not a valid URL: {err}")))?;
    match parsed.scheme() {
        "http" | "https" | "socks5" | "socks5h" => Ok(()),
        other => Err(validation_err(format!(
            "upstream.proxy has unsupported scheme '{other}'"
        ))),
    }
}

fn validate_accounts(config: &AppConfig) -> Result<(), ConfigError> {
    let mut names = FxHashSet::default();
    for account in &config.accounts {
        if account.name.trim().is_empty() {
            return Err(validation_err("accounts contains an entry without a name"));
        }
        if !names.insert(account.name.as_str()) {
            return Err(validation_err(format!(
                "Duplicate account name '{}'",
                account.name
            )));
        }
    }
    Ok(())
}

const VALID_LOG_LEVELS: &[&str] = &["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL", "DISABLED"];

fn validate_log_level(config: &AppConfig) -> Result<(), ConfigError> {
    let level = config.features.log_level.to_uppercase();
    if VALID_LOG_LEVELS.contains(&level.as_str()) {
        Ok(())
    } else {
        Err(validation_err(format!(
            "features.log_level '{}' must be one of: {}",
            config.features.log_level,
            VALID_LOG_LEVELS.join(", ")
        )))
    }
}
