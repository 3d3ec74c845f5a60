use super::{ClientConfig, ConfigError};

/// Validate the client config, returning an error if any rule is violated.
///
/// # Errors
///
/// Returns [`ConfigError::Validation`] when any configuration invariant is violated.
pub fn validate_config(config: &ClientConfig) -> Result<(), ConfigError> {
    validate_base_url(config)?;
    validate_api_key(config)?;
    validate_limits(config)?;
    validate_proxy_url(config.proxy.as_deref())?;
    validate_log_level(config)?;
    Ok(())
}

fn validation_err(msg: impl Into<String>) -> ConfigError {
    ConfigError::Validation(msg.into())
}

fn validate_base_url(config: &ClientConfig) -> Result<(), ConfigError> {
    let parsed = url::Url::parse(config.base_url.trim())
        .map_err(|err| validation_err(format!("base_url is not a valid URL: {err}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(validation_err("base_url must use http:// or https://"));
    }
    Ok(())
}

fn validate_api_key(config: &ClientConfig) -> Result<(), ConfigError> {
    if config.api_key.trim().is_empty() {
        return Err(validation_err("api_key cannot be empty"));
    }
    Ok(())
}

fn validate_limits(config: &ClientConfig) -> Result<(), ConfigError> {
    if config.timeout_secs == 0 {
        return Err(validation_err("timeout_secs must be greater than 0"));
    }
    if config.connect_timeout_secs == 0 {
        return Err(validation_err("connect_timeout_secs must be greater than 0"));
    }
    if config.pool_max_idle_per_host == 0 {
        return Err(validation_err(
            "pool_max_idle_per_host must be greater than 0",
        ));
    }
    if config.channel_capacity == 0 {
        return Err(validation_err("channel_capacity must be greater than 0"));
    }
    Ok(())
}

fn validate_proxy_url(proxy: Option<&str>) -> Result<(), ConfigError> {
    let Some(proxy) = proxy.map(str::trim) else {
        return Ok(());
    };
    if proxy.is_empty() {
        return Err(validation_err("proxy cannot be empty when set"));
    }
    let parsed = url::Url::parse(proxy)
        .map_err(|err| validation_err(format!("proxy is not a valid URL: {err}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(validation_err("proxy must use http:// or https://"));
    }
    Ok(())
}

const VALID_LOG_LEVELS: &[&str] = &[
    "DEBUG", "INFO", "WARNING", "WARN", "ERROR", "CRITICAL", "TRACE", "DISABLED",
];

fn validate_log_level(config: &ClientConfig) -> Result<(), ConfigError> {
    let level = config.log_level.to_uppercase();
    if !VALID_LOG_LEVELS.contains(&level.as_str()) {
        return Err(validation_err(format!(
            "Invalid log_level '{}'. Must be one of: {}",
            config.log_level,
            VALID_LOG_LEVELS.join(", ")
        )));
    }
    Ok(())
}
