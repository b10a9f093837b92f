//! Server configuration.
//!
//! Configuration is environment-driven; a small CLI surface in `main`
//! overrides individual values for operator use. Invalid configuration
//! aborts startup with exit code 78 (EX_CONFIG).

use std::time::Duration;

/// Exit code for configuration failures.
pub const EXIT_CONFIG: i32 = 78;

const DEFAULT_FROST_URL: &str = "https://frost.met.no";
const DEFAULT_GAZETTEER_PATH: &str = "/data/places.db";

/// Authentication mode for the HTTP transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthMode {
    #[default]
    None,
    ApiKey,
    Jwt,
}

impl AuthMode {
    fn parse(value: &str) -> Result<Self, ConfigError> {
        match value {
            "none" => Ok(AuthMode::None),
            "api-key" => Ok(AuthMode::ApiKey),
            "jwt" => Ok(AuthMode::Jwt),
            other => Err(ConfigError::InvalidValue {
                key: "NORDVAER_AUTH_MODE",
                value: other.to_string(),
                expected: "one of none, api-key, jwt",
            }),
        }
    }
}

/// Log verbosity, mapped onto the tracing env filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn parse(value: &str) -> Result<Self, ConfigError> {
        match value {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(ConfigError::InvalidValue {
                key: "NORDVAER_LOG_LEVEL",
                value: other.to_string(),
                expected: "one of debug, info, warn, error",
            }),
        }
    }

    pub fn as_filter(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {0}")]
    Missing(&'static str),

    #[error("Invalid value '{value}' for {key}: expected {expected}")]
    InvalidValue {
        key: &'static str,
        value: String,
        expected: &'static str,
    },
}

/// Validated server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub proxy_url: String,
    pub proxy_timeout: Duration,
    pub proxy_connect_timeout: Duration,
    pub frost_url: String,
    pub frost_client_id: Option<String>,
    pub frost_timeout: Duration,
    /// When set the HTTP transport is used; otherwise stdio.
    pub http_port: Option<u16>,
    pub log_level: LogLevel,
    pub auth_mode: AuthMode,
    pub auth_secret: Option<String>,
    pub gazetteer_path: String,
}

impl Config {
    /// Load from process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary lookup (used by tests).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let proxy_url = lookup("NORDVAER_PROXY_URL")
            .ok_or(ConfigError::Missing("NORDVAER_PROXY_URL"))?;
        validate_url("NORDVAER_PROXY_URL", &proxy_url)?;

        let frost_url = lookup("NORDVAER_FROST_URL").unwrap_or_else(|| DEFAULT_FROST_URL.to_string());
        validate_url("NORDVAER_FROST_URL", &frost_url)?;

        let proxy_timeout = parse_millis(&lookup, "NORDVAER_PROXY_TIMEOUT_MS", 5000)?;
        let proxy_connect_timeout =
            parse_millis(&lookup, "NORDVAER_PROXY_CONNECT_TIMEOUT_MS", 2000)?;
        let frost_timeout = parse_millis(&lookup, "NORDVAER_FROST_TIMEOUT_MS", 10_000)?;

        let http_port = match lookup("NORDVAER_HTTP_PORT") {
            None => None,
            Some(raw) => Some(raw.parse::<u16>().map_err(|_| ConfigError::InvalidValue {
                key: "NORDVAER_HTTP_PORT",
                value: raw,
                expected: "a TCP port number",
            })?),
        };

        let log_level = match lookup("NORDVAER_LOG_LEVEL") {
            None => LogLevel::default(),
            Some(raw) => LogLevel::parse(&raw)?,
        };

        let auth_mode = match lookup("NORDVAER_AUTH_MODE") {
            None => AuthMode::default(),
            Some(raw) => AuthMode::parse(&raw)?,
        };
        let auth_secret = lookup("NORDVAER_AUTH_SECRET");
        if auth_mode != AuthMode::None && auth_secret.is_none() {
            return Err(ConfigError::Missing("NORDVAER_AUTH_SECRET"));
        }

        Ok(Config {
            proxy_url,
            proxy_timeout,
            proxy_connect_timeout,
            frost_url,
            frost_client_id: lookup("NORDVAER_FROST_CLIENT_ID"),
            frost_timeout,
            http_port,
            log_level,
            auth_mode,
            auth_secret,
            gazetteer_path: lookup("NORDVAER_GAZETTEER_PATH")
                .unwrap_or_else(|| DEFAULT_GAZETTEER_PATH.to_string()),
        })
    }
}

fn validate_url(key: &'static str, value: &str) -> Result<(), ConfigError> {
    let parsed = reqwest::Url::parse(value).map_err(|_| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
        expected: "an absolute http(s) URL",
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidValue {
            key,
            value: value.to_string(),
            expected: "an absolute http(s) URL",
        });
    }
    Ok(())
}

fn parse_millis(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default_ms: u64,
) -> Result<Duration, ConfigError> {
    match lookup(key) {
        None => Ok(Duration::from_millis(default_ms)),
        Some(raw) => raw
            .parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|_| ConfigError::InvalidValue {
                key,
                value: raw,
                expected: "a duration in milliseconds",
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn minimal_config_applies_defaults() {
        let config =
            Config::from_lookup(env(&[("NORDVAER_PROXY_URL", "http://proxy:8080")])).unwrap();
        assert_eq!(config.proxy_timeout, Duration::from_millis(5000));
        assert_eq!(config.proxy_connect_timeout, Duration::from_millis(2000));
        assert_eq!(config.frost_timeout, Duration::from_millis(10_000));
        assert_eq!(config.frost_url, DEFAULT_FROST_URL);
        assert_eq!(config.http_port, None);
        assert_eq!(config.log_level, LogLevel::Info);
        assert_eq!(config.auth_mode, AuthMode::None);
        assert_eq!(config.gazetteer_path, DEFAULT_GAZETTEER_PATH);
    }

    #[test]
    fn missing_proxy_url_fails() {
        let err = Config::from_lookup(env(&[])).unwrap_err();
        assert!(err.to_string().contains("NORDVAER_PROXY_URL"));
    }

    #[test]
    fn invalid_proxy_url_fails() {
        let err =
            Config::from_lookup(env(&[("NORDVAER_PROXY_URL", "not a url")])).unwrap_err();
        assert!(err.to_string().contains("http(s) URL"));

        let err = Config::from_lookup(env(&[("NORDVAER_PROXY_URL", "ftp://proxy")])).unwrap_err();
        assert!(err.to_string().contains("http(s) URL"));
    }

    #[test]
    fn unknown_enum_values_fail() {
        let err = Config::from_lookup(env(&[
            ("NORDVAER_PROXY_URL", "http://proxy:8080"),
            ("NORDVAER_LOG_LEVEL", "verbose"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("NORDVAER_LOG_LEVEL"));

        let err = Config::from_lookup(env(&[
            ("NORDVAER_PROXY_URL", "http://proxy:8080"),
            ("NORDVAER_AUTH_MODE", "oauth"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("NORDVAER_AUTH_MODE"));
    }

    #[test]
    fn auth_mode_requires_secret() {
        let err = Config::from_lookup(env(&[
            ("NORDVAER_PROXY_URL", "http://proxy:8080"),
            ("NORDVAER_AUTH_MODE", "api-key"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("NORDVAER_AUTH_SECRET"));

        let config = Config::from_lookup(env(&[
            ("NORDVAER_PROXY_URL", "http://proxy:8080"),
            ("NORDVAER_AUTH_MODE", "api-key"),
            ("NORDVAER_AUTH_SECRET", "s3cret"),
        ]))
        .unwrap();
        assert_eq!(config.auth_mode, AuthMode::ApiKey);
    }

    #[test]
    fn http_port_selects_transport() {
        let config = Config::from_lookup(env(&[
            ("NORDVAER_PROXY_URL", "http://proxy:8080"),
            ("NORDVAER_HTTP_PORT", "3000"),
        ]))
        .unwrap();
        assert_eq!(config.http_port, Some(3000));

        let err = Config::from_lookup(env(&[
            ("NORDVAER_PROXY_URL", "http://proxy:8080"),
            ("NORDVAER_HTTP_PORT", "70000"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("port"));
    }
}
