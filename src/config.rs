use std::env;

use dotenvy::dotenv;

use crate::constants::{
    DEFAULT_CHUNK_SIZE, DEFAULT_MAX_BODY_BYTES, DEFAULT_RESET_CREDITS, DEFAULT_SEED_CREDITS,
    DEFAULT_UPSTREAM_URL,
};

/// CORS configuration mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorsMode {
    /// Only allow localhost origins (default, for local development)
    LocalhostOnly,
    /// Allow all origins
    AllowAll,
    /// Allow specific origins (comma-separated list)
    AllowList(Vec<String>),
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("GATEWAY_API_KEY must be set")]
    MissingApiKey,

    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub upstream_url: String,
    pub api_key: String,
    pub allowed_ips: Vec<String>,
    pub max_body_bytes: usize,
    pub chunk_size: usize,
    pub seed_credits: Vec<(String, i64)>,
    pub default_credits: i64,
    pub log_retention: Option<usize>,
    pub cors_mode: CorsMode,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build a config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("GATEWAY_API_KEY")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::MissingApiKey)?;

        let host = lookup("GATEWAY_HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let port = parse_or("GATEWAY_PORT", lookup("GATEWAY_PORT"), 8080u16)?;

        let upstream_url = lookup("GATEWAY_UPSTREAM_URL")
            .unwrap_or_else(|| DEFAULT_UPSTREAM_URL.to_string());
        let upstream_url = validate_upstream_url(&upstream_url).map_err(|reason| {
            ConfigError::Invalid {
                var: "GATEWAY_UPSTREAM_URL",
                reason,
            }
        })?;

        let allowed_ips = lookup("GATEWAY_ALLOWED_IPS")
            .map(|v| split_list(&v))
            .unwrap_or_default();

        let max_body_bytes = parse_or(
            "GATEWAY_MAX_BODY_BYTES",
            lookup("GATEWAY_MAX_BODY_BYTES"),
            DEFAULT_MAX_BODY_BYTES,
        )?;

        let chunk_size = parse_or(
            "GATEWAY_CHUNK_SIZE",
            lookup("GATEWAY_CHUNK_SIZE"),
            DEFAULT_CHUNK_SIZE,
        )?;
        if chunk_size == 0 {
            return Err(ConfigError::Invalid {
                var: "GATEWAY_CHUNK_SIZE",
                reason: "must be greater than zero".into(),
            });
        }

        let seed_credits = parse_seed_credits(
            &lookup("GATEWAY_SEED_CREDITS").unwrap_or_else(|| DEFAULT_SEED_CREDITS.to_string()),
        )?;

        let default_credits = parse_or(
            "GATEWAY_DEFAULT_CREDITS",
            lookup("GATEWAY_DEFAULT_CREDITS"),
            DEFAULT_RESET_CREDITS,
        )?;

        let log_retention = match lookup("GATEWAY_LOG_RETENTION") {
            Some(v) if !v.trim().is_empty() => Some(parse_or(
                "GATEWAY_LOG_RETENTION",
                Some(v),
                0usize,
            )?),
            _ => None,
        };

        // "localhost" (default), "*" (allow all), or comma-separated origins
        let cors_mode = match lookup("GATEWAY_CORS_ORIGINS").as_deref() {
            Some("*") => CorsMode::AllowAll,
            Some(origins) if !origins.trim().is_empty() => CorsMode::AllowList(split_list(origins)),
            _ => CorsMode::LocalhostOnly,
        };

        Ok(Self {
            host,
            port,
            upstream_url,
            api_key,
            allowed_ips,
            max_body_bytes,
            chunk_size,
            seed_credits,
            default_credits,
            log_retention,
            cors_mode,
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    var: &'static str,
    value: Option<String>,
    default: T,
) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match value {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            reason: e.to_string(),
        }),
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Check the upstream URL and normalize it without a trailing slash.
pub fn validate_upstream_url(raw: &str) -> Result<String, String> {
    let parsed = url::Url::parse(raw.trim()).map_err(|e| e.to_string())?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(format!("unsupported scheme '{}'", parsed.scheme()));
    }
    if parsed.query().is_some() {
        return Err("must not contain a query string".into());
    }
    Ok(parsed.as_str().trim_end_matches('/').to_string())
}

fn parse_seed_credits(value: &str) -> Result<Vec<(String, i64)>, ConfigError> {
    split_list(value)
        .into_iter()
        .map(|entry| {
            let invalid = |reason: String| ConfigError::Invalid {
                var: "GATEWAY_SEED_CREDITS",
                reason,
            };
            let (name, credits) = entry
                .split_once('=')
                .ok_or_else(|| invalid(format!("expected name=credits, got '{entry}'")))?;
            let name = name.trim();
            if name.is_empty() {
                return Err(invalid(format!("empty user name in '{entry}'")));
            }
            let credits = credits
                .trim()
                .parse::<i64>()
                .map_err(|e| invalid(format!("{name}: {e}")))?;
            Ok((name.to_string(), credits))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_missing_api_key_refuses_to_start() {
        let err = Config::from_lookup(lookup_from(&[])).unwrap_err();
        assert_eq!(err, ConfigError::MissingApiKey);

        let err = Config::from_lookup(lookup_from(&[("GATEWAY_API_KEY", "  ")])).unwrap_err();
        assert_eq!(err, ConfigError::MissingApiKey);
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup_from(&[("GATEWAY_API_KEY", "S")])).unwrap();
        assert_eq!(config.api_key, "S");
        assert_eq!(config.upstream_url, "http://localhost:11434");
        assert!(config.allowed_ips.is_empty());
        assert_eq!(config.max_body_bytes, 10 * 1024 * 1024);
        assert_eq!(config.chunk_size, 1024);
        assert_eq!(config.default_credits, 100);
        assert_eq!(config.log_retention, None);
        assert_eq!(config.cors_mode, CorsMode::LocalhostOnly);
        assert_eq!(
            config.seed_credits,
            vec![("user1".to_string(), 100), ("user2".to_string(), 200)]
        );
    }

    #[test]
    fn test_allow_list_and_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("GATEWAY_API_KEY", "S"),
            ("GATEWAY_ALLOWED_IPS", "10.0.0.1, ::1,"),
            ("GATEWAY_UPSTREAM_URL", "http://backend:9000/"),
            ("GATEWAY_CHUNK_SIZE", "4096"),
            ("GATEWAY_SEED_CREDITS", "alice=5"),
            ("GATEWAY_LOG_RETENTION", "1000"),
            ("GATEWAY_CORS_ORIGINS", "*"),
        ]))
        .unwrap();
        assert_eq!(config.allowed_ips, vec!["10.0.0.1", "::1"]);
        assert_eq!(config.upstream_url, "http://backend:9000");
        assert_eq!(config.chunk_size, 4096);
        assert_eq!(config.seed_credits, vec![("alice".to_string(), 5)]);
        assert_eq!(config.log_retention, Some(1000));
        assert_eq!(config.cors_mode, CorsMode::AllowAll);
    }

    #[test]
    fn test_rejects_bad_values() {
        let err = Config::from_lookup(lookup_from(&[
            ("GATEWAY_API_KEY", "S"),
            ("GATEWAY_CHUNK_SIZE", "0"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "GATEWAY_CHUNK_SIZE", .. }));

        let err = Config::from_lookup(lookup_from(&[
            ("GATEWAY_API_KEY", "S"),
            ("GATEWAY_UPSTREAM_URL", "ftp://backend"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "GATEWAY_UPSTREAM_URL", .. }));

        let err = Config::from_lookup(lookup_from(&[
            ("GATEWAY_API_KEY", "S"),
            ("GATEWAY_SEED_CREDITS", "user1"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "GATEWAY_SEED_CREDITS", .. }));
    }
}
