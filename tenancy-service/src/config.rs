//! Service configuration.
//!
//! Configuration is built once by the host at startup, either from defaults,
//! deserialized from its own config source, or from environment variables.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::retry::RetryConfig;

/// Header carrying the tenant selector when nothing else is configured.
pub const DEFAULT_TENANT_HEADER: &str = "X-Tenant-ID";

/// Longest accepted invitation lifetime (one year).
pub const MAX_INVITE_TTL_HOURS: i64 = 24 * 365;

/// Longest accepted fallback call timeout (one day).
pub const MAX_CALL_TIMEOUT_SECS: u64 = 24 * 60 * 60;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Invalid configuration value.
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue {
        /// Configuration key.
        key: String,
        /// Error message.
        message: String,
    },
}

impl ConfigError {
    fn invalid(key: &str, message: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            key: key.to_string(),
            message: message.into(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable multi-line output
    #[default]
    Pretty,
    /// One JSON object per line
    Json,
}

impl LogFormat {
    /// Parse from string, case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pretty" => Some(Self::Pretty),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`
    pub level: String,

    /// Output format
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Tenancy service configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenancyConfig {
    /// Minimum organization name length, in characters, after trimming.
    pub min_org_name_len: usize,

    /// Invitation lifetime in hours.
    pub invite_ttl_hours: i64,

    /// Base URL of the invitation acceptance page; the token is appended as
    /// the `token` query parameter.
    pub accept_url_base: String,

    /// Request header carrying the tenant selector.
    pub tenant_header: String,

    /// Timeout applied to calls that arrive without a deadline.
    pub call_timeout_secs: u64,

    /// Retry policy for the retrying emailer adapter.
    pub email_retry: RetryConfig,

    /// Logging setup.
    pub logging: LoggingConfig,
}

impl Default for TenancyConfig {
    /// Returns default configuration suitable for local development.
    fn default() -> Self {
        Self {
            min_org_name_len: 3,
            invite_ttl_hours: tenancy_org::DEFAULT_INVITE_TTL_HOURS,
            accept_url_base: "https://localhost/accept-invite".to_string(),
            tenant_header: DEFAULT_TENANT_HEADER.to_string(),
            call_timeout_secs: 30,
            email_retry: RetryConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl TenancyConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `TENANCY_MIN_ORG_NAME_LEN`: Minimum organization name length (default: 3)
    /// - `TENANCY_INVITE_TTL_HOURS`: Invitation lifetime (default: 24)
    /// - `TENANCY_ACCEPT_URL_BASE`: Acceptance page URL (default: https://localhost/accept-invite)
    /// - `TENANCY_TENANT_HEADER`: Tenant selector header (default: X-Tenant-ID)
    /// - `TENANCY_CALL_TIMEOUT_SECS`: Fallback call deadline (default: 30)
    /// - `TENANCY_EMAIL_MAX_ATTEMPTS`: Email send attempts (default: 3)
    /// - `TENANCY_EMAIL_INITIAL_DELAY_MS`: First email retry delay (default: 100)
    /// - `TENANCY_LOG_LEVEL`: Log filter (default: info)
    /// - `TENANCY_LOG_FORMAT`: `pretty` or `json` (default: pretty)
    ///
    /// Unparseable values fall back to the default; call [`validate`](Self::validate)
    /// afterwards to reject out-of-range ones.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let default = Self::default();

        Self {
            min_org_name_len: parsed(&lookup, "TENANCY_MIN_ORG_NAME_LEN")
                .unwrap_or(default.min_org_name_len),
            invite_ttl_hours: parsed(&lookup, "TENANCY_INVITE_TTL_HOURS")
                .unwrap_or(default.invite_ttl_hours),
            accept_url_base: lookup("TENANCY_ACCEPT_URL_BASE").unwrap_or(default.accept_url_base),
            tenant_header: lookup("TENANCY_TENANT_HEADER").unwrap_or(default.tenant_header),
            call_timeout_secs: parsed(&lookup, "TENANCY_CALL_TIMEOUT_SECS")
                .unwrap_or(default.call_timeout_secs),
            email_retry: RetryConfig {
                max_attempts: parsed(&lookup, "TENANCY_EMAIL_MAX_ATTEMPTS")
                    .unwrap_or(default.email_retry.max_attempts),
                initial_delay: parsed(&lookup, "TENANCY_EMAIL_INITIAL_DELAY_MS")
                    .map(Duration::from_millis)
                    .unwrap_or(default.email_retry.initial_delay),
                ..default.email_retry
            },
            logging: LoggingConfig {
                level: lookup("TENANCY_LOG_LEVEL").unwrap_or(default.logging.level),
                format: lookup("TENANCY_LOG_FORMAT")
                    .and_then(|s| LogFormat::parse(&s))
                    .unwrap_or(default.logging.format),
            },
        }
    }

    /// Invitation lifetime.
    ///
    /// Values outside `1..=MAX_INVITE_TTL_HOURS` fall back to the default
    /// lifetime; [`validate`](Self::validate) reports them.
    pub fn invite_ttl(&self) -> chrono::Duration {
        let hours = if (1..=MAX_INVITE_TTL_HOURS).contains(&self.invite_ttl_hours) {
            self.invite_ttl_hours
        } else {
            tenancy_org::DEFAULT_INVITE_TTL_HOURS
        };
        chrono::Duration::try_hours(hours)
            .unwrap_or_else(|| chrono::Duration::hours(tenancy_org::DEFAULT_INVITE_TTL_HOURS))
    }

    /// Fallback call deadline, capped at [`MAX_CALL_TIMEOUT_SECS`].
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs.min(MAX_CALL_TIMEOUT_SECS))
    }

    /// Reject values the service cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_org_name_len == 0 {
            return Err(ConfigError::invalid("min_org_name_len", "must be at least 1"));
        }
        if !(1..=MAX_INVITE_TTL_HOURS).contains(&self.invite_ttl_hours) {
            return Err(ConfigError::invalid(
                "invite_ttl_hours",
                format!("must be between 1 and {}", MAX_INVITE_TTL_HOURS),
            ));
        }
        if !(1..=MAX_CALL_TIMEOUT_SECS).contains(&self.call_timeout_secs) {
            return Err(ConfigError::invalid(
                "call_timeout_secs",
                format!("must be between 1 and {}", MAX_CALL_TIMEOUT_SECS),
            ));
        }
        if self.email_retry.max_attempts == 0 {
            return Err(ConfigError::invalid("email_retry.max_attempts", "must be at least 1"));
        }
        if http::HeaderName::try_from(self.tenant_header.as_str()).is_err() {
            return Err(ConfigError::invalid(
                "tenant_header",
                format!("'{}' is not a valid header name", self.tenant_header),
            ));
        }
        if !self.accept_url_base.starts_with("https://")
            && !self.accept_url_base.starts_with("http://")
        {
            return Err(ConfigError::invalid("accept_url_base", "must be an http(s) URL"));
        }
        Ok(())
    }
}

fn parsed<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key).and_then(|value| value.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = TenancyConfig::default();
        assert_eq!(config.min_org_name_len, 3);
        assert_eq!(config.invite_ttl(), chrono::Duration::hours(24));
        assert_eq!(config.tenant_header, "X-Tenant-ID");
        assert_eq!(config.call_timeout(), Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_lookup_overrides() {
        let vars: HashMap<&str, &str> = [
            ("TENANCY_INVITE_TTL_HOURS", "48"),
            ("TENANCY_TENANT_HEADER", "X-Org-ID"),
            ("TENANCY_EMAIL_INITIAL_DELAY_MS", "250"),
            ("TENANCY_LOG_FORMAT", "JSON"),
            ("TENANCY_CALL_TIMEOUT_SECS", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let config = TenancyConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.invite_ttl_hours, 48);
        assert_eq!(config.tenant_header, "X-Org-ID");
        assert_eq!(config.email_retry.initial_delay, Duration::from_millis(250));
        assert_eq!(config.email_retry.max_attempts, 3);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.call_timeout_secs, 30);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = TenancyConfig {
            invite_ttl_hours: 0,
            ..TenancyConfig::default()
        };
        assert!(config.validate().is_err());

        let config = TenancyConfig {
            tenant_header: "bad header".to_string(),
            ..TenancyConfig::default()
        };
        assert!(config.validate().is_err());

        let config = TenancyConfig {
            accept_url_base: "ftp://example.com".to_string(),
            ..TenancyConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_lookup_parses_every_numeric_field() {
        let vars: HashMap<&str, &str> = [
            ("TENANCY_MIN_ORG_NAME_LEN", "5"),
            ("TENANCY_INVITE_TTL_HOURS", "72"),
            ("TENANCY_CALL_TIMEOUT_SECS", "10"),
            ("TENANCY_EMAIL_MAX_ATTEMPTS", "7"),
            ("TENANCY_ACCEPT_URL_BASE", "https://app.example.com/join"),
        ]
        .into_iter()
        .collect();

        let config = TenancyConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.min_org_name_len, 5);
        assert_eq!(config.invite_ttl(), chrono::Duration::hours(72));
        assert_eq!(config.call_timeout(), Duration::from_secs(10));
        assert_eq!(config.email_retry.max_attempts, 7);
        assert_eq!(config.accept_url_base, "https://app.example.com/join");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_out_of_range_durations() {
        let max_ttl = i64::MAX.to_string();
        let max_timeout = u64::MAX.to_string();
        let vars: HashMap<&str, &str> = [
            ("TENANCY_INVITE_TTL_HOURS", max_ttl.as_str()),
            ("TENANCY_CALL_TIMEOUT_SECS", max_timeout.as_str()),
        ]
        .into_iter()
        .collect();

        let config = TenancyConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string()));

        assert!(config.validate().is_err());
        assert_eq!(config.invite_ttl(), chrono::Duration::hours(24));
        assert_eq!(config.call_timeout(), Duration::from_secs(MAX_CALL_TIMEOUT_SECS));

        let config = TenancyConfig {
            call_timeout_secs: MAX_CALL_TIMEOUT_SECS + 1,
            ..TenancyConfig::default()
        };
        assert!(config.validate().is_err());

        let config = TenancyConfig {
            invite_ttl_hours: MAX_INVITE_TTL_HOURS,
            ..TenancyConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_deserializes() {
        let json = serde_json::to_string(&TenancyConfig::default()).unwrap();
        let parsed: TenancyConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, TenancyConfig::default());
    }
}
