//! Auth service configuration.
//!
//! Configuration is loaded from environment variables. The signing secret and
//! database URL are redacted in Debug output.

use base64::{engine::general_purpose, Engine as _};
use secrecy::{ExposeSecret, SecretBox, SecretString};
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Default server bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default access token lifetime (15 minutes).
pub const DEFAULT_ACCESS_TOKEN_TTL_SECONDS: i64 = 900;

/// Default rotation secret lifetime (30 days).
pub const DEFAULT_REFRESH_TOKEN_TTL_SECONDS: i64 = 30 * 24 * 60 * 60;

/// Maximum access token lifetime (1 day).
pub const MAX_ACCESS_TOKEN_TTL_SECONDS: i64 = 24 * 60 * 60;

/// Maximum rotation secret lifetime (365 days).
pub const MAX_REFRESH_TOKEN_TTL_SECONDS: i64 = 365 * 24 * 60 * 60;

/// Default bcrypt cost factor (~200ms per hash).
pub const DEFAULT_BCRYPT_COST: u32 = 12;

/// Minimum bcrypt cost accepted (OWASP floor).
pub const MIN_BCRYPT_COST: u32 = 10;

/// Maximum bcrypt cost accepted; higher values push hashing past ~800ms.
pub const MAX_BCRYPT_COST: u32 = 14;

/// Default deadline for a single identity store operation.
pub const DEFAULT_STORE_TIMEOUT_MS: u64 = 5_000;

/// Default deadline for the health check's store ping.
pub const DEFAULT_HEALTH_PING_TIMEOUT_MS: u64 = 1_000;

/// Minimum signing secret length for HS512.
pub const MIN_JWT_SECRET_BYTES: usize = 32;

/// Which identity store implementation backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "postgres" => Ok(StoreBackend::Postgres),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(ConfigError::InvalidStoreBackend(format!(
                "AUTH_STORE_BACKEND must be 'postgres' or 'memory', got '{}'",
                other
            ))),
        }
    }
}

/// Log verbosity preset.
///
/// `error` logs errors only, `prod` logs info and above, anything else
/// logs at debug.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Prod,
    Debug,
}

impl LogLevel {
    pub fn parse(value: &str) -> Self {
        match value {
            "error" => LogLevel::Error,
            "prod" => LogLevel::Prod,
            _ => LogLevel::Debug,
        }
    }

    /// Preset named by `LOG_LEVEL`, read ahead of the rest of the
    /// configuration so startup errors are logged.
    pub fn from_env() -> Self {
        env::var("LOG_LEVEL")
            .map(|v| Self::parse(&v))
            .unwrap_or(LogLevel::Debug)
    }

    /// Default `EnvFilter` directive for this preset.
    pub fn filter_directive(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Prod => "auth_service=info,tower_http=info",
            LogLevel::Debug => "auth_service=debug,tower_http=debug",
        }
    }
}

pub struct Config {
    pub bind_address: String,
    pub store_backend: StoreBackend,
    /// Required when `store_backend` is Postgres.
    pub database_url: Option<SecretString>,
    /// HS512 signing secret (decoded bytes).
    pub jwt_secret: SecretBox<Vec<u8>>,
    pub access_token_ttl_seconds: i64,
    pub refresh_token_ttl_seconds: i64,
    pub bcrypt_cost: u32,
    pub store_timeout_ms: u64,
    pub health_ping_timeout_ms: u64,
    pub log_level: LogLevel,
    /// Seconds to keep serving in-flight requests after a shutdown signal.
    pub drain_seconds: u64,
}

impl Clone for Config {
    fn clone(&self) -> Self {
        Self {
            bind_address: self.bind_address.clone(),
            store_backend: self.store_backend,
            database_url: self
                .database_url
                .as_ref()
                .map(|url| SecretString::from(url.expose_secret().to_string())),
            jwt_secret: SecretBox::new(Box::new(self.jwt_secret.expose_secret().clone())),
            access_token_ttl_seconds: self.access_token_ttl_seconds,
            refresh_token_ttl_seconds: self.refresh_token_ttl_seconds,
            bcrypt_cost: self.bcrypt_cost,
            store_timeout_ms: self.store_timeout_ms,
            health_ping_timeout_ms: self.health_ping_timeout_ms,
            log_level: self.log_level,
            drain_seconds: self.drain_seconds,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("bind_address", &self.bind_address)
            .field("store_backend", &self.store_backend)
            .field("database_url", &"[REDACTED]")
            .field("jwt_secret", &"[REDACTED]")
            .field("access_token_ttl_seconds", &self.access_token_ttl_seconds)
            .field("refresh_token_ttl_seconds", &self.refresh_token_ttl_seconds)
            .field("bcrypt_cost", &self.bcrypt_cost)
            .field("store_timeout_ms", &self.store_timeout_ms)
            .field("health_ping_timeout_ms", &self.health_ping_timeout_ms)
            .field("log_level", &self.log_level)
            .field("drain_seconds", &self.drain_seconds)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid store backend: {0}")]
    InvalidStoreBackend(String),

    #[error("Invalid JWT secret: {0}")]
    InvalidJwtSecret(String),

    #[error("Base64 decode error: {0}")]
    Base64Error(#[from] base64::DecodeError),

    #[error("Invalid token TTL configuration: {0}")]
    InvalidTtl(String),

    #[error("Invalid bcrypt cost configuration: {0}")]
    InvalidBcryptCost(String),

    #[error("Invalid timeout configuration: {0}")]
    InvalidTimeout(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let store_backend = match vars.get("AUTH_STORE_BACKEND") {
            Some(value) => value.parse()?,
            None => StoreBackend::Postgres,
        };

        let database_url = vars.get("DATABASE_URL").cloned().map(SecretString::from);
        if store_backend == StoreBackend::Postgres && database_url.is_none() {
            return Err(ConfigError::MissingEnvVar("DATABASE_URL".to_string()));
        }

        let jwt_secret_base64 = vars
            .get("AUTH_JWT_SECRET")
            .ok_or_else(|| ConfigError::MissingEnvVar("AUTH_JWT_SECRET".to_string()))?;

        let jwt_secret = general_purpose::STANDARD
            .decode(jwt_secret_base64)
            .map_err(ConfigError::Base64Error)?;

        if jwt_secret.len() < MIN_JWT_SECRET_BYTES {
            return Err(ConfigError::InvalidJwtSecret(format!(
                "Expected at least {} bytes, got {}",
                MIN_JWT_SECRET_BYTES,
                jwt_secret.len()
            )));
        }

        let access_token_ttl_seconds = parse_ttl_seconds(
            vars,
            "ACCESS_TOKEN_TTL_SECONDS",
            DEFAULT_ACCESS_TOKEN_TTL_SECONDS,
            MAX_ACCESS_TOKEN_TTL_SECONDS,
        )?;
        let refresh_token_ttl_seconds = parse_ttl_seconds(
            vars,
            "REFRESH_TOKEN_TTL_SECONDS",
            DEFAULT_REFRESH_TOKEN_TTL_SECONDS,
            MAX_REFRESH_TOKEN_TTL_SECONDS,
        )?;

        if refresh_token_ttl_seconds <= access_token_ttl_seconds {
            return Err(ConfigError::InvalidTtl(format!(
                "REFRESH_TOKEN_TTL_SECONDS ({}) must exceed ACCESS_TOKEN_TTL_SECONDS ({})",
                refresh_token_ttl_seconds, access_token_ttl_seconds
            )));
        }

        let bcrypt_cost = if let Some(value_str) = vars.get("BCRYPT_COST") {
            let value: u32 = value_str.parse().map_err(|e| {
                ConfigError::InvalidBcryptCost(format!(
                    "BCRYPT_COST must be a valid integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if !(MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&value) {
                return Err(ConfigError::InvalidBcryptCost(format!(
                    "BCRYPT_COST must be between {} and {}, got {}",
                    MIN_BCRYPT_COST, MAX_BCRYPT_COST, value
                )));
            }

            value
        } else {
            DEFAULT_BCRYPT_COST
        };

        let store_timeout_ms =
            parse_positive_millis(vars, "STORE_TIMEOUT_MS", DEFAULT_STORE_TIMEOUT_MS)?;
        let health_ping_timeout_ms = parse_positive_millis(
            vars,
            "HEALTH_PING_TIMEOUT_MS",
            DEFAULT_HEALTH_PING_TIMEOUT_MS,
        )?;

        let log_level = vars
            .get("LOG_LEVEL")
            .map(|v| LogLevel::parse(v))
            .unwrap_or(LogLevel::Debug);

        let drain_seconds = vars
            .get("AUTH_DRAIN_SECONDS")
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);

        Ok(Config {
            bind_address,
            store_backend,
            database_url,
            jwt_secret: SecretBox::new(Box::new(jwt_secret)),
            access_token_ttl_seconds,
            refresh_token_ttl_seconds,
            bcrypt_cost,
            store_timeout_ms,
            health_ping_timeout_ms,
            log_level,
            drain_seconds,
        })
    }

    /// Database URL with a server-side statement timeout appended, so a
    /// query can never outlive the store deadline by much.
    pub fn database_url_with_statement_timeout(&self) -> Option<String> {
        let url = self.database_url.as_ref()?.expose_secret().to_string();
        let timeout_secs = self.store_timeout_ms.div_ceil(1000).max(1);
        let separator = if url.contains('?') { '&' } else { '?' };
        Some(format!(
            "{}{}options=-c%20statement_timeout%3D{}s",
            url, separator, timeout_secs
        ))
    }
}

fn parse_ttl_seconds(
    vars: &HashMap<String, String>,
    name: &str,
    default: i64,
    max: i64,
) -> Result<i64, ConfigError> {
    let Some(value_str) = vars.get(name) else {
        return Ok(default);
    };

    let value: i64 = value_str.parse().map_err(|e| {
        ConfigError::InvalidTtl(format!(
            "{} must be a valid integer, got '{}': {}",
            name, value_str, e
        ))
    })?;

    if value <= 0 {
        return Err(ConfigError::InvalidTtl(format!(
            "{} must be positive, got {}",
            name, value
        )));
    }

    if value > max {
        return Err(ConfigError::InvalidTtl(format!(
            "{} must be at most {}, got {}",
            name, max, value
        )));
    }

    Ok(value)
}

fn parse_positive_millis(
    vars: &HashMap<String, String>,
    name: &str,
    default: u64,
) -> Result<u64, ConfigError> {
    let Some(value_str) = vars.get(name) else {
        return Ok(default);
    };

    let value: u64 = value_str.parse().map_err(|e| {
        ConfigError::InvalidTimeout(format!(
            "{} must be a valid positive integer, got '{}': {}",
            name, value_str, e
        ))
    })?;

    if value == 0 {
        return Err(ConfigError::InvalidTimeout(format!(
            "{} must be greater than 0",
            name
        )));
    }

    Ok(value)
}
