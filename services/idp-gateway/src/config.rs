//! Type-Safe Configuration with Validation
//!
//! Provides type-safe configuration with URL validation and environment variable support.

use secrecy::SecretString;
use std::env;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Invalid URL format
    #[error("Invalid URL for {field}: {reason}")]
    InvalidUrl {
        /// Environment variable holding the URL
        field: String,
        /// Parser message
        reason: String,
    },

    /// Invalid port number
    #[error("Invalid port: must be between 1 and 65535")]
    InvalidPort,

    /// Invalid timeout value
    #[error("Invalid timeout for {0}: must be greater than 0")]
    InvalidTimeout(String),

    /// Missing required field
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    /// Environment variable parse error
    #[error("Failed to parse environment variable {name}: {reason}")]
    ParseError {
        /// Variable name
        name: String,
        /// Parser message
        reason: String,
    },
}

/// Gateway configuration with validation.
///
/// Client secrets are kept in [`SecretString`] so they never show up in
/// `Debug` output or logs.
#[derive(Debug)]
pub struct Config {
    /// Server host address
    pub host: String,
    /// Server port (1-65535)
    pub port: u16,
    /// IdP base URL, without the `/auth` context path
    pub idp_base_url: Url,
    /// Realm whose signing key is trusted
    pub realm: String,
    /// OIDC client used for login and code exchange
    pub client_id: String,
    /// Secret of `client_id`
    pub client_secret: SecretString,
    /// Secret of the `admin-cli` client used for admin passthrough calls
    pub admin_client_secret: SecretString,
    /// Redirect URI registered for the authorization-code flow
    pub callback_uri: Url,
    /// Timeout of the startup key fetch in seconds (must be > 0)
    pub bootstrap_timeout_secs: u64,
    /// Timeout of admin passthrough calls in seconds (must be > 0)
    pub idp_timeout_secs: u64,
    /// Inbound request timeout in seconds
    pub request_timeout_secs: u64,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
    /// Fallback log level when `RUST_LOG` is unset
    pub log_level: String,
    /// Emit JSON logs
    pub log_json: bool,
}

impl Config {
    /// Loads configuration from environment variables with validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: parse_env("PORT", 8281)?,
            idp_base_url: parse_url_env("KEYCLOAK_URL", "http://localhost:8180")?,
            realm: env::var("REALM").unwrap_or_else(|_| "master".to_string()),
            client_id: env::var("CLIENT_ID").unwrap_or_else(|_| "master".to_string()),
            client_secret: parse_secret_env("CLIENT_SECRET"),
            admin_client_secret: parse_secret_env("CLIENT_ADMIN_SECRET"),
            callback_uri: parse_url_env("CALLBACK_URI", "http://localhost:8281/callback")?,
            bootstrap_timeout_secs: parse_env("BOOTSTRAP_TIMEOUT", 3)?,
            idp_timeout_secs: parse_env("IDP_TIMEOUT", 10)?,
            request_timeout_secs: parse_env("REQUEST_TIMEOUT", 30)?,
            shutdown_timeout_seconds: parse_env("SHUTDOWN_TIMEOUT", 30)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_json: parse_env("LOG_JSON", false)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidPort);
        }
        if self.realm.trim().is_empty() {
            return Err(ConfigError::MissingRequired("realm".to_string()));
        }
        if self.client_id.trim().is_empty() {
            return Err(ConfigError::MissingRequired("client_id".to_string()));
        }
        if self.bootstrap_timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout("BOOTSTRAP_TIMEOUT".to_string()));
        }
        if self.idp_timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout("IDP_TIMEOUT".to_string()));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout("REQUEST_TIMEOUT".to_string()));
        }
        Ok(())
    }

    /// Socket address string the listener binds to.
    #[must_use]
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Timeout of the startup key fetch.
    #[must_use]
    pub const fn bootstrap_timeout(&self) -> Duration {
        Duration::from_secs(self.bootstrap_timeout_secs)
    }

    /// Timeout of admin passthrough calls.
    #[must_use]
    pub const fn idp_timeout(&self) -> Duration {
        Duration::from_secs(self.idp_timeout_secs)
    }

    /// Inbound request timeout.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Graceful shutdown timeout.
    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_seconds)
    }
}

/// Joins `segments` onto the IdP base URL, one percent-encoded path segment each.
///
/// `idp_endpoint(http://kc:8180, ["auth", "realms", "master"])` yields
/// `http://kc:8180/auth/realms/master`.
pub fn idp_endpoint(base: &Url, segments: &[&str]) -> Result<Url, ConfigError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| ConfigError::InvalidUrl {
            field: "KEYCLOAK_URL".to_string(),
            reason: "URL cannot be a base".to_string(),
        })?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Parse an environment variable with a default value.
fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(val) => val.trim().parse().map_err(|e: T::Err| ConfigError::ParseError {
            name: name.to_string(),
            reason: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

/// Parse a URL environment variable with a default value.
fn parse_url_env(name: &str, default: &str) -> Result<Url, ConfigError> {
    let url_str = env::var(name).unwrap_or_else(|_| default.to_string());
    Url::parse(&url_str).map_err(|e| ConfigError::InvalidUrl {
        field: name.to_string(),
        reason: e.to_string(),
    })
}

/// Read a secret environment variable, empty when unset.
fn parse_secret_env(name: &str) -> SecretString {
    SecretString::from(env::var(name).unwrap_or_default())
}
