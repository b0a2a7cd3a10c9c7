//! Trust bootstrap.
//!
//! Fetches the realm signing key once, before the listener is bound. There is
//! no retry and no degraded mode: any failure is returned to `main`, which
//! logs it and exits non-zero.

use std::time::{Duration, Instant};

use gateway_common::{HttpConfig, TransportError, build_http_client};
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, instrument};
use url::Url;

use crate::config::{Config, ConfigError, idp_endpoint};
use crate::jwt::{KeyError, VerificationKey};

/// Startup key fetch failure. Always fatal.
#[derive(Error, Debug)]
pub enum BootstrapError {
    /// The realm document could not be fetched or decoded
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The published key is unusable
    #[error("realm public key rejected: {0}")]
    InvalidKey(#[from] KeyError),

    /// The realm URL could not be built
    #[error(transparent)]
    InvalidUrl(#[from] ConfigError),
}

impl BootstrapError {
    /// Short failure class for logs: `http`, `connect`, `timeout`, `decode`,
    /// `invalid_key`, `invalid_url` or `other`.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::Transport(err) => err.category(),
            Self::InvalidKey(_) => "invalid_key",
            Self::InvalidUrl(_) => "invalid_url",
        }
    }
}

impl From<reqwest::Error> for BootstrapError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(TransportError::from(err))
    }
}

/// Public realm document, `GET /auth/realms/{realm}`.
#[derive(Debug, Deserialize)]
pub struct RealmDocument {
    /// Realm name as reported by the IdP
    #[serde(default)]
    pub realm: Option<String>,
    /// Base64 DER body of the realm's RSA public key, no PEM framing
    pub public_key: String,
}

/// Fetches and parses the signing key of `realm`.
#[instrument(skip_all, fields(realm = %realm))]
pub async fn fetch_verification_key(
    base_url: &Url,
    realm: &str,
    timeout: Duration,
) -> Result<VerificationKey, BootstrapError> {
    let url = idp_endpoint(base_url, &["auth", "realms", realm])?;
    let client = build_http_client(&HttpConfig::default().with_timeout(timeout))?;

    let document: RealmDocument = client
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    let key = VerificationKey::from_realm_public_key(&document.public_key)?;
    info!(
        realm = document.realm.as_deref().unwrap_or(realm),
        key_fingerprint = key.fingerprint(),
        "Realm signing key loaded"
    );
    Ok(key)
}

/// Runs the key fetch described by `config` and records how long it took.
pub async fn bootstrap(config: &Config) -> Result<(VerificationKey, Duration), BootstrapError> {
    let started = Instant::now();
    let key =
        fetch_verification_key(&config.idp_base_url, &config.realm, config.bootstrap_timeout())
            .await?;
    Ok((key, started.elapsed()))
}
