use gateway_common::TransportError;
use reqwest::StatusCode;
use thiserror::Error;

use crate::config::ConfigError;

/// Failure of a call to the identity provider.
#[derive(Error, Debug)]
pub enum IdpError {
    /// The IdP answered with a non-2xx status
    #[error("identity provider rejected the request with {status}: {reason}")]
    Rejected {
        /// Status returned by the IdP
        status: StatusCode,
        /// Error text returned by the IdP
        reason: String,
    },

    /// A lookup matched nothing
    #[error("{what} not found")]
    NotFound {
        /// What was looked up
        what: String,
    },

    /// The IdP could not be reached, or its answer could not be read
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The request could not be built
    #[error("invalid request: {reason}")]
    InvalidRequest {
        /// What is wrong
        reason: String,
    },
}

impl IdpError {
    pub(crate) fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Status label used in metrics.
    pub(crate) fn status_label(&self) -> String {
        match self {
            Self::Rejected { status, .. } => status.as_u16().to_string(),
            Self::NotFound { .. } => "404".to_string(),
            Self::Transport(err) => err.category().to_string(),
            Self::InvalidRequest { .. } => "invalid_request".to_string(),
        }
    }
}

impl From<reqwest::Error> for IdpError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(TransportError::from(err))
    }
}

impl From<ConfigError> for IdpError {
    fn from(err: ConfigError) -> Self {
        Self::InvalidRequest {
            reason: err.to_string(),
        }
    }
}

/// Pulls a readable reason out of a Keycloak error body.
///
/// Keycloak answers with `{"errorMessage": ..}`, `{"error_description": ..}`
/// or `{"error": ..}` depending on the endpoint.
pub(crate) fn reason_from_body(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            ["errorMessage", "error_description", "error"]
                .iter()
                .find_map(|field| value.get(field).and_then(|v| v.as_str()).map(str::to_string))
        })
        .unwrap_or_else(|| body.trim().to_string())
}
