//! Classification of outbound HTTP failures.
//!
//! Every call the gateway makes to the identity provider goes through
//! `reqwest`. Its error type folds very different failures into one value;
//! [`TransportError`] splits them back into the categories operators care
//! about when reading logs.

use reqwest::StatusCode;
use thiserror::Error;

/// Failure of a single outbound HTTP exchange.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The upstream answered with a non-success status
    #[error("HTTP error: upstream answered {status}")]
    Http {
        /// Status returned by the upstream
        status: StatusCode,
    },

    /// The connection could not be established
    #[error("connection error: {0}")]
    Connect(#[source] reqwest::Error),

    /// The request did not complete within its deadline
    #[error("timeout: {0}")]
    Timeout(#[source] reqwest::Error),

    /// The response body could not be decoded
    #[error("invalid response body: {0}")]
    Decode(#[source] reqwest::Error),

    /// Any other transport failure
    #[error("request failed: {0}")]
    Other(#[source] reqwest::Error),
}

impl TransportError {
    /// Short, stable name of the failure class, suitable for log fields and
    /// metric labels.
    ///
    /// # Examples
    ///
    /// ```
    /// use gateway_common::TransportError;
    /// use reqwest::StatusCode;
    ///
    /// let err = TransportError::Http { status: StatusCode::BAD_GATEWAY };
    /// assert_eq!(err.category(), "http");
    /// ```
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::Http { .. } => "http",
            Self::Connect(_) => "connect",
            Self::Timeout(_) => "timeout",
            Self::Decode(_) => "decode",
            Self::Other(_) => "other",
        }
    }

    /// Upstream status, when the upstream answered at all.
    #[must_use]
    pub const fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Http { status } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        // Connect timeouts report both flags; the deadline is the useful one.
        if err.is_timeout() {
            Self::Timeout(err)
        } else if let Some(status) = err.status() {
            Self::Http { status }
        } else if err.is_connect() {
            Self::Connect(err)
        } else if err.is_decode() {
            Self::Decode(err)
        } else {
            Self::Other(err)
        }
    }
}
