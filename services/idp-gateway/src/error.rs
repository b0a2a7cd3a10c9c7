//! Error handling module with type-safe, non-exhaustive error types
//!
//! This module provides a unified error handling approach with:
//! - A closed, three-way classification of authentication failures
//! - Structured error variants with contextual information
//! - Automatic conversion from module error types
//! - Sanitization of sensitive information in responses

use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};
use uuid::Uuid;

use crate::idp::IdpError;

/// Markers of a secret value embedded in a message. Plain wording such as
/// "Invalid user credentials" carries no value and is forwarded as is.
const SENSITIVE_PATTERNS: &[&str] = &[
    "password=",
    "password:",
    "secret=",
    "secret:",
    "token=",
    "api_key",
    "apikey",
    "bearer ",
    "authorization:",
    "-----begin",
];

/// Outcome of a failed authentication or authorization attempt.
///
/// Callers only ever see one of these three classes. The precise reason a
/// token was refused is logged server-side and never leaves the process.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No bearer token was supplied
    #[error("Not authenticated")]
    MissingCredentials,

    /// The token is malformed, badly signed, uses the wrong algorithm or has expired
    #[error("Could not validate credentials")]
    InvalidCredentials,

    /// The identity is valid but lacks at least one required role
    #[error("Insufficient role")]
    InsufficientRole {
        /// Required roles absent from the token
        missing: Vec<String>,
    },
}

/// Non-exhaustive error enum for forward compatibility
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Authentication or authorization failed
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// An identity-provider passthrough call failed
    #[error(transparent)]
    Idp(#[from] IdpError),

    /// The request itself is unusable
    #[error("Bad request: {reason}")]
    BadRequest {
        /// What is wrong with the request
        reason: String,
    },

    /// Internal error (details sanitized in responses)
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Error codes for API responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(into = "&'static str")]
pub enum ErrorCode {
    /// No credentials
    MissingCredentials,
    /// Credentials refused
    InvalidCredentials,
    /// Role check failed
    InsufficientRole,
    /// The IdP refused the call
    IdpRejected,
    /// The IdP could not be reached
    IdpUnavailable,
    /// The IdP did not answer in time
    IdpTimeout,
    /// Requested IdP resource does not exist
    NotFound,
    /// Malformed request
    BadRequest,
    /// Anything else
    Internal,
}

impl ErrorCode {
    /// Get the string representation of the error code
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::MissingCredentials => "AUTH_CREDENTIALS_MISSING",
            Self::InvalidCredentials => "AUTH_CREDENTIALS_INVALID",
            Self::InsufficientRole => "AUTH_INSUFFICIENT_ROLE",
            Self::IdpRejected => "IDP_REJECTED",
            Self::IdpUnavailable => "IDP_UNAVAILABLE",
            Self::IdpTimeout => "IDP_TIMEOUT",
            Self::NotFound => "NOT_FOUND",
            Self::BadRequest => "BAD_REQUEST",
            Self::Internal => "INTERNAL_ERROR",
        }
    }

    /// Default HTTP status for this error code
    #[must_use]
    pub const fn http_status(&self) -> StatusCode {
        match self {
            Self::MissingCredentials | Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::InsufficientRole => StatusCode::FORBIDDEN,
            Self::IdpRejected | Self::IdpUnavailable => StatusCode::BAD_GATEWAY,
            Self::IdpTimeout => StatusCode::GATEWAY_TIMEOUT,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::BadRequest => StatusCode::BAD_REQUEST,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ErrorCode> for &'static str {
    fn from(code: ErrorCode) -> Self {
        code.as_str()
    }
}

/// Structured error response with correlation ID
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling
    pub code: ErrorCode,
    /// Human-readable message (sanitized)
    pub message: String,
    /// Correlation ID for tracing
    pub correlation_id: Uuid,
    /// HTTP status to answer with
    #[serde(skip)]
    pub status: StatusCode,
    /// Whether to send a `WWW-Authenticate: Bearer` challenge
    #[serde(skip)]
    pub challenge: bool,
}

impl ErrorResponse {
    /// Create a new error response from a `GatewayError`
    #[must_use]
    pub fn from_error(error: &GatewayError, correlation_id: Uuid) -> Self {
        let code = error.code();
        let (status, message) = match error {
            GatewayError::Auth(AuthError::MissingCredentials) => {
                (code.http_status(), "Not authenticated".to_string())
            }
            GatewayError::Auth(AuthError::InvalidCredentials) => {
                (code.http_status(), "Could not validate credentials".to_string())
            }
            GatewayError::Auth(AuthError::InsufficientRole { .. }) => {
                (code.http_status(), "Insufficient role for this resource".to_string())
            }
            GatewayError::Idp(IdpError::Rejected { status, reason }) => {
                // The IdP's own status is forwarded so callers see 404/409 etc.
                let status =
                    StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
                (status, sanitize_message(reason))
            }
            GatewayError::Idp(IdpError::NotFound { what }) => {
                (code.http_status(), format!("{what} not found"))
            }
            GatewayError::Idp(IdpError::Transport(_)) => {
                (code.http_status(), "Identity provider unavailable".to_string())
            }
            GatewayError::Idp(IdpError::InvalidRequest { reason })
            | GatewayError::BadRequest { reason } => (code.http_status(), sanitize_message(reason)),
            GatewayError::Internal(_) => {
                // Never expose internal error details
                (code.http_status(), "Internal error".to_string())
            }
        };

        // Only the gateway's own token checks challenge; an IdP 401 (a bad
        // password on /login) is not about the bearer token.
        let challenge = matches!(
            error,
            GatewayError::Auth(AuthError::MissingCredentials | AuthError::InvalidCredentials)
        );

        Self {
            code,
            message,
            correlation_id,
            status,
            challenge,
        }
    }
}

impl GatewayError {
    /// Get the error code for this error
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Auth(AuthError::MissingCredentials) => ErrorCode::MissingCredentials,
            Self::Auth(AuthError::InvalidCredentials) => ErrorCode::InvalidCredentials,
            Self::Auth(AuthError::InsufficientRole { .. }) => ErrorCode::InsufficientRole,
            Self::Idp(IdpError::Rejected { .. }) => ErrorCode::IdpRejected,
            Self::Idp(IdpError::NotFound { .. }) => ErrorCode::NotFound,
            Self::Idp(IdpError::Transport(err)) => match err {
                gateway_common::TransportError::Timeout(_) => ErrorCode::IdpTimeout,
                _ => ErrorCode::IdpUnavailable,
            },
            Self::Idp(IdpError::InvalidRequest { .. }) | Self::BadRequest { .. } => {
                ErrorCode::BadRequest
            }
            Self::Internal(_) => ErrorCode::Internal,
        }
    }

    /// Shorthand for a bad-request error.
    #[must_use]
    pub fn bad_request(reason: impl Into<String>) -> Self {
        Self::BadRequest {
            reason: reason.into(),
        }
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        let challenge = self.challenge;
        let status = self.status;
        let mut response = (status, Json(self)).into_response();
        if challenge {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let correlation_id = Uuid::new_v4();
        let response = ErrorResponse::from_error(&self, correlation_id);

        if response.status.is_server_error() {
            error!(
                correlation_id = %correlation_id,
                error_type = response.code.as_str(),
                error = %self,
                "Request failed"
            );
        } else {
            warn!(
                correlation_id = %correlation_id,
                error_type = response.code.as_str(),
                "Request rejected"
            );
        }

        response.into_response()
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        GatewayError::from(self).into_response()
    }
}

/// Sanitize a message by removing sensitive information
fn sanitize_message(message: &str) -> String {
    if contains_sensitive_info(message) {
        return "Request rejected by identity provider".to_string();
    }
    message.to_string()
}

/// Check if a string contains sensitive information
#[must_use]
pub fn contains_sensitive_info(text: &str) -> bool {
    let lower = text.to_lowercase();
    SENSITIVE_PATTERNS.iter().any(|p| lower.contains(p))
}
