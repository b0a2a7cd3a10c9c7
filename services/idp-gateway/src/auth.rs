//! Request extractors for the two capability levels.
//!
//! `CurrentUser` accepts any valid bearer token. `RoleGated<R>` additionally
//! requires every role named by `R`. Handlers opt in by taking one of them as
//! an argument; rejections render as 401 or 403 through [`GatewayError`].

use std::marker::PhantomData;
use std::sync::Arc;

use axum::extract::{FromRef, FromRequestParts};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use crate::error::{AuthError, GatewayError};
use crate::jwt::{AuthenticatedIdentity, JwtValidator, RequiredRoles};
use crate::observability::GatewayMetrics;

/// Shared state the extractors need.
#[derive(Debug, Clone)]
pub struct AuthState {
    /// Token verifier holding the realm key
    pub validator: Arc<JwtValidator>,
    /// Outcome counters
    pub metrics: Arc<GatewayMetrics>,
}

impl AuthState {
    fn record(&self, result: &Result<AuthenticatedIdentity, AuthError>, gated: bool) {
        let outcome = match result {
            Ok(_) if gated => "authorized",
            Ok(_) => "authenticated",
            Err(err) => outcome_label(err),
        };
        self.metrics.record_auth(outcome);
    }
}

/// Metric label for a failed attempt.
#[must_use]
pub const fn outcome_label(err: &AuthError) -> &'static str {
    match err {
        AuthError::MissingCredentials => "missing_credentials",
        AuthError::InvalidCredentials => "invalid_credentials",
        AuthError::InsufficientRole { .. } => "insufficient_role",
    }
}

/// Token from an `Authorization: Bearer <token>` header.
///
/// The scheme is matched case-insensitively. Any other scheme, or a header
/// that is not valid UTF-8, counts as no token at all.
#[must_use]
pub fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    scheme
        .eq_ignore_ascii_case("bearer")
        .then(|| token.trim())
        .filter(|token| !token.is_empty())
}

/// Level 1: the caller presented a valid, unexpired token.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub AuthenticatedIdentity);

impl<S> FromRequestParts<S> for CurrentUser
where
    AuthState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = GatewayError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth = AuthState::from_ref(state);
        let result = auth.validator.verify(bearer_token(parts));
        auth.record(&result, false);
        Ok(Self(result?))
    }
}

/// Names the roles a [`RoleGated`] extractor demands.
pub trait RoleRequirement: Send + Sync + 'static {
    /// Roles the caller must all hold
    fn required_roles() -> &'static [&'static str];
}

/// Requires the `admin` role.
#[derive(Debug, Clone, Copy)]
pub struct AdminRole;

impl RoleRequirement for AdminRole {
    fn required_roles() -> &'static [&'static str] {
        &["admin"]
    }
}

/// Level 2: a valid token that also holds every role of `R`.
#[derive(Debug, Clone)]
pub struct RoleGated<R: RoleRequirement>(pub AuthenticatedIdentity, PhantomData<R>);

impl<R: RoleRequirement> RoleGated<R> {
    /// The authorized identity.
    #[must_use]
    pub fn into_inner(self) -> AuthenticatedIdentity {
        self.0
    }
}

impl<S, R> FromRequestParts<S> for RoleGated<R>
where
    AuthState: FromRef<S>,
    S: Send + Sync,
    R: RoleRequirement,
{
    type Rejection = GatewayError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth = AuthState::from_ref(state);
        let required: RequiredRoles = R::required_roles().iter().copied().collect();
        let result = auth.validator.authorize(bearer_token(parts), &required);
        auth.record(&result, true);
        Ok(Self(result?, PhantomData))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_with(header: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = header {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_bearer_token_extracted() {
        let parts = parts_with(Some("Bearer abc.def.ghi"));
        assert_eq!(bearer_token(&parts), Some("abc.def.ghi"));
    }

    #[test]
    fn test_bearer_scheme_case_insensitive() {
        let parts = parts_with(Some("bearer abc"));
        assert_eq!(bearer_token(&parts), Some("abc"));
    }

    #[test]
    fn test_other_schemes_are_no_token() {
        assert_eq!(bearer_token(&parts_with(Some("Basic dXNlcjpwdw=="))), None);
        assert_eq!(bearer_token(&parts_with(Some("Bearer"))), None);
        assert_eq!(bearer_token(&parts_with(Some("Bearer   "))), None);
        assert_eq!(bearer_token(&parts_with(None)), None);
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(outcome_label(&AuthError::MissingCredentials), "missing_credentials");
        assert_eq!(
            outcome_label(&AuthError::InsufficientRole { missing: vec![] }),
            "insufficient_role"
        );
    }
}
