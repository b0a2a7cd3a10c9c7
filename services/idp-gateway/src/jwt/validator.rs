//! Bearer token verifier and role authorizer.
//!
//! `verify` is Level 1 (who are you), `authorize` is Level 2 (are you allowed).
//! Both are synchronous and never touch the network.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::AuthError;
use crate::jwt::claims::Claims;
use crate::jwt::key::VerificationKey;
use crate::jwt::token::{Token, TokenRejection, Validated};

/// Identity derived from a validated token. Lives for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthenticatedIdentity {
    /// `preferred_username`; absent usernames are carried through as `None`
    pub username: Option<String>,
    /// `sub`
    pub subject: Option<String>,
    /// `email`
    pub email: Option<String>,
    /// Realm roles plus the configured client's roles
    pub roles: BTreeSet<String>,
}

impl AuthenticatedIdentity {
    fn from_claims(claims: Claims, client_id: Option<&str>) -> Self {
        let roles = claims.roles(client_id);
        Self {
            username: claims.preferred_username,
            subject: claims.sub,
            email: claims.email,
            roles,
        }
    }
}

/// Role names a caller must all hold. Empty means authentication only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequiredRoles(BTreeSet<String>);

impl RequiredRoles {
    /// Required roles absent from `held`, in name order.
    #[must_use]
    pub fn missing_from(&self, held: &BTreeSet<String>) -> Vec<String> {
        self.0.difference(held).cloned().collect()
    }
}

impl<T: Into<String>> FromIterator<T> for RequiredRoles {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Verifies tokens against the realm key fetched at startup.
#[derive(Debug, Clone)]
pub struct JwtValidator {
    key: Arc<VerificationKey>,
    client_id: Option<String>,
}

impl JwtValidator {
    /// Validator reading realm roles only.
    #[must_use]
    pub const fn new(key: Arc<VerificationKey>) -> Self {
        Self {
            key,
            client_id: None,
        }
    }

    /// Also read `resource_access.<client_id>.roles` when collecting roles.
    #[must_use]
    pub fn with_client_roles(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Runs the full type-state transition on `raw`.
    pub fn validate_token(&self, raw: &str) -> Result<Token<Validated>, TokenRejection> {
        let now = chrono::Utc::now().timestamp();
        Token::parse(raw)?
            .verify_signature(&self.key)?
            .validate_expiry(now)
    }

    /// Level 1: any valid, unexpired token.
    ///
    /// A missing or empty token is `MissingCredentials`. Every other failure
    /// collapses to `InvalidCredentials`; the precise reason is only logged.
    pub fn verify(&self, token: Option<&str>) -> Result<AuthenticatedIdentity, AuthError> {
        let raw = match token.map(str::trim) {
            Some(raw) if !raw.is_empty() => raw,
            _ => return Err(AuthError::MissingCredentials),
        };

        match self.validate_token(raw) {
            Ok(token) => {
                let identity =
                    AuthenticatedIdentity::from_claims(token.into_claims(), self.client_id.as_deref());
                debug!(username = ?identity.username, "Token verified");
                Ok(identity)
            }
            Err(rejection) => {
                warn!(reason = %rejection, "Token rejected");
                Err(AuthError::InvalidCredentials)
            }
        }
    }

    /// Level 2: a valid token holding every role in `required`.
    pub fn authorize(
        &self,
        token: Option<&str>,
        required: &RequiredRoles,
    ) -> Result<AuthenticatedIdentity, AuthError> {
        let identity = self.verify(token)?;
        let missing = required.missing_from(&identity.roles);
        if missing.is_empty() {
            return Ok(identity);
        }

        warn!(
            username = ?identity.username,
            missing = ?missing,
            "Insufficient role"
        );
        Err(AuthError::InsufficientRole { missing })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_roles_missing_from() {
        let required: RequiredRoles = ["admin", "user"].into_iter().collect();
        let held: BTreeSet<String> = ["user".to_string()].into();
        assert_eq!(required.missing_from(&held), vec!["admin".to_string()]);
        assert!(RequiredRoles::default().missing_from(&held).is_empty());
    }

    #[test]
    fn test_missing_roles_reported_in_name_order() {
        let required: RequiredRoles = ["b", "a", "c"].into_iter().collect();
        let held: BTreeSet<String> = ["c".to_string()].into();
        assert_eq!(required.missing_from(&held), vec!["a", "b"]);
    }
}
