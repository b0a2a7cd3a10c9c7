//! Type-state bearer token.
//!
//! A token moves `Unvalidated -> SignatureValidated -> Validated`, and claims
//! are only reachable once the token is `Validated`. The signature step is
//! pinned to RS256 whatever the header says.

use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, Header, Validation, decode, decode_header};
use thiserror::Error;

use crate::jwt::claims::Claims;
use crate::jwt::key::VerificationKey;

/// The only algorithm the realm signs with.
pub const REQUIRED_ALGORITHM: Algorithm = Algorithm::RS256;

/// Why a token was refused. Logged, never returned to callers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenRejection {
    /// Not a three-part JWT, or the header does not decode
    #[error("malformed token: {0}")]
    Malformed(String),

    /// Header declares anything other than RS256
    #[error("unsupported algorithm {0:?}")]
    UnsupportedAlgorithm(Algorithm),

    /// Signature does not verify against the realm key
    #[error("signature verification failed")]
    BadSignature,

    /// `exp` lies in the past
    #[error("token expired at {expired_at}")]
    Expired {
        /// Expiry taken from the token
        expired_at: DateTime<Utc>,
    },

    /// Payload does not decode into the expected claims
    #[error("invalid claims: {0}")]
    InvalidClaims(String),
}

mod private {
    pub trait Sealed {}
}

/// Marker trait for token validation states
pub trait TokenState: private::Sealed {}

/// Parsed header only, nothing verified
#[derive(Debug)]
pub struct Unvalidated;

/// Signature verified, expiry not yet checked
#[derive(Debug)]
pub struct SignatureValidated {
    claims: Claims,
}

/// Signature and expiry verified
#[derive(Debug)]
pub struct Validated {
    claims: Claims,
}

impl private::Sealed for Unvalidated {}
impl private::Sealed for SignatureValidated {}
impl private::Sealed for Validated {}

impl TokenState for Unvalidated {}
impl TokenState for SignatureValidated {}
impl TokenState for Validated {}

/// Bearer token in a given validation state.
#[derive(Debug)]
pub struct Token<S: TokenState> {
    raw: String,
    header: Header,
    state: S,
}

impl Token<Unvalidated> {
    /// Decodes the header. Fails on anything that is not a JWT, including
    /// `alg: none`, which has no representation here.
    pub fn parse(raw: &str) -> Result<Self, TokenRejection> {
        let header = decode_header(raw)
            .map_err(|e| TokenRejection::Malformed(format!("invalid header: {e}")))?;

        Ok(Self {
            raw: raw.to_string(),
            header,
            state: Unvalidated,
        })
    }

    /// Checks the signature against the realm key.
    ///
    /// The declared algorithm is compared to RS256 first; the verifier itself
    /// is built for RS256 only, so a forged header cannot select HMAC.
    pub fn verify_signature(
        self,
        key: &VerificationKey,
    ) -> Result<Token<SignatureValidated>, TokenRejection> {
        if self.header.alg != REQUIRED_ALGORITHM {
            return Err(TokenRejection::UnsupportedAlgorithm(self.header.alg));
        }

        let data = decode::<Claims>(&self.raw, key.decoding_key(), &signature_only())
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => TokenRejection::BadSignature,
                ErrorKind::InvalidAlgorithm => {
                    TokenRejection::UnsupportedAlgorithm(self.header.alg)
                }
                ErrorKind::Json(_) => TokenRejection::InvalidClaims(e.to_string()),
                _ => TokenRejection::Malformed(e.to_string()),
            })?;

        Ok(Token {
            raw: self.raw,
            header: self.header,
            state: SignatureValidated {
                claims: data.claims,
            },
        })
    }
}

impl Token<SignatureValidated> {
    /// Checks `exp` against `now` (unix seconds) with no leeway.
    pub fn validate_expiry(self, now: i64) -> Result<Token<Validated>, TokenRejection> {
        let claims = self.state.claims;
        if claims.is_expired_at(now) {
            return Err(TokenRejection::Expired {
                expired_at: DateTime::from_timestamp(claims.exp, 0).unwrap_or_default(),
            });
        }

        Ok(Token {
            raw: self.raw,
            header: self.header,
            state: Validated { claims },
        })
    }
}

impl Token<Validated> {
    /// Consumes the token, keeping its claims. Only a validated token
    /// gives its claims up.
    #[must_use]
    pub fn into_claims(self) -> Claims {
        self.state.claims
    }
}

fn signature_only() -> Validation {
    let mut validation = Validation::new(REQUIRED_ALGORITHM);
    validation.leeway = 0;
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();
    validation
}
