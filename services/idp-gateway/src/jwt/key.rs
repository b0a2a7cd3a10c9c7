//! Realm verification key.
//!
//! The IdP publishes its realm key as a bare base64 body. The key is wrapped
//! in PEM armor, parsed once, and then only ever read.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use jsonwebtoken::DecodingKey;
use sha2::{Digest, Sha256};
use thiserror::Error;

const PEM_HEADER: &str = "-----BEGIN PUBLIC KEY-----";
const PEM_FOOTER: &str = "-----END PUBLIC KEY-----";

/// Reasons a published key body cannot be used.
#[derive(Error, Debug)]
pub enum KeyError {
    /// The key body is empty
    #[error("public key is empty")]
    Empty,

    /// The key body is not valid base64
    #[error("public key is not valid base64: {0}")]
    NotBase64(#[from] base64::DecodeError),

    /// The key is not an RSA public key
    #[error("public key is not an RSA public key: {0}")]
    NotRsa(#[source] jsonwebtoken::errors::Error),
}

/// RSA public key of the trusted realm.
///
/// Built once during startup and shared read-only behind an `Arc`.
#[derive(Clone)]
pub struct VerificationKey {
    pem: String,
    decoding_key: DecodingKey,
    fingerprint: String,
}

impl VerificationKey {
    /// Builds the key from the realm document's `public_key` field.
    pub fn from_realm_public_key(body: &str) -> Result<Self, KeyError> {
        let body = body.trim();
        if body.is_empty() {
            return Err(KeyError::Empty);
        }

        let der = STANDARD.decode(body)?;
        let pem = wrap_public_key(body);
        let decoding_key = DecodingKey::from_rsa_pem(pem.as_bytes()).map_err(KeyError::NotRsa)?;

        Ok(Self {
            pem,
            decoding_key,
            fingerprint: format!("SHA256:{}", STANDARD_NO_PAD.encode(Sha256::digest(&der))),
        })
    }

    /// PEM text of the key.
    #[must_use]
    pub fn pem(&self) -> &str {
        &self.pem
    }

    /// Parsed key used for signature checks.
    #[must_use]
    pub const fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }

    /// SHA-256 fingerprint of the DER key, safe to log.
    #[must_use]
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

impl fmt::Debug for VerificationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerificationKey")
            .field("fingerprint", &self.fingerprint)
            .finish_non_exhaustive()
    }
}

/// Wraps a bare base64 key body in `PUBLIC KEY` PEM armor with CRLF line ends.
#[must_use]
pub fn wrap_public_key(body: &str) -> String {
    format!("{PEM_HEADER}\r\n{body}\r\n{PEM_FOOTER}")
}
