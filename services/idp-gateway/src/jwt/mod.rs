//! Bearer token verification against the realm signing key.

pub mod claims;
pub mod key;
pub mod token;
pub mod validator;

pub use claims::{Claims, RoleClaim};
pub use key::{KeyError, VerificationKey};
pub use token::{SignatureValidated, Token, TokenRejection, TokenState, Unvalidated, Validated};
pub use validator::{AuthenticatedIdentity, JwtValidator, RequiredRoles};
