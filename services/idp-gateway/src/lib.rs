//! IdP Gateway - bearer token verification in front of a Keycloak realm.
//!
//! The realm's signing key is fetched once at startup ([`bootstrap`]) and
//! shared read-only with the request path. Handlers declare the capability
//! they need through the [`auth::CurrentUser`] and [`auth::RoleGated`]
//! extractors. Identity management is forwarded to the IdP ([`idp`]).

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod auth;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod idp;
pub mod jwt;
pub mod middleware;
pub mod observability;
pub mod routes;
pub mod shutdown;

pub use bootstrap::{BootstrapError, bootstrap, fetch_verification_key};
pub use config::Config;
pub use error::{AuthError, ErrorCode, ErrorResponse, GatewayError};
pub use jwt::{AuthenticatedIdentity, JwtValidator, RequiredRoles, VerificationKey};
pub use routes::{AppState, create_router};
