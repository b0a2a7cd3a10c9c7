//! Identity provider passthrough.
//!
//! A thin typed client over the Keycloak admin REST API and the realm's
//! OpenID Connect endpoints. No state beyond a cached admin token.

mod client;
mod error;
pub mod models;

pub use client::{IdpClient, ProxyMethod};
pub use error::IdpError;
pub use models::{
    KeycloakGroup, KeycloakRole, KeycloakUser, NewUser, OidcTokenResponse,
};
