//! Login and authorization-code flow, delegated to the IdP.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use secrecy::SecretString;
use serde::Deserialize;

use crate::error::GatewayError;
use crate::idp::{IdpClient, OidcTokenResponse};

#[derive(Debug, Deserialize)]
pub(super) struct UsernamePassword {
    username: String,
    password: SecretString,
}

#[derive(Debug, Deserialize)]
pub(super) struct CallbackQuery {
    session_state: String,
    code: String,
}

/// POST /login
pub(super) async fn login(
    State(idp): State<Arc<IdpClient>>,
    Json(credentials): Json<UsernamePassword>,
) -> Result<Json<OidcTokenResponse>, GatewayError> {
    let tokens = idp
        .user_login(&credentials.username, &credentials.password)
        .await?;
    Ok(Json(tokens))
}

/// GET /login-link
pub(super) async fn login_link(
    State(idp): State<Arc<IdpClient>>,
) -> Result<Json<String>, GatewayError> {
    Ok(Json(idp.login_uri()?.into()))
}

/// GET /callback
pub(super) async fn callback(
    State(idp): State<Arc<IdpClient>>,
    Query(query): Query<CallbackQuery>,
) -> Result<Json<OidcTokenResponse>, GatewayError> {
    let tokens = idp
        .exchange_authorization_code(&query.session_state, &query.code)
        .await?;
    Ok(Json(tokens))
}

/// GET /logout
pub(super) async fn logout(
    State(idp): State<Arc<IdpClient>>,
) -> Result<Json<String>, GatewayError> {
    Ok(Json(idp.logout_uri()?.into()))
}
