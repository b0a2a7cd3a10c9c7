//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use idp_gateway::auth::AuthState;
use idp_gateway::idp::IdpClient;
use idp_gateway::observability::GatewayMetrics;
use idp_gateway::{AppState, Config, JwtValidator, VerificationKey};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use secrecy::SecretString;
use serde_json::{Value, json};
use url::Url;

pub const REALM_PRIVATE_PEM: &str = include_str!("../fixtures/realm_private.pem");
pub const REALM_PUBLIC_PEM: &str = include_str!("../fixtures/realm_public.pem");
pub const FOREIGN_PRIVATE_PEM: &str = include_str!("../fixtures/foreign_private.pem");

pub const CLIENT_ID: &str = "gateway";

/// Base64 body of the realm key, as the IdP publishes it.
pub fn realm_public_body() -> String {
    REALM_PUBLIC_PEM
        .lines()
        .map(str::trim)
        .filter(|line| !line.starts_with("-----"))
        .collect()
}

pub fn realm_key() -> VerificationKey {
    VerificationKey::from_realm_public_key(&realm_public_body()).unwrap()
}

pub fn validator() -> JwtValidator {
    JwtValidator::new(Arc::new(realm_key())).with_client_roles(CLIENT_ID)
}

pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

pub fn sign_with(private_pem: &str, claims: &Value) -> String {
    let key = EncodingKey::from_rsa_pem(private_pem.as_bytes()).unwrap();
    encode(&Header::new(Algorithm::RS256), claims, &key).unwrap()
}

/// Realm-signed token valid for five minutes, holding `realm_roles`.
pub fn token_for(username: &str, realm_roles: &[&str]) -> String {
    sign_with(
        REALM_PRIVATE_PEM,
        &json!({
            "exp": now() + 300,
            "iat": now(),
            "sub": format!("sub-{username}"),
            "preferred_username": username,
            "realm_access": { "roles": realm_roles },
        }),
    )
}

pub fn config_for(idp_base_url: &str) -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 8281,
        idp_base_url: Url::parse(idp_base_url).unwrap(),
        realm: "master".to_string(),
        client_id: CLIENT_ID.to_string(),
        client_secret: SecretString::from("client-secret".to_string()),
        admin_client_secret: SecretString::from("admin-secret".to_string()),
        callback_uri: Url::parse("http://localhost:8281/callback").unwrap(),
        bootstrap_timeout_secs: 3,
        idp_timeout_secs: 2,
        request_timeout_secs: 5,
        shutdown_timeout_seconds: 1,
        log_level: "info".to_string(),
        log_json: false,
    }
}

pub fn metrics() -> Arc<GatewayMetrics> {
    Arc::new(GatewayMetrics::new().unwrap())
}

pub fn idp_client(idp_base_url: &str, metrics: Arc<GatewayMetrics>) -> IdpClient {
    IdpClient::new(&config_for(idp_base_url), metrics).unwrap()
}

pub fn app_state(idp_base_url: &str) -> AppState {
    let metrics = metrics();
    AppState {
        auth: AuthState {
            validator: Arc::new(validator()),
            metrics: Arc::clone(&metrics),
        },
        idp: Arc::new(idp_client(idp_base_url, Arc::clone(&metrics))),
        metrics,
    }
}
