//! HTTP router and handlers

mod admin;
mod auth_flow;
mod user;

use std::sync::Arc;

use axum::extract::{FromRef, State};
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde_json::{Value, json};

use crate::auth::AuthState;
use crate::error::GatewayError;
use crate::idp::IdpClient;
use crate::observability::GatewayMetrics;

/// Shared application state
#[derive(Debug, Clone)]
pub struct AppState {
    /// Token verification for the extractors
    pub auth: AuthState,
    /// Identity provider client for passthrough routes
    pub idp: Arc<IdpClient>,
    /// Prometheus metrics
    pub metrics: Arc<GatewayMetrics>,
}

impl FromRef<AppState> for AuthState {
    fn from_ref(state: &AppState) -> Self {
        state.auth.clone()
    }
}

/// Create the router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        // Example user requests
        .route("/", get(user::read_root))
        .route("/items/{item_id}", get(user::read_item))
        .route("/users/me", get(user::read_users_me))
        .route("/users/me/items", get(user::read_own_items))
        .route("/protected", get(user::protected))
        .route("/current_user/roles", get(user::current_user_roles))
        .route("/admin", get(user::company_admin))
        .route("/login", post(auth_flow::login))
        // Auth flow
        .route("/login-link", get(auth_flow::login_link))
        .route("/callback", get(auth_flow::callback))
        .route("/logout", get(auth_flow::logout))
        // Admin
        .route("/proxy", post(admin::proxy))
        .route("/identity-providers", get(admin::identity_providers))
        .route("/idp-configuration", get(admin::idp_configuration))
        // User management
        .route("/users", get(admin::all_users).post(admin::create_user))
        .route("/user", get(admin::find_user).put(admin::update_user))
        .route("/user/{user_id}", get(admin::user).delete(admin::delete_user))
        .route("/user/{user_id}/change-password", put(admin::change_password))
        .route(
            "/user/{user_id}/send-email-verification",
            put(admin::send_email_verification),
        )
        // Role management
        .route(
            "/roles",
            get(admin::all_roles)
                .post(admin::create_role)
                .delete(admin::delete_role),
        )
        .route("/role/{role_name}", get(admin::role))
        // Group management
        .route(
            "/groups",
            get(admin::all_groups)
                .post(admin::create_group)
                .delete(admin::delete_group),
        )
        .route("/group/{group_name}", get(admin::group))
        .route("/group-by-path/{*path}", get(admin::group_by_path))
        // User roles
        .route(
            "/users/{user_id}/roles",
            get(admin::user_roles)
                .post(admin::add_user_roles)
                .delete(admin::remove_user_roles),
        )
        // User groups
        .route(
            "/users/{user_id}/groups",
            get(admin::user_groups)
                .post(admin::add_user_group)
                .delete(admin::remove_user_group),
        )
        .with_state(state)
}

/// GET /health
async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// GET /metrics - Prometheus text format
async fn metrics_handler(
    State(metrics): State<Arc<GatewayMetrics>>,
) -> Result<impl IntoResponse, GatewayError> {
    let body = metrics
        .render()
        .map_err(|e| GatewayError::Internal(anyhow::anyhow!(e)))?;
    Ok(([(CONTENT_TYPE, "text/plain; version=0.0.4")], body))
}

impl FromRef<AppState> for Arc<GatewayMetrics> {
    fn from_ref(state: &AppState) -> Self {
        Arc::clone(&state.metrics)
    }
}

impl FromRef<AppState> for Arc<IdpClient> {
    fn from_ref(state: &AppState) -> Self {
        Arc::clone(&state.idp)
    }
}
