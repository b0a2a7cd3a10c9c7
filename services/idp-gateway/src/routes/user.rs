//! Example routes exercising both capability levels.

use std::collections::BTreeSet;

use axum::Json;
use axum::extract::{Path, Query};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::auth::{AdminRole, CurrentUser, RoleGated};
use crate::jwt::AuthenticatedIdentity;

#[derive(Debug, Serialize)]
pub(super) struct User {
    username: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ItemQuery {
    q: Option<String>,
}

/// GET /
pub(super) async fn read_root() -> Json<Value> {
    Json(json!({ "Hello": "World" }))
}

/// GET /items/{item_id}
pub(super) async fn read_item(
    Path(item_id): Path<i64>,
    Query(query): Query<ItemQuery>,
) -> Json<Value> {
    Json(json!({ "item_id": item_id, "q": query.q }))
}

/// GET /users/me
pub(super) async fn read_users_me(CurrentUser(identity): CurrentUser) -> Json<User> {
    Json(User {
        username: identity.username,
    })
}

/// GET /users/me/items
pub(super) async fn read_own_items(CurrentUser(identity): CurrentUser) -> Json<Value> {
    Json(json!([{ "item_id": "Foo", "owner": identity.username }]))
}

/// GET /protected
pub(super) async fn protected(CurrentUser(identity): CurrentUser) -> Json<AuthenticatedIdentity> {
    Json(identity)
}

/// GET /current_user/roles
pub(super) async fn current_user_roles(CurrentUser(identity): CurrentUser) -> Json<BTreeSet<String>> {
    Json(identity.roles)
}

/// GET /admin
pub(super) async fn company_admin(admin: RoleGated<AdminRole>) -> Json<String> {
    let identity = admin.into_inner();
    Json(format!(
        "Hi admin {}",
        identity.username.as_deref().unwrap_or("<unnamed>")
    ))
}
