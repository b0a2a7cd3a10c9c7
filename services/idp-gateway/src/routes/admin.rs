//! Identity-management passthrough routes.
//!
//! Each handler shapes its arguments and forwards to [`IdpClient`]; IdP
//! errors come back with the IdP's own status.

use std::collections::HashMap;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, RawQuery, State};
use axum::http::StatusCode;
use secrecy::SecretString;
use serde::Deserialize;
use serde_json::Value;

use crate::error::GatewayError;
use crate::idp::{IdpClient, KeycloakGroup, KeycloakRole, KeycloakUser, NewUser, ProxyMethod};

type ApiResult<T> = Result<Json<T>, GatewayError>;

#[derive(Debug, Deserialize)]
pub(super) struct ProxyQuery {
    relative_path: String,
    method: ProxyMethod,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct ProxyBody {
    #[serde(default)]
    additional_headers: Option<HashMap<String, String>>,
    #[serde(default)]
    payload: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub(super) struct CreateUserQuery {
    first_name: String,
    last_name: String,
    email: String,
    password: SecretString,
    id: Option<String>,
    send_email_verification: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub(super) struct UserSearch {
    query: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct NewPassword {
    new_password: SecretString,
}

#[derive(Debug, Deserialize)]
pub(super) struct RoleName {
    role_name: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct CreateGroupQuery {
    group_name: String,
    parent_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct GroupId {
    group_id: String,
}

/// `?roles=a&roles=b`, where each value may also be a comma-separated list.
#[derive(Debug, Default, PartialEq, Eq)]
pub(super) struct RoleList(Vec<String>);

impl RoleList {
    fn from_query(query: Option<&str>) -> Self {
        let names = url::form_urlencoded::parse(query.unwrap_or_default().as_bytes())
            .filter_map(|(key, value)| (key == "roles").then_some(value))
            .flat_map(|value| {
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .collect();
        Self(names)
    }

    fn names(&self) -> &[String] {
        &self.0
    }
}

// Admin

/// POST /proxy
pub(super) async fn proxy(
    State(idp): State<Arc<IdpClient>>,
    Query(query): Query<ProxyQuery>,
    body: Option<Json<ProxyBody>>,
) -> ApiResult<Value> {
    let body = body.map(|Json(body)| body).unwrap_or_default();
    let value = idp
        .proxy(
            &query.relative_path,
            query.method,
            body.additional_headers.unwrap_or_default(),
            body.payload,
        )
        .await?;
    Ok(Json(value))
}

/// GET /identity-providers
pub(super) async fn identity_providers(State(idp): State<Arc<IdpClient>>) -> ApiResult<Vec<Value>> {
    Ok(Json(idp.identity_providers().await?))
}

/// GET /idp-configuration
pub(super) async fn idp_configuration(State(idp): State<Arc<IdpClient>>) -> ApiResult<Value> {
    Ok(Json(idp.open_id_configuration().await?))
}

// User management

/// GET /users
pub(super) async fn all_users(State(idp): State<Arc<IdpClient>>) -> ApiResult<Vec<KeycloakUser>> {
    Ok(Json(idp.all_users().await?))
}

/// GET /user?query=
pub(super) async fn find_user(
    State(idp): State<Arc<IdpClient>>,
    Query(search): Query<UserSearch>,
) -> ApiResult<KeycloakUser> {
    Ok(Json(idp.find_user(&search.query).await?))
}

/// POST /users - the email doubles as username
pub(super) async fn create_user(
    State(idp): State<Arc<IdpClient>>,
    Query(query): Query<CreateUserQuery>,
) -> Result<(StatusCode, Json<KeycloakUser>), GatewayError> {
    let user = NewUser {
        id: query.id,
        username: query.email.clone(),
        email: query.email,
        first_name: query.first_name,
        last_name: query.last_name,
        password: query.password,
        enabled: true,
        initial_roles: Vec::new(),
        send_email_verification: query.send_email_verification.unwrap_or(true),
    };
    Ok((StatusCode::CREATED, Json(idp.create_user(user).await?)))
}

/// GET /user/{user_id}
pub(super) async fn user(
    State(idp): State<Arc<IdpClient>>,
    Path(user_id): Path<String>,
) -> ApiResult<KeycloakUser> {
    Ok(Json(idp.user(&user_id).await?))
}

/// PUT /user
pub(super) async fn update_user(
    State(idp): State<Arc<IdpClient>>,
    Json(user): Json<KeycloakUser>,
) -> ApiResult<KeycloakUser> {
    if user.id.is_none() {
        return Err(GatewayError::bad_request("user id is required"));
    }
    Ok(Json(idp.update_user(&user).await?))
}

/// DELETE /user/{user_id}
pub(super) async fn delete_user(
    State(idp): State<Arc<IdpClient>>,
    Path(user_id): Path<String>,
) -> Result<StatusCode, GatewayError> {
    idp.delete_user(&user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /user/{user_id}/change-password?new_password=
pub(super) async fn change_password(
    State(idp): State<Arc<IdpClient>>,
    Path(user_id): Path<String>,
    Query(query): Query<NewPassword>,
) -> Result<StatusCode, GatewayError> {
    idp.change_password(&user_id, &query.new_password).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /user/{user_id}/send-email-verification
pub(super) async fn send_email_verification(
    State(idp): State<Arc<IdpClient>>,
    Path(user_id): Path<String>,
) -> Result<StatusCode, GatewayError> {
    idp.send_email_verification(&user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// Role management

/// GET /roles
pub(super) async fn all_roles(State(idp): State<Arc<IdpClient>>) -> ApiResult<Vec<KeycloakRole>> {
    Ok(Json(idp.all_roles().await?))
}

/// GET /role/{role_name}
pub(super) async fn role(
    State(idp): State<Arc<IdpClient>>,
    Path(role_name): Path<String>,
) -> ApiResult<Vec<KeycloakRole>> {
    Ok(Json(idp.roles(&[role_name]).await?))
}

/// POST /roles?role_name=
pub(super) async fn create_role(
    State(idp): State<Arc<IdpClient>>,
    Query(query): Query<RoleName>,
) -> Result<(StatusCode, Json<KeycloakRole>), GatewayError> {
    Ok((StatusCode::CREATED, Json(idp.create_role(&query.role_name).await?)))
}

/// DELETE /roles?role_name=
pub(super) async fn delete_role(
    State(idp): State<Arc<IdpClient>>,
    Query(query): Query<RoleName>,
) -> Result<StatusCode, GatewayError> {
    idp.delete_role(&query.role_name).await?;
    Ok(StatusCode::NO_CONTENT)
}

// Group management

/// GET /groups
pub(super) async fn all_groups(State(idp): State<Arc<IdpClient>>) -> ApiResult<Vec<KeycloakGroup>> {
    Ok(Json(idp.all_groups().await?))
}

/// GET /group/{group_name}
pub(super) async fn group(
    State(idp): State<Arc<IdpClient>>,
    Path(group_name): Path<String>,
) -> ApiResult<Vec<KeycloakGroup>> {
    Ok(Json(idp.groups(&[group_name]).await?))
}

/// GET /group-by-path/{*path}
pub(super) async fn group_by_path(
    State(idp): State<Arc<IdpClient>>,
    Path(path): Path<String>,
) -> ApiResult<KeycloakGroup> {
    Ok(Json(idp.group_by_path(&path).await?))
}

/// POST /groups?group_name=&parent_id=
pub(super) async fn create_group(
    State(idp): State<Arc<IdpClient>>,
    Query(query): Query<CreateGroupQuery>,
) -> Result<(StatusCode, Json<KeycloakGroup>), GatewayError> {
    let group = idp
        .create_group(&query.group_name, query.parent_id.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(group)))
}

/// DELETE /groups?group_id=
pub(super) async fn delete_group(
    State(idp): State<Arc<IdpClient>>,
    Query(query): Query<GroupId>,
) -> Result<StatusCode, GatewayError> {
    idp.delete_group(&query.group_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// User roles

/// POST /users/{user_id}/roles?roles=
pub(super) async fn add_user_roles(
    State(idp): State<Arc<IdpClient>>,
    Path(user_id): Path<String>,
    RawQuery(query): RawQuery,
) -> Result<StatusCode, GatewayError> {
    let roles = RoleList::from_query(query.as_deref());
    idp.add_user_roles(&user_id, roles.names()).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /users/{user_id}/roles
pub(super) async fn user_roles(
    State(idp): State<Arc<IdpClient>>,
    Path(user_id): Path<String>,
) -> ApiResult<Vec<KeycloakRole>> {
    Ok(Json(idp.user_roles(&user_id).await?))
}

/// DELETE /users/{user_id}/roles?roles=
pub(super) async fn remove_user_roles(
    State(idp): State<Arc<IdpClient>>,
    Path(user_id): Path<String>,
    RawQuery(query): RawQuery,
) -> Result<StatusCode, GatewayError> {
    let roles = RoleList::from_query(query.as_deref());
    idp.remove_user_roles(&user_id, roles.names()).await?;
    Ok(StatusCode::NO_CONTENT)
}

// User groups

/// POST /users/{user_id}/groups?group_id=
pub(super) async fn add_user_group(
    State(idp): State<Arc<IdpClient>>,
    Path(user_id): Path<String>,
    Query(query): Query<GroupId>,
) -> Result<StatusCode, GatewayError> {
    idp.add_user_group(&user_id, &query.group_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /users/{user_id}/groups
pub(super) async fn user_groups(
    State(idp): State<Arc<IdpClient>>,
    Path(user_id): Path<String>,
) -> ApiResult<Vec<KeycloakGroup>> {
    Ok(Json(idp.user_groups(&user_id).await?))
}

/// DELETE /users/{user_id}/groups?group_id=
pub(super) async fn remove_user_group(
    State(idp): State<Arc<IdpClient>>,
    Path(user_id): Path<String>,
    Query(query): Query<GroupId>,
) -> Result<StatusCode, GatewayError> {
    idp.remove_user_group(&user_id, &query.group_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
