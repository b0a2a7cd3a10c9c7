//! Keycloak REST client.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use gateway_common::{HttpConfig, build_http_client};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};
use url::Url;

use super::error::{IdpError, reason_from_body};
use super::models::{KeycloakGroup, KeycloakRole, KeycloakUser, NewUser, OidcTokenResponse};
use crate::config::{Config, idp_endpoint};
use crate::observability::GatewayMetrics;

/// Client used for the admin token grant.
const ADMIN_CLIENT_ID: &str = "admin-cli";

/// Admin tokens are refreshed this long before they expire.
const REFRESH_MARGIN: Duration = Duration::from_secs(10);

/// HTTP methods accepted by [`IdpClient::proxy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProxyMethod {
    /// GET
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// PATCH
    Patch,
    /// DELETE
    Delete,
}

impl From<ProxyMethod> for Method {
    fn from(method: ProxyMethod) -> Self {
        match method {
            ProxyMethod::Get => Self::GET,
            ProxyMethod::Post => Self::POST,
            ProxyMethod::Put => Self::PUT,
            ProxyMethod::Patch => Self::PATCH,
            ProxyMethod::Delete => Self::DELETE,
        }
    }
}

struct AdminToken {
    value: SecretString,
    refresh_at: Instant,
}

/// Client for one realm of the identity provider.
///
/// Admin calls authenticate with a `client_credentials` token for
/// `admin-cli`, cached until shortly before it expires.
pub struct IdpClient {
    http: Client,
    base_url: Url,
    realm: String,
    client_id: String,
    client_secret: SecretString,
    admin_secret: SecretString,
    callback_uri: Url,
    admin_token: Mutex<Option<AdminToken>>,
    metrics: Arc<GatewayMetrics>,
}

impl std::fmt::Debug for IdpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdpClient")
            .field("base_url", &self.base_url.as_str())
            .field("realm", &self.realm)
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

impl IdpClient {
    /// Builds a client from the gateway configuration.
    pub fn new(config: &Config, metrics: Arc<GatewayMetrics>) -> Result<Self, IdpError> {
        let http = build_http_client(&HttpConfig::default().with_timeout(config.idp_timeout()))?;

        Ok(Self {
            http,
            base_url: config.idp_base_url.clone(),
            realm: config.realm.clone(),
            client_id: config.client_id.clone(),
            client_secret: SecretString::from(config.client_secret.expose_secret().to_owned()),
            admin_secret: SecretString::from(
                config.admin_client_secret.expose_secret().to_owned(),
            ),
            callback_uri: config.callback_uri.clone(),
            admin_token: Mutex::new(None),
            metrics,
        })
    }

    // ------------------------------------------------------------------
    // Admin
    // ------------------------------------------------------------------

    /// Forwards an arbitrary admin call to `{base}/auth{relative_path}`.
    ///
    /// A query string in `relative_path` is passed through as is.
    #[instrument(skip(self, headers, payload))]
    pub async fn proxy(
        &self,
        relative_path: &str,
        method: ProxyMethod,
        headers: HashMap<String, String>,
        payload: Option<Value>,
    ) -> Result<Value, IdpError> {
        let (path, query) = match relative_path.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (relative_path, None),
        };
        let mut segments = vec!["auth"];
        segments.extend(path.split('/').filter(|s| !s.is_empty()));
        let mut url = idp_endpoint(&self.base_url, &segments)?;
        url.set_query(query.filter(|q| !q.is_empty()));

        let mut request = self.admin(method.into(), url).await?.headers(to_header_map(&headers)?);
        if let Some(payload) = payload {
            request = request.json(&payload);
        }

        let response = self.send("proxy", request).await?;
        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&body).unwrap_or(Value::String(body)))
    }

    /// Identity providers configured in the realm.
    pub async fn identity_providers(&self) -> Result<Vec<Value>, IdpError> {
        let url = self.admin_url(&["identity-provider", "instances"])?;
        self.admin_json("identity_providers", Method::GET, url).await
    }

    /// The realm's OpenID Connect discovery document.
    pub async fn open_id_configuration(&self) -> Result<Value, IdpError> {
        let url = self.realm_url(&[".well-known", "openid-configuration"])?;
        Ok(self
            .send("open_id_configuration", self.http.get(url))
            .await?
            .json()
            .await?)
    }

    // ------------------------------------------------------------------
    // Users
    // ------------------------------------------------------------------

    /// Every user of the realm.
    pub async fn all_users(&self) -> Result<Vec<KeycloakUser>, IdpError> {
        let url = self.admin_url(&["users"])?;
        self.admin_json("all_users", Method::GET, url).await
    }

    /// First user matching a raw admin search query such as `username=alice`.
    pub async fn find_user(&self, query: &str) -> Result<KeycloakUser, IdpError> {
        let mut url = self.admin_url(&["users"])?;
        url.set_query(Some(query));
        let users: Vec<KeycloakUser> = self.admin_json("find_user", Method::GET, url).await?;
        users
            .into_iter()
            .next()
            .ok_or_else(|| IdpError::not_found(format!("User matching [{query}]")))
    }

    /// One user by id.
    pub async fn user(&self, user_id: &str) -> Result<KeycloakUser, IdpError> {
        let url = self.admin_url(&["users", user_id])?;
        self.admin_json("user", Method::GET, url).await
    }

    /// Creates a user with a permanent password and returns it as stored.
    #[instrument(skip(self, user), fields(username = %user.username))]
    pub async fn create_user(&self, user: NewUser) -> Result<KeycloakUser, IdpError> {
        let required_actions: &[&str] = if user.send_email_verification {
            &["VERIFY_EMAIL"]
        } else {
            &[]
        };
        let mut body = json!({
            "username": user.username,
            "email": user.email,
            "firstName": user.first_name,
            "lastName": user.last_name,
            "enabled": user.enabled,
            "credentials": [password_credential(&user.password)],
            "requiredActions": required_actions,
        });
        if let Some(id) = &user.id {
            body["id"] = json!(id);
        }

        let url = self.admin_url(&["users"])?;
        let request = self.admin(Method::POST, url).await?.json(&body);
        self.send("create_user", request).await?;

        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("username", &user.username)
            .append_pair("exact", "true")
            .finish();
        let created = self.find_user(&query).await?;
        let created_id = created
            .id
            .clone()
            .ok_or_else(|| IdpError::not_found(format!("Id of user {}", user.username)))?;

        if !user.initial_roles.is_empty() {
            self.add_user_roles(&created_id, &user.initial_roles).await?;
        }
        if user.send_email_verification {
            self.send_email_verification(&created_id).await?;
        }
        Ok(created)
    }

    /// Replaces a user's representation. `user.id` selects the user.
    pub async fn update_user(&self, user: &KeycloakUser) -> Result<KeycloakUser, IdpError> {
        let user_id = user.id.as_deref().ok_or_else(|| IdpError::InvalidRequest {
            reason: "user id is required".to_string(),
        })?;
        let url = self.admin_url(&["users", user_id])?;
        let request = self.admin(Method::PUT, url).await?.json(user);
        self.send("update_user", request).await?;
        self.user(user_id).await
    }

    /// Deletes a user.
    pub async fn delete_user(&self, user_id: &str) -> Result<(), IdpError> {
        let url = self.admin_url(&["users", user_id])?;
        self.admin_empty("delete_user", Method::DELETE, url).await
    }

    /// Sets a new permanent password.
    pub async fn change_password(
        &self,
        user_id: &str,
        new_password: &SecretString,
    ) -> Result<(), IdpError> {
        let url = self.admin_url(&["users", user_id, "reset-password"])?;
        let body = password_credential(new_password);
        self.admin_with_body("change_password", Method::PUT, url, &body)
            .await
    }

    /// Asks the IdP to mail the user an email verification link.
    pub async fn send_email_verification(&self, user_id: &str) -> Result<(), IdpError> {
        let url = self.admin_url(&["users", user_id, "send-verify-email"])?;
        self.admin_empty("send_email_verification", Method::PUT, url)
            .await
    }

    // ------------------------------------------------------------------
    // Roles
    // ------------------------------------------------------------------

    /// Every realm role.
    pub async fn all_roles(&self) -> Result<Vec<KeycloakRole>, IdpError> {
        let url = self.admin_url(&["roles"])?;
        self.admin_json("all_roles", Method::GET, url).await
    }

    /// Realm roles by name, in the order given.
    pub async fn roles(&self, names: &[String]) -> Result<Vec<KeycloakRole>, IdpError> {
        let mut roles = Vec::with_capacity(names.len());
        for name in names {
            let url = self.admin_url(&["roles", name])?;
            roles.push(self.admin_json("role", Method::GET, url).await?);
        }
        Ok(roles)
    }

    /// Creates a realm role and returns it as stored.
    pub async fn create_role(&self, name: &str) -> Result<KeycloakRole, IdpError> {
        let url = self.admin_url(&["roles"])?;
        let body = json!({ "name": name });
        self.admin_with_body("create_role", Method::POST, url, &body)
            .await?;

        let url = self.admin_url(&["roles", name])?;
        self.admin_json("role", Method::GET, url).await
    }

    /// Deletes a realm role.
    pub async fn delete_role(&self, name: &str) -> Result<(), IdpError> {
        let url = self.admin_url(&["roles", name])?;
        self.admin_empty("delete_role", Method::DELETE, url).await
    }

    // ------------------------------------------------------------------
    // Groups
    // ------------------------------------------------------------------

    /// Top-level groups with their subgroup trees.
    pub async fn all_groups(&self) -> Result<Vec<KeycloakGroup>, IdpError> {
        let url = self.admin_url(&["groups"])?;
        self.admin_json("all_groups", Method::GET, url).await
    }

    /// Groups by name, searched through the whole tree.
    pub async fn groups(&self, names: &[String]) -> Result<Vec<KeycloakGroup>, IdpError> {
        let tree = self.all_groups().await?;
        names
            .iter()
            .map(|name| {
                tree.iter()
                    .find_map(|group| group.find(name))
                    .cloned()
                    .ok_or_else(|| IdpError::not_found(format!("Group {name}")))
            })
            .collect()
    }

    /// Group by its full path, e.g. `/engineering/platform`.
    pub async fn group_by_path(&self, path: &str) -> Result<KeycloakGroup, IdpError> {
        let mut segments = vec!["group-by-path"];
        segments.extend(path.split('/').filter(|s| !s.is_empty()));
        let url = self.admin_url(&segments)?;
        self.admin_json("group_by_path", Method::GET, url).await
    }

    /// Creates a group, as a child of `parent_id` when given.
    pub async fn create_group(
        &self,
        name: &str,
        parent_id: Option<&str>,
    ) -> Result<KeycloakGroup, IdpError> {
        let body = json!({ "name": name });
        let path = match parent_id {
            Some(parent_id) => {
                let url = self.admin_url(&["groups", parent_id, "children"])?;
                self.admin_with_body("create_group", Method::POST, url, &body)
                    .await?;

                let url = self.admin_url(&["groups", parent_id])?;
                let parent: KeycloakGroup = self.admin_json("group", Method::GET, url).await?;
                let parent_path = parent.path.unwrap_or_else(|| format!("/{}", parent.name));
                format!("{}/{name}", parent_path.trim_end_matches('/'))
            }
            None => {
                let url = self.admin_url(&["groups"])?;
                self.admin_with_body("create_group", Method::POST, url, &body)
                    .await?;
                format!("/{name}")
            }
        };

        self.group_by_path(&path).await
    }

    /// Deletes a group and its subgroups.
    pub async fn delete_group(&self, group_id: &str) -> Result<(), IdpError> {
        let url = self.admin_url(&["groups", group_id])?;
        self.admin_empty("delete_group", Method::DELETE, url).await
    }

    // ------------------------------------------------------------------
    // User roles and groups
    // ------------------------------------------------------------------

    /// Grants realm roles to a user.
    pub async fn add_user_roles(&self, user_id: &str, roles: &[String]) -> Result<(), IdpError> {
        if roles.is_empty() {
            return Ok(());
        }
        let representations = self.roles(roles).await?;
        let url = self.admin_url(&["users", user_id, "role-mappings", "realm"])?;
        self.admin_with_body("add_user_roles", Method::POST, url, &representations)
            .await
    }

    /// Realm roles mapped to a user.
    pub async fn user_roles(&self, user_id: &str) -> Result<Vec<KeycloakRole>, IdpError> {
        let url = self.admin_url(&["users", user_id, "role-mappings", "realm"])?;
        self.admin_json("user_roles", Method::GET, url).await
    }

    /// Revokes realm roles from a user.
    pub async fn remove_user_roles(&self, user_id: &str, roles: &[String]) -> Result<(), IdpError> {
        if roles.is_empty() {
            return Ok(());
        }
        let representations = self.roles(roles).await?;
        let url = self.admin_url(&["users", user_id, "role-mappings", "realm"])?;
        self.admin_with_body("remove_user_roles", Method::DELETE, url, &representations)
            .await
    }

    /// Adds a user to a group.
    pub async fn add_user_group(&self, user_id: &str, group_id: &str) -> Result<(), IdpError> {
        let url = self.admin_url(&["users", user_id, "groups", group_id])?;
        self.admin_empty("add_user_group", Method::PUT, url).await
    }

    /// Groups a user belongs to.
    pub async fn user_groups(&self, user_id: &str) -> Result<Vec<KeycloakGroup>, IdpError> {
        let url = self.admin_url(&["users", user_id, "groups"])?;
        self.admin_json("user_groups", Method::GET, url).await
    }

    /// Removes a user from a group.
    pub async fn remove_user_group(&self, user_id: &str, group_id: &str) -> Result<(), IdpError> {
        let url = self.admin_url(&["users", user_id, "groups", group_id])?;
        self.admin_empty("remove_user_group", Method::DELETE, url)
            .await
    }

    // ------------------------------------------------------------------
    // Auth flow
    // ------------------------------------------------------------------

    /// Resource-owner password grant against the configured client.
    #[instrument(skip(self, password))]
    pub async fn user_login(
        &self,
        username: &str,
        password: &SecretString,
    ) -> Result<OidcTokenResponse, IdpError> {
        let mut form = vec![
            ("client_id", self.client_id.as_str()),
            ("grant_type", "password"),
            ("username", username),
            ("password", password.expose_secret()),
        ];
        self.push_client_secret(&mut form);
        self.token_grant("user_login", &form).await
    }

    /// Browser URL starting the authorization-code flow.
    pub fn login_uri(&self) -> Result<Url, IdpError> {
        let mut url = self.oidc_url("auth")?;
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", self.callback_uri.as_str());
        Ok(url)
    }

    /// Browser URL ending the IdP session.
    pub fn logout_uri(&self) -> Result<Url, IdpError> {
        let mut url = self.oidc_url("logout")?;
        url.query_pairs_mut()
            .append_pair("redirect_uri", self.callback_uri.as_str());
        Ok(url)
    }

    /// Trades an authorization code for tokens at the IdP's token endpoint.
    #[instrument(skip(self, code))]
    pub async fn exchange_authorization_code(
        &self,
        session_state: &str,
        code: &str,
    ) -> Result<OidcTokenResponse, IdpError> {
        let mut form = vec![
            ("client_id", self.client_id.as_str()),
            ("grant_type", "authorization_code"),
            ("code", code),
            ("session_state", session_state),
            ("redirect_uri", self.callback_uri.as_str()),
        ];
        self.push_client_secret(&mut form);
        self.token_grant("exchange_authorization_code", &form).await
    }

    // ------------------------------------------------------------------
    // Plumbing
    // ------------------------------------------------------------------

    fn realm_url(&self, tail: &[&str]) -> Result<Url, IdpError> {
        let mut segments = vec!["auth", "realms", self.realm.as_str()];
        segments.extend_from_slice(tail);
        Ok(idp_endpoint(&self.base_url, &segments)?)
    }

    fn admin_url(&self, tail: &[&str]) -> Result<Url, IdpError> {
        let mut segments = vec!["auth", "admin", "realms", self.realm.as_str()];
        segments.extend_from_slice(tail);
        Ok(idp_endpoint(&self.base_url, &segments)?)
    }

    fn oidc_url(&self, endpoint: &str) -> Result<Url, IdpError> {
        self.realm_url(&["protocol", "openid-connect", endpoint])
    }

    fn push_client_secret<'a>(&'a self, form: &mut Vec<(&'a str, &'a str)>) {
        let secret = self.client_secret.expose_secret();
        if !secret.is_empty() {
            form.push(("client_secret", secret));
        }
    }

    async fn token_grant(
        &self,
        operation: &'static str,
        form: &[(&str, &str)],
    ) -> Result<OidcTokenResponse, IdpError> {
        let url = self.oidc_url("token")?;
        Ok(self
            .send(operation, self.http.post(url).form(form))
            .await?
            .json()
            .await?)
    }

    /// Request builder carrying a valid admin bearer token.
    async fn admin(&self, method: Method, url: Url) -> Result<RequestBuilder, IdpError> {
        let mut cached = self.admin_token.lock().await;

        if cached.as_ref().is_none_or(|token| token.refresh_at <= Instant::now()) {
            let form = [
                ("client_id", ADMIN_CLIENT_ID),
                ("grant_type", "client_credentials"),
                ("client_secret", self.admin_secret.expose_secret()),
            ];
            let granted = self.token_grant("admin_token", &form).await?;
            let lifetime = Duration::from_secs(granted.expires_in).saturating_sub(REFRESH_MARGIN);
            debug!(expires_in = granted.expires_in, "Admin token refreshed");

            *cached = Some(AdminToken {
                value: SecretString::from(granted.access_token),
                refresh_at: Instant::now() + lifetime,
            });
        }

        let token = cached.as_ref().ok_or_else(|| IdpError::InvalidRequest {
            reason: "admin token unavailable".to_string(),
        })?;
        Ok(self
            .http
            .request(method, url)
            .bearer_auth(token.value.expose_secret()))
    }

    async fn admin_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        method: Method,
        url: Url,
    ) -> Result<T, IdpError> {
        let request = self.admin(method, url).await?;
        Ok(self.send(operation, request).await?.json().await?)
    }

    async fn admin_empty(
        &self,
        operation: &'static str,
        method: Method,
        url: Url,
    ) -> Result<(), IdpError> {
        let request = self.admin(method, url).await?;
        self.send(operation, request).await?;
        Ok(())
    }

    async fn admin_with_body<B: Serialize + ?Sized>(
        &self,
        operation: &'static str,
        method: Method,
        url: Url,
        body: &B,
    ) -> Result<(), IdpError> {
        let request = self.admin(method, url).await?.json(body);
        self.send(operation, request).await?;
        Ok(())
    }

    /// Sends a request, records it, and turns non-2xx answers into
    /// [`IdpError::Rejected`].
    async fn send(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<Response, IdpError> {
        let started = Instant::now();
        let result = check_status(request.send().await).await;

        let status = match &result {
            Ok(response) => response.status().as_u16().to_string(),
            Err(err) => err.status_label(),
        };
        self.metrics
            .record_idp_call(operation, &status, started.elapsed().as_secs_f64());

        if let Err(err) = &result {
            warn!(operation, status = %status, error = %err, "Identity provider call failed");
        }
        result
    }
}

async fn check_status(sent: Result<Response, reqwest::Error>) -> Result<Response, IdpError> {
    let response = sent?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(IdpError::Rejected {
        status,
        reason: reason_from_body(&body),
    })
}

fn password_credential(password: &SecretString) -> Value {
    json!({
        "temporary": false,
        "type": "password",
        "value": password.expose_secret(),
    })
}

fn to_header_map(headers: &HashMap<String, String>) -> Result<HeaderMap, IdpError> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| IdpError::InvalidRequest {
            reason: format!("invalid header name {name:?}: {e}"),
        })?;
        let value = HeaderValue::from_str(value).map_err(|e| IdpError::InvalidRequest {
            reason: format!("invalid value for header {name}: {e}"),
        })?;
        map.insert(name, value);
    }
    Ok(map)
}
