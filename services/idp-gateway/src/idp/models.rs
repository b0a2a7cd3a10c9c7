//! Keycloak admin API representations.
//!
//! Only the commonly used fields are typed; everything else round-trips
//! through `extra` so updates never drop attributes.

use std::collections::HashMap;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `UserRepresentation`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeycloakUser {
    /// User id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Login name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Email address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Given name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    /// Family name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    /// Whether the account can log in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    /// Whether the email was verified
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_verified: Option<bool>,
    /// Creation time, unix millis
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_timestamp: Option<i64>,
    /// Actions pending on next login
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required_actions: Vec<String>,
    /// Custom user attributes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<HashMap<String, Vec<String>>>,
    /// Fields not typed above
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

/// `RoleRepresentation`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeycloakRole {
    /// Role id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Role name
    pub name: String,
    /// Free-text description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Whether the role bundles other roles
    #[serde(default)]
    pub composite: bool,
    /// Client role rather than realm role
    #[serde(default)]
    pub client_role: bool,
    /// Realm or client owning the role
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_id: Option<String>,
}

/// `GroupRepresentation`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeycloakGroup {
    /// Group id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Group name
    pub name: String,
    /// Slash-separated path from the root group
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Realm roles granted to members
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub realm_roles: Vec<String>,
    /// Child groups
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sub_groups: Vec<KeycloakGroup>,
}

impl KeycloakGroup {
    /// Depth-first search of this group and its subgroups by name.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&Self> {
        if self.name == name {
            return Some(self);
        }
        self.sub_groups.iter().find_map(|g| g.find(name))
    }
}

/// Token endpoint response for the password and authorization-code grants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OidcTokenResponse {
    /// Bearer access token
    pub access_token: String,
    /// Access token lifetime in seconds
    #[serde(default)]
    pub expires_in: u64,
    /// Refresh token lifetime in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_expires_in: Option<u64>,
    /// Refresh token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Usually `Bearer`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    /// OIDC id token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    /// IdP session id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_state: Option<String>,
    /// Granted scopes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

/// Input to [`crate::idp::IdpClient::create_user`].
#[derive(Debug)]
pub struct NewUser {
    /// Client-chosen id, otherwise assigned by the IdP
    pub id: Option<String>,
    /// Login name
    pub username: String,
    /// Email address
    pub email: String,
    /// Given name
    pub first_name: String,
    /// Family name
    pub last_name: String,
    /// Initial password
    pub password: SecretString,
    /// Whether the account can log in right away
    pub enabled: bool,
    /// Realm roles granted right after creation
    pub initial_roles: Vec<String>,
    /// Ask the IdP to send its verify-email mail
    pub send_email_verification: bool,
}
