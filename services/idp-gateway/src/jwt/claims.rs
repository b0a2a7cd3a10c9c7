//! Access token claims as issued by the IdP.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Role list as the IdP embeds it under `realm_access` and `resource_access`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleClaim {
    /// Role names
    #[serde(default)]
    pub roles: Vec<String>,
}

/// Payload of an IdP access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Expiry, unix seconds
    pub exp: i64,
    /// Issued at, unix seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    /// Subject id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    /// Issuer URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    /// Carried but never checked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<serde_json::Value>,
    /// Login name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_username: Option<String>,
    /// Email address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Space-separated granted scopes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Realm roles
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub realm_access: Option<RoleClaim>,
    /// Client roles keyed by client id
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub resource_access: HashMap<String, RoleClaim>,
    /// Every other claim
    #[serde(flatten)]
    pub custom: HashMap<String, serde_json::Value>,
}

impl Claims {
    /// `exp` strictly before `now` (unix seconds) means expired.
    pub const fn is_expired_at(&self, now: i64) -> bool {
        self.exp < now
    }

    /// Realm roles, plus the roles of `client_id` when given.
    pub fn roles(&self, client_id: Option<&str>) -> BTreeSet<String> {
        let realm = self.realm_access.iter().flat_map(|r| r.roles.iter());
        let client = client_id
            .and_then(|id| self.resource_access.get(id))
            .into_iter()
            .flat_map(|r| r.roles.iter());
        realm.chain(client).cloned().collect()
    }
}
