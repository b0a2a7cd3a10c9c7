//! Passthrough client and routes against a mocked Keycloak.

mod common;

use std::collections::HashMap;

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use common::{app_state, idp_client, metrics};
use idp_gateway::create_router;
use idp_gateway::idp::{IdpError, NewUser, ProxyMethod};
use secrecy::SecretString;
use serde_json::{Value, json};
use tower::ServiceExt;
use wiremock::matchers::{body_json, body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN_PATH: &str = "/auth/realms/master/protocol/openid-connect/token";
const ADMIN: &str = "/auth/admin/realms/master";

async fn keycloak() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=client_credentials"))
        .and(body_string_contains("client_id=admin-cli"))
        .and(body_string_contains("client_secret=admin-secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "admin-token",
            "expires_in": 300,
            "token_type": "Bearer"
        })))
        .expect(1)
        .mount(&server)
        .await;
    server
}

fn admin_path(tail: &str) -> String {
    format!("{ADMIN}{tail}")
}

#[tokio::test]
async fn test_admin_token_is_cached_across_calls() {
    let server = keycloak().await;
    Mock::given(method("GET"))
        .and(path(admin_path("/users")))
        .and(header("authorization", "Bearer admin-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "u-1", "username": "alice", "enabled": true}
        ])))
        .expect(2)
        .mount(&server)
        .await;

    let metrics = metrics();
    let client = idp_client(&server.uri(), std::sync::Arc::clone(&metrics));
    let first = client.all_users().await.unwrap();
    let second = client.all_users().await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first[0].username.as_deref(), Some("alice"));
    assert_eq!(
        metrics
            .idp_calls
            .with_label_values(&["all_users", "200"])
            .get(),
        2
    );
}

#[tokio::test]
async fn test_find_user_without_match_is_not_found() {
    let server = keycloak().await;
    Mock::given(method("GET"))
        .and(path(admin_path("/users")))
        .and(query_param("username", "ghost"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let client = idp_client(&server.uri(), metrics());
    let err = client.find_user("username=ghost").await.unwrap_err();
    assert!(matches!(err, IdpError::NotFound { .. }));
}

#[tokio::test]
async fn test_create_user_posts_credentials_then_looks_up() {
    let server = keycloak().await;
    Mock::given(method("POST"))
        .and(path(admin_path("/users")))
        .and(body_string_contains(r#""credentials":[{"temporary":false,"type":"password","value":"s3cret"}]"#))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(admin_path("/users")))
        .and(query_param("username", "bob@example.com"))
        .and(query_param("exact", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "u-2", "username": "bob@example.com", "email": "bob@example.com"}
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(admin_path("/roles/user")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "r-1", "name": "user"})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(admin_path("/users/u-2/role-mappings/realm")))
        .and(body_json(json!([{"id": "r-1", "name": "user", "composite": false, "clientRole": false}])))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = idp_client(&server.uri(), metrics());
    let user = client
        .create_user(NewUser {
            id: None,
            username: "bob@example.com".to_string(),
            email: "bob@example.com".to_string(),
            first_name: "Bob".to_string(),
            last_name: "Builder".to_string(),
            password: SecretString::from("s3cret".to_string()),
            enabled: true,
            initial_roles: vec!["user".to_string()],
            send_email_verification: false,
        })
        .await
        .unwrap();

    assert_eq!(user.id.as_deref(), Some("u-2"));
}

#[tokio::test]
async fn test_rejection_keeps_idp_status_and_reason() {
    let server = keycloak().await;
    Mock::given(method("POST"))
        .and(path(admin_path("/roles")))
        .respond_with(
            ResponseTemplate::new(409)
                .set_body_json(json!({"errorMessage": "Role with name admin already exists"})),
        )
        .mount(&server)
        .await;

    let client = idp_client(&server.uri(), metrics());
    match client.create_role("admin").await {
        Err(IdpError::Rejected { status, reason }) => {
            assert_eq!(status.as_u16(), 409);
            assert_eq!(reason, "Role with name admin already exists");
        }
        other => panic!("expected rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn test_groups_are_searched_recursively() {
    let server = keycloak().await;
    Mock::given(method("GET"))
        .and(path(admin_path("/groups")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "g-1", "name": "engineering", "path": "/engineering", "subGroups": [
                {"id": "g-2", "name": "platform", "path": "/engineering/platform"}
            ]},
            {"id": "g-3", "name": "sales", "path": "/sales"}
        ])))
        .mount(&server)
        .await;

    let client = idp_client(&server.uri(), metrics());
    let found = client
        .groups(&["platform".to_string(), "sales".to_string()])
        .await
        .unwrap();
    let ids: Vec<_> = found.iter().filter_map(|g| g.id.as_deref()).collect();
    assert_eq!(ids, vec!["g-2", "g-3"]);

    let err = client.groups(&["marketing".to_string()]).await.unwrap_err();
    assert!(matches!(err, IdpError::NotFound { .. }));
}

#[tokio::test]
async fn test_create_subgroup_resolves_full_path() {
    let server = keycloak().await;
    Mock::given(method("POST"))
        .and(path(admin_path("/groups/g-1/children")))
        .and(body_json(json!({"name": "platform"})))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(admin_path("/groups/g-1")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "g-1", "name": "engineering", "path": "/engineering"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(admin_path("/group-by-path/engineering/platform")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "g-2", "name": "platform", "path": "/engineering/platform"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = idp_client(&server.uri(), metrics());
    let group = client.create_group("platform", Some("g-1")).await.unwrap();
    assert_eq!(group.path.as_deref(), Some("/engineering/platform"));
}

#[tokio::test]
async fn test_user_login_uses_password_grant() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=password"))
        .and(body_string_contains("client_id=gateway"))
        .and(body_string_contains("username=alice"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "user-token",
            "expires_in": 300,
            "refresh_token": "refresh",
            "token_type": "Bearer"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = idp_client(&server.uri(), metrics());
    let tokens = client
        .user_login("alice", &SecretString::from("pw".to_string()))
        .await
        .unwrap();
    assert_eq!(tokens.access_token, "user-token");
    assert_eq!(tokens.refresh_token.as_deref(), Some("refresh"));
}

#[tokio::test]
async fn test_bad_login_is_rejected_with_idp_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Invalid user credentials"
        })))
        .mount(&server)
        .await;

    let client = idp_client(&server.uri(), metrics());
    let err = client
        .user_login("alice", &SecretString::from("wrong".to_string()))
        .await
        .unwrap_err();
    assert!(matches!(err, IdpError::Rejected { status, .. } if status.as_u16() == 401));
}

#[tokio::test]
async fn test_login_route_forwards_idp_reason_without_challenge() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=password"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Invalid user credentials"
        })))
        .mount(&server)
        .await;

    let app = create_router(app_state(&server.uri()));
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/login")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"username": "alice", "password": "wrong"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().get("www-authenticate").is_none());
    let body: Value =
        serde_json::from_slice(&to_bytes(response.into_body(), usize::MAX).await.unwrap()).unwrap();
    assert_eq!(body["message"], "Invalid user credentials");
}

#[test]
fn test_login_and_logout_links() {
    let client = idp_client("http://kc.local:8180", metrics());

    let login = client.login_uri().unwrap();
    assert_eq!(login.path(), "/auth/realms/master/protocol/openid-connect/auth");
    let pairs: HashMap<_, _> = login.query_pairs().into_owned().collect();
    assert_eq!(pairs["response_type"], "code");
    assert_eq!(pairs["client_id"], "gateway");
    assert_eq!(pairs["redirect_uri"], "http://localhost:8281/callback");

    let logout = client.logout_uri().unwrap();
    assert_eq!(logout.path(), "/auth/realms/master/protocol/openid-connect/logout");
    assert!(logout.query().unwrap_or_default().contains("redirect_uri="));
}

#[tokio::test]
async fn test_proxy_forwards_method_and_payload() {
    let server = keycloak().await;
    Mock::given(method("PUT"))
        .and(path("/auth/admin/realms/master/users/u-1"))
        .and(header("x-extra", "yes"))
        .and(body_json(json!({"enabled": false})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = idp_client(&server.uri(), metrics());
    let mut headers = HashMap::new();
    headers.insert("x-extra".to_string(), "yes".to_string());
    let value = client
        .proxy(
            "/admin/realms/master/users/u-1",
            ProxyMethod::Put,
            headers,
            Some(json!({"enabled": false})),
        )
        .await
        .unwrap();
    assert_eq!(value, Value::Null);
}

#[tokio::test]
async fn test_proxy_keeps_query_string() {
    let server = keycloak().await;
    Mock::given(method("GET"))
        .and(path(admin_path("/users")))
        .and(query_param("username", "alice"))
        .and(query_param("exact", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": "u-1"}])))
        .expect(1)
        .mount(&server)
        .await;

    let client = idp_client(&server.uri(), metrics());
    let value = client
        .proxy(
            "/admin/realms/master/users?username=alice&exact=true",
            ProxyMethod::Get,
            HashMap::new(),
            None,
        )
        .await
        .unwrap();
    assert_eq!(value, json!([{"id": "u-1"}]));
}

#[tokio::test]
async fn test_route_forwards_idp_status() {
    let server = keycloak().await;
    Mock::given(method("GET"))
        .and(path(admin_path("/users/missing")))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({"error": "User not found"})),
        )
        .mount(&server)
        .await;

    let app = create_router(app_state(&server.uri()));
    let response = app
        .oneshot(
            Request::builder()
                .uri("/user/missing")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: Value =
        serde_json::from_slice(&to_bytes(response.into_body(), usize::MAX).await.unwrap()).unwrap();
    assert_eq!(body["message"], "User not found");
}

#[tokio::test]
async fn test_route_passes_comma_separated_roles() {
    let server = keycloak().await;
    for name in ["admin", "user"] {
        Mock::given(method("GET"))
            .and(path(admin_path(&format!("/roles/{name}"))))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": name})))
            .mount(&server)
            .await;
    }
    Mock::given(method("DELETE"))
        .and(path(admin_path("/users/u-1/role-mappings/realm")))
        .and(body_json(json!([
            {"name": "admin", "composite": false, "clientRole": false},
            {"name": "user", "composite": false, "clientRole": false}
        ])))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let app = create_router(app_state(&server.uri()));
    let response = app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/users/u-1/roles?roles=admin,user")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_route_accepts_repeated_roles_parameter() {
    let server = keycloak().await;
    for name in ["admin", "user"] {
        Mock::given(method("GET"))
            .and(path(admin_path(&format!("/roles/{name}"))))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": name})))
            .mount(&server)
            .await;
    }
    Mock::given(method("POST"))
        .and(path(admin_path("/users/u-1/role-mappings/realm")))
        .and(body_json(json!([
            {"name": "admin", "composite": false, "clientRole": false},
            {"name": "user", "composite": false, "clientRole": false}
        ])))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let app = create_router(app_state(&server.uri()));
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/users/u-1/roles?roles=admin&roles=user")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_unreachable_idp_is_bad_gateway() {
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let app = create_router(app_state(&format!("http://127.0.0.1:{port}")));

    let response = app
        .oneshot(Request::builder().uri("/users").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}
