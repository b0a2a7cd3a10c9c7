//! Property-based and transport tests for gateway-common.
//!
//! Outbound failures must land in the category an operator would expect from
//! the log line alone.

use std::time::Duration;

use gateway_common::{HttpConfig, TransportError, build_http_client};
use proptest::prelude::*;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn fetch(url: &str, timeout: Duration) -> Result<String, TransportError> {
    let client = build_http_client(&HttpConfig::default().with_timeout(timeout))?;
    let body = client
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;
    Ok(body)
}

// Any non-success status is reported as an HTTP failure carrying that status.
proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_error_status_classified_as_http(code in 400u16..600) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let err = rt.block_on(async {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/status"))
                .respond_with(ResponseTemplate::new(code))
                .mount(&server)
                .await;
            fetch(&format!("{}/status", server.uri()), Duration::from_secs(2))
                .await
                .unwrap_err()
        });

        prop_assert_eq!(err.category(), "http");
        prop_assert_eq!(err.status().map(|s| s.as_u16()), Some(code));
    }
}

#[tokio::test]
async fn test_success_is_not_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ok"))
        .respond_with(ResponseTemplate::new(200).set_body_string("fine"))
        .mount(&server)
        .await;

    let body = fetch(&format!("{}/ok", server.uri()), Duration::from_secs(2))
        .await
        .unwrap();
    assert_eq!(body, "fine");
}

#[tokio::test]
async fn test_slow_upstream_classified_as_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let err = fetch(&format!("{}/slow", server.uri()), Duration::from_millis(200))
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::Timeout(_)), "got {err:?}");
}

#[tokio::test]
async fn test_closed_port_classified_as_connect() {
    // Bind then release a port so nothing is listening on it.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = fetch(&format!("http://{addr}/"), Duration::from_secs(2))
        .await
        .unwrap_err();
    assert_eq!(err.category(), "connect", "got {err:?}");
}
