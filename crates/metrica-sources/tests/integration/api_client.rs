//! Retry and error mapping of the shared HTTP client.

use metrica_sources::{ApiClient, BearerSigner, SourceError};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> ApiClient {
    ApiClient::new("test", server.uri(), Arc::new(BearerSigner::new("secret")))
        .unwrap()
        .with_min_retry_delay(Duration::from_millis(5))
}

#[tokio::test]
async fn test_server_error_is_retried_then_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/status"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let body: Value = client(&server).get_json("status", &[]).await.unwrap();
    assert_eq!(body["ok"], true);
}

#[tokio::test]
async fn test_rate_limit_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([1, 2])))
        .expect(1)
        .mount(&server)
        .await;

    let body: Vec<u8> = client(&server).post_json("search", &[], &json!({})).await.unwrap();
    assert_eq!(body, vec![1, 2]);
}

#[tokio::test]
async fn test_client_error_fails_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(400).set_body_string("unknown property"))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server).get_json::<Value>("status", &[]).await.unwrap_err();
    match err {
        SourceError::Api {
            service,
            status,
            body,
        } => {
            assert_eq!(service, "test");
            assert_eq!(status, 400);
            assert_eq!(body, "unknown property");
        }
        other => unreachable!("expected api error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_persistent_server_error_gives_up_after_retries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .expect(4)
        .mount(&server)
        .await;

    let err = client(&server).get_json::<Value>("status", &[]).await.unwrap_err();
    assert!(matches!(err, SourceError::Api { status: 500, .. }));
}

#[tokio::test]
async fn test_malformed_body_is_a_parse_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server).get_json::<Value>("status", &[]).await.unwrap_err();
    assert!(matches!(err, SourceError::Parse { service: "test", .. }));
}

#[tokio::test]
async fn test_requests_carry_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("authorization", "Bearer secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let body: Value = client(&server).get_json("status", &[]).await.unwrap();
    assert!(body.as_object().unwrap().is_empty());
}
