//! Membership API adapter against a mock counts endpoint.

use metrica_core::LocationCode;
use metrica_sources::{MembershipApiClient, MembershipSource};
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{MEMBERSHIP_TOKEN, config, credentials, key};

#[tokio::test]
async fn test_counts_follow_cursor_pages() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/memberships/counts"))
        .and(query_param("cursor", "m2"))
        .and(query_param("month", "2024-06"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {"location": "Long Island City", "active": 80},
                {"location": "Hoboken", "active": 5}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/memberships/counts"))
        .and(header("authorization", format!("Bearer {MEMBERSHIP_TOKEN}").as_str()))
        .and(query_param("month", "2024-06"))
        .and(query_param("limit", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"location": "BK", "active": 120}],
            "next_cursor": "m2"
        })))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;

    let client = MembershipApiClient::new(server.uri(), 1, &credentials(), config()).unwrap();
    let counts = client.counts(key("2024-06")).await.unwrap();

    assert_eq!(counts.get(&LocationCode::from("BK")), Some(&120));
    assert_eq!(counts.get(&LocationCode::from("LIC")), Some(&80));
    assert_eq!(counts.len(), 2);
}

#[tokio::test]
async fn test_missing_membership_token_is_rejected() {
    let mut credentials = credentials();
    credentials.membership_token = None;
    let result = MembershipApiClient::new("http://localhost:9", 10, &credentials, config());
    assert!(result.is_err());
}
