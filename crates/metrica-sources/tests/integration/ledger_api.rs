//! Ledger adapter against a mock query endpoint.

use metrica_core::LocationCode;
use metrica_sources::{AccountFilter, LedgerClient, LedgerQuery, LedgerSettings, LedgerSource};
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{LEDGER_TOKEN, config, credentials, json_body, window};

const QUERY_PATH: &str = "/query/v1/suiteql";

fn client(server: &MockServer, page_size: u32) -> LedgerClient {
    let settings = LedgerSettings {
        base_url: server.uri(),
        revenue_account_type: "Income".to_string(),
        spend_account_numbers: vec!["6100".to_string(), "6110".to_string()],
        page_size,
    };
    LedgerClient::new(settings, &credentials(), config()).unwrap()
}

#[tokio::test]
async fn test_spend_follows_offset_pages() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(QUERY_PATH))
        .and(header("authorization", format!("Bearer {LEDGER_TOKEN}").as_str()))
        .and(query_param("limit", "2"))
        .and(query_param("offset", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [
                {"location": "Brooklyn", "amount": "100.50"},
                {"location": null, "amount": 40}
            ],
            "hasMore": true
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(QUERY_PATH))
        .and(query_param("offset", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [
                {"location": "Long Island City", "amount": "75"},
                {"location": "Headquarters", "amount": "10"}
            ],
            "hasMore": false
        })))
        .expect(1)
        .mount(&server)
        .await;

    let spend = client(&server, 2).spend(&window("2024-02")).await.unwrap();

    assert_eq!(spend.get(&LocationCode::from("BK")), 100.5);
    assert_eq!(spend.get(&LocationCode::from("LIC")), 75.0);
    assert_eq!(spend.get(&LocationCode::corp()), 50.0);

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
    let statement = json_body(&requests[0])["q"].as_str().unwrap().to_string();
    assert!(statement.contains("a.acctnumber IN ('6100', '6110')"));
    assert!(statement.contains("TO_DATE('2024-02-29', 'YYYY-MM-DD')"));
}

#[tokio::test]
async fn test_revenue_is_restricted_to_known_locations() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(QUERY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{"location": "Brooklyn", "amount": "-2500.00"}],
            "hasMore": false
        })))
        .expect(1)
        .mount(&server)
        .await;

    let revenue = client(&server, 1000).revenue(&window("2024-03")).await.unwrap();
    assert_eq!(revenue.get(&LocationCode::from("BK")), -2500.0);

    let requests = server.received_requests().await.unwrap();
    let statement = json_body(&requests[0])["q"].as_str().unwrap().to_string();
    assert!(statement.contains("a.accttype = 'Income'"));
    assert!(statement.contains("'Brooklyn'"));
    assert!(!statement.contains("'Headquarters'"));
}

#[tokio::test]
async fn test_has_more_with_empty_page_stops() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(QUERY_PATH))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"items": [], "hasMore": true})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let query = LedgerQuery::for_window(&window("2024-02"), AccountFilter::Type("Income".into()));
    let rows = client(&server, 50).query(&query).await.unwrap();
    assert!(rows.is_empty());
}
