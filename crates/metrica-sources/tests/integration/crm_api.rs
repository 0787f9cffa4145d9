//! CRM adapter against a mock search endpoint.

use metrica_core::LocationCode;
use metrica_sources::{CrmClient, CrmSettings, CrmSource, SourceError};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{CRM_TOKEN, config, credentials, json_body, window};

fn client(server: &MockServer) -> CrmClient {
    let settings = CrmSettings {
        base_url: server.uri(),
        location_property: "location".to_string(),
        lead_date_property: "hs_lifecyclestage_lead_date".to_string(),
        closed_stage: "closedwon".to_string(),
        page_size: 2,
    };
    CrmClient::new(settings, &credentials(), config()).unwrap()
}

#[tokio::test]
async fn test_new_members_follow_after_cursor() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/crm/v3/objects/deals/search"))
        .and(body_partial_json(json!({"after": "c2"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                {"id": "3", "properties": {"location": "Long Island City"}},
                {"id": "4", "properties": {"location": null}}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/crm/v3/objects/deals/search"))
        .and(header("authorization", format!("Bearer {CRM_TOKEN}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                {"id": "1", "properties": {"location": "Brooklyn"}},
                {"id": "2", "properties": {"location": "BK"}}
            ],
            "paging": {"next": {"after": "c2"}}
        })))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;

    let members = client(&server).new_members(&window("2024-06")).await.unwrap();

    assert_eq!(members.get(&LocationCode::from("BK")), 2.0);
    assert_eq!(members.get(&LocationCode::from("LIC")), 1.0);
    assert_eq!(members.len(), 2);

    let requests = server.received_requests().await.unwrap();
    let first = json_body(&requests[0]);
    assert!(first.get("after").is_none());
    assert_eq!(first["limit"], 2);
    let filters = first["filterGroups"][0]["filters"].as_array().unwrap();
    assert_eq!(filters[0]["propertyName"], "dealstage");
    assert_eq!(filters[0]["operator"], "EQ");
    assert_eq!(filters[0]["value"], "closedwon");
    assert_eq!(filters[1]["propertyName"], "closedate");
    assert_eq!(filters[1]["operator"], "BETWEEN");
}

#[tokio::test]
async fn test_leads_filter_on_lead_date() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/crm/v3/objects/contacts/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                {"id": "10", "properties": {"location": "Brooklyn"}},
                {"id": "11", "properties": {"location": "Hoboken"}}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let leads = client(&server).leads(&window("2024-06")).await.unwrap();
    assert_eq!(leads.get(&LocationCode::from("BK")), 1.0);
    assert_eq!(leads.len(), 1);

    let requests = server.received_requests().await.unwrap();
    let filter = &json_body(&requests[0])["filterGroups"][0]["filters"][0];
    assert_eq!(filter["propertyName"], "hs_lifecyclestage_lead_date");
    // 2024-06-01T00:00:00Z through 2024-06-30T23:59:59.999Z
    assert_eq!(filter["value"], "1717200000000");
    assert_eq!(filter["highValue"], "1719791999999");
}

#[tokio::test]
async fn test_unauthorized_search_is_an_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("token expired"))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server).leads(&window("2024-06")).await.unwrap_err();
    assert!(matches!(err, SourceError::Api { status: 401, .. }));
    assert!(err.to_string().contains("token expired"));
}
