//! CRM search adapter.
//!
//! Leads are contacts whose lead-stage timestamp falls in the month; new
//! members are deals in the closed-won stage whose close date falls in the
//! month. Both come from the CRM object search endpoint, which pages with
//! an opaque `after` cursor.

use crate::error::Result;
use crate::http::{ApiClient, BearerSigner};
use crate::pagination::{MAX_PAGES, Page, collect_pages};
use crate::{CrmSource, Credentials};
use async_trait::async_trait;
use chrono::NaiveTime;
use metrica_core::{KpiConfig, MetricMap, MonthWindow};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

const SERVICE: &str = "crm";
const MAX_SEARCH_LIMIT: u32 = 100;
const DAY_MILLIS: i64 = 86_400_000;

/// `[crm]` configuration section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CrmSettings {
    /// Base URL of the CRM API
    pub base_url: String,

    /// Record property holding the location name
    #[serde(default = "default_location_property")]
    pub location_property: String,

    /// Contact property holding the lead-stage timestamp
    #[serde(default = "default_lead_date_property")]
    pub lead_date_property: String,

    /// Deal stage identifier meaning "closed won"
    pub closed_stage: String,

    /// Records per page (the search endpoint caps this at 100)
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_location_property() -> String {
    "location".to_string()
}

fn default_lead_date_property() -> String {
    "hs_lifecyclestage_lead_date".to_string()
}

fn default_page_size() -> u32 {
    MAX_SEARCH_LIMIT
}

/// Comparison used by a search filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FilterOperator {
    /// Equal to `value`
    Eq,
    /// Between `value` and `high_value`, inclusive
    Between,
}

/// One property filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyFilter {
    /// Property name
    pub property_name: String,
    /// Comparison
    pub operator: FilterOperator,
    /// Operand
    pub value: String,
    /// Upper bound for [`FilterOperator::Between`]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub high_value: Option<String>,
}

impl PropertyFilter {
    /// `property == value`.
    pub fn equals(property: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            property_name: property.into(),
            operator: FilterOperator::Eq,
            value: value.into(),
            high_value: None,
        }
    }

    /// `property` within `window`, as epoch milliseconds covering whole days.
    pub fn within(property: impl Into<String>, window: &MonthWindow) -> Self {
        let (low, high) = window_millis(window);
        Self {
            property_name: property.into(),
            operator: FilterOperator::Between,
            value: low.to_string(),
            high_value: Some(high.to_string()),
        }
    }
}

/// First and last millisecond (UTC) of `window`.
pub fn window_millis(window: &MonthWindow) -> (i64, i64) {
    let start = window.start.and_time(NaiveTime::MIN).and_utc().timestamp_millis();
    let end = window.end.and_time(NaiveTime::MIN).and_utc().timestamp_millis() + DAY_MILLIS - 1;
    (start, end)
}

/// Search request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    /// Filters, all of which must match
    pub filter_groups: Vec<FilterGroup>,
    /// Properties to return on each record
    pub properties: Vec<String>,
    /// Page size
    pub limit: u32,
    /// Continuation cursor
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,
}

/// A conjunction of filters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterGroup {
    /// Filters ANDed together
    pub filters: Vec<PropertyFilter>,
}

/// One CRM record.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CrmRecord {
    /// Record id
    pub id: String,
    /// Requested properties; values may be null
    #[serde(default)]
    pub properties: BTreeMap<String, Option<String>>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<CrmRecord>,
    #[serde(default)]
    paging: Option<Paging>,
}

#[derive(Debug, Deserialize)]
struct Paging {
    next: Option<NextPage>,
}

#[derive(Debug, Deserialize)]
struct NextPage {
    after: String,
}

impl SearchResponse {
    fn into_page(self) -> Page<CrmRecord> {
        Page {
            items: self.results,
            next_cursor: self.paging.and_then(|p| p.next).map(|n| n.after),
        }
    }
}

/// Counts records per location code.
///
/// Records with no location, or a location name that does not map to a
/// configured code, are not counted.
pub fn count_by_location(
    records: &[CrmRecord],
    location_property: &str,
    config: &KpiConfig,
) -> MetricMap {
    let mut map = MetricMap::new();
    let mut unmapped = 0usize;
    for record in records {
        let code = record
            .properties
            .get(location_property)
            .and_then(|v| v.as_deref())
            .and_then(|name| config.resolve_name(name));
        match code {
            Some(code) => map.add(code, 1.0),
            None => unmapped += 1,
        }
    }
    if unmapped > 0 {
        tracing::debug!(unmapped, total = records.len(), "CRM records without a known location");
    }
    map
}

/// HTTP client for the CRM search API.
#[derive(Debug, Clone)]
pub struct CrmClient {
    api: ApiClient,
    settings: CrmSettings,
    config: Arc<KpiConfig>,
}

impl CrmClient {
    /// Creates a CRM client.
    pub fn new(
        settings: CrmSettings,
        credentials: &Credentials,
        config: Arc<KpiConfig>,
    ) -> Result<Self> {
        let signer = Arc::new(BearerSigner::new(credentials.crm_token.expose()));
        let api = ApiClient::new(SERVICE, settings.base_url.clone(), signer)?;
        Ok(Self {
            api,
            settings,
            config,
        })
    }

    /// Searches `object_type` and returns every matching record.
    pub async fn search(
        &self,
        object_type: &str,
        filters: Vec<PropertyFilter>,
        properties: Vec<String>,
    ) -> Result<Vec<CrmRecord>> {
        let path = format!("crm/v3/objects/{object_type}/search");
        let base = SearchRequest {
            filter_groups: vec![FilterGroup { filters }],
            properties,
            limit: self.settings.page_size.clamp(1, MAX_SEARCH_LIMIT),
            after: None,
        };

        collect_pages(SERVICE, MAX_PAGES, |cursor| {
            let request = SearchRequest {
                after: cursor,
                ..base.clone()
            };
            let path = &path;
            async move {
                let response: SearchResponse = self.api.post_json(path, &[], &request).await?;
                Ok(response.into_page())
            }
        })
        .await
    }
}

#[async_trait]
impl CrmSource for CrmClient {
    async fn leads(&self, window: &MonthWindow) -> Result<MetricMap> {
        let records = self
            .search(
                "contacts",
                vec![PropertyFilter::within(&self.settings.lead_date_property, window)],
                vec![self.settings.location_property.clone()],
            )
            .await?;
        tracing::debug!(month = %window.key, records = records.len(), "CRM leads");
        Ok(count_by_location(&records, &self.settings.location_property, &self.config))
    }

    async fn new_members(&self, window: &MonthWindow) -> Result<MetricMap> {
        let records = self
            .search(
                "deals",
                vec![
                    PropertyFilter::equals("dealstage", &self.settings.closed_stage),
                    PropertyFilter::within("closedate", window),
                ],
                vec![self.settings.location_property.clone()],
            )
            .await?;
        tracing::debug!(month = %window.key, records = records.len(), "CRM closed-won deals");
        Ok(count_by_location(&records, &self.settings.location_property, &self.config))
    }
}
