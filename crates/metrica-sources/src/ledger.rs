//! Ledger query adapter.
//!
//! Revenue and marketing spend come from the general ledger's SQL-style
//! query endpoint. Each pull is a structured [`LedgerQuery`] (date range,
//! account filter, optional location set) rendered into a sum-by-location
//! statement; the endpoint pages with `limit`/`offset` and a `hasMore`
//! flag, which is mapped onto the generic cursor pagination.

use crate::error::{Result, SourceError};
use crate::http::{ApiClient, BearerSigner};
use crate::pagination::{MAX_PAGES, Page, collect_pages};
use crate::{Credentials, LedgerSource};
use async_trait::async_trait;
use chrono::NaiveDate;
use metrica_core::{KpiConfig, LocationCode, MetricMap, MonthWindow};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

const SERVICE: &str = "ledger";
const QUERY_PATH: &str = "query/v1/suiteql";
const ACCOUNT_PLACEHOLDER: &str = "{account}";

/// `[ledger]` configuration section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LedgerSettings {
    /// Base URL; `{account}` is replaced by the ledger account identifier
    pub base_url: String,

    /// Account type whose postings count as revenue
    #[serde(default = "default_revenue_account_type")]
    pub revenue_account_type: String,

    /// Account numbers whose postings count as marketing spend
    pub spend_account_numbers: Vec<String>,

    /// Rows per page
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_revenue_account_type() -> String {
    "Income".to_string()
}

fn default_page_size() -> u32 {
    1000
}

/// Which accounts a ledger query covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountFilter {
    /// Every account of this type
    Type(String),
    /// These account numbers
    Numbers(Vec<String>),
}

/// Structured filter for a sum-by-location ledger query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerQuery {
    /// First posting date (inclusive)
    pub start: NaiveDate,
    /// Last posting date (inclusive)
    pub end: NaiveDate,
    /// Account selection
    pub accounts: AccountFilter,
    /// Restrict to these upstream location names, if set
    pub locations: Option<Vec<String>>,
}

impl LedgerQuery {
    /// A query covering `window` for `accounts`.
    pub fn for_window(window: &MonthWindow, accounts: AccountFilter) -> Self {
        Self {
            start: window.start,
            end: window.end,
            accounts,
            locations: None,
        }
    }

    /// Restricts the query to the given location names.
    pub fn with_locations(mut self, names: Vec<String>) -> Self {
        self.locations = Some(names);
        self
    }

    /// Renders the query statement.
    pub fn to_statement(&self) -> String {
        let mut clauses = vec![
            "t.posting = 'T'".to_string(),
            format!(
                "t.trandate BETWEEN TO_DATE('{}', 'YYYY-MM-DD') AND TO_DATE('{}', 'YYYY-MM-DD')",
                self.start.format("%Y-%m-%d"),
                self.end.format("%Y-%m-%d")
            ),
        ];

        clauses.push(match &self.accounts {
            AccountFilter::Type(kind) => format!("a.accttype = {}", quote(kind)),
            AccountFilter::Numbers(numbers) => format!("a.acctnumber IN ({})", quote_list(numbers)),
        });

        if let Some(names) = &self.locations {
            clauses.push(format!("BUILTIN.DF(tal.location) IN ({})", quote_list(names)));
        }

        format!(
            "SELECT BUILTIN.DF(tal.location) AS location, SUM(tal.amount) AS amount \
             FROM TransactionAccountingLine tal \
             JOIN Transaction t ON t.id = tal.transaction \
             JOIN Account a ON a.id = tal.account \
             WHERE {} \
             GROUP BY BUILTIN.DF(tal.location)",
            clauses.join(" AND ")
        )
    }
}

fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn quote_list(values: &[String]) -> String {
    if values.is_empty() {
        return "NULL".to_string();
    }
    values.iter().map(|v| quote(v)).collect::<Vec<_>>().join(", ")
}

/// One aggregated row.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LedgerRow {
    /// Upstream location name; `None` for unassigned postings
    #[serde(default)]
    pub location: Option<String>,
    /// Summed amount, as the upstream returns it (string or number)
    #[serde(default)]
    pub amount: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponse {
    #[serde(default)]
    items: Vec<LedgerRow>,
    #[serde(default)]
    has_more: bool,
}

#[derive(Debug, Serialize)]
struct QueryBody<'a> {
    q: &'a str,
}

/// Parses an amount the ledger returns as a JSON number or numeric string.
pub fn parse_amount(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Folds ledger rows into a metric map.
///
/// Rows without a location are central postings and go to `Corp`. Rows
/// whose location name does not map to a known code are skipped.
pub fn rows_to_metric(rows: &[LedgerRow], config: &KpiConfig) -> Result<MetricMap> {
    let mut map = MetricMap::new();
    for row in rows {
        let amount = parse_amount(&row.amount).ok_or_else(|| {
            SourceError::parse(SERVICE, format!("non-numeric amount {}", row.amount))
        })?;

        let code = match row.location.as_deref().map(str::trim) {
            None | Some("") => LocationCode::corp(),
            Some(name) => match config.resolve_name(name) {
                Some(code) => code,
                None => {
                    tracing::warn!(location = name, amount, "Unmapped ledger location, skipped");
                    continue;
                }
            },
        };
        map.add(code, amount);
    }
    Ok(map)
}

/// HTTP client for the ledger query API.
#[derive(Debug, Clone)]
pub struct LedgerClient {
    api: ApiClient,
    settings: LedgerSettings,
    config: Arc<KpiConfig>,
}

impl LedgerClient {
    /// Creates a ledger client.
    pub fn new(
        settings: LedgerSettings,
        credentials: &Credentials,
        config: Arc<KpiConfig>,
    ) -> Result<Self> {
        let account = credentials.ledger_account.to_lowercase().replace('_', "-");
        let base_url = settings.base_url.replace(ACCOUNT_PLACEHOLDER, &account);
        let signer = Arc::new(BearerSigner::new(credentials.ledger_token.expose()));
        let api = ApiClient::new(SERVICE, base_url, signer)?;
        Ok(Self {
            api,
            settings,
            config,
        })
    }

    /// Runs a query and returns every row across all pages.
    pub async fn query(&self, query: &LedgerQuery) -> Result<Vec<LedgerRow>> {
        let statement = query.to_statement();
        let body = QueryBody { q: &statement };
        let page_size = self.settings.page_size.max(1);

        collect_pages(SERVICE, MAX_PAGES, |cursor| {
            let body = &body;
            async move {
                let offset: u64 = match cursor {
                    Some(c) => c
                        .parse()
                        .map_err(|_| SourceError::parse(SERVICE, format!("bad offset {c:?}")))?,
                    None => 0,
                };
                let params = [
                    ("limit", page_size.to_string()),
                    ("offset", offset.to_string()),
                ];
                let response: QueryResponse = self.api.post_json(QUERY_PATH, &params, body).await?;
                let fetched = response.items.len() as u64;
                let next_cursor = (response.has_more && fetched > 0)
                    .then(|| (offset + fetched).to_string());
                Ok(Page {
                    items: response.items,
                    next_cursor,
                })
            }
        })
        .await
    }

    fn known_location_names(&self) -> Vec<String> {
        let codes = self.config.locations().iter().map(|code| code.to_string());
        let names = self
            .config
            .location_names()
            .filter(|(_, code)| !code.is_corp())
            .map(|(name, _)| name.to_string());
        codes.chain(names).collect()
    }
}

#[async_trait]
impl LedgerSource for LedgerClient {
    async fn revenue(&self, window: &MonthWindow) -> Result<MetricMap> {
        let query = LedgerQuery::for_window(
            window,
            AccountFilter::Type(self.settings.revenue_account_type.clone()),
        )
        .with_locations(self.known_location_names());
        let rows = self.query(&query).await?;
        tracing::debug!(month = %window.key, rows = rows.len(), "Ledger revenue rows");
        rows_to_metric(&rows, &self.config)
    }

    async fn spend(&self, window: &MonthWindow) -> Result<MetricMap> {
        let query = LedgerQuery::for_window(
            window,
            AccountFilter::Numbers(self.settings.spend_account_numbers.clone()),
        );
        let rows = self.query(&query).await?;
        tracing::debug!(month = %window.key, rows = rows.len(), "Ledger spend rows");
        rows_to_metric(&rows, &self.config)
    }
}
