//! Membership population counts.
//!
//! Active-member counts either come from a membership platform API or from a
//! hand-maintained table in the configuration file. The table is sparse: a
//! month without its own entry borrows the nearest entry at or before it,
//! and a month earlier than every entry borrows the earliest one.

use crate::error::{Result, SourceError};
use crate::http::{ApiClient, BearerSigner};
use crate::pagination::{MAX_PAGES, Page, collect_pages};
use crate::{Credentials, MembershipSource};
use async_trait::async_trait;
use metrica_core::{Error, KpiConfig, LocationCode, MetricMap, MonthKey};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

const SERVICE: &str = "membership";
const COUNTS_PATH: &str = "memberships/counts";

/// Active members per location.
pub type MembershipCounts = BTreeMap<LocationCode, u64>;

/// `[membership]` configuration section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum MembershipSettings {
    /// Counts maintained by hand, keyed by month
    Static {
        /// Month → location code → active members
        #[serde(default)]
        table: BTreeMap<MonthKey, MembershipCounts>,
    },
    /// Counts pulled from the membership platform
    Api {
        /// Base URL of the membership API
        base_url: String,
        /// Records per page
        #[serde(default = "default_page_size")]
        page_size: u32,
    },
}

fn default_page_size() -> u32 {
    200
}

impl MembershipSettings {
    /// Whether this mode needs the membership API token.
    pub fn requires_token(&self) -> bool {
        matches!(self, Self::Api { .. })
    }

    /// Checks a static table's location codes against `config`.
    pub fn validate(&self, config: &KpiConfig) -> metrica_core::Result<()> {
        match self {
            Self::Static { table } => validate_table(table, config),
            Self::Api { .. } => Ok(()),
        }
    }
}

/// Rejects `Corp` and codes that are not configured locations.
pub fn validate_table(
    table: &BTreeMap<MonthKey, MembershipCounts>,
    config: &KpiConfig,
) -> metrica_core::Result<()> {
    for (month, counts) in table {
        if let Some(code) = counts.keys().find(|c| c.is_corp() || !config.is_known(c)) {
            return Err(Error::UnknownLocation {
                code: format!("{code} (membership table {month})"),
            });
        }
    }
    Ok(())
}

/// Converts counts into the engine's metric map.
pub fn counts_to_metric(counts: &MembershipCounts) -> MetricMap {
    counts
        .iter()
        .map(|(code, count)| (code.clone(), *count as f64))
        .collect()
}

/// Validated month-keyed membership table.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticMembershipTable {
    table: BTreeMap<MonthKey, MembershipCounts>,
}

impl StaticMembershipTable {
    /// Builds a table, rejecting codes that are not configured locations.
    pub fn new(table: BTreeMap<MonthKey, MembershipCounts>, config: &KpiConfig) -> Result<Self> {
        validate_table(&table, config)?;
        Ok(Self { table })
    }

    /// Months with an explicit entry.
    pub fn months(&self) -> impl Iterator<Item = MonthKey> + '_ {
        self.table.keys().copied()
    }

    /// The entry used for `month`: exact, else nearest earlier, else earliest.
    ///
    /// Returns the month actually used alongside its counts, or `None` when
    /// the table is empty.
    pub fn lookup(&self, month: MonthKey) -> Option<(MonthKey, &MembershipCounts)> {
        self.table
            .range(..=month)
            .next_back()
            .or_else(|| self.table.iter().next())
            .map(|(key, counts)| (*key, counts))
    }
}

#[async_trait]
impl MembershipSource for StaticMembershipTable {
    async fn counts(&self, month: MonthKey) -> Result<MembershipCounts> {
        match self.lookup(month) {
            Some((used, counts)) => {
                if used != month {
                    tracing::debug!(month = %month, used = %used, "Membership counts interpolated");
                }
                Ok(counts.clone())
            }
            None => {
                tracing::warn!(month = %month, "Membership table is empty");
                Ok(MembershipCounts::new())
            }
        }
    }
}

/// One location's count as returned by the membership API.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LocationCount {
    /// Location name or code
    pub location: String,
    /// Active members
    pub active: u64,
}

#[derive(Debug, Deserialize)]
struct CountsResponse {
    #[serde(default)]
    data: Vec<LocationCount>,
    #[serde(default)]
    next_cursor: Option<String>,
}

/// HTTP client for the membership platform.
#[derive(Debug, Clone)]
pub struct MembershipApiClient {
    api: ApiClient,
    page_size: u32,
    config: Arc<KpiConfig>,
}

impl MembershipApiClient {
    /// Creates a membership client.
    pub fn new(
        base_url: impl Into<String>,
        page_size: u32,
        credentials: &Credentials,
        config: Arc<KpiConfig>,
    ) -> Result<Self> {
        let token = credentials
            .membership_token
            .as_ref()
            .ok_or_else(|| SourceError::MissingCredentials {
                names: vec![crate::credentials::MEMBERSHIP_TOKEN_VAR.to_string()],
            })?;
        let signer = Arc::new(BearerSigner::new(token.expose()));
        let api = ApiClient::new(SERVICE, base_url, signer)?;
        Ok(Self {
            api,
            page_size: page_size.max(1),
            config,
        })
    }

    /// Active members per location at the end of `month`.
    pub async fn fetch(&self, month: MonthKey) -> Result<Vec<LocationCount>> {
        collect_pages(SERVICE, MAX_PAGES, |cursor| async move {
            let mut params = vec![
                ("month", month.to_string()),
                ("limit", self.page_size.to_string()),
            ];
            if let Some(cursor) = cursor {
                params.push(("cursor", cursor));
            }
            let response: CountsResponse = self.api.get_json(COUNTS_PATH, &params).await?;
            Ok(Page {
                items: response.data,
                next_cursor: response.next_cursor,
            })
        })
        .await
    }
}

/// Resolves API rows to location codes, summing duplicates.
pub fn resolve_counts(rows: &[LocationCount], config: &KpiConfig) -> MembershipCounts {
    let mut counts = MembershipCounts::new();
    for row in rows {
        match config.resolve_name(&row.location) {
            Some(code) if !code.is_corp() => *counts.entry(code).or_default() += row.active,
            _ => tracing::warn!(location = %row.location, "Unmapped membership location, skipped"),
        }
    }
    counts
}

#[async_trait]
impl MembershipSource for MembershipApiClient {
    async fn counts(&self, month: MonthKey) -> Result<MembershipCounts> {
        let rows = self.fetch(month).await?;
        Ok(resolve_counts(&rows, &self.config))
    }
}

/// Builds the membership source selected by `settings`.
pub fn membership_source(
    settings: MembershipSettings,
    credentials: &Credentials,
    config: Arc<KpiConfig>,
) -> Result<Arc<dyn MembershipSource>> {
    let source: Arc<dyn MembershipSource> = match settings {
        MembershipSettings::Static { table } => {
            tracing::info!(months = table.len(), "Using static membership table");
            Arc::new(StaticMembershipTable::new(table, &config)?)
        }
        MembershipSettings::Api {
            base_url,
            page_size,
        } => Arc::new(MembershipApiClient::new(base_url, page_size, credentials, config)?),
    };
    Ok(source)
}
