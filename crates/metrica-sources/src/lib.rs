//! Source adapters for Metrica.
//!
//! Each upstream system sits behind a trait so the run orchestrator can be
//! exercised against in-memory sources:
//!
//! - [`LedgerSource`]: revenue and marketing spend from the general ledger
//! - [`CrmSource`]: lead and new-member counts from the CRM
//! - [`MembershipSource`]: active-member counts, live or from a static table
//!
//! The HTTP implementations share one [`ApiClient`] with request signing,
//! retry with backoff, and cursor pagination capped at [`MAX_PAGES`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod credentials;
pub mod crm;
pub mod error;
pub mod http;
pub mod ledger;
pub mod membership;
pub mod pagination;

pub use credentials::{Credentials, Secret};
pub use crm::{CrmClient, CrmRecord, CrmSettings, PropertyFilter};
pub use error::{Result, SourceError};
pub use http::{ApiClient, BearerSigner, RequestSigner};
pub use ledger::{AccountFilter, LedgerClient, LedgerQuery, LedgerRow, LedgerSettings};
pub use membership::{
    MembershipApiClient, MembershipCounts, MembershipSettings, StaticMembershipTable,
    counts_to_metric, membership_source, validate_table,
};
pub use pagination::{MAX_PAGES, Page, collect_pages, page_stream};

use async_trait::async_trait;
use metrica_core::{MetricMap, MonthKey, MonthWindow};

/// General-ledger amounts summed by location for one month.
///
/// Postings without a location are reported under `Corp`.
#[async_trait]
pub trait LedgerSource: Send + Sync {
    /// Revenue booked in `window`.
    async fn revenue(&self, window: &MonthWindow) -> Result<MetricMap>;

    /// Marketing spend booked in `window`.
    async fn spend(&self, window: &MonthWindow) -> Result<MetricMap>;
}

/// CRM record counts by location for one month.
#[async_trait]
pub trait CrmSource: Send + Sync {
    /// Contacts that became leads in `window`.
    async fn leads(&self, window: &MonthWindow) -> Result<MetricMap>;

    /// Deals closed-won in `window`.
    async fn new_members(&self, window: &MonthWindow) -> Result<MetricMap>;
}

/// Active-member population by location.
#[async_trait]
pub trait MembershipSource: Send + Sync {
    /// Active members per location for `month`.
    async fn counts(&self, month: MonthKey) -> Result<MembershipCounts>;
}
