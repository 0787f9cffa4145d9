//! Common test utilities and harness for Metrica pipeline integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::NaiveDate;
use metrica_core::{
    KpiConfig, KpiSettings, MetricMap, MonthKey, MonthWindow, RefreshPlanner, month_windows,
};
use metrica_pipeline::{RunOrchestrator, Sources};
use metrica_sources::{
    CrmSource, LedgerSource, MembershipCounts, MembershipSource, Result, SourceError,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

/// Source metrics served for one month.
#[derive(Debug, Clone, Default)]
pub struct MonthFixture {
    pub revenue: MetricMap,
    pub spend: MetricMap,
    pub leads: MetricMap,
    pub new_members: MetricMap,
    pub members: MembershipCounts,
}

/// The worked example: two locations, one with activity and one idle.
pub fn reference_fixture() -> MonthFixture {
    MonthFixture {
        revenue: MetricMap::from([("A", 1000.0), ("B", 0.0)]),
        spend: MetricMap::from([("A", 100.0), ("Corp", 50.0)]),
        leads: MetricMap::new(),
        new_members: MetricMap::from([("A", 5.0)]),
        members: BTreeMap::from([("A".into(), 10)]),
    }
}

/// In-memory ledger, CRM and membership sources.
///
/// Months without a fixture return empty maps. Months marked failing
/// return a 503 from the ledger revenue pull.
#[derive(Debug, Default)]
pub struct FixtureSources {
    months: BTreeMap<MonthKey, MonthFixture>,
    failing: BTreeSet<MonthKey>,
    calls: Mutex<Vec<(MonthKey, &'static str)>>,
}

impl FixtureSources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_month(mut self, month: &str, fixture: MonthFixture) -> Self {
        self.months.insert(key(month), fixture);
        self
    }

    pub fn failing(mut self, month: &str) -> Self {
        self.failing.insert(key(month));
        self
    }

    /// Every `(month, pull)` served so far.
    pub fn calls(&self) -> Vec<(MonthKey, &'static str)> {
        self.calls.lock().unwrap().clone()
    }

    /// Months for which any pull was made.
    pub fn months_pulled(&self) -> BTreeSet<MonthKey> {
        self.calls().into_iter().map(|(month, _)| month).collect()
    }

    fn serve<T>(&self, month: MonthKey, pull: &'static str, pick: impl Fn(&MonthFixture) -> T) -> T
    where
        T: Default,
    {
        self.calls.lock().unwrap().push((month, pull));
        self.months.get(&month).map(pick).unwrap_or_default()
    }
}

#[async_trait]
impl LedgerSource for FixtureSources {
    async fn revenue(&self, window: &MonthWindow) -> Result<MetricMap> {
        if self.failing.contains(&window.key) {
            self.calls.lock().unwrap().push((window.key, "revenue"));
            return Err(SourceError::api("ledger", 503, "service unavailable"));
        }
        Ok(self.serve(window.key, "revenue", |f| f.revenue.clone()))
    }

    async fn spend(&self, window: &MonthWindow) -> Result<MetricMap> {
        Ok(self.serve(window.key, "spend", |f| f.spend.clone()))
    }
}

#[async_trait]
impl CrmSource for FixtureSources {
    async fn leads(&self, window: &MonthWindow) -> Result<MetricMap> {
        Ok(self.serve(window.key, "leads", |f| f.leads.clone()))
    }

    async fn new_members(&self, window: &MonthWindow) -> Result<MetricMap> {
        Ok(self.serve(window.key, "new_members", |f| f.new_members.clone()))
    }
}

#[async_trait]
impl MembershipSource for FixtureSources {
    async fn counts(&self, month: MonthKey) -> Result<MembershipCounts> {
        Ok(self.serve(month, "members", |f| f.members.clone()))
    }
}

/// Test harness for integration tests.
///
/// Holds a two-location configuration (`A` with a 12-month tenure, `B`
/// with none) and one set of fixture sources.
pub struct TestHarness {
    pub config: Arc<KpiConfig>,
    pub sources: Arc<FixtureSources>,
}

impl TestHarness {
    /// Creates a harness whose sources return empty maps for every month.
    pub fn new() -> Self {
        Self::with_sources(FixtureSources::new())
    }

    /// Creates a harness with custom sources.
    pub fn with_sources(sources: FixtureSources) -> Self {
        Self {
            config: Arc::new(test_config()),
            sources: Arc::new(sources),
        }
    }

    /// An orchestrator over this harness' sources.
    pub fn orchestrator(&self, planner: RefreshPlanner) -> RunOrchestrator {
        let sources = Sources {
            ledger: self.sources.clone(),
            crm: self.sources.clone(),
            membership: self.sources.clone(),
        };
        RunOrchestrator::new(self.config.clone(), sources, planner)
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

pub fn test_config() -> KpiConfig {
    KpiConfig::new(KpiSettings {
        locations: vec!["A".into(), "B".into()],
        central_payroll_monthly: 0.0,
        location_names: BTreeMap::new(),
        avg_tenure_months: BTreeMap::from([("A".into(), 12.0)]),
    })
    .unwrap()
}

pub fn key(s: &str) -> MonthKey {
    s.parse().unwrap()
}

/// The four windows 2024-03 through 2024-06.
pub fn spring_windows() -> Vec<MonthWindow> {
    month_windows(4, NaiveDate::from_ymd_opt(2024, 7, 15).unwrap())
}
