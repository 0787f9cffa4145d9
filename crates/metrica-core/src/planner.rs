//! Incremental refresh planning and dataset merging.
//!
//! Only the most recent months can still change upstream (late ledger
//! postings, CRM records still in flight), so those are recomputed on every
//! run. Older months are recomputed only when the baseline has no record for
//! them. When a recomputation fails the month falls back to the baseline
//! record if there is one and is omitted otherwise.

use crate::config::DEFAULT_ALWAYS_REFRESH;
use crate::engine::DerivedKpis;
use crate::types::{Dataset, KpiRecord, LocationCode, MonthKey, MonthWindow};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// What to do with one month window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshDecision {
    /// Copy the baseline record verbatim.
    Reuse,
    /// Pull sources and derive KPIs again.
    Recompute,
}

/// A window paired with its refresh decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedMonth {
    /// The month window
    pub window: MonthWindow,
    /// Reuse or recompute
    pub decision: RefreshDecision,
}

/// Decides, per window, whether to reuse or recompute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshPlanner {
    always_refresh: usize,
    full_refresh: bool,
}

impl Default for RefreshPlanner {
    fn default() -> Self {
        Self::new(DEFAULT_ALWAYS_REFRESH)
    }
}

impl RefreshPlanner {
    /// Creates a planner that always recomputes the `always_refresh` most
    /// recent windows.
    pub fn new(always_refresh: usize) -> Self {
        Self {
            always_refresh,
            full_refresh: false,
        }
    }

    /// Recompute every window regardless of the baseline.
    pub fn with_full_refresh(mut self, full_refresh: bool) -> Self {
        self.full_refresh = full_refresh;
        self
    }

    /// Plans every window in `windows` (oldest first) against `existing`.
    pub fn plan(&self, existing: &Dataset, windows: &[MonthWindow]) -> Vec<PlannedMonth> {
        let recent_from = windows.len().saturating_sub(self.always_refresh);

        windows
            .iter()
            .enumerate()
            .map(|(index, window)| {
                let decision = if self.full_refresh
                    || index >= recent_from
                    || !existing.contains_month(&window.key)
                {
                    RefreshDecision::Recompute
                } else {
                    RefreshDecision::Reuse
                };
                PlannedMonth {
                    window: *window,
                    decision,
                }
            })
            .collect()
    }
}

/// How one month ended up in the output dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MonthOutcome {
    /// Freshly derived from sources.
    Computed,
    /// Copied from the baseline by plan.
    Reused,
    /// Recompute failed; the baseline record was kept.
    StaleFallback {
        /// Why the recompute failed
        error: String,
    },
    /// Recompute failed and there was nothing to fall back to.
    Dropped {
        /// Why the recompute failed
        error: String,
    },
}

impl MonthOutcome {
    /// Returns `true` if the month is present in the output.
    pub fn is_present(&self) -> bool {
        !matches!(self, MonthOutcome::Dropped { .. })
    }

    /// Short label for operator output.
    pub fn label(&self) -> &'static str {
        match self {
            MonthOutcome::Computed => "computed",
            MonthOutcome::Reused => "reused",
            MonthOutcome::StaleFallback { .. } => "stale",
            MonthOutcome::Dropped { .. } => "dropped",
        }
    }
}

impl fmt::Display for MonthOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonthOutcome::StaleFallback { error } | MonthOutcome::Dropped { error } => {
                write!(f, "{} ({error})", self.label())
            }
            _ => write!(f, "{}", self.label()),
        }
    }
}

/// Accumulates the output dataset month by month.
///
/// The baseline is only read; months outside the current run are never
/// carried over.
#[derive(Debug)]
pub struct DatasetBuilder<'a> {
    baseline: &'a Dataset,
    locations: Vec<LocationCode>,
    data: BTreeMap<MonthKey, BTreeMap<LocationCode, KpiRecord>>,
    totals: BTreeMap<MonthKey, KpiRecord>,
}

impl<'a> DatasetBuilder<'a> {
    /// Starts an empty output for `locations`, backed by `baseline`.
    pub fn new(baseline: &'a Dataset, locations: &[LocationCode]) -> Self {
        Self {
            baseline,
            locations: locations.to_vec(),
            data: BTreeMap::new(),
            totals: BTreeMap::new(),
        }
    }

    /// Stores a freshly derived month.
    pub fn record_computed(&mut self, month: MonthKey, derived: DerivedKpis) -> MonthOutcome {
        self.data.insert(month, derived.locations);
        self.totals.insert(month, derived.totals);
        MonthOutcome::Computed
    }

    /// Copies a month from the baseline as planned.
    pub fn reuse(&mut self, month: MonthKey) -> MonthOutcome {
        if self.copy_from_baseline(month) {
            MonthOutcome::Reused
        } else {
            tracing::warn!(month = %month, "Planned reuse but baseline has no record");
            MonthOutcome::Dropped {
                error: "no baseline record to reuse".to_string(),
            }
        }
    }

    /// Handles a failed recompute: keep the baseline record if any, else
    /// omit the month.
    pub fn record_failure(&mut self, month: MonthKey, error: impl fmt::Display) -> MonthOutcome {
        let error = error.to_string();
        if self.copy_from_baseline(month) {
            tracing::warn!(
                month = %month,
                error = %error,
                "Recompute failed, keeping stale record"
            );
            MonthOutcome::StaleFallback { error }
        } else {
            tracing::error!(month = %month, error = %error, "Recompute failed, month omitted");
            MonthOutcome::Dropped { error }
        }
    }

    fn copy_from_baseline(&mut self, month: MonthKey) -> bool {
        match self.baseline.snapshot(&month) {
            Some(snapshot) => {
                self.data.insert(month, snapshot.locations);
                self.totals.insert(month, snapshot.totals);
                true
            }
            None => false,
        }
    }

    /// Number of months accumulated so far.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if no month has been accumulated.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Produces the new dataset stamped with `last_updated`.
    pub fn finish(self, last_updated: DateTime<Utc>) -> Dataset {
        Dataset {
            last_updated,
            months: self.data.keys().copied().collect(),
            locations: self.locations,
            data: self.data,
            totals: self.totals,
        }
    }
}
