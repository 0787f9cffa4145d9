//! Run results for operator output.

use metrica_core::{Dataset, MonthKey, MonthOutcome, RefreshDecision};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// What happened to one month window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthReport {
    /// The month
    pub month: MonthKey,
    /// What the planner decided
    pub decision: RefreshDecision,
    /// What actually happened
    pub outcome: MonthOutcome,
}

/// Outcome counts for a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Months freshly derived
    pub computed: usize,
    /// Months reused from the baseline by plan
    pub reused: usize,
    /// Months whose recompute failed and kept the baseline record
    pub stale: usize,
    /// Months omitted from the output
    pub dropped: usize,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} computed, {} reused, {} stale, {} dropped",
            self.computed, self.reused, self.stale, self.dropped
        )
    }
}

/// Result of a run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// The new dataset
    pub dataset: Dataset,
    /// One entry per window, oldest first
    pub months: Vec<MonthReport>,
    /// Where the dataset was written; `None` for a dry run
    pub written_to: Option<PathBuf>,
}

impl RunReport {
    /// Counts outcomes by kind.
    pub fn summary(&self) -> RunSummary {
        self.months
            .iter()
            .fold(RunSummary::default(), |mut summary, month| {
                match month.outcome {
                    MonthOutcome::Computed => summary.computed += 1,
                    MonthOutcome::Reused => summary.reused += 1,
                    MonthOutcome::StaleFallback { .. } => summary.stale += 1,
                    MonthOutcome::Dropped { .. } => summary.dropped += 1,
                }
                summary
            })
    }

    /// Outcome recorded for `month`, if it was part of the run.
    pub fn outcome(&self, month: MonthKey) -> Option<&MonthOutcome> {
        self.months
            .iter()
            .find(|m| m.month == month)
            .map(|m| &m.outcome)
    }

    /// Returns `true` if any recompute failed.
    pub fn has_failures(&self) -> bool {
        let summary = self.summary();
        summary.stale + summary.dropped > 0
    }
}
