//! The run orchestrator.
//!
//! Months are processed strictly in order, one at a time. Within a month
//! the five source pulls run concurrently and must all succeed before the
//! KPIs are derived. A failed month never aborts the run.

use crate::report::{MonthReport, RunReport};
use chrono::Utc;
use metrica_core::{
    Dataset, DatasetBuilder, KpiConfig, MonthInputs, MonthWindow, RefreshDecision,
    RefreshPlanner, Result, derive_kpis,
};
use metrica_sources::{CrmSource, LedgerSource, MembershipSource, counts_to_metric};
use std::path::Path;
use std::sync::Arc;

/// The upstream systems a run pulls from.
#[derive(Clone)]
pub struct Sources {
    /// Revenue and marketing spend
    pub ledger: Arc<dyn LedgerSource>,
    /// Leads and new members
    pub crm: Arc<dyn CrmSource>,
    /// Active-member counts
    pub membership: Arc<dyn MembershipSource>,
}

/// Runs the refresh over a set of month windows.
#[derive(Clone)]
pub struct RunOrchestrator {
    config: Arc<KpiConfig>,
    sources: Sources,
    planner: RefreshPlanner,
}

impl RunOrchestrator {
    /// Creates an orchestrator.
    pub fn new(config: Arc<KpiConfig>, sources: Sources, planner: RefreshPlanner) -> Self {
        Self {
            config,
            sources,
            planner,
        }
    }

    /// Builds a new dataset for `windows` (oldest first) on top of `baseline`.
    ///
    /// Never fails: a month whose pull fails keeps its baseline record, or
    /// is left out when the baseline has none.
    pub async fn run(&self, baseline: &Dataset, windows: &[MonthWindow]) -> RunReport {
        let plan = self.planner.plan(baseline, windows);
        let mut builder = DatasetBuilder::new(baseline, self.config.locations());
        let mut months = Vec::with_capacity(plan.len());

        tracing::info!(
            windows = plan.len(),
            recompute = plan
                .iter()
                .filter(|p| p.decision == RefreshDecision::Recompute)
                .count(),
            "Starting run"
        );

        for planned in plan {
            let month = planned.window.key;
            let outcome = match planned.decision {
                RefreshDecision::Reuse => builder.reuse(month),
                RefreshDecision::Recompute => match self.fetch_inputs(&planned.window).await {
                    Ok(inputs) => {
                        let derived = derive_kpis(&inputs, &self.config);
                        builder.record_computed(month, derived)
                    }
                    Err(e) => builder.record_failure(month, e),
                },
            };

            tracing::info!(month = %month, outcome = %outcome, "Month processed");
            months.push(MonthReport {
                month,
                decision: planned.decision,
                outcome,
            });
        }

        let dataset = builder.finish(Utc::now());
        tracing::info!(months = dataset.months.len(), "Run complete");

        RunReport {
            dataset,
            months,
            written_to: None,
        }
    }

    /// Runs against the dataset at `path` and writes the result back.
    ///
    /// An unreadable baseline is treated as empty. Failing to write the
    /// output is the only error. With `dry_run` nothing is written.
    pub async fn run_to_path(
        &self,
        path: &Path,
        windows: &[MonthWindow],
        dry_run: bool,
    ) -> Result<RunReport> {
        let baseline = Dataset::load_or_empty(path);
        let mut report = self.run(&baseline, windows).await;

        if dry_run {
            tracing::info!(path = %path.display(), "Dry run, dataset not written");
        } else {
            report.dataset.save(path)?;
            tracing::info!(path = %path.display(), "Dataset written");
            report.written_to = Some(path.to_path_buf());
        }

        Ok(report)
    }

    /// Pulls every source for one window.
    async fn fetch_inputs(&self, window: &MonthWindow) -> metrica_sources::Result<MonthInputs> {
        tracing::debug!(
            month = %window.key,
            start = %window.start,
            end = %window.end,
            "Pulling sources"
        );

        let (revenue, spend, leads, new_members, members) = tokio::try_join!(
            self.sources.ledger.revenue(window),
            self.sources.ledger.spend(window),
            self.sources.crm.leads(window),
            self.sources.crm.new_members(window),
            self.sources.membership.counts(window.key),
        )?;

        Ok(MonthInputs {
            revenue,
            spend,
            leads,
            new_members,
            active_members: counts_to_metric(&members),
        })
    }
}
