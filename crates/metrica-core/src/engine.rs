//! KPI derivation.
//!
//! Turns one month of per-location source metrics into a [`KpiRecord`] per
//! location plus an aggregate record. Central (`Corp`) spend and the fixed
//! central payroll are spread over the locations in proportion to their
//! direct spend before the loaded variants are computed.
//!
//! Aggregates are pooled ratios (summed numerator over summed denominator),
//! never means of the per-location ratios.

use crate::config::KpiConfig;
use crate::types::{KpiRecord, LocationCode, MetricMap, nonzero, ratio, round2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Source metrics for one month.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonthInputs {
    /// Ledger revenue; credits (negative amounts) are sign-normalized
    pub revenue: MetricMap,
    /// Ledger marketing spend, including the `Corp` entry
    pub spend: MetricMap,
    /// CRM lead count
    pub leads: MetricMap,
    /// CRM closed-won new members
    pub new_members: MetricMap,
    /// Active membership population
    pub active_members: MetricMap,
}

/// Output of [`derive_kpis`] for one month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedKpis {
    /// One record per configured location
    pub locations: BTreeMap<LocationCode, KpiRecord>,
    /// Pooled record over all locations
    pub totals: KpiRecord,
}

/// Splits `total` across `locations` in proportion to `weights`.
///
/// When the weights sum to zero the total is split evenly, so unallocated
/// cost never lands on whichever single location happens to be non-zero.
/// The returned shares always sum to `total` (up to float error).
pub fn allocate_proportionally(
    total: f64,
    weights: &MetricMap,
    locations: &[LocationCode],
) -> BTreeMap<LocationCode, f64> {
    if locations.is_empty() {
        return BTreeMap::new();
    }

    let weight_sum = weights.sum_over(locations);
    let uniform = 1.0 / locations.len() as f64;

    locations
        .iter()
        .map(|loc| {
            let share = if weight_sum == 0.0 {
                uniform
            } else {
                weights.get(loc) / weight_sum
            };
            (loc.clone(), total * share)
        })
        .collect()
}

/// Derives per-location and aggregate KPIs for one month.
///
/// Deterministic: identical inputs and configuration always produce
/// identical records.
pub fn derive_kpis(inputs: &MonthInputs, config: &KpiConfig) -> DerivedKpis {
    let locations = config.locations();
    let corp_spend = inputs.spend.get(&LocationCode::corp());

    let corp_alloc = allocate_proportionally(corp_spend, &inputs.spend, locations);
    let payroll_alloc =
        allocate_proportionally(config.central_payroll_monthly(), &inputs.spend, locations);

    let mut pooled = Pooled::default();
    let mut records = BTreeMap::new();

    for loc in locations {
        let row = LocationRow {
            revenue: inputs.revenue.get(loc).abs(),
            direct_spend: inputs.spend.get(loc),
            corp_share: corp_alloc.get(loc).copied().unwrap_or(0.0),
            payroll_share: payroll_alloc.get(loc).copied().unwrap_or(0.0),
            leads: inputs.leads.get(loc),
            new_members: inputs.new_members.get(loc),
            active_members: inputs.active_members.get(loc),
            tenure: config.avg_tenure_months(loc),
        };
        pooled.add(&row);
        records.insert(loc.clone(), row.kpis());
    }

    let totals = pooled.kpis();

    tracing::debug!(
        locations = records.len(),
        corp_spend,
        direct_spend = pooled.row.direct_spend,
        new_members = pooled.row.new_members,
        "Derived KPIs"
    );

    DerivedKpis {
        locations: records,
        totals,
    }
}

/// Everything needed to compute one KPI record.
#[derive(Debug, Clone, Copy, Default)]
struct LocationRow {
    revenue: f64,
    direct_spend: f64,
    corp_share: f64,
    payroll_share: f64,
    leads: f64,
    new_members: f64,
    active_members: f64,
    tenure: Option<f64>,
}

impl LocationRow {
    fn kpis(&self) -> KpiRecord {
        let corp_loaded = self.direct_spend + self.corp_share;
        let fully_loaded = corp_loaded + self.payroll_share;

        let revenue_per_member = (self.active_members != 0.0)
            .then(|| self.revenue / self.active_members)
            .filter(|v| v.is_finite());
        let ltv = nonzero(revenue_per_member)
            .zip(nonzero(self.tenure))
            .map(|(arpm, tenure)| arpm * tenure);

        KpiRecord {
            cac: ratio(self.direct_spend, self.new_members),
            corp_cac: ratio(corp_loaded, self.new_members),
            fully_loaded_cac: ratio(fully_loaded, self.new_members),
            avg_revenue_per_member: round2(revenue_per_member),
            avg_tenure_months: round2(self.tenure),
            ltv: round2(ltv),
            spend_to_revenue: ratio(self.direct_spend, self.revenue),
            corp_spend_to_revenue: ratio(corp_loaded, self.revenue),
            fully_loaded_spend_to_revenue: ratio(fully_loaded, self.revenue),
            cost_per_lead: ratio(self.direct_spend, self.leads),
        }
    }
}

/// Running sums across locations.
#[derive(Debug, Default)]
struct Pooled {
    row: LocationRow,
    tenure_weighted: f64,
    tenure_members: f64,
}

impl Pooled {
    fn add(&mut self, row: &LocationRow) {
        self.row.revenue += row.revenue;
        self.row.direct_spend += row.direct_spend;
        self.row.corp_share += row.corp_share;
        self.row.payroll_share += row.payroll_share;
        self.row.leads += row.leads;
        self.row.new_members += row.new_members;
        self.row.active_members += row.active_members;

        // Locations without a configured tenure don't weigh on the average.
        if let Some(tenure) = row.tenure {
            self.tenure_weighted += tenure * row.active_members;
            self.tenure_members += row.active_members;
        }
    }

    fn kpis(&self) -> KpiRecord {
        let weighted_tenure = (self.tenure_members != 0.0)
            .then(|| self.tenure_weighted / self.tenure_members);
        LocationRow {
            tenure: weighted_tenure,
            ..self.row
        }
        .kpis()
    }
}
