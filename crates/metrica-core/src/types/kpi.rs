//! KPI records and null-safe ratio arithmetic.
//!
//! A KPI value is an `Option<f64>`: `Some(0.0)` is a computed zero,
//! `None` means the ratio is undefined because its denominator was zero.
//! Undefined values serialise as JSON `null`.

use serde::{Deserialize, Serialize};

/// The ten derived KPIs for one location (or the aggregate) in one month.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KpiRecord {
    /// Direct spend per new member
    pub cac: Option<f64>,
    /// Direct plus allocated corp spend per new member
    #[serde(rename = "corpCAC")]
    pub corp_cac: Option<f64>,
    /// Direct, corp and payroll cost per new member
    #[serde(rename = "fullyLoadedCAC")]
    pub fully_loaded_cac: Option<f64>,
    /// Revenue per active member
    pub avg_revenue_per_member: Option<f64>,
    /// Average membership tenure in months
    pub avg_tenure_months: Option<f64>,
    /// Revenue per member times tenure
    pub ltv: Option<f64>,
    /// Direct spend over revenue
    pub spend_to_revenue: Option<f64>,
    /// Direct plus corp spend over revenue
    pub corp_spend_to_revenue: Option<f64>,
    /// Fully loaded cost over revenue
    pub fully_loaded_spend_to_revenue: Option<f64>,
    /// Direct spend per lead
    pub cost_per_lead: Option<f64>,
}

/// Per-location record.
pub type LocationKpiRecord = KpiRecord;

/// Month total computed from summed numerators and denominators.
pub type AggregateKpiRecord = KpiRecord;

impl KpiRecord {
    /// All ten values in declaration order, paired with their JSON names.
    pub fn fields(&self) -> [(&'static str, Option<f64>); 10] {
        [
            ("cac", self.cac),
            ("corpCAC", self.corp_cac),
            ("fullyLoadedCAC", self.fully_loaded_cac),
            ("avgRevenuePerMember", self.avg_revenue_per_member),
            ("avgTenureMonths", self.avg_tenure_months),
            ("ltv", self.ltv),
            ("spendToRevenue", self.spend_to_revenue),
            ("corpSpendToRevenue", self.corp_spend_to_revenue),
            ("fullyLoadedSpendToRevenue", self.fully_loaded_spend_to_revenue),
            ("costPerLead", self.cost_per_lead),
        ]
    }

    /// Returns `true` when every KPI is undefined.
    pub fn is_all_undefined(&self) -> bool {
        self.fields().iter().all(|(_, value)| value.is_none())
    }
}

/// Divides `numerator` by `denominator`, rounded to two decimals.
///
/// Returns `None` for a zero denominator or a non-finite result.
pub fn ratio(numerator: f64, denominator: f64) -> Option<f64> {
    if denominator == 0.0 {
        return None;
    }
    round2(Some(numerator / denominator))
}

/// Rounds to two decimal places, keeping `None` as `None`.
pub fn round2(value: Option<f64>) -> Option<f64> {
    value
        .filter(|v| v.is_finite())
        .map(|v| (v * 100.0).round() / 100.0)
        .map(|v| if v == 0.0 { 0.0 } else { v })
}

/// Returns `None` for a zero (or missing) value, the value otherwise.
pub fn nonzero(value: Option<f64>) -> Option<f64> {
    value.filter(|v| *v != 0.0)
}
