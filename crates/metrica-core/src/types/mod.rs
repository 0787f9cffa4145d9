//! Core data model.

mod dataset;
mod kpi;
mod location;
mod metric;
mod month;
mod proptests;

pub use dataset::{Dataset, MonthSnapshot};
pub use kpi::{AggregateKpiRecord, KpiRecord, LocationKpiRecord, nonzero, ratio, round2};
pub use location::{CORP, LocationCode};
pub use metric::MetricMap;
pub use month::{MonthKey, MonthWindow, days_in_month, month_windows, month_windows_from_now};
