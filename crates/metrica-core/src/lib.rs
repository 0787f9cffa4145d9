#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Metrica Core Library
//!
//! Data model, month windowing, KPI derivation and incremental refresh
//! planning for the Metrica monthly KPI pipeline. Nothing in this crate
//! touches the network; source adapters live in `metrica-sources`.

pub mod config;
pub mod engine;
pub mod error;
pub mod planner;
pub mod types;

// Re-exports for convenience
pub use config::{KpiConfig, KpiSettings, RunSettings};
pub use engine::{DerivedKpis, MonthInputs, allocate_proportionally, derive_kpis};
pub use error::{Error, Result};
pub use planner::{DatasetBuilder, MonthOutcome, PlannedMonth, RefreshDecision, RefreshPlanner};
pub use types::{
    Dataset, KpiRecord, LocationCode, MetricMap, MonthKey, MonthWindow, month_windows,
    month_windows_from_now,
};
