#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Metrica Pipeline
//!
//! Drives one refresh run: plan the month windows against the baseline
//! dataset, pull and derive the months that need it, fall back to the
//! baseline where a pull fails, and persist the result.

pub mod orchestrator;
pub mod report;

pub use orchestrator::{RunOrchestrator, Sources};
pub use report::{MonthReport, RunReport, RunSummary};

// Re-export core types
pub use metrica_core::{Error, Result};
