//! Operator-facing run output.

use metrica_core::RefreshDecision;
use metrica_pipeline::RunReport;

/// One line per month, oldest first.
pub fn month_lines(report: &RunReport) -> Vec<String> {
    report
        .months
        .iter()
        .map(|m| {
            let planned = match m.decision {
                RefreshDecision::Reuse => "reuse",
                RefreshDecision::Recompute => "recompute",
            };
            format!("{}  {planned:<9}  {}", m.month, m.outcome)
        })
        .collect()
}

/// Final summary line.
pub fn summary_line(report: &RunReport) -> String {
    let target = match &report.written_to {
        Some(path) => format!("written to {}", path.display()),
        None => "not written (dry run)".to_string(),
    };
    format!(
        "{} months: {}; dataset {target}",
        report.months.len(),
        report.summary()
    )
}
