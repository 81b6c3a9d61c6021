// src/report/mod.rs
// =============================================================================
// Collecting, printing and persisting validation results.
//
// Submodules:
// - issues: ValidationIssue and the per-file IssueReport
// - summary: the JSON summary written once per run
//
// finish_run() is the common tail of every validator: write the summary,
// print the final totals, and turn pass/fail into an exit code.
// =============================================================================

mod issues;
mod summary;

pub use issues::{IssueReport, ValidationIssue};
#[cfg(test)]
pub use issues::IssueType;
pub use summary::{now_iso, summary_path, RunStatus, Tool, ValidationSummary, SCHEMA_VERSION};

use crate::logger::RunLog;
use anyhow::Result;
use std::path::Path;

/// What a validator hands back to main or the aggregate runner
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub exit_code: i32,
    pub summary: ValidationSummary,
}

impl RunOutcome {
    pub fn from_summary(summary: ValidationSummary) -> Self {
        let exit_code = if summary.passed() { 0 } else { 1 };
        Self { exit_code, summary }
    }
}

// Writes the summary and prints the closing totals
//
// Parameters:
//   logs_dir: where summaries/ lives
//   summary: the finished summary
//   log: the run log
//
// The totals section is printed no matter how many issues were found.
pub fn finish_run(logs_dir: &Path, summary: ValidationSummary, log: &mut RunLog) -> Result<RunOutcome> {
    let path = summary.write(logs_dir)?;

    let counts = &summary.summary;
    log.info("──────────── Summary ────────────");
    log.info(format!("Validator:          {}", summary.tool));
    log.info(format!("Issues:             {}", counts.issues));
    log.info(format!("  internal:         {}", counts.internal_issues));
    log.info(format!("  external:         {}", counts.external_issues));
    log.info(format!("Warnings:           {}", counts.warnings));
    log.info(format!("Files with issues:  {}", counts.files_with_issues));
    for (name, value) in &counts.details {
        log.info(format!("{:<20}{}", format!("{name}:"), value));
    }
    for note in &summary.notes {
        log.warn(format!("Note: {note}"));
    }
    log.info(format!("Summary written to {}", path.display()));
    if let Some(log_path) = log.path().map(|p| p.display().to_string()) {
        log.info(format!("Log written to {log_path}"));
    }

    if summary.passed() {
        log.success("PASS: no issues found");
    } else {
        log.error(format!("FAIL: {} issue(s)", counts.issues));
    }
    log.finish();

    Ok(RunOutcome::from_summary(summary))
}
