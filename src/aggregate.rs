// src/aggregate.rs
// =============================================================================
// `site-guardian all`: every validator, one after another.
//
// Order: static links, base paths, live site (unless skipped).
//
// Each validator gets its own log file and runs behind a guard: an error
// or a panic inside one validator is recorded as a crash (exit code 1) and
// the next validator still runs. Per-validator numbers are read back from
// the summary each validator wrote, falling back to the in-memory summary
// when the file is unreadable.
//
// The combined result goes to logs/summaries/all.json.
// =============================================================================

use crate::config::Config;
use crate::crawl::run_live;
use crate::dist::{run_base_paths, run_static};
use crate::logger::RunLog;
use crate::prompt::LiveTarget;
use crate::report::{now_iso, summary_path, RunOutcome, RunStatus, Tool, ValidationSummary, SCHEMA_VERSION};
use anyhow::{Context, Result};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};

/// One validator's line in the aggregate summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatorResult {
    pub tool: Tool,
    pub exit_code: i32,
    pub issues: usize,
    pub internal_issues: usize,
    pub external_issues: usize,
    pub warnings: usize,
    pub crashed: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

impl ValidatorResult {
    fn from_summary(exit_code: i32, summary: &ValidationSummary) -> Self {
        let counts = &summary.summary;
        Self {
            tool: summary.tool,
            exit_code,
            issues: counts.issues,
            internal_issues: counts.internal_issues,
            external_issues: counts.external_issues,
            warnings: counts.warnings,
            crashed: false,
            error: None,
        }
    }

    fn crashed(tool: Tool, error: String) -> Self {
        Self {
            tool,
            exit_code: 1,
            issues: 0,
            internal_issues: 0,
            external_issues: 0,
            warnings: 0,
            crashed: true,
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateSummary {
    pub schema_version: u32,
    pub generated_at: String,
    pub status: RunStatus,
    pub total_issues: usize,
    pub validators: Vec<ValidatorResult>,
}

impl AggregateSummary {
    pub fn new(validators: Vec<ValidatorResult>) -> Self {
        let failed = validators.iter().any(|v| v.exit_code != 0);
        Self {
            schema_version: SCHEMA_VERSION,
            generated_at: now_iso(),
            status: if failed { RunStatus::Fail } else { RunStatus::Pass },
            total_issues: validators.iter().map(|v| v.issues).sum(),
            validators,
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self.status {
            RunStatus::Pass => 0,
            RunStatus::Fail => 1,
        }
    }

    pub fn crashes(&self) -> impl Iterator<Item = &ValidatorResult> {
        self.validators.iter().filter(|v| v.crashed)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)? + "\n")
    }

    pub fn write(&self, logs_dir: &Path) -> Result<PathBuf> {
        let path = summary_path(logs_dir, Tool::All);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        std::fs::write(&path, self.to_json()?)
            .with_context(|| format!("writing summary {}", path.display()))?;
        Ok(path)
    }
}

// Runs every validator in sequence
//
// Parameters:
//   config: project configuration
//   root: project root
//   offline: skip external URL checks in the static validator
//   live: the deployment to crawl, or None to skip the live validator
//   log: the aggregate run log (section headers and the final table)
pub async fn run_all(
    config: &Config,
    root: &Path,
    offline: bool,
    live: Option<&LiveTarget>,
    log: &mut RunLog,
) -> Result<AggregateSummary> {
    let logs = config.logs(root);
    let mut results = Vec::new();

    section(log, Tool::StaticLinks);
    let mut static_log = RunLog::create(&logs, Tool::StaticLinks)?.quiet(log.is_quiet());
    results.push(guarded(&logs, Tool::StaticLinks, run_static(config, root, offline, &mut static_log)).await);

    section(log, Tool::BasePaths);
    let mut base_log = RunLog::create(&logs, Tool::BasePaths)?.quiet(log.is_quiet());
    results.push(guarded(&logs, Tool::BasePaths, async { run_base_paths(config, root, &mut base_log) }).await);

    match live {
        Some(target) => {
            section(log, Tool::LiveSite);
            let mut live_log = RunLog::create(&logs, Tool::LiveSite)?.quiet(log.is_quiet());
            results.push(guarded(&logs, Tool::LiveSite, run_live(config, root, target, &mut live_log)).await);
        }
        None => log.warn("Live site validation skipped"),
    }

    let summary = AggregateSummary::new(results);
    let path = summary.write(&logs)?;
    print_summary(&summary, log);
    log.info(format!("Summary written to {}", path.display()));
    log.finish();

    Ok(summary)
}

// Runs one validator, turning an error or a panic into a crash record
async fn guarded<F>(logs: &Path, tool: Tool, validator: F) -> ValidatorResult
where
    F: Future<Output = Result<RunOutcome>>,
{
    match AssertUnwindSafe(validator).catch_unwind().await {
        Ok(Ok(outcome)) => {
            let summary = match ValidationSummary::load(&summary_path(logs, tool)) {
                Ok(on_disk) => on_disk,
                Err(e) => {
                    tracing::debug!(tool = %tool, error = %e, "using in-memory summary");
                    outcome.summary
                }
            };
            ValidatorResult::from_summary(outcome.exit_code, &summary)
        }
        Ok(Err(e)) => ValidatorResult::crashed(tool, format!("{e:#}")),
        Err(panic) => ValidatorResult::crashed(tool, panic_message(panic.as_ref())),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}

fn section(log: &mut RunLog, tool: Tool) {
    log.info(format!("════════════ {tool} ════════════"));
}

fn print_summary(summary: &AggregateSummary, log: &mut RunLog) {
    log.info("──────────── All validators ────────────");
    for v in &summary.validators {
        let line = format!(
            "{:<14} exit {}  issues {} (internal {}, external {})  warnings {}",
            v.tool.slug(),
            v.exit_code,
            v.issues,
            v.internal_issues,
            v.external_issues,
            v.warnings
        );
        if v.exit_code == 0 {
            log.success(line);
        } else {
            log.error(line);
        }
    }

    let crashes: Vec<&ValidatorResult> = summary.crashes().collect();
    if !crashes.is_empty() {
        log.error("Validation crashes:");
        for v in crashes {
            log.error(format!("  {}: {}", v.tool.slug(), v.error.as_deref().unwrap_or("unknown error")));
        }
    }

    log.info(format!("Total issues: {}", summary.total_issues));
    match summary.status {
        RunStatus::Pass => log.success("PASS: all validators passed"),
        RunStatus::Fail => log.error("FAIL: at least one validator failed"),
    }
}
