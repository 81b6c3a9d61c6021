// src/report/summary.rs
// =============================================================================
// The machine-readable summary every validator writes once per run.
//
// logs/summaries/<tool>.json looks like:
//
//   {
//     "schemaVersion": 1,
//     "tool": "static-links",
//     "status": "fail",
//     "generatedAt": "2026-10-18T09:12:03Z",
//     "summary": { "issues": 1, "internalIssues": 1, ..., "filesScanned": 12 },
//     "files": [ { "file": "index.html", "issues": [ ... ] } ]
//   }
//
// Apart from generatedAt, the output depends only on the input: maps are
// BTreeMaps and issue lists are sorted before serialization.
// =============================================================================

use super::issues::{FileIssues, IssueReport, IssueType};
use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

pub const SCHEMA_VERSION: u32 = 1;

/// Which validator produced a log or summary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Tool {
    StaticLinks,
    BasePaths,
    LiveSite,
    All,
}

impl Tool {
    pub fn slug(self) -> &'static str {
        match self {
            Tool::StaticLinks => "static-links",
            Tool::BasePaths => "base-paths",
            Tool::LiveSite => "live-site",
            Tool::All => "all",
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pass,
    Fail,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryCounts {
    pub issues: usize,
    pub internal_issues: usize,
    pub external_issues: usize,
    pub warnings: usize,
    pub files_with_issues: usize,
    /// Tool-specific counters (filesScanned, checked, fromCache, ...)
    #[serde(flatten)]
    pub details: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationSummary {
    pub schema_version: u32,
    pub tool: Tool,
    pub status: RunStatus,
    pub generated_at: String,
    pub summary: SummaryCounts,
    pub files: Vec<FileIssues>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

impl ValidationSummary {
    // Builds the summary for a completed run
    //
    // Parameters:
    //   tool: which validator ran
    //   report: every issue found
    //   details: tool-specific counters, keyed in camelCase
    pub fn build(tool: Tool, report: &IssueReport, details: BTreeMap<String, usize>) -> Self {
        let issues = report.issue_count();
        Self {
            schema_version: SCHEMA_VERSION,
            tool,
            status: if issues == 0 { RunStatus::Pass } else { RunStatus::Fail },
            generated_at: now_iso(),
            summary: SummaryCounts {
                issues,
                internal_issues: report.count(IssueType::Internal),
                external_issues: report.count(IssueType::External),
                warnings: report.warning_count(),
                files_with_issues: report.files_with_issues(),
                details,
            },
            files: report.to_files(),
            notes: Vec::new(),
        }
    }

    /// Summary of a run that could not start (dist missing, landing page down)
    pub fn fatal(tool: Tool, note: impl Into<String>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            tool,
            status: RunStatus::Fail,
            generated_at: now_iso(),
            summary: SummaryCounts {
                issues: 1,
                ..SummaryCounts::default()
            },
            files: Vec::new(),
            notes: vec![note.into()],
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn passed(&self) -> bool {
        self.status == RunStatus::Pass
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)? + "\n")
    }

    /// Writes logs/summaries/<tool>.json, replacing the previous run's
    pub fn write(&self, logs_dir: &Path) -> Result<PathBuf> {
        let path = summary_path(logs_dir, self.tool);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        std::fs::write(&path, self.to_json()?)
            .with_context(|| format!("writing summary {}", path.display()))?;
        Ok(path)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading summary {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing summary {}", path.display()))
    }
}

pub fn summary_path(logs_dir: &Path, tool: Tool) -> PathBuf {
    logs_dir.join("summaries").join(format!("{}.json", tool.slug()))
}

pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}
