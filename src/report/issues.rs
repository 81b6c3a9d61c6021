// src/report/issues.rs
// =============================================================================
// Validation issues and the per-file report that collects them.
//
// An issue is one problem with one reference in one source file. Issues
// are grouped by the source file's path relative to the scanned root (or
// the page path in live mode). Base-path problems are kept in the same
// report but count as warnings: they never make a run fail.
// =============================================================================

use crate::checker::{BasePath, ExternalCheck, RefKind};
use crate::logger::RunLog;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IssueType {
    Internal,
    External,
    BasePath,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ValidationIssue {
    #[serde(rename = "type")]
    pub issue_type: IssueType,
    pub kind: RefKind,
    pub url: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ValidationIssue {
    fn new(issue_type: IssueType, kind: RefKind, url: &str, message: String) -> Self {
        Self {
            issue_type,
            kind,
            url: url.to_string(),
            message,
            status: None,
            error: None,
        }
    }

    /// No candidate path for an internal reference exists in dist
    pub fn target_missing(url: &str, kind: RefKind) -> Self {
        let message = format!("Internal {kind} target missing in dist");
        Self::new(IssueType::Internal, kind, url, message)
    }

    /// An internal reference climbs out of the output directory
    pub fn outside_dist(url: &str, kind: RefKind) -> Self {
        let message = format!("Internal {kind} resolves outside dist");
        Self::new(IssueType::Internal, kind, url, message)
    }

    /// An external URL did not answer with success
    pub fn external_failed(url: &str, kind: RefKind, check: &ExternalCheck) -> Self {
        let message = match (&check.status, &check.error) {
            (Some(status), _) => format!("External {kind} returned HTTP {status}"),
            (None, Some(error)) => format!("External {kind} failed: {error}"),
            (None, None) => format!("External {kind} failed"),
        };
        Self {
            status: check.status,
            error: check.error.clone(),
            ..Self::new(IssueType::External, kind, url, message)
        }
    }

    /// A page or asset on the live site did not answer with success
    pub fn live_failed(url: &str, kind: RefKind, check: &ExternalCheck) -> Self {
        let noun = match kind {
            RefKind::Link => "Page",
            RefKind::Asset => "Asset",
        };
        let message = match (&check.status, &check.error) {
            (Some(status), _) => format!("{noun} returned HTTP {status}"),
            (None, Some(error)) => format!("{noun} request failed: {error}"),
            (None, None) => format!("{noun} request failed"),
        };
        Self {
            status: check.status,
            error: check.error.clone(),
            ..Self::new(IssueType::Internal, kind, url, message)
        }
    }

    /// A root-relative path that should carry the base path but does not
    pub fn missing_base(url: &str, kind: RefKind, base: &BasePath) -> Self {
        let message = format!("Path is missing the base path prefix {base}");
        Self::new(IssueType::BasePath, kind, url, message)
    }

    pub fn is_warning(&self) -> bool {
        match self.issue_type {
            IssueType::BasePath => true,
            IssueType::Internal | IssueType::External => false,
        }
    }
}

/// Issues of one source file, as written to the summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileIssues {
    pub file: String,
    pub issues: Vec<ValidationIssue>,
}

#[derive(Debug, Default, Clone)]
pub struct IssueReport {
    files: BTreeMap<String, Vec<ValidationIssue>>,
}

impl IssueReport {
    pub fn add(&mut self, source: impl Into<String>, issue: ValidationIssue) {
        self.files.entry(source.into()).or_default().push(issue);
    }

    fn all(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.files.values().flatten()
    }

    /// Issues that fail the run (warnings excluded)
    pub fn issue_count(&self) -> usize {
        self.all().filter(|i| !i.is_warning()).count()
    }

    pub fn count(&self, issue_type: IssueType) -> usize {
        self.all().filter(|i| i.issue_type == issue_type).count()
    }

    pub fn warning_count(&self) -> usize {
        self.all().filter(|i| i.is_warning()).count()
    }

    /// Files with at least one failing issue
    pub fn files_with_issues(&self) -> usize {
        self.files
            .values()
            .filter(|issues| issues.iter().any(|i| !i.is_warning()))
            .count()
    }

    #[cfg(test)]
    pub fn is_clean(&self) -> bool {
        self.issue_count() == 0
    }

    // Files sorted by path, issues sorted and de-duplicated within each file
    //
    // Sorting here is what makes two runs over the same input produce the
    // same summary bytes.
    pub fn to_files(&self) -> Vec<FileIssues> {
        self.files
            .iter()
            .map(|(file, issues)| {
                let mut issues = issues.clone();
                issues.sort_by(|a, b| {
                    (&a.url, a.kind, &a.message, a.issue_type).cmp(&(&b.url, b.kind, &b.message, b.issue_type))
                });
                issues.dedup();
                FileIssues {
                    file: file.clone(),
                    issues,
                }
            })
            .collect()
    }

    /// Writes every issue to the run log, grouped by file
    pub fn log(&self, log: &mut RunLog) {
        for FileIssues { file, issues } in self.to_files() {
            let failing = issues.iter().filter(|i| !i.is_warning()).count();
            if failing > 0 {
                log.error(format!("{file} ({failing} issue(s))"));
            } else {
                log.warn(format!("{file} ({} warning(s))", issues.len()));
            }

            for issue in &issues {
                let line = format!("  → [{}] {}: {}", issue.kind, issue.url, issue.message);
                if issue.is_warning() {
                    log.warn(line);
                } else {
                    log.error(line);
                }
            }
        }
    }
}
