// src/dist/base_paths.rs
// =============================================================================
// Base-path consistency for the static build.
//
// When a site is deployed under a prefix (say /docs), every root-relative
// URL in the output must start with /docs. A hard-coded "/writing" works
// on localhost and breaks once deployed. This validator finds those.
//
// Findings are warnings: they are reported and written to the summary but
// never change the exit code. Framework-generated paths (/_astro/...) are
// exempt.
// =============================================================================

use super::tree::DistTree;
use super::validate::static_classifier;
use crate::checker::{extract_references, BasePath, Classifier, ExtractOptions, PathScope, SkipPatterns};
use crate::config::Config;
use crate::error::GuardianError;
use crate::logger::RunLog;
use crate::report::{finish_run, IssueReport, RunOutcome, Tool, ValidationIssue, ValidationSummary};
use anyhow::Result;
use std::collections::BTreeMap;
use std::path::Path;

// Finds root-relative references that lack the base path
//
// Parameters:
//   tree: the walked output directory
//   classifier / options: as for the static link validator
//   base: the configured base path
//   internal_prefixes: framework paths that are exempt
//
// Returns: the report and how many root-relative references were examined
pub fn scan_base_paths(
    tree: &DistTree,
    classifier: &Classifier,
    options: &ExtractOptions,
    base: &BasePath,
    internal_prefixes: &[String],
) -> Result<(IssueReport, usize)> {
    let mut report = IssueReport::default();
    let mut examined = 0;

    for file in tree.html_files() {
        let html = tree.read(file)?;
        for reference in extract_references(&html, file, classifier, options) {
            let path = &reference.resolved_url;
            if reference.external || !path.starts_with('/') {
                continue;
            }
            examined += 1;

            let scope = PathScope::of(path, reference.kind, internal_prefixes);
            if scope.needs_base_prefix() && base.is_missing_prefix(path) {
                report.add(file, ValidationIssue::missing_base(&reference.raw_url, reference.kind, base));
            }
        }
    }

    Ok((report, examined))
}

pub fn run_base_paths(config: &Config, root: &Path, log: &mut RunLog) -> Result<RunOutcome> {
    let tool = Tool::BasePaths;
    let dist = config.dist(root);
    let logs = config.logs(root);
    let base = config.base();

    if !dist.is_dir() {
        let fatal = GuardianError::DistMissing(dist);
        log.error(fatal.to_string());
        return finish_run(&logs, ValidationSummary::fatal(tool, fatal.to_string()), log);
    }

    if base.is_root() {
        log.info("Root deployment (base path \"/\"): every root-relative URL is valid");
        let summary = ValidationSummary::build(tool, &IssueReport::default(), BTreeMap::new())
            .with_note("base path is \"/\"; nothing to check");
        return finish_run(&logs, summary, log);
    }

    let tree = DistTree::scan(&dist)?;
    log.info(format!(
        "Checking root-relative URLs in {} for the base path {}",
        tree.root().display(),
        base
    ));

    let classifier = static_classifier(config)?;
    let options = ExtractOptions {
        exclude_code_blocks: true,
        skip_patterns: SkipPatterns::compile(&config.skip_patterns)?,
        page_url: None,
    };
    let (report, examined) = scan_base_paths(&tree, &classifier, &options, &base, &config.internal_prefixes)?;

    let warnings = report.warning_count();
    if warnings == 0 {
        log.success(format!("All {examined} root-relative URL(s) carry the base path"));
    } else {
        log.warn(format!("{warnings} root-relative URL(s) are missing the base path {base}"));
    }
    report.log(log);

    let details = BTreeMap::from([
        ("filesScanned".to_string(), tree.html_files().count()),
        ("rootRelativeUrls".to_string(), examined),
    ]);
    finish_run(&logs, ValidationSummary::build(tool, &report, details), log)
}
