// src/dist/validate.rs
// =============================================================================
// The static link validator: checks every reference in the build output.
//
// How it works:
// 1. Walk dist/ once (DistTree)
// 2. For every HTML file, extract references with code samples excluded
// 3. Internal references: resolve against the tree (Resolver)
// 4. External references: collect unique URLs, then check them in batches
//    through the HttpChecker, answering from the on-disk cache when fresh
// 5. Write the summary and exit 1 if anything failed
//
// A missing dist/ directory is fatal: one issue, one note, nothing else.
// =============================================================================

use super::resolve::Resolver;
use super::tree::DistTree;
use crate::checker::{
    extract_references, BasePath, Classifier, ExternalLinkCache, ExtractOptions, HttpChecker, RefKind,
    SkipPatterns,
};
use crate::config::Config;
use crate::error::GuardianError;
use crate::logger::RunLog;
use crate::report::{finish_run, IssueReport, RunOutcome, Tool, ValidationIssue, ValidationSummary};
use anyhow::Result;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use url::Url;

/// (source file, raw URL, kind) for every place an external URL appears
type ExternalSites = BTreeSet<(String, String, RefKind)>;

/// Everything learned from reading the output tree, before any network I/O
#[derive(Debug, Default)]
pub struct StaticScan {
    pub report: IssueReport,
    /// Unique external URL -> where it was referenced
    pub external: BTreeMap<String, ExternalSites>,
    pub files_scanned: usize,
    pub references: usize,
}

// Scans every HTML file and resolves internal references
//
// Parameters:
//   tree: the walked output directory
//   classifier: internal/external and link/asset decisions
//   options: extraction settings (code-block exclusion, skip patterns)
//   base: base path stripped from root-relative references
pub fn scan_dist(
    tree: &DistTree,
    classifier: &Classifier,
    options: &ExtractOptions,
    base: &BasePath,
) -> Result<StaticScan> {
    let mut scan = StaticScan::default();
    let mut resolver = Resolver::new(tree, base.clone());

    for file in tree.html_files() {
        let html = tree.read(file)?;
        let references = extract_references(&html, file, classifier, options);
        scan.files_scanned += 1;
        scan.references += references.len();

        for reference in references {
            if reference.external {
                scan.external
                    .entry(reference.resolved_url.clone())
                    .or_default()
                    .insert((file.to_string(), reference.raw_url.clone(), reference.kind));
                continue;
            }
            if let Some(issue) = resolver.issue_for(&reference) {
                scan.report.add(file, issue);
            }
        }
    }

    tracing::debug!(cache_hits = resolver.cache_hits(), "internal resolution finished");
    Ok(scan)
}

/// Classifier for dist/: absolute URLs on the configured site_url are internal
pub fn static_classifier(config: &Config) -> Result<Classifier> {
    let origin = match &config.site_url {
        Some(site_url) => {
            let url = Url::parse(site_url).map_err(|e| GuardianError::InvalidUrl {
                url: site_url.clone(),
                reason: e.to_string(),
            })?;
            Some(url.origin())
        }
        None => None,
    };
    Ok(Classifier::new(&config.asset_extensions, origin))
}

// Runs the static link validator
//
// Parameters:
//   config: project configuration
//   root: project root (dist, cache and logs are relative to it)
//   offline: skip external URL checks entirely
//   log: the run log
//
// Returns: the outcome; exit code 1 when any issue was found
pub async fn run_static(config: &Config, root: &Path, offline: bool, log: &mut RunLog) -> Result<RunOutcome> {
    let tool = Tool::StaticLinks;
    let dist = config.dist(root);
    let logs = config.logs(root);

    if !dist.is_dir() {
        let fatal = GuardianError::DistMissing(dist);
        log.error(fatal.to_string());
        return finish_run(&logs, ValidationSummary::fatal(tool, fatal.to_string()), log);
    }

    let tree = DistTree::scan(&dist)?;
    log.info(format!(
        "Validating {} file(s) in {}",
        tree.file_count(),
        tree.root().display()
    ));

    let classifier = static_classifier(config)?;
    let options = ExtractOptions {
        exclude_code_blocks: true,
        skip_patterns: SkipPatterns::compile(&config.skip_patterns)?,
        page_url: None,
    };

    let mut scan = scan_dist(&tree, &classifier, &options, &config.base())?;
    log.info(format!(
        "Scanned {} HTML file(s): {} reference(s), {} unique external URL(s)",
        scan.files_scanned,
        scan.references,
        scan.external.len()
    ));

    let internal_issues = scan.report.issue_count();
    if internal_issues == 0 {
        log.success("All internal references resolve");
    } else {
        log.error(format!("{internal_issues} internal reference(s) do not resolve"));
    }

    let (checked, from_cache) = if offline {
        log.warn("Offline: external URLs were not checked");
        (0, 0)
    } else {
        check_external_urls(config, root, &mut scan, log).await?
    };

    let details = BTreeMap::from([
        ("filesScanned".to_string(), scan.files_scanned),
        ("references".to_string(), scan.references),
        ("externalUrls".to_string(), scan.external.len()),
        ("checked".to_string(), checked),
        ("fromCache".to_string(), from_cache),
    ]);

    scan.report.log(log);
    let summary = ValidationSummary::build(tool, &scan.report, details);
    finish_run(&logs, summary, log)
}

// Checks the external URLs found by the scan and adds issues for failures
//
// Returns: (URLs checked over the network, URLs answered from cache)
async fn check_external_urls(
    config: &Config,
    root: &Path,
    scan: &mut StaticScan,
    log: &mut RunLog,
) -> Result<(usize, usize)> {
    if scan.external.is_empty() {
        return Ok((0, 0));
    }

    let checker = HttpChecker::new(config.timeout(), config.concurrency, &config.user_agent)?;
    let mut cache = ExternalLinkCache::load(&config.cache_path(root), config.freshness());
    let urls: BTreeSet<String> = scan.external.keys().cloned().collect();

    log.info(format!(
        "Checking {} external URL(s), up to {} at a time",
        urls.len(),
        config.concurrency
    ));
    let (results, stats) = checker.check_external(&urls, &mut cache).await;

    for (url, check) in &results {
        if let Some(warning) = &check.warning {
            log.warn(format!("{url}: {warning}"));
        }
        if check.ok {
            continue;
        }
        for (source, raw, kind) in scan.external.get(url).into_iter().flatten() {
            scan.report
                .add(source.clone(), ValidationIssue::external_failed(raw, *kind, check));
        }
    }

    if let Err(e) = cache.save() {
        log.warn(format!("Could not save external link cache: {e:#}"));
    }
    log.info(format!(
        "External URLs: {} checked, {} from cache ({})",
        stats.checked,
        stats.from_cache,
        cache.path().display()
    ));

    Ok((stats.checked, stats.from_cache))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::RunStatus;
    use crate::testutil::{serve, test_router, write_tree};

    fn project(files: &[(&str, &str)]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let dist = dir.path().join("dist");
        std::fs::create_dir_all(&dist).unwrap();
        write_tree(&dist, files);
        dir
    }

    async fn run(root: &Path, offline: bool) -> RunOutcome {
        let mut log = RunLog::console();
        run_static(&Config::default(), root, offline, &mut log).await.unwrap()
    }

    #[tokio::test]
    async fn test_missing_about_page_is_one_issue() {
        let dir = project(&[("index.html", r#"<a href="/about">About</a>"#)]);
        let outcome = run(dir.path(), true).await;

        assert_eq!(outcome.exit_code, 1);
        let summary = outcome.summary;
        assert_eq!(summary.summary.issues, 1);
        assert_eq!(summary.summary.internal_issues, 1);
        assert_eq!(summary.files.len(), 1);
        assert_eq!(summary.files[0].file, "index.html");

        let issue = &summary.files[0].issues[0];
        assert_eq!(issue.kind, RefKind::Link);
        assert_eq!(issue.url, "/about");
        assert_eq!(issue.message, "Internal link target missing in dist");
    }

    #[tokio::test]
    async fn test_present_asset_is_clean() {
        let dir = project(&[("index.html", r#"<img src="/logo.png">"#), ("logo.png", "png")]);
        let outcome = run(dir.path(), true).await;

        assert_eq!(outcome.exit_code, 0);
        assert_eq!(outcome.summary.status, RunStatus::Pass);
        assert_eq!(outcome.summary.summary.issues, 0);
    }

    #[tokio::test]
    async fn test_references_in_code_samples_are_ignored() {
        let dir = project(&[(
            "writing/fonts/index.html",
            r#"<p>Load it like this:</p>
               <pre><code><link rel="preload" href="/fonts/inter.woff2"></code></pre>
               <a href="/">Home</a>"#,
        ), ("index.html", "")]);
        let outcome = run(dir.path(), true).await;
        assert_eq!(outcome.summary.summary.issues, 0);
        assert_eq!(outcome.summary.summary.details["references"], 1);
    }

    #[tokio::test]
    async fn test_missing_dist_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = run(dir.path(), true).await;

        assert_eq!(outcome.exit_code, 1);
        assert_eq!(outcome.summary.summary.issues, 1);
        assert!(outcome.summary.files.is_empty());
        assert_eq!(outcome.summary.notes.len(), 1);
        assert!(dir.path().join("logs/summaries/static-links.json").is_file());
    }

    #[tokio::test]
    async fn test_summaries_are_identical_across_runs() {
        let dir = project(&[
            ("index.html", r#"<a href="/about">About</a><a href="/writing/">Writing</a><img src="/gone.png">"#),
            ("writing/index.html", r#"<a href="../../../etc/passwd">x</a><a href="/">Home</a>"#),
        ]);

        let first = run(dir.path(), true).await.summary;
        let second = run(dir.path(), true).await.summary;

        let strip = |mut s: ValidationSummary| {
            s.generated_at.clear();
            s.to_json().unwrap()
        };
        assert_eq!(strip(first), strip(second));
    }

    #[tokio::test]
    async fn test_external_cache_skips_network_on_second_run() {
        let addr = serve(test_router()).await;
        let html = format!(
            r#"<a href="http://{addr}/ok">ok</a><a href="http://{addr}/get-only">get</a>"#
        );
        let dir = tempfile::tempdir().unwrap();
        write_tree(&dir.path().join("dist"), &[("index.html", html.as_str())]);

        let details = |outcome: RunOutcome| outcome.summary.summary.details;

        let first = details(run(dir.path(), false).await);
        assert_eq!(first["externalUrls"], 2);
        assert_eq!(first["checked"], 2);
        assert_eq!(first["fromCache"], 0);

        let second = details(run(dir.path(), false).await);
        assert_eq!(second["checked"], 0);
        assert_eq!(second["fromCache"], 2);

        std::fs::remove_file(dir.path().join(".cache/external-links.json")).unwrap();
        let third = details(run(dir.path(), false).await);
        assert_eq!(third["checked"], 2);
        assert_eq!(third["fromCache"], 0);
    }

    #[tokio::test]
    async fn test_broken_external_link_is_reported_per_source() {
        let addr = serve(test_router()).await;
        let link = format!(r#"<a href="http://{addr}/missing#top">dead</a>"#);
        let dir = tempfile::tempdir().unwrap();
        write_tree(
            &dir.path().join("dist"),
            &[("index.html", link.as_str()), ("about/index.html", link.as_str())],
        );

        let outcome = run(dir.path(), false).await;
        assert_eq!(outcome.exit_code, 1);
        assert_eq!(outcome.summary.summary.external_issues, 2);
        assert_eq!(outcome.summary.summary.details["externalUrls"], 1);

        let issue = &outcome.summary.files[0].issues[0];
        assert_eq!(issue.status, Some(404));
        assert_eq!(issue.message, "External link returned HTTP 404");
    }
}
