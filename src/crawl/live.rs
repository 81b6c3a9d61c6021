// src/crawl/live.rs
// =============================================================================
// The live site validator.
//
// Phases, in order (logged as they happen):
//
//   NotStarted -> FetchingLanding -> Crawling -> ValidatingPages
//              -> ValidatingAssets -> Reporting -> Done
//
// The only way out early is FetchingLanding -> Fatal: if the landing page
// does not load, nothing else is attempted and the run fails with a
// single fatal issue.
//
// Pages (including same-origin pages outside the base path, which are
// never crawled) and assets are validated by HTTP status in batches of at
// most `concurrency` requests. Links to other sites go through the same
// cached external check as the static validator. Base-path problems are
// warnings only.
// =============================================================================

use super::queue::{crawl_site, CrawlOptions, CrawlPhase, CrawlResult};
use crate::checker::{BasePath, Classifier, ExternalCheck, ExternalLinkCache, HttpChecker, PathScope, RefKind};
use crate::config::Config;
use crate::error::GuardianError;
use crate::logger::RunLog;
use crate::prompt::LiveTarget;
use crate::report::{finish_run, IssueReport, RunOutcome, Tool, ValidationIssue, ValidationSummary};
use anyhow::Result;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use url::{Origin, Url};

struct Phase(CrawlPhase);

impl Phase {
    fn advance(&mut self, next: CrawlPhase, log: &mut RunLog) {
        tracing::debug!(from = self.0.label(), to = next.label(), "phase change");
        self.0 = next;
        log.info(format!("Phase: {}", next.label()));
    }
}

// Runs the live validator against one deployment
//
// Parameters:
//   config: project configuration (concurrency, timeout, prefixes, logs)
//   root: project root, for the logs directory
//   target: landing page URL, deployment mode and base path
//   log: the run log
pub async fn run_live(config: &Config, root: &Path, target: &LiveTarget, log: &mut RunLog) -> Result<RunOutcome> {
    let tool = Tool::LiveSite;
    let logs = config.logs(root);
    let mut phase = Phase(CrawlPhase::NotStarted);

    let landing = Url::parse(&target.url).map_err(|e| GuardianError::InvalidUrl {
        url: target.url.clone(),
        reason: e.to_string(),
    })?;
    let origin = landing.origin();

    log.info(format!("Mode: {}", target.mode.label()));
    log.info(format!("Landing page: {landing}"));
    log.info(format!("Base path: {}", target.base));

    let checker = HttpChecker::new(config.timeout(), config.concurrency, &config.user_agent)?;
    let classifier = Classifier::new(&config.asset_extensions, Some(origin.clone()));
    let options = CrawlOptions {
        landing,
        base: target.base.clone(),
        max_pages: config.max_pages,
    };

    phase.advance(CrawlPhase::FetchingLanding, log);
    let crawl = match crawl_site(checker.client(), &classifier, &options).await {
        Ok(crawl) => crawl,
        Err(e) => match e.downcast_ref::<GuardianError>() {
            Some(fatal @ GuardianError::LandingUnreachable { .. }) => {
                phase.advance(CrawlPhase::Fatal, log);
                log.error(fatal.to_string());
                let summary = ValidationSummary::fatal(tool, fatal.to_string());
                return finish_run(&logs, summary, log);
            }
            _ => return Err(e),
        },
    };

    phase.advance(CrawlPhase::Crawling, log);
    log.info(format!(
        "Crawled {} page(s), discovered {} asset(s)",
        crawl.pages.len(),
        crawl.assets.len()
    ));
    if crawl.truncated {
        log.warn(format!("Stopped after {} pages (max_pages)", config.max_pages));
    }

    let mut report = IssueReport::default();

    phase.advance(CrawlPhase::ValidatingPages, log);
    let pages: Vec<String> = crawl.pages.iter().chain(crawl.out_of_scope.iter()).cloned().collect();
    let page_results = checker.check_batched(&pages).await;
    record_failures(&mut report, &crawl, &origin, RefKind::Link, &page_results);
    let (checked, from_cache) = check_external_links(config, root, &checker, &crawl, &mut report, log).await;

    phase.advance(CrawlPhase::ValidatingAssets, log);
    let assets: Vec<String> = crawl.assets.iter().cloned().collect();
    let asset_results = checker.check_batched(&assets).await;
    record_failures(&mut report, &crawl, &origin, RefKind::Asset, &asset_results);

    let warnings = base_path_warnings(&mut report, &crawl, &origin, &target.base, &config.internal_prefixes);
    if warnings > 0 {
        log.warn(format!("{warnings} path(s) missing the base path {}", target.base));
    }

    phase.advance(CrawlPhase::Reporting, log);
    report.log(log);

    let details = BTreeMap::from([
        ("pagesVisited".to_string(), crawl.pages.len()),
        ("assetsDiscovered".to_string(), crawl.assets.len()),
        ("pagesOutsideBase".to_string(), crawl.out_of_scope.len()),
        ("fetchFailures".to_string(), crawl.fetch_failures),
        ("externalUrls".to_string(), crawl.external.len()),
        ("checked".to_string(), checked),
        ("fromCache".to_string(), from_cache),
    ]);
    let mut summary = ValidationSummary::build(tool, &report, details);
    if crawl.truncated {
        summary = summary.with_note(format!("crawl stopped at max_pages = {}", config.max_pages));
    }

    phase.advance(CrawlPhase::Done, log);
    finish_run(&logs, summary, log)
}

// Checks links to other sites through the persisted external cache
//
// Returns: (URLs checked over the network, URLs answered from cache)
async fn check_external_links(
    config: &Config,
    root: &Path,
    checker: &HttpChecker,
    crawl: &CrawlResult,
    report: &mut IssueReport,
    log: &mut RunLog,
) -> (usize, usize) {
    if crawl.external.is_empty() {
        return (0, 0);
    }

    let mut cache = ExternalLinkCache::load(&config.cache_path(root), config.freshness());
    log.info(format!("Checking {} external link(s)", crawl.external.len()));
    let (results, stats) = checker.check_external(&crawl.external, &mut cache).await;

    for (url, check) in &results {
        if let Some(warning) = &check.warning {
            log.warn(format!("{url}: {warning}"));
        }
        if !check.ok {
            report.add(source_of(crawl, url), ValidationIssue::external_failed(url, RefKind::Link, check));
        }
    }

    if let Err(e) = cache.save() {
        log.warn(format!("Could not save external link cache: {e:#}"));
    }
    (stats.checked, stats.from_cache)
}

fn record_failures(
    report: &mut IssueReport,
    crawl: &CrawlResult,
    origin: &Origin,
    kind: RefKind,
    results: &[(String, ExternalCheck)],
) {
    for (url, check) in results.iter().filter(|(_, check)| !check.ok) {
        let issue = if same_origin(url, origin) {
            ValidationIssue::live_failed(url, kind, check)
        } else {
            ValidationIssue::external_failed(url, kind, check)
        };
        report.add(source_of(crawl, url), issue);
    }
}

// Adds a warning for every same-origin path that lacks the base path
//
// URLs that differ only in their query string share a path, so they
// produce one warning per referring page.
//
// Returns: how many warnings were added
fn base_path_warnings(
    report: &mut IssueReport,
    crawl: &CrawlResult,
    origin: &Origin,
    base: &BasePath,
    internal_prefixes: &[String],
) -> usize {
    if base.is_root() {
        return 0;
    }

    let pages = crawl
        .pages
        .iter()
        .chain(crawl.out_of_scope.iter())
        .map(|url| (url, RefKind::Link));
    let assets = crawl.assets.iter().map(|url| (url, RefKind::Asset));

    let mut seen = BTreeSet::new();
    for (url, kind) in pages.chain(assets) {
        let Ok(parsed) = Url::parse(url) else { continue };
        if parsed.origin() != *origin {
            continue;
        }
        let path = parsed.path();
        let scope = PathScope::of(path, kind, internal_prefixes);
        if scope.needs_base_prefix() && base.is_missing_prefix(path) {
            let source = source_of(crawl, url);
            if seen.insert((source.clone(), path.to_string(), kind)) {
                report.add(source, ValidationIssue::missing_base(path, kind, base));
            }
        }
    }
    seen.len()
}

fn same_origin(url: &str, origin: &Origin) -> bool {
    Url::parse(url).map(|u| u.origin() == *origin).unwrap_or(false)
}

// Issues are grouped by the path of the page that referenced the URL
// (the landing page is its own referrer)
fn source_of(crawl: &CrawlResult, url: &str) -> String {
    let source = crawl.referrers.get(url).map(String::as_str).unwrap_or(url);
    match Url::parse(source) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => source.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::DeploymentMode;
    use crate::report::IssueType;
    use crate::testutil::{page, serve};
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::Router;

    async fn run(router: Router, path: &str, base: &str) -> (tempfile::TempDir, RunOutcome) {
        let addr = serve(router).await;
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            base_path: base.to_string(),
            ..Config::default()
        };
        let target = LiveTarget {
            mode: DeploymentMode::Subdirectory,
            url: format!("http://{addr}{path}"),
            base: BasePath::new(base),
        };
        let mut log = RunLog::console();
        let outcome = run_live(&config, dir.path(), &target, &mut log).await.unwrap();
        (dir, outcome)
    }

    #[tokio::test]
    async fn test_landing_page_500_aborts() {
        let router = Router::new().route("/", get(|| async { StatusCode::INTERNAL_SERVER_ERROR }));
        let (dir, outcome) = run(router, "/", "/").await;

        assert_eq!(outcome.exit_code, 1);
        assert_eq!(outcome.summary.summary.issues, 1);
        assert!(outcome.summary.summary.details.is_empty(), "no crawl attempted");
        assert!(outcome.summary.notes[0].contains("HTTP 500"));
        assert!(dir.path().join("logs/summaries/live-site.json").is_file());
    }

    #[tokio::test]
    async fn test_missing_base_prefix_is_only_a_warning() {
        let router = Router::new()
            .route("/docs/", page(r#"<a href="/writing">Writing</a><a href="/docs/about/">About</a><script src="/_astro/app.js"></script>"#))
            .route("/docs/about/", page("<p>about</p>"))
            .route("/writing", page("<p>outside the base</p>"))
            .route("/_astro/app.js", get(|| async { "" }));

        let (_dir, outcome) = run(router, "/docs/", "/docs").await;

        assert_eq!(outcome.exit_code, 0);
        let counts = &outcome.summary.summary;
        assert_eq!(counts.issues, 0);
        assert_eq!(counts.warnings, 1);
        assert_eq!(counts.details["pagesVisited"], 2);

        let issue = &outcome.summary.files[0].issues[0];
        assert_eq!(outcome.summary.files[0].file, "/docs/");
        assert_eq!(issue.issue_type, IssueType::BasePath);
        assert_eq!(issue.url, "/writing");
    }

    #[tokio::test]
    async fn test_broken_page_and_asset_are_reported_by_referrer() {
        let router = Router::new()
            .route("/", page(r#"<a href="/writing/">Writing</a>"#))
            .route("/writing/", page(r#"<a href="/writing/gone/">Gone</a><img src="/img/missing.png">"#));

        let (_dir, outcome) = run(router, "/", "/").await;

        assert_eq!(outcome.exit_code, 1);
        assert_eq!(outcome.summary.summary.issues, 2);
        assert_eq!(outcome.summary.files.len(), 1);
        assert_eq!(outcome.summary.files[0].file, "/writing/");
        assert_eq!(outcome.summary.summary.details["fetchFailures"], 1);

        let messages: Vec<&str> = outcome.summary.files[0]
            .issues
            .iter()
            .map(|i| i.message.as_str())
            .collect();
        assert!(messages.contains(&"Asset returned HTTP 404"));
        assert!(messages.contains(&"Page returned HTTP 404"));
    }

    #[tokio::test]
    async fn test_dead_page_outside_base_is_an_issue() {
        let router = Router::new()
            .route("/docs/", page(r#"<a href="/writing">Writing</a>"#));

        let (_dir, outcome) = run(router, "/docs/", "/docs").await;

        assert_eq!(outcome.exit_code, 1);
        let counts = &outcome.summary.summary;
        assert_eq!(counts.issues, 1);
        assert_eq!(counts.internal_issues, 1);
        assert_eq!(counts.warnings, 1);
        assert_eq!(counts.details["pagesOutsideBase"], 1);

        let messages: Vec<&str> = outcome.summary.files[0]
            .issues
            .iter()
            .map(|i| i.message.as_str())
            .collect();
        assert!(messages.contains(&"Page returned HTTP 404"));
    }

    #[tokio::test]
    async fn test_query_variants_share_one_warning() {
        let router = Router::new()
            .route("/docs/", page(r#"<a href="/writing?a">A</a><a href="/writing?b">B</a>"#))
            .route("/writing", page("<p>outside the base</p>"));

        let (_dir, outcome) = run(router, "/docs/", "/docs").await;

        assert_eq!(outcome.exit_code, 0);
        assert_eq!(outcome.summary.summary.warnings, 1);
        assert_eq!(outcome.summary.files.len(), 1);
        assert_eq!(outcome.summary.files[0].issues.len(), 1);
    }

    #[tokio::test]
    async fn test_dead_off_origin_link_fails_the_run() {
        let other = serve(Router::new()).await;
        let html = format!(r#"<a href="http://{other}/dead">Gone</a>"#);
        let router = Router::new().route(
            "/",
            get(move || {
                let html = html.clone();
                async move { axum::response::Html(html) }
            }),
        );

        let (_dir, outcome) = run(router, "/", "/").await;

        assert_eq!(outcome.exit_code, 1);
        let counts = &outcome.summary.summary;
        assert_eq!(counts.external_issues, 1);
        assert_eq!(counts.details["pagesVisited"], 1);
        assert_eq!(counts.details["externalUrls"], 1);
        assert_eq!(counts.details["checked"], 1);

        let issue = &outcome.summary.files[0].issues[0];
        assert_eq!(outcome.summary.files[0].file, "/");
        assert_eq!(issue.issue_type, IssueType::External);
        assert_eq!(issue.message, "External link returned HTTP 404");
    }

    #[tokio::test]
    async fn test_healthy_site_passes() {
        let router = Router::new()
            .route("/", page(r#"<a href="/about">About</a><link rel="icon" href="/favicon.ico">"#))
            .route("/about", page("<p>hi</p>"))
            .route("/favicon.ico", get(|| async { "icon" }));

        let (_dir, outcome) = run(router, "/", "/").await;
        assert_eq!(outcome.exit_code, 0);
        assert_eq!(outcome.summary.summary.details["assetsDiscovered"], 1);
    }
}
