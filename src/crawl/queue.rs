// src/crawl/queue.rs
// =============================================================================
// This module implements the live site crawl with a breadth-first approach.
//
// How it works:
// 1. Fetch the landing page; if that fails, the whole run is over
// 2. Extract references from the page HTML
// 3. Same-origin pages under the base path go into the queue (if not
//    visited yet); assets go into one flat set no matter who linked them;
//    links to other sites are collected for the external check
// 4. Repeat until the queue is empty (or max_pages is reached)
//
// The crawl is a loop over a VecDeque, not recursion, so memory stays flat
// and the visited set is checked on every iteration. Pages and assets are
// only collected here; their HTTP status is validated afterwards in
// batches (see live.rs).
// =============================================================================

use crate::checker::{extract_references, BasePath, Classifier, ExtractOptions, RefKind};
use crate::error::GuardianError;
use anyhow::{anyhow, Result};
use reqwest::Client;
use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use url::Url;

/// Where the live validation currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlPhase {
    NotStarted,
    FetchingLanding,
    Crawling,
    ValidatingPages,
    ValidatingAssets,
    Reporting,
    Done,
    Fatal,
}

impl CrawlPhase {
    pub fn label(self) -> &'static str {
        match self {
            CrawlPhase::NotStarted => "not started",
            CrawlPhase::FetchingLanding => "fetching landing page",
            CrawlPhase::Crawling => "crawling",
            CrawlPhase::ValidatingPages => "validating pages",
            CrawlPhase::ValidatingAssets => "validating assets",
            CrawlPhase::Reporting => "reporting",
            CrawlPhase::Done => "done",
            CrawlPhase::Fatal => "fatal",
        }
    }
}

pub struct CrawlOptions {
    pub landing: Url,
    pub base: BasePath,
    pub max_pages: usize,
}

/// Everything the crawl discovered
#[derive(Debug, Default)]
pub struct CrawlResult {
    /// Pages fetched during the crawl, in visiting order
    pub pages: Vec<String>,
    /// Every asset URL referenced by any page (same-origin or not)
    pub assets: BTreeSet<String>,
    /// Same-origin page URLs outside the base path; checked, never crawled
    pub out_of_scope: BTreeSet<String>,
    /// Page links to other origins; checked, never crawled
    pub external: BTreeSet<String>,
    /// URL -> the first page that referenced it
    pub referrers: BTreeMap<String, String>,
    /// Pages whose fetch failed mid-crawl (validation reports them)
    pub fetch_failures: usize,
    /// Set when max_pages stopped the crawl early
    pub truncated: bool,
}

// Crawls a live site starting from the landing page
//
// Parameters:
//   client: shared HTTP client (timeouts are configured on it)
//   classifier: knows the landing page's origin, so it can split
//               internal from external references
//   options: landing URL, base path, page limit
//
// Returns: the crawl result, or GuardianError::LandingUnreachable
pub async fn crawl_site(client: &Client, classifier: &Classifier, options: &CrawlOptions) -> Result<CrawlResult> {
    let landing = options.landing.to_string();

    let landing_html = match fetch_page(client, &landing).await {
        Ok(Some(html)) => html,
        Ok(None) => String::new(),
        Err(e) => {
            return Err(GuardianError::LandingUnreachable {
                url: landing,
                reason: e.to_string(),
            }
            .into())
        }
    };

    let mut result = CrawlResult::default();
    let mut queue = VecDeque::from([landing.clone()]);
    let mut visited = HashSet::new();
    let mut enqueued = HashSet::from([landing.clone()]);
    let mut prefetched = Some(landing_html);

    while let Some(page) = queue.pop_front() {
        // Skip if already visited
        if !visited.insert(page.clone()) {
            continue;
        }
        result.pages.push(page.clone());
        tracing::debug!(page = %page, queued = queue.len(), "crawling");

        let html = match prefetched.take() {
            Some(html) => html,
            None => match fetch_page(client, &page).await {
                Ok(Some(html)) => html,
                Ok(None) => continue, // not HTML, nothing to extract
                Err(e) => {
                    tracing::debug!(page = %page, error = %e, "fetch failed during crawl");
                    result.fetch_failures += 1;
                    continue;
                }
            },
        };

        let Ok(page_url) = Url::parse(&page) else { continue };
        let extract = ExtractOptions {
            page_url: Some(page_url),
            ..ExtractOptions::default()
        };

        for reference in extract_references(&html, &page, classifier, &extract) {
            let url = reference.resolved_url;
            result.referrers.entry(url.clone()).or_insert_with(|| page.clone());

            match (reference.kind, reference.external) {
                (RefKind::Asset, _) => {
                    result.assets.insert(url);
                }
                (RefKind::Link, true) => {
                    result.external.insert(url);
                }
                (RefKind::Link, false) => {
                    if !in_scope(&url, &options.base) {
                        result.out_of_scope.insert(url);
                    } else if !enqueued.contains(&url) {
                        if enqueued.len() >= options.max_pages {
                            result.truncated = true;
                            continue;
                        }
                        enqueued.insert(url.clone());
                        queue.push_back(url);
                    }
                }
            }
        }
    }

    Ok(result)
}

fn in_scope(url: &str, base: &BasePath) -> bool {
    Url::parse(url)
        .map(|u| base.strip(u.path()).is_some())
        .unwrap_or(false)
}

// Fetches a web page and returns its HTML content
//
// Returns:
//   Ok(Some(html)) for an HTML page
//   Ok(None) for a successful non-HTML response
//   Err for transport errors and non-2xx statuses
async fn fetch_page(client: &Client, url: &str) -> Result<Option<String>> {
    let response = client.get(url).send().await?;

    if !response.status().is_success() {
        return Err(anyhow!("HTTP {}", response.status().as_u16()));
    }

    let is_html = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.contains("html"))
        .unwrap_or(true);
    if !is_html {
        return Ok(None);
    }

    Ok(Some(response.text().await?))
}
