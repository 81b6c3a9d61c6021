// src/checker/http.rs
// =============================================================================
// This module checks if URLs are alive by making HTTP requests.
//
// Key functionality:
// - Makes HTTP HEAD requests (lightweight, no body download)
// - Falls back to GET when a server refuses HEAD (405/501) or HEAD fails
// - Turns status codes and transport errors into ExternalCheck results
// - Runs checks in fixed-size batches: never more than `concurrency`
//   requests in flight, and shared state is only touched between batches
// - Serves fresh results from the external link cache without any I/O
//
// There is no retry. A request that times out is reported as failed once;
// running the validator again is the retry.
// =============================================================================

use super::cache::ExternalLinkCache;
use anyhow::Result;
use chrono::Utc;
use futures::future::join_all;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

/// Outcome of checking one URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalCheck {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    /// Set when no HTTP status was obtained (timeout, DNS, TLS...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExternalCheck {
    fn failed(error: String) -> Self {
        Self {
            ok: false,
            status: None,
            warning: None,
            error: Some(error),
        }
    }

    /// One-line description for logs and issue messages
    pub fn describe(&self) -> String {
        match (&self.status, &self.error) {
            (Some(status), _) => format!("HTTP {status}"),
            (None, Some(error)) => error.clone(),
            (None, None) => "unknown failure".to_string(),
        }
    }
}

/// How a batch of external URLs was answered
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CheckStats {
    /// Unique URLs asked about
    pub total: usize,
    /// URLs that needed a live request
    pub checked: usize,
    /// URLs answered by a fresh cache entry
    pub from_cache: usize,
}

#[derive(Clone)]
pub struct HttpChecker {
    client: Client,
    concurrency: usize,
}

impl HttpChecker {
    // Creates a checker with a shared HTTP client
    //
    // Parameters:
    //   timeout: per-request timeout; a timed out request becomes a failure
    //   concurrency: maximum requests in flight at once
    //   user_agent: sent with every request (some hosts reject empty agents)
    pub fn new(timeout: Duration, concurrency: usize, user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(5)) // Follow up to 5 redirects
            .user_agent(user_agent)
            .build()?;

        Ok(Self {
            client,
            concurrency: concurrency.max(1),
        })
    }

    /// The underlying client, shared with the crawler for page fetches
    pub fn client(&self) -> &Client {
        &self.client
    }

    // Checks a single URL
    //
    // HEAD first. If the server does not support HEAD, or the HEAD request
    // itself errors out (not a timeout), we try one GET before giving up.
    pub async fn check_url(&self, url: &str) -> ExternalCheck {
        let check = match self.client.head(url).send().await {
            Ok(response) => {
                let status = response.status();
                if matches!(status, StatusCode::METHOD_NOT_ALLOWED | StatusCode::NOT_IMPLEMENTED) {
                    self.check_with_get(url).await
                } else {
                    analyze_status(status, location(&response))
                }
            }
            Err(e) if e.is_timeout() => categorize_error(&e),
            Err(_) => self.check_with_get(url).await,
        };

        tracing::debug!(url, ok = check.ok, result = %check.describe(), "checked");
        check
    }

    async fn check_with_get(&self, url: &str) -> ExternalCheck {
        match self.client.get(url).send().await {
            Ok(response) => analyze_status(response.status(), location(&response)),
            Err(e) => categorize_error(&e),
        }
    }

    // Checks many URLs in fixed-size batches
    //
    // Returns: (url, result) pairs in the same order as the input
    pub async fn check_batched(&self, urls: &[String]) -> Vec<(String, ExternalCheck)> {
        let mut results = Vec::with_capacity(urls.len());

        for batch in urls.chunks(self.concurrency) {
            let checks = join_all(batch.iter().map(|url| self.check_url(url))).await;
            results.extend(batch.iter().cloned().zip(checks));
        }

        results
    }

    // Checks external URLs, using and updating the persisted cache
    //
    // Parameters:
    //   urls: the unique external URLs referenced anywhere in the site
    //   cache: fresh entries are used as-is, new successes are recorded
    //
    // Returns: a result for every URL plus counts of live vs cached answers
    pub async fn check_external(
        &self,
        urls: &BTreeSet<String>,
        cache: &mut ExternalLinkCache,
    ) -> (BTreeMap<String, ExternalCheck>, CheckStats) {
        let now = Utc::now();
        let mut results = BTreeMap::new();
        let mut pending = Vec::new();

        for url in urls {
            match cache.fresh(url, now) {
                Some(entry) => {
                    tracing::debug!(url = %url, "external result from cache");
                    results.insert(url.clone(), entry.to_check());
                }
                None => pending.push(url.clone()),
            }
        }

        let stats = CheckStats {
            total: urls.len(),
            checked: pending.len(),
            from_cache: urls.len() - pending.len(),
        };

        for batch in pending.chunks(self.concurrency) {
            let checks = join_all(batch.iter().map(|url| self.check_url(url))).await;
            // The batch is complete; only now do the shared maps change
            let checked_at = Utc::now();
            for (url, check) in batch.iter().zip(checks) {
                cache.record(url, &check, checked_at);
                results.insert(url.clone(), check);
            }
        }

        (results, stats)
    }
}

fn location(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get(reqwest::header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

// Analyzes an HTTP status to determine the check result
//
// HTTP status codes:
// - 200-299: Success
// - 300-399: Redirect the client stopped following; usable, but worth a warning
// - 429:     Rate limited; reported as a failure with a hint
// - anything else: failure with the observed status
fn analyze_status(status: StatusCode, location: Option<String>) -> ExternalCheck {
    let code = Some(status.as_u16());

    if status.is_success() {
        ExternalCheck {
            ok: true,
            status: code,
            warning: None,
            error: None,
        }
    } else if status.is_redirection() {
        let target = location.unwrap_or_else(|| "unknown".to_string());
        ExternalCheck {
            ok: true,
            status: code,
            warning: Some(format!("redirects to {target}")),
            error: None,
        }
    } else if status == StatusCode::TOO_MANY_REQUESTS {
        ExternalCheck {
            ok: false,
            status: code,
            warning: Some("rate limited; try again later".to_string()),
            error: None,
        }
    } else {
        ExternalCheck {
            ok: false,
            status: code,
            warning: None,
            error: None,
        }
    }
}

// Categorizes different error types from reqwest
//
// reqwest errors can happen for many reasons:
// - Network timeout
// - DNS resolution failure
// - SSL certificate issues
// - Too many redirects
fn categorize_error(error: &reqwest::Error) -> ExternalCheck {
    let error_string = error.to_string();

    let message = if error.is_timeout() {
        "Request timed out".to_string()
    } else if error.is_redirect() {
        "Too many redirects".to_string()
    } else if error.is_connect() {
        if error_string.contains("dns") {
            "Could not resolve hostname".to_string()
        } else {
            "Connection failed".to_string()
        }
    } else if error_string.contains("certificate") || error_string.contains("ssl") {
        "SSL certificate error".to_string()
    } else {
        error_string
    };

    ExternalCheck::failed(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{serve, test_router};
    use std::time::Duration;

    fn checker() -> HttpChecker {
        HttpChecker::new(Duration::from_secs(2), 4, "site-guardian-tests").unwrap()
    }

    #[test]
    fn test_status_analysis() {
        assert!(analyze_status(StatusCode::OK, None).ok);

        let missing = analyze_status(StatusCode::NOT_FOUND, None);
        assert!(!missing.ok);
        assert_eq!(missing.status, Some(404));
        assert_eq!(missing.describe(), "HTTP 404");

        let moved = analyze_status(StatusCode::NOT_MODIFIED, Some("/new".to_string()));
        assert!(moved.ok);
        assert_eq!(moved.warning.as_deref(), Some("redirects to /new"));

        let limited = analyze_status(StatusCode::TOO_MANY_REQUESTS, None);
        assert!(!limited.ok);
        assert!(limited.warning.is_some());
    }

    #[tokio::test]
    async fn test_check_against_local_server() {
        let addr = serve(test_router()).await;
        let checker = checker();

        let ok = checker.check_url(&format!("http://{addr}/ok")).await;
        assert!(ok.ok);
        assert_eq!(ok.status, Some(200));

        let missing = checker.check_url(&format!("http://{addr}/missing")).await;
        assert!(!missing.ok);
        assert_eq!(missing.status, Some(404));
    }

    #[tokio::test]
    async fn test_head_rejected_falls_back_to_get() {
        let addr = serve(test_router()).await;
        let check = checker().check_url(&format!("http://{addr}/get-only")).await;
        assert!(check.ok, "{check:?}");
    }

    #[tokio::test]
    async fn test_unreachable_host_reports_error_not_status() {
        // Port 9 (discard) on localhost is closed in test environments
        let check = checker().check_url("http://127.0.0.1:9/").await;
        assert!(!check.ok);
        assert_eq!(check.status, None);
        assert!(check.error.is_some());
    }

    #[tokio::test]
    async fn test_batches_keep_input_order() {
        let addr = serve(test_router()).await;
        let urls: Vec<String> = (0..9)
            .map(|i| if i % 3 == 0 { format!("http://{addr}/missing") } else { format!("http://{addr}/ok") })
            .collect();

        let results = checker().check_batched(&urls).await;
        assert_eq!(results.len(), 9);
        for (i, (url, check)) in results.iter().enumerate() {
            assert_eq!(url, &urls[i]);
            assert_eq!(check.ok, i % 3 != 0);
        }
    }

    #[tokio::test]
    async fn test_timeout_reports_error_not_status() {
        let router = axum::Router::new().route(
            "/slow",
            axum::routing::get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "late"
            }),
        );
        let addr = serve(router).await;
        let checker = HttpChecker::new(Duration::from_millis(300), 2, "site-guardian-tests").unwrap();

        let check = checker.check_url(&format!("http://{addr}/slow")).await;
        assert!(!check.ok);
        assert_eq!(check.status, None);
        assert_eq!(check.error.as_deref(), Some("Request timed out"));
    }

    #[tokio::test]
    async fn test_in_flight_requests_never_exceed_concurrency() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let router = {
            let (in_flight, peak) = (in_flight.clone(), peak.clone());
            axum::Router::new().route(
                "/count",
                axum::routing::get(move || {
                    let (in_flight, peak) = (in_flight.clone(), peak.clone());
                    async move {
                        let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        in_flight.fetch_sub(1, Ordering::SeqCst);
                        "ok"
                    }
                }),
            )
        };
        let addr = serve(router).await;
        let checker = HttpChecker::new(Duration::from_secs(5), 3, "site-guardian-tests").unwrap();
        let urls: Vec<String> = (0..10).map(|i| format!("http://{addr}/count?n={i}")).collect();

        let results = checker.check_batched(&urls).await;

        assert_eq!(results.len(), 10);
        assert!(results.iter().all(|(_, check)| check.ok));
        let peak = peak.load(Ordering::SeqCst);
        assert!(peak <= 3, "peak in flight was {peak}");
        assert!(peak > 1, "requests in a batch should overlap");
    }

    #[tokio::test]
    async fn test_cache_short_circuits_network() {
        let addr = serve(test_router()).await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let urls: BTreeSet<String> =
            [format!("http://{addr}/ok"), format!("http://{addr}/missing")].into_iter().collect();

        let mut cache = ExternalLinkCache::load(&path, chrono::Duration::days(7));
        let (first, stats) = checker().check_external(&urls, &mut cache).await;
        assert_eq!(stats, CheckStats { total: 2, checked: 2, from_cache: 0 });
        assert_eq!(first.len(), 2);

        // only the success was cached, so the 404 is checked again
        let (_, stats) = checker().check_external(&urls, &mut cache).await;
        assert_eq!(stats, CheckStats { total: 2, checked: 1, from_cache: 1 });
    }
}
