// src/checker/html.rs
// =============================================================================
// This module extracts URL references from HTML pages.
//
// We use the `scraper` crate which:
// - Parses HTML into a DOM (Document Object Model)
// - Copes with multi-line attributes and odd quoting (it's html5ever inside)
// - Lets us walk up from an element to its ancestors
//
// Three kinds of places are scanned, in this order:
// 1. href="..." attributes
// 2. src="..." attributes (and the URLs inside srcset="...")
// 3. url(...) inside <style> blocks and style="..." attributes
//
// Code samples are the big source of false positives: a blog post about
// fonts will happily show `src: url(my-font.woff2)` inside a <pre>. When
// `exclude_code_blocks` is on, anything inside <code>, <pre> or <samp> is
// skipped. A regex denylist removes the remaining placeholder values.
// =============================================================================

use super::classify::{Classifier, RefKind};
use anyhow::{Context, Result};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::sync::LazyLock;
use url::Url;

// The selectors are constants, so parsing them can't fail at runtime
static HREF: LazyLock<Selector> = LazyLock::new(|| Selector::parse("[href]").unwrap());
static SRC: LazyLock<Selector> = LazyLock::new(|| Selector::parse("[src], [srcset]").unwrap());
static STYLE_BLOCK: LazyLock<Selector> = LazyLock::new(|| Selector::parse("style").unwrap());
static STYLE_ATTR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("[style]").unwrap());

/// url(foo.png), url('foo.png'), url("foo.png")
static CSS_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"url\(\s*['"]?([^'")\s]+)['"]?\s*\)"#).unwrap());

const EXCLUDED_TAGS: [&str; 3] = ["code", "pre", "samp"];

/// One reference found in one HTML document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlReference {
    /// Exactly as written in the HTML
    pub raw_url: String,
    /// Query/fragment stripped, or absolute when a page URL was given
    pub resolved_url: String,
    pub kind: RefKind,
    /// The document the reference was found in
    pub source_file: String,
    pub external: bool,
}

/// Compiled regex denylist for placeholder URLs
#[derive(Debug, Clone, Default)]
pub struct SkipPatterns(Vec<Regex>);

impl SkipPatterns {
    pub fn compile(patterns: &[String]) -> Result<Self> {
        let compiled = patterns
            .iter()
            .map(|p| Regex::new(p).with_context(|| format!("invalid skip pattern '{p}'")))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self(compiled))
    }

    pub fn matches(&self, url: &str) -> bool {
        self.0.iter().any(|re| re.is_match(url))
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExtractOptions {
    /// Skip everything inside <code>, <pre> and <samp>
    pub exclude_code_blocks: bool,
    pub skip_patterns: SkipPatterns,
    /// When set, references are resolved to absolute URLs against it
    pub page_url: Option<Url>,
}

// Extracts all checkable references from an HTML document
//
// Parameters:
//   html: the HTML content
//   source: identity of the document (relative file path or page URL)
//   classifier: decides internal/external and link/asset
//   options: code-block exclusion, skip patterns, page URL
//
// Returns: references in order of first appearance, with duplicates
// (same raw URL, kind and source) collapsed into one
pub fn extract_references(
    html: &str,
    source: &str,
    classifier: &Classifier,
    options: &ExtractOptions,
) -> Vec<UrlReference> {
    let mut seen = HashSet::new();
    let mut references = Vec::new();

    for raw in extract_raw_urls(html, options.exclude_code_blocks) {
        let Some(classified) = classifier.classify(&raw) else {
            continue;
        };
        if options.skip_patterns.matches(&classified.raw) {
            tracing::debug!(url = %classified.raw, source, "skipping placeholder URL");
            continue;
        }

        let (resolved_url, kind, external) = match &options.page_url {
            Some(page) => match resolve_against(page, &classified.raw) {
                Some(absolute) => {
                    let external = !classifier
                        .site_origin()
                        .is_some_and(|origin| *origin == absolute.origin());
                    let kind = classifier.kind_of(absolute.path());
                    (absolute.to_string(), kind, external)
                }
                None => continue,
            },
            None => (classified.clean.clone(), classified.kind, classified.external),
        };

        if !seen.insert((classified.raw.clone(), kind)) {
            continue;
        }

        references.push(UrlReference {
            raw_url: classified.raw,
            resolved_url,
            kind,
            source_file: source.to_string(),
            external,
        });
    }

    references
}

// Pulls every raw URL string out of the document
//
// Returns: href values first, then src/srcset values, then CSS url() values
pub fn extract_raw_urls(html: &str, exclude_code_blocks: bool) -> Vec<String> {
    let document = Html::parse_document(html);
    let keep = |element: &ElementRef| !exclude_code_blocks || !inside_excluded(element);

    let mut urls = Vec::new();

    for element in document.select(&HREF).filter(|e| keep(e)) {
        if let Some(href) = element.value().attr("href") {
            urls.push(href.to_string());
        }
    }

    for element in document.select(&SRC).filter(|e| keep(e)) {
        if let Some(src) = element.value().attr("src") {
            urls.push(src.to_string());
        }
        if let Some(srcset) = element.value().attr("srcset") {
            urls.extend(srcset_urls(srcset));
        }
    }

    for element in document.select(&STYLE_BLOCK).filter(|e| keep(e)) {
        let css: String = element.text().collect();
        urls.extend(css_urls(&css));
    }
    for element in document.select(&STYLE_ATTR).filter(|e| keep(e)) {
        if let Some(style) = element.value().attr("style") {
            urls.extend(css_urls(style));
        }
    }

    urls.retain(|u| !u.trim().is_empty());
    urls
}

fn inside_excluded(element: &ElementRef) -> bool {
    if EXCLUDED_TAGS.contains(&element.value().name()) {
        return true;
    }
    element
        .ancestors()
        .filter_map(|node| node.value().as_element())
        .any(|el| EXCLUDED_TAGS.contains(&el.name()))
}

// "a.png 1x, a@2x.png 2x" -> ["a.png", "a@2x.png"]
fn srcset_urls(srcset: &str) -> impl Iterator<Item = String> + '_ {
    srcset
        .split(',')
        .filter_map(|candidate| candidate.split_whitespace().next())
        .map(str::to_string)
}

fn css_urls(css: &str) -> Vec<String> {
    CSS_URL
        .captures_iter(css)
        .map(|cap| cap[1].to_string())
        .collect()
}

// Resolves a possibly-relative URL against the page it was found on
//
// Examples:
//   page = "https://me.dev/docs/blog/"
//   href = "../about"          -> "https://me.dev/docs/about"
//   href = "/logo.png#x"       -> "https://me.dev/logo.png"
//   href = "https://other.com" -> "https://other.com/"
fn resolve_against(page: &Url, href: &str) -> Option<Url> {
    let mut absolute = page.join(href).ok()?;
    absolute.set_fragment(None);
    match absolute.scheme() {
        "http" | "https" => Some(absolute),
        _ => None,
    }
}

// -----------------------------------------------------------------------------
// NOTES:
//
// 1. Why parse instead of regex-matching href="..."?
//    - Attributes can span lines and use single, double or no quotes
//    - The parser also gives us ancestors, which is how <pre>/<code>
//      exclusion works without stripping text by hand
//
// 2. Why is url() still a regex?
//    - It lives inside CSS text, which the HTML parser treats as opaque
//
// 3. What is LazyLock?
//    - A value computed on first use and then shared
//    - Selectors and regexes are compiled once, not per document
// -----------------------------------------------------------------------------
