// src/checker/classify.rs
// =============================================================================
// Decides what a raw URL string found in HTML actually is.
//
// For every href/src value we answer three questions:
// - Should we look at it at all? (mailto:, tel:, javascript:, data: and
//   in-page #anchors are ignored)
// - Is it external (another origin) or internal (this site)?
// - Is it an asset (stylesheet, image, font, script...) or a page link?
//
// The raw string is always kept for reporting. For lookups we use the
// "clean" form with query string and fragment removed.
//
// Base paths live here too: a site deployed under /docs has every URL
// prefixed with /docs, and BasePath knows how to strip and check that.
// =============================================================================

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use url::{Origin, Url};

/// Whether a reference points at a navigable document or a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefKind {
    Link,
    Asset,
}

impl fmt::Display for RefKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefKind::Link => write!(f, "link"),
            RefKind::Asset => write!(f, "asset"),
        }
    }
}

/// A URL that survived classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classified {
    /// Exactly what appeared in the HTML
    pub raw: String,
    /// Query string and fragment removed
    pub clean: String,
    pub kind: RefKind,
    pub external: bool,
}

/// The URL prefix a site is deployed under.
///
/// Stored normalized: empty for a root deployment, otherwise a leading
/// slash and no trailing slash (`/docs`).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BasePath(String);

impl BasePath {
    pub fn new(raw: &str) -> Self {
        let trimmed = raw.trim().trim_matches('/');
        if trimmed.is_empty() {
            Self(String::new())
        } else {
            Self(format!("/{trimmed}"))
        }
    }

    pub fn root() -> Self {
        Self(String::new())
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// "/" for root deployments, "/docs" otherwise
    pub fn as_str(&self) -> &str {
        if self.is_root() {
            "/"
        } else {
            &self.0
        }
    }

    // Strips the base path from a root-relative path
    //
    // Returns: the remainder (always starting with '/'), or None when the
    // path is not under the base path
    //
    // Examples with base "/docs":
    //   "/docs/about" -> Some("/about")
    //   "/docs"       -> Some("/")
    //   "/docsearch"  -> None
    //   "/writing"    -> None
    pub fn strip<'a>(&self, path: &'a str) -> Option<&'a str> {
        if self.is_root() {
            return Some(path);
        }
        let rest = path.strip_prefix(self.0.as_str())?;
        if rest.is_empty() {
            Some("/")
        } else if rest.starts_with('/') {
            Some(rest)
        } else {
            None
        }
    }

    /// True when a root-relative path should carry the prefix but does not
    pub fn is_missing_prefix(&self, path: &str) -> bool {
        !self.is_root() && path.starts_with('/') && self.strip(path).is_none()
    }

    /// Prefixes a site path with the base path
    pub fn join(&self, path: &str) -> String {
        let path = path.trim_start_matches('/');
        if self.is_root() {
            format!("/{path}")
        } else {
            format!("{}/{}", self.0, path)
        }
    }
}

impl fmt::Display for BasePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a site path lives, as far as base-path rules are concerned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathScope {
    /// Generated by the framework (/_astro/..., /_image?...)
    FrameworkInternal,
    /// Exactly "/"
    SiteRoot,
    Page,
    Asset,
}

impl PathScope {
    pub fn of(path: &str, kind: RefKind, internal_prefixes: &[String]) -> Self {
        if internal_prefixes.iter().any(|p| path.starts_with(p.as_str())) {
            PathScope::FrameworkInternal
        } else if path == "/" {
            PathScope::SiteRoot
        } else {
            match kind {
                RefKind::Link => PathScope::Page,
                RefKind::Asset => PathScope::Asset,
            }
        }
    }

    // Does this path have to start with the base path?
    //
    // The site root is checked too: a link to "/" on a /docs deployment
    // leaves the site.
    pub fn needs_base_prefix(self) -> bool {
        match self {
            PathScope::FrameworkInternal => false,
            PathScope::SiteRoot | PathScope::Page | PathScope::Asset => true,
        }
    }
}

pub struct Classifier {
    asset_extensions: HashSet<String>,
    site_origin: Option<Origin>,
}

impl Classifier {
    // Creates a classifier
    //
    // Parameters:
    //   asset_extensions: lowercase extensions (no dot) that mark assets
    //   site_origin: the site's own origin; absolute URLs on it count as
    //                internal. None means every absolute URL is external.
    pub fn new(asset_extensions: &[String], site_origin: Option<Origin>) -> Self {
        Self {
            asset_extensions: asset_extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            site_origin,
        }
    }

    pub fn site_origin(&self) -> Option<&Origin> {
        self.site_origin.as_ref()
    }

    // Classifies one raw URL
    //
    // Returns: None for URLs we never check, Some(Classified) otherwise
    pub fn classify(&self, raw: &str) -> Option<Classified> {
        let trimmed = raw.trim();
        if is_ignored(trimmed) {
            return None;
        }

        if let Some(absolute) = parse_absolute(trimmed) {
            if absolute.scheme() != "http" && absolute.scheme() != "https" {
                return None;
            }

            let internal = self
                .site_origin
                .as_ref()
                .is_some_and(|origin| *origin == absolute.origin());
            let kind = self.kind_of(absolute.path());

            let clean = if internal {
                absolute.path().to_string()
            } else {
                let mut without_fragment = absolute.clone();
                without_fragment.set_fragment(None);
                without_fragment.to_string()
            };

            return Some(Classified {
                raw: trimmed.to_string(),
                clean,
                kind,
                external: !internal,
            });
        }

        let clean = strip_query_and_fragment(trimmed);
        if clean.is_empty() {
            // "?page=2" style references point back at the same document
            return None;
        }

        Some(Classified {
            raw: trimmed.to_string(),
            clean: clean.to_string(),
            kind: self.kind_of(clean),
            external: false,
        })
    }

    /// Asset if the last path segment's extension is a known asset type
    pub fn kind_of(&self, path: &str) -> RefKind {
        match extension(path) {
            Some(ext) if self.asset_extensions.contains(&ext.to_ascii_lowercase()) => RefKind::Asset,
            _ => RefKind::Link,
        }
    }
}

fn is_ignored(url: &str) -> bool {
    const IGNORED_SCHEMES: [&str; 4] = ["mailto:", "tel:", "javascript:", "data:"];

    if url.is_empty() || url.starts_with('#') {
        return true;
    }
    let lower = url.to_ascii_lowercase();
    IGNORED_SCHEMES.iter().any(|scheme| lower.starts_with(scheme))
}

// Parses URLs that carry their own scheme (or are protocol-relative)
//
// Relative paths like "/about" or "img/a.png" fail Url::parse, which is
// exactly how we tell them apart.
fn parse_absolute(url: &str) -> Option<Url> {
    if let Some(rest) = url.strip_prefix("//") {
        return Url::parse(&format!("https://{rest}")).ok();
    }
    Url::parse(url).ok()
}

/// Removes "?query" and "#fragment" from a URL string
pub fn strip_query_and_fragment(url: &str) -> &str {
    match url.find(['?', '#']) {
        Some(index) => &url[..index],
        None => url,
    }
}

/// Extension of the last path segment, without the dot
pub fn extension(path: &str) -> Option<&str> {
    let segment = path.rsplit('/').next()?;
    let (stem, ext) = segment.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        None
    } else {
        Some(ext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_ASSET_EXTENSIONS;

    fn classifier(origin: Option<&str>) -> Classifier {
        let extensions: Vec<String> = DEFAULT_ASSET_EXTENSIONS.iter().map(|s| s.to_string()).collect();
        Classifier::new(&extensions, origin.map(|o| Url::parse(o).unwrap().origin()))
    }

    #[test]
    fn test_special_schemes_are_ignored() {
        let c = classifier(None);
        for raw in ["mailto:me@me.dev", "tel:+123", "javascript:void(0)", "data:image/png;base64,AA", "#top", "", "  "] {
            assert!(c.classify(raw).is_none(), "{raw:?} should be ignored");
        }
    }

    #[test]
    fn test_query_and_fragment_are_stripped_but_raw_kept() {
        let c = classifier(None);
        let r = c.classify("/writing/post/?ref=rss#comments").unwrap();
        assert_eq!(r.raw, "/writing/post/?ref=rss#comments");
        assert_eq!(r.clean, "/writing/post/");
        assert_eq!(r.kind, RefKind::Link);
        assert!(!r.external);
    }

    #[test]
    fn test_asset_kind_from_extension() {
        let c = classifier(None);
        assert_eq!(c.classify("/fonts/inter.WOFF2").unwrap().kind, RefKind::Asset);
        assert_eq!(c.classify("styles/site.css?v=3").unwrap().kind, RefKind::Asset);
        assert_eq!(c.classify("/about").unwrap().kind, RefKind::Link);
        assert_eq!(c.classify("/notes/page.html").unwrap().kind, RefKind::Link);
    }

    #[test]
    fn test_external_depends_on_site_origin() {
        let c = classifier(Some("https://me.dev"));
        let own = c.classify("https://me.dev/about#x").unwrap();
        assert!(!own.external);
        assert_eq!(own.clean, "/about");

        let other = c.classify("https://www.rust-lang.org/learn#book").unwrap();
        assert!(other.external);
        assert_eq!(other.clean, "https://www.rust-lang.org/learn");

        let cdn = c.classify("//cdn.example.net/lib.js").unwrap();
        assert!(cdn.external);
        assert_eq!(cdn.kind, RefKind::Asset);

        assert!(c.classify("ftp://files.me.dev/x").is_none());
    }

    #[test]
    fn test_base_path_normalization() {
        assert!(BasePath::new("").is_root());
        assert!(BasePath::new("/").is_root());
        assert_eq!(BasePath::new("docs/").as_str(), "/docs");
        assert_eq!(BasePath::new("/docs").join("about/"), "/docs/about/");
        assert_eq!(BasePath::root().join("/about"), "/about");
    }

    #[test]
    fn test_base_path_strip() {
        let base = BasePath::new("/docs");
        assert_eq!(base.strip("/docs/about"), Some("/about"));
        assert_eq!(base.strip("/docs"), Some("/"));
        assert_eq!(base.strip("/docsearch"), None);
        assert!(base.is_missing_prefix("/writing"));
        assert!(!base.is_missing_prefix("/docs/writing"));
        assert!(!base.is_missing_prefix("relative/path"));
        assert!(!BasePath::root().is_missing_prefix("/writing"));
    }

    #[test]
    fn test_framework_paths_are_exempt_from_base_prefix() {
        let prefixes = vec!["/_astro".to_string(), "/_".to_string()];
        let scope = PathScope::of("/_astro/index.abc.css", RefKind::Asset, &prefixes);
        assert_eq!(scope, PathScope::FrameworkInternal);
        assert!(!scope.needs_base_prefix());
        assert!(PathScope::of("/writing", RefKind::Link, &prefixes).needs_base_prefix());
        assert_eq!(PathScope::of("/", RefKind::Link, &prefixes), PathScope::SiteRoot);
    }

    #[test]
    fn test_extension() {
        assert_eq!(extension("/a/b.png"), Some("png"));
        assert_eq!(extension("/a.dir/b"), None);
        assert_eq!(extension("/.well-known"), None);
        assert_eq!(extension("/about/"), None);
    }
}
