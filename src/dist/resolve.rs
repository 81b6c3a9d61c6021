// src/dist/resolve.rs
// =============================================================================
// Maps an internal reference to the file(s) in dist that would satisfy it.
//
// The rules, for a reference with its query and fragment already removed:
//
//   "/"                        -> index.html
//   asset, or has an extension -> the path itself
//   "/writing/"                -> writing/index.html
//   "/writing"                 -> writing.html OR writing/index.html
//
// Root-relative paths start at the output root (after the base path is
// stripped); relative paths start in the source file's directory. A path
// whose ".." segments climb above the root is reported as outside dist,
// whatever happens to exist on disk.
// =============================================================================

use super::tree::DistTree;
use crate::checker::{extension, BasePath, RefKind, UrlReference};
use crate::report::ValidationIssue;
use percent_encoding::percent_decode_str;
use std::collections::HashMap;

/// Files that would satisfy one reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidates {
    /// Relative to the output root, '/'-separated
    pub paths: Vec<String>,
    /// The path climbed above the output root
    pub outside: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub outside: bool,
    pub exists: bool,
}

// Computes candidate paths for a cleaned reference
//
// Parameters:
//   clean: the reference with query and fragment removed
//   kind: link or asset
//   source: the referencing file, relative to the output root
//   base: base path to strip from root-relative references
pub fn candidates(clean: &str, kind: RefKind, source: &str, base: &BasePath) -> Candidates {
    let decoded = percent_decode_str(clean).decode_utf8_lossy();
    let path: &str = &decoded;

    let mut segments: Vec<&str> = Vec::new();
    let relative_part = if path.starts_with('/') {
        // Missing the base prefix is the base-paths validator's business;
        // here the path is simply tried against the root as written.
        let within = base.strip(path).unwrap_or(path);
        if within == "/" {
            return Candidates {
                paths: vec!["index.html".to_string()],
                outside: false,
            };
        }
        within
    } else {
        segments.extend(source.split('/').filter(|s| !s.is_empty()));
        segments.pop(); // the file name itself
        path
    };

    let mut outside = false;
    for segment in relative_part.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    outside = true;
                }
            }
            other => segments.push(other),
        }
    }

    let directory_like = matches!(relative_part.rsplit('/').next(), Some("" | "." | ".."));
    let joined = segments.join("/");
    let last = segments.last().copied().unwrap_or("");

    let paths = if joined.is_empty() {
        vec!["index.html".to_string()]
    } else if kind == RefKind::Asset || extension(last).is_some() {
        vec![joined]
    } else if directory_like {
        vec![format!("{joined}/index.html")]
    } else {
        vec![format!("{joined}.html"), format!("{joined}/index.html")]
    };

    Candidates { paths, outside }
}

/// Resolves references against one output tree, memoizing per candidate set
pub struct Resolver<'a> {
    tree: &'a DistTree,
    base: BasePath,
    cache: HashMap<(bool, Vec<String>), Resolution>,
    hits: usize,
}

impl<'a> Resolver<'a> {
    pub fn new(tree: &'a DistTree, base: BasePath) -> Self {
        Self {
            tree,
            base,
            cache: HashMap::new(),
            hits: 0,
        }
    }

    pub fn resolve(&mut self, reference: &UrlReference) -> Resolution {
        let Candidates { paths, outside } = candidates(
            &reference.resolved_url,
            reference.kind,
            &reference.source_file,
            &self.base,
        );

        let key = (outside, paths);
        if let Some(resolution) = self.cache.get(&key) {
            self.hits += 1;
            return *resolution;
        }

        let resolution = Resolution {
            outside,
            // never looked up: outside is an error no matter what exists
            exists: !outside && key.1.iter().any(|p| self.tree.contains(p)),
        };
        self.cache.insert(key, resolution);
        resolution
    }

    /// The issue for a reference, or None when it resolves
    pub fn issue_for(&mut self, reference: &UrlReference) -> Option<ValidationIssue> {
        let resolution = self.resolve(reference);
        if resolution.outside {
            Some(ValidationIssue::outside_dist(&reference.raw_url, reference.kind))
        } else if !resolution.exists {
            Some(ValidationIssue::target_missing(&reference.raw_url, reference.kind))
        } else {
            None
        }
    }

    /// Lookups answered from the memo table
    pub fn cache_hits(&self) -> usize {
        self.hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::write_tree;

    fn paths(clean: &str, kind: RefKind, source: &str) -> Vec<String> {
        candidates(clean, kind, source, &BasePath::root()).paths
    }

    fn reference(raw: &str, kind: RefKind, source: &str) -> UrlReference {
        UrlReference {
            raw_url: raw.to_string(),
            resolved_url: raw.to_string(),
            kind,
            source_file: source.to_string(),
            external: false,
        }
    }

    fn tree(files: &[&str]) -> (tempfile::TempDir, DistTree) {
        let dir = tempfile::tempdir().unwrap();
        let entries: Vec<(&str, &str)> = files.iter().map(|f| (*f, "")).collect();
        write_tree(dir.path(), &entries);
        let tree = DistTree::scan(dir.path()).unwrap();
        (dir, tree)
    }

    #[test]
    fn test_root_is_index() {
        assert_eq!(paths("/", RefKind::Link, "writing/index.html"), vec!["index.html"]);

        let (_dir, tree) = tree(&["index.html"]);
        let mut resolver = Resolver::new(&tree, BasePath::root());
        assert!(resolver.issue_for(&reference("/", RefKind::Link, "about/index.html")).is_none());
    }

    #[test]
    fn test_candidate_rules() {
        assert_eq!(paths("/logo.png", RefKind::Asset, "index.html"), vec!["logo.png"]);
        assert_eq!(paths("/feed.xml", RefKind::Asset, "index.html"), vec!["feed.xml"]);
        assert_eq!(paths("/notes/a.html", RefKind::Link, "index.html"), vec!["notes/a.html"]);
        assert_eq!(paths("/writing/", RefKind::Link, "index.html"), vec!["writing/index.html"]);
        assert_eq!(
            paths("/writing", RefKind::Link, "index.html"),
            vec!["writing.html", "writing/index.html"]
        );
    }

    #[test]
    fn test_relative_paths_start_in_source_directory() {
        assert_eq!(
            paths("img/cover.png", RefKind::Asset, "writing/post/index.html"),
            vec!["writing/post/img/cover.png"]
        );
        assert_eq!(paths("../", RefKind::Link, "writing/post/index.html"), vec!["writing/index.html"]);
        assert_eq!(paths("..", RefKind::Link, "writing/post/index.html"), vec!["writing/index.html"]);
        assert_eq!(paths("./", RefKind::Link, "index.html"), vec!["index.html"]);
    }

    #[test]
    fn test_base_path_is_stripped() {
        let base = BasePath::new("/docs");
        assert_eq!(candidates("/docs/", RefKind::Link, "index.html", &base).paths, vec!["index.html"]);
        assert_eq!(
            candidates("/docs/about/", RefKind::Link, "index.html", &base).paths,
            vec!["about/index.html"]
        );
        // missing prefix: tried as written
        assert_eq!(
            candidates("/writing/", RefKind::Link, "index.html", &base).paths,
            vec!["writing/index.html"]
        );
    }

    #[test]
    fn test_percent_encoded_paths_are_decoded() {
        assert_eq!(paths("/files/my%20cv.pdf", RefKind::Asset, "index.html"), vec!["files/my cv.pdf"]);
    }

    #[test]
    fn test_flat_file_route_satisfies_link() {
        let (_dir, tree) = tree(&["index.html", "about.html"]);
        let mut resolver = Resolver::new(&tree, BasePath::root());
        assert!(resolver.issue_for(&reference("/about", RefKind::Link, "index.html")).is_none());
    }

    #[test]
    fn test_directory_route_satisfies_link() {
        let (_dir, tree) = tree(&["index.html", "about/index.html"]);
        let mut resolver = Resolver::new(&tree, BasePath::root());
        assert!(resolver.issue_for(&reference("/about", RefKind::Link, "index.html")).is_none());
    }

    #[test]
    fn test_escaping_the_root_is_always_outside() {
        // the target exists at dist/etc/passwd, which must not matter
        let (_dir, tree) = tree(&["writing/index.html", "etc/passwd"]);
        let mut resolver = Resolver::new(&tree, BasePath::root());

        let escaping = reference("../../etc/passwd", RefKind::Link, "writing/index.html");
        let issue = resolver.issue_for(&escaping).unwrap();
        assert_eq!(issue.message, "Internal link resolves outside dist");

        let root_escape = reference("/../secret.png", RefKind::Asset, "index.html");
        let issue = resolver.issue_for(&root_escape).unwrap();
        assert_eq!(issue.message, "Internal asset resolves outside dist");
    }

    #[test]
    fn test_missing_target() {
        let (_dir, tree) = tree(&["index.html"]);
        let mut resolver = Resolver::new(&tree, BasePath::root());
        let issue = resolver.issue_for(&reference("/about", RefKind::Link, "index.html")).unwrap();
        assert_eq!(issue.message, "Internal link target missing in dist");
        assert_eq!(issue.url, "/about");
    }

    #[test]
    fn test_repeated_candidate_sets_hit_the_cache() {
        let (_dir, tree) = tree(&["index.html", "about/index.html"]);
        let mut resolver = Resolver::new(&tree, BasePath::root());

        resolver.resolve(&reference("/about/", RefKind::Link, "index.html"));
        resolver.resolve(&reference("/about/", RefKind::Link, "writing/index.html"));
        resolver.resolve(&reference("../about/", RefKind::Link, "writing/index.html"));
        assert_eq!(resolver.cache_hits(), 2);
    }
}
