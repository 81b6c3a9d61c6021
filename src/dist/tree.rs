// src/dist/tree.rs
// =============================================================================
// An in-memory listing of the static build output.
//
// The directory is walked exactly once per run. Afterwards "does this
// file exist?" is a set lookup instead of a filesystem call, which matters
// when a few hundred pages each link to the same navigation targets.
// =============================================================================

use crate::error::GuardianError;
use anyhow::{anyhow, Context, Result};
use jwalk::WalkDir;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

pub struct DistTree {
    root: PathBuf,
    /// Paths relative to the root, '/'-separated, e.g. "writing/index.html"
    files: BTreeSet<String>,
}

impl DistTree {
    // Walks the output directory
    //
    // Parameters:
    //   root: the dist directory
    //
    // Returns: the listing, or GuardianError::DistMissing if there is no
    // such directory
    pub fn scan(root: &Path) -> Result<Self> {
        if !root.is_dir() {
            return Err(GuardianError::DistMissing(root.to_path_buf()).into());
        }

        let mut files = BTreeSet::new();
        for entry in WalkDir::new(root).sort(true) {
            let entry = entry.map_err(|e| anyhow!("walking {}: {}", root.display(), e))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let relative = path.strip_prefix(root).unwrap_or(&path);
            files.insert(to_slash_path(relative));
        }

        tracing::debug!(root = %root.display(), files = files.len(), "scanned output tree");
        Ok(Self {
            root: root.to_path_buf(),
            files,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn contains(&self, relative: &str) -> bool {
        self.files.contains(relative)
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// HTML documents in sorted order
    pub fn html_files(&self) -> impl Iterator<Item = &str> {
        self.files
            .iter()
            .map(String::as_str)
            .filter(|f| f.ends_with(".html") || f.ends_with(".htm"))
    }

    pub fn read(&self, relative: &str) -> Result<String> {
        let path = self.root.join(relative);
        std::fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))
    }
}

fn to_slash_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::write_tree;

    #[test]
    fn test_scan_lists_files_relative_to_root() {
        let dir = tempfile::tempdir().unwrap();
        write_tree(
            dir.path(),
            &[
                ("index.html", "<h1>home</h1>"),
                ("writing/first/index.html", ""),
                ("_astro/site.css", ""),
            ],
        );

        let tree = DistTree::scan(dir.path()).unwrap();
        assert_eq!(tree.file_count(), 3);
        assert!(tree.contains("writing/first/index.html"));
        assert!(!tree.contains("writing"));

        let html: Vec<&str> = tree.html_files().collect();
        assert_eq!(html, vec!["index.html", "writing/first/index.html"]);
        assert_eq!(tree.read("index.html").unwrap(), "<h1>home</h1>");
    }

    #[test]
    fn test_missing_root_is_dist_missing() {
        let dir = tempfile::tempdir().unwrap();
        let err = DistTree::scan(&dir.path().join("dist")).err().unwrap();
        assert!(matches!(
            err.downcast_ref::<GuardianError>(),
            Some(GuardianError::DistMissing(_))
        ));
    }
}
