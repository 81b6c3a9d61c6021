// src/config.rs
// =============================================================================
// Project configuration for the validators.
//
// Every field has a default, so the tool runs with no config file at all.
// When a `site-guardian.toml` exists at the project root (or one is passed
// with --config) its values replace the defaults, and command-line flags
// replace both.
//
// Example site-guardian.toml:
//
//   base_path = "/docs"
//   site_url = "https://me.dev"
//   concurrency = 5
//   skip_patterns = ["example", "^placeholder"]
//
// Rust concepts:
// - #[serde(default)]: missing keys fall back to Default::default()
// - deny_unknown_fields: typos in the file become errors, not silent no-ops
// =============================================================================

use crate::checker::BasePath;
use crate::error::GuardianError;
use anyhow::Result;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File looked up at the project root when --config is not given
pub const CONFIG_FILE: &str = "site-guardian.toml";

/// Extensions that make a reference an asset rather than a page
pub const DEFAULT_ASSET_EXTENSIONS: &[&str] = &[
    "css", "js", "mjs", "json", "xml", "ico", "png", "jpg", "jpeg", "gif", "svg", "webp",
    "avif", "woff", "woff2", "ttf", "otf", "eot", "mp4", "webm", "mp3", "pdf", "txt",
    "webmanifest", "map",
];

/// Placeholder values that show up in prose and demos but are not real links.
/// This list is a starting point, not an authoritative catalogue.
pub const DEFAULT_SKIP_PATTERNS: &[&str] = &[
    r"(^|/)my-[\w-]+",
    r"example",
    r"/[A-Z][a-z]+[A-Z]\w*\.\w+$",
    r"^(main|app|index|script|styles?)\.(js|css)$",
    r"\{\{",
    r"\$\{",
];

/// Path prefixes owned by the site framework; never checked for the base path
pub const DEFAULT_INTERNAL_PREFIXES: &[&str] = &["/_astro", "/_"];

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Static build output, relative to the project root
    pub dist_dir: PathBuf,
    /// URL prefix the site is deployed under ("/" for root deployments)
    pub base_path: String,
    /// Public origin of the deployed site, if known
    pub site_url: Option<String>,
    /// Where `preview` serves the build locally
    pub local_preview_url: String,
    /// Persisted external link results, relative to the project root
    pub cache_file: PathBuf,
    /// Freshness window for cached external results
    pub cache_max_age_days: i64,
    /// Maximum requests in flight at once
    pub concurrency: usize,
    /// Per-request timeout
    pub timeout_secs: u64,
    /// Upper bound on pages the live crawler will visit
    pub max_pages: usize,
    /// Log files and summaries go here, relative to the project root
    pub logs_dir: PathBuf,
    pub user_agent: String,
    pub asset_extensions: Vec<String>,
    pub skip_patterns: Vec<String>,
    pub internal_prefixes: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dist_dir: PathBuf::from("dist"),
            base_path: "/".to_string(),
            site_url: None,
            local_preview_url: "http://localhost:4321".to_string(),
            cache_file: PathBuf::from(".cache/external-links.json"),
            cache_max_age_days: 7,
            concurrency: 10,
            timeout_secs: 10,
            max_pages: 500,
            logs_dir: PathBuf::from("logs"),
            user_agent: concat!("site-guardian/", env!("CARGO_PKG_VERSION")).to_string(),
            asset_extensions: to_strings(DEFAULT_ASSET_EXTENSIONS),
            skip_patterns: to_strings(DEFAULT_SKIP_PATTERNS),
            internal_prefixes: to_strings(DEFAULT_INTERNAL_PREFIXES),
        }
    }
}

impl Config {
    // Loads configuration for a project
    //
    // Parameters:
    //   root: the project root (paths in the config are relative to it)
    //   explicit: a --config path; when given, the file must exist
    //
    // Returns: the merged configuration, or an error if the file is invalid
    pub fn load(root: &Path, explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let default = root.join(CONFIG_FILE);
                if !default.is_file() {
                    return Ok(Self::default());
                }
                default
            }
        };

        let text = std::fs::read_to_string(&path).map_err(|e| GuardianError::Config {
            path: path.clone(),
            reason: e.to_string(),
        })?;

        let config = Self::parse(&text).map_err(|reason| GuardianError::Config {
            path: path.clone(),
            reason,
        })?;

        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    fn parse(text: &str) -> std::result::Result<Self, String> {
        let config: Self = toml::from_str(text).map_err(|e| e.to_string())?;
        if config.concurrency == 0 {
            return Err("concurrency must be at least 1".to_string());
        }
        if config.timeout_secs == 0 {
            return Err("timeout_secs must be at least 1".to_string());
        }
        Ok(config)
    }

    /// Resolves a configured path against the project root
    pub fn path(&self, root: &Path, relative: &Path) -> PathBuf {
        if relative.is_absolute() {
            relative.to_path_buf()
        } else {
            root.join(relative)
        }
    }

    pub fn dist(&self, root: &Path) -> PathBuf {
        self.path(root, &self.dist_dir)
    }

    pub fn cache_path(&self, root: &Path) -> PathBuf {
        self.path(root, &self.cache_file)
    }

    pub fn logs(&self, root: &Path) -> PathBuf {
        self.path(root, &self.logs_dir)
    }

    pub fn base(&self) -> BasePath {
        BasePath::new(&self.base_path)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn freshness(&self) -> chrono::Duration {
        chrono::Duration::days(self.cache_max_age_days)
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
