// src/checker/cache.rs
// =============================================================================
// Persisted results of external URL checks.
//
// Checking a few hundred outbound links takes a while and annoys the sites
// on the other end, so good results are remembered on disk:
//
//   {
//     "https://www.rust-lang.org/": { "status": 200, "ok": true, "checkedAt": "..." }
//   }
//
// Rules:
// - A missing or unreadable file is an empty cache, never an error
// - Entries older than the freshness window are checked again
// - Only successful results are stored, so failures are re-checked every run
// - Deleting the file forces a full revalidation
// =============================================================================

use super::http::ExternalCheck;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedExternal {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub checked_at: DateTime<Utc>,
}

impl CachedExternal {
    pub fn to_check(&self) -> ExternalCheck {
        ExternalCheck {
            ok: self.ok,
            status: self.status,
            warning: self.warning.clone(),
            error: self.error.clone(),
        }
    }
}

pub struct ExternalLinkCache {
    path: PathBuf,
    max_age: chrono::Duration,
    // BTreeMap keeps the file sorted, so unchanged caches produce unchanged files
    entries: BTreeMap<String, CachedExternal>,
}

impl ExternalLinkCache {
    // Reads the cache file
    //
    // Parameters:
    //   path: location of the JSON file
    //   max_age: freshness window for entries
    //
    // Never fails: missing or corrupt files give an empty cache
    pub fn load(path: &Path, max_age: chrono::Duration) -> Self {
        let entries = match std::fs::read_to_string(path) {
            Ok(text) => match serde_json::from_str(&text) {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "ignoring corrupt external link cache");
                    BTreeMap::new()
                }
            },
            Err(_) => BTreeMap::new(),
        };

        Self {
            path: path.to_path_buf(),
            max_age,
            entries,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// The cached result for `url`, if there is one younger than the window
    pub fn fresh(&self, url: &str, now: DateTime<Utc>) -> Option<&CachedExternal> {
        self.entries
            .get(url)
            .filter(|entry| now.signed_duration_since(entry.checked_at) <= self.max_age)
    }

    /// Remembers a live check result; failures are dropped
    pub fn record(&mut self, url: &str, check: &ExternalCheck, now: DateTime<Utc>) {
        if !check.ok {
            self.entries.remove(url);
            return;
        }
        self.entries.insert(
            url.to_string(),
            CachedExternal {
                status: check.status,
                ok: check.ok,
                warning: check.warning.clone(),
                error: check.error.clone(),
                checked_at: now,
            },
        );
    }

    // Writes the cache back to disk
    //
    // Written to a temporary file first and renamed into place, so a
    // crash mid-write leaves the previous cache intact.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating cache directory {}", parent.display()))?;
        }

        let json = serde_json::to_string_pretty(&self.entries)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json + "\n")
            .with_context(|| format!("writing {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("replacing {}", self.path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok_check() -> ExternalCheck {
        ExternalCheck {
            ok: true,
            status: Some(200),
            warning: None,
            error: None,
        }
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ExternalLinkCache::load(&dir.path().join("none.json"), chrono::Duration::days(7));
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_corrupt_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, "{ not json").unwrap();
        let cache = ExternalLinkCache::load(&path, chrono::Duration::days(7));
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".cache").join("external-links.json");
        let now = Utc::now();

        let mut cache = ExternalLinkCache::load(&path, chrono::Duration::days(7));
        cache.record("https://www.rust-lang.org/", &ok_check(), now);
        cache.save().unwrap();

        let reloaded = ExternalLinkCache::load(&path, chrono::Duration::days(7));
        let entry = reloaded.fresh("https://www.rust-lang.org/", now).unwrap();
        assert_eq!(entry.status, Some(200));
        assert!(entry.ok);

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"checkedAt\""));
    }

    #[test]
    fn test_stale_entries_are_not_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = ExternalLinkCache::load(&dir.path().join("c.json"), chrono::Duration::days(7));
        let checked = Utc::now() - chrono::Duration::days(8);
        cache.record("https://old.dev/", &ok_check(), checked);

        assert!(cache.fresh("https://old.dev/", Utc::now()).is_none());
        assert!(cache.fresh("https://old.dev/", checked + chrono::Duration::days(1)).is_some());
    }

    #[test]
    fn test_failures_are_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = ExternalLinkCache::load(&dir.path().join("c.json"), chrono::Duration::days(7));
        let now = Utc::now();
        cache.record("https://flaky.dev/", &ok_check(), now);

        let failed = ExternalCheck {
            ok: false,
            status: Some(503),
            warning: None,
            error: None,
        };
        cache.record("https://flaky.dev/", &failed, now);
        assert!(cache.fresh("https://flaky.dev/", now).is_none());
    }
}
