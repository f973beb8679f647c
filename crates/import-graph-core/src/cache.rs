//! On-disk cache of extracted imports, keyed by build configuration and
//! per-file modification time.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::extractor::ExtractedImport;
use crate::module::BuildConfiguration;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CachedImport {
    imported: String,
    line_number: usize,
    line_contents: String,
    is_type_checking: bool,
}

impl From<&ExtractedImport> for CachedImport {
    fn from(e: &ExtractedImport) -> Self {
        Self {
            imported: e.imported.clone(),
            line_number: e.line_number,
            line_contents: e.line_contents.clone(),
            is_type_checking: e.is_type_checking,
        }
    }
}

impl From<&CachedImport> for ExtractedImport {
    fn from(c: &CachedImport) -> Self {
        Self {
            imported: c.imported.clone(),
            line_number: c.line_number,
            line_contents: c.line_contents.clone(),
            is_type_checking: c.is_type_checking,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    mtime_secs: u64,
    mtime_nanos: u32,
    imports: Vec<CachedImport>,
}

/// Per-configuration on-disk store: `path -> { mtime, imports }`.
#[derive(Debug, Default)]
pub struct ImportCache {
    entries: HashMap<String, CacheEntry>,
    cache_dir: Option<PathBuf>,
    fingerprint: String,
}

impl ImportCache {
    /// Load the cache file for `config` under `cache_dir`. Missing,
    /// unreadable, or unparsable files are treated as a cold cache rather
    /// than propagated as errors.
    pub fn load(cache_dir: Option<&Path>, config: &BuildConfiguration) -> Self {
        let fingerprint = config.fingerprint();
        let Some(dir) = cache_dir else {
            return Self {
                entries: HashMap::new(),
                cache_dir: None,
                fingerprint,
            };
        };
        let path = dir.join(format!("{fingerprint}.json"));
        let entries = std::fs::read(&path)
            .ok()
            .and_then(|bytes| serde_json::from_slice::<HashMap<String, CacheEntry>>(&bytes).ok())
            .unwrap_or_else(|| {
                debug!(path = %path.display(), "cold cache: missing or unparsable");
                HashMap::new()
            });
        Self {
            entries,
            cache_dir: Some(dir.to_path_buf()),
            fingerprint,
        }
    }

    /// `Some(imports)` if `path` is cached with exactly `mtime`.
    pub fn lookup(&self, path: &str, mtime: SystemTime) -> Option<Vec<ExtractedImport>> {
        let entry = self.entries.get(path)?;
        let (secs, nanos) = split_epoch(mtime);
        if entry.mtime_secs != secs || entry.mtime_nanos != nanos {
            return None;
        }
        Some(entry.imports.iter().map(ExtractedImport::from).collect())
    }

    /// Write back the union of reused and freshly extracted entries for
    /// exactly the files in `current_files`; anything else on disk for this
    /// fingerprint is dropped (stale removal).
    pub fn store(
        &self,
        current_files: &[(String, SystemTime, Vec<ExtractedImport>)],
    ) -> std::io::Result<()> {
        let Some(dir) = &self.cache_dir else {
            return Ok(());
        };
        std::fs::create_dir_all(dir)?;
        let mut map = HashMap::with_capacity(current_files.len());
        for (path, mtime, imports) in current_files {
            let (secs, nanos) = split_epoch(*mtime);
            map.insert(
                path.clone(),
                CacheEntry {
                    mtime_secs: secs,
                    mtime_nanos: nanos,
                    imports: imports.iter().map(CachedImport::from).collect(),
                },
            );
        }
        let path = dir.join(format!("{}.json", self.fingerprint));
        let bytes = serde_json::to_vec_pretty(&map)?;
        std::fs::write(path, bytes)
    }
}

fn split_epoch(t: SystemTime) -> (u64, u32) {
    t.duration_since(UNIX_EPOCH)
        .map(|d| (d.as_secs(), d.subsec_nanos()))
        .unwrap_or((0, 0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cold_cache_when_dir_missing() {
        let config = BuildConfiguration::new(vec!["pkg".into()]);
        let cache = ImportCache::load(None, &config);
        assert!(cache.lookup("anything", SystemTime::now()).is_none());
    }

    #[test]
    fn round_trips_through_disk() {
        let tmp = tempfile::tempdir().unwrap();
        let config = BuildConfiguration::new(vec!["pkg".into()]);
        let mtime = SystemTime::now();
        let imports = vec![ExtractedImport {
            imported: "pkg.b".into(),
            line_number: 1,
            line_contents: "import pkg.b".into(),
            is_type_checking: false,
        }];

        let cache = ImportCache::load(Some(tmp.path()), &config);
        cache
            .store(&[("pkg/a.py".into(), mtime, imports.clone())])
            .unwrap();

        let reloaded = ImportCache::load(Some(tmp.path()), &config);
        let found = reloaded.lookup("pkg/a.py", mtime).unwrap();
        assert_eq!(found, imports);
    }

    #[test]
    fn stale_mtime_is_a_miss() {
        let tmp = tempfile::tempdir().unwrap();
        let config = BuildConfiguration::new(vec!["pkg".into()]);
        let mtime = SystemTime::now();
        let cache = ImportCache::load(Some(tmp.path()), &config);
        cache.store(&[("pkg/a.py".into(), mtime, vec![])]).unwrap();

        let reloaded = ImportCache::load(Some(tmp.path()), &config);
        let later = mtime + std::time::Duration::from_secs(10);
        assert!(reloaded.lookup("pkg/a.py", later).is_none());
    }

    #[test]
    fn corrupt_cache_file_is_treated_as_cold() {
        let tmp = tempfile::tempdir().unwrap();
        let config = BuildConfiguration::new(vec!["pkg".into()]);
        std::fs::write(tmp.path().join(format!("{}.json", config.fingerprint())), b"not json").unwrap();
        let cache = ImportCache::load(Some(tmp.path()), &config);
        assert!(cache.lookup("pkg/a.py", SystemTime::now()).is_none());
    }
}
