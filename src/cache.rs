//! Content cache of transformed documents.
//!
//! Each entry is one file under `cache/` whose first line is a metadata
//! header:
//!
//! ```text
//! <!-- docsync-cache {"version":1,"timestamp_ms":...,"source_file_path":...,...} -->
//! # Document body...
//! ```
//!
//! An entry is served only if its version matches [`CACHE_VERSION`], its
//! checksum matches the body, and it is not older than the Live Document it
//! was derived from. Anything else is a miss; corruption is logged and never
//! reported to the caller.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{Result, SyncError};
use crate::models::CacheStats;
use crate::store::{atomic_write, check_filename, mtime_millis, DataDir};
use crate::traits::Transform;

/// Bump when the header or the transform output changes shape.
pub const CACHE_VERSION: u32 = 1;

const HEADER_PREFIX: &str = "<!-- docsync-cache ";
const HEADER_SUFFIX: &str = " -->";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheMetadata {
    pub version: u32,
    pub timestamp_ms: i64,
    pub source_file_path: String,
    pub source_url: String,
    pub cache_path: String,
    pub checksum: String,
}

/// Why an entry was not served. Internal: callers only ever see a miss.
#[derive(Debug, PartialEq, Eq)]
enum Miss {
    Absent,
    Corrupt(&'static str),
    VersionMismatch(u32),
    Stale,
}

pub struct ContentCache {
    data: DataDir,
    transform: Arc<dyn Transform>,
}

/// Outcome of [`ContentCache::warm`].
#[derive(Debug, Clone, Default)]
pub struct WarmReport {
    pub warmed: usize,
    pub failed: Vec<(String, String)>,
}

impl ContentCache {
    pub fn new(data: DataDir, transform: Arc<dyn Transform>) -> Self {
        Self { data, transform }
    }

    fn entry_path(&self, filename: &str) -> Result<PathBuf> {
        check_filename(filename)?;
        Ok(self.data.cache_dir().join(filename))
    }

    /// Store `content` for `filename`, replacing any previous entry.
    pub fn write(&self, filename: &str, content: &str, source_url: &str) -> Result<()> {
        let path = self.entry_path(filename)?;
        let meta = CacheMetadata {
            version: CACHE_VERSION,
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
            source_file_path: self.data.live_path(filename)?.display().to_string(),
            source_url: source_url.to_string(),
            cache_path: path.display().to_string(),
            checksum: checksum(content),
        };
        let header = serde_json::to_string(&meta)?;

        let mut out = String::with_capacity(content.len() + header.len() + 32);
        out.push_str(HEADER_PREFIX);
        out.push_str(&header);
        out.push_str(HEADER_SUFFIX);
        out.push('\n');
        out.push_str(content);

        atomic_write(&path, out.as_bytes())?;
        Ok(())
    }

    /// Cached content for `filename`, or `None` when absent, corrupt,
    /// from another cache version, or older than its Live Document.
    pub fn read(&self, filename: &str) -> Option<String> {
        match self.lookup(filename) {
            Ok(content) => Some(content),
            Err(Miss::Absent) => None,
            Err(miss) => {
                debug!(filename, ?miss, "cache entry rejected");
                None
            }
        }
    }

    fn lookup(&self, filename: &str) -> std::result::Result<String, Miss> {
        let path = self.entry_path(filename).map_err(|_| Miss::Absent)?;
        let raw = fs::read_to_string(&path).map_err(|_| Miss::Absent)?;
        let (meta, content) = parse_entry(&raw)?;

        if meta.version != CACHE_VERSION {
            return Err(Miss::VersionMismatch(meta.version));
        }
        if meta.checksum != checksum(content) {
            return Err(Miss::Corrupt("checksum mismatch"));
        }
        if let Some(source_mtime) = mtime_millis(Path::new(&meta.source_file_path)) {
            if meta.timestamp_ms < source_mtime {
                return Err(Miss::Stale);
            }
        }
        Ok(content.to_string())
    }

    /// Serve from cache, regenerating from the Live Document on a miss.
    pub fn get_or_generate(&self, filename: &str, source_url: &str) -> Result<String> {
        if let Some(content) = self.read(filename) {
            return Ok(content);
        }

        let raw = self
            .data
            .read_live(filename)?
            .ok_or_else(|| SyncError::not_found(filename))?;
        let content = self.transform.apply(&raw);
        self.write(filename, &content, source_url)?;
        debug!(filename, "cache regenerated");
        Ok(content)
    }

    /// Delete every entry. Returns how many files were removed.
    pub fn clear(&self) -> Result<usize> {
        let dir = self.data.cache_dir();
        if !dir.exists() {
            return Ok(0);
        }
        let removed = self.stats().file_count;
        fs::remove_dir_all(&dir)?;
        Ok(removed)
    }

    pub fn stats(&self) -> CacheStats {
        let mut stats = CacheStats::default();
        for entry in WalkDir::new(self.data.cache_dir())
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            stats.file_count += 1;
            stats.total_bytes += entry.metadata().map(|m| m.len()).unwrap_or(0);
        }
        stats
    }

    /// Regenerate entries for `(filename, source_url)` pairs. Per-file
    /// failures are collected, never propagated.
    pub fn warm<'a, I>(&self, docs: I) -> WarmReport
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut report = WarmReport::default();
        for (filename, source_url) in docs {
            match self.get_or_generate(filename, source_url) {
                Ok(_) => report.warmed += 1,
                Err(e) => {
                    debug!(filename, error = %e, "warm skipped");
                    report.failed.push((filename.to_string(), e.to_string()));
                }
            }
        }
        report
    }
}

fn parse_entry(raw: &str) -> std::result::Result<(CacheMetadata, &str), Miss> {
    let (first, rest) = raw.split_once('\n').ok_or(Miss::Corrupt("no header line"))?;
    let json = first
        .strip_prefix(HEADER_PREFIX)
        .and_then(|s| s.strip_suffix(HEADER_SUFFIX))
        .ok_or(Miss::Corrupt("malformed header"))?;
    let meta: CacheMetadata =
        serde_json::from_str(json).map_err(|_| Miss::Corrupt("unparseable metadata"))?;
    Ok((meta, rest))
}

/// `sha256:<hex>` of `content`.
pub fn checksum(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("sha256:{}", hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{NormalizeNewlines, Passthrough};
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    fn setup() -> (TempDir, DataDir, ContentCache) {
        let tmp = TempDir::new().unwrap();
        let data = DataDir::new(tmp.path());
        data.ensure().unwrap();
        let cache = ContentCache::new(data.clone(), Arc::new(Passthrough));
        (tmp, data, cache)
    }

    fn touch_future(path: &Path) {
        let file = fs::File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() + Duration::from_secs(60))
            .unwrap();
    }

    #[test]
    fn write_then_read_returns_content() {
        let (_tmp, data, cache) = setup();
        data.write_live("a.md", "# A\n").unwrap();
        cache.write("a.md", "# A cached\n", "https://x/a.md").unwrap();
        assert_eq!(cache.read("a.md").as_deref(), Some("# A cached\n"));
    }

    #[test]
    fn entry_without_live_document_is_valid() {
        let (_tmp, _data, cache) = setup();
        cache.write("orphan.md", "body", "u").unwrap();
        assert_eq!(cache.read("orphan.md").as_deref(), Some("body"));
    }

    #[test]
    fn live_mutation_invalidates() {
        let (_tmp, data, cache) = setup();
        data.write_live("a.md", "v1").unwrap();
        cache.write("a.md", "v1", "u").unwrap();

        data.write_live("a.md", "v2").unwrap();
        touch_future(&data.live_path("a.md").unwrap());
        assert_eq!(cache.read("a.md"), None);
    }

    #[test]
    fn corrupt_entries_are_misses() {
        let (_tmp, data, cache) = setup();
        let path = data.cache_dir().join("bad.md");
        fs::create_dir_all(data.cache_dir()).unwrap();

        fs::write(&path, "no header at all").unwrap();
        assert_eq!(cache.read("bad.md"), None);

        fs::write(&path, "<!-- docsync-cache {not json} -->\nbody").unwrap();
        assert_eq!(cache.read("bad.md"), None);

        cache.write("bad.md", "full body", "u").unwrap();
        let truncated = fs::read_to_string(&path).unwrap().replace("full body", "full");
        fs::write(&path, truncated).unwrap();
        assert_eq!(cache.read("bad.md"), None);
    }

    #[test]
    fn version_mismatch_is_miss() {
        let (_tmp, data, cache) = setup();
        cache.write("a.md", "body", "u").unwrap();
        let path = data.cache_dir().join("a.md");
        let raw = fs::read_to_string(&path).unwrap();
        fs::write(&path, raw.replace("\"version\":1", "\"version\":0")).unwrap();
        assert_eq!(cache.read("a.md"), None);
    }

    #[test]
    fn get_or_generate_regenerates_and_reports_missing() {
        let tmp = TempDir::new().unwrap();
        let data = DataDir::new(tmp.path());
        let cache = ContentCache::new(data.clone(), Arc::new(NormalizeNewlines));
        data.write_live("a.md", "line\r\n").unwrap();

        assert_eq!(cache.get_or_generate("a.md", "u").unwrap(), "line\n");
        assert_eq!(cache.read("a.md").as_deref(), Some("line\n"));

        let err = cache.get_or_generate("ghost.md", "u").unwrap_err();
        assert!(matches!(err, SyncError::NotFound(_)));
    }

    #[test]
    fn clear_is_idempotent_and_stats_count() {
        let (_tmp, _data, cache) = setup();
        assert_eq!(cache.clear().unwrap(), 0);

        cache.write("a.md", "aaaa", "u").unwrap();
        cache.write("sub/b.md", "bb", "u").unwrap();
        let stats = cache.stats();
        assert_eq!(stats.file_count, 2);
        assert!(stats.total_bytes > 6);

        assert_eq!(cache.clear().unwrap(), 2);
        assert_eq!(cache.stats(), CacheStats::default());
        assert_eq!(cache.clear().unwrap(), 0);
    }

    #[test]
    fn warm_swallows_missing_sources() {
        let (_tmp, data, cache) = setup();
        data.write_live("a.md", "A").unwrap();
        let report = cache.warm([("a.md", "u1"), ("missing.md", "u2")]);
        assert_eq!(report.warmed, 1);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "missing.md");
    }
}
