//! Data directory layout and the Live Document store.
//!
//! ```text
//! <data_dir>/
//!   docs/<filename>          Live Documents
//!   cache/<filename>         CacheEntry files
//!   .pending/                staging area (see `update`)
//!   .last-update             epoch millis of the last commit / initial sync
//!   .missing-docs            filenames that failed to download last run
//!   .manifest-cache.json     short-TTL copy of the remote manifest
//!   .lock                    advisory lock file
//!   CHANGELOG.md             newest-first ledger
//! ```

use chrono::{DateTime, TimeZone, Utc};
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

use crate::config::Config;
use crate::error::{Result, SyncError};

/// Suffix of in-flight [`atomic_write`] files. Reserved: no document
/// filename may end with it.
pub const TEMP_SUFFIX: &str = ".docsync-tmp";

#[derive(Debug, Clone)]
pub struct DataDir {
    root: PathBuf,
}

impl DataDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.storage.data_dir)
    }

    /// Create the root and the `docs/` directory if missing.
    pub fn ensure(&self) -> Result<()> {
        fs::create_dir_all(self.docs_dir())?;
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn docs_dir(&self) -> PathBuf {
        self.root.join("docs")
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.root.join("cache")
    }

    pub fn pending_dir(&self) -> PathBuf {
        self.root.join(".pending")
    }

    pub fn last_update_path(&self) -> PathBuf {
        self.root.join(".last-update")
    }

    pub fn missing_docs_path(&self) -> PathBuf {
        self.root.join(".missing-docs")
    }

    pub fn manifest_cache_path(&self) -> PathBuf {
        self.root.join(".manifest-cache.json")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.root.join(".lock")
    }

    pub fn changelog_path(&self) -> PathBuf {
        self.root.join("CHANGELOG.md")
    }

    // ─── Live Documents ───────────────────────────────────────────────

    pub fn live_path(&self, filename: &str) -> Result<PathBuf> {
        check_filename(filename)?;
        Ok(self.docs_dir().join(filename))
    }

    pub fn has_live(&self, filename: &str) -> bool {
        self.live_path(filename).map(|p| p.is_file()).unwrap_or(false)
    }

    /// Read a Live Document; `Ok(None)` when it does not exist.
    pub fn read_live(&self, filename: &str) -> Result<Option<String>> {
        let path = self.live_path(filename)?;
        match fs::read_to_string(&path) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn write_live(&self, filename: &str, content: &str) -> Result<()> {
        let path = self.live_path(filename)?;
        atomic_write(&path, content.as_bytes())?;
        Ok(())
    }

    pub fn live_count(&self) -> usize {
        walkdir::WalkDir::new(self.docs_dir())
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| !is_temp_file(&e.file_name().to_string_lossy()))
            .count()
    }

    // ─── Bookkeeping files ────────────────────────────────────────────

    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        let raw = fs::read_to_string(self.last_update_path()).ok()?;
        let millis: i64 = raw.trim().parse().ok()?;
        Utc.timestamp_millis_opt(millis).single()
    }

    pub fn set_last_update(&self, at: DateTime<Utc>) -> Result<()> {
        atomic_write(
            &self.last_update_path(),
            at.timestamp_millis().to_string().as_bytes(),
        )?;
        Ok(())
    }

    pub fn missing_docs(&self) -> Vec<String> {
        read_list(&self.missing_docs_path())
    }

    /// Overwrite `.missing-docs` with this run's failures.
    pub fn set_missing_docs(&self, filenames: &[String]) -> Result<()> {
        write_list(&self.missing_docs_path(), filenames)
    }
}

/// Reject filenames that would escape the directory they are joined to.
pub fn check_filename(filename: &str) -> Result<()> {
    let path = Path::new(filename);
    if filename.trim().is_empty() {
        return Err(SyncError::validation("empty filename"));
    }
    let escapes = path.components().any(|c| {
        matches!(
            c,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    });
    if escapes {
        return Err(SyncError::validation(format!(
            "filename escapes the data directory: {}",
            filename
        )));
    }
    if is_temp_file(filename) {
        return Err(SyncError::validation(format!(
            "filename uses the reserved {} suffix: {}",
            TEMP_SUFFIX, filename
        )));
    }
    Ok(())
}

/// Whether `path` names a leftover [`atomic_write`] temp file.
pub fn is_temp_file(path: &str) -> bool {
    path.ends_with(TEMP_SUFFIX)
}

/// Atomic file write (temp file, then rename). Creates parent directories.
///
/// The temp file is `.<name>.docsync-tmp` next to `path`.
pub fn atomic_write(path: &Path, data: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let temp_path = path.with_file_name(temp_name(path));

    fs::write(&temp_path, data)?;
    fs::rename(&temp_path, path)?;
    Ok(())
}

fn temp_name(path: &Path) -> std::ffi::OsString {
    let mut name = std::ffi::OsString::from(".");
    name.push(path.file_name().unwrap_or_default());
    name.push(TEMP_SUFFIX);
    name
}

/// Newline-delimited list file; a missing file is an empty list.
pub fn read_list(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .map(|s| {
            s.lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

pub fn write_list(path: &Path, items: &[String]) -> Result<()> {
    let mut body = items.join("\n");
    if !body.is_empty() {
        body.push('\n');
    }
    atomic_write(path, body.as_bytes())?;
    Ok(())
}

/// Modification time in epoch millis, if the file exists.
pub fn mtime_millis(path: &Path) -> Option<i64> {
    let modified = fs::metadata(path).ok()?.modified().ok()?;
    let millis = modified
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    Some(millis as i64)
}
