//! The `.pending/` staging area of a checked-but-undecided update.
//!
//! ```text
//! .pending/
//!   downloads/<filename>       candidates a commit would write
//!   diffs/<filename>.diff      unified diffs of changed documents
//!   new.list changed.list unchanged.list failed.list
//!   summary.txt
//!   timestamp                  epoch millis of the check
//! ```
//!
//! The directory's existence is what marks an update as pending.

use chrono::{DateTime, TimeZone, Utc};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{Result, SyncError};
use crate::models::{Classification, DocDiff};
use crate::store::{atomic_write, check_filename, is_temp_file, read_list, write_list};

const DIFF_EXT: &str = ".diff";

pub struct Staging {
    root: PathBuf,
}

impl Staging {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn exists(&self) -> bool {
        self.root.is_dir()
    }

    fn downloads_dir(&self) -> PathBuf {
        self.root.join("downloads")
    }

    fn diffs_dir(&self) -> PathBuf {
        self.root.join("diffs")
    }

    fn list_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{}.list", name))
    }

    fn download_path(&self, filename: &str) -> Result<PathBuf> {
        check_filename(filename)?;
        Ok(self.downloads_dir().join(filename))
    }

    fn diff_path(&self, filename: &str) -> Result<PathBuf> {
        check_filename(filename)?;
        Ok(self.diffs_dir().join(format!("{}{}", filename, DIFF_EXT)))
    }

    /// Drop any previous staging area and create an empty one.
    pub fn reset(&self) -> Result<()> {
        self.remove()?;
        fs::create_dir_all(self.downloads_dir())?;
        fs::create_dir_all(self.diffs_dir())?;
        Ok(())
    }

    /// Delete the staging area. Returns whether anything was removed.
    pub fn remove(&self) -> Result<bool> {
        match fs::remove_dir_all(&self.root) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    // ─── Downloads ────────────────────────────────────────────────────

    pub fn write_download(&self, filename: &str, content: &str) -> Result<()> {
        atomic_write(&self.download_path(filename)?, content.as_bytes())?;
        Ok(())
    }

    pub fn read_download(&self, filename: &str) -> Result<String> {
        Ok(fs::read_to_string(self.download_path(filename)?)?)
    }

    pub fn remove_download(&self, filename: &str) -> Result<()> {
        let path = self.download_path(filename)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Filenames currently staged, sorted.
    pub fn staged_files(&self) -> Result<Vec<String>> {
        relative_files(&self.downloads_dir(), "")
    }

    // ─── Diffs ────────────────────────────────────────────────────────

    pub fn write_diff(&self, diff: &DocDiff) -> Result<()> {
        atomic_write(&self.diff_path(&diff.filename)?, diff.text.as_bytes())?;
        Ok(())
    }

    pub fn read_diff(&self, filename: &str) -> Result<DocDiff> {
        let path = self.diff_path(filename)?;
        let text = match fs::read_to_string(&path) {
            Ok(t) => t,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(SyncError::not_found(format!("no pending diff for {}", filename)))
            }
            Err(e) => return Err(e.into()),
        };
        let (added, removed) = count_changes(&text);
        Ok(DocDiff {
            filename: filename.to_string(),
            added,
            removed,
            text,
        })
    }

    pub fn diffs(&self) -> Result<Vec<DocDiff>> {
        relative_files(&self.diffs_dir(), DIFF_EXT)?
            .iter()
            .map(|f| self.read_diff(f))
            .collect()
    }

    // ─── Classification & bookkeeping ─────────────────────────────────

    pub fn write_classification(&self, c: &Classification) -> Result<()> {
        write_list(&self.list_path("new"), &c.new)?;
        write_list(&self.list_path("changed"), &c.changed)?;
        write_list(&self.list_path("unchanged"), &c.unchanged)?;
        write_list(&self.list_path("failed"), &c.failed)?;
        Ok(())
    }

    pub fn read_classification(&self) -> Classification {
        Classification {
            new: read_list(&self.list_path("new")),
            changed: read_list(&self.list_path("changed")),
            unchanged: read_list(&self.list_path("unchanged")),
            failed: read_list(&self.list_path("failed")),
        }
    }

    pub fn write_summary(&self, summary: &str) -> Result<()> {
        atomic_write(&self.root.join("summary.txt"), summary.as_bytes())?;
        Ok(())
    }

    pub fn summary(&self) -> Option<String> {
        fs::read_to_string(self.root.join("summary.txt")).ok()
    }

    pub fn write_timestamp(&self, at: DateTime<Utc>) -> Result<()> {
        atomic_write(
            &self.root.join("timestamp"),
            at.timestamp_millis().to_string().as_bytes(),
        )?;
        Ok(())
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        let raw = fs::read_to_string(self.root.join("timestamp")).ok()?;
        Utc.timestamp_millis_opt(raw.trim().parse().ok()?).single()
    }
}

/// Files under `dir` as `/`-separated relative paths with `strip_ext`
/// removed, sorted. A missing directory yields an empty list.
fn relative_files(dir: &Path, strip_ext: &str) -> Result<Vec<String>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(dir) {
        let entry = entry.map_err(io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry.path().strip_prefix(dir).unwrap_or(entry.path());
        let rel = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        if is_temp_file(&rel) {
            continue;
        }
        files.push(rel.strip_suffix(strip_ext).unwrap_or(&rel).to_string());
    }
    files.sort();
    Ok(files)
}

/// Added/removed line counts of a unified diff; file headers are skipped.
fn count_changes(text: &str) -> (usize, usize) {
    let mut added = 0;
    let mut removed = 0;
    let mut in_hunk = false;
    for line in text.lines() {
        if line.starts_with("@@") {
            in_hunk = true;
        } else if !in_hunk {
            continue;
        } else if line.starts_with('+') {
            added += 1;
        } else if line.starts_with('-') {
            removed += 1;
        }
    }
    (added, removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff;
    use tempfile::TempDir;

    #[test]
    fn reset_replaces_previous_staging() {
        let tmp = TempDir::new().unwrap();
        let staging = Staging::new(tmp.path().join(".pending"));
        assert!(!staging.exists());

        staging.reset().unwrap();
        staging.write_download("old.md", "x").unwrap();
        staging.reset().unwrap();
        assert!(staging.exists());
        assert!(staging.staged_files().unwrap().is_empty());

        assert!(staging.remove().unwrap());
        assert!(!staging.remove().unwrap());
    }

    #[test]
    fn staged_files_are_relative_and_sorted() {
        let tmp = TempDir::new().unwrap();
        let staging = Staging::new(tmp.path().join(".pending"));
        staging.reset().unwrap();
        staging.write_download("b.md", "b").unwrap();
        staging.write_download("guides/a.md", "a").unwrap();
        assert_eq!(staging.staged_files().unwrap(), vec!["b.md", "guides/a.md"]);
    }

    #[test]
    fn tmp_named_documents_are_staged_and_leftover_temp_files_are_not() {
        let tmp = TempDir::new().unwrap();
        let staging = Staging::new(tmp.path().join(".pending"));
        staging.reset().unwrap();
        staging.write_download("notes.tmp", "n").unwrap();
        fs::write(
            tmp.path().join(".pending/downloads/.a.md.docsync-tmp"),
            "half written",
        )
        .unwrap();
        assert_eq!(staging.staged_files().unwrap(), vec!["notes.tmp"]);
    }

    #[test]
    fn diff_roundtrip_keeps_counts() {
        let tmp = TempDir::new().unwrap();
        let staging = Staging::new(tmp.path().join(".pending"));
        staging.reset().unwrap();

        let d = diff::diff("a.md", "--- not a header\nkeep\n", "keep\nnew\n", 3);
        staging.write_diff(&d).unwrap();
        let read = staging.read_diff("a.md").unwrap();
        assert_eq!((read.added, read.removed), (d.added, d.removed));
        assert_eq!(staging.diffs().unwrap().len(), 1);
        assert!(matches!(
            staging.read_diff("other.md"),
            Err(SyncError::NotFound(_))
        ));
    }

    #[test]
    fn classification_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let staging = Staging::new(tmp.path().join(".pending"));
        staging.reset().unwrap();
        let c = Classification {
            new: vec!["n.md".to_string()],
            changed: vec![],
            unchanged: vec!["u1.md".to_string(), "u2.md".to_string()],
            failed: vec!["f.md".to_string()],
        };
        staging.write_classification(&c).unwrap();
        assert_eq!(staging.read_classification(), c);
    }
}
