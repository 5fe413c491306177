//! The `CHANGELOG.md` ledger.
//!
//! Entries are prepended under a fixed header, so the newest entry is always
//! first. Existing entries are never rewritten.
//!
//! ```text
//! # Documentation Changelog
//!
//! ## 2026-10-18T09:12:44Z
//!
//! Updated hook docs for the new matcher syntax
//!
//! Files:
//! - hooks.md
//! ```

use chrono::{DateTime, SecondsFormat, Utc};
use std::fs;
use std::io;
use std::path::PathBuf;

use crate::error::{Result, SyncError};
use crate::models::ChangelogEntry;
use crate::store::atomic_write;

const HEADER: &str = "# Documentation Changelog\n\n";
const ENTRY_MARKER: &str = "## ";
const FILES_MARKER: &str = "Files:";
const ESCAPE_INDENT: &str = "  ";
const MIN_LEN: usize = 10;
const MAX_LEN: usize = 1000;

/// Single words too vague to describe a change.
const VAGUE_MESSAGES: &[&str] = &[
    "update", "updates", "fix", "fixes", "change", "changes", "misc", "wip", "stuff", "tweak",
    "minor",
];

/// Reject empty, too short, too long, or vague messages.
pub fn validate(message: &str) -> Result<()> {
    let trimmed = message.trim();
    let len = trimmed.chars().count();

    if trimmed.is_empty() {
        return Err(SyncError::InvalidMessage(
            "message must not be empty".to_string(),
        ));
    }
    let lower = trimmed.to_lowercase();
    if VAGUE_MESSAGES.contains(&lower.as_str()) {
        return Err(SyncError::InvalidMessage(format!(
            "'{}' is too vague; describe what changed",
            trimmed
        )));
    }
    if len < MIN_LEN {
        return Err(SyncError::InvalidMessage(format!(
            "message must be at least {} characters (got {})",
            MIN_LEN, len
        )));
    }
    if len > MAX_LEN {
        return Err(SyncError::InvalidMessage(format!(
            "message must be at most {} characters (got {})",
            MAX_LEN, len
        )));
    }
    Ok(())
}

pub struct Changelog {
    path: PathBuf,
}

impl Changelog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Validate `message` and prepend a dated entry listing `files`.
    pub fn append(
        &self,
        message: &str,
        files: &[String],
        at: DateTime<Utc>,
    ) -> Result<ChangelogEntry> {
        validate(message)?;
        let entry = ChangelogEntry {
            timestamp: at.to_rfc3339_opts(SecondsFormat::Secs, true),
            message: message.trim().to_string(),
            affected_files: files.to_vec(),
        };

        let existing = self.read_existing()?;
        let body = existing.strip_prefix(HEADER).unwrap_or(&existing);

        let mut out = String::with_capacity(existing.len() + 256);
        out.push_str(HEADER);
        out.push_str(&format_entry(&entry));
        out.push_str(body);

        atomic_write(&self.path, out.as_bytes())?;
        Ok(entry)
    }

    /// Current ledger text. Only a missing file counts as an empty ledger;
    /// unreadable or non-UTF-8 content is an error so it is never overwritten.
    pub fn read_existing(&self) -> Result<String> {
        match fs::read_to_string(&self.path) {
            Ok(s) => Ok(s),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Parse the newest `limit` entries.
    pub fn recent(&self, limit: usize) -> Vec<ChangelogEntry> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(s) => s,
            Err(_) => return Vec::new(),
        };
        parse_entries(&raw).into_iter().take(limit).collect()
    }

    pub fn entry_count(&self) -> usize {
        self.recent(usize::MAX).len()
    }
}

/// Lines the parser reads as entry structure rather than message text.
fn is_structural(line: &str) -> bool {
    line.starts_with(ENTRY_MARKER) || line == FILES_MARKER
}

/// Indent message lines that would otherwise read as structure. Lines that
/// are already indented structure get one more level, so the mapping
/// reverses exactly.
fn escape_message(message: &str) -> String {
    message
        .lines()
        .map(|line| {
            if is_structural(line.trim_start()) {
                format!("{}{}", ESCAPE_INDENT, line)
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn unescape_line(line: &str) -> &str {
    match line.strip_prefix(ESCAPE_INDENT) {
        Some(rest) if is_structural(rest.trim_start()) => rest,
        _ => line,
    }
}

fn format_entry(entry: &ChangelogEntry) -> String {
    let mut s = format!(
        "{}{}\n\n{}\n\n",
        ENTRY_MARKER,
        entry.timestamp,
        escape_message(&entry.message)
    );
    if !entry.affected_files.is_empty() {
        s.push_str(FILES_MARKER);
        s.push('\n');
        for f in &entry.affected_files {
            s.push_str(&format!("- {}\n", f));
        }
        s.push('\n');
    }
    s
}

#[derive(Default)]
struct Draft {
    timestamp: String,
    message: Vec<String>,
    files: Vec<String>,
    in_files: bool,
}

impl Draft {
    fn finish(self) -> ChangelogEntry {
        ChangelogEntry {
            timestamp: self.timestamp,
            message: self.message.join("\n").trim().to_string(),
            affected_files: self.files,
        }
    }
}

fn parse_entries(raw: &str) -> Vec<ChangelogEntry> {
    let mut entries = Vec::new();
    let mut current: Option<Draft> = None;

    for line in raw.lines() {
        if let Some(ts) = line.strip_prefix(ENTRY_MARKER) {
            entries.extend(current.take().map(Draft::finish));
            current = Some(Draft {
                timestamp: ts.trim().to_string(),
                ..Draft::default()
            });
            continue;
        }
        let Some(draft) = current.as_mut() else {
            continue;
        };
        if line == FILES_MARKER {
            draft.in_files = true;
        } else if draft.in_files {
            if let Some(f) = line.strip_prefix("- ") {
                draft.files.push(f.to_string());
            }
        } else {
            draft.message.push(unescape_line(line).to_string());
        }
    }
    entries.extend(current.map(Draft::finish));
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    #[test]
    fn vague_and_out_of_range_messages_rejected() {
        for bad in ["fix", "update", "", "   ", "Update", "FIXES", "too short"] {
            assert!(
                matches!(validate(bad), Err(SyncError::InvalidMessage(_))),
                "expected rejection for {:?}",
                bad
            );
        }
        assert!(validate(&"x".repeat(1001)).is_err());
        assert!(validate(&"x".repeat(1000)).is_ok());
    }

    #[test]
    fn descriptive_message_accepted() {
        assert!(validate("Updated MCP server list with new integrations").is_ok());
    }

    #[test]
    fn append_prepends_newest_first() {
        let tmp = TempDir::new().unwrap();
        let log = Changelog::new(tmp.path().join("CHANGELOG.md"));

        let t1 = Utc.with_ymd_and_hms(2026, 1, 1, 10, 0, 0).unwrap();
        let t2 = Utc.with_ymd_and_hms(2026, 1, 2, 10, 0, 0).unwrap();
        log.append("Initial import of the docs", &["a.md".to_string()], t1)
            .unwrap();
        log.append(
            "Refreshed hooks reference",
            &["hooks.md".to_string(), "b.md".to_string()],
            t2,
        )
        .unwrap();

        let raw = fs::read_to_string(tmp.path().join("CHANGELOG.md")).unwrap();
        assert!(raw.starts_with("# Documentation Changelog\n"));
        assert_eq!(raw.matches("\n## ").count(), 2);

        let entries = log.recent(10);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].timestamp, "2026-01-02T10:00:00Z");
        assert_eq!(entries[0].message, "Refreshed hooks reference");
        assert_eq!(entries[0].affected_files, vec!["hooks.md", "b.md"]);
        assert_eq!(entries[1].message, "Initial import of the docs");
        assert_eq!(log.recent(1).len(), 1);
    }

    #[test]
    fn message_lines_that_look_like_structure_stay_in_one_entry() {
        let tmp = TempDir::new().unwrap();
        let log = Changelog::new(tmp.path().join("CHANGELOG.md"));
        let t1 = Utc.with_ymd_and_hms(2026, 1, 1, 10, 0, 0).unwrap();
        let t2 = Utc.with_ymd_and_hms(2026, 1, 2, 10, 0, 0).unwrap();

        log.append("Initial import of the docs", &["a.md".to_string()], t1)
            .unwrap();
        let message = "Refresh hooks docs\n## Details\nFiles:\n  ## already indented\nnew matchers";
        log.append(message, &["hooks.md".to_string()], t2).unwrap();

        let entries = log.recent(10);
        assert_eq!(entries.len(), 2);
        assert_eq!(log.entry_count(), 2);
        assert_eq!(entries[0].message, message);
        assert_eq!(entries[0].affected_files, vec!["hooks.md"]);
        assert_eq!(entries[1].message, "Initial import of the docs");
        assert_eq!(entries[1].affected_files, vec!["a.md"]);
    }

    #[test]
    fn unreadable_ledger_is_not_overwritten() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("CHANGELOG.md");
        let mut original = b"# Documentation Changelog\n\n## 2026-01-01T10:00:00Z\n\nOld entry kept here\n\n".to_vec();
        original.extend_from_slice(&[0xff, 0xfe]);
        fs::write(&path, &original).unwrap();

        let log = Changelog::new(&path);
        assert!(matches!(log.read_existing(), Err(SyncError::Io(_))));
        assert!(matches!(
            log.append("A brand new descriptive entry", &[], Utc::now()),
            Err(SyncError::Io(_))
        ));
        assert_eq!(fs::read(&path).unwrap(), original);
    }

    #[test]
    fn append_rejects_invalid_without_creating_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("CHANGELOG.md");
        let log = Changelog::new(&path);
        assert!(log.append("fix", &[], Utc::now()).is_err());
        assert!(!path.exists());
    }
}
