//! Core data models shared by the resolver, the orchestrator and the readers.
//!
//! Catalog types deserialize straight from the manifest JSON. Report types
//! are what the core hands back to the CLI for rendering; they serialize for
//! `--json` output.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One remote document. `filename` is the stable local key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSection {
    pub title: String,
    pub url: String,
    pub filename: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    pub slug: String,
    pub description: String,
    pub docs: Vec<DocumentSection>,
}

/// The catalog: every document available to sync, grouped by category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceConfiguration {
    /// Base for relative document URLs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    pub categories: Vec<Category>,
}

impl ResourceConfiguration {
    /// All documents in category order.
    pub fn documents(&self) -> impl Iterator<Item = &DocumentSection> {
        self.categories.iter().flat_map(|c| c.docs.iter())
    }

    /// Look up a document by filename, with or without the `.md` suffix.
    pub fn find(&self, filename: &str) -> Option<(&Category, &DocumentSection)> {
        let with_ext = format!("{}.md", filename);
        self.categories.iter().find_map(|cat| {
            cat.docs
                .iter()
                .find(|d| d.filename == filename || d.filename == with_ext)
                .map(|d| (cat, d))
        })
    }

    pub fn doc_count(&self) -> usize {
        self.categories.iter().map(|c| c.docs.len()).sum()
    }
}

/// Which tier of the fallback chain produced a catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogSource {
    Cache,
    Remote,
    Bundled,
}

impl std::fmt::Display for CatalogSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CatalogSource::Cache => "cache",
            CatalogSource::Remote => "remote",
            CatalogSource::Bundled => "bundled",
        };
        write!(f, "{}", s)
    }
}

/// One dated entry of `CHANGELOG.md`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangelogEntry {
    pub timestamp: String, // ISO8601
    pub message: String,
    pub affected_files: Vec<String>,
}

/// How `check` classified the catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub new: Vec<String>,
    pub changed: Vec<String>,
    pub unchanged: Vec<String>,
    pub failed: Vec<String>,
}

impl Classification {
    /// `new ∪ changed`, sorted: the files a commit writes.
    pub fn affected(&self) -> Vec<String> {
        let mut files: Vec<String> = self.new.iter().chain(&self.changed).cloned().collect();
        files.sort();
        files.dedup();
        files
    }

    pub fn has_changes(&self) -> bool {
        !self.new.is_empty() || !self.changed.is_empty()
    }
}

/// Diff of one changed document as persisted under `.pending/diffs/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocDiff {
    pub filename: String,
    pub added: usize,
    pub removed: usize,
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub timestamp: DateTime<Utc>,
    pub catalog_source: CatalogSource,
    pub classification: Classification,
    pub diffs: Vec<DocDiff>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommitReport {
    pub applied: Vec<String>,
    pub entry: ChangelogEntry,
    pub cache_entries_cleared: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscardOutcome {
    Discarded,
    NothingToDiscard,
}

/// Result of the initial download of documents with no Live Document yet.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub catalog_source: CatalogSource,
    pub downloaded: Vec<String>,
    pub skipped_existing: usize,
    pub failed: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PendingSummary {
    pub timestamp: Option<DateTime<Utc>>,
    pub classification: Classification,
    /// Staged files whose content already equals the Live Document: the
    /// trace of a commit interrupted between promotion and cleanup.
    pub interrupted_commit: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub last_update: Option<DateTime<Utc>>,
    pub age_hours: Option<i64>,
    pub reminder: bool,
    pub pending: Option<PendingSummary>,
    pub recent_changes: Vec<ChangelogEntry>,
    pub missing_docs: Vec<String>,
    pub live_documents: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub file_count: usize,
    pub total_bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(filename: &str) -> DocumentSection {
        DocumentSection {
            title: filename.to_string(),
            url: format!("https://example.org/{}", filename),
            filename: filename.to_string(),
            description: "d".to_string(),
        }
    }

    #[test]
    fn find_accepts_name_without_extension() {
        let catalog = ResourceConfiguration {
            base_url: None,
            categories: vec![Category {
                name: "Guides".to_string(),
                slug: "guides".to_string(),
                description: "g".to_string(),
                docs: vec![doc("setup.md"), doc("hooks.md")],
            }],
        };
        let (cat, found) = catalog.find("hooks").unwrap();
        assert_eq!(found.filename, "hooks.md");
        assert_eq!(cat.slug, "guides");
        assert!(catalog.find("setup.md").is_some());
        assert!(catalog.find("missing").is_none());
        assert_eq!(catalog.doc_count(), 2);
    }

    #[test]
    fn affected_is_sorted_union() {
        let c = Classification {
            new: vec!["b.md".to_string()],
            changed: vec!["a.md".to_string()],
            unchanged: vec!["c.md".to_string()],
            failed: vec![],
        };
        assert_eq!(c.affected(), vec!["a.md", "b.md"]);
        assert!(c.has_changes());
        assert!(!Classification::default().has_changes());
    }
}
