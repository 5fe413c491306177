//! Staged update workflow: check → review → commit or discard.
//!
//! ```text
//!            check()                 commit(msg)
//! NoPending ─────────▶ Pending ─────────────────▶ NoPending (Live Documents updated)
//!     ▲                 │  ▲ │
//!     │   discard()     │  └─┘ check() again (last check wins)
//!     └─────────────────┘
//! ```
//!
//! Downloads fan out to a bounded worker pool; every document resolves
//! (success or failure) before classification starts. A failed download is
//! recorded and the run carries on. Only an unusable catalog aborts `check`.
//!
//! Commit is not transactional: a crash between promoting staged files and
//! removing `.pending/` leaves both in place. [`Orchestrator::status`]
//! reports such files as `interrupted_commit`; re-running `commit` or
//! `check` recovers.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::cache::{ContentCache, WarmReport};
use crate::changelog::{self, Changelog};
use crate::config::Config;
use crate::diff;
use crate::error::{Result, SyncError};
use crate::fetcher::{resolve_url, HttpFetcher, RetryPolicy};
use crate::lock::DataLock;
use crate::models::{
    CheckReport, Classification, CommitReport, DiscardOutcome, DocDiff, DocumentSection,
    PendingSummary, ResourceConfiguration, StatusReport, SyncReport,
};
use crate::progress::{NoProgress, ProgressEvent, ProgressReporter};
use crate::resources::{Resolved, ResourceResolver};
use crate::staging::Staging;
use crate::store::DataDir;
use crate::traits::{Fetch, NormalizeNewlines, Transform};

/// One document to download.
#[derive(Debug, Clone)]
struct Target {
    filename: String,
    url: std::result::Result<String, String>,
}

type Downloaded = std::result::Result<String, String>;

pub struct Orchestrator {
    data: DataDir,
    resolver: ResourceResolver,
    fetcher: Arc<dyn Fetch>,
    transform: Arc<dyn Transform>,
    cache: ContentCache,
    changelog: Changelog,
    concurrency: usize,
    default_base_url: String,
    reminder_hours: i64,
    changelog_tail: usize,
    progress: Arc<dyn ProgressReporter>,
}

impl Orchestrator {
    pub fn new(
        config: &Config,
        resolver: ResourceResolver,
        fetcher: Arc<dyn Fetch>,
        transform: Arc<dyn Transform>,
    ) -> Self {
        let data = DataDir::from_config(config);
        Self {
            cache: ContentCache::new(data.clone(), Arc::clone(&transform)),
            changelog: Changelog::new(data.changelog_path()),
            data,
            resolver,
            fetcher,
            transform,
            concurrency: config.fetch.concurrency.max(1),
            default_base_url: config.remote.base_url.clone(),
            reminder_hours: config.status.reminder_hours,
            changelog_tail: config.status.changelog_tail,
            progress: Arc::new(NoProgress),
        }
    }

    /// HTTP fetchers, newline-normalizing transform, settings from `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let manifest_fetcher = HttpFetcher::new(
            RetryPolicy::for_manifest(&config.fetch, &config.manifest),
            &config.fetch.user_agent,
        )?;
        let doc_fetcher = HttpFetcher::new(
            RetryPolicy::for_documents(&config.fetch),
            &config.fetch.user_agent,
        )?;
        let resolver = ResourceResolver::from_config(config, Arc::new(manifest_fetcher));
        Ok(Self::new(
            config,
            resolver,
            Arc::new(doc_fetcher),
            Arc::new(NormalizeNewlines),
        ))
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    pub fn data(&self) -> &DataDir {
        &self.data
    }

    pub fn cache(&self) -> &ContentCache {
        &self.cache
    }

    pub fn changelog(&self) -> &Changelog {
        &self.changelog
    }

    pub async fn catalog(&self) -> Result<Resolved> {
        self.resolver.load().await
    }

    fn staging(&self) -> Staging {
        Staging::new(self.data.pending_dir())
    }

    pub fn has_pending(&self) -> bool {
        self.staging().exists()
    }

    /// Absolute source URL of a catalog document.
    pub fn source_url(&self, catalog: &ResourceConfiguration, url: &str) -> String {
        let base = catalog.base_url.as_deref().unwrap_or(&self.default_base_url);
        resolve_url(base, url).unwrap_or_else(|_| url.to_string())
    }

    fn targets<'a, I>(&self, catalog: &ResourceConfiguration, docs: I) -> Vec<Target>
    where
        I: IntoIterator<Item = &'a DocumentSection>,
    {
        let base = catalog.base_url.as_deref().unwrap_or(&self.default_base_url);
        docs.into_iter()
            .map(|doc| Target {
                filename: doc.filename.clone(),
                url: resolve_url(base, &doc.url).map_err(|e| e.to_string()),
            })
            .collect()
    }

    /// Fetch every target through the worker pool. Results come back in
    /// target order; a panicked task counts as that document's failure.
    async fn download_all(&self, operation: &str, targets: &[Target]) -> Vec<Downloaded> {
        let total = targets.len();
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut set = JoinSet::new();

        for (idx, target) in targets.iter().enumerate() {
            let url = match &target.url {
                Ok(u) => u.clone(),
                Err(_) => continue,
            };
            let fetcher = Arc::clone(&self.fetcher);
            let semaphore = Arc::clone(&semaphore);
            set.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                let result = fetcher.fetch_text(&url).await.map_err(|e| e.to_string());
                (idx, result)
            });
        }

        let mut results: Vec<Option<Downloaded>> = targets
            .iter()
            .map(|t| t.url.as_ref().err().map(|e| Err(e.clone())))
            .collect();
        let mut done = results.iter().filter(|r| r.is_some()).count();

        while let Some(joined) = set.join_next().await {
            done += 1;
            match joined {
                Ok((idx, result)) => {
                    self.progress.report(ProgressEvent::Fetched {
                        operation: operation.to_string(),
                        filename: targets[idx].filename.clone(),
                        ok: result.is_ok(),
                        n: done,
                        total,
                    });
                    results[idx] = Some(result);
                }
                Err(e) => warn!(error = %e, "download task aborted"),
            }
        }

        results
            .into_iter()
            .map(|r| r.unwrap_or_else(|| Err("download task aborted".to_string())))
            .collect()
    }

    // ═══════════════════════════════════════════════════════════════════
    // check
    // ═══════════════════════════════════════════════════════════════════

    /// Download every catalog document into a fresh staging area and
    /// classify it against the Live Documents.
    pub async fn check(&self) -> Result<CheckReport> {
        let _lock = DataLock::acquire(&self.data)?;
        self.data.ensure()?;

        self.progress.report(ProgressEvent::Resolving {
            operation: "check".to_string(),
        });
        let resolved = self.resolver.load().await?;

        let staging = self.staging();
        if staging.exists() {
            info!("replacing previous pending update");
        }
        staging.reset()?;

        let targets = self.targets(&resolved.catalog, resolved.catalog.documents());
        let downloads = self.download_all("check", &targets).await;

        let mut classification = Classification::default();
        let mut diffs = Vec::new();

        for (target, downloaded) in targets.iter().zip(downloads) {
            let filename = &target.filename;
            let raw = match downloaded {
                Ok(raw) => raw,
                Err(e) => {
                    warn!(filename = %filename, error = %e, "download failed");
                    classification.failed.push(filename.clone());
                    continue;
                }
            };

            let content = self.transform.apply(&raw);
            staging.write_download(filename, &content)?;

            match self.data.read_live(filename)? {
                None => classification.new.push(filename.clone()),
                Some(live) if diff::compare(&live, &content) => {
                    let d = diff::diff(filename, &live, &content, diff::DEFAULT_CONTEXT_LINES);
                    staging.write_diff(&d)?;
                    classification.changed.push(filename.clone());
                    diffs.push(d);
                }
                Some(_) => {
                    staging.remove_download(filename)?;
                    classification.unchanged.push(filename.clone());
                }
            }
        }

        let timestamp = Utc::now();
        staging.write_classification(&classification)?;
        staging.write_summary(&render_summary(timestamp, &classification, &diffs))?;
        staging.write_timestamp(timestamp)?;
        self.data.set_missing_docs(&classification.failed)?;

        info!(
            new = classification.new.len(),
            changed = classification.changed.len(),
            unchanged = classification.unchanged.len(),
            failed = classification.failed.len(),
            "check complete"
        );

        Ok(CheckReport {
            timestamp,
            catalog_source: resolved.source,
            classification,
            diffs,
        })
    }

    // ═══════════════════════════════════════════════════════════════════
    // commit / discard
    // ═══════════════════════════════════════════════════════════════════

    /// Promote the staged documents, record `message` in the changelog,
    /// invalidate the whole content cache and clear the staging area.
    pub fn commit(&self, message: &str) -> Result<CommitReport> {
        let _lock = DataLock::acquire(&self.data)?;
        let staging = self.staging();
        if !staging.exists() {
            return Err(SyncError::State(
                "no pending update to commit; run `docsync check` first".to_string(),
            ));
        }
        changelog::validate(message)?;
        // An unreadable ledger must stop the commit before anything is promoted.
        self.changelog.read_existing()?;

        let classification = staging.read_classification();
        let staged = staging.staged_files()?;

        for filename in &staged {
            let content = staging.read_download(filename)?;
            self.data.write_live(filename, &content)?;
        }

        let now = Utc::now();
        let entry = self
            .changelog
            .append(message, &classification.affected(), now)?;
        let cache_entries_cleared = self.cache.clear()?;
        staging.remove()?;
        self.data.set_last_update(now)?;

        info!(applied = staged.len(), cache_entries_cleared, "commit complete");
        Ok(CommitReport {
            applied: staged,
            entry,
            cache_entries_cleared,
        })
    }

    pub fn discard(&self) -> Result<DiscardOutcome> {
        let _lock = DataLock::acquire(&self.data)?;
        if self.staging().remove()? {
            info!("pending update discarded");
            Ok(DiscardOutcome::Discarded)
        } else {
            Ok(DiscardOutcome::NothingToDiscard)
        }
    }

    // ═══════════════════════════════════════════════════════════════════
    // read-only views
    // ═══════════════════════════════════════════════════════════════════

    pub fn pending_diffs(&self) -> Result<Vec<DocDiff>> {
        let staging = self.require_pending()?;
        staging.diffs()
    }

    pub fn pending_diff(&self, filename: &str) -> Result<DocDiff> {
        let staging = self.require_pending()?;
        staging.read_diff(filename)
    }

    pub fn pending_summary_text(&self) -> Option<String> {
        self.staging().summary()
    }

    fn require_pending(&self) -> Result<Staging> {
        let staging = self.staging();
        if staging.exists() {
            Ok(staging)
        } else {
            Err(SyncError::State("no pending update".to_string()))
        }
    }

    pub fn status(&self) -> Result<StatusReport> {
        let now = Utc::now();
        let last_update = self.data.last_update();
        let age = last_update.map(|t| now - t);
        let reminder = age
            .map(|a| a > chrono::Duration::hours(self.reminder_hours))
            .unwrap_or(false);

        let staging = self.staging();
        let pending = if staging.exists() {
            let mut interrupted_commit = Vec::new();
            for filename in staging.staged_files()? {
                let staged = staging.read_download(&filename)?;
                if let Some(live) = self.data.read_live(&filename)? {
                    if live == staged {
                        interrupted_commit.push(filename);
                    }
                }
            }
            Some(PendingSummary {
                timestamp: staging.timestamp(),
                classification: staging.read_classification(),
                interrupted_commit,
            })
        } else {
            None
        };

        Ok(StatusReport {
            last_update,
            age_hours: age.map(|a| a.num_hours()),
            reminder,
            pending,
            recent_changes: self.changelog.recent(self.changelog_tail),
            missing_docs: self.data.missing_docs(),
            live_documents: self.data.live_count(),
        })
    }

    /// Pre-generate cache entries for every catalog document with a Live
    /// Document.
    pub async fn warm_cache(&self) -> Result<WarmReport> {
        let resolved = self.resolver.load().await?;
        let catalog = &resolved.catalog;
        let pairs: Vec<(String, String)> = catalog
            .documents()
            .filter(|d| self.data.has_live(&d.filename))
            .map(|d| (d.filename.clone(), self.source_url(catalog, &d.url)))
            .collect();
        Ok(self
            .cache
            .warm(pairs.iter().map(|(f, u)| (f.as_str(), u.as_str()))))
    }

    // ═══════════════════════════════════════════════════════════════════
    // initial sync
    // ═══════════════════════════════════════════════════════════════════

    /// Download every catalog document that has no Live Document yet and
    /// write it directly. Existing documents are left to check/commit.
    pub async fn sync(&self) -> Result<SyncReport> {
        let _lock = DataLock::acquire(&self.data)?;
        self.data.ensure()?;

        self.progress.report(ProgressEvent::Resolving {
            operation: "sync".to_string(),
        });
        let resolved = self.resolver.load().await?;
        let catalog = &resolved.catalog;

        let missing: Vec<_> = catalog
            .documents()
            .filter(|d| !self.data.has_live(&d.filename))
            .collect();
        let skipped_existing = catalog.doc_count() - missing.len();

        let targets = self.targets(catalog, missing.iter().copied());
        let downloads = self.download_all("sync", &targets).await;

        let mut downloaded = Vec::new();
        let mut failed = Vec::new();
        for (target, result) in targets.iter().zip(downloads) {
            match result {
                Ok(raw) => {
                    self.data
                        .write_live(&target.filename, &self.transform.apply(&raw))?;
                    downloaded.push(target.filename.clone());
                }
                Err(e) => {
                    warn!(filename = %target.filename, error = %e, "download failed");
                    failed.push(target.filename.clone());
                }
            }
        }

        self.data.set_missing_docs(&failed)?;
        if !downloaded.is_empty() {
            self.data.set_last_update(Utc::now())?;
        }

        let warm_list: Vec<(String, String)> = missing
            .iter()
            .filter(|d| downloaded.contains(&d.filename))
            .map(|d| (d.filename.clone(), self.source_url(catalog, &d.url)))
            .collect();
        let warmed = self
            .cache
            .warm(warm_list.iter().map(|(f, u)| (f.as_str(), u.as_str())));

        info!(
            downloaded = downloaded.len(),
            failed = failed.len(),
            skipped_existing,
            warmed = warmed.warmed,
            "sync complete"
        );

        Ok(SyncReport {
            catalog_source: resolved.source,
            downloaded,
            skipped_existing,
            failed,
        })
    }
}

/// Human-readable summary persisted as `.pending/summary.txt`.
pub fn render_summary(
    timestamp: DateTime<Utc>,
    classification: &Classification,
    diffs: &[DocDiff],
) -> String {
    let mut out = format!(
        "Update check at {}\n  new:       {}\n  changed:   {}\n  unchanged: {}\n  failed:    {}\n",
        timestamp.format("%Y-%m-%dT%H:%M:%SZ"),
        classification.new.len(),
        classification.changed.len(),
        classification.unchanged.len(),
        classification.failed.len(),
    );

    if !classification.new.is_empty() {
        out.push_str("\nNew:\n");
        for f in &classification.new {
            out.push_str(&format!("  - {}\n", f));
        }
    }
    if !diffs.is_empty() {
        out.push_str("\nChanged:\n");
        for d in diffs {
            out.push_str(&format!("  - {} (+{} -{})\n", d.filename, d.added, d.removed));
        }
    }
    if !classification.failed.is_empty() {
        out.push_str("\nFailed:\n");
        for f in &classification.failed {
            out.push_str(&format!("  - {}\n", f));
        }
    }
    out
}
