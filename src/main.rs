//! # docsync CLI
//!
//! The `docsync` binary keeps a local documentation mirror in sync with its
//! upstream catalog. Updates are staged and reviewed before they replace the
//! local copies.
//!
//! ## Usage
//!
//! ```bash
//! docsync [--config ./docsync.toml] <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docsync list` | Show the catalog and which documents are synced |
//! | `docsync sync` | Download documents that have no local copy yet |
//! | `docsync check` | Stage upstream documents and classify changes |
//! | `docsync diff [file]` | Show the staged diffs |
//! | `docsync commit "<msg>"` | Apply the staged update and log it |
//! | `docsync discard` | Drop the staged update |
//! | `docsync status` | Age, pending update, recent changes |
//! | `docsync get <file>` | Print one document |
//! | `docsync search "<query>"` | Line-level search across documents |
//! | `docsync cache stats\|clear\|warm` | Inspect or manage the content cache |
//!
//! Logging goes to stderr and is controlled by `DOCSYNC_LOG`
//! (e.g. `DOCSYNC_LOG=docsync=debug`).

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use docsync::config::{self, Config};
use docsync::models::{CatalogSource, DiscardOutcome};
use docsync::progress::ProgressMode;
use docsync::update::{render_summary, Orchestrator};
use docsync::{get, search, stats};

/// docsync: review-before-apply mirror of a remote documentation catalog.
///
/// Settings are read from `--config` or, when absent, from
/// `<config dir>/docsync/docsync.toml` if it exists.
#[derive(Parser)]
#[command(
    name = "docsync",
    about = "docsync: keep a local documentation mirror in sync, with review before apply",
    version
)]
struct Cli {
    /// Path to configuration file (TOML). Must exist when given.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override `[storage] data_dir`.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Download progress on stderr: `off`, `human` or `json`.
    /// Defaults to `human` when stderr is a terminal.
    #[arg(long, global = true)]
    progress: Option<ProgressMode>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List catalog documents by category.
    List {
        #[arg(long)]
        json: bool,
    },

    /// Download every catalog document that has no local copy yet.
    ///
    /// Existing documents are never touched; use `check` and `commit` to
    /// update them.
    Sync,

    /// Download the catalog into the staging area and classify every
    /// document as new, changed, unchanged or failed.
    ///
    /// Replaces any previous pending update.
    Check {
        #[arg(long)]
        json: bool,
    },

    /// Show the unified diffs of the pending update.
    Diff {
        /// Only this document.
        filename: Option<String>,
    },

    /// Apply the pending update and record it in CHANGELOG.md.
    Commit {
        /// Describe what changed (10 to 1000 characters).
        message: String,
    },

    /// Drop the pending update without touching local documents.
    Discard,

    /// Show update age, pending changes and recent changelog entries.
    Status {
        #[arg(long)]
        json: bool,
    },

    /// Print one document (filename with or without `.md`).
    Get {
        filename: String,

        /// Print only the content.
        #[arg(long)]
        raw: bool,
    },

    /// Case-insensitive line search across synced documents.
    Search {
        query: String,

        /// Maximum number of matching lines.
        #[arg(long, default_value_t = 50)]
        limit: usize,

        #[arg(long)]
        json: bool,
    },

    /// Inspect or manage the content cache.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Entry count and total size.
    Stats {
        #[arg(long)]
        json: bool,
    },
    /// Delete every cache entry.
    Clear,
    /// Pre-generate entries for all synced documents.
    Warm,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("DOCSYNC_LOG")
        .unwrap_or_else(|_| EnvFilter::new("docsync=warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load(cli: &Cli) -> anyhow::Result<Config> {
    let mut cfg = match &cli.config {
        Some(path) => config::load_config(path, true)?,
        None => config::load_config(&config::default_config_path(), false)?,
    };
    if let Some(dir) = &cli.data_dir {
        cfg.storage.data_dir = dir.clone();
    }
    Ok(cfg)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let cfg = load(&cli)?;
    let mode = cli.progress.unwrap_or_else(ProgressMode::default_for_tty);
    let orch = Orchestrator::from_config(&cfg)
        .context("Failed to initialize HTTP client")?
        .with_progress(mode.reporter());

    match cli.command {
        Commands::List { json } => run_list(&orch, json).await?,
        Commands::Sync => {
            let report = orch.sync().await?;
            println!(
                "Downloaded {} document(s), {} already present, {} failed (catalog: {}).",
                report.downloaded.len(),
                report.skipped_existing,
                report.failed.len(),
                report.catalog_source
            );
            for f in &report.failed {
                println!("  failed: {}", f);
            }
        }
        Commands::Check { json } => {
            let report = orch.check().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_source_note(report.catalog_source);
                print!(
                    "{}",
                    render_summary(report.timestamp, &report.classification, &report.diffs)
                );
                if report.classification.has_changes() {
                    println!();
                    println!("Review with `docsync diff`, then `docsync commit \"<message>\"`.");
                } else {
                    println!();
                    println!("No changes. Run `docsync discard` to clear the pending check.");
                }
            }
        }
        Commands::Diff { filename } => {
            let diffs = match filename {
                Some(f) => vec![orch.pending_diff(&f)?],
                None => {
                    let diffs = orch.pending_diffs()?;
                    if let Some(summary) = orch.pending_summary_text() {
                        println!("{}", summary);
                    }
                    diffs
                }
            };
            if diffs.is_empty() {
                println!("No changed documents in the pending update.");
            }
            for d in &diffs {
                print!("{}", d.text);
            }
        }
        Commands::Commit { message } => {
            let report = orch.commit(&message)?;
            println!(
                "Applied {} document(s); cleared {} cache entr{}.",
                report.applied.len(),
                report.cache_entries_cleared,
                if report.cache_entries_cleared == 1 { "y" } else { "ies" }
            );
            println!("Logged: {}  {}", report.entry.timestamp, report.entry.message);
        }
        Commands::Discard => match orch.discard()? {
            DiscardOutcome::Discarded => println!("Pending update discarded."),
            DiscardOutcome::NothingToDiscard => println!("No pending update to discard."),
        },
        Commands::Status { json } => stats::run_status(&orch, json)?,
        Commands::Get { filename, raw } => get::run_get(&orch, &filename, raw).await?,
        Commands::Search { query, limit, json } => {
            search::run_search(&orch, &query, limit, json).await?
        }
        Commands::Cache { action } => match action {
            CacheAction::Stats { json } => stats::run_cache_stats(&orch, json)?,
            CacheAction::Clear => {
                let removed = orch.cache().clear()?;
                println!("Removed {} cache entr{}.", removed, if removed == 1 { "y" } else { "ies" });
            }
            CacheAction::Warm => {
                let report = orch.warm_cache().await?;
                println!("Warmed {} document(s).", report.warmed);
                for (f, e) in &report.failed {
                    println!("  skipped {}: {}", f, e);
                }
            }
        },
    }

    Ok(())
}

async fn run_list(orch: &Orchestrator, json: bool) -> anyhow::Result<()> {
    let resolved = orch.catalog().await?;

    if json {
        let out = serde_json::json!({
            "source": resolved.source,
            "catalog": resolved.catalog,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    print_source_note(resolved.source);
    for cat in &resolved.catalog.categories {
        println!("{} ({})", cat.name, cat.slug);
        for doc in &cat.docs {
            let mark = if orch.data().has_live(&doc.filename) { "✓" } else { " " };
            println!("  [{}] {:<28} {}", mark, doc.filename, doc.title);
        }
        println!();
    }
    println!("{} document(s)", resolved.catalog.doc_count());
    Ok(())
}

fn print_source_note(source: CatalogSource) {
    if source == CatalogSource::Bundled {
        eprintln!("note: remote manifest unavailable, using bundled catalog");
    }
}
