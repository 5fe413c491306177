//! Status and cache overview.
//!
//! Renders what `docsync status` and `docsync cache stats` report: how old
//! the Live Documents are, whether an update is pending, recent changelog
//! entries and the size of the content cache.

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::StatusReport;
use crate::update::Orchestrator;

/// Run the status command: gather the report and print a summary.
pub fn run_status(orch: &Orchestrator, json: bool) -> Result<()> {
    let report = orch.status()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    print_status(&report, &orch.data().root().display().to_string());
    Ok(())
}

fn print_status(report: &StatusReport, data_dir: &str) {
    println!("docsync status");
    println!("==============");
    println!();
    println!("  Data dir:     {}", data_dir);
    println!("  Documents:    {}", report.live_documents);
    println!(
        "  Last update:  {}",
        match report.last_update {
            Some(ts) => format_ts_relative(ts),
            None => "never".to_string(),
        }
    );
    if report.reminder {
        println!();
        println!(
            "  Documentation is {} hours old. Run `docsync check` to look for updates.",
            report.age_hours.unwrap_or_default()
        );
    }

    if !report.missing_docs.is_empty() {
        println!();
        println!("  Missing ({}):", report.missing_docs.len());
        for f in &report.missing_docs {
            println!("    - {}", f);
        }
    }

    println!();
    match &report.pending {
        None => println!("  No pending update."),
        Some(p) => {
            let checked = p
                .timestamp
                .map(format_ts_relative)
                .unwrap_or_else(|| "unknown".to_string());
            println!("  Pending update (checked {}):", checked);
            println!(
                "    {:>3} new  {:>3} changed  {:>3} unchanged  {:>3} failed",
                p.classification.new.len(),
                p.classification.changed.len(),
                p.classification.unchanged.len(),
                p.classification.failed.len()
            );
            if !p.interrupted_commit.is_empty() {
                println!(
                    "    {} staged file(s) already match the live copy; a previous commit \
                     was interrupted. Run `docsync commit` again or `docsync discard`.",
                    p.interrupted_commit.len()
                );
            }
            println!("    Review with `docsync diff`, then `docsync commit \"<message>\"`.");
        }
    }

    if !report.recent_changes.is_empty() {
        println!();
        println!("  Recent changes:");
        for entry in &report.recent_changes {
            let first_line = entry.message.lines().next().unwrap_or_default();
            println!("    {}  {}", entry.timestamp, first_line);
        }
    }
    println!();
}

pub fn run_cache_stats(orch: &Orchestrator, json: bool) -> Result<()> {
    let stats = orch.cache().stats();
    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }
    println!("  Cache dir:  {}", orch.data().cache_dir().display());
    println!("  Entries:    {}", stats.file_count);
    println!("  Size:       {}", format_bytes(stats.total_bytes));
    Ok(())
}

/// Format a byte count as a human-readable string.
pub fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Format a timestamp relative to now (e.g. "3 hours ago").
pub fn format_ts_relative(ts: DateTime<Utc>) -> String {
    let delta = (Utc::now() - ts).num_seconds();

    if delta < 0 {
        return format_ts(ts);
    }

    if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        format_ts(ts)
    }
}

fn format_ts(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M").to_string()
}
