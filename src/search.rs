//! Linear search over the synced documents.
//!
//! No index: every catalog document with a Live Document is read through the
//! content cache and scanned line by line for a case-insensitive substring.
//! The catalog is small enough that this stays fast.

use serde::Serialize;
use tracing::debug;

use crate::error::Result;
use crate::update::Orchestrator;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHit {
    pub filename: String,
    pub title: String,
    pub category: String,
    /// 1-based.
    pub line_number: usize,
    pub line: String,
}

/// Hits in catalog order, then line order, at most `limit` of them.
pub async fn search(orch: &Orchestrator, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() || limit == 0 {
        return Ok(Vec::new());
    }

    let resolved = orch.catalog().await?;
    let catalog = &resolved.catalog;
    let mut hits = Vec::new();

    for category in &catalog.categories {
        for doc in &category.docs {
            if !orch.data().has_live(&doc.filename) {
                continue;
            }
            let source_url = orch.source_url(catalog, &doc.url);
            let content = match orch.cache().get_or_generate(&doc.filename, &source_url) {
                Ok(c) => c,
                Err(e) => {
                    debug!(filename = %doc.filename, error = %e, "skipping unreadable document");
                    continue;
                }
            };

            let matches = scan(&content, &needle).map(|(line_number, line)| SearchHit {
                filename: doc.filename.clone(),
                title: doc.title.clone(),
                category: category.name.clone(),
                line_number,
                line: line.to_string(),
            });
            for hit in matches {
                hits.push(hit);
                if hits.len() >= limit {
                    return Ok(hits);
                }
            }
        }
    }
    Ok(hits)
}

/// Lines of `content` containing `needle` (already lowercased).
fn scan<'a>(content: &'a str, needle: &'a str) -> impl Iterator<Item = (usize, &'a str)> + 'a {
    content
        .lines()
        .enumerate()
        .filter(move |(_, line)| line.to_lowercase().contains(needle))
        .map(|(i, line)| (i + 1, line))
}

pub async fn run_search(orch: &Orchestrator, query: &str, limit: usize, json: bool) -> Result<()> {
    let hits = search(orch, query, limit).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&hits)?);
        return Ok(());
    }

    if hits.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for hit in &hits {
        println!("{}:{}  {}", hit.filename, hit.line_number, hit.line.trim());
    }
    println!();
    println!("{} match{}", hits.len(), if hits.len() == 1 { "" } else { "es" });
    Ok(())
}
