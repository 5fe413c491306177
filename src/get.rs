//! Document retrieval by filename.
//!
//! Looks the document up in the catalog, then serves its content through the
//! content cache (regenerating from the Live Document on a miss). Used by the
//! `docsync get` command.

use serde::Serialize;

use crate::error::{Result, SyncError};
use crate::update::Orchestrator;

#[derive(Debug, Clone, Serialize)]
pub struct DocumentResponse {
    pub filename: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub source_url: String,
    pub content: String,
}

/// Resolve `filename` (with or without `.md`) and return its content.
///
/// `NotFound` when the catalog does not list it or no Live Document exists
/// for it yet.
pub async fn get_document(orch: &Orchestrator, filename: &str) -> Result<DocumentResponse> {
    let resolved = orch.catalog().await?;
    let (category, doc) = resolved
        .catalog
        .find(filename)
        .ok_or_else(|| SyncError::not_found(filename))?;

    let source_url = orch.source_url(&resolved.catalog, &doc.url);
    let content = orch.cache().get_or_generate(&doc.filename, &source_url)?;

    Ok(DocumentResponse {
        filename: doc.filename.clone(),
        title: doc.title.clone(),
        description: doc.description.clone(),
        category: category.name.clone(),
        source_url,
        content,
    })
}

/// CLI entry point: print the document with a short header.
pub async fn run_get(orch: &Orchestrator, filename: &str, raw: bool) -> Result<()> {
    let doc = get_document(orch, filename).await?;

    if raw {
        print!("{}", doc.content);
        return Ok(());
    }

    println!("--- {} ---", doc.title);
    println!("file:      {}", doc.filename);
    println!("category:  {}", doc.category);
    println!("source:    {}", doc.source_url);
    println!();
    print!("{}", doc.content);
    if !doc.content.ends_with('\n') {
        println!();
    }
    Ok(())
}
