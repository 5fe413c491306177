//! Catalog resolution with a three-tier fallback chain.
//!
//! ```text
//! .manifest-cache.json (younger than TTL) ─▶ remote manifest ─▶ bundled manifest
//! ```
//!
//! A tier that fails to fetch, parse, or validate is skipped. Only when the
//! bundled manifest is also unusable does [`ResourceResolver::load`] fail,
//! with an error naming both the remote and the bundled cause.

use std::borrow::Cow;
use std::collections::HashSet;
use std::fs;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Result, SyncError};
use crate::models::{CatalogSource, ResourceConfiguration};
use crate::store::{atomic_write, check_filename, DataDir};
use crate::traits::Fetch;

/// Manifest compiled into the binary.
pub const BUNDLED_MANIFEST: &str = include_str!("../resources/manifest.json");

/// A catalog and the tier it came from.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub catalog: ResourceConfiguration,
    pub source: CatalogSource,
}

pub struct ResourceResolver {
    data: DataDir,
    fetcher: Arc<dyn Fetch>,
    manifest_url: String,
    ttl: Duration,
    bundled: Cow<'static, str>,
}

impl ResourceResolver {
    pub fn new(
        data: DataDir,
        fetcher: Arc<dyn Fetch>,
        manifest_url: impl Into<String>,
        ttl: Duration,
    ) -> Self {
        Self {
            data,
            fetcher,
            manifest_url: manifest_url.into(),
            ttl,
            bundled: Cow::Borrowed(BUNDLED_MANIFEST),
        }
    }

    pub fn from_config(config: &Config, fetcher: Arc<dyn Fetch>) -> Self {
        Self::new(
            DataDir::from_config(config),
            fetcher,
            config.remote.manifest_url.clone(),
            Duration::from_secs(config.manifest.ttl_secs),
        )
    }

    /// Replace the bundled manifest (tests, alternative builds).
    pub fn with_bundled(mut self, manifest: impl Into<String>) -> Self {
        self.bundled = Cow::Owned(manifest.into());
        self
    }

    pub async fn load(&self) -> Result<Resolved> {
        if let Some(catalog) = self.load_cached() {
            debug!("catalog from manifest cache");
            return Ok(Resolved {
                catalog,
                source: CatalogSource::Cache,
            });
        }

        let remote_err = match self.load_remote().await {
            Ok(catalog) => {
                info!(url = %self.manifest_url, docs = catalog.doc_count(), "catalog from remote");
                return Ok(Resolved {
                    catalog,
                    source: CatalogSource::Remote,
                });
            }
            Err(e) => {
                warn!(url = %self.manifest_url, error = %e, "remote manifest unusable, using bundled");
                e.to_string()
            }
        };

        match parse_manifest(&self.bundled) {
            Ok(catalog) => Ok(Resolved {
                catalog,
                source: CatalogSource::Bundled,
            }),
            Err(e) => Err(SyncError::Config {
                remote: remote_err,
                bundled: e.to_string(),
            }),
        }
    }

    fn load_cached(&self) -> Option<ResourceConfiguration> {
        let path = self.data.manifest_cache_path();
        let modified = fs::metadata(&path).ok()?.modified().ok()?;
        let age = SystemTime::now()
            .duration_since(modified)
            .unwrap_or_default();
        if age >= self.ttl {
            debug!(age_secs = age.as_secs(), "manifest cache expired");
            return None;
        }
        let raw = fs::read_to_string(&path).ok()?;
        match parse_manifest(&raw) {
            Ok(catalog) => Some(catalog),
            Err(e) => {
                debug!(error = %e, "manifest cache invalid");
                None
            }
        }
    }

    async fn load_remote(&self) -> Result<ResourceConfiguration> {
        let raw = self.fetcher.fetch_text(&self.manifest_url).await?;
        let catalog = parse_manifest(&raw)?;
        if let Err(e) = self.persist(&raw) {
            warn!(error = %e, "could not write manifest cache");
        }
        Ok(catalog)
    }

    fn persist(&self, raw: &str) -> Result<()> {
        self.data.ensure()?;
        atomic_write(&self.data.manifest_cache_path(), raw.as_bytes())?;
        Ok(())
    }
}

/// Parse and validate a manifest document.
pub fn parse_manifest(raw: &str) -> Result<ResourceConfiguration> {
    let catalog: ResourceConfiguration = serde_json::from_str(raw)
        .map_err(|e| SyncError::validation(format!("manifest is not valid: {}", e)))?;
    validate_catalog(&catalog)?;
    Ok(catalog)
}

/// Structural checks on a catalog.
pub fn validate_catalog(catalog: &ResourceConfiguration) -> Result<()> {
    if catalog.categories.is_empty() {
        return Err(SyncError::validation("manifest has no categories"));
    }

    let mut seen = HashSet::new();
    for (i, cat) in catalog.categories.iter().enumerate() {
        for (field, value) in [
            ("name", &cat.name),
            ("slug", &cat.slug),
            ("description", &cat.description),
        ] {
            if value.trim().is_empty() {
                return Err(SyncError::validation(format!(
                    "category {}: empty {}",
                    i, field
                )));
            }
        }

        for (j, doc) in cat.docs.iter().enumerate() {
            for (field, value) in [
                ("title", &doc.title),
                ("url", &doc.url),
                ("filename", &doc.filename),
                ("description", &doc.description),
            ] {
                if value.trim().is_empty() {
                    return Err(SyncError::validation(format!(
                        "category '{}' doc {}: empty {}",
                        cat.slug, j, field
                    )));
                }
            }
            check_filename(&doc.filename)?;
            if !seen.insert(doc.filename.as_str()) {
                return Err(SyncError::validation(format!(
                    "duplicate filename in catalog: {}",
                    doc.filename
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_manifest_is_valid() {
        let catalog = parse_manifest(BUNDLED_MANIFEST).unwrap();
        assert!(catalog.doc_count() > 0);
        assert!(catalog.base_url.is_some());
    }

    #[test]
    fn missing_docs_array_rejected() {
        let raw = r#"{"categories":[{"name":"A","slug":"a","description":"d"}]}"#;
        assert!(matches!(parse_manifest(raw), Err(SyncError::Validation(_))));
    }

    #[test]
    fn empty_fields_rejected() {
        let raw = r#"{"categories":[{"name":"A","slug":"a","description":"d","docs":[
            {"title":"","url":"u","filename":"f.md","description":"d"}]}]}"#;
        let err = parse_manifest(raw).unwrap_err();
        assert!(err.to_string().contains("empty title"));

        let raw = r#"{"categories":[{"name":" ","slug":"a","description":"d","docs":[]}]}"#;
        assert!(parse_manifest(raw).unwrap_err().to_string().contains("empty name"));
    }

    #[test]
    fn duplicate_and_escaping_filenames_rejected() {
        let raw = r#"{"categories":[{"name":"A","slug":"a","description":"d","docs":[
            {"title":"t","url":"u","filename":"f.md","description":"d"},
            {"title":"t2","url":"u2","filename":"f.md","description":"d"}]}]}"#;
        assert!(parse_manifest(raw).unwrap_err().to_string().contains("duplicate"));

        let raw = r#"{"categories":[{"name":"A","slug":"a","description":"d","docs":[
            {"title":"t","url":"u","filename":"../f.md","description":"d"}]}]}"#;
        assert!(parse_manifest(raw).is_err());
    }

    #[test]
    fn category_without_docs_is_allowed() {
        let raw = r#"{"categories":[{"name":"A","slug":"a","description":"d","docs":[]}]}"#;
        assert!(parse_manifest(raw).is_ok());
    }
}
