//! Catalog resolution through the manifest cache tier.

use async_trait::async_trait;
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

use docsync::fetcher::FetchError;
use docsync::models::CatalogSource;
use docsync::resources::ResourceResolver;
use docsync::store::DataDir;
use docsync::traits::Fetch;

const MANIFEST_URL: &str = "https://docs.test/manifest.json";

const REMOTE: &str = r#"{"base_url":"https://docs.test/docs/","categories":[
  {"name":"Guides","slug":"guides","description":"g","docs":[
    {"title":"Remote","url":"r.md","filename":"r.md","description":"from remote"}]}]}"#;

const CACHED: &str = r#"{"base_url":"https://docs.test/docs/","categories":[
  {"name":"Guides","slug":"guides","description":"g","docs":[
    {"title":"Cached","url":"c.md","filename":"c.md","description":"from cache"}]}]}"#;

/// Serves one manifest body (or fails) and counts requests.
struct CountingFetcher {
    body: Option<&'static str>,
    calls: AtomicUsize,
}

impl CountingFetcher {
    fn serving(body: &'static str) -> Arc<Self> {
        Arc::new(Self {
            body: Some(body),
            calls: AtomicUsize::new(0),
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            body: None,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetch for CountingFetcher {
    async fn fetch_text(&self, _url: &str) -> Result<String, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.body {
            Some(b) => Ok(b.to_string()),
            None => Err(FetchError::HttpStatus(503)),
        }
    }
}

fn resolver(tmp: &TempDir, fetcher: Arc<CountingFetcher>) -> (DataDir, ResourceResolver) {
    let data = DataDir::new(tmp.path().join("data"));
    let resolver = ResourceResolver::new(
        data.clone(),
        fetcher,
        MANIFEST_URL,
        Duration::from_secs(3600),
    );
    (data, resolver)
}

fn first_filename(catalog: &docsync::models::ResourceConfiguration) -> &str {
    &catalog.categories[0].docs[0].filename
}

#[tokio::test]
async fn remote_success_is_cached_and_reused_within_ttl() {
    let tmp = TempDir::new().unwrap();
    let fetcher = CountingFetcher::serving(REMOTE);
    let (data, resolver) = resolver(&tmp, fetcher.clone());

    let first = resolver.load().await.unwrap();
    assert_eq!(first.source, CatalogSource::Remote);
    assert_eq!(fetcher.calls(), 1);
    assert_eq!(
        fs::read_to_string(data.manifest_cache_path()).unwrap(),
        REMOTE
    );

    let second = resolver.load().await.unwrap();
    assert_eq!(second.source, CatalogSource::Cache);
    assert_eq!(first_filename(&second.catalog), "r.md");
    assert_eq!(fetcher.calls(), 1);
}

#[tokio::test]
async fn fresh_cache_is_served_even_when_remote_is_down() {
    let tmp = TempDir::new().unwrap();
    let fetcher = CountingFetcher::failing();
    let (data, resolver) = resolver(&tmp, fetcher.clone());
    data.ensure().unwrap();
    fs::write(data.manifest_cache_path(), CACHED).unwrap();

    let resolved = resolver.load().await.unwrap();
    assert_eq!(resolved.source, CatalogSource::Cache);
    assert_eq!(first_filename(&resolved.catalog), "c.md");
    assert_eq!(fetcher.calls(), 0);
}

#[tokio::test]
async fn expired_cache_goes_back_to_remote_and_is_refreshed() {
    let tmp = TempDir::new().unwrap();
    let fetcher = CountingFetcher::serving(REMOTE);
    let (data, resolver) = resolver(&tmp, fetcher.clone());
    data.ensure().unwrap();
    let path = data.manifest_cache_path();
    fs::write(&path, CACHED).unwrap();
    fs::File::options()
        .write(true)
        .open(&path)
        .unwrap()
        .set_modified(SystemTime::now() - Duration::from_secs(2 * 3600))
        .unwrap();

    let resolved = resolver.load().await.unwrap();
    assert_eq!(resolved.source, CatalogSource::Remote);
    assert_eq!(first_filename(&resolved.catalog), "r.md");
    assert_eq!(fetcher.calls(), 1);
    assert_eq!(fs::read_to_string(&path).unwrap(), REMOTE);
}

#[tokio::test]
async fn invalid_cache_is_ignored() {
    let tmp = TempDir::new().unwrap();
    let fetcher = CountingFetcher::serving(REMOTE);
    let (data, resolver) = resolver(&tmp, fetcher.clone());
    data.ensure().unwrap();
    fs::write(data.manifest_cache_path(), r#"{"categories":[]}"#).unwrap();

    let resolved = resolver.load().await.unwrap();
    assert_eq!(resolved.source, CatalogSource::Remote);
    assert_eq!(fetcher.calls(), 1);
    assert_eq!(
        fs::read_to_string(data.manifest_cache_path()).unwrap(),
        REMOTE
    );
}

#[tokio::test]
async fn expired_cache_with_remote_down_falls_back_to_bundled() {
    let tmp = TempDir::new().unwrap();
    let fetcher = CountingFetcher::failing();
    let (data, resolver) = resolver(&tmp, fetcher.clone());
    data.ensure().unwrap();
    let path = data.manifest_cache_path();
    fs::write(&path, CACHED).unwrap();
    fs::File::options()
        .write(true)
        .open(&path)
        .unwrap()
        .set_modified(SystemTime::now() - Duration::from_secs(2 * 3600))
        .unwrap();

    let resolved = resolver.load().await.unwrap();
    assert_eq!(resolved.source, CatalogSource::Bundled);
    assert_eq!(fetcher.calls(), 1);
}

#[tokio::test]
async fn remote_catalog_survives_a_cache_write_failure() {
    let tmp = TempDir::new().unwrap();
    let fetcher = CountingFetcher::serving(REMOTE);
    let (data, resolver) = resolver(&tmp, fetcher.clone());
    data.ensure().unwrap();
    // A directory in the cache file's place makes the write fail.
    fs::create_dir(data.manifest_cache_path()).unwrap();
    fs::write(data.manifest_cache_path().join("occupied"), "x").unwrap();

    let resolved = resolver.load().await.unwrap();
    assert_eq!(resolved.source, CatalogSource::Remote);
    assert_eq!(first_filename(&resolved.catalog), "r.md");
    assert!(data.manifest_cache_path().is_dir());
}
