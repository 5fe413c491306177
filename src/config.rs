use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub manifest: ManifestConfig,
    #[serde(default)]
    pub status: StatusConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("docsync"))
        .unwrap_or_else(|| PathBuf::from(".docsync"))
}

#[derive(Debug, Deserialize, Clone)]
pub struct RemoteConfig {
    #[serde(default = "default_manifest_url")]
    pub manifest_url: String,
    /// Base for document URLs that are not absolute.
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            manifest_url: default_manifest_url(),
            base_url: default_base_url(),
        }
    }
}

fn default_manifest_url() -> String {
    "https://raw.githubusercontent.com/docsync/catalog/main/manifest.json".to_string()
}
fn default_base_url() -> String {
    "https://raw.githubusercontent.com/docsync/catalog/main/docs/".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct FetchConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            timeout_secs: default_timeout_secs(),
            concurrency: default_concurrency(),
            user_agent: default_user_agent(),
        }
    }
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }
}

fn default_max_attempts() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    2000
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_concurrency() -> usize {
    5
}
fn default_user_agent() -> String {
    format!("docsync/{}", env!("CARGO_PKG_VERSION"))
}

#[derive(Debug, Deserialize, Clone)]
pub struct ManifestConfig {
    #[serde(default = "default_manifest_ttl")]
    pub ttl_secs: u64,
    #[serde(default = "default_manifest_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_manifest_retries")]
    pub max_retries: u32,
}

impl Default for ManifestConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_manifest_ttl(),
            timeout_secs: default_manifest_timeout(),
            max_retries: default_manifest_retries(),
        }
    }
}

fn default_manifest_ttl() -> u64 {
    3600
}
fn default_manifest_timeout() -> u64 {
    10
}
fn default_manifest_retries() -> u32 {
    2
}

#[derive(Debug, Deserialize, Clone)]
pub struct StatusConfig {
    #[serde(default = "default_reminder_hours")]
    pub reminder_hours: i64,
    #[serde(default = "default_changelog_tail")]
    pub changelog_tail: usize,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            reminder_hours: default_reminder_hours(),
            changelog_tail: default_changelog_tail(),
        }
    }
}

fn default_reminder_hours() -> i64 {
    24
}
fn default_changelog_tail() -> usize {
    5
}

impl Config {
    /// Config rooted at `data_dir` with every other setting at its default.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            storage: StorageConfig {
                data_dir: data_dir.into(),
            },
            ..Self::default()
        }
    }
}

/// Default location of the config file: `<config dir>/docsync/docsync.toml`.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("docsync").join("docsync.toml"))
        .unwrap_or_else(|| PathBuf::from("docsync.toml"))
}

/// Load config from `path`. When `required` is false a missing file yields
/// the defaults.
pub fn load_config(path: &Path, required: bool) -> Result<Config> {
    let mut config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str::<Config>(&content).with_context(|| "Failed to parse config file")?
    } else if required {
        anyhow::bail!("Config file not found: {}", path.display());
    } else {
        Config::default()
    };

    config.storage.data_dir = expand_tilde(&config.storage.data_dir);

    if config.fetch.max_attempts == 0 {
        anyhow::bail!("fetch.max_attempts must be >= 1");
    }
    if config.fetch.concurrency == 0 {
        anyhow::bail!("fetch.concurrency must be >= 1");
    }
    if config.fetch.timeout_secs == 0 {
        anyhow::bail!("fetch.timeout_secs must be >= 1");
    }
    if config.manifest.timeout_secs == 0 {
        anyhow::bail!("manifest.timeout_secs must be >= 1");
    }
    if config.status.reminder_hours < 1 {
        anyhow::bail!("status.reminder_hours must be >= 1");
    }

    Ok(config)
}

fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    path.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_optional_config_uses_defaults() {
        let tmp = TempDir::new().unwrap();
        let cfg = load_config(&tmp.path().join("nope.toml"), false).unwrap();
        assert_eq!(cfg.fetch.max_attempts, 3);
        assert_eq!(cfg.fetch.base_delay_ms, 2000);
        assert_eq!(cfg.fetch.timeout_secs, 30);
        assert_eq!(cfg.fetch.concurrency, 5);
        assert_eq!(cfg.manifest.ttl_secs, 3600);
        assert_eq!(cfg.manifest.max_retries, 2);
        assert_eq!(cfg.status.reminder_hours, 24);
    }

    #[test]
    fn missing_required_config_fails() {
        let tmp = TempDir::new().unwrap();
        assert!(load_config(&tmp.path().join("nope.toml"), true).is_err());
    }

    #[test]
    fn partial_config_fills_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("docsync.toml");
        std::fs::write(
            &path,
            r#"
[storage]
data_dir = "/tmp/docsync-test"

[fetch]
concurrency = 2
"#,
        )
        .unwrap();

        let cfg = load_config(&path, true).unwrap();
        assert_eq!(cfg.storage.data_dir, PathBuf::from("/tmp/docsync-test"));
        assert_eq!(cfg.fetch.concurrency, 2);
        assert_eq!(cfg.fetch.max_attempts, 3);
    }

    #[test]
    fn zero_concurrency_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("docsync.toml");
        std::fs::write(&path, "[fetch]\nconcurrency = 0\n").unwrap();
        let err = load_config(&path, true).unwrap_err();
        assert!(err.to_string().contains("concurrency"));
    }

    #[test]
    fn tilde_is_expanded() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_tilde(Path::new("~/docs")), home.join("docs"));
        }
        assert_eq!(expand_tilde(Path::new("/abs")), PathBuf::from("/abs"));
    }
}
