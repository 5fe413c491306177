//! Download progress for `docsync check` and `docsync sync`.
//!
//! Events go to **stderr** so stdout stays parseable. The orchestrator only
//! sees the [`ProgressReporter`] trait; the CLI picks an implementation from
//! `--progress`.

use std::io::Write;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProgressEvent {
    /// Loading the catalog before any download starts.
    Resolving { operation: String },
    /// One document finished downloading, successfully or not.
    Fetched {
        operation: String,
        filename: String,
        ok: bool,
        n: usize,
        total: usize,
    },
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// `check  [ 3/11]  hooks.md` lines on stderr.
pub struct StderrProgress;

impl ProgressReporter for StderrProgress {
    fn report(&self, event: ProgressEvent) {
        let line = match &event {
            ProgressEvent::Resolving { operation } => {
                format!("{}  resolving catalog...\n", operation)
            }
            ProgressEvent::Fetched {
                operation,
                filename,
                ok,
                n,
                total,
            } => {
                let width = total.to_string().len();
                format!(
                    "{}  [{:>w$}/{}]  {}{}\n",
                    operation,
                    n,
                    total,
                    filename,
                    if *ok { "" } else { "  (failed)" },
                    w = width
                )
            }
        };
        let mut err = std::io::stderr().lock();
        let _ = err.write_all(line.as_bytes());
        let _ = err.flush();
    }
}

/// One JSON object per event on stderr.
pub struct JsonProgress;

impl ProgressReporter for JsonProgress {
    fn report(&self, event: ProgressEvent) {
        let obj = match &event {
            ProgressEvent::Resolving { operation } => serde_json::json!({
                "event": "resolving",
                "operation": operation,
            }),
            ProgressEvent::Fetched {
                operation,
                filename,
                ok,
                n,
                total,
            } => serde_json::json!({
                "event": "fetched",
                "operation": operation,
                "filename": filename,
                "ok": ok,
                "n": n,
                "total": total,
            }),
        };
        let mut err = std::io::stderr().lock();
        let _ = writeln!(err, "{}", obj);
        let _ = err.flush();
    }
}

pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _event: ProgressEvent) {}
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Human progress when stderr is a terminal, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Arc<dyn ProgressReporter> {
        match self {
            ProgressMode::Off => Arc::new(NoProgress),
            ProgressMode::Human => Arc::new(StderrProgress),
            ProgressMode::Json => Arc::new(JsonProgress),
        }
    }
}

impl FromStr for ProgressMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "off" => Ok(ProgressMode::Off),
            "human" => Ok(ProgressMode::Human),
            "json" => Ok(ProgressMode::Json),
            other => Err(format!(
                "unknown progress mode '{}': use off, human, or json",
                other
            )),
        }
    }
}
