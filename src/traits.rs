//! Extension seams of the synchronization core.
//!
//! The core talks to the network and to the markdown rewriter only through
//! these traits, so the binary can plug in the HTTP fetcher and tests can plug
//! in an in-memory one.
//!
//! ```text
//!   ResourceResolver ──┐
//!                      ├──▶ dyn Fetch ──▶ HttpFetcher (reqwest, retry/backoff)
//!   Orchestrator ──────┘
//!        │
//!        ├──▶ dyn Transform ──▶ NormalizeNewlines / Passthrough
//!   ContentCache ──┘
//! ```

use async_trait::async_trait;

use crate::fetcher::FetchError;

// ═══════════════════════════════════════════════════════════════════════
// Fetch Trait
// ═══════════════════════════════════════════════════════════════════════

/// A remote reader.
///
/// Implementations own their retry policy: a returned error means the
/// document is unavailable for this run.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use docsync::fetcher::FetchError;
/// use docsync::traits::Fetch;
///
/// struct Offline;
///
/// #[async_trait]
/// impl Fetch for Offline {
///     async fn fetch_text(&self, _url: &str) -> Result<String, FetchError> {
///         Err(FetchError::HttpStatus(503))
///     }
/// }
/// ```
#[async_trait]
pub trait Fetch: Send + Sync {
    /// GET `url` and return the body as text.
    async fn fetch_text(&self, url: &str) -> Result<String, FetchError>;
}

// ═══════════════════════════════════════════════════════════════════════
// Transform Trait
// ═══════════════════════════════════════════════════════════════════════

/// Rewrites raw downloaded markdown into the stored form.
///
/// Must be deterministic: the same input always yields the same output,
/// otherwise `check` would report spurious changes.
pub trait Transform: Send + Sync {
    fn apply(&self, raw: &str) -> String;
}

/// Identity transform.
pub struct Passthrough;

impl Transform for Passthrough {
    fn apply(&self, raw: &str) -> String {
        raw.to_string()
    }
}

/// CRLF → LF, drops a leading BOM, guarantees a trailing newline.
pub struct NormalizeNewlines;

impl Transform for NormalizeNewlines {
    fn apply(&self, raw: &str) -> String {
        let body = raw.strip_prefix('\u{feff}').unwrap_or(raw);
        let mut out = body.replace("\r\n", "\n");
        if !out.is_empty() && !out.ends_with('\n') {
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_newlines() {
        let t = NormalizeNewlines;
        assert_eq!(t.apply("\u{feff}# Title\r\nbody"), "# Title\nbody\n");
        assert_eq!(t.apply("done\n"), "done\n");
        assert_eq!(t.apply(""), "");
    }

    #[test]
    fn transforms_are_deterministic() {
        let raw = "a\r\nb\r\n";
        assert_eq!(NormalizeNewlines.apply(raw), NormalizeNewlines.apply(raw));
        assert_eq!(Passthrough.apply(raw), raw);
    }
}
