//! Document comparison and unified diffs.
//!
//! Both operations normalize CRLF to LF and trim the outer whitespace of the
//! whole document first, so a missing trailing newline never counts as a
//! change.

use similar::{ChangeTag, TextDiff};

use crate::models::DocDiff;

pub const DEFAULT_CONTEXT_LINES: usize = 3;

fn normalize(text: &str) -> String {
    text.replace("\r\n", "\n").trim().to_string()
}

/// `true` when the documents differ after normalization.
pub fn compare(old: &str, new: &str) -> bool {
    normalize(old) != normalize(new)
}

/// Unified diff of `old` → `new` with `a/<filename>` / `b/<filename>` headers.
pub fn diff(filename: &str, old: &str, new: &str, context_lines: usize) -> DocDiff {
    let old = with_final_newline(normalize(old));
    let new = with_final_newline(normalize(new));
    let text_diff = TextDiff::from_lines(&old, &new);

    let mut added = 0;
    let mut removed = 0;
    for change in text_diff.iter_all_changes() {
        match change.tag() {
            ChangeTag::Insert => added += 1,
            ChangeTag::Delete => removed += 1,
            ChangeTag::Equal => {}
        }
    }

    let text = text_diff
        .unified_diff()
        .context_radius(context_lines)
        .header(&format!("a/{}", filename), &format!("b/{}", filename))
        .to_string();

    DocDiff {
        filename: filename.to_string(),
        added,
        removed,
        text,
    }
}

fn with_final_newline(mut s: String) -> String {
    if !s.is_empty() {
        s.push('\n');
    }
    s
}
