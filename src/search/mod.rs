//! Search: a live linear scan over note bodies. No index, no ranking;
//! results come back in directory traversal order.

use std::path::Path;

use regex::RegexBuilder;
use serde::Serialize;
use tracing::debug;

use crate::storage::{ListOptions, Vault};
use crate::{Error, Result};

/// Characters of context kept on each side of the first match.
const PREVIEW_RADIUS: usize = 100;

#[derive(Debug, Clone, Copy)]
pub struct SearchOptions {
    pub case_sensitive: bool,
    pub recursive: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            case_sensitive: false,
            recursive: true,
        }
    }
}

/// One matching note.
#[derive(Debug, Clone, Serialize)]
pub struct SearchMatch {
    pub path: String,
    pub match_count: usize,
    pub preview: String,
}

/// Scan every note body under `dir` for a literal substring.
///
/// The query is escaped before compiling, so regex metacharacters match
/// themselves. Unreadable files are skipped, not reported as errors.
pub fn search(
    vault: &Vault,
    dir: &Path,
    query: &str,
    opts: SearchOptions,
) -> Result<Vec<SearchMatch>> {
    if query.is_empty() {
        return Err(Error::InvalidInput("search query must not be empty".to_string()));
    }
    let pattern = RegexBuilder::new(&regex::escape(query))
        .case_insensitive(!opts.case_sensitive)
        .build()
        .map_err(|e| Error::InvalidInput(format!("bad search pattern: {e}")))?;

    let paths = vault.list(
        dir,
        ListOptions {
            recursive: opts.recursive,
            type_filter: None,
        },
    )?;

    let mut results = Vec::new();
    for path in paths {
        let note = match vault.read(&path) {
            Ok(note) => note,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "skipping unreadable note");
                continue;
            }
        };
        let mut matches = pattern.find_iter(&note.body);
        let Some(first) = matches.next() else { continue };
        let match_count = 1 + matches.count();
        results.push(SearchMatch {
            path: path.to_string_lossy().into_owned(),
            match_count,
            preview: preview(&note.body, first.start(), first.end()),
        });
    }
    Ok(results)
}

/// A window of text around the first match, with ellipsis markers when the
/// window is truncated at either end.
fn preview(body: &str, start: usize, end: usize) -> String {
    let mut lo = start.saturating_sub(PREVIEW_RADIUS);
    while lo > 0 && !body.is_char_boundary(lo) {
        lo -= 1;
    }
    let mut hi = (end + PREVIEW_RADIUS).min(body.len());
    while hi < body.len() && !body.is_char_boundary(hi) {
        hi += 1;
    }

    let mut out = String::new();
    if lo > 0 {
        out.push_str("...");
    }
    out.push_str(&body[lo..hi]);
    if hi < body.len() {
        out.push_str("...");
    }
    out
}
