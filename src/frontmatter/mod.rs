//! Frontmatter codec: the structured metadata header embedded at the top of a note.
//!
//! The on-disk contract is a deliberately small, line-oriented grammar rather
//! than general YAML: a block fenced by `---` lines, containing either
//! `key: value` scalars or a `key:` line followed by `  - item` array items.
//! One key-value or array-item per line. Parsing is lenient on read (a damaged
//! header yields empty metadata, never an error) so diagnostics stay usable on
//! broken files; serialization is the exact inverse for well-formed data.

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{Frontmatter, NoteType};

const FENCE: &str = "---";

/// A raw frontmatter value before typed interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawValue {
    Scalar(String),
    List(Vec<String>),
}

/// Current wall-clock time truncated to whole seconds.
///
/// All note timestamps carry one-second resolution, matching the filename
/// convention, so frontmatter round-trips field-for-field.
pub fn now_second() -> DateTime<Utc> {
    DateTime::from_timestamp(Utc::now().timestamp(), 0).unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// Split a document into its raw frontmatter map and body.
///
/// Returns an empty map when no well-formed block is present; lines inside the
/// block that fit neither grammar production are skipped.
pub fn split(content: &str) -> (BTreeMap<String, RawValue>, &str) {
    let mut map = BTreeMap::new();

    let Some(rest) = content.strip_prefix(FENCE) else {
        return (map, content);
    };
    let Some(rest) = rest.strip_prefix('\n') else {
        return (map, content);
    };

    // Locate the closing fence on its own line.
    let Some(end) = find_closing_fence(rest) else {
        return (map, content);
    };
    let (block, body) = rest.split_at(end);
    // Skip the fence line itself plus its newline, then the one blank
    // separator line the serializer emits after the fence. Both strips are
    // optional so hand-authored files without a separator parse the same.
    let body = &body[FENCE.len()..];
    let body = body.strip_prefix('\n').unwrap_or(body);
    let body = body.strip_prefix('\n').unwrap_or(body);

    let mut current_list: Option<String> = None;
    for line in block.lines() {
        if let Some(item) = line.strip_prefix("  - ") {
            if let Some(key) = &current_list {
                if let Some(RawValue::List(items)) = map.get_mut(key) {
                    items.push(item.to_string());
                }
            }
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            current_list = None;
            continue;
        };
        let key = key.trim();
        if key.is_empty() || key.contains(char::is_whitespace) {
            current_list = None;
            continue;
        }
        let value = value.trim();
        if value.is_empty() {
            map.insert(key.to_string(), RawValue::List(Vec::new()));
            current_list = Some(key.to_string());
        } else {
            map.insert(key.to_string(), RawValue::Scalar(value.to_string()));
            current_list = None;
        }
    }

    (map, body)
}

fn find_closing_fence(block: &str) -> Option<usize> {
    let mut offset = 0;
    for line in block.split_inclusive('\n') {
        if line.trim_end_matches('\n') == FENCE {
            return Some(offset);
        }
        offset += line.len();
    }
    None
}

/// Parse a document into typed frontmatter and body.
///
/// Malformed headers degrade to [`Frontmatter::default`] (empty metadata)
/// rather than failing.
pub fn parse(content: &str) -> (Frontmatter, String) {
    let (raw, body) = split(content);
    (from_raw(raw), body.to_string())
}

fn from_raw(mut raw: BTreeMap<String, RawValue>) -> Frontmatter {
    let mut fm = Frontmatter::default();

    if let Some(v) = take_scalar(&mut raw, "id") {
        fm.id = Uuid::parse_str(&v).unwrap_or(Uuid::nil());
    }
    if let Some(v) = take_scalar(&mut raw, "type") {
        fm.note_type = NoteType::from_str(&v).unwrap_or_default();
    }
    if let Some(v) = take_scalar(&mut raw, "created_at") {
        fm.created_at = parse_timestamp(&v).unwrap_or(fm.created_at);
    }
    if let Some(v) = take_scalar(&mut raw, "updated_at") {
        fm.updated_at = parse_timestamp(&v).unwrap_or(fm.updated_at);
    }
    if let Some(v) = take_scalar(&mut raw, "session_id") {
        fm.session_id = Uuid::parse_str(&v).ok();
    }
    if let Some(v) = take_scalar(&mut raw, "phase_id") {
        fm.phase_id = Some(v);
    }
    if let Some(v) = take_scalar(&mut raw, "status") {
        fm.status = v;
    }
    if let Some(RawValue::List(items)) = raw.remove("tags") {
        fm.tags = items;
    }
    if let Some(RawValue::List(items)) = raw.remove("links") {
        fm.links = items;
    }
    for (key, value) in raw {
        let flat = match value {
            RawValue::Scalar(s) => s,
            RawValue::List(items) => items.join(", "),
        };
        fm.extra.insert(key, flat);
    }
    fm
}

/// Remove a scalar key, treating the literal `null` as absent.
fn take_scalar(raw: &mut BTreeMap<String, RawValue>, key: &str) -> Option<String> {
    match raw.remove(key) {
        Some(RawValue::Scalar(v)) if v != "null" => Some(v),
        _ => None,
    }
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Serialize frontmatter and body into a complete note document.
///
/// Required fields come first in fixed order, extras after in key order,
/// arrays one item per line. Absent nullable scalars are written as `null`.
pub fn serialize(fm: &Frontmatter, body: &str) -> String {
    let mut out = String::new();
    out.push_str(FENCE);
    out.push('\n');
    push_scalar(&mut out, "id", &fm.id.to_string());
    push_scalar(&mut out, "type", fm.note_type.as_str());
    push_scalar(&mut out, "created_at", &format_timestamp(fm.created_at));
    push_scalar(&mut out, "updated_at", &format_timestamp(fm.updated_at));
    push_scalar(
        &mut out,
        "session_id",
        &fm.session_id.map_or_else(|| "null".to_string(), |v| v.to_string()),
    );
    push_scalar(
        &mut out,
        "phase_id",
        fm.phase_id.as_deref().unwrap_or("null"),
    );
    push_scalar(&mut out, "status", &fm.status);
    push_list(&mut out, "tags", &fm.tags);
    push_list(&mut out, "links", &fm.links);
    for (key, value) in &fm.extra {
        push_scalar(&mut out, key, value);
    }
    out.push_str(FENCE);
    out.push('\n');
    out.push('\n');
    out.push_str(body);
    if !body.is_empty() && !body.ends_with('\n') {
        out.push('\n');
    }
    out
}

fn push_scalar(out: &mut String, key: &str, value: &str) {
    out.push_str(key);
    out.push_str(": ");
    out.push_str(value);
    out.push('\n');
}

fn push_list(out: &mut String, key: &str, items: &[String]) {
    out.push_str(key);
    out.push_str(":\n");
    for item in items {
        out.push_str("  - ");
        out.push_str(item);
        out.push('\n');
    }
}
