//! Index builder: the derived summary documents under `indexes/`.
//!
//! Catalog and phase-summary are rebuilt from a fresh directory scan on every
//! regeneration; latest-handoff is maintained incrementally by the note store
//! and only rewritten here when missing. The index documents are themselves
//! notes of type `index`, so they share the frontmatter codec.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::frontmatter::now_second;
use crate::models::{Frontmatter, Note, NoteType};
use crate::storage::{
    CATALOG_INDEX, HANDOFFS_DIR, LATEST_HANDOFF_INDEX, ListOptions, PHASE_SUMMARY_INDEX,
    SESSIONS_DIR, Vault,
};
use crate::Result;

/// Most-recent entries shown per catalog section; the reported count is
/// always the true total.
const CATALOG_DISPLAY_LIMIT: usize = 20;

/// Status buckets of the phase summary, in fixed display order.
const PHASE_BUCKETS: [&str; 4] = ["planned", "active", "completed", "other"];

/// Outcome of one regeneration pass.
#[derive(Debug, Clone, Serialize)]
pub struct RegenerateOutcome {
    pub catalog: String,
    pub phase_summary: String,
    pub latest_handoff: String,
    /// True when the missing latest-handoff index had to be rebuilt by scan
    pub latest_handoff_rebuilt: bool,
    pub handoff_count: usize,
    pub session_count: usize,
    pub phase_count: usize,
}

/// Rebuild the derived index documents from the vault's current contents.
pub fn regenerate(vault: &Vault) -> Result<RegenerateOutcome> {
    let handoffs = all_handoffs(vault)?;
    let sessions = vault.list(
        Path::new(SESSIONS_DIR),
        ListOptions {
            recursive: true,
            type_filter: None,
        },
    )?;
    let phases = phase_notes(vault);

    let generated_at = now_second();
    write_catalog(vault, &handoffs, &sessions, &phases, generated_at)?;
    write_phase_summary(vault, &phases, generated_at)?;

    let latest_rebuilt = if vault.exists(Path::new(LATEST_HANDOFF_INDEX)) {
        false
    } else {
        rebuild_latest_handoff(vault, &handoffs)?
    };

    Ok(RegenerateOutcome {
        catalog: CATALOG_INDEX.to_string(),
        phase_summary: PHASE_SUMMARY_INDEX.to_string(),
        latest_handoff: LATEST_HANDOFF_INDEX.to_string(),
        latest_handoff_rebuilt: latest_rebuilt,
        handoff_count: handoffs.len(),
        session_count: sessions.len(),
        phase_count: phases.len(),
    })
}

/// Every handoff in the vault: the top-level dated tree plus each phase's
/// `handoffs/` subtree.
fn all_handoffs(vault: &Vault) -> Result<Vec<PathBuf>> {
    let mut paths = vault.list(
        Path::new(HANDOFFS_DIR),
        ListOptions {
            recursive: true,
            type_filter: None,
        },
    )?;
    for phase_id in vault.phase_ids()? {
        let dir = vault.phase_dir(&phase_id).join(HANDOFFS_DIR);
        paths.extend(vault.list(&dir, ListOptions::default())?);
    }
    Ok(paths)
}

/// Phase root notes, skipping any whose file cannot be read. Best-effort.
fn phase_notes(vault: &Vault) -> Vec<Note> {
    let Ok(ids) = vault.phase_ids() else {
        return Vec::new();
    };
    let mut notes = Vec::new();
    for id in ids {
        let rel = vault.phase_dir(&id).join("phase.md");
        match vault.read(&rel) {
            Ok(note) => notes.push(note),
            Err(e) => debug!(phase = %id, error = %e, "skipping unreadable phase"),
        }
    }
    notes
}

fn write_catalog(
    vault: &Vault,
    handoffs: &[PathBuf],
    sessions: &[PathBuf],
    phases: &[Note],
    generated_at: DateTime<Utc>,
) -> Result<()> {
    let mut body = String::from("# Catalog\n\n");
    body.push_str(&format!("Generated: {}\n", generated_at.to_rfc3339()));
    push_section(vault, &mut body, "Handoffs", handoffs);
    push_section(vault, &mut body, "Sessions", sessions);
    let phase_paths: Vec<PathBuf> = phases.iter().map(|n| n.path.clone()).collect();
    push_section(vault, &mut body, "Phases", &phase_paths);
    write_index(vault, Path::new(CATALOG_INDEX), generated_at, &body)
}

/// Render one catalog section, sorted by modification time descending and
/// truncated for display without understating the total.
fn push_section(vault: &Vault, body: &mut String, heading: &str, paths: &[PathBuf]) {
    let mut stamped: Vec<(DateTime<Utc>, &PathBuf)> = paths
        .iter()
        .map(|p| {
            let mtime = vault
                .stat(p)
                .map(|s| s.mtime)
                .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
            (mtime, p)
        })
        .collect();
    stamped.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(b.1)));

    body.push_str(&format!("\n## {heading} ({})\n\n", stamped.len()));
    if stamped.is_empty() {
        body.push_str("(none)\n");
        return;
    }
    for (_, path) in stamped.iter().take(CATALOG_DISPLAY_LIMIT) {
        body.push_str(&format!("- {}\n", path.display()));
    }
    if stamped.len() > CATALOG_DISPLAY_LIMIT {
        body.push_str(&format!(
            "- ... and {} more\n",
            stamped.len() - CATALOG_DISPLAY_LIMIT
        ));
    }
}

fn write_phase_summary(
    vault: &Vault,
    phases: &[Note],
    generated_at: DateTime<Utc>,
) -> Result<()> {
    let mut body = String::from("# Phase Summary\n\n");
    body.push_str(&format!("Generated: {}\n", generated_at.to_rfc3339()));

    for bucket in PHASE_BUCKETS {
        let members: Vec<&Note> = phases
            .iter()
            .filter(|n| bucket_of(&n.frontmatter.status) == bucket)
            .collect();
        body.push_str(&format!("\n## {} ({})\n\n", title_case(bucket), members.len()));
        if members.is_empty() {
            body.push_str("(none)\n");
            continue;
        }
        for note in members {
            let id = note.frontmatter.phase_id.as_deref().unwrap_or("?");
            let title = note.frontmatter.title().unwrap_or("(untitled)");
            body.push_str(&format!("- {id}: {title} [{}]\n", note.frontmatter.status));
        }
    }
    write_index(vault, Path::new(PHASE_SUMMARY_INDEX), generated_at, &body)
}

fn bucket_of(status: &str) -> &'static str {
    match status {
        "planned" => "planned",
        "active" => "active",
        "completed" => "completed",
        _ => "other",
    }
}

fn title_case(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Write the most recent handoff by creation time into the latest-handoff
/// index. Only called when the index is missing.
fn rebuild_latest_handoff(vault: &Vault, handoffs: &[PathBuf]) -> Result<bool> {
    // created_at has one-second resolution, so same-second handoffs are
    // tie-broken by file mtime.
    let mut newest: Option<(DateTime<Utc>, DateTime<Utc>, Note)> = None;
    for path in handoffs {
        let Ok(note) = vault.read(path) else { continue };
        let mtime = vault
            .stat(path)
            .map(|s| s.mtime)
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
        let key = (note.frontmatter.created_at, mtime);
        let newer = newest
            .as_ref()
            .is_none_or(|(created, seen, _)| key > (*created, *seen));
        if newer {
            newest = Some((key.0, key.1, note));
        }
    }
    match newest {
        Some((_, _, note)) => {
            vault.write_latest_handoff_index(&note)?;
            Ok(true)
        }
        None => Ok(false),
    }
}

/// Write an index document, preserving the existing note identity so repeated
/// regeneration is idempotent apart from the generation timestamp.
fn write_index(
    vault: &Vault,
    rel: &Path,
    generated_at: DateTime<Utc>,
    body: &str,
) -> Result<()> {
    let mut fm = match vault.read(rel) {
        Ok(existing) if !existing.frontmatter.id.is_nil() => existing.frontmatter,
        _ => {
            let mut fm = Frontmatter::new(NoteType::Index);
            fm.created_at = generated_at;
            fm
        }
    };
    fm.note_type = NoteType::Index;
    fm.status = "generated".to_string();
    fm.updated_at = generated_at;
    vault.create(rel, &fm, body).map(|_| ())
}
