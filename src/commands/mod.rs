//! Command implementations for the Logbook CLI.
//!
//! Each command opens the vault, performs one operation, and returns a result
//! struct that can be serialized to JSON or formatted for humans.

use std::path::Path;
use std::str::FromStr;

use serde::Serialize;
use uuid::Uuid;

use crate::config::Settings;
use crate::index::{self, RegenerateOutcome};
use crate::models::{NoteType, TrackerState};
use crate::prune::{self, PruneOptions, PruneOutcome};
use crate::search::{self, SearchMatch, SearchOptions};
use crate::storage::backend::BackendRouter;
use crate::storage::{HandoffOptions, INDEXES_DIR, ListOptions, Vault, slugify};
use crate::tracker::TrackerStore;
use crate::{Error, Result};

/// Command results that can be serialized to JSON or formatted for humans.
pub trait CommandResult {
    /// Serialize to JSON string.
    fn to_json(&self) -> String;

    /// Format for human-readable output.
    fn to_human(&self) -> String;
}

fn json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
}

fn open_vault(settings: &Settings) -> Result<Vault> {
    Vault::open(&settings.vault)
}

fn init_vault(settings: &Settings) -> Result<Vault> {
    Vault::init(&settings.vault)
}

fn tracker(settings: &Settings) -> TrackerStore {
    TrackerStore::new(&settings.vault.join(INDEXES_DIR))
}

// === Handoffs ===

#[derive(Debug, Serialize)]
pub struct HandoffCreateResult {
    pub path: String,
    pub id: Uuid,
    pub previous_handoff: Option<String>,
}

impl CommandResult for HandoffCreateResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let mut out = format!("Created handoff {}\n  id: {}", self.path, self.id);
        if let Some(prev) = &self.previous_handoff {
            out.push_str(&format!("\n  continues: {prev}"));
        }
        out
    }
}

pub fn handoff_create(
    settings: &Settings,
    title: String,
    body: String,
    phase: Option<String>,
    session: Option<Uuid>,
    tags: Vec<String>,
) -> Result<HandoffCreateResult> {
    let vault = init_vault(settings)?;
    let session_id = match session {
        Some(id) => Some(id),
        None => tracker(settings).read()?.current_session_id,
    };
    let note = vault.create_handoff(HandoffOptions {
        title,
        body,
        phase_id: phase.map(|p| slugify(&p)),
        session_id,
        tags,
    })?;
    Ok(HandoffCreateResult {
        path: note.path.to_string_lossy().into_owned(),
        id: note.frontmatter.id,
        previous_handoff: note.frontmatter.extra.get("previous_handoff").cloned(),
    })
}

#[derive(Debug, Serialize)]
pub struct NoteShowResult {
    pub path: String,
    pub frontmatter: crate::models::Frontmatter,
    pub body: String,
}

impl CommandResult for NoteShowResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let title = self.frontmatter.title().unwrap_or("(untitled)");
        format!(
            "{} [{}] {}\n\n{}",
            self.path, self.frontmatter.note_type, title, self.body
        )
    }
}

pub fn handoff_latest(settings: &Settings) -> Result<NoteShowResult> {
    let vault = open_vault(settings)?;
    let note = vault.latest_handoff()?;
    Ok(NoteShowResult {
        path: note.path.to_string_lossy().into_owned(),
        frontmatter: note.frontmatter,
        body: note.body,
    })
}

// === Sessions ===

#[derive(Debug, Serialize)]
pub struct SessionStartResult {
    pub path: String,
    pub session_id: Uuid,
}

impl CommandResult for SessionStartResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        format!("Started session {}\n  note: {}", self.session_id, self.path)
    }
}

pub fn session_start(
    settings: &Settings,
    title: String,
    tags: Vec<String>,
) -> Result<SessionStartResult> {
    let vault = init_vault(settings)?;
    let note = vault.create_session(&title, tags)?;
    Ok(SessionStartResult {
        path: note.path.to_string_lossy().into_owned(),
        session_id: note.frontmatter.id,
    })
}

// === Phases ===

#[derive(Debug, Serialize)]
pub struct PhaseResult {
    pub phase_id: String,
    pub path: String,
    pub status: String,
}

impl CommandResult for PhaseResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        format!("Phase {} [{}] at {}", self.phase_id, self.status, self.path)
    }
}

pub fn phase_create(
    settings: &Settings,
    id: String,
    title: String,
    goal: Option<String>,
) -> Result<PhaseResult> {
    let vault = init_vault(settings)?;
    let note = vault.create_phase(&id, &title, goal.as_deref())?;
    Ok(PhaseResult {
        phase_id: note.frontmatter.phase_id.clone().unwrap_or_default(),
        path: note.path.to_string_lossy().into_owned(),
        status: note.frontmatter.status,
    })
}

pub fn phase_activate(settings: &Settings, id: String) -> Result<PhaseResult> {
    let vault = open_vault(settings)?;
    let router = BackendRouter::new(&vault, settings.backend_command.as_deref());
    let id = slugify(&id);
    let rel = vault.phase_dir(&id).join("phase.md");
    let mut note = router.read(&rel)?;
    note.frontmatter.status = "active".to_string();
    // Plugins never service updates; this always routes to direct file I/O.
    let note = router.update(&rel, &note.frontmatter, &note.body)?;
    tracker(settings).set_active_phase(&id)?;
    Ok(PhaseResult {
        phase_id: id,
        path: note.path.to_string_lossy().into_owned(),
        status: note.frontmatter.status,
    })
}

// === Research ===

pub fn research_add(
    settings: &Settings,
    title: String,
    body: String,
    phase: Option<String>,
) -> Result<NoteShowResult> {
    let vault = init_vault(settings)?;
    let router = BackendRouter::new(&vault, settings.backend_command.as_deref());
    let (rel, fm) = vault.prepare_research(&title, phase.as_deref())?;
    let note = router.create(&rel, &fm, &body)?;
    Ok(NoteShowResult {
        path: note.path.to_string_lossy().into_owned(),
        frontmatter: note.frontmatter,
        body: note.body,
    })
}

// === Raw notes ===

pub fn note_show(settings: &Settings, path: String) -> Result<NoteShowResult> {
    let vault = open_vault(settings)?;
    let router = BackendRouter::new(&vault, settings.backend_command.as_deref());
    let note = router.read(Path::new(&path))?;
    Ok(NoteShowResult {
        path: note.path.to_string_lossy().into_owned(),
        frontmatter: note.frontmatter,
        body: note.body,
    })
}

#[derive(Debug, Serialize)]
pub struct NoteListResult {
    pub count: usize,
    pub paths: Vec<String>,
}

impl CommandResult for NoteListResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        if self.paths.is_empty() {
            return "No notes found.".to_string();
        }
        self.paths.join("\n")
    }
}

pub fn note_list(
    settings: &Settings,
    dir: String,
    recursive: bool,
    type_filter: Option<String>,
) -> Result<NoteListResult> {
    let vault = open_vault(settings)?;
    let type_filter = type_filter
        .map(|t| NoteType::from_str(&t).map_err(Error::InvalidInput))
        .transpose()?;
    let router = BackendRouter::new(&vault, settings.backend_command.as_deref());
    let paths = router.list(
        Path::new(&dir),
        ListOptions {
            recursive,
            type_filter,
        },
    )?;
    Ok(NoteListResult {
        count: paths.len(),
        paths: paths
            .into_iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect(),
    })
}

// === Search ===

#[derive(Debug, Serialize)]
pub struct SearchResult {
    pub count: usize,
    pub matches: Vec<SearchMatch>,
}

impl CommandResult for SearchResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        if self.matches.is_empty() {
            return "No matches found.".to_string();
        }
        self.matches
            .iter()
            .map(|m| format!("{} ({} matches)\n  {}", m.path, m.match_count, m.preview))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub fn search_notes(
    settings: &Settings,
    query: String,
    dir: String,
    case_sensitive: bool,
    no_recursive: bool,
) -> Result<SearchResult> {
    let vault = open_vault(settings)?;
    let matches = search::search(
        &vault,
        Path::new(&dir),
        &query,
        SearchOptions {
            case_sensitive,
            recursive: !no_recursive,
        },
    )?;
    Ok(SearchResult {
        count: matches.len(),
        matches,
    })
}

// === Indexes ===

impl CommandResult for RegenerateOutcome {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        format!(
            "Regenerated indexes: {} handoffs, {} sessions, {} phases{}",
            self.handoff_count,
            self.session_count,
            self.phase_count,
            if self.latest_handoff_rebuilt {
                " (latest-handoff rebuilt)"
            } else {
                ""
            }
        )
    }
}

pub fn index_regenerate(settings: &Settings) -> Result<RegenerateOutcome> {
    let vault = init_vault(settings)?;
    index::regenerate(&vault)
}

// === Prune ===

impl CommandResult for PruneOutcome {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let mode = if self.dry_run { " (dry run)" } else { "" };
        format!(
            "Prune{}: {} candidates, {} deleted, {} errors",
            mode, self.summary.candidates, self.summary.deleted, self.summary.errors
        )
    }
}

pub fn prune_run(
    settings: &Settings,
    days: Option<i64>,
    dry_run: bool,
    folders: Vec<String>,
) -> Result<PruneOutcome> {
    let vault = open_vault(settings)?;
    let days = validate_days(days, settings)?;
    let folders = if folders.is_empty() {
        vec!["handoffs".to_string(), "sessions".to_string()]
    } else {
        folders
    };
    prune::prune(
        &vault,
        &PruneOptions {
            days,
            dry_run,
            folders,
        },
    )
}

pub fn prune_research_run(
    settings: &Settings,
    days: Option<i64>,
    dry_run: bool,
    phase: Option<String>,
) -> Result<PruneOutcome> {
    let vault = open_vault(settings)?;
    let days = validate_days(days, settings)?;
    prune::prune_research(&vault, days, dry_run, phase.as_deref())
}

fn validate_days(days: Option<i64>, settings: &Settings) -> Result<i64> {
    let days = days.unwrap_or(settings.prune_days);
    if days < 0 {
        return Err(Error::InvalidInput(format!("--days must be >= 0, got {days}")));
    }
    Ok(days)
}

// === Tracker ===

#[derive(Debug, Serialize)]
pub struct TrackerResult {
    pub state: TrackerState,
}

impl CommandResult for TrackerResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let s = &self.state;
        format!(
            "Tracker state (updated {})\n  active phase: {}\n  current session: {}\n  latest handoff: {}",
            s.updated_at.to_rfc3339(),
            s.active_phase_id.as_deref().unwrap_or("-"),
            s.current_session_id
                .map(|id| id.to_string())
                .unwrap_or_else(|| "-".to_string()),
            s.latest_handoff_path.as_deref().unwrap_or("-"),
        )
    }
}

pub fn tracker_show(settings: &Settings) -> Result<TrackerResult> {
    let state = tracker(settings).read()?;
    Ok(TrackerResult { state })
}

pub fn tracker_set_phase(settings: &Settings, id: String) -> Result<TrackerResult> {
    init_vault(settings)?;
    let state = tracker(settings).set_active_phase(&slugify(&id))?;
    Ok(TrackerResult { state })
}

pub fn tracker_set_session(settings: &Settings, id: Uuid) -> Result<TrackerResult> {
    init_vault(settings)?;
    let state = tracker(settings).set_session(id)?;
    Ok(TrackerResult { state })
}

// === Version ===

#[derive(Debug, Serialize)]
pub struct VersionResult {
    pub version: &'static str,
    pub build_timestamp: &'static str,
    pub git_commit: &'static str,
}

impl CommandResult for VersionResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        format!(
            "lbk {} (commit {}, built {})",
            self.version, self.git_commit, self.build_timestamp
        )
    }
}

pub fn version() -> VersionResult {
    VersionResult {
        version: env!("CARGO_PKG_VERSION"),
        build_timestamp: env!("LBK_BUILD_TIMESTAMP"),
        git_commit: env!("LBK_GIT_COMMIT"),
    }
}
