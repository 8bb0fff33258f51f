//! Data models for Logbook entities.
//!
//! This module defines the core data structures:
//! - `NoteType` - The kind of note a file holds
//! - `Frontmatter` - The structured metadata header of a note
//! - `Note` - A parsed note: frontmatter, body, and the path it came from
//! - `TrackerState` - The small shared document of active-phase/session/handoff pointers

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::frontmatter::now_second;

/// The kind of note a file holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteType {
    #[default]
    Handoff,
    Session,
    Phase,
    Research,
    Greenfield,
    Brownfield,
    /// Derived summary documents (catalog, phase-summary, latest-handoff)
    Index,
}

impl NoteType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoteType::Handoff => "handoff",
            NoteType::Session => "session",
            NoteType::Phase => "phase",
            NoteType::Research => "research",
            NoteType::Greenfield => "greenfield",
            NoteType::Brownfield => "brownfield",
            NoteType::Index => "index",
        }
    }
}

impl fmt::Display for NoteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NoteType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "handoff" => Ok(NoteType::Handoff),
            "session" => Ok(NoteType::Session),
            "phase" => Ok(NoteType::Phase),
            "research" => Ok(NoteType::Research),
            "greenfield" => Ok(NoteType::Greenfield),
            "brownfield" => Ok(NoteType::Brownfield),
            "index" => Ok(NoteType::Index),
            other => Err(format!("unknown note type: {other}")),
        }
    }
}

/// Structured metadata header of a note.
///
/// The `id` is the durable identity of a note; the file path is derived and
/// may change if a file is renamed externally (which breaks `links` and
/// `previous_handoff` resolution - a documented limitation).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Frontmatter {
    /// Unique identifier
    pub id: Uuid,

    /// Note kind
    #[serde(rename = "type")]
    pub note_type: NoteType,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,

    /// Session this note belongs to, if any
    pub session_id: Option<Uuid>,

    /// Phase this note belongs to, if any
    pub phase_id: Option<String>,

    /// Free-form workflow status (e.g. "active", "completed")
    pub status: String,

    /// Tags for categorization, order preserved
    pub tags: Vec<String>,

    /// Paths of related notes, order preserved
    pub links: Vec<String>,

    /// Type-specific extra fields (title, goal, previous_handoff, handoff_path, ...)
    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
}

impl Frontmatter {
    /// Create frontmatter for a new note with a fresh id and timestamps.
    ///
    /// Timestamps are truncated to whole seconds, the resolution the header
    /// carries on disk, so a freshly created note reads back field-for-field.
    pub fn new(note_type: NoteType) -> Self {
        let now = now_second();
        Self {
            id: Uuid::new_v4(),
            note_type,
            created_at: now,
            updated_at: now,
            session_id: None,
            phase_id: None,
            status: "active".to_string(),
            tags: Vec::new(),
            links: Vec::new(),
            extra: BTreeMap::new(),
        }
    }

    /// Convenience accessor for the `title` extra field.
    pub fn title(&self) -> Option<&str> {
        self.extra.get("title").map(String::as_str)
    }
}

impl Default for Frontmatter {
    /// Empty metadata, used when a file's header is missing or malformed.
    fn default() -> Self {
        Self {
            id: Uuid::nil(),
            note_type: NoteType::default(),
            created_at: DateTime::<Utc>::UNIX_EPOCH,
            updated_at: DateTime::<Utc>::UNIX_EPOCH,
            session_id: None,
            phase_id: None,
            status: String::new(),
            tags: Vec::new(),
            links: Vec::new(),
            extra: BTreeMap::new(),
        }
    }
}

/// A note materialized from the vault.
#[derive(Debug, Clone, Serialize)]
pub struct Note {
    /// Path relative to the vault root
    pub path: PathBuf,

    /// Parsed metadata header (empty if the header was malformed)
    pub frontmatter: Frontmatter,

    /// Markdown body below the header
    pub body: String,
}

/// Shared pointers to the currently active phase, session, and latest handoff.
///
/// One JSON document per vault, mutated only under the tracker lock.
/// `updated_at` is refreshed on every save and is the only ordering signal
/// available to readers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerState {
    /// Schema version
    pub version: u32,

    /// Refreshed on every save
    pub updated_at: DateTime<Utc>,

    pub active_phase_id: Option<String>,
    pub current_session_id: Option<Uuid>,
    pub latest_handoff_path: Option<String>,
    pub latest_handoff_id: Option<Uuid>,
}

impl TrackerState {
    pub const CURRENT_VERSION: u32 = 1;
}

impl Default for TrackerState {
    fn default() -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            updated_at: Utc::now(),
            active_phase_id: None,
            current_session_id: None,
            latest_handoff_path: None,
            latest_handoff_id: None,
        }
    }
}
