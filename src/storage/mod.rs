//! Note storage for a Logbook vault.
//!
//! The vault directory tree is the sole source of truth; no in-memory cache
//! persists across invocations. Layout:
//!
//! - `handoffs/YYYY/MM/` - top-level handoff notes
//! - `sessions/YYYY/MM/` - session notes
//! - `phases/<id>/{phase.md, research/, execution/, handoffs/}` - phase subtrees
//! - `indexes/` - derived documents plus the tracker state and its lock
//! - `templates/` - user-provided note templates
//!
//! Filenames encode creation time to one-second resolution:
//! `YYYYMMDD-HHmmssZ--<type>--<scope>--<slug>.md`. The convention is not
//! injective (two notes created within the same second with identical type,
//! scope, and slug collide, last writer wins); the frontmatter `id` is the
//! durable identity.

pub mod backend;

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::frontmatter::{self, now_second};
use crate::models::{Frontmatter, Note, NoteType};
use crate::tracker::TrackerStore;
use crate::{Error, Result};

pub const HANDOFFS_DIR: &str = "handoffs";
pub const SESSIONS_DIR: &str = "sessions";
pub const PHASES_DIR: &str = "phases";
pub const INDEXES_DIR: &str = "indexes";
pub const TEMPLATES_DIR: &str = "templates";

pub const LATEST_HANDOFF_INDEX: &str = "indexes/latest-handoff.md";
pub const CATALOG_INDEX: &str = "indexes/catalog.md";
pub const PHASE_SUMMARY_INDEX: &str = "indexes/phase-summary.md";

/// File metadata reported by [`Vault::stat`].
#[derive(Debug, Clone, Copy, Serialize)]
pub struct FileStat {
    pub mtime: DateTime<Utc>,
    pub size: u64,
}

/// Options for [`Vault::list`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ListOptions {
    pub recursive: bool,
    pub type_filter: Option<NoteType>,
}

/// Inputs for handoff creation.
#[derive(Debug, Clone, Default)]
pub struct HandoffOptions {
    pub title: String,
    pub body: String,
    pub phase_id: Option<String>,
    pub session_id: Option<Uuid>,
    pub tags: Vec<String>,
}

/// A well-formed filename decomposed into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFilename {
    pub timestamp: DateTime<Utc>,
    pub note_type: NoteType,
    pub scope: String,
    pub slug: String,
}

/// Storage manager for a single vault.
pub struct Vault {
    /// Root directory of the vault
    pub root: PathBuf,
}

impl Vault {
    /// Open an existing vault.
    pub fn open(root: &Path) -> Result<Self> {
        if !root.is_dir() {
            return Err(Error::NotFound(format!("vault: {}", root.display())));
        }
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    /// Open a vault, creating the directory layout if needed. Idempotent.
    pub fn init(root: &Path) -> Result<Self> {
        for dir in [
            HANDOFFS_DIR,
            SESSIONS_DIR,
            PHASES_DIR,
            INDEXES_DIR,
            TEMPLATES_DIR,
        ] {
            fs::create_dir_all(root.join(dir))?;
        }
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    /// Absolute path for a vault-relative path.
    pub fn abs(&self, rel: impl AsRef<Path>) -> PathBuf {
        self.root.join(rel)
    }

    fn tracker(&self) -> TrackerStore {
        TrackerStore::new(&self.abs(INDEXES_DIR))
    }

    // === Core operations ===

    /// Write a new note, creating parent directories as needed.
    ///
    /// Fails with a validation error if required frontmatter fields are
    /// missing after defaulting.
    pub fn create(&self, rel: &Path, frontmatter: &Frontmatter, body: &str) -> Result<Note> {
        validate(frontmatter)?;
        let path = self.abs(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, frontmatter::serialize(frontmatter, body))?;
        Ok(Note {
            path: rel.to_path_buf(),
            frontmatter: frontmatter.clone(),
            body: body.to_string(),
        })
    }

    /// Read a note. A malformed header parses leniently to empty metadata;
    /// an absent file is an error.
    pub fn read(&self, rel: &Path) -> Result<Note> {
        let path = self.abs(rel);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::NotFound(format!("note: {}", rel.display())));
            }
            Err(e) => return Err(e.into()),
        };
        let (fm, body) = frontmatter::parse(&content);
        Ok(Note {
            path: rel.to_path_buf(),
            frontmatter: fm,
            body,
        })
    }

    /// Overwrite an existing note, refreshing `updated_at`.
    pub fn update(&self, rel: &Path, frontmatter: &Frontmatter, body: &str) -> Result<Note> {
        if !self.exists(rel) {
            return Err(Error::NotFound(format!("note: {}", rel.display())));
        }
        let mut fm = frontmatter.clone();
        fm.updated_at = now_second();
        validate(&fm)?;
        fs::write(self.abs(rel), frontmatter::serialize(&fm, body))?;
        Ok(Note {
            path: rel.to_path_buf(),
            frontmatter: fm,
            body: body.to_string(),
        })
    }

    pub fn exists(&self, rel: &Path) -> bool {
        self.abs(rel).is_file()
    }

    pub fn stat(&self, rel: &Path) -> Result<FileStat> {
        let meta = match fs::metadata(self.abs(rel)) {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::NotFound(format!("note: {}", rel.display())));
            }
            Err(e) => return Err(e.into()),
        };
        Ok(FileStat {
            mtime: meta.modified()?.into(),
            size: meta.len(),
        })
    }

    /// List note paths under a vault-relative directory, sorted by name.
    ///
    /// A missing directory lists as empty rather than erroring, so callers
    /// can scan layout directories that have not been populated yet.
    pub fn list(&self, dir: &Path, opts: ListOptions) -> Result<Vec<PathBuf>> {
        let mut out = Vec::new();
        self.collect_notes(dir, opts.recursive, &mut out)?;
        if let Some(filter) = opts.type_filter {
            out.retain(|rel| self.note_type_of(rel) == Some(filter));
        }
        Ok(out)
    }

    fn collect_notes(&self, dir: &Path, recursive: bool, out: &mut Vec<PathBuf>) -> Result<()> {
        let abs = self.abs(dir);
        let entries = match fs::read_dir(&abs) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        let mut names: Vec<_> = entries.filter_map(|e| e.ok()).collect();
        names.sort_by_key(|e| e.file_name());
        for entry in names {
            let rel = dir.join(entry.file_name());
            let ftype = entry.file_type()?;
            if ftype.is_dir() {
                if recursive {
                    self.collect_notes(&rel, true, out)?;
                }
            } else if rel.extension().is_some_and(|ext| ext == "md") {
                out.push(rel);
            }
        }
        Ok(())
    }

    /// Determine a note's type from its filename, falling back to a lenient
    /// frontmatter read for files outside the naming convention (phase.md,
    /// index documents).
    fn note_type_of(&self, rel: &Path) -> Option<NoteType> {
        let name = rel.file_name()?.to_str()?;
        if let Some(parsed) = parse_filename(name) {
            return Some(parsed.note_type);
        }
        self.read(rel).ok().map(|n| n.frontmatter.note_type)
    }

    // === Directory layout ===

    /// `handoffs/YYYY/MM/` for the given moment.
    pub fn handoffs_dir(&self, now: DateTime<Utc>) -> PathBuf {
        dated_dir(HANDOFFS_DIR, now)
    }

    /// `sessions/YYYY/MM/` for the given moment.
    pub fn sessions_dir(&self, now: DateTime<Utc>) -> PathBuf {
        dated_dir(SESSIONS_DIR, now)
    }

    pub fn phase_dir(&self, phase_id: &str) -> PathBuf {
        Path::new(PHASES_DIR).join(phase_id)
    }

    /// Phase ids, derived from the `phases/` directory listing.
    pub fn phase_ids(&self) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        let entries = match fs::read_dir(self.abs(PHASES_DIR)) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ids),
            Err(e) => return Err(e.into()),
        };
        for entry in entries.filter_map(|e| e.ok()) {
            if entry.file_type()?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    ids.push(name.to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    // === Creation flows ===

    /// Create a handoff note, chain it to the previous latest handoff, and
    /// advance the latest-handoff pointers.
    ///
    /// The note and the latest-handoff index are two sequential writes, not a
    /// transaction; a crash between them leaves the index stale until the next
    /// `index regenerate`.
    pub fn create_handoff(&self, opts: HandoffOptions) -> Result<Note> {
        let now = now_second();
        let previous = self.latest_handoff_pointer();

        let mut fm = Frontmatter::new(NoteType::Handoff);
        fm.created_at = now;
        fm.updated_at = now;
        fm.session_id = opts.session_id;
        fm.phase_id = opts.phase_id.clone();
        fm.tags = opts.tags;
        fm.extra.insert("title".to_string(), opts.title.clone());

        let mut body = opts.body;
        if let Some((prev_path, prev_id)) = &previous {
            fm.extra
                .insert("previous_handoff".to_string(), prev_id.to_string());
            fm.links.push(prev_path.clone());
            let basename = Path::new(prev_path)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| prev_path.clone());
            if !body.is_empty() {
                body.push_str("\n\n");
            }
            body.push_str(&format!("Continues from: {basename}\n"));
        }

        let scope = match (&opts.phase_id, &opts.session_id) {
            (Some(phase), _) => phase.clone(),
            (None, Some(session)) => {
                format!("session-{}", &session.simple().to_string()[..8])
            }
            (None, None) => "general".to_string(),
        };
        let dir = match &opts.phase_id {
            Some(phase) => self.phase_dir(phase).join(HANDOFFS_DIR),
            None => self.handoffs_dir(now),
        };
        let filename = generate_filename(NoteType::Handoff, &scope, &opts.title, now);
        let rel = dir.join(filename);

        let note = self.create(&rel, &fm, &body)?;
        self.write_latest_handoff_index(&note)?;

        // Pointer update is best-effort: the note and index are already
        // durable, and the tracker is repaired by the next successful write.
        if let Err(e) = self
            .tracker()
            .record_handoff(&note.path.to_string_lossy(), fm.id)
        {
            warn!(error = %e, "failed to record handoff in tracker state");
        }
        Ok(note)
    }

    /// Create a session note and mark it as the current session.
    pub fn create_session(&self, title: &str, tags: Vec<String>) -> Result<Note> {
        let now = now_second();
        let mut fm = Frontmatter::new(NoteType::Session);
        fm.created_at = now;
        fm.updated_at = now;
        let session_id = fm.id;
        fm.session_id = Some(session_id);
        fm.tags = tags;
        fm.extra.insert("title".to_string(), title.to_string());

        let scope = format!("session-{}", &session_id.simple().to_string()[..8]);
        let rel = self
            .sessions_dir(now)
            .join(generate_filename(NoteType::Session, &scope, title, now));
        let note = self.create(&rel, &fm, "")?;

        if let Err(e) = self.tracker().set_session(session_id) {
            warn!(error = %e, "failed to record session in tracker state");
        }
        Ok(note)
    }

    /// Create a phase subtree with its `phase.md` root note.
    pub fn create_phase(&self, phase_id: &str, title: &str, goal: Option<&str>) -> Result<Note> {
        let phase_id = slugify(phase_id);
        if phase_id.is_empty() {
            return Err(Error::Validation("phase id must not be empty".to_string()));
        }
        let dir = self.phase_dir(&phase_id);
        if self.exists(&dir.join("phase.md")) {
            return Err(Error::Validation(format!("phase already exists: {phase_id}")));
        }
        for sub in ["research", "execution", HANDOFFS_DIR] {
            fs::create_dir_all(self.abs(dir.join(sub)))?;
        }

        let now = now_second();
        let mut fm = Frontmatter::new(NoteType::Phase);
        fm.created_at = now;
        fm.updated_at = now;
        fm.phase_id = Some(phase_id.clone());
        fm.status = "planned".to_string();
        fm.extra.insert("title".to_string(), title.to_string());
        if let Some(goal) = goal {
            fm.extra.insert("goal".to_string(), goal.to_string());
        }
        self.create(&dir.join("phase.md"), &fm, "")
    }

    /// Resolve the owning phase and lay out a research note's path and header.
    ///
    /// Phase-scoped notes always carry the owning phase's id. The caller picks
    /// the backend that performs the final write.
    pub fn prepare_research(
        &self,
        title: &str,
        explicit_phase: Option<&str>,
    ) -> Result<(PathBuf, Frontmatter)> {
        let Some(phase_id) = self.tracker().resolve_phase_id(explicit_phase)? else {
            return Err(Error::Validation(
                "no phase given and no active phase recorded".to_string(),
            ));
        };
        if !self.exists(&self.phase_dir(&phase_id).join("phase.md")) {
            return Err(Error::NotFound(format!("phase: {phase_id}")));
        }

        let now = now_second();
        let mut fm = Frontmatter::new(NoteType::Research);
        fm.created_at = now;
        fm.updated_at = now;
        fm.phase_id = Some(phase_id.clone());
        fm.extra.insert("title".to_string(), title.to_string());

        let rel = self
            .phase_dir(&phase_id)
            .join("research")
            .join(generate_filename(NoteType::Research, &phase_id, title, now));
        Ok((rel, fm))
    }

    /// Create a research note under a phase's `research/` directory.
    pub fn create_research(
        &self,
        title: &str,
        body: &str,
        explicit_phase: Option<&str>,
    ) -> Result<Note> {
        let (rel, fm) = self.prepare_research(title, explicit_phase)?;
        self.create(&rel, &fm, body)
    }

    // === Latest-handoff index ===

    /// The (path, id) of the most recent handoff, from the latest-handoff
    /// index with the tracker pointer as fallback.
    pub fn latest_handoff_pointer(&self) -> Option<(String, Uuid)> {
        if let Ok(index) = self.read(Path::new(LATEST_HANDOFF_INDEX)) {
            let path = index.frontmatter.extra.get("handoff_path").cloned();
            let id = index
                .frontmatter
                .extra
                .get("handoff_id")
                .and_then(|v| Uuid::parse_str(v).ok());
            if let (Some(path), Some(id)) = (path, id) {
                return Some((path, id));
            }
        }
        let state = self.tracker().read().ok()?;
        Some((state.latest_handoff_path?, state.latest_handoff_id?))
    }

    /// Read the note the latest-handoff index points at.
    pub fn latest_handoff(&self) -> Result<Note> {
        let Some((path, _)) = self.latest_handoff_pointer() else {
            return Err(Error::NotFound("no handoff recorded yet".to_string()));
        };
        self.read(Path::new(&path))
    }

    /// Rewrite `indexes/latest-handoff.md` to point at the given handoff.
    pub fn write_latest_handoff_index(&self, handoff: &Note) -> Result<()> {
        let rel = Path::new(LATEST_HANDOFF_INDEX);
        let now = now_second();
        let mut fm = match self.read(rel) {
            Ok(existing) if !existing.frontmatter.id.is_nil() => {
                let mut fm = existing.frontmatter;
                fm.updated_at = now;
                fm.links.clear();
                fm.extra.clear();
                fm
            }
            _ => {
                let mut fm = Frontmatter::new(NoteType::Index);
                fm.created_at = now;
                fm.updated_at = now;
                fm
            }
        };
        fm.note_type = NoteType::Index;
        fm.status = "generated".to_string();
        let path = handoff.path.to_string_lossy().into_owned();
        fm.links.push(path.clone());
        fm.extra.insert("handoff_path".to_string(), path.clone());
        fm.extra
            .insert("handoff_id".to_string(), handoff.frontmatter.id.to_string());
        let title = handoff.frontmatter.title().unwrap_or("(untitled)");
        let body = format!("# Latest Handoff\n\n- {path}: {title}\n");
        self.create(rel, &fm, &body).map(|_| ())
    }
}

fn dated_dir(base: &str, now: DateTime<Utc>) -> PathBuf {
    Path::new(base)
        .join(now.format("%Y").to_string())
        .join(now.format("%m").to_string())
}

fn validate(fm: &Frontmatter) -> Result<()> {
    if fm.id.is_nil() {
        return Err(Error::Validation("frontmatter is missing an id".to_string()));
    }
    if fm.status.is_empty() {
        return Err(Error::Validation("frontmatter is missing a status".to_string()));
    }
    if fm.created_at == DateTime::<Utc>::UNIX_EPOCH {
        return Err(Error::Validation(
            "frontmatter is missing a creation timestamp".to_string(),
        ));
    }
    Ok(())
}

/// Collapse a string to a lowercase hyphenated slug.
///
/// Runs of non-alphanumeric characters become a single hyphen; leading and
/// trailing hyphens are stripped. Not injective.
pub fn slugify(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut pending_hyphen = false;
    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !out.is_empty() {
                out.push('-');
            }
            pending_hyphen = false;
            out.push(c.to_ascii_lowercase());
        } else {
            pending_hyphen = true;
        }
    }
    out
}

/// Build a note filename: `YYYYMMDD-HHmmssZ--<type>--<scope>--<slug>.md`.
pub fn generate_filename(
    note_type: NoteType,
    scope: &str,
    slug: &str,
    now: DateTime<Utc>,
) -> String {
    format!(
        "{}--{}--{}--{}.md",
        now.format("%Y%m%d-%H%M%SZ"),
        note_type,
        slugify(scope),
        slugify(slug),
    )
}

/// Decompose a well-formed filename; malformed names return `None`.
pub fn parse_filename(name: &str) -> Option<ParsedFilename> {
    let stem = name.strip_suffix(".md")?;
    let mut parts = stem.split("--");
    let stamp = parts.next()?;
    let note_type = NoteType::from_str(parts.next()?).ok()?;
    let scope = parts.next()?;
    let slug = parts.next()?;
    if parts.next().is_some() || scope.is_empty() || slug.is_empty() {
        return None;
    }
    let naive = NaiveDateTime::parse_from_str(stamp, "%Y%m%d-%H%M%SZ").ok()?;
    Some(ParsedFilename {
        timestamp: naive.and_utc(),
        note_type,
        scope: scope.to_string(),
        slug: slug.to_string(),
    })
}
