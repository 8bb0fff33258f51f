//! CLI argument definitions for Logbook.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Logbook - a session-context vault for automation tools and humans.
///
/// Notes (handoffs, sessions, phases, research) live as Markdown files with
/// structured frontmatter under a single vault directory.
#[derive(Parser, Debug)]
#[command(name = "lbk")]
#[command(author, version, about = "A CLI vault of Markdown notes for work-session continuity", long_about = None)]
pub struct Cli {
    /// Output in human-readable format instead of JSON
    #[arg(short = 'H', long = "human", global = true)]
    pub human_readable: bool,

    /// Vault directory to operate on.
    /// Can also be set via LOGBOOK_VAULT environment variable.
    #[arg(long = "vault", global = true, env = "LOGBOOK_VAULT")]
    pub vault: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Handoff notes (work-state capture for session continuity)
    Handoff {
        #[command(subcommand)]
        command: HandoffCommands,
    },

    /// Session notes
    Session {
        #[command(subcommand)]
        command: SessionCommands,
    },

    /// Phases (named units of work with their own research/handoff subtrees)
    Phase {
        #[command(subcommand)]
        command: PhaseCommands,
    },

    /// Research notes under a phase
    Research {
        #[command(subcommand)]
        command: ResearchCommands,
    },

    /// Raw note access
    Note {
        #[command(subcommand)]
        command: NoteCommands,
    },

    /// Scan note bodies for a literal substring
    Search {
        /// Text to search for (matched literally)
        query: String,

        /// Vault-relative directory to scan
        #[arg(long, default_value = "")]
        dir: String,

        /// Match case exactly
        #[arg(long)]
        case_sensitive: bool,

        /// Do not descend into subdirectories
        #[arg(long)]
        no_recursive: bool,
    },

    /// Derived index documents
    Index {
        #[command(subcommand)]
        command: IndexCommands,
    },

    /// Delete notes older than a cutoff
    Prune {
        /// Age threshold in days (0 = prune everything up to now)
        #[arg(long)]
        days: Option<i64>,

        /// Report candidates without deleting
        #[arg(long)]
        dry_run: bool,

        /// Vault-relative folder to scan (repeatable; default: handoffs, sessions)
        #[arg(long = "folder")]
        folders: Vec<String>,
    },

    /// Delete old research notes from phase subtrees
    PruneResearch {
        /// Age threshold in days (0 = prune everything up to now)
        #[arg(long)]
        days: Option<i64>,

        /// Report candidates without deleting
        #[arg(long)]
        dry_run: bool,

        /// Restrict to one phase
        #[arg(long)]
        phase: Option<String>,
    },

    /// The shared tracker state (active phase, session, latest handoff)
    Tracker {
        #[command(subcommand)]
        command: TrackerCommands,
    },

    /// Show version and build information
    Version,
}

#[derive(Subcommand, Debug)]
pub enum HandoffCommands {
    /// Create a handoff note, chained to the previous latest handoff
    Create {
        /// Handoff title
        title: String,

        /// Markdown body
        #[arg(long, default_value = "")]
        body: String,

        /// Owning phase (stores the note under the phase's handoffs/)
        #[arg(long)]
        phase: Option<String>,

        /// Session this handoff belongs to
        #[arg(long)]
        session: Option<uuid::Uuid>,

        /// Tag to attach (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,
    },

    /// Show the most recent handoff system-wide
    Latest,
}

#[derive(Subcommand, Debug)]
pub enum SessionCommands {
    /// Create a session note and mark it current
    Start {
        /// Session title
        title: String,

        /// Tag to attach (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum PhaseCommands {
    /// Create a phase subtree with its root note
    Create {
        /// Phase id (slugged)
        id: String,

        /// Phase title
        title: String,

        /// Goal statement
        #[arg(long)]
        goal: Option<String>,
    },

    /// Mark a phase as the active one
    Activate {
        /// Phase id
        id: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum ResearchCommands {
    /// Add a research note to a phase (active phase if --phase omitted)
    Add {
        /// Research title
        title: String,

        /// Markdown body
        #[arg(long, default_value = "")]
        body: String,

        /// Owning phase (defaults to the tracker's active phase)
        #[arg(long)]
        phase: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum NoteCommands {
    /// Show one note (frontmatter and body)
    Show {
        /// Vault-relative path
        path: String,
    },

    /// List note paths under a directory
    List {
        /// Vault-relative directory
        #[arg(default_value = "")]
        dir: String,

        /// Descend into subdirectories
        #[arg(long)]
        recursive: bool,

        /// Only notes of this type
        #[arg(long = "type")]
        type_filter: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum IndexCommands {
    /// Rebuild catalog and phase-summary from a fresh scan
    Regenerate,
}

#[derive(Subcommand, Debug)]
pub enum TrackerCommands {
    /// Print the tracker state
    Show,

    /// Set the active phase pointer
    SetPhase {
        /// Phase id
        id: String,
    },

    /// Set the current session pointer
    SetSession {
        /// Session id
        id: uuid::Uuid,
    },
}
