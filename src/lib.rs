//! Logbook - a session-context vault for automation tools and humans.
//!
//! This library provides the core functionality for the `lbk` CLI tool:
//! a directory of Markdown notes with structured frontmatter used to carry
//! work-session context (handoffs, sessions, phases) across invocations.

pub mod cli;
pub mod commands;
pub mod config;
pub mod frontmatter;
pub mod index;
pub mod models;
pub mod prune;
pub mod search;
pub mod storage;
pub mod tracker;


/// Library-level error type for Logbook operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("tracker state is busy")]
    LockTimeout,
}

/// Result type alias for Logbook operations.
pub type Result<T> = std::result::Result<T, Error>;
