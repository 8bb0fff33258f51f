//! Configuration for the `lbk` CLI.
//!
//! Settings come from a TOML file with a simple precedence chain:
//! CLI flag > environment variable > config file > built-in default.
//! The config file lives at `~/.config/logbook/config.toml` and can be
//! relocated with `LOGBOOK_CONFIG` (used by tests). A missing or malformed
//! file never blocks an operation; it degrades to defaults with a warning.

use std::fs;
use std::path::PathBuf;

use serde::Deserialize;
use tracing::warn;

pub const DEFAULT_PRUNE_DAYS: i64 = 30;

/// On-disk config file schema. All fields optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// Vault root directory
    pub vault: Option<PathBuf>,

    /// External note-management command (probed at runtime)
    pub backend_command: Option<String>,

    /// Default `--days` for prune commands
    pub prune_days: Option<i64>,
}

/// Fully resolved settings for one invocation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub vault: PathBuf,
    pub backend_command: Option<String>,
    pub prune_days: i64,
}

/// Path of the config file: `LOGBOOK_CONFIG` override, else the platform
/// config directory.
pub fn config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("LOGBOOK_CONFIG") {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir().map(|dir| dir.join("logbook").join("config.toml"))
}

/// Load the config file, degrading to defaults on any failure.
pub fn load_file() -> FileConfig {
    let Some(path) = config_path() else {
        return FileConfig::default();
    };
    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return FileConfig::default(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to read config file");
            return FileConfig::default();
        }
    };
    match toml::from_str(&content) {
        Ok(config) => config,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "malformed config file, using defaults");
            FileConfig::default()
        }
    }
}

/// Resolve settings for this invocation.
///
/// `flag_vault` already folds in the `LOGBOOK_VAULT` environment variable
/// (clap's `env` attribute), so the chain here is flag/env > file > default.
pub fn resolve(flag_vault: Option<PathBuf>) -> Settings {
    let file = load_file();
    let vault = flag_vault
        .or(file.vault)
        .unwrap_or_else(default_vault_dir);
    Settings {
        vault,
        backend_command: file.backend_command,
        prune_days: file.prune_days.unwrap_or(DEFAULT_PRUNE_DAYS),
    }
}

fn default_vault_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("logbook")
        .join("vault")
}
