//! Prune: age-based deletion of old notes with dry-run support.
//!
//! Every candidate is attempted independently; a failed deletion is recorded
//! in the result and never aborts the rest of the batch.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::debug;

use crate::storage::{ListOptions, Vault};
use crate::{Error, Result};

/// Options for a prune pass over vault folders.
#[derive(Debug, Clone)]
pub struct PruneOptions {
    /// Delete notes last modified more than this many days ago. Zero means
    /// "prune everything up to and including right now".
    pub days: i64,
    pub dry_run: bool,
    /// Vault-relative folders to scan recursively.
    pub folders: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PruneError {
    pub path: String,
    pub error: String,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct PruneSummary {
    pub candidates: usize,
    pub deleted: usize,
    pub errors: usize,
}

/// Structured result of a prune pass. Partial failures are visible here,
/// not just logged.
#[derive(Debug, Clone, Serialize)]
pub struct PruneOutcome {
    pub candidates: Vec<String>,
    pub deleted: Vec<String>,
    pub errors: Vec<PruneError>,
    pub summary: PruneSummary,
    pub dry_run: bool,
}

/// Delete notes older than the cutoff from the given folders.
pub fn prune(vault: &Vault, opts: &PruneOptions) -> Result<PruneOutcome> {
    let mut paths = Vec::new();
    for folder in &opts.folders {
        paths.extend(vault.list(
            Path::new(folder),
            ListOptions {
                recursive: true,
                type_filter: None,
            },
        )?);
    }
    prune_paths(vault, &paths, opts.days, opts.dry_run)
}

/// Prune every phase's `research/` directory, or a single phase's if given.
/// Research directories are scanned non-recursively; missing ones are
/// silently skipped.
pub fn prune_research(
    vault: &Vault,
    days: i64,
    dry_run: bool,
    phase_id: Option<&str>,
) -> Result<PruneOutcome> {
    let ids = match phase_id {
        Some(id) => vec![id.to_string()],
        None => vault.phase_ids()?,
    };
    let mut paths = Vec::new();
    for id in ids {
        let dir = vault.phase_dir(&id).join("research");
        paths.extend(vault.list(&dir, ListOptions::default())?);
    }
    prune_paths(vault, &paths, days, dry_run)
}

fn prune_paths(vault: &Vault, paths: &[PathBuf], days: i64, dry_run: bool) -> Result<PruneOutcome> {
    let cutoff = cutoff_for(days)?;

    let mut candidates = Vec::new();
    let mut deleted = Vec::new();
    let mut errors = Vec::new();

    for path in paths {
        let mtime = match vault.stat(path) {
            Ok(stat) => stat.mtime,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "skipping unstatable file");
                continue;
            }
        };
        if mtime >= cutoff {
            continue;
        }
        let display = path.to_string_lossy().into_owned();
        candidates.push(display.clone());
        if dry_run {
            continue;
        }
        match fs::remove_file(vault.abs(path)) {
            Ok(()) => deleted.push(display),
            Err(e) => errors.push(PruneError {
                path: display,
                error: e.to_string(),
            }),
        }
    }

    let summary = PruneSummary {
        candidates: candidates.len(),
        deleted: deleted.len(),
        errors: errors.len(),
    };
    Ok(PruneOutcome {
        candidates,
        deleted,
        errors,
        summary,
        dry_run,
    })
}

/// A day-0 cutoff is nudged one second into the future so "everything up to
/// and including right now" qualifies. Day counts past the representable
/// timestamp range are rejected rather than wrapping.
fn cutoff_for(days: i64) -> Result<DateTime<Utc>> {
    if days == 0 {
        return Ok(Utc::now() + Duration::seconds(1));
    }
    Duration::try_days(days)
        .and_then(|d| Utc::now().checked_sub_signed(d))
        .ok_or_else(|| Error::InvalidInput(format!("--days is out of range: {days}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::HandoffOptions;
    use crate::test_utils::TestEnv;

    fn vault_with_handoff(env: &TestEnv) -> Vault {
        let vault = env.vault();
        vault
            .create_handoff(HandoffOptions {
                title: "old work".into(),
                ..Default::default()
            })
            .unwrap();
        vault
    }

    fn opts(days: i64, dry_run: bool) -> PruneOptions {
        PruneOptions {
            days,
            dry_run,
            folders: vec!["handoffs".into(), "sessions".into()],
        }
    }

    #[test]
    fn dry_run_reports_but_keeps_files() {
        let env = TestEnv::new();
        let vault = vault_with_handoff(&env);

        let outcome = prune(&vault, &opts(0, true)).unwrap();
        assert_eq!(outcome.summary.candidates, 1);
        assert_eq!(outcome.summary.deleted, 0);
        assert!(outcome.deleted.is_empty());
        assert!(vault.exists(Path::new(&outcome.candidates[0])));
    }

    #[test]
    fn day_zero_deletes_fresh_notes() {
        let env = TestEnv::new();
        let vault = vault_with_handoff(&env);

        let outcome = prune(&vault, &opts(0, false)).unwrap();
        assert_eq!(outcome.summary.deleted, outcome.summary.candidates);
        assert_eq!(outcome.summary.errors, 0);
        assert!(!vault.exists(Path::new(&outcome.deleted[0])));

        let remaining = vault
            .list(
                Path::new("handoffs"),
                ListOptions {
                    recursive: true,
                    type_filter: None,
                },
            )
            .unwrap();
        assert!(remaining.is_empty());
    }

    #[test]
    fn recent_notes_survive_a_long_cutoff() {
        let env = TestEnv::new();
        let vault = vault_with_handoff(&env);

        let outcome = prune(&vault, &opts(30, false)).unwrap();
        assert_eq!(outcome.summary.candidates, 0);
        assert_eq!(outcome.summary.deleted, 0);
    }

    #[test]
    fn research_prune_is_scoped_and_shallow() {
        let env = TestEnv::new();
        let vault = env.vault();
        vault.create_phase("one", "One", None).unwrap();
        vault.create_phase("two", "Two", None).unwrap();
        vault.create_research("a", "body", Some("one")).unwrap();
        vault.create_research("b", "body", Some("two")).unwrap();

        let scoped = prune_research(&vault, 0, false, Some("one")).unwrap();
        assert_eq!(scoped.summary.deleted, 1);
        assert!(scoped.deleted[0].starts_with("phases/one/research"));

        // Phase two's note is untouched; pruning all phases finds it.
        let all = prune_research(&vault, 0, true, None).unwrap();
        assert_eq!(all.summary.candidates, 1);
    }

    #[test]
    fn out_of_range_day_counts_are_rejected() {
        let env = TestEnv::new();
        let vault = vault_with_handoff(&env);

        let err = prune(&vault, &opts(100_000_000_000, true)).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        let err = prune(&vault, &opts(i64::MAX, false)).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn missing_research_dirs_are_skipped() {
        let env = TestEnv::new();
        let vault = env.vault();
        let outcome = prune_research(&vault, 0, false, Some("ghost")).unwrap();
        assert_eq!(outcome.summary.candidates, 0);
    }
}
