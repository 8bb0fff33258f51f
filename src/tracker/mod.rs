//! Tracker state: the small shared JSON document of active-phase, session,
//! and latest-handoff pointers, mutated under a cross-process lock.
//!
//! Independent CLI processes race on the same vault, so mutual exclusion uses
//! the filesystem as the only coordination medium: a marker file created with
//! exclusive-create semantics (atomic test-and-set). Contention retries up to
//! 100 times with a fixed 20 ms wait (~2 s worst case); a marker older than
//! 30 seconds is reclaimed as stale, bounding unavailability after a crashed
//! holder. Every critical section re-reads the on-disk state after acquiring
//! the lock, so no update is merged against a stale snapshot.

use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::TrackerState;
use crate::{Error, Result};

pub const STATE_FILE: &str = "tracker-state.json";
pub const LOCK_FILE: &str = "tracker-state.lock";

const LOCK_RETRIES: u32 = 100;
const RETRY_WAIT: Duration = Duration::from_millis(20);
const STALE_AFTER: Duration = Duration::from_secs(30);

/// Handle to one vault's tracker state document.
pub struct TrackerStore {
    state_path: PathBuf,
    lock_path: PathBuf,
}

/// Holds the lock marker; removing it on drop releases the lock on every
/// path out of the critical section, including errors.
struct LockGuard {
    path: PathBuf,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!(error = %e, "failed to release tracker lock");
            }
        }
    }
}

impl TrackerStore {
    /// A store rooted at the vault's `indexes/` directory.
    pub fn new(indexes_dir: &Path) -> Self {
        Self {
            state_path: indexes_dir.join(STATE_FILE),
            lock_path: indexes_dir.join(LOCK_FILE),
        }
    }

    /// Read the current state without locking.
    ///
    /// The document is created lazily on first write, so an absent file reads
    /// as the default state.
    pub fn read(&self) -> Result<TrackerState> {
        match fs::read_to_string(&self.state_path) {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(TrackerState::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Run a read-modify-write cycle under the lock.
    ///
    /// The whole document is rewritten with a fresh `updated_at` stamp; the
    /// closure only sees state re-read after acquisition.
    pub fn update<F>(&self, mutate: F) -> Result<TrackerState>
    where
        F: FnOnce(&mut TrackerState),
    {
        let _guard = self.acquire()?;
        let mut state = self.read()?;
        mutate(&mut state);
        state.updated_at = Utc::now();
        self.write(&state)?;
        Ok(state)
    }

    fn write(&self, state: &TrackerState) -> Result<()> {
        if let Some(parent) = self.state_path.parent() {
            fs::create_dir_all(parent)?;
        }
        // 2-space indent plus trailing newline is a compatibility surface for
        // external readers of the state file.
        let mut json = serde_json::to_string_pretty(state)?;
        json.push('\n');
        fs::write(&self.state_path, json)?;
        Ok(())
    }

    /// Acquire the lock marker, retrying on contention.
    fn acquire(&self) -> Result<LockGuard> {
        if let Some(parent) = self.lock_path.parent() {
            fs::create_dir_all(parent)?;
        }
        for attempt in 0..LOCK_RETRIES {
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&self.lock_path)
            {
                Ok(_) => {
                    return Ok(LockGuard {
                        path: self.lock_path.clone(),
                    });
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    debug!(attempt, "tracker lock contended");
                    self.reclaim_if_stale();
                    thread::sleep(RETRY_WAIT);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(Error::LockTimeout)
    }

    /// Remove the marker if its holder appears to have crashed.
    ///
    /// Staleness is judged by the marker's mtime; a racing remove by another
    /// waiter is benign (NotFound is ignored) and the next create_new attempt
    /// re-arbitrates ownership.
    fn reclaim_if_stale(&self) {
        let age = fs::metadata(&self.lock_path)
            .and_then(|m| m.modified())
            .and_then(|mtime| {
                mtime
                    .elapsed()
                    .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
            });
        match age {
            Ok(age) if age > STALE_AFTER => {
                warn!(age_secs = age.as_secs(), "reclaiming stale tracker lock");
                if let Err(e) = fs::remove_file(&self.lock_path) {
                    if e.kind() != io::ErrorKind::NotFound {
                        warn!(error = %e, "failed to reclaim stale tracker lock");
                    }
                }
            }
            _ => {}
        }
    }

    // === Convenience operations ===

    pub fn set_active_phase(&self, phase_id: &str) -> Result<TrackerState> {
        self.update(|state| state.active_phase_id = Some(phase_id.to_string()))
    }

    pub fn set_session(&self, session_id: Uuid) -> Result<TrackerState> {
        self.update(|state| state.current_session_id = Some(session_id))
    }

    pub fn record_handoff(&self, path: &str, id: Uuid) -> Result<TrackerState> {
        self.update(|state| {
            state.latest_handoff_path = Some(path.to_string());
            state.latest_handoff_id = Some(id);
        })
    }

    /// An explicit non-empty phase id wins; otherwise the recorded active
    /// phase, if any. Lets phase-scoped commands omit the phase argument.
    pub fn resolve_phase_id(&self, explicit: Option<&str>) -> Result<Option<String>> {
        if let Some(explicit) = explicit {
            if !explicit.is_empty() {
                return Ok(Some(explicit.to_string()));
            }
        }
        Ok(self.read()?.active_phase_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TestEnv;
    use std::sync::Arc;

    fn store(env: &TestEnv) -> TrackerStore {
        TrackerStore::new(&env.path().join("indexes"))
    }

    #[test]
    fn first_read_is_default_state() {
        let env = TestEnv::new();
        let state = store(&env).read().unwrap();
        assert!(state.active_phase_id.is_none());
        assert!(state.latest_handoff_path.is_none());
        assert_eq!(state.version, TrackerState::CURRENT_VERSION);
    }

    #[test]
    fn update_persists_and_stamps() {
        let env = TestEnv::new();
        let tracker = store(&env);
        let before = tracker.set_active_phase("auth").unwrap();
        let after = tracker.set_session(Uuid::new_v4()).unwrap();
        assert_eq!(after.active_phase_id.as_deref(), Some("auth"));
        assert!(after.updated_at >= before.updated_at);

        // On-disk format: 2-space indent, trailing newline.
        let raw = fs::read_to_string(env.path().join("indexes").join(STATE_FILE)).unwrap();
        assert!(raw.ends_with('\n'));
        assert!(raw.contains("\n  \"active_phase_id\": \"auth\""));
    }

    #[test]
    fn lock_released_after_update() {
        let env = TestEnv::new();
        let tracker = store(&env);
        tracker.set_active_phase("one").unwrap();
        assert!(!env.path().join("indexes").join(LOCK_FILE).exists());
    }

    #[test]
    fn fresh_lock_blocks_then_times_out() {
        let env = TestEnv::new();
        let tracker = store(&env);
        let lock_path = env.path().join("indexes").join(LOCK_FILE);
        fs::create_dir_all(lock_path.parent().unwrap()).unwrap();
        fs::write(&lock_path, "").unwrap();

        // A fresh marker is never reclaimed, so all retries are spent.
        let err = tracker.set_active_phase("blocked").unwrap_err();
        assert!(matches!(err, Error::LockTimeout));
        assert!(lock_path.exists());
    }

    #[test]
    fn stale_lock_is_reclaimed() {
        let env = TestEnv::new();
        let tracker = store(&env);
        let lock_path = env.path().join("indexes").join(LOCK_FILE);
        fs::create_dir_all(lock_path.parent().unwrap()).unwrap();
        fs::write(&lock_path, "").unwrap();
        // Age the marker past the 30 s staleness threshold.
        let stale = std::time::SystemTime::now() - Duration::from_secs(60);
        let file = fs::File::options().write(true).open(&lock_path).unwrap();
        file.set_modified(stale).unwrap();
        drop(file);

        let state = tracker.set_active_phase("recovered").unwrap();
        assert_eq!(state.active_phase_id.as_deref(), Some("recovered"));
        assert!(!lock_path.exists());
    }

    #[test]
    fn contended_updates_all_land() {
        let env = TestEnv::new();
        let indexes = env.path().join("indexes");
        let mut handles = Vec::new();
        let dir = Arc::new(indexes);
        for i in 0..8 {
            let dir = Arc::clone(&dir);
            handles.push(thread::spawn(move || {
                TrackerStore::new(&dir).set_active_phase(&format!("phase-{i}"))
            }));
        }
        let mut last_seen = Vec::new();
        for handle in handles {
            let state = handle.join().unwrap().unwrap();
            last_seen.push(state.updated_at);
        }

        // Every call either succeeded or raised; the final value is one of
        // the eight written values.
        let final_state = TrackerStore::new(&dir).read().unwrap();
        let phase = final_state.active_phase_id.unwrap();
        assert!(phase.starts_with("phase-"));
        assert!(last_seen.iter().any(|ts| *ts == final_state.updated_at));
    }

    #[test]
    fn resolve_phase_prefers_explicit() {
        let env = TestEnv::new();
        let tracker = store(&env);
        assert_eq!(tracker.resolve_phase_id(None).unwrap(), None);

        tracker.set_active_phase("stored").unwrap();
        assert_eq!(
            tracker.resolve_phase_id(Some("explicit")).unwrap().as_deref(),
            Some("explicit")
        );
        assert_eq!(
            tracker.resolve_phase_id(None).unwrap().as_deref(),
            Some("stored")
        );
        assert_eq!(
            tracker.resolve_phase_id(Some("")).unwrap().as_deref(),
            Some("stored")
        );
    }
}
