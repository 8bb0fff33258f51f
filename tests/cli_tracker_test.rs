//! Integration tests for tracker state via CLI.
//!
//! The tracker is the one piece with real cross-process concurrency: the
//! contention test below races whole `lbk` processes against one vault.

mod common;

use std::fs;
use std::process::Command;

use common::TestEnv;
use predicates::prelude::*;

#[test]
fn test_tracker_show_defaults() {
    let env = TestEnv::new();
    let state = env.lbk_json(&["tracker", "show"])["state"].clone();
    assert!(state["active_phase_id"].is_null());
    assert!(state["current_session_id"].is_null());
    assert!(state["latest_handoff_path"].is_null());
    assert_eq!(state["version"], 1);
}

#[test]
fn test_tracker_set_phase_persists() {
    let env = TestEnv::new();
    let result = env.lbk_json(&["tracker", "set-phase", "Auth Rework"]);
    // Phase ids are slugged.
    assert_eq!(result["state"]["active_phase_id"], "auth-rework");

    let shown = env.lbk_json(&["tracker", "show"]);
    assert_eq!(shown["state"]["active_phase_id"], "auth-rework");

    // On-disk format: 2-space indented JSON with a trailing newline.
    let raw =
        fs::read_to_string(env.vault_path().join("indexes/tracker-state.json")).unwrap();
    assert!(raw.ends_with('\n'));
    assert!(raw.contains("  \"active_phase_id\": \"auth-rework\""));
}

#[test]
fn test_tracker_state_updated_at_advances() {
    let env = TestEnv::new();
    let first = env.lbk_json(&["tracker", "set-phase", "one"]);
    std::thread::sleep(std::time::Duration::from_millis(50));
    let second = env.lbk_json(&["tracker", "set-phase", "two"]);
    let t1 = chrono::DateTime::parse_from_rfc3339(first["state"]["updated_at"].as_str().unwrap())
        .unwrap();
    let t2 = chrono::DateTime::parse_from_rfc3339(second["state"]["updated_at"].as_str().unwrap())
        .unwrap();
    assert!(t2 > t1, "updated_at must advance: {t1} !< {t2}");
}

#[test]
fn test_phase_activate_updates_tracker_and_note() {
    let env = TestEnv::new();
    env.lbk_json(&["phase", "create", "core", "Core work"]);
    let result = env.lbk_json(&["phase", "activate", "core"]);
    assert_eq!(result["status"], "active");

    let state = env.lbk_json(&["tracker", "show"])["state"].clone();
    assert_eq!(state["active_phase_id"], "core");

    // Research now defaults to the active phase.
    let research = env.lbk_json(&["research", "add", "Notes on core"]);
    assert!(research["path"]
        .as_str()
        .unwrap()
        .starts_with("phases/core/research/"));
}

#[test]
fn test_research_without_phase_or_tracker_fails() {
    let env = TestEnv::new();
    env.lbk()
        .args(["research", "add", "Orphan note"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no active phase"));
}

#[test]
fn test_concurrent_tracker_updates_do_not_lose_writes() {
    let env = TestEnv::new();
    let n = 8;

    // Race N whole processes on one vault. Every one must either succeed or
    // fail loudly; none may be silently dropped.
    let children: Vec<_> = (0..n)
        .map(|i| {
            Command::new(env!("CARGO_BIN_EXE_lbk"))
                .env("LOGBOOK_VAULT", env.vault_path())
                .env(
                    "LOGBOOK_CONFIG",
                    env.vault_path().join("no-such-config.toml"),
                )
                .args(["tracker", "set-phase", &format!("phase-{i}")])
                .spawn()
                .unwrap()
        })
        .collect();

    for child in children {
        let status = child.wait_with_output().unwrap().status;
        assert!(status.success(), "a contended update was dropped");
    }

    // Exactly one of the N values is the final state.
    let state = env.lbk_json(&["tracker", "show"])["state"].clone();
    let phase = state["active_phase_id"].as_str().unwrap();
    assert!(phase.starts_with("phase-"));
    let idx: usize = phase["phase-".len()..].parse().unwrap();
    assert!(idx < n);

    // The lock marker never outlives its holder.
    assert!(!env.vault_path().join("indexes/tracker-state.lock").exists());
}

#[test]
fn test_stale_lock_is_reclaimed_by_next_writer() {
    let env = TestEnv::new();
    env.lbk_json(&["tracker", "set-phase", "before"]);

    let lock = env.vault_path().join("indexes/tracker-state.lock");
    fs::write(&lock, "").unwrap();
    let stale = std::time::SystemTime::now() - std::time::Duration::from_secs(120);
    let file = fs::File::options().write(true).open(&lock).unwrap();
    file.set_modified(stale).unwrap();
    drop(file);

    // A crashed holder's marker is reclaimed, not a deadlock.
    let result = env.lbk_json(&["tracker", "set-phase", "after"]);
    assert_eq!(result["state"]["active_phase_id"], "after");
    assert!(!lock.exists());
}
