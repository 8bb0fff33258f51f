//! Integration tests for raw note access via CLI.

mod common;

use std::fs;

use common::TestEnv;
use predicates::prelude::*;

#[test]
fn test_note_show_roundtrips_frontmatter() {
    let env = TestEnv::new();
    let created = env.lbk_json(&[
        "handoff",
        "create",
        "Full fields",
        "--body",
        "The body text.",
        "--tag",
        "alpha",
        "--tag",
        "beta",
    ]);

    let shown = env.lbk_json(&["note", "show", created["path"].as_str().unwrap()]);
    let fm = &shown["frontmatter"];
    assert_eq!(fm["id"], created["id"]);
    assert_eq!(fm["type"], "handoff");
    assert_eq!(fm["status"], "active");
    assert_eq!(fm["title"], "Full fields");
    // Tag order is preserved.
    assert_eq!(fm["tags"][0], "alpha");
    assert_eq!(fm["tags"][1], "beta");
    assert!(shown["body"].as_str().unwrap().contains("The body text."));
}

#[test]
fn test_note_show_missing_file_fails() {
    let env = TestEnv::new();
    env.lbk_json(&["session", "start", "setup"]);
    env.lbk()
        .args(["note", "show", "handoffs/absent.md"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Not found"));
}

#[test]
fn test_note_show_is_lenient_on_damaged_header() {
    let env = TestEnv::new();
    env.lbk_json(&["session", "start", "setup"]);
    fs::write(
        env.vault_path().join("damaged.md"),
        "---\nid: [broken\nstill readable body\n",
    )
    .unwrap();

    let shown = env.lbk_json(&["note", "show", "damaged.md"]);
    // Malformed header degrades to empty metadata, body still visible.
    assert_eq!(
        shown["frontmatter"]["id"],
        "00000000-0000-0000-0000-000000000000"
    );
    assert!(shown["body"].as_str().unwrap().contains("still readable body"));
}

#[test]
fn test_note_list_with_type_filter() {
    let env = TestEnv::new();
    env.lbk_json(&["handoff", "create", "A handoff"]);
    env.lbk_json(&["session", "start", "A session"]);

    let all = env.lbk_json(&["note", "list", "--recursive"]);
    // Handoff, session, and the latest-handoff index document.
    assert_eq!(all["count"], 3);

    let handoffs = env.lbk_json(&["note", "list", "--recursive", "--type", "handoff"]);
    assert_eq!(handoffs["count"], 1);

    let sessions = env.lbk_json(&["note", "list", "sessions", "--recursive"]);
    assert_eq!(sessions["count"], 1);
}

#[test]
fn test_note_list_rejects_unknown_type() {
    let env = TestEnv::new();
    env.lbk_json(&["session", "start", "setup"]);
    env.lbk()
        .args(["note", "list", "--type", "bogus"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown note type"));
}

#[test]
fn test_filename_convention() {
    let env = TestEnv::new();
    let created = env.lbk_json(&["handoff", "create", "Weird  Title!! (v2)"]);
    let path = created["path"].as_str().unwrap();
    let name = std::path::Path::new(path).file_name().unwrap().to_str().unwrap();

    // YYYYMMDD-HHmmssZ--handoff--<scope>--weird-title-v2.md
    let parts: Vec<&str> = name.trim_end_matches(".md").split("--").collect();
    assert_eq!(parts.len(), 4);
    assert_eq!(parts[0].len(), "20240115-143000Z".len());
    assert!(parts[0].ends_with('Z'));
    assert_eq!(parts[1], "handoff");
    assert_eq!(parts[3], "weird-title-v2");
}

#[test]
fn test_unavailable_backend_falls_back_to_direct() {
    let env = TestEnv::new();
    let created = env.lbk_json(&["handoff", "create", "Direct note"]);

    // Point the config at a plugin that does not exist; reads must still work.
    let config = env.vault_path().join("with-backend.toml");
    fs::write(&config, "backend_command = \"/nonexistent/notectl\"\n").unwrap();
    let output = env
        .lbk()
        .env("LOGBOOK_CONFIG", &config)
        .args(["note", "show", created["path"].as_str().unwrap()])
        .output()
        .unwrap();
    assert!(output.status.success());
    let shown: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(shown["frontmatter"]["id"], created["id"]);
}

#[test]
fn test_backend_plugin_services_note_creation() {
    use std::os::unix::fs::PermissionsExt;

    let env = TestEnv::new();
    env.lbk_json(&["phase", "create", "core", "Core work"]);

    // A plugin that answers the probe and handles `create` by writing the
    // document itself, with a marker line proving it ran.
    let script = env.vault_path().join("notectl.sh");
    fs::write(
        &script,
        "#!/bin/sh\ncase \"$1\" in\n--version) exit 0 ;;\ncreate) { cat; echo via-plugin; } > \"$2\" ;;\n*) exit 1 ;;\nesac\n",
    )
    .unwrap();
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
    let config = env.vault_path().join("with-backend.toml");
    fs::write(&config, format!("backend_command = {:?}\n", script)).unwrap();

    let output = env
        .lbk()
        .env("LOGBOOK_CONFIG", &config)
        .args(["research", "add", "Plugin written", "--phase", "core"])
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "{}",
        String::from_utf8_lossy(&output.stderr)
    );
    let created: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let raw = fs::read_to_string(
        env.vault_path().join(created["path"].as_str().unwrap()),
    )
    .unwrap();
    assert!(raw.ends_with("via-plugin\n"));
}

#[test]
fn test_version_reports_build_info() {
    let env = TestEnv::new();
    env.lbk()
        .args(["version", "-H"])
        .assert()
        .success()
        .stdout(predicate::str::contains("lbk 0.1.0"));
}
