//! Common test utilities for logbook integration tests.
//!
//! Provides `TestEnv` for isolated vaults that don't touch the user's
//! data or config directories.

#![allow(dead_code)]

use assert_cmd::Command;
pub use tempfile::TempDir;

/// A test environment with an isolated vault.
///
/// The `lbk()` method returns a `Command` that sets `LOGBOOK_VAULT` and
/// `LOGBOOK_CONFIG` per-invocation, making tests parallel-safe.
pub struct TestEnv {
    pub vault_dir: TempDir,
}

impl TestEnv {
    /// Create a new test environment with an isolated vault directory.
    pub fn new() -> Self {
        Self {
            vault_dir: TempDir::new().unwrap(),
        }
    }

    /// Get a Command for the lbk binary with an isolated vault.
    ///
    /// `LOGBOOK_CONFIG` points at a nonexistent file so the user's real
    /// config can never leak into a test.
    pub fn lbk(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_lbk"));
        cmd.env("LOGBOOK_VAULT", self.vault_dir.path());
        cmd.env(
            "LOGBOOK_CONFIG",
            self.vault_dir.path().join("no-such-config.toml"),
        );
        cmd
    }

    /// Get the path to the vault directory.
    pub fn vault_path(&self) -> &std::path::Path {
        self.vault_dir.path()
    }

    /// Run a command and parse its stdout as JSON.
    pub fn lbk_json(&self, args: &[&str]) -> serde_json::Value {
        let output = self.lbk().args(args).output().unwrap();
        assert!(
            output.status.success(),
            "command {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
        serde_json::from_slice(&output.stdout).unwrap()
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}
