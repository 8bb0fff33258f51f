//! Pluggable note backend strategy.
//!
//! Notes are normally materialized directly on disk, but an external
//! note-management tool can be configured to service `create` and `read`.
//! The external tool is capability-probed once per process and every call to
//! it is best-effort: any failure falls back to direct file operations.
//! `update` and recursive listing are explicitly unsupported by plugins and
//! always route direct.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::OnceLock;

use tracing::{debug, warn};

use crate::frontmatter;
use crate::models::{Frontmatter, Note};
use crate::storage::{ListOptions, Vault};
use crate::{Error, Result};

/// Which backend serviced (or would service) an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Direct,
    External,
}

/// An external note-management command.
///
/// Protocol: `<command> read <path>` prints the note document on stdout;
/// `<command> create <path>` accepts the document on stdin. The probe runs
/// `<command> --version` and is memoized for the process lifetime; a failed
/// probe simply disables the plugin, never the operation.
pub struct ExternalBackend {
    command: String,
    available: OnceLock<bool>,
}

impl ExternalBackend {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            available: OnceLock::new(),
        }
    }

    /// Probe availability, memoized.
    pub fn available(&self) -> bool {
        *self.available.get_or_init(|| {
            let probed = Command::new(&self.command)
                .arg("--version")
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .map(|status| status.success())
                .unwrap_or(false);
            debug!(command = %self.command, available = probed, "probed external backend");
            probed
        })
    }

    fn read(&self, abs: &Path) -> Result<String> {
        let output = Command::new(&self.command)
            .arg("read")
            .arg(abs)
            .stderr(Stdio::null())
            .output()?;
        if !output.status.success() {
            return Err(Error::NotFound(format!("backend read: {}", abs.display())));
        }
        String::from_utf8(output.stdout)
            .map_err(|e| Error::InvalidInput(format!("backend produced invalid utf-8: {e}")))
    }

    fn create(&self, abs: &Path, document: &str) -> Result<()> {
        let mut child = Command::new(&self.command)
            .arg("create")
            .arg(abs)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        if let Some(stdin) = child.stdin.as_mut() {
            stdin.write_all(document.as_bytes())?;
        }
        let status = child.wait()?;
        if !status.success() {
            return Err(Error::InvalidInput(format!(
                "backend create failed for {}",
                abs.display()
            )));
        }
        Ok(())
    }
}

/// Dispatches note operations between the external plugin and direct file
/// access.
pub struct BackendRouter<'a> {
    vault: &'a Vault,
    external: Option<ExternalBackend>,
}

impl<'a> BackendRouter<'a> {
    pub fn new(vault: &'a Vault, external_command: Option<&str>) -> Self {
        Self {
            vault,
            external: external_command.map(ExternalBackend::new),
        }
    }

    fn external(&self) -> Option<&ExternalBackend> {
        self.external.as_ref().filter(|b| b.available())
    }

    /// Create a note, preferring the external backend when present.
    pub fn create(&self, rel: &Path, fm: &Frontmatter, body: &str) -> Result<Note> {
        if let Some(external) = self.external() {
            let document = frontmatter::serialize(fm, body);
            match external.create(&self.vault.abs(rel), &document) {
                Ok(()) => {
                    return Ok(Note {
                        path: rel.to_path_buf(),
                        frontmatter: fm.clone(),
                        body: body.to_string(),
                    });
                }
                Err(e) => {
                    warn!(path = %rel.display(), error = %e, "external create failed, falling back");
                }
            }
        }
        self.vault.create(rel, fm, body)
    }

    /// Read a note, preferring the external backend when present.
    pub fn read(&self, rel: &Path) -> Result<Note> {
        if let Some(external) = self.external() {
            match external.read(&self.vault.abs(rel)) {
                Ok(content) => {
                    let (fm, body) = frontmatter::parse(&content);
                    return Ok(Note {
                        path: rel.to_path_buf(),
                        frontmatter: fm,
                        body,
                    });
                }
                Err(e) => {
                    debug!(path = %rel.display(), error = %e, "external read failed, falling back");
                }
            }
        }
        self.vault.read(rel)
    }

    /// Update always routes direct: plugins do not support it.
    pub fn update(&self, rel: &Path, fm: &Frontmatter, body: &str) -> Result<Note> {
        self.vault.update(rel, fm, body)
    }

    /// Listing always routes direct: plugins do not support recursive or
    /// pattern traversal.
    pub fn list(&self, dir: &Path, opts: ListOptions) -> Result<Vec<PathBuf>> {
        self.vault.list(dir, opts)
    }

    /// Which backend read/create would currently prefer.
    pub fn kind(&self) -> BackendKind {
        if self.external().is_some() {
            BackendKind::External
        } else {
            BackendKind::Direct
        }
    }
}
