//! Port trait definitions for the Application layer.
//!
//! Ports are the interfaces (contracts) that infrastructure must fulfill.
//! This file imports only from `crate::domain`, never from `crate::infra`,
//! `crate::commands`, or `crate::output`.

use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Duration;

use anyhow::Result;

use crate::domain::ClusterConfig;

// ── Command Runner Port ───────────────────────────────────────────────────────

/// Abstracts process execution so infrastructure can be swapped or mocked.
///
/// Every external tool (`kubeadm`, `kubectl`, `etcdctl`, `apt-get`, `openssl`,
/// `curl`, `iptables`, `netplan`, `systemctl`) is reached through this port.
#[allow(async_fn_in_trait)]
pub trait CommandRunner {
    /// Run a program and capture its output.
    ///
    /// Implementations should delegate to `run_with_timeout` using the
    /// instance's configured default timeout.
    async fn run(&self, program: &str, args: &[&str]) -> Result<Output>;
    /// Run a program with a custom timeout override.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned or exceeds `timeout`.
    /// On timeout, the child process must be killed (not left orphaned).
    async fn run_with_timeout(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> Result<Output>;
    /// Run a program with stdin piped from `stdin`.
    async fn run_with_stdin(&self, program: &str, args: &[&str], stdin: &[u8]) -> Result<Output>;
}

// ── Progress Reporting Port ───────────────────────────────────────────────────

/// Abstracts progress reporting so services can emit events without
/// depending on the Presentation layer. Sync trait.
pub trait ProgressReporter {
    /// Emit an in-progress step message.
    fn step(&self, message: &str);
    /// Emit a success message.
    fn success(&self, message: &str);
    /// Emit a warning message.
    fn warn(&self, message: &str);
}

// ── Filesystem Port ───────────────────────────────────────────────────────────

/// Host filesystem operations used by services.
///
/// Paths are absolute; tests point the layout at a temporary directory.
pub trait HostFs {
    fn exists(&self, path: &Path) -> bool;
    fn is_file(&self, path: &Path) -> bool;
    /// # Errors
    /// Returns an error if the directory cannot be created.
    fn create_dir_all(&self, path: &Path) -> Result<()>;
    /// # Errors
    /// Returns an error if the directory cannot be removed.
    fn remove_dir_all(&self, path: &Path) -> Result<()>;
    /// # Errors
    /// Returns an error if the file cannot be removed.
    fn remove_file(&self, path: &Path) -> Result<()>;
    /// # Errors
    /// Returns an error if the rename fails (including across filesystems).
    fn rename(&self, from: &Path, to: &Path) -> Result<()>;
    /// Write `content` via a temporary sibling and an atomic rename.
    ///
    /// An existing file keeps its mode; a new one is created `0644`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    fn write(&self, path: &Path, content: &[u8]) -> Result<()>;
    /// Like [`HostFs::write`], with the file carrying `mode` from the moment
    /// it appears at `path`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    fn write_with_mode(&self, path: &Path, content: &[u8], mode: u32) -> Result<()>;
    /// # Errors
    /// Returns an error if the file cannot be read or is not UTF-8.
    fn read_to_string(&self, path: &Path) -> Result<String>;
    /// File names (not paths) of the entries in `dir`.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be listed.
    fn list_names(&self, dir: &Path) -> Result<Vec<String>>;
    /// # Errors
    /// Returns an error if the permissions cannot be changed.
    fn set_permissions(&self, path: &Path, mode: u32) -> Result<()>;
    /// Hex SHA-256 of a file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read.
    fn sha256_file(&self, path: &Path) -> Result<String>;
}

// ── Config Port ───────────────────────────────────────────────────────────────

/// Abstracts loading and saving the operator configuration file.
pub trait ConfigStore {
    /// Load config; a missing file yields defaults.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    fn load(&self) -> Result<ClusterConfig>;
    /// # Errors
    /// Returns an error if the file cannot be written.
    fn save(&self, config: &ClusterConfig) -> Result<()>;
    /// Location of the config file.
    fn path(&self) -> PathBuf;
}
