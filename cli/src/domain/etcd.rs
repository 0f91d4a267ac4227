//! etcd on-disk layout, snapshot naming, retention and `etcdctl` output parsing.
//!
//! Pure functions only, no I/O.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::error::EtcdError;

/// Prefix shared by every snapshot this tool writes.
pub const SNAPSHOT_PREFIX: &str = "etcd-snapshot-";
/// Snapshot file extension.
pub const SNAPSHOT_EXT: &str = ".db";
/// Extension of the SHA-256 sidecar written next to each snapshot.
pub const CHECKSUM_EXT: &str = ".sha256";
/// `chrono` format of the timestamp embedded in file and directory names.
pub const STAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

/// Where kubeadm puts etcd and where backups go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EtcdLayout {
    pub data_dir: PathBuf,
    pub backup_dir: PathBuf,
    pub manifests_dir: PathBuf,
    pub pki_dir: PathBuf,
    pub endpoint: String,
}

impl Default for EtcdLayout {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("/var/lib/etcd"),
            backup_dir: PathBuf::from("/var/backups/etcd"),
            manifests_dir: PathBuf::from("/etc/kubernetes/manifests"),
            pki_dir: PathBuf::from("/etc/kubernetes/pki/etcd"),
            endpoint: "https://127.0.0.1:2379".to_string(),
        }
    }
}

impl EtcdLayout {
    /// Static pod manifest of the local etcd member.
    #[must_use]
    pub fn etcd_manifest(&self) -> PathBuf {
        self.manifests_dir.join("etcd.yaml")
    }

    /// TLS flags shared by every `etcdctl` call against the live member.
    #[must_use]
    pub fn tls_args(&self) -> Vec<String> {
        vec![
            format!("--endpoints={}", self.endpoint),
            format!("--cacert={}", self.pki_dir.join("ca.crt").display()),
            format!("--cert={}", self.pki_dir.join("healthcheck-client.crt").display()),
            format!("--key={}", self.pki_dir.join("healthcheck-client.key").display()),
        ]
    }

    /// Full path of the snapshot taken at `stamp`.
    #[must_use]
    pub fn snapshot_path(&self, stamp: &str) -> PathBuf {
        self.backup_dir.join(snapshot_file_name(stamp))
    }

    /// Where the current data dir is moved before a restore.
    #[must_use]
    pub fn aside_dir(&self, stamp: &str) -> PathBuf {
        aside_dir(&self.data_dir, stamp)
    }
}

/// `etcd-snapshot-<stamp>.db`.
#[must_use]
pub fn snapshot_file_name(stamp: &str) -> String {
    format!("{SNAPSHOT_PREFIX}{stamp}{SNAPSHOT_EXT}")
}

/// `<data_dir>.pre-restore-<stamp>`, a sibling of the data dir.
#[must_use]
pub fn aside_dir(data_dir: &Path, stamp: &str) -> PathBuf {
    let mut name = data_dir.as_os_str().to_os_string();
    name.push(format!(".pre-restore-{stamp}"));
    PathBuf::from(name)
}

/// `<snapshot>.sha256`.
#[must_use]
pub fn checksum_path(snapshot: &Path) -> PathBuf {
    let mut name = snapshot.as_os_str().to_os_string();
    name.push(CHECKSUM_EXT);
    PathBuf::from(name)
}

/// Contents of the checksum sidecar, in `sha256sum` format.
#[must_use]
pub fn checksum_line(hex: &str, snapshot: &Path) -> String {
    let file = snapshot
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("{hex}  {file}\n")
}

/// Hex digest from a `sha256sum`-format line.
#[must_use]
pub fn parse_checksum_line(content: &str) -> Option<String> {
    content
        .split_whitespace()
        .next()
        .filter(|h| h.len() == 64 && h.bytes().all(|b| b.is_ascii_hexdigit()))
        .map(str::to_ascii_lowercase)
}

/// Check the restore argument names a `.db` file.
///
/// # Errors
///
/// Returns an error if the extension is wrong. Existence is checked by the
/// caller, which owns filesystem access.
pub fn validate_snapshot_name(path: &Path) -> Result<(), EtcdError> {
    let ok = path
        .file_name()
        .is_some_and(|n| n.to_string_lossy().ends_with(SNAPSHOT_EXT));
    if ok {
        Ok(())
    } else {
        Err(EtcdError::SnapshotExtension(path.display().to_string()))
    }
}

/// Parsed `etcdctl snapshot status -w json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotStatus {
    pub hash: u64,
    pub revision: i64,
    #[serde(rename = "totalKey")]
    pub total_key: u64,
    #[serde(rename = "totalSize")]
    pub total_size: u64,
}

/// # Errors
///
/// Returns an error if the output is not the expected JSON object.
pub fn parse_snapshot_status(stdout: &str) -> Result<SnapshotStatus, EtcdError> {
    serde_json::from_str(stdout.trim())
        .map_err(|e| EtcdError::UnparsableStatus(format!("{e}: {}", stdout.trim())))
}

/// Whether `etcdctl endpoint health` reported the member healthy.
#[must_use]
pub fn is_healthy_output(stdout: &str) -> bool {
    stdout.contains("is healthy") && !stdout.contains("is unhealthy")
}

/// Pick snapshots to delete so that `keep` newest remain.
///
/// Only names produced by [`snapshot_file_name`] are considered; the stamp
/// sorts lexicographically in time order. Returned oldest first.
#[must_use]
pub fn select_for_pruning(names: &[String], keep: usize) -> Vec<String> {
    let mut snapshots: Vec<&String> = names
        .iter()
        .filter(|n| {
            n.strip_prefix(SNAPSHOT_PREFIX)
                .and_then(|rest| rest.strip_suffix(SNAPSHOT_EXT))
                .is_some_and(|stamp| {
                    stamp.len() == 15
                        && stamp.bytes().enumerate().all(|(i, b)| {
                            if i == 8 { b == b'-' } else { b.is_ascii_digit() }
                        })
                })
        })
        .collect();
    snapshots.sort();
    let excess = snapshots.len().saturating_sub(keep);
    snapshots
        .into_iter()
        .take(excess)
        .cloned()
        .collect()
}

/// `--initial-cluster` value for a single-member restore.
#[must_use]
pub fn initial_cluster(name: &str, peer_url: &str) -> String {
    format!("{name}={peer_url}")
}
