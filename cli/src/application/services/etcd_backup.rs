//! Application service: etcd snapshots with a checksum sidecar and
//! count-based retention.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::application::ports::{CommandRunner, HostFs, ProgressReporter};
use crate::application::services::exec::{as_strs, run_checked, run_checked_slow, stdout_of};
use crate::domain::etcd::{
    EtcdLayout, SnapshotStatus, checksum_line, checksum_path, parse_snapshot_status,
    select_for_pruning,
};

/// Outcome of [`backup_etcd`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupOutcome {
    pub snapshot: PathBuf,
    pub sha256: String,
    pub status: SnapshotStatus,
    /// File names deleted by retention.
    pub pruned: Vec<String>,
}

/// Save a snapshot of the local member, verify it, and prune old ones.
///
/// `keep == 0` disables pruning.
///
/// # Errors
///
/// Returns an error if the snapshot already exists, `etcdctl` fails, or the
/// snapshot does not pass `snapshot status`.
pub async fn backup_etcd(
    runner: &impl CommandRunner,
    fs: &impl HostFs,
    reporter: &impl ProgressReporter,
    layout: &EtcdLayout,
    keep: usize,
    stamp: &str,
) -> Result<BackupOutcome> {
    fs.create_dir_all(&layout.backup_dir)?;
    fs.set_permissions(&layout.backup_dir, 0o700)?;
    let snapshot = layout.snapshot_path(stamp);
    if fs.exists(&snapshot) {
        anyhow::bail!("Snapshot {} already exists.", snapshot.display());
    }

    reporter.step(&format!("Saving snapshot to {}...", snapshot.display()));
    let target = snapshot.display().to_string();
    let mut args = layout.tls_args();
    args.extend(["snapshot".to_string(), "save".to_string(), target]);
    run_checked_slow(runner, "etcdctl", &as_strs(&args))
        .await
        .context("etcdctl snapshot save failed; is etcd running on this node?")?;
    fs.set_permissions(&snapshot, 0o600)?;

    let status = match snapshot_status(runner, &snapshot).await {
        Ok(status) => status,
        Err(e) => {
            if let Err(rm) = fs.remove_file(&snapshot) {
                warn!(path = %snapshot.display(), error = %rm, "cannot remove unverified snapshot");
            }
            return Err(e);
        }
    };
    let sha256 = fs.sha256_file(&snapshot)?;
    fs.write(&checksum_path(&snapshot), checksum_line(&sha256, &snapshot).as_bytes())?;
    reporter.success(&format!(
        "Snapshot saved: revision {}, {} keys, {} bytes",
        status.revision, status.total_key, status.total_size
    ));

    let pruned = if keep > 0 {
        prune_snapshots(fs, reporter, &layout.backup_dir, keep)?
    } else {
        Vec::new()
    };
    info!(snapshot = %snapshot.display(), revision = status.revision, pruned = pruned.len(), "etcd backup complete");
    Ok(BackupOutcome {
        snapshot,
        sha256,
        status,
        pruned,
    })
}

/// `etcdctl snapshot status -w json` on a local file.
///
/// # Errors
///
/// Returns an error if the file is not a readable snapshot.
pub async fn snapshot_status(runner: &impl CommandRunner, snapshot: &Path) -> Result<SnapshotStatus> {
    let file = snapshot.display().to_string();
    let out = run_checked(runner, "etcdctl", &["snapshot", "status", &file, "-w", "json"])
        .await
        .with_context(|| format!("{file} is not a readable etcd snapshot"))?;
    Ok(parse_snapshot_status(&stdout_of(&out))?)
}

/// Delete all but the `keep` newest snapshots and their sidecars.
///
/// # Errors
///
/// Returns an error if the backup directory cannot be listed.
pub fn prune_snapshots(
    fs: &impl HostFs,
    reporter: &impl ProgressReporter,
    backup_dir: &Path,
    keep: usize,
) -> Result<Vec<String>> {
    let names = fs.list_names(backup_dir)?;
    let mut pruned = Vec::new();
    for name in select_for_pruning(&names, keep) {
        let path = backup_dir.join(&name);
        if let Err(e) = fs.remove_file(&path) {
            warn!(path = %path.display(), error = %e, "cannot prune snapshot");
            reporter.warn(&format!("Cannot remove old snapshot {name}: {e}"));
            continue;
        }
        let sidecar = checksum_path(&path);
        if fs.exists(&sidecar) {
            fs.remove_file(&sidecar)?;
        }
        pruned.push(name);
    }
    if !pruned.is_empty() {
        reporter.success(&format!(
            "Pruned {} old snapshot(s), keeping {keep}",
            pruned.len()
        ));
    }
    Ok(pruned)
}
