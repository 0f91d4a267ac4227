//! Application service: restore the local etcd member from a snapshot.
//!
//! The current data directory is moved aside, never deleted. If the restore
//! command fails the directory is moved back and kubelet restarted, so the
//! node ends up where it started.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, error, info, warn};

use crate::application::ports::{CommandRunner, HostFs, ProgressReporter};
use crate::application::services::etcd_backup::snapshot_status;
use crate::application::services::exec::{as_strs, run_checked, run_checked_slow, stdout_of};
use crate::domain::{EtcdError, Poll};
use crate::domain::etcd::{
    EtcdLayout, SnapshotStatus, checksum_path, initial_cluster, is_healthy_output,
    parse_checksum_line, validate_snapshot_name,
};
use crate::domain::manifest::extract_flag;

/// Request for [`restore_etcd`].
#[derive(Debug, Clone)]
pub struct RestoreRequest<'a> {
    pub layout: &'a EtcdLayout,
    pub snapshot: &'a Path,
    /// Timestamp for the aside directory name.
    pub stamp: &'a str,
    pub health: Poll,
}

/// Outcome of [`restore_etcd`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreOutcome {
    pub status: SnapshotStatus,
    /// Where the previous data directory now lives, if there was one.
    pub aside: Option<PathBuf>,
    /// Health checks run until etcd answered.
    pub health_checks: u32,
}

/// Validate the snapshot without touching the running member.
///
/// # Errors
///
/// Returns an error if the file is missing, misnamed, fails its checksum,
/// or is not a readable snapshot.
pub async fn verify_snapshot(
    runner: &impl CommandRunner,
    fs: &impl HostFs,
    reporter: &impl ProgressReporter,
    snapshot: &Path,
) -> Result<SnapshotStatus> {
    validate_snapshot_name(snapshot)?;
    if !fs.is_file(snapshot) {
        return Err(EtcdError::SnapshotMissing(snapshot.display().to_string()).into());
    }
    let sidecar = checksum_path(snapshot);
    if fs.is_file(&sidecar) {
        let expected = parse_checksum_line(&fs.read_to_string(&sidecar)?)
            .with_context(|| format!("{} is not a sha256sum line", sidecar.display()))?;
        let actual = fs.sha256_file(snapshot)?;
        if actual != expected {
            return Err(EtcdError::ChecksumMismatch {
                path: snapshot.display().to_string(),
                expected,
                actual,
            }
            .into());
        }
        reporter.success("Checksum verified");
    } else {
        reporter.warn(&format!(
            "No checksum file {}; skipping integrity check",
            sidecar.display()
        ));
    }
    let status = snapshot_status(runner, snapshot).await?;
    reporter.success(&format!(
        "Snapshot readable: revision {}, {} keys",
        status.revision, status.total_key
    ));
    Ok(status)
}

/// Restore the single local member from `req.snapshot`.
///
/// # Errors
///
/// Returns [`EtcdError::RestoreFailed`] after a successful rollback,
/// [`EtcdError::RollbackFailed`] when the rollback itself fails, or
/// [`EtcdError::Unhealthy`] when etcd does not come back.
pub async fn restore_etcd(
    runner: &impl CommandRunner,
    fs: &impl HostFs,
    reporter: &impl ProgressReporter,
    req: &RestoreRequest<'_>,
) -> Result<RestoreOutcome> {
    let layout = req.layout;
    let status = verify_snapshot(runner, fs, reporter, req.snapshot).await?;

    let manifest_path = layout.etcd_manifest();
    let manifest = fs
        .read_to_string(&manifest_path)
        .with_context(|| format!("reading {}", manifest_path.display()))?;
    let flag = |name: &str| {
        extract_flag(&manifest, name).ok_or_else(|| EtcdError::ManifestFlagMissing {
            flag: name.to_string(),
            manifest: manifest_path.display().to_string(),
        })
    };
    let member = flag("name")?;
    let peer_url = flag("initial-advertise-peer-urls")?;

    let aside_target = layout.aside_dir(req.stamp);
    if fs.exists(&aside_target) {
        anyhow::bail!("{} already exists; retry in a second.", aside_target.display());
    }

    reporter.step("Stopping kubelet and the etcd container...");
    run_checked(runner, "systemctl", &["stop", "kubelet"]).await?;
    stop_etcd_containers(runner, reporter).await;

    let aside = if fs.exists(&layout.data_dir) {
        fs.rename(&layout.data_dir, &aside_target).with_context(|| {
            format!(
                "moving {} aside; kubelet is stopped, start it with: systemctl start kubelet",
                layout.data_dir.display()
            )
        })?;
        reporter.success(&format!(
            "Previous data moved to {}",
            aside_target.display()
        ));
        Some(aside_target)
    } else {
        None
    };

    reporter.step("Restoring snapshot...");
    let cluster = initial_cluster(&member, &peer_url);
    let args = vec![
        "snapshot".to_string(),
        "restore".to_string(),
        req.snapshot.display().to_string(),
        format!("--data-dir={}", layout.data_dir.display()),
        format!("--name={member}"),
        format!("--initial-cluster={cluster}"),
        format!("--initial-advertise-peer-urls={peer_url}"),
    ];
    if let Err(cause) = run_checked_slow(runner, "etcdctl", &as_strs(&args)).await {
        error!(error = %cause, "snapshot restore failed, rolling back");
        return Err(rollback(runner, fs, layout, aside.as_deref(), &cause.to_string())
            .await
            .into());
    }
    let previous = aside
        .as_deref()
        .map_or_else(|| "(none)".to_string(), |p| p.display().to_string());
    fs.set_permissions(&layout.data_dir, 0o700).with_context(|| {
        format!(
            "restored data is in {}, previous data in {previous}; kubelet is stopped, start it with: systemctl start kubelet",
            layout.data_dir.display()
        )
    })?;
    reporter.success(&format!("Snapshot restored into {}", layout.data_dir.display()));

    reporter.step("Restarting kubelet...");
    run_checked(runner, "systemctl", &["restart", "kubelet"])
        .await
        .with_context(|| {
            format!(
                "kubelet did not restart after the restore (previous data in {previous}); start it with: systemctl start kubelet"
            )
        })?;

    let health_checks = wait_for_health(runner, reporter, layout, req.health, aside.as_deref()).await?;
    info!(%member, revision = status.revision, "etcd restored");
    Ok(RestoreOutcome {
        status,
        aside,
        health_checks,
    })
}

/// Stop running etcd and kube-apiserver containers so kubelet recreates
/// them against the restored data.
async fn stop_etcd_containers(runner: &impl CommandRunner, reporter: &impl ProgressReporter) {
    for name in ["etcd", "kube-apiserver"] {
        let ids = match run_checked(runner, "crictl", &["ps", "-q", "--name", name]).await {
            Ok(out) => stdout_of(&out),
            Err(e) => {
                warn!(container = name, error = %e, "cannot list containers");
                reporter.warn(&format!("Cannot list {name} containers: {e}"));
                continue;
            }
        };
        let ids: Vec<&str> = ids.split_whitespace().collect();
        if ids.is_empty() {
            continue;
        }
        let mut args = vec!["stop"];
        args.extend(ids.iter().copied());
        if let Err(e) = run_checked(runner, "crictl", &args).await {
            reporter.warn(&format!("Cannot stop {name} containers: {e}"));
        } else {
            debug!(container = name, count = ids.len(), "containers stopped");
        }
    }
}

async fn rollback(
    runner: &impl CommandRunner,
    fs: &impl HostFs,
    layout: &EtcdLayout,
    aside: Option<&Path>,
    cause: &str,
) -> EtcdError {
    let aside_display = aside.map_or_else(|| "(none)".to_string(), |p| p.display().to_string());
    let restored = move_back(fs, layout, aside);
    let restarted = run_checked(runner, "systemctl", &["start", "kubelet"]).await;
    match (restored, restarted) {
        (Ok(()), Ok(_)) => EtcdError::RestoreFailed {
            aside: aside_display,
            cause: cause.to_string(),
        },
        (Err(e), _) | (Ok(()), Err(e)) => EtcdError::RollbackFailed {
            aside: aside_display,
            data_dir: layout.data_dir.display().to_string(),
            cause: format!("{e:#} (after: {cause})"),
        },
    }
}

fn move_back(fs: &impl HostFs, layout: &EtcdLayout, aside: Option<&Path>) -> Result<()> {
    if fs.exists(&layout.data_dir) {
        fs.remove_dir_all(&layout.data_dir)?;
    }
    if let Some(aside) = aside {
        fs.rename(aside, &layout.data_dir)?;
    }
    Ok(())
}

async fn wait_for_health(
    runner: &impl CommandRunner,
    reporter: &impl ProgressReporter,
    layout: &EtcdLayout,
    poll: Poll,
    aside: Option<&Path>,
) -> Result<u32> {
    reporter.step("Waiting for etcd to report healthy...");
    let mut args = layout.tls_args();
    args.extend(["endpoint".to_string(), "health".to_string()]);
    for attempt in 1..=poll.attempts {
        if let Ok(out) = runner.run("etcdctl", &as_strs(&args)).await {
            let text = format!(
                "{}{}",
                String::from_utf8_lossy(&out.stdout),
                String::from_utf8_lossy(&out.stderr)
            );
            if out.status.success() && is_healthy_output(&text) {
                reporter.success(&format!("etcd healthy after {attempt} check(s)"));
                return Ok(attempt);
            }
            debug!(attempt, output = %text.trim(), "etcd not healthy yet");
        }
        if attempt < poll.attempts {
            tokio::time::sleep(poll.interval).await;
        }
    }
    Err(EtcdError::Unhealthy {
        attempts: poll.attempts,
        aside: aside.map_or_else(|| "(none)".to_string(), |p| p.display().to_string()),
    }
    .into())
}
