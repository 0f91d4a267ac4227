//! Unit tests for etcd snapshots and retention.

#![allow(clippy::expect_used)]

use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use hzkube_cli::application::services::etcd_backup::{backup_etcd, prune_snapshots};
use hzkube_cli::domain::etcd::checksum_path;
use hzkube_cli::infra::fs::{LocalFs, sha256_file};

use crate::helpers::{
    NoopReporter, ScriptedRunner, err_output, etcd_layout, ok_output, put,
};

pub const STATUS_JSON: &[u8] =
    br#"{"hash":3273937040,"revision":182716,"totalKey":1245,"totalSize":7536640}"#;

/// Runner whose `snapshot save` writes `content` to the target path.
fn saving_runner(content: &'static str) -> ScriptedRunner {
    ScriptedRunner::new()
        .on("etcdctl snapshot status", ok_output(STATUS_JSON))
        .on_with("etcdctl --endpoints", move |args| {
            if args.contains(&"save") {
                let target = args.last().expect("target");
                put(Path::new(target), content);
            }
            ok_output(b"")
        })
}

#[tokio::test]
async fn test_backup_writes_snapshot_and_checksum_sidecar() {
    let dir = tempfile::tempdir().expect("tempdir");
    let layout = etcd_layout(dir.path());
    let runner = saving_runner("snapshot-bytes");

    let outcome = backup_etcd(&runner, &LocalFs, &NoopReporter, &layout, 0, "20260102-030405")
        .await
        .expect("backup");

    assert_eq!(
        outcome.snapshot,
        layout.backup_dir.join("etcd-snapshot-20260102-030405.db")
    );
    assert_eq!(outcome.status.revision, 182_716);
    assert_eq!(outcome.sha256, sha256_file(&outcome.snapshot).expect("hash"));
    let sidecar = std::fs::read_to_string(checksum_path(&outcome.snapshot)).expect("sidecar");
    assert_eq!(
        sidecar,
        format!("{}  etcd-snapshot-20260102-030405.db\n", outcome.sha256)
    );
    let mode = |p: &Path| std::fs::metadata(p).expect("meta").permissions().mode() & 0o777;
    assert_eq!(mode(&outcome.snapshot), 0o600);
    assert_eq!(mode(&layout.backup_dir), 0o700);
    assert!(outcome.pruned.is_empty());

    let save = runner.call("etcdctl --endpoints").expect("save call");
    assert!(save.line.contains("--cacert="));
    assert!(save.line.contains("snapshot save"));
}

#[tokio::test]
async fn test_backup_prunes_beyond_keep() {
    let dir = tempfile::tempdir().expect("tempdir");
    let layout = etcd_layout(dir.path());
    for stamp in ["20251230-000000", "20251231-000000", "20260101-000000"] {
        let snap = layout.snapshot_path(stamp);
        put(&snap, "old");
        put(&checksum_path(&snap), "x");
    }
    put(&layout.backup_dir.join("manual.db"), "keep me");
    let runner = saving_runner("new");

    let outcome = backup_etcd(&runner, &LocalFs, &NoopReporter, &layout, 2, "20260102-030405")
        .await
        .expect("backup");

    assert_eq!(
        outcome.pruned,
        vec![
            "etcd-snapshot-20251230-000000.db".to_string(),
            "etcd-snapshot-20251231-000000.db".to_string(),
        ]
    );
    assert!(!layout.snapshot_path("20251230-000000").exists());
    assert!(!checksum_path(&layout.snapshot_path("20251231-000000")).exists());
    assert!(layout.snapshot_path("20260101-000000").exists());
    assert!(layout.backup_dir.join("manual.db").exists());
}

#[tokio::test]
async fn test_backup_refuses_to_overwrite() {
    let dir = tempfile::tempdir().expect("tempdir");
    let layout = etcd_layout(dir.path());
    put(&layout.snapshot_path("20260102-030405"), "existing");
    let runner = saving_runner("new");

    let err = backup_etcd(&runner, &LocalFs, &NoopReporter, &layout, 0, "20260102-030405")
        .await
        .expect_err("exists");
    assert!(err.to_string().contains("already exists"));
    assert!(runner.lines().is_empty());
}

#[tokio::test]
async fn test_backup_reports_failed_save() {
    let dir = tempfile::tempdir().expect("tempdir");
    let layout = etcd_layout(dir.path());
    let runner = ScriptedRunner::new().on(
        "etcdctl --endpoints",
        err_output(1, b"context deadline exceeded"),
    );

    let err = backup_etcd(&runner, &LocalFs, &NoopReporter, &layout, 7, "20260102-030405")
        .await
        .expect_err("save failed");
    assert!(format!("{err:#}").contains("context deadline exceeded"));
    assert!(!runner.ran("etcdctl snapshot status"));
}

#[test]
fn test_prune_snapshots_with_nothing_to_do() {
    let dir = tempfile::tempdir().expect("tempdir");
    put(&dir.path().join("etcd-snapshot-20260101-000000.db"), "a");
    let pruned = prune_snapshots(&LocalFs, &NoopReporter, dir.path(), 3).expect("prune");
    assert!(pruned.is_empty());
}

#[tokio::test]
async fn test_backup_removes_snapshot_that_fails_verification() {
    let dir = tempfile::tempdir().expect("tempdir");
    let layout = etcd_layout(dir.path());
    let good = layout.snapshot_path("20260101-000000");
    put(&good, "verified");
    put(&checksum_path(&good), "x");
    let broken = ScriptedRunner::new()
        .on("etcdctl snapshot status", err_output(1, b"snapshot file has wrong size"))
        .on_with("etcdctl --endpoints", |args| {
            let target = args.last().expect("target");
            put(Path::new(target), "truncated");
            ok_output(b"")
        });

    let err = backup_etcd(&broken, &LocalFs, &NoopReporter, &layout, 2, "20260102-000000")
        .await
        .expect_err("verification failed");
    assert!(format!("{err:#}").contains("wrong size"));
    assert!(!layout.snapshot_path("20260102-000000").exists());
    assert!(!checksum_path(&layout.snapshot_path("20260102-000000")).exists());

    let outcome = backup_etcd(&saving_runner("new"), &LocalFs, &NoopReporter, &layout, 2, "20260103-000000")
        .await
        .expect("backup");
    assert!(outcome.pruned.is_empty());
    assert!(good.exists());
}
