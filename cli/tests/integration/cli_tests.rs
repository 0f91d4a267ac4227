#![allow(clippy::expect_used)]

use assert_cmd::prelude::*;
use predicates::prelude::*;

use crate::hzkube;

#[test]
fn test_help() {
    hzkube()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Hetzner bare metal"))
        .stdout(predicate::str::contains("join-command"));
}

#[test]
fn test_version() {
    hzkube()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("hzkube"));
}

#[test]
fn test_version_json() {
    let out = hzkube()
        .args(["version", "--json"])
        .output()
        .expect("run hzkube");
    assert!(out.status.success());
    let value: serde_json::Value = serde_json::from_slice(&out.stdout).expect("json");
    assert_eq!(value["version"], env!("CARGO_PKG_VERSION"));
}

#[test]
fn test_no_color_env_accepts_common_values() {
    for value in ["1", "true", "", "0"] {
        hzkube()
            .env("NO_COLOR", value)
            .args(["version", "--json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"version\""));
    }
}

#[test]
fn test_no_subcommand_shows_help() {
    hzkube()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_vswitch_rejects_bad_octet_before_root_check() {
    hzkube()
        .args(["vswitch", "10.0.0.300/24"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("out of range"));
}

#[test]
fn test_vswitch_rejects_network_address() {
    hzkube()
        .args(["vswitch", "10.0.0.0/24"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("10.0.0.0"));
}

#[test]
fn test_join_rejects_malformed_token() {
    hzkube()
        .args([
            "join",
            "10.0.0.2:6443",
            "not-a-token",
            "sha256:5f0a8d7e7bd6d13be3d4f3cbd1f8e1e5b7d8f3c1a6b2f0e9d8c7b6a5f4e3d2c1",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid join token"));
}

#[test]
fn test_join_certificate_key_requires_control_plane() {
    hzkube()
        .args([
            "join",
            "10.0.0.2:6443",
            "abcdef.0123456789abcdef",
            "sha256:5f0a8d7e7bd6d13be3d4f3cbd1f8e1e5b7d8f3c1a6b2f0e9d8c7b6a5f4e3d2c1",
            "--certificate-key",
            "9a1b2c3d4e5f60718293a4b5c6d7e8f90a1b2c3d4e5f60718293a4b5c6d7e8f9",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--control-plane"));
}

#[test]
fn test_join_json_error_object() {
    let out = hzkube()
        .args(["--json", "join", "10.0.0.2:6443", "bad", "sha256:00"])
        .output()
        .expect("run hzkube");
    assert!(!out.status.success());
    let value: serde_json::Value = serde_json::from_slice(&out.stdout).expect("json error");
    assert_eq!(value["error"], true);
    assert_eq!(value["code"], "INVALID_JOIN_MATERIAL");
}

#[test]
fn test_restore_rejects_non_db_file() {
    hzkube()
        .args(["restore", "/tmp/etcd-backup.tar.gz"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("must end in .db"));
}
