//! Unit tests for node reset.

#![allow(clippy::expect_used)]

use hzkube_cli::application::services::firewall::host_rules;
use hzkube_cli::application::services::reset::reset_node;
use hzkube_cli::domain::ClusterConfig;
use hzkube_cli::infra::fs::LocalFs;

use crate::helpers::{KubeFiles, NoopReporter, ScriptedRunner, err_output, netplan_for, put};

#[tokio::test]
async fn test_reset_removes_leftovers_and_rules() {
    let dir = tempfile::tempdir().expect("tempdir");
    let files = KubeFiles::new(dir.path());
    put(&files.netplan_file, &netplan_for("10.0.0.3/24"));
    put(&files.cni_dir.join("10-calico.conflist"), "{}");
    put(&files.kubelet_defaults, "KUBELET_EXTRA_ARGS=--node-ip=10.0.0.3\n");
    put(&files.root_home.join(".kube/config"), "kind: Config\n");
    let rules = host_rules(&LocalFs, &ClusterConfig::default(), &files.netplan_file).expect("rules");
    let paths = files.paths();
    let runner = ScriptedRunner::new();

    let outcome = reset_node(&runner, &LocalFs, &NoopReporter, &paths, &rules)
        .await
        .expect("reset");

    assert_eq!(outcome.removed_paths.len(), 3);
    assert_eq!(outcome.removed_rules, rules.len());
    assert!(!files.cni_dir.exists());
    assert!(!files.kubelet_defaults.exists());
    assert!(!files.root_home.join(".kube/config").exists());
    assert!(files.netplan_file.exists(), "vSwitch config survives reset");
    assert_eq!(runner.position("kubeadm reset --force"), Some(0));
}

#[tokio::test]
async fn test_reset_stops_when_kubeadm_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    let files = KubeFiles::new(dir.path());
    put(&files.kubelet_defaults, "KUBELET_EXTRA_ARGS=--node-ip=10.0.0.3\n");
    let paths = files.paths();
    let runner = ScriptedRunner::new().on("kubeadm reset", err_output(1, b"unable to reset"));

    let err = reset_node(&runner, &LocalFs, &NoopReporter, &paths, &[])
        .await
        .expect_err("kubeadm fails");

    assert!(format!("{err:#}").contains("unable to reset"));
    assert!(files.kubelet_defaults.exists());
    assert!(!runner.ran("iptables"));
}
