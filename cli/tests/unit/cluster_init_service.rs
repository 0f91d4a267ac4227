//! Unit tests for first control plane bootstrap and join material.

#![allow(clippy::expect_used)]

use std::net::Ipv4Addr;
use std::process::Output;

use hzkube_cli::application::services::cluster_init::{InitRequest, init_cluster};
use hzkube_cli::application::services::join_command::create_join_command;
use hzkube_cli::domain::{ClusterConfig, KubeadmError, NetworkError};
use hzkube_cli::infra::fs::LocalFs;

use crate::helpers::{KubeFiles, NoopReporter, ScriptedRunner, netplan_for, ok_output, put};
use crate::join_service::{HEX, TOKEN};

const CALICO: &str = r#"kind: DaemonSet
spec:
  template:
    spec:
      containers:
        - name: calico-node
          env:
            # Auto-detect the BGP IP address.
            - name: IP
              value: "autodetect"
            # - name: CALICO_IPV4POOL_CIDR
            #   value: "192.168.0.0/16"
"#;

fn daemonset(desired: u32, ready: u32) -> Output {
    ok_output(
        format!(
            r#"{{"status":{{"desiredNumberScheduled":{desired},"updatedNumberScheduled":{desired},"numberReady":{ready},"numberAvailable":{ready}}}}}"#
        )
        .as_bytes(),
    )
}

fn printed_join() -> Output {
    ok_output(
        format!(
            "kubeadm join 10.0.0.2:6443 --token {TOKEN} --discovery-token-ca-cert-hash sha256:{HEX} \n"
        )
        .as_bytes(),
    )
}

/// Runner for a successful init; `kubeadm init` writes admin.conf.
fn init_runner(files: &KubeFiles, rollout: Vec<Output>, digest: &str) -> ScriptedRunner {
    let admin = files.admin_conf.clone();
    let apply = format!("kubectl --kubeconfig={} apply", files.admin_conf.display());
    let home = files.root_home.parent().expect("root").join("home/alice");
    ScriptedRunner::new()
        .on_with("kubeadm init --", move |_| {
            put(&admin, "apiVersion: v1\nkind: Config\n");
            ok_output(b"")
        })
        .on("curl -fsSL", ok_output(CALICO.as_bytes()))
        .on(&apply, ok_output(b"daemonset.apps/calico-node created\n"))
        .on_seq("kubectl", rollout)
        .on("kubeadm token create", printed_join())
        .on("openssl x509", ok_output(b"-----BEGIN PUBLIC KEY-----\nMIIB\n-----END PUBLIC KEY-----\n"))
        .on("openssl pkey", ok_output(b"\x30\x82\x01\x22"))
        .on("openssl dgst", ok_output(format!("SHA2-256(stdin)= {digest}\n").as_bytes()))
        .on(
            "getent passwd alice",
            ok_output(format!("alice:x:1000:1000:Alice:{}:/bin/bash\n", home.display()).as_bytes()),
        )
}

fn fast_config() -> ClusterConfig {
    let mut config = ClusterConfig::default();
    config.rollout.attempts = 3;
    config.rollout.interval_secs = 0;
    config
}

#[tokio::test]
async fn test_init_bootstraps_control_plane_and_calico() {
    let dir = tempfile::tempdir().expect("tempdir");
    let files = KubeFiles::new(dir.path());
    put(&files.netplan_file, &netplan_for("10.0.0.2/24"));
    let config = fast_config();
    let paths = files.paths();
    let runner = init_runner(&files, vec![daemonset(1, 0), daemonset(1, 1)], HEX);

    let result = init_cluster(
        &runner,
        &LocalFs,
        &NoopReporter,
        &InitRequest {
            config: &config,
            node_ip: None,
            node_name: None,
            sudo_user: Some("alice"),
            paths: &paths,
        },
    )
    .await
    .expect("init");

    assert_eq!(result.node_ip, Ipv4Addr::new(10, 0, 0, 2));
    assert!(result.calico.is_rolled_out());
    assert_eq!(result.join.command.endpoint.to_string(), "10.0.0.2:6443");
    assert!(result.join.certificate_key.is_none());

    let init = runner.call("kubeadm init").expect("kubeadm init").line;
    assert!(init.contains("--apiserver-advertise-address=10.0.0.2"));
    assert!(init.contains("--control-plane-endpoint=10.0.0.2:6443"));
    assert!(init.contains("--pod-network-cidr=192.168.0.0/16"));

    let apply = runner.call("kubectl --kubeconfig=").expect("apply");
    let manifest = String::from_utf8(apply.stdin.expect("manifest on stdin")).expect("utf8");
    assert!(manifest.contains(r#"value: "192.168.0.0/16""#));
    assert!(manifest.contains(r#"value: "cidr=10.0.0.0/24""#));

    assert_eq!(
        std::fs::read_to_string(&files.kubelet_defaults).expect("kubelet defaults"),
        "KUBELET_EXTRA_ARGS=--node-ip=10.0.0.2\n"
    );
    assert!(files.root_home.join(".kube/config").exists());
    assert!(dir.path().join("home/alice/.kube/config").exists());
    let chown = runner.call("chown -R 1000:1000").expect("chown");
    assert!(chown.line.ends_with("home/alice/.kube"));

    assert!(runner.position("kubeadm init") < runner.position("curl -fsSL"));
    assert!(runner.position("curl -fsSL") < runner.position("kubeadm token create"));
}

#[tokio::test]
async fn test_init_rejects_pod_network_overlapping_vswitch() {
    let dir = tempfile::tempdir().expect("tempdir");
    let files = KubeFiles::new(dir.path());
    put(&files.netplan_file, &netplan_for("10.0.0.2/24"));
    let mut config = fast_config();
    config.kubernetes.pod_cidr = "10.0.0.0/16".to_string();
    let paths = files.paths();
    let runner = ScriptedRunner::new();

    let err = init_cluster(
        &runner,
        &LocalFs,
        &NoopReporter,
        &InitRequest {
            config: &config,
            node_ip: None,
            node_name: None,
            sudo_user: None,
            paths: &paths,
        },
    )
    .await
    .expect_err("overlap");

    assert!(matches!(
        err.downcast_ref::<NetworkError>(),
        Some(NetworkError::Overlap { .. })
    ));
    assert!(runner.lines().is_empty());
}

#[tokio::test]
async fn test_init_fails_when_calico_never_rolls_out() {
    let dir = tempfile::tempdir().expect("tempdir");
    let files = KubeFiles::new(dir.path());
    put(&files.netplan_file, &netplan_for("10.0.0.2/24"));
    let config = fast_config();
    let paths = files.paths();
    let runner = init_runner(&files, vec![daemonset(2, 0)], HEX);

    let err = init_cluster(
        &runner,
        &LocalFs,
        &NoopReporter,
        &InitRequest {
            config: &config,
            node_ip: None,
            node_name: None,
            sudo_user: None,
            paths: &paths,
        },
    )
    .await
    .expect_err("rollout timeout");

    assert!(
        err.to_string()
            .contains("did not roll out after 3 checks (0/2 ready)")
    );
    assert!(!runner.ran("kubeadm token create"));
}

#[tokio::test]
async fn test_join_command_rejects_mismatched_ca_hash() {
    let dir = tempfile::tempdir().expect("tempdir");
    let files = KubeFiles::new(dir.path());
    let runner = init_runner(&files, vec![daemonset(1, 1)], &"0".repeat(64));

    let err = create_join_command(
        &runner,
        &NoopReporter,
        &files.admin_conf,
        &files.ca_cert,
        false,
    )
    .await
    .expect_err("mismatch");

    assert!(matches!(
        err.downcast_ref::<KubeadmError>(),
        Some(KubeadmError::CaHashMismatch { .. })
    ));
}

#[tokio::test]
async fn test_join_command_for_control_plane_uploads_certs() {
    let dir = tempfile::tempdir().expect("tempdir");
    let files = KubeFiles::new(dir.path());
    let key = "9a1b2c3d4e5f60718293a4b5c6d7e8f90a1b2c3d4e5f60718293a4b5c6d7e8f9";
    let runner = init_runner(&files, vec![daemonset(1, 1)], HEX).on(
        "kubeadm init phase upload-certs",
        ok_output(format!("[upload-certs] Using certificate key:\n{key}\n").as_bytes()),
    );

    let join = create_join_command(
        &runner,
        &NoopReporter,
        &files.admin_conf,
        &files.ca_cert,
        true,
    )
    .await
    .expect("join command");

    assert_eq!(join.certificate_key.expect("key").as_str(), key);
    let pkey = runner.call("openssl pkey").expect("pkey");
    assert_eq!(
        pkey.stdin.expect("pem on stdin"),
        b"-----BEGIN PUBLIC KEY-----\nMIIB\n-----END PUBLIC KEY-----\n".to_vec()
    );
}
