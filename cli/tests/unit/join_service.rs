//! Unit tests for joining workers and control planes.

#![allow(clippy::expect_used)]

use std::net::Ipv4Addr;

use hzkube_cli::application::services::join::{JoinRequest, join_node};
use hzkube_cli::domain::kubeadm::{CaCertHash, CertificateKey, Endpoint, JoinToken, NodeName};
use hzkube_cli::domain::{ClusterConfig, NetworkError};
use hzkube_cli::infra::fs::LocalFs;

use crate::helpers::{
    KubeFiles, NoopReporter, RecordingReporter, ScriptedRunner, err_output, netplan_for, put,
};

pub const TOKEN: &str = "abcdef.0123456789abcdef";
pub const HEX: &str = "5f0a8d7e7bd6d13be3d4f3cbd1f8e1e5b7d8f3c1a6b2f0e9d8c7b6a5f4e3d2c1";
const CERT_KEY: &str = "9a1b2c3d4e5f60718293a4b5c6d7e8f90a1b2c3d4e5f60718293a4b5c6d7e8f9";

fn request<'a>(
    config: &'a ClusterConfig,
    files: &'a hzkube_cli::application::services::kubeconfig::KubePaths<'a>,
    endpoint: &str,
    certificate_key: Option<&str>,
) -> JoinRequest<'a> {
    JoinRequest {
        config,
        endpoint: Endpoint::parse(endpoint).expect("endpoint"),
        token: JoinToken::parse(TOKEN).expect("token"),
        ca_hash: CaCertHash::from_hex(HEX).expect("hash"),
        node_name: Some(NodeName::parse("worker-1").expect("name")),
        node_ip: None,
        certificate_key: certificate_key.map(|k| CertificateKey::parse(k).expect("key")),
        sudo_user: None,
        paths: files,
    }
}

#[tokio::test]
async fn test_worker_join_uses_vswitch_address() {
    let dir = tempfile::tempdir().expect("tempdir");
    let files = KubeFiles::new(dir.path());
    put(&files.netplan_file, &netplan_for("10.0.0.3/24"));
    let config = ClusterConfig::default();
    let paths = files.paths();
    let runner = ScriptedRunner::new();

    let ip = join_node(
        &runner,
        &LocalFs,
        &NoopReporter,
        request(&config, &paths, "10.0.0.2:6443", None),
    )
    .await
    .expect("join");

    assert_eq!(ip, Ipv4Addr::new(10, 0, 0, 3));
    let join = runner.call("kubeadm join").expect("kubeadm join").line;
    assert_eq!(
        join,
        format!(
            "kubeadm join 10.0.0.2:6443 --token {TOKEN} --discovery-token-ca-cert-hash sha256:{HEX} --node-name=worker-1"
        )
    );
    assert_eq!(
        std::fs::read_to_string(&files.kubelet_defaults).expect("kubelet defaults"),
        "KUBELET_EXTRA_ARGS=--node-ip=10.0.0.3\n"
    );
    assert!(!files.root_home.join(".kube/config").exists());
}

#[tokio::test]
async fn test_join_rejects_endpoint_outside_vswitch() {
    let dir = tempfile::tempdir().expect("tempdir");
    let files = KubeFiles::new(dir.path());
    put(&files.netplan_file, &netplan_for("10.0.0.3/24"));
    let config = ClusterConfig::default();
    let paths = files.paths();
    let runner = ScriptedRunner::new();

    let err = join_node(
        &runner,
        &LocalFs,
        &NoopReporter,
        request(&config, &paths, "203.0.113.10:6443", None),
    )
    .await
    .expect_err("public endpoint");

    assert!(matches!(
        err.downcast_ref::<NetworkError>(),
        Some(NetworkError::OutsideSubnet { .. })
    ));
    assert!(runner.lines().is_empty());
    assert!(!files.kubelet_defaults.exists());
}

#[tokio::test]
async fn test_control_plane_join_advertises_node_ip_and_installs_kubeconfig() {
    let dir = tempfile::tempdir().expect("tempdir");
    let files = KubeFiles::new(dir.path());
    put(&files.netplan_file, &netplan_for("10.0.0.4/24"));
    let admin = files.admin_conf.clone();
    let config = ClusterConfig::default();
    let paths = files.paths();
    let runner = ScriptedRunner::new().on_with("kubeadm join", move |_| {
        put(&admin, "apiVersion: v1\nkind: Config\n");
        crate::helpers::ok_output(b"")
    });

    join_node(
        &runner,
        &LocalFs,
        &NoopReporter,
        request(&config, &paths, "10.0.0.2", Some(CERT_KEY)),
    )
    .await
    .expect("join");

    let join = runner.call("kubeadm join").expect("kubeadm join").line;
    assert!(join.contains("10.0.0.2:6443"));
    assert!(join.contains("--control-plane"));
    assert!(join.contains(&format!("--certificate-key={CERT_KEY}")));
    assert!(join.contains("--apiserver-advertise-address=10.0.0.4"));
    assert_eq!(
        std::fs::read_to_string(files.root_home.join(".kube/config")).expect("kubeconfig"),
        "apiVersion: v1\nkind: Config\n"
    );
}

#[tokio::test]
async fn test_unreachable_api_server_only_warns() {
    let dir = tempfile::tempdir().expect("tempdir");
    let files = KubeFiles::new(dir.path());
    put(&files.netplan_file, &netplan_for("10.0.0.3/24"));
    let config = ClusterConfig::default();
    let paths = files.paths();
    let runner = ScriptedRunner::new().on("curl -ksf", err_output(7, b"Failed to connect"));
    let reporter = RecordingReporter::default();

    join_node(
        &runner,
        &LocalFs,
        &reporter,
        request(&config, &paths, "10.0.0.2:6443", None),
    )
    .await
    .expect("join proceeds");

    assert!(runner.ran("curl -ksf --max-time 5 https://10.0.0.2:6443/livez"));
    assert!(runner.ran("kubeadm join"));
    assert!(
        reporter
            .warnings()
            .iter()
            .any(|w| w.contains("did not answer"))
    );
}
