//! Unit tests for cluster status gathering.

#![allow(clippy::expect_used)]

use hzkube_cli::application::services::status::gather_status;
use hzkube_cli::domain::collect_issues;
use hzkube_cli::infra::fs::LocalFs;

use crate::helpers::{ScriptedRunner, err_output, etcd_layout, ok_output, put};

const NODES: &str = r#"{"items":[
  {"metadata":{"name":"cp1"},"status":{
    "conditions":[{"type":"Ready","status":"True"}],
    "addresses":[{"type":"InternalIP","address":"10.0.0.2"}],
    "nodeInfo":{"kubeletVersion":"v1.30.2"}}},
  {"metadata":{"name":"worker-1"},"status":{
    "conditions":[{"type":"Ready","status":"False"}],
    "addresses":[{"type":"InternalIP","address":"10.0.0.3"}],
    "nodeInfo":{"kubeletVersion":"v1.30.2"}}}
]}"#;

const CALICO_READY: &str = r#"{"status":{"desiredNumberScheduled":2,"updatedNumberScheduled":2,"numberReady":2,"numberAvailable":2}}"#;

#[tokio::test]
async fn test_status_reports_nodes_calico_and_etcd() {
    let dir = tempfile::tempdir().expect("tempdir");
    let layout = etcd_layout(dir.path());
    put(&layout.etcd_manifest(), "spec: {}\n");
    let kubeconfig = dir.path().join("admin.conf");
    put(&kubeconfig, "kind: Config\n");
    let flag = format!("kubectl --kubeconfig={}", kubeconfig.display());
    let runner = ScriptedRunner::new()
        .on(&format!("{flag} get nodes"), ok_output(NODES.as_bytes()))
        .on(&format!("{flag} -n kube-system"), ok_output(CALICO_READY.as_bytes()))
        .on(
            "etcdctl --endpoints",
            ok_output(b"https://127.0.0.1:2379 is healthy: successfully committed proposal\n"),
        );

    let report = gather_status(&runner, &LocalFs, &kubeconfig, &layout).await;

    let nodes = report.nodes.as_ref().expect("nodes");
    assert_eq!(nodes.len(), 2);
    assert_eq!(nodes[0].internal_ip.as_deref(), Some("10.0.0.2"));
    assert!(report.calico.expect("calico").is_rolled_out());
    assert_eq!(report.etcd_healthy, Some(true));
    assert_eq!(
        collect_issues(&report),
        vec!["Node worker-1 is NotReady".to_string()]
    );
}

#[tokio::test]
async fn test_status_on_worker_without_api_access() {
    let dir = tempfile::tempdir().expect("tempdir");
    let layout = etcd_layout(dir.path());
    let kubeconfig = dir.path().join("missing.conf");
    let runner = ScriptedRunner::new().on(
        "kubectl",
        err_output(1, b"The connection to the server localhost:8080 was refused"),
    );

    let report = gather_status(&runner, &LocalFs, &kubeconfig, &layout).await;

    assert!(report.nodes.is_none());
    assert!(report.calico.is_none());
    assert_eq!(report.etcd_healthy, None);
    assert!(!runner.ran("etcdctl"));
    assert!(runner.lines().iter().all(|l| !l.contains("--kubeconfig")));
    let issues = collect_issues(&report);
    assert!(issues.iter().any(|i| i.contains("API server unreachable")));
    assert!(issues.iter().any(|i| i.contains("calico-node")));
}
