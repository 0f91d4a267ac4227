//! Application service: cluster health gathering.
//!
//! Infallible: every probe failure is reflected as an absent field in the
//! report, which `collect_issues` turns into a problem line.

use std::path::Path;

use tracing::debug;

use crate::application::ports::{CommandRunner, HostFs};
use crate::application::services::exec::{as_strs, run_checked, stdout_of};
use crate::domain::ClusterReport;
use crate::domain::etcd::{EtcdLayout, is_healthy_output};
use crate::domain::health::{parse_daemonset_rollout, parse_nodes};

/// Gather node readiness, the Calico rollout and local etcd health.
///
/// `kubeconfig` is used when it exists; otherwise kubectl falls back to its
/// own defaults. etcd is only probed on control-plane nodes.
pub async fn gather_status(
    runner: &impl CommandRunner,
    fs: &impl HostFs,
    kubeconfig: &Path,
    layout: &EtcdLayout,
) -> ClusterReport {
    let flag = fs
        .is_file(kubeconfig)
        .then(|| format!("--kubeconfig={}", kubeconfig.display()));

    let nodes = kubectl_json(runner, flag.as_deref(), &["get", "nodes", "-o", "json"])
        .await
        .and_then(|json| {
            parse_nodes(&json)
                .inspect_err(|e| debug!(error = %e, "unparsable node list"))
                .ok()
        });
    let calico = kubectl_json(
        runner,
        flag.as_deref(),
        &["-n", "kube-system", "get", "daemonset", "calico-node", "-o", "json"],
    )
    .await
    .and_then(|json| parse_daemonset_rollout(&json).ok());

    let etcd_healthy = if fs.is_file(&layout.etcd_manifest()) {
        let mut args = layout.tls_args();
        args.extend(["endpoint".to_string(), "health".to_string()]);
        Some(
            run_checked(runner, "etcdctl", &as_strs(&args))
                .await
                .is_ok_and(|out| {
                    is_healthy_output(&format!(
                        "{}{}",
                        String::from_utf8_lossy(&out.stdout),
                        String::from_utf8_lossy(&out.stderr)
                    ))
                }),
        )
    } else {
        None
    };

    ClusterReport {
        nodes,
        calico,
        etcd_healthy,
    }
}

async fn kubectl_json(
    runner: &impl CommandRunner,
    kubeconfig_flag: Option<&str>,
    args: &[&str],
) -> Option<String> {
    let mut argv: Vec<&str> = kubeconfig_flag.into_iter().collect();
    argv.extend_from_slice(args);
    match run_checked(runner, "kubectl", &argv).await {
        Ok(out) => Some(stdout_of(&out)),
        Err(e) => {
            debug!(error = %e, "kubectl probe failed");
            None
        }
    }
}
