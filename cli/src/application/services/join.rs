//! Application service: join a worker or an extra control plane.

use std::net::Ipv4Addr;

use anyhow::{Context, Result};
use tracing::info;

use crate::application::ports::{CommandRunner, HostFs, ProgressReporter};
use crate::application::services::cluster_init::write_kubelet_defaults;
use crate::application::services::exec::{as_strs, run_checked_slow, succeeds};
use crate::application::services::kubeconfig::{KubePaths, install_kubeconfig};
use crate::application::services::vswitch::resolve_node_ip;
use crate::domain::ClusterConfig;
use crate::domain::kubeadm::{
    CaCertHash, CertificateKey, ControlPlaneJoin, Endpoint, JoinPlan, JoinToken, NodeName,
    join_args,
};
use crate::domain::network::ensure_in_subnet;

/// Validated request for [`join_node`].
#[derive(Debug, Clone)]
pub struct JoinRequest<'a> {
    pub config: &'a ClusterConfig,
    pub endpoint: Endpoint,
    pub token: JoinToken,
    pub ca_hash: CaCertHash,
    pub node_name: Option<NodeName>,
    pub node_ip: Option<Ipv4Addr>,
    /// `--control-plane --certificate-key`.
    pub certificate_key: Option<CertificateKey>,
    pub sudo_user: Option<&'a str>,
    pub paths: &'a KubePaths<'a>,
}

/// Run `kubeadm join` from the vSwitch address.
///
/// # Errors
///
/// Returns an error if the node or the endpoint lie outside the vSwitch
/// subnet, or `kubeadm join` fails.
pub async fn join_node(
    runner: &impl CommandRunner,
    fs: &impl HostFs,
    reporter: &impl ProgressReporter,
    req: JoinRequest<'_>,
) -> Result<Ipv4Addr> {
    let (node_ip, subnet) = resolve_node_ip(
        fs,
        req.paths.netplan_file,
        req.node_ip,
        req.config.vswitch_subnet()?.as_ref(),
    )?;
    ensure_in_subnet(req.endpoint.host, &subnet)
        .context("the API endpoint must be reached over the vSwitch")?;
    reporter.success(&format!("Node IP {node_ip} in vSwitch subnet {subnet}"));

    let livez = format!("https://{}/livez", req.endpoint);
    if !succeeds(runner, "curl", &["-ksf", "--max-time", "5", &livez]).await {
        reporter.warn(&format!(
            "API server {} did not answer; kubeadm will keep retrying",
            req.endpoint
        ));
    }

    write_kubelet_defaults(fs, req.paths, node_ip)?;

    let control_plane = req.certificate_key.is_some();
    let plan = JoinPlan {
        endpoint: req.endpoint,
        token: req.token,
        ca_hash: req.ca_hash,
        node_name: req.node_name,
        control_plane: req.certificate_key.map(|certificate_key| ControlPlaneJoin {
            certificate_key,
            advertise_address: node_ip,
        }),
    };
    reporter.step(&format!(
        "Joining {} as a {}...",
        plan.endpoint,
        if control_plane { "control plane" } else { "worker" }
    ));
    run_checked_slow(runner, "kubeadm", &as_strs(&join_args(&plan)))
        .await
        .context("kubeadm join failed; inspect with: journalctl -u kubelet")?;
    reporter.success(&format!("Node joined the cluster at {}", plan.endpoint));

    if control_plane {
        install_kubeconfig(runner, fs, reporter, req.paths, req.sudo_user).await?;
    }
    info!(%node_ip, endpoint = %plan.endpoint, control_plane, "node joined");
    Ok(node_ip)
}
