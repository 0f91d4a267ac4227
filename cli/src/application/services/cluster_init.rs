//! Application service: first control plane bootstrap: `kubeadm init`,
//! kubeconfig, Calico, and the join command for the next nodes.

use std::net::Ipv4Addr;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::application::ports::{CommandRunner, HostFs, ProgressReporter};
use crate::application::services::exec::{
    as_strs, run_checked, run_checked_slow, run_checked_stdin, stdout_of,
};
use crate::application::services::join_command::{JoinInstructions, create_join_command};
use crate::application::services::kubeconfig::{KubePaths, install_kubeconfig};
use crate::application::services::vswitch::resolve_node_ip;
use crate::domain::kubeadm::{InitPlan, NodeName, init_args};
use crate::domain::manifest::{customize_calico, kubelet_defaults};
use crate::domain::network::{cidrs_overlap, ensure_disjoint};
use crate::domain::{ClusterConfig, Poll, Rollout, health};

/// Request for [`init_cluster`].
#[derive(Debug, Clone)]
pub struct InitRequest<'a> {
    pub config: &'a ClusterConfig,
    /// `--node-ip`; defaults to the address in the netplan file.
    pub node_ip: Option<Ipv4Addr>,
    pub node_name: Option<&'a NodeName>,
    /// `$SUDO_USER`, who also receives a kubeconfig.
    pub sudo_user: Option<&'a str>,
    pub paths: &'a KubePaths<'a>,
}

/// Outcome of [`init_cluster`].
#[derive(Debug, Clone)]
pub struct InitResult {
    pub node_ip: Ipv4Addr,
    pub calico: Rollout,
    pub join: JoinInstructions,
}

/// Bootstrap the first control plane on the vSwitch address.
///
/// # Errors
///
/// Returns an error if validation fails, a command fails, or Calico does
/// not roll out within the configured polling window.
pub async fn init_cluster(
    runner: &impl CommandRunner,
    fs: &impl HostFs,
    reporter: &impl ProgressReporter,
    req: &InitRequest<'_>,
) -> Result<InitResult> {
    let config = req.config;
    let pod_cidr = config.pod_cidr()?;
    let service_cidr = config.service_cidr()?;
    let (node_ip, subnet) = resolve_node_ip(
        fs,
        req.paths.netplan_file,
        req.node_ip,
        config.vswitch_subnet()?.as_ref(),
    )?;
    ensure_disjoint(&pod_cidr, &subnet)?;
    if cidrs_overlap(&service_cidr, &subnet) {
        anyhow::bail!(
            "Service network {} overlaps the vSwitch subnet {subnet}.\n\nChoose a disjoint range with: hzkube config set kubernetes.service_cidr <cidr>",
            service_cidr.network()
        );
    }
    reporter.success(&format!("Node IP {node_ip} in vSwitch subnet {subnet}"));

    write_kubelet_defaults(fs, req.paths, node_ip)?;

    reporter.step("Running kubeadm init (this takes a few minutes)...");
    let args = init_args(&InitPlan {
        node_ip,
        api_port: config.kubernetes.api_port,
        pod_cidr: &pod_cidr,
        service_cidr: &service_cidr,
        kubernetes_version: &config.kubernetes.version,
        node_name: req.node_name,
    });
    run_checked_slow(runner, "kubeadm", &as_strs(&args))
        .await
        .context("kubeadm init failed; inspect with: journalctl -u kubelet")?;
    reporter.success(&format!(
        "Control plane initialised at {node_ip}:{}",
        config.kubernetes.api_port
    ));

    install_kubeconfig(runner, fs, reporter, req.paths, req.sudo_user).await?;

    reporter.step(&format!("Installing Calico {}...", config.calico.version));
    let url = config.calico.manifest_url();
    let manifest = run_checked(runner, "curl", &["-fsSL", &url])
        .await
        .with_context(|| format!("downloading {url}"))?;
    let customized = customize_calico(
        &String::from_utf8_lossy(&manifest.stdout),
        &pod_cidr,
        &subnet,
    )?;
    let kubeconfig = format!("--kubeconfig={}", req.paths.admin_conf.display());
    run_checked_stdin(
        runner,
        "kubectl",
        &[&kubeconfig, "apply", "-f", "-"],
        customized.as_bytes(),
    )
    .await
    .context("applying the Calico manifest")?;

    let calico = wait_for_calico(runner, reporter, &kubeconfig, config.rollout.poll()).await?;

    let join = create_join_command(
        runner,
        reporter,
        req.paths.admin_conf,
        req.paths.ca_cert,
        false,
    )
    .await?;
    info!(%node_ip, "cluster initialised");
    Ok(InitResult {
        node_ip,
        calico,
        join,
    })
}

/// Write `/etc/default/kubelet` so kubelet registers with the vSwitch IP.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn write_kubelet_defaults(
    fs: &impl HostFs,
    paths: &KubePaths<'_>,
    node_ip: Ipv4Addr,
) -> Result<()> {
    if let Some(dir) = paths.kubelet_defaults.parent() {
        fs.create_dir_all(dir)?;
    }
    fs.write(paths.kubelet_defaults, kubelet_defaults(node_ip).as_bytes())
}

async fn wait_for_calico(
    runner: &impl CommandRunner,
    reporter: &impl ProgressReporter,
    kubeconfig: &str,
    poll: Poll,
) -> Result<Rollout> {
    reporter.step("Waiting for calico-node to roll out...");
    let args = [
        kubeconfig,
        "-n",
        "kube-system",
        "get",
        "daemonset",
        "calico-node",
        "-o",
        "json",
    ];
    let mut last = None;
    for attempt in 1..=poll.attempts {
        if let Ok(out) = run_checked(runner, "kubectl", &args).await {
            match health::parse_daemonset_rollout(&stdout_of(&out)) {
                Ok(rollout) if rollout.is_rolled_out() => {
                    reporter.success(&format!(
                        "calico-node ready on {} node(s)",
                        rollout.ready
                    ));
                    return Ok(rollout);
                }
                Ok(rollout) => last = Some(rollout),
                Err(e) => debug!(attempt, error = %e, "unparsable daemonset"),
            }
        }
        if attempt < poll.attempts {
            tokio::time::sleep(poll.interval).await;
        }
    }
    let progress = last.map_or_else(
        || "daemonset not found".to_string(),
        |r| format!("{}/{} ready", r.ready, r.desired),
    );
    anyhow::bail!(
        "calico-node did not roll out after {} checks ({progress}).\n\nInspect with: kubectl -n kube-system get pods -l k8s-app=calico-node",
        poll.attempts
    )
}
