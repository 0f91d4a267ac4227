//! Application service: iptables rules for cluster traffic on the vSwitch.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::application::ports::{CommandRunner, HostFs, ProgressReporter};
use crate::application::services::exec::{as_strs, run_checked, succeeds};
use crate::application::services::preflight::has_binary;
use crate::application::services::vswitch::recorded_address;
use crate::domain::firewall::{Rule, cluster_rules};
use crate::domain::manifest::netplan_vlan_interface;
use crate::domain::{ClusterConfig, PreflightError};

/// Rules for this node, from the config and the netplan file written by
/// `hzkube vswitch`.
///
/// # Errors
///
/// Returns an error if the netplan file is missing or the configured
/// networks are invalid.
pub fn host_rules(fs: &impl HostFs, config: &ClusterConfig, netplan_file: &Path) -> Result<Vec<Rule>> {
    let recorded = recorded_address(fs, netplan_file)?;
    let text = fs.read_to_string(netplan_file)?;
    let iface = netplan_vlan_interface(&text)
        .ok_or_else(|| PreflightError::NoNodeIp(netplan_file.display().to_string()))
        .context("no VLAN interface in the netplan file")?;
    let subnet = config.vswitch_subnet()?.unwrap_or_else(|| recorded.network());
    Ok(cluster_rules(
        &subnet,
        &config.pod_cidr()?,
        &iface,
        config.kubernetes.api_port,
    ))
}

/// Counts from [`apply_rules`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FirewallOutcome {
    pub added: usize,
    pub present: usize,
    pub persisted: bool,
}

/// Append every rule that `iptables -C` does not find.
///
/// # Errors
///
/// Returns an error if an `iptables -A` call fails.
pub async fn apply_rules(
    runner: &impl CommandRunner,
    reporter: &impl ProgressReporter,
    rules: &[Rule],
) -> Result<FirewallOutcome> {
    let mut outcome = FirewallOutcome::default();
    for rule in rules {
        let check = rule.check_args();
        if succeeds(runner, "iptables", &as_strs(&check)).await {
            reporter.step(&format!("Already allowed: {}", rule.description));
            outcome.present += 1;
            continue;
        }
        let append = rule.append_args();
        run_checked(runner, "iptables", &as_strs(&append)).await?;
        reporter.success(&format!("Allowed {}", rule.description));
        outcome.added += 1;
    }
    if outcome.added > 0 {
        outcome.persisted = persist(runner, reporter).await;
    }
    info!(added = outcome.added, present = outcome.present, "firewall rules applied");
    Ok(outcome)
}

/// Delete every rule that is present. Missing rules are skipped.
///
/// # Errors
///
/// Returns an error if an `iptables -D` call fails.
pub async fn remove_rules(
    runner: &impl CommandRunner,
    reporter: &impl ProgressReporter,
    rules: &[Rule],
) -> Result<usize> {
    let mut removed = 0;
    for rule in rules {
        if succeeds(runner, "iptables", &as_strs(&rule.check_args())).await {
            run_checked(runner, "iptables", &as_strs(&rule.delete_args())).await?;
            removed += 1;
        }
    }
    if removed > 0 {
        reporter.success(&format!("Removed {removed} firewall rule(s)"));
        persist(runner, reporter).await;
    }
    Ok(removed)
}

async fn persist(runner: &impl CommandRunner, reporter: &impl ProgressReporter) -> bool {
    if !has_binary(runner, "netfilter-persistent").await {
        reporter.warn("netfilter-persistent not installed; rules will not survive a reboot");
        return false;
    }
    let saved = succeeds(runner, "netfilter-persistent", &["save"]).await;
    if !saved {
        reporter.warn("netfilter-persistent save failed; rules will not survive a reboot");
    }
    saved
}
