//! Application service: Hetzner vSwitch VLAN interface configuration.

use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

use crate::application::ports::{CommandRunner, HostFs, ProgressReporter};
use crate::application::services::exec::{run_checked, stdout_of};
use crate::domain::config::VswitchConfig;
use crate::domain::error::PreflightError;
use crate::domain::manifest::{VlanSpec, extract_cidr, render_netplan};
use crate::domain::network::{
    Ipv4Cidr, addr_output_has, ensure_in_subnet, parse_default_route_interface,
    validate_vlan_id, vlan_interface_name,
};

/// Netplan file owned by this tool.
pub const NETPLAN_FILE: &str = "/etc/netplan/60-hzkube-vswitch.yaml";

/// Request for [`configure_vswitch`].
#[derive(Debug, Clone)]
pub struct VswitchRequest<'a> {
    pub address: Ipv4Cidr,
    pub settings: &'a VswitchConfig,
    /// `--vlan` override.
    pub vlan_id: Option<u16>,
    /// `--parent` override.
    pub parent: Option<&'a str>,
    pub netplan_file: &'a Path,
}

/// Outcome of [`configure_vswitch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VswitchResult {
    pub interface: String,
    pub address: Ipv4Cidr,
    pub netplan_file: PathBuf,
}

/// Validate the address and write/apply the netplan VLAN definition.
///
/// # Errors
///
/// Returns an error if validation fails, the uplink cannot be determined,
/// or `netplan apply` / the post-apply address check fails.
pub async fn configure_vswitch(
    runner: &impl CommandRunner,
    fs: &impl HostFs,
    reporter: &impl ProgressReporter,
    req: &VswitchRequest<'_>,
) -> Result<VswitchResult> {
    req.address.ensure_host_address()?;
    if let Some(subnet) = req.settings.subnet.as_deref() {
        let subnet = Ipv4Cidr::parse(subnet).context("parsing vswitch.subnet from config")?;
        ensure_in_subnet(req.address.address, &subnet)?;
    }
    let vlan_id = validate_vlan_id(req.vlan_id.unwrap_or(req.settings.vlan_id))?;

    reporter.step("Resolving uplink interface...");
    let parent = match req.parent.or(req.settings.parent_interface.as_deref()) {
        Some(p) => p.to_string(),
        None => detect_uplink(runner).await?,
    };
    let interface = vlan_interface_name(&parent, vlan_id);
    reporter.success(&format!("Uplink {parent}, VLAN interface {interface}"));

    let yaml = render_netplan(&VlanSpec {
        parent: &parent,
        vlan_id,
        mtu: req.settings.mtu,
        address: req.address,
    })?;
    reporter.step(&format!("Writing {}...", req.netplan_file.display()));
    if let Some(dir) = req.netplan_file.parent() {
        fs.create_dir_all(dir)?;
    }
    fs.write(req.netplan_file, yaml.as_bytes())?;
    fs.set_permissions(req.netplan_file, 0o600)?;

    reporter.step("Applying netplan...");
    run_checked(runner, "netplan", &["apply"])
        .await
        .context("netplan apply failed; check the file with: netplan try")?;

    let shown = run_checked(runner, "ip", &["-o", "-4", "addr", "show", "dev", &interface])
        .await
        .with_context(|| format!("interface {interface} did not come up"))?;
    if !addr_output_has(&stdout_of(&shown), &req.address) {
        anyhow::bail!(
            "{interface} is up but does not carry {}.\n\nInspect with: ip addr show dev {interface}",
            req.address
        );
    }
    info!(%interface, address = %req.address, "vswitch configured");
    reporter.success(&format!("{interface} configured with {}", req.address));

    Ok(VswitchResult {
        interface,
        address: req.address,
        netplan_file: req.netplan_file.to_path_buf(),
    })
}

async fn detect_uplink(runner: &impl CommandRunner) -> Result<String> {
    let routes = run_checked(runner, "ip", &["-o", "-4", "route", "show", "to", "default"])
        .await
        .context("reading default route")?;
    Ok(parse_default_route_interface(&stdout_of(&routes))?)
}

/// The vSwitch address recorded in the netplan file by [`configure_vswitch`].
///
/// # Errors
///
/// Returns [`PreflightError::NoNodeIp`] when the file is missing or has no
/// address, or a parse error for a malformed address.
pub fn recorded_address(fs: &impl HostFs, netplan_file: &Path) -> Result<Ipv4Cidr> {
    let missing = || PreflightError::NoNodeIp(netplan_file.display().to_string());
    if !fs.is_file(netplan_file) {
        return Err(missing().into());
    }
    let text = fs.read_to_string(netplan_file)?;
    extract_cidr(&text, "addresses")?.ok_or_else(|| missing().into())
}

/// Node IP from an explicit flag or the netplan file, checked against the
/// vSwitch subnet.
///
/// The subnet is the configured `vswitch.subnet`, or else the prefix
/// recorded in the netplan file.
///
/// # Errors
///
/// Returns an error if no address or subnet is available, or the address
/// lies outside the subnet.
pub fn resolve_node_ip(
    fs: &impl HostFs,
    netplan_file: &Path,
    explicit: Option<Ipv4Addr>,
    configured_subnet: Option<&Ipv4Cidr>,
) -> Result<(Ipv4Addr, Ipv4Cidr)> {
    let recorded = match recorded_address(fs, netplan_file) {
        Ok(cidr) => Some(cidr),
        Err(e) if e.downcast_ref::<PreflightError>().is_some() => None,
        Err(e) => return Err(e),
    };
    let ip = explicit
        .or(recorded.map(|r| r.address))
        .ok_or_else(|| PreflightError::NoNodeIp(netplan_file.display().to_string()))?;
    let subnet = configured_subnet
        .copied()
        .or(recorded.map(|r| r.network()))
        .ok_or(PreflightError::NoSubnet)?;
    ensure_in_subnet(ip, &subnet)?;
    Ok((ip, subnet))
}
