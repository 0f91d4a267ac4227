//! Text-level reading and templating of YAML files owned by other tools:
//! netplan, kubeadm static pod manifests, and the upstream Calico manifest.
//!
//! Pure functions only, no I/O.

use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use regex::Regex;
use serde::Serialize;

use crate::domain::error::{ManifestError, NetworkError};
use crate::domain::network::{Ipv4Cidr, parse_ipv4};

// ── IP extraction ────────────────────────────────────────────────────────────

fn address_after_key(text: &str, key: &str) -> Option<(String, Option<String>)> {
    let pattern = format!(
        r#"(?m)^\s*(?:-\s*)?{}\s*:\s*(?:\[\s*)?(?:-\s*)?["']?(\d{{1,3}}(?:\.\d{{1,3}}){{3}})(?:/(\d{{1,2}}))?"#,
        regex::escape(key)
    );
    let re = Regex::new(&pattern).ok()?;
    let caps = re.captures(text)?;
    let ip = caps.get(1)?.as_str().to_string();
    let prefix = caps.get(2).map(|m| m.as_str().to_string());
    Some((ip, prefix))
}

/// First IPv4 address following `key:` in a YAML document.
///
/// Handles scalars (`advertiseAddress: 10.0.0.2`), quoted values, flow
/// lists (`addresses: [10.0.0.2/24]`) and block lists. A `/prefix` suffix is
/// ignored.
///
/// # Errors
///
/// Returns an error if the matched address has an octet outside `0..=255`.
pub fn extract_ipv4(text: &str, key: &str) -> Result<Option<Ipv4Addr>, NetworkError> {
    address_after_key(text, key)
        .map(|(ip, _)| parse_ipv4(&ip))
        .transpose()
}

/// Like [`extract_ipv4`] but keeps the prefix; `None` if no prefix is written.
///
/// # Errors
///
/// Returns an error if the matched address or prefix is invalid.
pub fn extract_cidr(text: &str, key: &str) -> Result<Option<Ipv4Cidr>, NetworkError> {
    match address_after_key(text, key) {
        Some((ip, Some(prefix))) => Ipv4Cidr::parse(&format!("{ip}/{prefix}")).map(Some),
        _ => Ok(None),
    }
}

/// Value of a `--flag=value` argument in a static pod manifest.
#[must_use]
pub fn extract_flag(manifest: &str, flag: &str) -> Option<String> {
    let pattern = format!(r"--{}=(\S+)", regex::escape(flag));
    let re = Regex::new(&pattern).ok()?;
    re.captures(manifest)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim_matches(|c| c == '"' || c == '\'').to_string())
}

// ── Netplan ──────────────────────────────────────────────────────────────────

/// vSwitch VLAN definition rendered into netplan.
#[derive(Debug, Clone)]
pub struct VlanSpec<'a> {
    /// Physical uplink, e.g. `enp0s31f6`.
    pub parent: &'a str,
    /// Hetzner VLAN id.
    pub vlan_id: u16,
    /// Interface MTU; Hetzner requires 1400 on vSwitch VLANs.
    pub mtu: u16,
    /// Address with prefix.
    pub address: Ipv4Cidr,
}

#[derive(Serialize)]
struct NetplanDoc {
    network: NetplanNetwork,
}

#[derive(Serialize)]
struct NetplanNetwork {
    version: u8,
    vlans: BTreeMap<String, NetplanVlan>,
}

#[derive(Serialize)]
struct NetplanVlan {
    id: u16,
    link: String,
    mtu: u16,
    addresses: Vec<String>,
}

/// Render the netplan document for the vSwitch VLAN interface.
///
/// # Errors
///
/// Returns an error if YAML serialization fails.
pub fn render_netplan(vlan: &VlanSpec<'_>) -> Result<String, ManifestError> {
    let mut vlans = BTreeMap::new();
    vlans.insert(
        crate::domain::network::vlan_interface_name(vlan.parent, vlan.vlan_id),
        NetplanVlan {
            id: vlan.vlan_id,
            link: vlan.parent.to_string(),
            mtu: vlan.mtu,
            addresses: vec![vlan.address.to_string()],
        },
    );
    let doc = NetplanDoc {
        network: NetplanNetwork { version: 2, vlans },
    };
    serde_yaml::to_string(&doc).map_err(|e| ManifestError::Render {
        what: "netplan",
        cause: e.to_string(),
    })
}

/// Name of the VLAN interface declared in a netplan file, e.g. `enp0s31f6.4000`.
#[must_use]
pub fn netplan_vlan_interface(text: &str) -> Option<String> {
    let re = Regex::new(r"(?m)^\s+([A-Za-z0-9_-]+\.\d{1,4}):\s*$").ok()?;
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

// ── kubelet ──────────────────────────────────────────────────────────────────

/// `/etc/default/kubelet` pinning kubelet to the vSwitch address.
#[must_use]
pub fn kubelet_defaults(node_ip: Ipv4Addr) -> String {
    format!("KUBELET_EXTRA_ARGS=--node-ip={node_ip}\n")
}

// ── Calico ───────────────────────────────────────────────────────────────────

fn split_indent(line: &str) -> (&str, &str) {
    let trimmed = line.trim_start();
    (&line[..line.len() - trimmed.len()], trimmed)
}

fn uncomment(trimmed: &str) -> &str {
    trimmed.trim_start_matches('#').trim_start()
}

/// Template the upstream `calico.yaml`.
///
/// Sets `CALICO_IPV4POOL_CIDR` to the pod network (uncommenting the upstream
/// example when needed) and pins `IP_AUTODETECTION_METHOD` to the vSwitch
/// subnet so nodes peer over the private network, not the public uplink.
///
/// # Errors
///
/// Returns an error if the manifest lacks the pool CIDR entry or the
/// `calico-node` `IP=autodetect` entry.
pub fn customize_calico(
    manifest: &str,
    pod_cidr: &Ipv4Cidr,
    vswitch: &Ipv4Cidr,
) -> Result<String, ManifestError> {
    let lines: Vec<&str> = manifest.lines().collect();
    let has_autodetect = lines
        .iter()
        .any(|l| split_indent(l).1 == "- name: IP_AUTODETECTION_METHOD");
    let pool_value = format!("value: \"{}\"", pod_cidr.network());
    let detect_value = format!("value: \"cidr={}\"", vswitch.network());

    let mut out: Vec<String> = Vec::with_capacity(lines.len() + 2);
    let mut saw_pool = false;
    let mut saw_ip = false;
    let mut i = 0;
    while i < lines.len() {
        let (indent, trimmed) = split_indent(lines[i]);
        let next_is_value = lines
            .get(i + 1)
            .is_some_and(|n| uncomment(split_indent(n).1).starts_with("value:"));

        if uncomment(trimmed) == "- name: CALICO_IPV4POOL_CIDR" {
            saw_pool = true;
            out.push(format!("{indent}- name: CALICO_IPV4POOL_CIDR"));
            out.push(format!("{indent}  {pool_value}"));
            i += if next_is_value { 2 } else { 1 };
            continue;
        }
        if trimmed == "- name: IP_AUTODETECTION_METHOD" {
            out.push(lines[i].to_string());
            out.push(format!("{indent}  {detect_value}"));
            i += if next_is_value { 2 } else { 1 };
            continue;
        }
        if trimmed == "- name: IP"
            && lines
                .get(i + 1)
                .is_some_and(|n| split_indent(n).1 == "value: \"autodetect\"")
        {
            saw_ip = true;
            out.push(lines[i].to_string());
            out.push(lines[i + 1].to_string());
            if !has_autodetect {
                out.push(format!("{indent}- name: IP_AUTODETECTION_METHOD"));
                out.push(format!("{indent}  {detect_value}"));
            }
            i += 2;
            continue;
        }
        out.push(lines[i].to_string());
        i += 1;
    }

    if !saw_pool {
        return Err(ManifestError::MissingAnchor("CALICO_IPV4POOL_CIDR"));
    }
    if !saw_ip {
        return Err(ManifestError::MissingAnchor("calico-node IP=autodetect"));
    }
    let mut rendered = out.join("\n");
    rendered.push('\n');
    Ok(rendered)
}
