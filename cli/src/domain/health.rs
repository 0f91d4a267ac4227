//! Cluster health domain types and pure diagnostic functions.
//!
//! This module is intentionally free of I/O, async, and external layer imports.
//! All functions take data in and return data out.

use serde::{Deserialize, Serialize};

// ── kubectl JSON shapes (only the fields we read) ────────────────────────────

#[derive(Deserialize)]
struct NodeList {
    #[serde(default)]
    items: Vec<NodeItem>,
}

#[derive(Deserialize)]
struct NodeItem {
    metadata: Metadata,
    #[serde(default)]
    status: NodeStatusRaw,
}

#[derive(Deserialize)]
struct Metadata {
    name: String,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct NodeStatusRaw {
    #[serde(default)]
    conditions: Vec<Condition>,
    #[serde(default)]
    addresses: Vec<Address>,
    #[serde(default)]
    node_info: Option<NodeInfo>,
}

#[derive(Deserialize)]
struct Condition {
    #[serde(rename = "type")]
    kind: String,
    status: String,
}

#[derive(Deserialize)]
struct Address {
    #[serde(rename = "type")]
    kind: String,
    address: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NodeInfo {
    kubelet_version: String,
}

#[derive(Deserialize)]
struct DaemonSetRaw {
    #[serde(default)]
    status: DaemonSetStatusRaw,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct DaemonSetStatusRaw {
    #[serde(default)]
    desired_number_scheduled: u32,
    #[serde(default)]
    updated_number_scheduled: u32,
    #[serde(default)]
    number_ready: u32,
    #[serde(default)]
    number_available: u32,
}

// ── Types ─────────────────────────────────────────────────────────────────────

/// One cluster node as seen by `kubectl get nodes`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeHealth {
    pub name: String,
    pub ready: bool,
    pub internal_ip: Option<String>,
    pub kubelet_version: Option<String>,
}

/// DaemonSet rollout counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Rollout {
    pub desired: u32,
    pub updated: u32,
    pub ready: u32,
    pub available: u32,
}

impl Rollout {
    /// All desired pods are updated, ready and available (and there is at
    /// least one).
    #[must_use]
    pub fn is_rolled_out(&self) -> bool {
        self.desired > 0
            && self.updated >= self.desired
            && self.ready >= self.desired
            && self.available >= self.desired
    }
}

/// Everything `hzkube status` reports.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ClusterReport {
    /// `None` when `kubectl` could not reach the API server.
    pub nodes: Option<Vec<NodeHealth>>,
    /// `None` when the calico-node daemonset could not be read.
    pub calico: Option<Rollout>,
    /// `None` when this host is not a control plane (no etcd manifest).
    pub etcd_healthy: Option<bool>,
}

// ── Parsers ───────────────────────────────────────────────────────────────────

/// Parse `kubectl get nodes -o json`.
///
/// # Errors
///
/// Returns an error if the JSON does not have the node list shape.
pub fn parse_nodes(json: &str) -> Result<Vec<NodeHealth>, serde_json::Error> {
    let list: NodeList = serde_json::from_str(json)?;
    Ok(list
        .items
        .into_iter()
        .map(|item| NodeHealth {
            ready: item
                .status
                .conditions
                .iter()
                .any(|c| c.kind == "Ready" && c.status == "True"),
            internal_ip: item
                .status
                .addresses
                .iter()
                .find(|a| a.kind == "InternalIP")
                .map(|a| a.address.clone()),
            kubelet_version: item.status.node_info.map(|i| i.kubelet_version),
            name: item.metadata.name,
        })
        .collect())
}

/// Parse `kubectl get daemonset <name> -o json`.
///
/// # Errors
///
/// Returns an error if the JSON is malformed.
pub fn parse_daemonset_rollout(json: &str) -> Result<Rollout, serde_json::Error> {
    let ds: DaemonSetRaw = serde_json::from_str(json)?;
    Ok(Rollout {
        desired: ds.status.desired_number_scheduled,
        updated: ds.status.updated_number_scheduled,
        ready: ds.status.number_ready,
        available: ds.status.number_available,
    })
}

/// Collect human-readable problems from a report. Empty means healthy.
#[must_use]
pub fn collect_issues(report: &ClusterReport) -> Vec<String> {
    let mut issues = Vec::new();
    match &report.nodes {
        None => issues.push("Cannot list nodes: API server unreachable".to_string()),
        Some(nodes) if nodes.is_empty() => issues.push("No nodes registered".to_string()),
        Some(nodes) => {
            for node in nodes.iter().filter(|n| !n.ready) {
                issues.push(format!("Node {} is NotReady", node.name));
            }
        }
    }
    match report.calico {
        None => issues.push("calico-node daemonset not found".to_string()),
        Some(r) if !r.is_rolled_out() => issues.push(format!(
            "calico-node rollout incomplete: {}/{} ready",
            r.ready, r.desired
        )),
        Some(_) => {}
    }
    if report.etcd_healthy == Some(false) {
        issues.push("Local etcd member is unhealthy".to_string());
    }
    issues
}
