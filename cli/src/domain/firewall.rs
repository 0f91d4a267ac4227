//! iptables rules admitting cluster traffic over the vSwitch.
//!
//! Pure functions only, no I/O.

use crate::domain::network::Ipv4Cidr;

/// Comment attached to every rule so `reset` can find them again.
pub const RULE_COMMENT: &str = "hzkube";

/// One `INPUT` chain rule, stored as its match specification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    /// Short description for progress output.
    pub description: String,
    spec: Vec<String>,
}

impl Rule {
    fn new(description: String, spec: &[&str]) -> Self {
        let mut spec: Vec<String> = spec.iter().map(ToString::to_string).collect();
        spec.extend(
            ["-m", "comment", "--comment", RULE_COMMENT, "-j", "ACCEPT"]
                .iter()
                .map(ToString::to_string),
        );
        Self { description, spec }
    }

    /// `iptables -C INPUT ...` (exit 0 when the rule exists).
    #[must_use]
    pub fn check_args(&self) -> Vec<String> {
        self.with_action("-C")
    }

    /// `iptables -A INPUT ...`.
    #[must_use]
    pub fn append_args(&self) -> Vec<String> {
        self.with_action("-A")
    }

    /// `iptables -D INPUT ...`.
    #[must_use]
    pub fn delete_args(&self) -> Vec<String> {
        self.with_action("-D")
    }

    fn with_action(&self, action: &str) -> Vec<String> {
        let mut args = vec![action.to_string(), "INPUT".to_string()];
        args.extend(self.spec.iter().cloned());
        args
    }
}

/// Ordered rule set for a node.
#[must_use]
pub fn cluster_rules(vswitch: &Ipv4Cidr, pod_cidr: &Ipv4Cidr, vlan_iface: &str, api_port: u16) -> Vec<Rule> {
    let vswitch_net = vswitch.network().to_string();
    let pod_net = pod_cidr.network().to_string();
    let port = api_port.to_string();
    vec![
        Rule::new(
            "established and related traffic".to_string(),
            &["-m", "conntrack", "--ctstate", "ESTABLISHED,RELATED"],
        ),
        Rule::new(
            format!("all traffic from {vswitch_net} on {vlan_iface}"),
            &["-i", vlan_iface, "-s", &vswitch_net],
        ),
        Rule::new(format!("pod network {pod_net}"), &["-s", &pod_net]),
        Rule::new(
            format!("kube-apiserver {port}/tcp on {vlan_iface}"),
            &["-i", vlan_iface, "-p", "tcp", "--dport", &port],
        ),
    ]
}
