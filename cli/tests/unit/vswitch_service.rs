//! Unit tests for the vSwitch service.

#![allow(clippy::expect_used)]

use std::net::Ipv4Addr;
use std::os::unix::fs::PermissionsExt;

use hzkube_cli::application::services::vswitch::{
    VswitchRequest, configure_vswitch, resolve_node_ip,
};
use hzkube_cli::domain::config::VswitchConfig;
use hzkube_cli::domain::network::Ipv4Cidr;
use hzkube_cli::domain::{NetworkError, PreflightError};
use hzkube_cli::infra::fs::LocalFs;

use crate::helpers::{NoopReporter, ScriptedRunner, netplan_for, ok_output, put};

const DEFAULT_ROUTE: &[u8] = b"default via 203.0.113.1 dev enp0s31f6 proto static\n";

fn addr_line(iface: &str, cidr: &str) -> Vec<u8> {
    format!("5: {iface}    inet {cidr} brd 10.0.0.255 scope global {iface}\\       valid_lft forever preferred_lft forever\n")
        .into_bytes()
}

#[tokio::test]
async fn test_configure_vswitch_writes_netplan_and_verifies_address() {
    let dir = tempfile::tempdir().expect("tempdir");
    let netplan = dir.path().join("netplan/60-hzkube-vswitch.yaml");
    let runner = ScriptedRunner::new()
        .on("ip -o -4 route show to default", ok_output(DEFAULT_ROUTE))
        .on(
            "ip -o -4 addr show dev enp0s31f6.4000",
            ok_output(&addr_line("enp0s31f6.4000", "10.0.0.2/24")),
        );
    let settings = VswitchConfig::default();
    let req = VswitchRequest {
        address: Ipv4Cidr::parse("10.0.0.2/24").expect("cidr"),
        settings: &settings,
        vlan_id: None,
        parent: None,
        netplan_file: &netplan,
    };

    let result = configure_vswitch(&runner, &LocalFs, &NoopReporter, &req)
        .await
        .expect("configure");

    assert_eq!(result.interface, "enp0s31f6.4000");
    let written = std::fs::read_to_string(&netplan).expect("netplan written");
    assert!(written.contains("enp0s31f6.4000:"));
    assert!(written.contains("10.0.0.2/24"));
    assert!(written.contains("mtu: 1400"));
    let mode = std::fs::metadata(&netplan).expect("meta").permissions().mode() & 0o777;
    assert_eq!(mode, 0o600);
    assert!(runner.position("netplan apply") < runner.position("ip -o -4 addr show"));
}

#[tokio::test]
async fn test_configure_vswitch_rejects_address_outside_configured_subnet() {
    let dir = tempfile::tempdir().expect("tempdir");
    let netplan = dir.path().join("vswitch.yaml");
    let runner = ScriptedRunner::new();
    let settings = VswitchConfig {
        subnet: Some("10.0.0.0/24".to_string()),
        ..VswitchConfig::default()
    };
    let req = VswitchRequest {
        address: Ipv4Cidr::parse("10.0.1.2/24").expect("cidr"),
        settings: &settings,
        vlan_id: Some(4001),
        parent: Some("eno1"),
        netplan_file: &netplan,
    };

    let err = configure_vswitch(&runner, &LocalFs, &NoopReporter, &req)
        .await
        .expect_err("outside subnet");
    assert!(matches!(
        err.downcast_ref::<NetworkError>(),
        Some(NetworkError::OutsideSubnet { .. })
    ));
    assert!(runner.lines().is_empty(), "nothing may run before validation");
    assert!(!netplan.exists());
}

#[tokio::test]
async fn test_configure_vswitch_fails_when_address_missing_after_apply() {
    let dir = tempfile::tempdir().expect("tempdir");
    let netplan = dir.path().join("vswitch.yaml");
    let runner = ScriptedRunner::new().on(
        "ip -o -4 addr show dev eno1.4000",
        ok_output(&addr_line("eno1.4000", "10.0.0.9/24")),
    );
    let settings = VswitchConfig::default();
    let req = VswitchRequest {
        address: Ipv4Cidr::parse("10.0.0.2/24").expect("cidr"),
        settings: &settings,
        vlan_id: None,
        parent: Some("eno1"),
        netplan_file: &netplan,
    };

    let err = configure_vswitch(&runner, &LocalFs, &NoopReporter, &req)
        .await
        .expect_err("address missing");
    assert!(err.to_string().contains("does not carry 10.0.0.2/24"));
    assert!(!runner.ran("ip -o -4 route"), "explicit parent skips detection");
}

#[test]
fn test_resolve_node_ip_prefers_explicit_and_checks_subnet() {
    let dir = tempfile::tempdir().expect("tempdir");
    let netplan = dir.path().join("vswitch.yaml");
    put(&netplan, &netplan_for("10.0.0.2/24"));

    let (ip, subnet) = resolve_node_ip(&LocalFs, &netplan, None, None).expect("recorded");
    assert_eq!(ip, Ipv4Addr::new(10, 0, 0, 2));
    assert_eq!(subnet.to_string(), "10.0.0.0/24");

    let (ip, _) = resolve_node_ip(&LocalFs, &netplan, Some(Ipv4Addr::new(10, 0, 0, 7)), None)
        .expect("explicit");
    assert_eq!(ip, Ipv4Addr::new(10, 0, 0, 7));

    let err = resolve_node_ip(&LocalFs, &netplan, Some(Ipv4Addr::new(10, 9, 0, 7)), None)
        .expect_err("outside");
    assert!(err.downcast_ref::<NetworkError>().is_some());
}

#[test]
fn test_resolve_node_ip_without_netplan_needs_ip_and_subnet() {
    let dir = tempfile::tempdir().expect("tempdir");
    let netplan = dir.path().join("missing.yaml");

    let err = resolve_node_ip(&LocalFs, &netplan, None, None).expect_err("no ip");
    assert!(matches!(
        err.downcast_ref::<PreflightError>(),
        Some(PreflightError::NoNodeIp(_))
    ));

    let err = resolve_node_ip(&LocalFs, &netplan, Some(Ipv4Addr::new(10, 0, 0, 2)), None)
        .expect_err("no subnet");
    assert!(matches!(
        err.downcast_ref::<PreflightError>(),
        Some(PreflightError::NoSubnet)
    ));

    let subnet = Ipv4Cidr::parse("10.0.0.0/16").expect("cidr");
    let (ip, resolved) =
        resolve_node_ip(&LocalFs, &netplan, Some(Ipv4Addr::new(10, 0, 3, 2)), Some(&subnet))
            .expect("explicit with subnet");
    assert_eq!(ip, Ipv4Addr::new(10, 0, 3, 2));
    assert_eq!(resolved, subnet);
}
