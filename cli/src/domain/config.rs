//! Domain types and validators for hzkube configuration.
//!
//! Pure functions only, no I/O.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::domain::error::ConfigError;
use crate::domain::etcd::EtcdLayout;
use crate::domain::network::{Ipv4Cidr, validate_vlan_id};

// ── Constants ────────────────────────────────────────────────────────────────

pub const VALID_CONFIG_KEYS: &[&str] = &[
    "vswitch.vlan_id",
    "vswitch.parent_interface",
    "vswitch.mtu",
    "vswitch.subnet",
    "kubernetes.version",
    "kubernetes.pod_cidr",
    "kubernetes.service_cidr",
    "kubernetes.api_port",
    "calico.version",
    "etcd.backup_dir",
    "etcd.keep",
    "etcd.health_attempts",
    "etcd.health_interval_secs",
    "rollout.attempts",
    "rollout.interval_secs",
];

// ── Config schema ────────────────────────────────────────────────────────────

/// Top-level configuration stored in `/etc/hzkube/config.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct ClusterConfig {
    pub vswitch: VswitchConfig,
    pub kubernetes: KubernetesConfig,
    pub calico: CalicoConfig,
    pub etcd: EtcdConfig,
    pub rollout: PollConfig,
}

/// Hetzner vSwitch settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct VswitchConfig {
    /// VLAN id assigned in the Hetzner Robot panel.
    pub vlan_id: u16,
    /// Uplink NIC; detected from the default route when unset.
    pub parent_interface: Option<String>,
    /// Hetzner requires 1400 on vSwitch VLANs.
    pub mtu: u16,
    /// Private subnet shared by all nodes, e.g. `10.0.0.0/24`.
    pub subnet: Option<String>,
}

impl Default for VswitchConfig {
    fn default() -> Self {
        Self {
            vlan_id: 4000,
            parent_interface: None,
            mtu: 1400,
            subnet: None,
        }
    }
}

/// Kubernetes versions and networks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct KubernetesConfig {
    pub version: String,
    pub pod_cidr: String,
    pub service_cidr: String,
    pub api_port: u16,
}

impl Default for KubernetesConfig {
    fn default() -> Self {
        Self {
            version: "1.30.2".to_string(),
            pod_cidr: "192.168.0.0/16".to_string(),
            service_cidr: "10.96.0.0/12".to_string(),
            api_port: crate::domain::kubeadm::DEFAULT_API_PORT,
        }
    }
}

/// Calico release installed by `init`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CalicoConfig {
    pub version: String,
}

impl Default for CalicoConfig {
    fn default() -> Self {
        Self {
            version: "v3.27.3".to_string(),
        }
    }
}

impl CalicoConfig {
    /// Upstream manifest URL for this release.
    #[must_use]
    pub fn manifest_url(&self) -> String {
        format!(
            "https://raw.githubusercontent.com/projectcalico/calico/{}/manifests/calico.yaml",
            self.version
        )
    }
}

/// Backup location, retention and post-restore health polling.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EtcdConfig {
    pub backup_dir: PathBuf,
    /// Snapshots kept after each backup; `0` disables pruning.
    pub keep: usize,
    pub health_attempts: u32,
    pub health_interval_secs: u64,
}

impl Default for EtcdConfig {
    fn default() -> Self {
        Self {
            backup_dir: EtcdLayout::default().backup_dir,
            keep: 7,
            health_attempts: 30,
            health_interval_secs: 5,
        }
    }
}

impl EtcdConfig {
    /// Default layout with the configured backup directory.
    #[must_use]
    pub fn layout(&self) -> EtcdLayout {
        EtcdLayout {
            backup_dir: self.backup_dir.clone(),
            ..EtcdLayout::default()
        }
    }

    #[must_use]
    pub fn health_poll(&self) -> Poll {
        Poll {
            attempts: self.health_attempts,
            interval: Duration::from_secs(self.health_interval_secs),
        }
    }
}

/// Fixed-count polling with a fixed delay.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PollConfig {
    pub attempts: u32,
    pub interval_secs: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            attempts: 60,
            interval_secs: 5,
        }
    }
}

impl PollConfig {
    #[must_use]
    pub fn poll(&self) -> Poll {
        Poll {
            attempts: self.attempts,
            interval: Duration::from_secs(self.interval_secs),
        }
    }
}

/// Resolved polling parameters passed to services.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Poll {
    pub attempts: u32,
    pub interval: Duration,
}

impl ClusterConfig {
    /// Parsed vSwitch subnet, if configured.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored value is not a CIDR.
    pub fn vswitch_subnet(&self) -> Result<Option<Ipv4Cidr>> {
        Ok(self
            .vswitch
            .subnet
            .as_deref()
            .map(Ipv4Cidr::parse)
            .transpose()?)
    }

    /// # Errors
    ///
    /// Returns an error if the stored value is not a CIDR.
    pub fn pod_cidr(&self) -> Result<Ipv4Cidr> {
        Ok(Ipv4Cidr::parse(&self.kubernetes.pod_cidr)?)
    }

    /// # Errors
    ///
    /// Returns an error if the stored value is not a CIDR.
    pub fn service_cidr(&self) -> Result<Ipv4Cidr> {
        Ok(Ipv4Cidr::parse(&self.kubernetes.service_cidr)?)
    }

    /// Read a setting as a display string.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown.
    pub fn get(&self, key: &str) -> Result<String> {
        validate_config_key(key)?;
        let value = match key {
            "vswitch.vlan_id" => self.vswitch.vlan_id.to_string(),
            "vswitch.parent_interface" => self.vswitch.parent_interface.clone().unwrap_or_default(),
            "vswitch.mtu" => self.vswitch.mtu.to_string(),
            "vswitch.subnet" => self.vswitch.subnet.clone().unwrap_or_default(),
            "kubernetes.version" => self.kubernetes.version.clone(),
            "kubernetes.pod_cidr" => self.kubernetes.pod_cidr.clone(),
            "kubernetes.service_cidr" => self.kubernetes.service_cidr.clone(),
            "kubernetes.api_port" => self.kubernetes.api_port.to_string(),
            "calico.version" => self.calico.version.clone(),
            "etcd.backup_dir" => self.etcd.backup_dir.display().to_string(),
            "etcd.keep" => self.etcd.keep.to_string(),
            "etcd.health_attempts" => self.etcd.health_attempts.to_string(),
            "etcd.health_interval_secs" => self.etcd.health_interval_secs.to_string(),
            "rollout.attempts" => self.rollout.attempts.to_string(),
            _ => self.rollout.interval_secs.to_string(),
        };
        Ok(value)
    }

    /// Validate and apply a setting.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value is invalid for it.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        validate_config_key(key)?;
        let invalid = |reason: String| ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason,
        };
        let number = |max: u64| -> Result<u64, ConfigError> {
            value
                .parse::<u64>()
                .ok()
                .filter(|n| (1..=max).contains(n))
                .ok_or_else(|| invalid(format!("Expected a whole number between 1 and {max}.")))
        };
        let cidr = || -> Result<String, ConfigError> {
            Ipv4Cidr::parse(value)
                .map(|c| c.network().to_string())
                .map_err(|e| invalid(e.to_string()))
        };
        match key {
            "vswitch.vlan_id" => {
                let id = u16::try_from(number(u64::from(u16::MAX))?).unwrap_or_default();
                self.vswitch.vlan_id = validate_vlan_id(id).map_err(|e| invalid(e.to_string()))?;
            }
            "vswitch.parent_interface" => {
                let ok = !value.is_empty()
                    && value.len() <= 15
                    && value
                        .bytes()
                        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'));
                if !ok {
                    return Err(invalid("Expected a network interface name.".to_string()).into());
                }
                self.vswitch.parent_interface = Some(value.to_string());
            }
            "vswitch.mtu" => {
                let mtu = number(9000)?;
                if mtu < 576 {
                    return Err(invalid("MTU must be at least 576.".to_string()).into());
                }
                self.vswitch.mtu = u16::try_from(mtu).unwrap_or(1400);
            }
            "vswitch.subnet" => self.vswitch.subnet = Some(cidr()?),
            "kubernetes.version" => {
                if crate::domain::host::minor_channel(value).is_none() {
                    return Err(invalid("Expected a version like 1.30.2.".to_string()).into());
                }
                self.kubernetes.version = value.trim_start_matches('v').to_string();
            }
            "kubernetes.pod_cidr" => self.kubernetes.pod_cidr = cidr()?,
            "kubernetes.service_cidr" => self.kubernetes.service_cidr = cidr()?,
            "kubernetes.api_port" => {
                self.kubernetes.api_port =
                    u16::try_from(number(u64::from(u16::MAX))?).unwrap_or_default();
            }
            "calico.version" => {
                if !value.starts_with('v') || crate::domain::host::minor_channel(value).is_none() {
                    return Err(invalid("Expected a release tag like v3.27.3.".to_string()).into());
                }
                self.calico.version = value.to_string();
            }
            "etcd.backup_dir" => {
                if !value.starts_with('/') {
                    return Err(invalid("Expected an absolute path.".to_string()).into());
                }
                self.etcd.backup_dir = PathBuf::from(value);
            }
            "etcd.keep" => {
                self.etcd.keep = value
                    .parse()
                    .map_err(|_| invalid("Expected a whole number (0 disables pruning).".to_string()))?;
            }
            "etcd.health_attempts" => {
                self.etcd.health_attempts = u32::try_from(number(10_000)?).unwrap_or(30);
            }
            "etcd.health_interval_secs" => self.etcd.health_interval_secs = number(3600)?,
            "rollout.attempts" => {
                self.rollout.attempts = u32::try_from(number(10_000)?).unwrap_or(60);
            }
            _ => self.rollout.interval_secs = number(3600)?,
        }
        Ok(())
    }
}

// ── Validators ───────────────────────────────────────────────────────────────

/// Validates a configuration key against the whitelist.
///
/// # Errors
///
/// Returns an error if the key is not in the allowed list.
pub fn validate_config_key(key: &str) -> Result<()> {
    if !VALID_CONFIG_KEYS.contains(&key) {
        return Err(ConfigError::UnknownKey {
            key: key.to_string(),
            valid: VALID_CONFIG_KEYS.join(", "),
        }
        .into());
    }
    Ok(())
}

// ── Unit tests ───────────────────────────────────────────────────────────────
