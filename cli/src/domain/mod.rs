//! Domain layer: pure business logic, types, and validation.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, or `std::process`.
//! All functions are synchronous and take data in, returning data out.

pub mod config;
pub mod error;
pub mod etcd;
pub mod firewall;
pub mod health;
pub mod host;
pub mod kubeadm;
pub mod manifest;
pub mod network;

pub use config::{ClusterConfig, Poll, validate_config_key};
pub use error::{
    CommandError, ConfigError, EtcdError, KubeadmError, ManifestError, NetworkError,
    PreflightError,
};
pub use health::{ClusterReport, NodeHealth, Rollout, collect_issues};
pub use network::Ipv4Cidr;
