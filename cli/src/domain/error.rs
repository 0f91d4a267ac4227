//! Typed domain error enums.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All error types implement `thiserror::Error` and convert to `anyhow::Error`
//! via the `?` operator.

use thiserror::Error;

// ── Network errors ────────────────────────────────────────────────────────────

/// Errors from IPv4 / CIDR parsing and subnet checks.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NetworkError {
    #[error("Invalid IPv4 address '{input}': expected 4 dot-separated octets, found {parts}.")]
    OctetCount { input: String, parts: usize },

    #[error("Invalid IPv4 address '{input}': octet {position} ('{octet}') is not a number.")]
    OctetNotNumeric {
        input: String,
        position: usize,
        octet: String,
    },

    #[error("Invalid IPv4 address '{input}': octet {position} ({value}) out of range 0-255.")]
    OctetOutOfRange {
        input: String,
        position: usize,
        value: u32,
    },

    #[error("Invalid CIDR '{0}': expected <address>/<prefix>, e.g. 10.0.0.2/24.")]
    MissingPrefix(String),

    #[error("Invalid CIDR '{input}': prefix '{prefix}' must be a number between 0 and 32.")]
    InvalidPrefix { input: String, prefix: String },

    #[error("{address} is the {kind} address of {network}; pick a host address.")]
    NotAHostAddress {
        address: String,
        kind: &'static str,
        network: String,
    },

    #[error("{address} is not inside the vSwitch subnet {subnet}.\n\nCheck the address or update 'vswitch.subnet' with: hzkube config set vswitch.subnet <cidr>")]
    OutsideSubnet { address: String, subnet: String },

    #[error("Pod network {pod} overlaps the vSwitch subnet {vswitch}.\n\nChoose a disjoint range with: hzkube config set kubernetes.pod_cidr <cidr>")]
    Overlap { pod: String, vswitch: String },

    #[error("VLAN id {0} is outside the Hetzner vSwitch range 4000-4091.")]
    VlanOutOfRange(u16),

    #[error("Cannot detect the uplink interface: no default IPv4 route.\n\nPass it explicitly with --parent <iface>.")]
    NoDefaultRoute,
}

// ── kubeadm errors ────────────────────────────────────────────────────────────

/// Errors from validating kubeadm join material.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum KubeadmError {
    #[error("Invalid join token '{0}': expected [a-z0-9]{{6}}.[a-z0-9]{{16}}.\n\nCreate a fresh one on a control plane: hzkube join-command")]
    InvalidToken(String),

    #[error("Invalid CA certificate hash '{0}': expected sha256:<64 hex chars>.")]
    InvalidCaHash(String),

    #[error("Invalid certificate key '{0}': expected 64 hex chars.")]
    InvalidCertificateKey(String),

    #[error("Invalid API endpoint '{0}': expected <ipv4>[:<port>].")]
    InvalidEndpoint(String),

    #[error("Invalid node name '{0}': must be a lowercase RFC 1123 hostname.")]
    InvalidNodeName(String),

    #[error("Unrecognised join command output:\n{0}")]
    UnparsableJoinCommand(String),

    #[error("Unrecognised openssl digest output: {0}")]
    UnparsableDigest(String),

    #[error("CA hash mismatch: kubeadm printed {printed} but the local CA hashes to {computed}.")]
    CaHashMismatch { printed: String, computed: String },
}

// ── Manifest errors ───────────────────────────────────────────────────────────

/// Errors from templating third-party manifests.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ManifestError {
    #[error("Calico manifest has no {0} entry; is this the upstream calico.yaml?")]
    MissingAnchor(&'static str),

    #[error("Cannot render {what}: {cause}")]
    Render { what: &'static str, cause: String },
}

// ── etcd errors ───────────────────────────────────────────────────────────────

/// Errors from the etcd backup and restore procedures.
#[derive(Debug, Error)]
pub enum EtcdError {
    #[error("Snapshot file '{0}' does not exist.")]
    SnapshotMissing(String),

    #[error("Snapshot file '{0}' must end in .db.")]
    SnapshotExtension(String),

    #[error("Snapshot '{path}' failed integrity check: expected sha256 {expected}, got {actual}.")]
    ChecksumMismatch {
        path: String,
        expected: String,
        actual: String,
    },

    #[error("Unrecognised 'etcdctl snapshot status' output: {0}")]
    UnparsableStatus(String),

    #[error("Cannot read '{flag}' from the etcd manifest {manifest}.")]
    ManifestFlagMissing { flag: String, manifest: String },

    #[error("Snapshot restore failed; the previous data directory was moved back from {aside}.\n\nCause: {cause}")]
    RestoreFailed { aside: String, cause: String },

    #[error("Snapshot restore failed and rollback from {aside} also failed: {cause}\n\nMove {aside} back to {data_dir} by hand before restarting kubelet.")]
    RollbackFailed {
        aside: String,
        data_dir: String,
        cause: String,
    },

    #[error("etcd did not report healthy after {attempts} checks.\n\nThe previous data directory is kept at {aside}. Inspect with: crictl ps -a | grep etcd")]
    Unhealthy { attempts: u32, aside: String },
}

// ── Preflight errors ──────────────────────────────────────────────────────────

/// Errors raised before any host mutation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PreflightError {
    #[error("This command must run as root (uid {0}). Re-run with sudo.")]
    NotRoot(String),

    #[error("Required tools not found on PATH: {0}")]
    MissingBinaries(String),

    #[error("Cannot determine the vSwitch address: pass --node-ip or run 'hzkube vswitch' first ({0} not found).")]
    NoNodeIp(String),

    #[error("Cannot determine the vSwitch subnet.\n\nSet it with: hzkube config set vswitch.subnet <cidr>")]
    NoSubnet,
}

// ── External command errors ───────────────────────────────────────────────────

/// An external tool exited unsuccessfully.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("'{command}' failed with exit code {code}{}", stderr_suffix(.stderr))]
    Failed {
        command: String,
        code: String,
        stderr: String,
    },
}

fn stderr_suffix(stderr: &str) -> String {
    if stderr.is_empty() {
        String::new()
    } else {
        format!(":\n{stderr}")
    }
}

// ── Config errors ─────────────────────────────────────────────────────────────

/// Errors related to configuration key/value validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unknown setting: {key}\n\nValid settings: {valid}")]
    UnknownKey { key: String, valid: String },

    #[error("Invalid value for {key}: {value}\n\n{reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}
