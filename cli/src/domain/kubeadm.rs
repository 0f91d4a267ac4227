//! kubeadm join material, argv builders and output parsers.
//!
//! Pure functions only, no I/O.

use std::fmt;
use std::net::Ipv4Addr;

use crate::domain::error::KubeadmError;
use crate::domain::network::{Ipv4Cidr, parse_ipv4};

/// Default kube-apiserver port.
pub const DEFAULT_API_PORT: u16 = 6443;

// ── Validated values ─────────────────────────────────────────────────────────

/// Bootstrap token, `[a-z0-9]{6}.[a-z0-9]{16}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinToken(String);

impl JoinToken {
    /// # Errors
    ///
    /// Returns an error if the token does not match the kubeadm format.
    pub fn parse(input: &str) -> Result<Self, KubeadmError> {
        let valid = input.split_once('.').is_some_and(|(id, secret)| {
            id.len() == 6 && secret.len() == 16 && is_lower_alnum(id) && is_lower_alnum(secret)
        });
        if valid {
            Ok(Self(input.to_string()))
        } else {
            Err(KubeadmError::InvalidToken(input.to_string()))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn is_lower_alnum(s: &str) -> bool {
    s.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
}

fn is_lower_hex(s: &str) -> bool {
    s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// Discovery CA hash, `sha256:<64 hex>`. Uppercase hex is normalised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaCertHash(String);

impl CaCertHash {
    /// # Errors
    ///
    /// Returns an error if the hash is not `sha256:` followed by 64 hex chars.
    pub fn parse(input: &str) -> Result<Self, KubeadmError> {
        let hex = input
            .strip_prefix("sha256:")
            .map(str::to_ascii_lowercase)
            .filter(|h| h.len() == 64 && is_lower_hex(h))
            .ok_or_else(|| KubeadmError::InvalidCaHash(input.to_string()))?;
        Ok(Self(format!("sha256:{hex}")))
    }

    /// Build from a bare hex digest.
    ///
    /// # Errors
    ///
    /// Returns an error if the digest is not 64 hex chars.
    pub fn from_hex(hex: &str) -> Result<Self, KubeadmError> {
        Self::parse(&format!("sha256:{hex}"))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Control-plane certificate key, 64 hex chars.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateKey(String);

impl CertificateKey {
    /// # Errors
    ///
    /// Returns an error if the key is not 64 lowercase hex chars.
    pub fn parse(input: &str) -> Result<Self, KubeadmError> {
        if input.len() == 64 && is_lower_hex(input) {
            Ok(Self(input.to_string()))
        } else {
            Err(KubeadmError::InvalidCertificateKey(input.to_string()))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// API server endpoint, `<ipv4>[:<port>]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint {
    pub host: Ipv4Addr,
    pub port: u16,
}

impl Endpoint {
    /// # Errors
    ///
    /// Returns an error if the host is not an IPv4 address or the port is
    /// not in `1..=65535`.
    pub fn parse(input: &str) -> Result<Self, KubeadmError> {
        Self::parse_with_default_port(input, DEFAULT_API_PORT)
    }

    /// Like [`Endpoint::parse`], with `default_port` used when none is written.
    ///
    /// # Errors
    ///
    /// Returns an error if the host is not an IPv4 address or the port is
    /// not in `1..=65535`.
    pub fn parse_with_default_port(input: &str, default_port: u16) -> Result<Self, KubeadmError> {
        let invalid = || KubeadmError::InvalidEndpoint(input.to_string());
        let (host, port) = match input.rsplit_once(':') {
            Some((h, p)) => (h, p.parse::<u16>().ok().filter(|p| *p > 0).ok_or_else(invalid)?),
            None => (input, default_port),
        };
        let host = parse_ipv4(host).map_err(|_| invalid())?;
        Ok(Self { host, port })
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Node name override; lowercase RFC 1123 hostname.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeName(String);

impl NodeName {
    /// # Errors
    ///
    /// Returns an error if any label is empty, longer than 63 chars, starts
    /// or ends with `-`, or has characters outside `[a-z0-9-]`.
    pub fn parse(input: &str) -> Result<Self, KubeadmError> {
        let label_ok = |l: &str| {
            !l.is_empty()
                && l.len() <= 63
                && !l.starts_with('-')
                && !l.ends_with('-')
                && l.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
        };
        if !input.is_empty() && input.len() <= 253 && input.split('.').all(label_ok) {
            Ok(Self(input.to_string()))
        } else {
            Err(KubeadmError::InvalidNodeName(input.to_string()))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// ── argv builders ────────────────────────────────────────────────────────────

/// Inputs for `kubeadm init` on the first control plane.
#[derive(Debug, Clone)]
pub struct InitPlan<'a> {
    pub node_ip: Ipv4Addr,
    pub api_port: u16,
    pub pod_cidr: &'a Ipv4Cidr,
    pub service_cidr: &'a Ipv4Cidr,
    pub kubernetes_version: &'a str,
    pub node_name: Option<&'a NodeName>,
}

/// argv (without the program) for `kubeadm init`.
#[must_use]
pub fn init_args(plan: &InitPlan<'_>) -> Vec<String> {
    let mut args = vec![
        "init".to_string(),
        format!("--apiserver-advertise-address={}", plan.node_ip),
        format!("--apiserver-bind-port={}", plan.api_port),
        format!("--control-plane-endpoint={}:{}", plan.node_ip, plan.api_port),
        format!("--pod-network-cidr={}", plan.pod_cidr.network()),
        format!("--service-cidr={}", plan.service_cidr.network()),
        format!("--kubernetes-version={}", plan.kubernetes_version),
        "--upload-certs".to_string(),
    ];
    if let Some(name) = plan.node_name {
        args.push(format!("--node-name={}", name.as_str()));
    }
    args
}

/// Inputs for `kubeadm join`.
#[derive(Debug, Clone)]
pub struct JoinPlan {
    pub endpoint: Endpoint,
    pub token: JoinToken,
    pub ca_hash: CaCertHash,
    pub node_name: Option<NodeName>,
    /// `Some` joins as an additional control plane.
    pub control_plane: Option<ControlPlaneJoin>,
}

/// Extra material for a control-plane join.
#[derive(Debug, Clone)]
pub struct ControlPlaneJoin {
    pub certificate_key: CertificateKey,
    pub advertise_address: Ipv4Addr,
}

/// argv (without the program) for `kubeadm join`.
#[must_use]
pub fn join_args(plan: &JoinPlan) -> Vec<String> {
    let mut args = vec![
        "join".to_string(),
        plan.endpoint.to_string(),
        "--token".to_string(),
        plan.token.as_str().to_string(),
        "--discovery-token-ca-cert-hash".to_string(),
        plan.ca_hash.as_str().to_string(),
    ];
    if let Some(name) = &plan.node_name {
        args.push(format!("--node-name={}", name.as_str()));
    }
    if let Some(cp) = &plan.control_plane {
        args.push("--control-plane".to_string());
        args.push(format!("--certificate-key={}", cp.certificate_key.as_str()));
        args.push(format!("--apiserver-advertise-address={}", cp.advertise_address));
    }
    args
}

// ── Output parsers ───────────────────────────────────────────────────────────

/// Parsed `kubeadm token create --print-join-command` output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinCommand {
    pub endpoint: Endpoint,
    pub token: JoinToken,
    pub ca_hash: CaCertHash,
}

impl JoinCommand {
    /// Render as the positional arguments `hzkube join` takes.
    #[must_use]
    pub fn hzkube_args(&self) -> String {
        format!(
            "{} {} {}",
            self.endpoint,
            self.token.as_str(),
            self.ca_hash.as_str()
        )
    }
}

/// Parse `kubeadm join <endpoint> --token <t> --discovery-token-ca-cert-hash <h>`.
///
/// Line continuations (`\`) and extra flags are tolerated.
///
/// # Errors
///
/// Returns an error if any of the three values is missing or invalid.
pub fn parse_join_command(stdout: &str) -> Result<JoinCommand, KubeadmError> {
    let unparsable = || KubeadmError::UnparsableJoinCommand(stdout.trim().to_string());
    let words: Vec<&str> = stdout
        .split_whitespace()
        .filter(|w| *w != "\\")
        .collect();
    let start = words
        .windows(2)
        .position(|w| w[0] == "kubeadm" && w[1] == "join")
        .ok_or_else(unparsable)?;
    let rest = &words[start + 2..];
    let endpoint = rest.first().ok_or_else(unparsable)?;
    let value_of = |flag: &str| {
        rest.windows(2)
            .find(|w| w[0] == flag)
            .map(|w| w[1])
            .or_else(|| {
                rest.iter()
                    .find_map(|w| w.strip_prefix(flag).and_then(|v| v.strip_prefix('=')))
            })
    };
    let token = value_of("--token").ok_or_else(unparsable)?;
    let hash = value_of("--discovery-token-ca-cert-hash").ok_or_else(unparsable)?;
    Ok(JoinCommand {
        endpoint: Endpoint::parse(endpoint)?,
        token: JoinToken::parse(token)?,
        ca_hash: CaCertHash::parse(hash)?,
    })
}

/// Parse `openssl dgst -sha256` output: `(stdin)= <hex>` or
/// `SHA2-256(stdin)= <hex>`.
///
/// # Errors
///
/// Returns an error if no 64-hex digest follows `=`.
pub fn parse_openssl_digest(stdout: &str) -> Result<CaCertHash, KubeadmError> {
    let unparsable = || KubeadmError::UnparsableDigest(stdout.trim().to_string());
    let hex = stdout
        .trim()
        .rsplit_once('=')
        .map(|(_, h)| h.trim())
        .ok_or_else(unparsable)?;
    CaCertHash::from_hex(hex).map_err(|_| unparsable())
}

/// Last non-empty line of `kubeadm init phase upload-certs --upload-certs`.
///
/// # Errors
///
/// Returns an error if that line is not a certificate key.
pub fn parse_certificate_key(stdout: &str) -> Result<CertificateKey, KubeadmError> {
    let last = stdout
        .lines()
        .map(str::trim)
        .rfind(|l| !l.is_empty())
        .unwrap_or_default();
    CertificateKey::parse(last)
}
