//! Application service: join material for new nodes.
//!
//! kubeadm prints the discovery hash itself; it is cross-checked against a
//! hash computed from the local CA so a node never trusts a mismatched CA.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::application::ports::{CommandRunner, ProgressReporter};
use crate::application::services::exec::{run_checked, run_checked_stdin, stdout_of};
use crate::domain::KubeadmError;
use crate::domain::kubeadm::{
    CaCertHash, CertificateKey, JoinCommand, parse_certificate_key, parse_join_command,
    parse_openssl_digest,
};

/// Everything an operator needs to join a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinInstructions {
    pub command: JoinCommand,
    /// Present when control-plane join material was requested.
    pub certificate_key: Option<CertificateKey>,
}

/// Create a fresh bootstrap token and verify its discovery hash.
///
/// # Errors
///
/// Returns an error if kubeadm or openssl fail, their output cannot be
/// parsed, or the printed hash differs from the CA's.
pub async fn create_join_command(
    runner: &impl CommandRunner,
    reporter: &impl ProgressReporter,
    admin_conf: &Path,
    ca_cert: &Path,
    control_plane: bool,
) -> Result<JoinInstructions> {
    reporter.step("Creating bootstrap token...");
    let kubeconfig = format!("--kubeconfig={}", admin_conf.display());
    let printed = run_checked(
        runner,
        "kubeadm",
        &["token", "create", "--print-join-command", &kubeconfig],
    )
    .await
    .context("creating a bootstrap token")?;
    let command = parse_join_command(&stdout_of(&printed))?;

    let computed = ca_public_key_hash(runner, ca_cert).await?;
    if computed != command.ca_hash {
        return Err(KubeadmError::CaHashMismatch {
            printed: command.ca_hash.as_str().to_string(),
            computed: computed.as_str().to_string(),
        }
        .into());
    }
    reporter.success("Bootstrap token created, CA hash verified");

    let certificate_key = if control_plane {
        reporter.step("Uploading control-plane certificates...");
        let out = run_checked(
            runner,
            "kubeadm",
            &["init", "phase", "upload-certs", "--upload-certs", &kubeconfig],
        )
        .await
        .context("uploading control-plane certificates")?;
        let key = parse_certificate_key(&String::from_utf8_lossy(&out.stdout))?;
        reporter.success("Certificates uploaded; the key expires in 2 hours");
        Some(key)
    } else {
        None
    };

    info!(endpoint = %command.endpoint, control_plane, "join command created");
    Ok(JoinInstructions {
        command,
        certificate_key,
    })
}

/// `sha256:` of the DER-encoded public key of the cluster CA.
///
/// # Errors
///
/// Returns an error if any openssl step fails.
pub async fn ca_public_key_hash(runner: &impl CommandRunner, ca_cert: &Path) -> Result<CaCertHash> {
    let cert = ca_cert.display().to_string();
    let pem = run_checked(runner, "openssl", &["x509", "-pubkey", "-noout", "-in", &cert])
        .await
        .with_context(|| format!("reading the public key of {cert}"))?;
    let der = run_checked_stdin(
        runner,
        "openssl",
        &["pkey", "-pubin", "-outform", "der"],
        &pem.stdout,
    )
    .await
    .context("converting the CA public key to DER")?;
    let digest = run_checked_stdin(runner, "openssl", &["dgst", "-sha256"], &der.stdout)
        .await
        .context("hashing the CA public key")?;
    Ok(parse_openssl_digest(&String::from_utf8_lossy(&digest.stdout))?)
}
