//! `hzkube join`: join this node to an existing cluster.

use std::process::ExitCode;

use anyhow::Result;
use clap::Args;

use crate::app::AppContext;
use crate::application::ports::ConfigStore;
use crate::application::services::join::{JoinRequest, join_node};
use crate::application::services::kubeconfig::KubePaths;
use crate::application::services::preflight::{require_binaries, require_root};
use crate::domain::kubeadm::{CaCertHash, CertificateKey, Endpoint, JoinToken, NodeName};
use crate::domain::network::parse_ipv4;
use crate::output::json;

/// Arguments for the join command.
#[derive(Args)]
pub struct JoinArgs {
    /// API server endpoint on the vSwitch, e.g. 10.0.0.2:6443
    pub endpoint: String,
    /// Bootstrap token from `hzkube join-command`
    pub token: String,
    /// Discovery CA hash, sha256:<hex>
    pub ca_hash: String,
    /// Node name registered with the API server
    pub node_name: Option<String>,
    /// vSwitch address of this node; defaults to the one from `hzkube vswitch`
    #[arg(long)]
    pub node_ip: Option<String>,
    /// Join as an additional control plane
    #[arg(long, requires = "certificate_key")]
    pub control_plane: bool,
    /// Certificate key from `hzkube join-command --control-plane`
    #[arg(long, requires = "control_plane")]
    pub certificate_key: Option<String>,
}

/// Run the join command.
///
/// # Errors
///
/// Returns an error if any argument is invalid or `kubeadm join` fails.
pub async fn run(app: &AppContext, args: JoinArgs) -> Result<ExitCode> {
    let config = app.config_store.load()?;
    let endpoint = Endpoint::parse_with_default_port(&args.endpoint, config.kubernetes.api_port)?;
    let token = JoinToken::parse(&args.token)?;
    let ca_hash = CaCertHash::parse(&args.ca_hash)?;
    let node_name = args.node_name.as_deref().map(NodeName::parse).transpose()?;
    let node_ip = args.node_ip.as_deref().map(parse_ipv4).transpose()?;
    let certificate_key = args
        .certificate_key
        .as_deref()
        .map(CertificateKey::parse)
        .transpose()?;

    require_root(&app.runner).await?;
    require_binaries(&app.runner, &["kubeadm", "curl"]).await?;

    let sudo_user = std::env::var("SUDO_USER").ok();
    let paths = KubePaths::default();
    let node_ip = join_node(
        &app.runner,
        &app.fs,
        &app.reporter(),
        JoinRequest {
            config: &config,
            endpoint,
            token,
            ca_hash,
            node_name,
            node_ip,
            certificate_key,
            sudo_user: sudo_user.as_deref(),
            paths: &paths,
        },
    )
    .await?;

    if app.is_json() {
        json::print(&serde_json::json!({
            "joined": true,
            "node_ip": node_ip.to_string(),
            "control_plane": args.control_plane,
        }))?;
    } else {
        app.output.info("Check from a control plane with: hzkube status");
    }
    Ok(ExitCode::SUCCESS)
}
