//! `hzkube init`: bootstrap the first control plane.

use std::process::ExitCode;

use anyhow::Result;
use clap::Args;

use crate::app::AppContext;
use crate::application::ports::ConfigStore;
use crate::application::services::cluster_init::{InitRequest, init_cluster};
use crate::application::services::kubeconfig::KubePaths;
use crate::application::services::preflight::{require_binaries, require_root};
use crate::domain::kubeadm::NodeName;
use crate::domain::network::parse_ipv4;
use crate::output::json;

/// Arguments for the init command.
#[derive(Args)]
pub struct InitArgs {
    /// vSwitch address of this node; defaults to the one from `hzkube vswitch`
    #[arg(long)]
    pub node_ip: Option<String>,
    /// Node name registered with the API server
    #[arg(long)]
    pub node_name: Option<String>,
}

/// Run the init command.
///
/// # Errors
///
/// Returns an error if the arguments are invalid or bootstrap fails.
pub async fn run(app: &AppContext, args: InitArgs) -> Result<ExitCode> {
    let node_ip = args.node_ip.as_deref().map(parse_ipv4).transpose()?;
    let node_name = args.node_name.as_deref().map(NodeName::parse).transpose()?;
    let config = app.config_store.load()?;

    require_root(&app.runner).await?;
    require_binaries(&app.runner, &["kubeadm", "kubectl", "curl", "openssl"]).await?;

    let sudo_user = std::env::var("SUDO_USER").ok();
    let paths = KubePaths::default();
    let result = init_cluster(
        &app.runner,
        &app.fs,
        &app.reporter(),
        &InitRequest {
            config: &config,
            node_ip,
            node_name: node_name.as_ref(),
            sudo_user: sudo_user.as_deref(),
            paths: &paths,
        },
    )
    .await?;

    if app.is_json() {
        json::print(&serde_json::json!({
            "node_ip": result.node_ip.to_string(),
            "calico_ready": result.calico.ready,
            "join": super::join_command::join_json(&result.join),
        }))?;
    } else {
        app.human().render_join(&result.join);
    }
    Ok(ExitCode::SUCCESS)
}
