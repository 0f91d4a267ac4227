//! `hzkube join-command`: print join material for a new node.

use std::process::ExitCode;

use anyhow::Result;
use clap::Args;

use crate::app::AppContext;
use crate::application::services::join_command::{JoinInstructions, create_join_command};
use crate::application::services::kubeconfig::KubePaths;
use crate::application::services::preflight::{require_binaries, require_root};
use crate::output::json;

/// Arguments for the join-command command.
#[derive(Args)]
pub struct JoinCommandArgs {
    /// Also upload certificates and print a certificate key
    #[arg(long)]
    pub control_plane: bool,
}

/// Run the join-command command.
///
/// # Errors
///
/// Returns an error if token creation or CA hash verification fails.
pub async fn run(app: &AppContext, args: JoinCommandArgs) -> Result<ExitCode> {
    require_root(&app.runner).await?;
    require_binaries(&app.runner, &["kubeadm", "openssl"]).await?;

    let paths = KubePaths::default();
    let join = create_join_command(
        &app.runner,
        &app.reporter(),
        paths.admin_conf,
        paths.ca_cert,
        args.control_plane,
    )
    .await?;

    if app.is_json() {
        json::print(&join_json(&join))?;
    } else {
        app.human().render_join(&join);
    }
    Ok(ExitCode::SUCCESS)
}

/// JSON shape shared with `hzkube init`.
#[must_use]
pub fn join_json(join: &JoinInstructions) -> serde_json::Value {
    serde_json::json!({
        "endpoint": join.command.endpoint.to_string(),
        "token": join.command.token.as_str(),
        "ca_cert_hash": join.command.ca_hash.as_str(),
        "certificate_key": join.certificate_key.as_ref().map(|k| k.as_str()),
    })
}
