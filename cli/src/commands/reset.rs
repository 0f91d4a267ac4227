//! `hzkube reset`: undo `init`/`join` on this node.

use std::process::ExitCode;

use anyhow::Result;

use crate::app::AppContext;
use crate::application::ports::{ConfigStore, HostFs};
use crate::application::services::firewall::host_rules;
use crate::application::services::kubeconfig::KubePaths;
use crate::application::services::preflight::{require_binaries, require_root};
use crate::application::services::reset::reset_node;
use crate::output::json;

/// Run the reset command.
///
/// # Errors
///
/// Returns an error if `kubeadm reset` or cleanup fails.
pub async fn run(app: &AppContext) -> Result<ExitCode> {
    let config = app.config_store.load()?;
    require_root(&app.runner).await?;
    require_binaries(&app.runner, &["kubeadm"]).await?;

    if !app.confirm("Reset this node? It leaves the cluster and loses all local Kubernetes state")? {
        app.output.info("Reset cancelled.");
        return Ok(ExitCode::SUCCESS);
    }

    let paths = KubePaths::default();
    let rules = match host_rules(&app.fs, &config, paths.netplan_file) {
        Ok(rules) => rules,
        Err(e) => {
            tracing::debug!(error = %e, "no firewall rules to remove");
            Vec::new()
        }
    };
    let outcome = reset_node(&app.runner, &app.fs, &app.reporter(), &paths, &rules).await?;

    if app.is_json() {
        json::print(&serde_json::json!({
            "reset": true,
            "removed_paths": outcome.removed_paths,
            "removed_rules": outcome.removed_rules,
        }))?;
    } else if app.fs.exists(paths.netplan_file) {
        app.output
            .info("The vSwitch interface is kept; remove it with: rm /etc/netplan/60-hzkube-vswitch.yaml && netplan apply");
    }
    Ok(ExitCode::SUCCESS)
}
