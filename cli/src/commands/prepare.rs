//! `hzkube prepare`: host prerequisites and Kubernetes packages.

use std::process::ExitCode;

use anyhow::Result;

use crate::app::AppContext;
use crate::application::ports::ConfigStore;
use crate::application::services::prepare::{HostPaths, prepare_host};
use crate::application::services::preflight::{require_binaries, require_root};
use crate::output::json;

/// Run the prepare command.
///
/// # Errors
///
/// Returns an error if a preparation step fails.
pub async fn run(app: &AppContext) -> Result<ExitCode> {
    let config = app.config_store.load()?;
    require_root(&app.runner).await?;
    require_binaries(&app.runner, &["apt-get", "dpkg-query", "systemctl"]).await?;

    prepare_host(
        &app.runner,
        &app.fs,
        &app.reporter(),
        &HostPaths::default(),
        &config.kubernetes.version,
    )
    .await?;

    if app.is_json() {
        json::print(&serde_json::json!({
            "prepared": true,
            "kubernetes_version": config.kubernetes.version,
        }))?;
    } else {
        app.output.info("Next: hzkube vswitch <ip/cidr>, then hzkube init or hzkube join");
    }
    Ok(ExitCode::SUCCESS)
}
