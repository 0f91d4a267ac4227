//! `hzkube firewall`: admit cluster traffic from the vSwitch.

use std::path::Path;
use std::process::ExitCode;

use anyhow::Result;

use crate::app::AppContext;
use crate::application::ports::ConfigStore;
use crate::application::services::firewall::{apply_rules, host_rules};
use crate::application::services::preflight::{require_binaries, require_root};
use crate::application::services::vswitch::NETPLAN_FILE;
use crate::output::json;

/// Run the firewall command.
///
/// # Errors
///
/// Returns an error if the vSwitch is not configured or iptables fails.
pub async fn run(app: &AppContext) -> Result<ExitCode> {
    let config = app.config_store.load()?;
    require_root(&app.runner).await?;
    require_binaries(&app.runner, &["iptables"]).await?;

    let rules = host_rules(&app.fs, &config, Path::new(NETPLAN_FILE))?;
    let outcome = apply_rules(&app.runner, &app.reporter(), &rules).await?;

    if app.is_json() {
        json::print(&serde_json::json!({
            "added": outcome.added,
            "present": outcome.present,
            "persisted": outcome.persisted,
        }))?;
    }
    Ok(ExitCode::SUCCESS)
}
