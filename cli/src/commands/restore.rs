//! `hzkube restore`: restore the local etcd member from a snapshot.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Args;

use crate::app::AppContext;
use crate::application::ports::ConfigStore;
use crate::application::services::etcd_restore::{RestoreRequest, restore_etcd};
use crate::application::services::preflight::{require_binaries, require_root};
use crate::domain::etcd::{STAMP_FORMAT, validate_snapshot_name};
use crate::output::json;

/// Arguments for the restore command.
#[derive(Args)]
pub struct RestoreArgs {
    /// Snapshot file written by `hzkube backup` (.db)
    pub snapshot: PathBuf,
}

/// Run the restore command.
///
/// # Errors
///
/// Returns an error if the snapshot is invalid, the restore fails (after
/// rollback), or etcd does not come back healthy.
pub async fn run(app: &AppContext, args: RestoreArgs) -> Result<ExitCode> {
    validate_snapshot_name(&args.snapshot)?;
    let config = app.config_store.load()?;
    require_root(&app.runner).await?;
    require_binaries(&app.runner, &["etcdctl", "systemctl"]).await?;

    let layout = config.etcd.layout();
    let prompt = format!(
        "Restore etcd from {}? kubelet will be stopped and {} moved aside",
        args.snapshot.display(),
        layout.data_dir.display()
    );
    if !app.confirm(&prompt)? {
        app.output.info("Restore cancelled.");
        return Ok(ExitCode::SUCCESS);
    }

    let stamp = chrono::Local::now().format(STAMP_FORMAT).to_string();
    let outcome = restore_etcd(
        &app.runner,
        &app.fs,
        &app.reporter(),
        &RestoreRequest {
            layout: &layout,
            snapshot: &args.snapshot,
            stamp: &stamp,
            health: config.etcd.health_poll(),
        },
    )
    .await?;

    if app.is_json() {
        json::print(&serde_json::json!({
            "restored": true,
            "status": outcome.status,
            "aside": outcome.aside,
            "health_checks": outcome.health_checks,
        }))?;
    } else if let Some(aside) = &outcome.aside {
        app.output.info(&format!(
            "Previous data kept at {}; remove it once the cluster looks right.",
            aside.display()
        ));
    }
    Ok(ExitCode::SUCCESS)
}
