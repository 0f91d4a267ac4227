//! `hzkube backup`: snapshot the local etcd member.

use std::process::ExitCode;

use anyhow::Result;
use clap::Args;

use crate::app::AppContext;
use crate::application::ports::ConfigStore;
use crate::application::services::etcd_backup::backup_etcd;
use crate::application::services::preflight::{require_binaries, require_root};
use crate::domain::etcd::STAMP_FORMAT;
use crate::output::json;

/// Arguments for the backup command.
#[derive(Args)]
pub struct BackupArgs {
    /// Snapshots to keep (overrides etcd.keep; 0 keeps all)
    #[arg(long)]
    pub keep: Option<usize>,
}

/// Run the backup command.
///
/// # Errors
///
/// Returns an error if the snapshot cannot be taken or verified.
pub async fn run(app: &AppContext, args: BackupArgs) -> Result<ExitCode> {
    let config = app.config_store.load()?;
    require_root(&app.runner).await?;
    require_binaries(&app.runner, &["etcdctl"]).await?;

    let stamp = chrono::Local::now().format(STAMP_FORMAT).to_string();
    let outcome = backup_etcd(
        &app.runner,
        &app.fs,
        &app.reporter(),
        &config.etcd.layout(),
        args.keep.unwrap_or(config.etcd.keep),
        &stamp,
    )
    .await?;

    if app.is_json() {
        json::print(&serde_json::json!({
            "snapshot": outcome.snapshot,
            "sha256": outcome.sha256,
            "status": outcome.status,
            "pruned": outcome.pruned,
        }))?;
    } else {
        app.output.kv("Snapshot:", &outcome.snapshot.display().to_string());
        app.output.kv("SHA-256: ", &outcome.sha256);
    }
    Ok(ExitCode::SUCCESS)
}
