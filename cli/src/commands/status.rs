//! `hzkube status`: node, Calico and etcd health.

use std::process::ExitCode;

use anyhow::Result;

use crate::app::AppContext;
use crate::application::ports::ConfigStore;
use crate::application::services::kubeconfig::KubePaths;
use crate::application::services::status::gather_status;
use crate::domain::collect_issues;
use crate::output::{json, progress};

/// Run the status command. Exits 1 when any issue is found.
///
/// # Errors
///
/// Returns an error if the config cannot be loaded or JSON output fails.
pub async fn run(app: &AppContext) -> Result<ExitCode> {
    let config = app.config_store.load()?;
    let paths = KubePaths::default();

    let pb = app
        .output
        .show_progress()
        .then(|| progress::spinner("Checking cluster health..."));
    let report = gather_status(
        &app.runner,
        &app.fs,
        paths.admin_conf,
        &config.etcd.layout(),
    )
    .await;
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }
    let issues = collect_issues(&report);

    if app.is_json() {
        json::print(&serde_json::json!({
            "healthy": issues.is_empty(),
            "report": report,
            "issues": issues,
        }))?;
    } else {
        app.human().render_report(&report, &issues);
    }
    Ok(if issues.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
