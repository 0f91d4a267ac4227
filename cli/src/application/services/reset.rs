//! Application service: tear a node back down to a prepared host.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::info;

use crate::application::ports::{CommandRunner, HostFs, ProgressReporter};
use crate::application::services::exec::run_checked_slow;
use crate::application::services::firewall::remove_rules;
use crate::application::services::kubeconfig::KubePaths;
use crate::domain::firewall::Rule;

/// What [`reset_node`] removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResetOutcome {
    pub removed_paths: Vec<PathBuf>,
    pub removed_rules: usize,
}

/// `kubeadm reset`, then remove what kubeadm leaves behind: CNI config,
/// kubelet defaults, root's kubeconfig and this tool's firewall rules.
///
/// Packages, containerd and the vSwitch interface are kept.
///
/// # Errors
///
/// Returns an error if `kubeadm reset` fails or a file cannot be removed.
pub async fn reset_node(
    runner: &impl CommandRunner,
    fs: &impl HostFs,
    reporter: &impl ProgressReporter,
    paths: &KubePaths<'_>,
    rules: &[Rule],
) -> Result<ResetOutcome> {
    reporter.step("Running kubeadm reset...");
    run_checked_slow(runner, "kubeadm", &["reset", "--force"])
        .await
        .context("kubeadm reset failed")?;
    reporter.success("kubeadm reset complete");

    let mut outcome = ResetOutcome::default();
    if fs.exists(paths.cni_dir) {
        fs.remove_dir_all(paths.cni_dir)?;
        outcome.removed_paths.push(paths.cni_dir.to_path_buf());
    }
    let root_kubeconfig = paths.root_home.join(".kube").join("config");
    for file in [paths.kubelet_defaults.to_path_buf(), root_kubeconfig] {
        if fs.is_file(&file) {
            fs.remove_file(&file)?;
            outcome.removed_paths.push(file);
        }
    }
    if !outcome.removed_paths.is_empty() {
        reporter.success(&format!(
            "Removed {}",
            outcome
                .removed_paths
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ));
    }

    outcome.removed_rules = remove_rules(runner, reporter, rules).await?;
    info!(
        paths = outcome.removed_paths.len(),
        rules = outcome.removed_rules,
        "node reset"
    );
    Ok(outcome)
}
