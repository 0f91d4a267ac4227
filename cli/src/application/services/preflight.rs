//! Application service: checks run before any host mutation.

use anyhow::{Context, Result};

use crate::application::ports::CommandRunner;
use crate::application::services::exec::{run_checked, stdout_of, succeeds};
use crate::domain::PreflightError;

/// Require an effective uid of 0.
///
/// # Errors
///
/// Returns [`PreflightError::NotRoot`] for any other uid, or an error if
/// `id` cannot run.
pub async fn require_root(runner: &impl CommandRunner) -> Result<()> {
    let output = run_checked(runner, "id", &["-u"])
        .await
        .context("determining effective uid")?;
    let uid = stdout_of(&output);
    if uid == "0" {
        Ok(())
    } else {
        Err(PreflightError::NotRoot(uid).into())
    }
}

/// Require every named binary on `PATH`.
///
/// # Errors
///
/// Returns [`PreflightError::MissingBinaries`] listing all missing tools.
pub async fn require_binaries(runner: &impl CommandRunner, names: &[&str]) -> Result<()> {
    let mut missing = Vec::new();
    for name in names {
        if !has_binary(runner, name).await {
            missing.push(*name);
        }
    }
    if missing.is_empty() {
        Ok(())
    } else {
        Err(PreflightError::MissingBinaries(missing.join(", ")).into())
    }
}

/// Whether `name` resolves on `PATH`.
pub async fn has_binary(runner: &impl CommandRunner, name: &str) -> bool {
    succeeds(runner, "sh", &["-c", &format!("command -v {name}")]).await
}
