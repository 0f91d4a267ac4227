//! JSON output helpers.
//!
//! Every `--json` code path prints exactly one pretty-printed object on
//! stdout; failures use [`format_error`].

use anyhow::{Context, Result};
use serde::Serialize;

use crate::domain::{
    CommandError, ConfigError, EtcdError, KubeadmError, ManifestError, NetworkError,
    PreflightError,
};

/// Stable machine-readable code for an error chain.
#[must_use]
pub fn error_code(err: &anyhow::Error) -> &'static str {
    for cause in err.chain() {
        if cause.is::<NetworkError>() {
            return "INVALID_NETWORK";
        }
        if cause.is::<KubeadmError>() {
            return "INVALID_JOIN_MATERIAL";
        }
        if let Some(e) = cause.downcast_ref::<EtcdError>() {
            return match e {
                EtcdError::RestoreFailed { .. } => "RESTORE_FAILED",
                EtcdError::RollbackFailed { .. } => "ROLLBACK_FAILED",
                EtcdError::Unhealthy { .. } => "ETCD_UNHEALTHY",
                _ => "INVALID_SNAPSHOT",
            };
        }
        if cause.is::<PreflightError>() {
            return "PREFLIGHT";
        }
        if cause.is::<ConfigError>() {
            return "CONFIG";
        }
        if cause.is::<ManifestError>() {
            return "MANIFEST";
        }
        if cause.is::<CommandError>() {
            return "COMMAND_FAILED";
        }
    }
    "ERROR"
}

/// Format a JSON error object.
///
/// Output (pretty-printed):
/// ```json
/// {
///   "error": true,
///   "message": "...",
///   "code": "..."
/// }
/// ```
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn format_error(message: &str, code: &str) -> Result<String> {
    let obj = serde_json::json!({
        "error": true,
        "message": message,
        "code": code,
    });
    serde_json::to_string_pretty(&obj).context("JSON serialization failed")
}

/// Print any serializable value as pretty JSON on stdout.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn print<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let out = serde_json::to_string_pretty(value).context("JSON serialization failed")?;
    println!("{out}");
    Ok(())
}
