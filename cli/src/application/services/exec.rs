//! Exit-status checking shared by every service.
//!
//! Each external call goes through one of these helpers so a non-zero exit
//! becomes a typed [`CommandError`] carrying the trimmed stderr.

use std::process::Output;
use std::time::Duration;

use anyhow::Result;
use tracing::debug;

use crate::application::ports::CommandRunner;
use crate::domain::CommandError;

/// Timeout for slow commands: `kubeadm init/join`, `apt-get install`,
/// `etcdctl snapshot save/restore`.
pub const SLOW_COMMAND_TIMEOUT: Duration = Duration::from_secs(20 * 60);

fn failure(program: &str, args: &[&str], output: &Output) -> CommandError {
    let mut command = program.to_string();
    for arg in args {
        command.push(' ');
        command.push_str(arg);
    }
    CommandError::Failed {
        command,
        code: output
            .status
            .code()
            .map_or_else(|| "none (killed by signal)".to_string(), |c| c.to_string()),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    }
}

fn check(program: &str, args: &[&str], output: Output) -> Result<Output> {
    if output.status.success() {
        Ok(output)
    } else {
        Err(failure(program, args, &output).into())
    }
}

/// Run with the default timeout and require exit status 0.
///
/// # Errors
///
/// Returns an error if the program cannot run or exits non-zero.
pub async fn run_checked(
    runner: &impl CommandRunner,
    program: &str,
    args: &[&str],
) -> Result<Output> {
    debug!(program, ?args, "exec");
    let output = runner.run(program, args).await?;
    check(program, args, output)
}

/// Run with [`SLOW_COMMAND_TIMEOUT`] and require exit status 0.
///
/// # Errors
///
/// Returns an error if the program cannot run, times out, or exits non-zero.
pub async fn run_checked_slow(
    runner: &impl CommandRunner,
    program: &str,
    args: &[&str],
) -> Result<Output> {
    debug!(program, ?args, "exec (slow)");
    let output = runner
        .run_with_timeout(program, args, SLOW_COMMAND_TIMEOUT)
        .await?;
    check(program, args, output)
}

/// Run with stdin and require exit status 0.
///
/// # Errors
///
/// Returns an error if the program cannot run or exits non-zero.
pub async fn run_checked_stdin(
    runner: &impl CommandRunner,
    program: &str,
    args: &[&str],
    stdin: &[u8],
) -> Result<Output> {
    debug!(program, ?args, stdin_bytes = stdin.len(), "exec with stdin");
    let output = runner.run_with_stdin(program, args, stdin).await?;
    check(program, args, output)
}

/// Whether the program ran and exited 0. Spawn errors count as `false`.
pub async fn succeeds(runner: &impl CommandRunner, program: &str, args: &[&str]) -> bool {
    debug!(program, ?args, "probe");
    runner
        .run(program, args)
        .await
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Borrow a `Vec<String>` argv as `&[&str]`.
#[must_use]
pub fn as_strs(args: &[String]) -> Vec<&str> {
    args.iter().map(String::as_str).collect()
}

/// Stdout as trimmed UTF-8 (lossy).
#[must_use]
pub fn stdout_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}
