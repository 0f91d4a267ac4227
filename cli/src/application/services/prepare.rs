//! Application service: host prerequisites, containerd and the pinned
//! Kubernetes packages from the upstream apt repository.
//!
//! Every step checks current state first so a rerun only does what is left.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::application::ports::{CommandRunner, HostFs, ProgressReporter};
use crate::application::services::exec::{
    run_checked, run_checked_slow, run_checked_stdin,
};
use crate::domain::host::{
    self, BASE_PACKAGES, CONTAINERD_CONFIG, K8S_KEYRING, K8S_SOURCE_LIST, KERNEL_MODULES,
    KUBE_PACKAGES, MODULES_LOAD_FILE, SYSCTL_FILE,
};

/// Host paths touched by [`prepare_host`]; tests point these at a tempdir.
#[derive(Debug, Clone)]
pub struct HostPaths<'a> {
    pub fstab: &'a Path,
    pub modules_load: &'a Path,
    pub sysctl: &'a Path,
    pub containerd_config: &'a Path,
    pub keyring: &'a Path,
    pub source_list: &'a Path,
}

impl Default for HostPaths<'static> {
    fn default() -> Self {
        Self {
            fstab: Path::new("/etc/fstab"),
            modules_load: Path::new(MODULES_LOAD_FILE),
            sysctl: Path::new(SYSCTL_FILE),
            containerd_config: Path::new(CONTAINERD_CONFIG),
            keyring: Path::new(K8S_KEYRING),
            source_list: Path::new(K8S_SOURCE_LIST),
        }
    }
}

/// Prepare a fresh Ubuntu/Debian host to run kubeadm.
///
/// # Errors
///
/// Returns an error on the first failing step; the message names the command.
pub async fn prepare_host(
    runner: &impl CommandRunner,
    fs: &impl HostFs,
    reporter: &impl ProgressReporter,
    paths: &HostPaths<'_>,
    kubernetes_version: &str,
) -> Result<()> {
    let channel = host::minor_channel(kubernetes_version)
        .with_context(|| format!("cannot derive a minor release from '{kubernetes_version}'"))?;

    disable_swap(runner, fs, reporter, paths.fstab).await?;
    load_kernel_modules(runner, fs, reporter, paths.modules_load).await?;
    apply_sysctl(runner, fs, reporter, paths.sysctl).await?;

    reporter.step("Installing base packages and containerd...");
    run_checked_slow(runner, "apt-get", &["update"]).await?;
    install_missing(runner, BASE_PACKAGES).await?;
    configure_containerd(runner, fs, reporter, paths.containerd_config).await?;

    add_kubernetes_repo(runner, fs, reporter, paths, &channel).await?;

    reporter.step("Installing kubelet, kubeadm and kubectl...");
    run_checked_slow(runner, "apt-get", &["update"]).await?;
    install_missing(runner, KUBE_PACKAGES).await?;
    let mut hold = vec!["hold"];
    hold.extend_from_slice(KUBE_PACKAGES);
    run_checked(runner, "apt-mark", &hold).await?;
    run_checked(runner, "systemctl", &["enable", "--now", "kubelet"]).await?;
    reporter.success(&format!("Kubernetes {channel} packages installed and held"));
    info!(%channel, "host prepared");
    Ok(())
}

async fn disable_swap(
    runner: &impl CommandRunner,
    fs: &impl HostFs,
    reporter: &impl ProgressReporter,
    fstab: &Path,
) -> Result<()> {
    reporter.step("Disabling swap...");
    run_checked(runner, "swapoff", &["-a"]).await?;
    if fs.is_file(fstab) {
        let (updated, changed) = host::comment_swap_entries(&fs.read_to_string(fstab)?);
        if changed > 0 {
            fs.write(fstab, updated.as_bytes())?;
            reporter.success(&format!(
                "Commented {changed} swap entr{} in {}",
                if changed == 1 { "y" } else { "ies" },
                fstab.display()
            ));
            return Ok(());
        }
    }
    reporter.success("Swap disabled");
    Ok(())
}

async fn load_kernel_modules(
    runner: &impl CommandRunner,
    fs: &impl HostFs,
    reporter: &impl ProgressReporter,
    modules_load: &Path,
) -> Result<()> {
    reporter.step("Loading kernel modules...");
    write_if_changed(fs, modules_load, &host::modules_load_conf())?;
    for module in KERNEL_MODULES {
        run_checked(runner, "modprobe", &[module]).await?;
    }
    reporter.success(&format!("Kernel modules loaded: {}", KERNEL_MODULES.join(", ")));
    Ok(())
}

async fn apply_sysctl(
    runner: &impl CommandRunner,
    fs: &impl HostFs,
    reporter: &impl ProgressReporter,
    sysctl: &Path,
) -> Result<()> {
    reporter.step("Applying sysctl settings...");
    write_if_changed(fs, sysctl, &host::sysctl_conf())?;
    run_checked(runner, "sysctl", &["--system"]).await?;
    reporter.success("Bridged traffic and IP forwarding enabled");
    Ok(())
}

async fn configure_containerd(
    runner: &impl CommandRunner,
    fs: &impl HostFs,
    reporter: &impl ProgressReporter,
    config: &Path,
) -> Result<()> {
    reporter.step("Configuring containerd with the systemd cgroup driver...");
    let current = if fs.is_file(config) {
        fs.read_to_string(config)?
    } else {
        let out = run_checked(runner, "containerd", &["config", "default"]).await?;
        String::from_utf8_lossy(&out.stdout).into_owned()
    };
    let updated = host::enable_systemd_cgroup(&current);
    if fs.is_file(config) && updated == current {
        reporter.step("containerd already uses systemd cgroups");
        return Ok(());
    }
    if let Some(dir) = config.parent() {
        fs.create_dir_all(dir)?;
    }
    fs.write(config, updated.as_bytes())?;
    run_checked(runner, "systemctl", &["restart", "containerd"]).await?;
    reporter.success("containerd configured and restarted");
    Ok(())
}

async fn add_kubernetes_repo(
    runner: &impl CommandRunner,
    fs: &impl HostFs,
    reporter: &impl ProgressReporter,
    paths: &HostPaths<'_>,
    channel: &str,
) -> Result<()> {
    reporter.step(&format!("Adding the Kubernetes {channel} apt repository..."));
    let key = run_checked(runner, "curl", &["-fsSL", &host::repo_key_url(channel)])
        .await
        .context("downloading the Kubernetes apt key")?;
    if let Some(dir) = paths.keyring.parent() {
        fs.create_dir_all(dir)?;
    }
    let keyring = paths.keyring.display().to_string();
    run_checked_stdin(
        runner,
        "gpg",
        &["--dearmor", "--batch", "--yes", "-o", &keyring],
        &key.stdout,
    )
    .await
    .context("dearmoring the Kubernetes apt key")?;
    fs.set_permissions(paths.keyring, 0o644)?;
    if let Some(dir) = paths.source_list.parent() {
        fs.create_dir_all(dir)?;
    }
    write_if_changed(
        fs,
        paths.source_list,
        &host::repo_source_line(channel, paths.keyring),
    )?;
    reporter.success(&format!("Repository pkgs.k8s.io {channel} added"));
    Ok(())
}

async fn install_missing(runner: &impl CommandRunner, packages: &[&str]) -> Result<()> {
    let mut missing = Vec::new();
    for pkg in packages {
        let status = runner
            .run("dpkg-query", &["-W", "-f=${Status}", pkg])
            .await
            .map(|o| String::from_utf8_lossy(&o.stdout).into_owned())
            .unwrap_or_default();
        if !host::dpkg_installed(&status) {
            missing.push(*pkg);
        }
    }
    if missing.is_empty() {
        return Ok(());
    }
    let mut args = vec!["install", "-y", "--no-install-recommends"];
    args.extend(missing.iter().copied());
    run_checked_slow(runner, "apt-get", &args).await?;
    Ok(())
}

fn write_if_changed(fs: &impl HostFs, path: &Path, content: &str) -> Result<()> {
    if fs.is_file(path) && fs.read_to_string(path)? == content {
        return Ok(());
    }
    if let Some(dir) = path.parent() {
        fs.create_dir_all(dir)?;
    }
    fs.write(path, content.as_bytes())
}
