//! Application service: admin kubeconfig installation for root and the
//! invoking sudo user.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::application::ports::{CommandRunner, HostFs, ProgressReporter};
use crate::application::services::exec::{run_checked, stdout_of};
use crate::domain::host::parse_passwd_entry;

/// Files kubeadm writes and this tool reads or installs.
#[derive(Debug, Clone)]
pub struct KubePaths<'a> {
    pub netplan_file: &'a Path,
    pub kubelet_defaults: &'a Path,
    pub admin_conf: &'a Path,
    pub ca_cert: &'a Path,
    pub cni_dir: &'a Path,
    /// Home directory of root; the kubeconfig lands in `<home>/.kube/config`.
    pub root_home: &'a Path,
}

impl Default for KubePaths<'static> {
    fn default() -> Self {
        Self {
            netplan_file: Path::new(crate::application::services::vswitch::NETPLAN_FILE),
            kubelet_defaults: Path::new("/etc/default/kubelet"),
            admin_conf: Path::new("/etc/kubernetes/admin.conf"),
            ca_cert: Path::new("/etc/kubernetes/pki/ca.crt"),
            cni_dir: Path::new("/etc/cni/net.d"),
            root_home: Path::new("/root"),
        }
    }
}

fn kubeconfig_in(home: &Path) -> PathBuf {
    home.join(".kube").join("config")
}

/// Copy `admin.conf` to `~/.kube/config` for root and, when set, for
/// `sudo_user` (owned by that user). Returns the paths written.
///
/// # Errors
///
/// Returns an error if `admin.conf` cannot be read or a copy cannot be
/// written. An unknown sudo user is skipped with a warning.
pub async fn install_kubeconfig(
    runner: &impl CommandRunner,
    fs: &impl HostFs,
    reporter: &impl ProgressReporter,
    paths: &KubePaths<'_>,
    sudo_user: Option<&str>,
) -> Result<Vec<PathBuf>> {
    let admin = fs
        .read_to_string(paths.admin_conf)
        .with_context(|| format!("reading {}", paths.admin_conf.display()))?;
    let mut written = Vec::new();

    let root_config = kubeconfig_in(paths.root_home);
    write_private(fs, &root_config, &admin)?;
    written.push(root_config);

    if let Some(user) = sudo_user.filter(|u| !u.is_empty() && *u != "root") {
        let entry = run_checked(runner, "getent", &["passwd", user])
            .await
            .ok()
            .and_then(|o| parse_passwd_entry(&stdout_of(&o)));
        match entry {
            Some(entry) => {
                let kube_dir = Path::new(&entry.home).join(".kube");
                let config = kube_dir.join("config");
                write_private(fs, &config, &admin)?;
                let owner = format!("{}:{}", entry.uid, entry.gid);
                let dir = kube_dir.display().to_string();
                run_checked(runner, "chown", &["-R", &owner, &dir]).await?;
                debug!(user, %owner, "kubeconfig chowned");
                written.push(config);
            }
            None => reporter.warn(&format!(
                "Cannot resolve home directory of '{user}'; kubeconfig installed for root only"
            )),
        }
    }

    for path in &written {
        info!(path = %path.display(), "kubeconfig installed");
    }
    reporter.success(&format!(
        "kubeconfig installed: {}",
        written
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ")
    ));
    Ok(written)
}

fn write_private(fs: &impl HostFs, path: &Path, content: &str) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs.create_dir_all(dir)?;
    }
    fs.write_with_mode(path, content.as_bytes(), 0o600)
}
