//! Host preparation content: apt repository, kernel modules, sysctl, swap and
//! containerd settings.
//!
//! Pure functions only, no I/O.

use std::path::Path;

/// Keyring the Kubernetes apt repository is signed with.
pub const K8S_KEYRING: &str = "/etc/apt/keyrings/kubernetes-apt-keyring.gpg";
/// apt source list for the Kubernetes repository.
pub const K8S_SOURCE_LIST: &str = "/etc/apt/sources.list.d/kubernetes.list";
/// Kernel modules loaded at boot.
pub const MODULES_LOAD_FILE: &str = "/etc/modules-load.d/hzkube.conf";
/// sysctl drop-in.
pub const SYSCTL_FILE: &str = "/etc/sysctl.d/99-hzkube.conf";
/// containerd configuration.
pub const CONTAINERD_CONFIG: &str = "/etc/containerd/config.toml";

/// Modules required by containerd and kube-proxy/calico.
pub const KERNEL_MODULES: &[&str] = &["overlay", "br_netfilter"];

/// Packages installed before the Kubernetes repository is added.
pub const BASE_PACKAGES: &[&str] = &[
    "apt-transport-https",
    "ca-certificates",
    "curl",
    "gpg",
    "containerd",
];

/// Packages pinned with `apt-mark hold`.
pub const KUBE_PACKAGES: &[&str] = &["kubelet", "kubeadm", "kubectl"];

/// `modules-load.d` content.
#[must_use]
pub fn modules_load_conf() -> String {
    let mut out = KERNEL_MODULES.join("\n");
    out.push('\n');
    out
}

/// sysctl settings for bridged traffic and forwarding.
#[must_use]
pub fn sysctl_conf() -> String {
    [
        "net.bridge.bridge-nf-call-iptables  = 1",
        "net.bridge.bridge-nf-call-ip6tables = 1",
        "net.ipv4.ip_forward                 = 1",
    ]
    .join("\n")
        + "\n"
}

/// `v1.30` from `1.30.2`, `v1.30.2` or `1.30`.
#[must_use]
pub fn minor_channel(version: &str) -> Option<String> {
    let v = version.trim().trim_start_matches('v');
    let mut parts = v.split('.');
    let major = parts.next().filter(|p| p.parse::<u32>().is_ok())?;
    let minor = parts.next().filter(|p| p.parse::<u32>().is_ok())?;
    Some(format!("v{major}.{minor}"))
}

/// Release key URL for a minor channel.
#[must_use]
pub fn repo_key_url(channel: &str) -> String {
    format!("https://pkgs.k8s.io/core:/stable:/{channel}/deb/Release.key")
}

/// One-line apt source for a minor channel.
#[must_use]
pub fn repo_source_line(channel: &str, keyring: &Path) -> String {
    format!(
        "deb [signed-by={}] https://pkgs.k8s.io/core:/stable:/{channel}/deb/ /\n",
        keyring.display()
    )
}

/// Whether `dpkg-query -W -f='${Status}'` output means installed.
#[must_use]
pub fn dpkg_installed(status: &str) -> bool {
    matches!(status.trim(), "install ok installed" | "hold ok installed")
}

/// Comment out active swap entries in `/etc/fstab`. Returns the new text
/// and how many lines changed.
#[must_use]
pub fn comment_swap_entries(fstab: &str) -> (String, usize) {
    let mut changed = 0;
    let mut out: Vec<String> = fstab
        .lines()
        .map(|line| {
            let trimmed = line.trim_start();
            let is_swap = !trimmed.starts_with('#')
                && trimmed.split_whitespace().nth(2) == Some("swap");
            if is_swap {
                changed += 1;
                format!("#{line}")
            } else {
                line.to_string()
            }
        })
        .collect();
    if fstab.ends_with('\n') {
        out.push(String::new());
    }
    (out.join("\n"), changed)
}

/// Switch containerd's runc to the systemd cgroup driver.
#[must_use]
pub fn enable_systemd_cgroup(config_toml: &str) -> String {
    config_toml.replace("SystemdCgroup = false", "SystemdCgroup = true")
}

/// Fields of a `getent passwd` line needed to install a kubeconfig.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswdEntry {
    pub uid: u32,
    pub gid: u32,
    pub home: String,
}

/// Parse `name:x:uid:gid:gecos:home:shell`.
#[must_use]
pub fn parse_passwd_entry(line: &str) -> Option<PasswdEntry> {
    let fields: Vec<&str> = line.trim().split(':').collect();
    if fields.len() < 7 || fields[5].is_empty() {
        return None;
    }
    Some(PasswdEntry {
        uid: fields[2].parse().ok()?,
        gid: fields[3].parse().ok()?,
        home: fields[5].to_string(),
    })
}
