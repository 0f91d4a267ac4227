//! Shared test helpers: a scripted `CommandRunner`, reporters, and output
//! constructors.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Output};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::Result;
use hzkube_cli::application::ports::{CommandRunner, ProgressReporter};
use hzkube_cli::domain::etcd::EtcdLayout;

// ── ExitStatus construction ──────────────────────────────────────────────────

/// Build an `ExitStatus` from a logical exit code (0 = success, non-zero = failure).
///
/// The raw wait-status encodes the exit code in bits 8 to 15.
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;
    ExitStatus::from_raw(code << 8)
}

// ── Output constructors ──────────────────────────────────────────────────────

pub fn ok_output(stdout: &[u8]) -> Output {
    Output {
        status: exit_status(0),
        stdout: stdout.to_vec(),
        stderr: Vec::new(),
    }
}

pub fn err_output(code: i32, stderr: &[u8]) -> Output {
    Output {
        status: exit_status(code),
        stdout: Vec::new(),
        stderr: stderr.to_vec(),
    }
}

// ── Scripted runner ──────────────────────────────────────────────────────────

type Responder = Box<dyn Fn(&[&str]) -> Output + Send + Sync>;

/// One recorded invocation.
#[derive(Debug, Clone)]
pub struct Call {
    /// `program arg1 arg2 ...`
    pub line: String,
    pub stdin: Option<Vec<u8>>,
}

/// `CommandRunner` that answers by command-line prefix and records every call.
///
/// Rules are tried in registration order; the first whose prefix matches
/// `program args...` answers. Unmatched commands succeed with empty output.
#[derive(Default)]
pub struct ScriptedRunner {
    rules: Vec<(String, Responder)>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Always answer `prefix` with `output`.
    #[must_use]
    pub fn on(self, prefix: &str, output: Output) -> Self {
        self.on_with(prefix, move |_| output.clone())
    }

    /// Answer `prefix` with each output in turn; the last one repeats.
    #[must_use]
    pub fn on_seq(self, prefix: &str, outputs: Vec<Output>) -> Self {
        let next = AtomicUsize::new(0);
        self.on_with(prefix, move |_| {
            let i = next.fetch_add(1, Ordering::SeqCst).min(outputs.len() - 1);
            outputs[i].clone()
        })
    }

    /// Answer `prefix` by calling `f` with the argv (without the program).
    #[must_use]
    pub fn on_with(
        mut self,
        prefix: &str,
        f: impl Fn(&[&str]) -> Output + Send + Sync + 'static,
    ) -> Self {
        self.rules.push((prefix.to_string(), Box::new(f)));
        self
    }

    fn answer(&self, program: &str, args: &[&str], stdin: Option<&[u8]>) -> Output {
        let line = std::iter::once(program)
            .chain(args.iter().copied())
            .collect::<Vec<_>>()
            .join(" ");
        self.calls
            .lock()
            .expect("calls lock")
            .push(Call {
                line: line.clone(),
                stdin: stdin.map(<[u8]>::to_vec),
            });
        self.rules
            .iter()
            .find(|(prefix, _)| line.starts_with(prefix.as_str()))
            .map_or_else(|| ok_output(b""), |(_, respond)| respond(args))
    }

    /// Every command line run so far, in order.
    pub fn lines(&self) -> Vec<String> {
        self.calls
            .lock()
            .expect("calls lock")
            .iter()
            .map(|c| c.line.clone())
            .collect()
    }

    /// Index of the first call starting with `prefix`.
    pub fn position(&self, prefix: &str) -> Option<usize> {
        self.lines().iter().position(|l| l.starts_with(prefix))
    }

    /// Whether any call starts with `prefix`.
    pub fn ran(&self, prefix: &str) -> bool {
        self.position(prefix).is_some()
    }

    /// The call starting with `prefix`.
    pub fn call(&self, prefix: &str) -> Option<Call> {
        self.calls
            .lock()
            .expect("calls lock")
            .iter()
            .find(|c| c.line.starts_with(prefix))
            .cloned()
    }
}

impl CommandRunner for ScriptedRunner {
    async fn run(&self, program: &str, args: &[&str]) -> Result<Output> {
        Ok(self.answer(program, args, None))
    }

    async fn run_with_timeout(
        &self,
        program: &str,
        args: &[&str],
        _timeout: Duration,
    ) -> Result<Output> {
        Ok(self.answer(program, args, None))
    }

    async fn run_with_stdin(&self, program: &str, args: &[&str], stdin: &[u8]) -> Result<Output> {
        Ok(self.answer(program, args, Some(stdin)))
    }
}

// ── Reporters ────────────────────────────────────────────────────────────────

/// Discards all progress.
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn step(&self, _: &str) {}
    fn success(&self, _: &str) {}
    fn warn(&self, _: &str) {}
}

/// Keeps warnings so tests can assert on them.
#[derive(Default)]
pub struct RecordingReporter {
    pub warnings: Mutex<Vec<String>>,
}

impl RecordingReporter {
    pub fn warnings(&self) -> Vec<String> {
        self.warnings.lock().expect("warnings lock").clone()
    }
}

impl ProgressReporter for RecordingReporter {
    fn step(&self, _: &str) {}
    fn success(&self, _: &str) {}
    fn warn(&self, message: &str) {
        self.warnings
            .lock()
            .expect("warnings lock")
            .push(message.to_string());
    }
}

// ── Host layout in a tempdir ─────────────────────────────────────────────────

/// `EtcdLayout` rooted in `root`.
pub fn etcd_layout(root: &Path) -> EtcdLayout {
    EtcdLayout {
        data_dir: root.join("var/lib/etcd"),
        backup_dir: root.join("var/backups/etcd"),
        manifests_dir: root.join("etc/kubernetes/manifests"),
        pki_dir: root.join("etc/kubernetes/pki/etcd"),
        endpoint: "https://127.0.0.1:2379".to_string(),
    }
}

/// Owned paths backing a `KubePaths` in a tempdir.
pub struct KubeFiles {
    pub netplan_file: PathBuf,
    pub kubelet_defaults: PathBuf,
    pub admin_conf: PathBuf,
    pub ca_cert: PathBuf,
    pub cni_dir: PathBuf,
    pub root_home: PathBuf,
}

impl KubeFiles {
    pub fn new(root: &Path) -> Self {
        Self {
            netplan_file: root.join("etc/netplan/60-hzkube-vswitch.yaml"),
            kubelet_defaults: root.join("etc/default/kubelet"),
            admin_conf: root.join("etc/kubernetes/admin.conf"),
            ca_cert: root.join("etc/kubernetes/pki/ca.crt"),
            cni_dir: root.join("etc/cni/net.d"),
            root_home: root.join("root"),
        }
    }

    pub fn paths(&self) -> hzkube_cli::application::services::kubeconfig::KubePaths<'_> {
        hzkube_cli::application::services::kubeconfig::KubePaths {
            netplan_file: &self.netplan_file,
            kubelet_defaults: &self.kubelet_defaults,
            admin_conf: &self.admin_conf,
            ca_cert: &self.ca_cert,
            cni_dir: &self.cni_dir,
            root_home: &self.root_home,
        }
    }
}

/// Write `content` to `path`, creating parents.
pub fn put(path: &Path, content: &str) {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).expect("mkdir");
    }
    std::fs::write(path, content).expect("write");
}

/// Netplan file as written by `hzkube vswitch` for `address`.
pub fn netplan_for(address: &str) -> String {
    format!(
        "network:\n  version: 2\n  vlans:\n    enp0s31f6.4000:\n      addresses:\n      - {address}\n      id: 4000\n      link: enp0s31f6\n      mtu: 1400\n"
    )
}
