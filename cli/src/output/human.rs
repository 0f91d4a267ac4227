//! Human-readable terminal renderer.

use owo_colors::OwoColorize as _;

use crate::application::services::join_command::JoinInstructions;
use crate::domain::ClusterReport;
use crate::output::OutputContext;

/// Renders domain types as human-readable terminal output using `OutputContext`.
pub struct HumanRenderer<'a> {
    ctx: &'a OutputContext,
}

impl<'a> HumanRenderer<'a> {
    /// Create a new `HumanRenderer` wrapping the given output context.
    #[must_use]
    pub fn new(ctx: &'a OutputContext) -> Self {
        Self { ctx }
    }

    /// Render the CLI version.
    pub fn render_version(&self, version: &str) {
        if self.ctx.quiet {
            return;
        }
        println!("hzkube {version}");
    }

    /// Render the command to run on the next node.
    ///
    /// Printed even under `--quiet`; it is the command's only output.
    pub fn render_join(&self, join: &JoinInstructions) {
        let mut command = format!("hzkube join {}", join.command.hzkube_args());
        if let Some(key) = &join.certificate_key {
            command.push_str(" --control-plane --certificate-key ");
            command.push_str(key.as_str());
        }
        if self.ctx.quiet {
            println!("{command}");
            return;
        }
        println!();
        self.ctx.header("Run on the new node (after 'hzkube prepare' and 'hzkube vswitch'):");
        println!();
        println!("    sudo {}", command.style(self.ctx.styles.bold));
        println!();
        self.ctx.kv("Token expires:", "24 hours");
    }

    /// Render cluster health.
    pub fn render_report(&self, report: &ClusterReport, issues: &[String]) {
        if self.ctx.quiet {
            return;
        }
        self.ctx.header("Nodes");
        match &report.nodes {
            Some(nodes) if !nodes.is_empty() => {
                for node in nodes {
                    let state = if node.ready {
                        "Ready".style(self.ctx.styles.success).to_string()
                    } else {
                        "NotReady".style(self.ctx.styles.error).to_string()
                    };
                    println!(
                        "    {:<24} {state:<10} {:<16} {}",
                        node.name,
                        node.internal_ip.as_deref().unwrap_or("-"),
                        node.kubelet_version.as_deref().unwrap_or("-"),
                    );
                }
            }
            Some(_) => println!("    (none)"),
            None => println!("    {}", "unavailable".style(self.ctx.styles.dim)),
        }

        self.ctx.header("Calico");
        match report.calico {
            Some(r) => println!(
                "    calico-node {}/{} ready, {} up to date",
                r.ready, r.desired, r.updated
            ),
            None => println!("    {}", "unavailable".style(self.ctx.styles.dim)),
        }

        self.ctx.header("etcd");
        match report.etcd_healthy {
            Some(true) => println!("    local member {}", "healthy".style(self.ctx.styles.success)),
            Some(false) => println!("    local member {}", "unhealthy".style(self.ctx.styles.error)),
            None => println!("    {}", "not a control-plane node".style(self.ctx.styles.dim)),
        }

        println!();
        if issues.is_empty() {
            self.ctx.success("Cluster healthy");
        } else {
            for issue in issues {
                self.ctx.error(issue);
            }
        }
    }
}
